// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Control Integration Tests
//!
//! Controls driving the coordinator's write path, with readback registers
//! injected the same way the mapping loader does it.

use growatt_modbus::{
    inject_readbacks, ControlDescriptor, ControlKind, ControlSet, ControlTarget, ControlValue,
    Coordinator,
};
use growatt_tests::prelude::*;

struct Rig {
    device: MockDevice,
    coordinator: Coordinator,
    controls: ControlSet,
}

async fn rig_with(controls: Vec<ControlDescriptor>) -> Rig {
    init_test_logging();
    let device = MockDevice::new();
    device
        .set_holding(0, 1)
        .set_holding(123, 500)
        .set_holding(1044, 2)
        .set_holding_u32(3048, 0x0000_1234);

    let mut registers = RegisterFixtures::inverter();
    let mut controls = controls;
    inject_readbacks(&mut registers, &mut controls);

    let coordinator = device.coordinator(registers).unwrap();
    coordinator.refresh().await.unwrap();

    Rig {
        device,
        coordinator,
        controls: ControlSet::new(controls).unwrap(),
    }
}

async fn rig() -> Rig {
    rig_with(ControlFixtures::all()).await
}

fn number_state(rig: &Rig, unique_id: &str) -> Option<f64> {
    match rig.controls.state(&rig.coordinator, unique_id)? {
        ControlValue::Number(v) => Some(v),
        other => panic!("expected a number state, got {other:?}"),
    }
}

// =============================================================================
// Readback
// =============================================================================

#[tokio::test]
async fn test_readbacks_polled_with_holdings() {
    let rig = rig().await;

    assert_eq!(rig.coordinator.value("rb_enable"), Some(1.0));
    assert_eq!(rig.coordinator.value("rb_priority"), Some(2.0));
    assert_eq!(
        rig.coordinator.value("rb_ac_charge"),
        Some(f64::from(0x0000_1234u32))
    );
    assert!(rig.coordinator.register("rb_ac_charge").unwrap().is_wide());
}

#[tokio::test]
async fn test_state_from_readbacks() {
    let rig = rig().await;
    let state = |uid: &str| rig.controls.state(&rig.coordinator, uid);

    assert_eq!(state("enable"), Some(ControlValue::Switch(true)));
    assert_eq!(
        state("priority"),
        Some(ControlValue::Option("Grid First".into()))
    );
    assert_eq!(
        state("ac_charge"),
        Some(ControlValue::Option("Disabled".into()))
    );
    assert_close(number_state(&rig, "export_limit_rate"), 50.0);
    assert_eq!(state("charge_power"), None);
    assert_eq!(state("missing"), None);
}

// =============================================================================
// Switch
// =============================================================================

#[tokio::test]
async fn test_switch_writes_on_off_values() {
    let rig = rig().await;

    assert!(rig.controls.switch(&rig.coordinator, "enable", false).await);
    assert_eq!(rig.device.holding(0), Some(0));
    assert_eq!(
        rig.controls.state(&rig.coordinator, "enable"),
        Some(ControlValue::Switch(false))
    );

    assert!(rig.controls.apply(&rig.coordinator, "enable", "on").await.unwrap());
    assert_eq!(rig.device.holding(0), Some(1));
}

#[tokio::test]
async fn test_coil_switch() {
    let coil = ControlDescriptor::new(ControlKind::Switch, "relay", 7)
        .with_target(ControlTarget::Coil);
    let rig = rig_with(vec![coil]).await;

    assert!(rig.coordinator.register("rb_relay").is_none());
    assert!(rig.controls.switch(&rig.coordinator, "relay", true).await);
    assert_eq!(rig.device.coil(7), Some(true));
    assert_eq!(rig.controls.state(&rig.coordinator, "relay"), None);
}

// =============================================================================
// Select
// =============================================================================

#[tokio::test]
async fn test_select_writes_option_value() {
    let rig = rig().await;

    assert!(
        rig.controls
            .select_option(&rig.coordinator, "priority", "Battery First")
            .await
    );
    assert_eq!(rig.device.holding(1044), Some(1));
    assert_eq!(
        rig.controls.state(&rig.coordinator, "priority"),
        Some(ControlValue::Option("Battery First".into()))
    );
}

#[tokio::test]
async fn test_select_unknown_label_ignored() {
    let rig = rig().await;
    rig.device.clear_calls();

    assert!(
        !rig.controls
            .select_option(&rig.coordinator, "priority", "Solar First")
            .await
    );
    assert!(rig.device.writes().is_empty());
}

#[tokio::test]
async fn test_select32_preserves_other_bits() {
    let rig = rig().await;

    assert!(
        rig.controls
            .apply(&rig.coordinator, "ac_charge", "Enabled")
            .await
            .unwrap()
    );

    assert_eq!(rig.device.holding(3048), Some(0x0001));
    assert_eq!(rig.device.holding(3049), Some(0x1234));
    assert_eq!(
        rig.controls.state(&rig.coordinator, "ac_charge"),
        Some(ControlValue::Option("Enabled".into()))
    );

    assert!(
        rig.controls
            .select_option(&rig.coordinator, "ac_charge", "Disabled")
            .await
    );
    assert_eq!(rig.device.holding(3048), Some(0x0000));
    assert_eq!(rig.device.holding(3049), Some(0x1234));
}

// =============================================================================
// Number
// =============================================================================

#[tokio::test]
async fn test_number_applies_write_factor_and_clamps() {
    let rig = rig().await;

    assert!(
        rig.controls
            .set_value(&rig.coordinator, "export_limit_rate", 42.34)
            .await
    );
    assert_eq!(rig.device.holding(123), Some(423));
    assert_close(number_state(&rig, "export_limit_rate"), 42.3);

    assert!(
        rig.controls
            .set_value(&rig.coordinator, "export_limit_rate", 250.0)
            .await
    );
    assert_eq!(rig.device.holding(123), Some(1000));
}

#[tokio::test]
async fn test_number32_remembers_written_value() {
    let rig = rig().await;

    assert!(
        rig.controls
            .apply(&rig.coordinator, "charge_power", "4999.6")
            .await
            .unwrap()
    );

    assert_eq!(rig.device.writes().last(), Some(&(3020, vec![0, 5000])));
    assert_eq!(
        rig.controls.state(&rig.coordinator, "charge_power"),
        Some(ControlValue::Number(5000.0))
    );
}

#[tokio::test]
async fn test_number_rejects_non_finite() {
    let rig = rig().await;
    rig.device.clear_calls();

    assert!(
        !rig.controls
            .set_value(&rig.coordinator, "export_limit_rate", f64::NAN)
            .await
    );
    assert!(rig.device.writes().is_empty());
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_apply_rejects_bad_input() {
    let rig = rig().await;

    assert!(rig.controls.apply(&rig.coordinator, "enable", "maybe").await.is_err());
    assert!(rig
        .controls
        .apply(&rig.coordinator, "export_limit_rate", "lots")
        .await
        .is_err());
    assert!(rig.controls.apply(&rig.coordinator, "ghost", "on").await.is_err());
}

#[tokio::test]
async fn test_failed_write_keeps_state() {
    let rig = rig().await;
    rig.device.fail_writes(Fault::Exception(4));

    assert!(!rig.controls.switch(&rig.coordinator, "enable", false).await);
    assert_eq!(
        rig.controls.state(&rig.coordinator, "enable"),
        Some(ControlValue::Switch(true))
    );
}

#[tokio::test]
async fn test_wrong_kind_operation_ignored() {
    let rig = rig().await;
    rig.device.clear_calls();

    assert!(!rig.controls.switch(&rig.coordinator, "priority", true).await);
    assert!(!rig.controls.set_value(&rig.coordinator, "enable", 1.0).await);
    assert!(rig.device.writes().is_empty());
}
