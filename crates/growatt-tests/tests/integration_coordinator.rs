// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Coordinator Integration Tests
//!
//! Poll cycles and write paths against the mock inverter.
//!
//! - `test_poll_*`: window reads, decoding, holding-once policy
//! - `test_error_*`: exception, link loss, short reads
//! - `test_transport_*`: address offset, call conventions
//! - `test_write_*`: write paths and cache coherency

use std::sync::Arc;

use growatt_modbus::{
    CallConvention, Coordinator, RegisterDescriptor, RegisterType, WordOrder,
};
use growatt_tests::prelude::*;

fn inverter() -> (MockDevice, Coordinator) {
    init_test_logging();
    let device = MockDevice::new();
    device
        .set_input(0, 1)
        .set_input_u32(1, 65_536)
        .set_input(3, 2345)
        .set_input(93, 0xFFF6)
        .set_holding(3, 80);
    let coordinator = device.coordinator(RegisterFixtures::inverter()).unwrap();
    (device, coordinator)
}

// =============================================================================
// Poll Cycle
// =============================================================================

#[tokio::test]
async fn test_poll_first_cycle_reads_holdings_first() {
    let (device, coordinator) = inverter();

    let snapshot = coordinator.refresh().await.unwrap();

    assert_eq!(
        device.reads(),
        vec![
            (RegisterType::Holding, 3, 1),
            (RegisterType::Input, 0, 4),
            (RegisterType::Input, 93, 1),
        ]
    );
    assert_eq!(snapshot.len(), 5);
    assert_close(snapshot["status"], 1.0);
    assert_close(snapshot["pv_power"], 6553.6);
    assert_close(snapshot["pv1_voltage"], 234.5);
    assert_close(snapshot["temperature"], -1.0);
    assert_close(snapshot["active_power_rate"], 80.0);
    assert!(coordinator.first_poll_done().await);
    assert!(coordinator.last_update_success());
    assert!(coordinator.last_updated().is_some());
}

#[tokio::test]
async fn test_poll_holdings_served_from_cache() {
    let (device, coordinator) = inverter();
    coordinator.refresh().await.unwrap();

    device.set_holding(3, 10).set_input(3, 2400);
    device.clear_calls();

    let snapshot = coordinator.refresh().await.unwrap();

    assert!(device.reads().iter().all(|r| r.0 == RegisterType::Input));
    assert_close(snapshot["active_power_rate"], 80.0);
    assert_close(snapshot["pv1_voltage"], 240.0);
}

#[tokio::test]
async fn test_poll_snapshot_matches_get_snapshot() {
    let (_device, coordinator) = inverter();

    let snapshot = coordinator.refresh().await.unwrap();

    assert_eq!(coordinator.get_snapshot(), snapshot);
    assert_eq!(coordinator.value("status"), Some(1.0));
    assert_eq!(coordinator.value("nope"), None);
}

#[tokio::test]
async fn test_poll_empty_register_list() {
    let device = MockDevice::new();
    let coordinator = device.coordinator(Vec::new()).unwrap();

    let snapshot = coordinator.refresh().await.unwrap();

    assert!(snapshot.is_empty());
    assert!(device.reads().is_empty());
}

#[tokio::test]
async fn test_poll_rejects_duplicate_ids() {
    let device = MockDevice::new();
    let registers = vec![
        RegisterDescriptor::input("pv", 1),
        RegisterDescriptor::input("pv", 2),
    ];
    assert!(device.coordinator(registers).is_err());
}

// =============================================================================
// Errors
// =============================================================================

#[tokio::test]
async fn test_error_exception_window_yields_absent_values() {
    let (device, coordinator) = inverter();
    device.fail_reads_at(RegisterType::Input, 93, Fault::Exception(2));

    let snapshot = coordinator.refresh().await.unwrap();

    assert_eq!(snapshot["temperature"], None);
    assert_close(snapshot["pv1_voltage"], 234.5);
    assert!(coordinator.last_update_success());
}

#[tokio::test]
async fn test_error_link_loss_keeps_previous_snapshot() {
    let (device, coordinator) = inverter();
    let first = coordinator.refresh().await.unwrap();

    device.fail_all_reads(Fault::ConnectionLost);
    assert!(coordinator.refresh().await.is_err());

    assert!(!coordinator.last_update_success());
    assert_eq!(coordinator.get_snapshot(), first);
    assert_eq!(device.count(|c| *c == Call::Disconnect), 1);

    device.clear_faults();
    coordinator.refresh().await.unwrap();
    assert!(coordinator.last_update_success());
    assert_eq!(device.count(|c| *c == Call::Connect), 2);
}

#[tokio::test]
async fn test_error_connect_refused() {
    let (device, coordinator) = inverter();
    device.fail_connect(true);

    assert!(coordinator.refresh().await.is_err());
    assert!(device.reads().is_empty());
    assert!(!coordinator.first_poll_done().await);
}

#[tokio::test]
async fn test_error_short_read_absent_tail() {
    let (device, coordinator) = inverter();
    device.short_reads(Some(2));

    let snapshot = coordinator.refresh().await.unwrap();

    assert_close(snapshot["status"], 1.0);
    assert_close(snapshot["active_power_rate"], 80.0);
    assert_eq!(snapshot["pv_power"], None);
    assert_eq!(snapshot["pv1_voltage"], None);
}

// =============================================================================
// Transport
// =============================================================================

#[tokio::test]
async fn test_transport_address_offset() {
    let device = MockDevice::new();
    device.set_input(9, 42);
    let coordinator = Coordinator::new(
        vec![RegisterDescriptor::input("pv", 10)],
        device.client(1),
    )
    .unwrap();

    let snapshot = coordinator.refresh().await.unwrap();

    assert_eq!(device.reads(), vec![(RegisterType::Input, 9, 1)]);
    assert_close(snapshot["pv"], 42.0);
}

#[tokio::test]
async fn test_transport_convention_fallback() {
    let (device, coordinator) = inverter();
    device.reject_convention(CallConvention::Addressed);

    coordinator.refresh().await.unwrap();

    assert_eq!(device.rejections(), 3);
    assert!(device
        .calls()
        .iter()
        .all(|c| !matches!(c, Call::Read { station: Some(_), .. })));
}

#[tokio::test]
async fn test_transport_addressed_by_default() {
    let (device, coordinator) = inverter();

    coordinator.refresh().await.unwrap();

    assert_eq!(device.rejections(), 0);
    assert!(device
        .calls()
        .iter()
        .filter(|c| matches!(c, Call::Read { .. }))
        .all(|c| matches!(c, Call::Read { station: Some(1), .. })));
}

// =============================================================================
// Write Path
// =============================================================================

#[tokio::test]
async fn test_write_single_register_patches_snapshot() {
    let (device, coordinator) = inverter();
    coordinator.refresh().await.unwrap();

    assert!(coordinator.write_single_register(3, 55).await);

    assert_eq!(device.holding(3), Some(55));
    assert_eq!(coordinator.value("active_power_rate"), Some(55.0));
    let snapshot = coordinator.refresh().await.unwrap();
    assert_close(snapshot["active_power_rate"], 55.0);
}

#[tokio::test]
async fn test_write_failure_leaves_cache() {
    let (device, coordinator) = inverter();
    coordinator.refresh().await.unwrap();
    device.fail_writes(Fault::Exception(3));

    assert!(!coordinator.write_single_register(3, 55).await);

    assert_eq!(coordinator.value("active_power_rate"), Some(80.0));
}

#[tokio::test]
async fn test_write_u32_word_orders() {
    init_test_logging();
    let device = MockDevice::new();
    let coordinator = device
        .coordinator(vec![
            RegisterDescriptor::holding("limit", 30).with_count(2),
        ])
        .unwrap();
    coordinator.refresh().await.unwrap();

    assert!(coordinator.write_u32(30, 0x0001_0002, WordOrder::HighLow).await);
    assert_eq!(device.writes().last(), Some(&(30, vec![1, 2])));
    assert_eq!(coordinator.value("limit"), Some(65_538.0));

    assert!(coordinator.write_u32(30, 0x0001_0002, WordOrder::LowHigh).await);
    assert_eq!(device.writes().last(), Some(&(30, vec![2, 1])));
    assert_eq!(coordinator.value("limit"), Some(65_538.0));

    assert!(coordinator.write_u32(30, -1, WordOrder::HighLow).await);
    assert_eq!(device.writes().last(), Some(&(30, vec![0xFFFF, 0xFFFF])));
    assert_eq!(coordinator.value("limit"), Some(f64::from(u32::MAX)));
}

#[tokio::test]
async fn test_write_multiple_registers_updates_each_address() {
    init_test_logging();
    let device = MockDevice::new();
    let coordinator = device
        .coordinator(vec![
            RegisterDescriptor::holding("a", 10),
            RegisterDescriptor::holding("b", 11).with_scale(0.1),
        ])
        .unwrap();
    coordinator.refresh().await.unwrap();

    assert!(coordinator.write_multiple_registers(10, &[7, 250]).await);

    assert_eq!(coordinator.value("a"), Some(7.0));
    assert_close(coordinator.value("b"), 25.0);
}

#[tokio::test]
async fn test_write_multiple_registers_updates_wide_base() {
    init_test_logging();
    let device = MockDevice::new();
    let coordinator = device
        .coordinator(vec![RegisterDescriptor::holding("limit", 30)
            .with_count(2)
            .with_scale(0.5)])
        .unwrap();
    coordinator.refresh().await.unwrap();

    assert!(coordinator.write_multiple_registers(30, &[1, 2]).await);

    assert_eq!(coordinator.value("limit"), Some(32_769.0));
}

#[tokio::test]
async fn test_write_signed_register_matches_device_read() {
    init_test_logging();
    let device = MockDevice::new();
    let registers = || {
        vec![RegisterDescriptor::holding("grid_offset", 40)
            .with_signed(true)
            .with_scale(0.1)]
    };
    let coordinator = device.coordinator(registers()).unwrap();
    coordinator.refresh().await.unwrap();

    assert!(coordinator.write_single_register(40, (-50i16) as u16).await);
    assert_close(coordinator.value("grid_offset"), -5.0);

    let reader = device.coordinator(registers()).unwrap();
    let snapshot = reader.refresh().await.unwrap();
    assert_close(snapshot["grid_offset"], -5.0);
}

#[tokio::test]
async fn test_write_bitfield_read_modify_write() {
    init_test_logging();
    let device = MockDevice::new();
    device.set_holding_u32(3048, 0x0000_1234);
    let coordinator = device
        .coordinator(vec![RegisterDescriptor::holding("mode", 3048).with_count(2)])
        .unwrap();

    assert!(
        !coordinator
            .write_bitfield("mode", 3048, 0x0001_0000, 16, 1, WordOrder::HighLow)
            .await,
        "no cached value yet"
    );

    coordinator.refresh().await.unwrap();
    assert!(
        coordinator
            .write_bitfield("mode", 3048, 0x0001_0000, 16, 1, WordOrder::HighLow)
            .await
    );

    assert_eq!(device.writes().last(), Some(&(3048, vec![0x0001, 0x1234])));
    assert_eq!(coordinator.value("mode"), Some(f64::from(0x0001_1234u32)));
}

#[tokio::test]
async fn test_write_coil() {
    let (device, coordinator) = inverter();

    assert!(coordinator.write_coil(5, true).await);
    assert_eq!(device.coil(5), Some(true));
}

#[tokio::test]
async fn test_write_after_close_rejected() {
    let (device, coordinator) = inverter();
    coordinator.refresh().await.unwrap();

    coordinator.close().await;
    coordinator.close().await;

    assert!(coordinator.is_closed());
    assert!(!coordinator.write_single_register(3, 1).await);
    assert!(coordinator.refresh().await.is_err());
    assert!(device.writes().is_empty());
}

#[tokio::test]
async fn test_write_serialized_with_cycles() {
    let (device, coordinator) = inverter();
    device.read_delay(Some(std::time::Duration::from_millis(20)));
    let coordinator = Arc::new(coordinator);

    let poller = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.refresh().await })
    };
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let wrote = coordinator.write_single_register(3, 60).await;

    assert!(poller.await.unwrap().is_ok());
    assert!(wrote);
    assert_eq!(coordinator.value("active_power_rate"), Some(60.0));
}
