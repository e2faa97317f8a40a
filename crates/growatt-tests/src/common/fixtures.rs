// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Fixtures
//!
//! Register maps, controls, and config documents shaped like a small
//! hybrid inverter.

use std::collections::BTreeMap;

use growatt_modbus::{
    ControlDescriptor, ControlKind, RegisterDescriptor, SelectOption, WordOrder,
};

// =============================================================================
// Register Fixtures
// =============================================================================

/// Fixture providing register descriptors.
pub struct RegisterFixtures;

impl RegisterFixtures {
    /// Inverter status with labels, input register 0.
    pub fn status() -> RegisterDescriptor {
        let options = BTreeMap::from([
            (0, "Waiting".to_string()),
            (1, "Normal".to_string()),
            (3, "Fault".to_string()),
        ]);
        RegisterDescriptor::input("status", 0)
            .with_name("Status")
            .with_options(options)
    }

    /// PV input power, 32-bit at input 1, 0.1 W.
    pub fn pv_power() -> RegisterDescriptor {
        RegisterDescriptor::input("pv_power", 1)
            .with_name("PV Power")
            .with_count(2)
            .with_scale(0.1)
            .with_unit("W")
    }

    /// PV1 voltage at input 3, 0.1 V.
    pub fn pv1_voltage() -> RegisterDescriptor {
        RegisterDescriptor::input("pv1_voltage", 3)
            .with_name("PV1 Voltage")
            .with_scale(0.1)
            .with_unit("V")
    }

    /// Inverter temperature, signed, input 93, 0.1 °C.
    pub fn temperature() -> RegisterDescriptor {
        RegisterDescriptor::input("temperature", 93)
            .with_name("Temperature")
            .with_scale(0.1)
            .with_signed(true)
            .with_unit("°C")
    }

    /// Active power rate setting, holding 3, percent.
    pub fn active_power_rate() -> RegisterDescriptor {
        RegisterDescriptor::holding("active_power_rate", 3).with_name("Active Power Rate")
    }

    /// Export limit, holding 123, 0.1 %.
    pub fn export_limit() -> RegisterDescriptor {
        RegisterDescriptor::holding("export_limit", 123)
            .with_name("Export Limit")
            .with_scale(0.1)
    }

    /// A small telemetry set with two input windows and one holding window.
    pub fn inverter() -> Vec<RegisterDescriptor> {
        vec![
            Self::status(),
            Self::pv_power(),
            Self::pv1_voltage(),
            Self::temperature(),
            Self::active_power_rate(),
        ]
    }
}

// =============================================================================
// Control Fixtures
// =============================================================================

/// Fixture providing control descriptors with readbacks resolved.
pub struct ControlFixtures;

impl ControlFixtures {
    /// Enable switch on holding 0 (1 = on, 0 = off).
    pub fn enable() -> ControlDescriptor {
        ControlDescriptor::new(ControlKind::Switch, "enable", 0).with_name("Inverter Enable")
    }

    /// Priority mode select on holding 1044.
    pub fn priority() -> ControlDescriptor {
        ControlDescriptor::new(ControlKind::Select, "priority", 1044)
            .with_name("Priority Mode")
            .with_options(vec![
                SelectOption::new("Load First", 0),
                SelectOption::new("Battery First", 1),
                SelectOption::new("Grid First", 2),
            ])
    }

    /// AC charge flag, bit 16 of the 32-bit value at holding 3048.
    pub fn ac_charge() -> ControlDescriptor {
        ControlDescriptor::new(ControlKind::Select32, "ac_charge", 3048)
            .with_name("AC Charge")
            .with_bitfield(0x0001_0000, 16)
            .with_word_order(WordOrder::HighLow)
            .with_options(vec![
                SelectOption::new("Disabled", 0),
                SelectOption::new("Enabled", 1),
            ])
    }

    /// Export limit number on holding 123, written in 0.1 % steps.
    pub fn export_limit() -> ControlDescriptor {
        ControlDescriptor::new(ControlKind::Number, "export_limit_rate", 123)
            .with_name("Export Limit Rate")
            .with_range(0.0, 100.0, 0.1)
            .with_factors(0.1, 10.0)
    }

    /// Charge power limit, 32-bit number at holding 3020.
    pub fn charge_power() -> ControlDescriptor {
        ControlDescriptor::new(ControlKind::Number32, "charge_power", 3020)
            .with_name("Charge Power")
            .with_range(0.0, 10_000.0, 1.0)
    }

    /// All controls above.
    pub fn all() -> Vec<ControlDescriptor> {
        vec![
            Self::enable(),
            Self::priority(),
            Self::ac_charge(),
            Self::export_limit(),
            Self::charge_power(),
        ]
    }
}

// =============================================================================
// Document Fixtures
// =============================================================================

/// Fixture providing config and mapping documents.
pub struct DocumentFixtures;

impl DocumentFixtures {
    /// Minimal gateway config pointing at `mapping_path`.
    pub fn gateway_yaml(mapping_path: &str) -> String {
        format!(
            r#"
connection:
  host: 192.168.1.50
  port: 502
  unit_id: 1
  transport: tcp
polling:
  scan_interval: 15s
  failure_backoff_max: 2m
mapping:
  path: "{mapping_path}"
logging:
  level: debug
"#
        )
    }

    /// Mapping with three sensors and two controls.
    pub fn mapping_yaml() -> &'static str {
        r#"
sensors:
  - name: PV1 Voltage
    unique_id: pv1_voltage
    address: 3
    scale: 0.1
    unit_of_measurement: V
  - name: Energy Total
    address: 55
    count: 2
    scale: 0.1
  - name: Temperature
    address: 93
    scale: 0.1
    signed: true
controls:
  - type: switch
    name: Inverter Enable
    unique_id: enable
    address: 0
  - type: select32
    name: AC Charge
    base_address: 3048
    mask: "0x00010000"
    shift: 16
    options:
      - { label: Disabled, value: 0 }
      - { label: Enabled, value: 1 }
"#
    }
}
