// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Write-capable controls driven through the [`Coordinator`].
//!
//! Controls never talk to the transport directly. Every write goes through
//! the coordinator's write path so the cache stays coherent, and every state
//! is derived from the cached value of the control's readback register.
//!
//! | kind       | write                                   | state                         |
//! |------------|-----------------------------------------|-------------------------------|
//! | `switch`   | `on_value` / `off_value` (or a coil)    | `round(raw / read_factor)`    |
//! | `select`   | option value                            | label of `round(raw / rf)`    |
//! | `select32` | bitfield read-modify-write, 32-bit      | label of `(raw & mask) >> s`  |
//! | `number`   | stepped, clamped, `* write_factor`      | `raw * read_factor`, stepped  |
//! | `number32` | rounded, clamped, 32-bit                | last written value            |

use std::collections::{HashMap, HashSet};
use std::fmt;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::codec;
use crate::coordinator::Coordinator;
use crate::error::{ConfigurationError, ConversionError, ModbusError, ModbusResult};
use crate::types::{ControlDescriptor, ControlKind, ControlTarget, RegisterDescriptor};

// =============================================================================
// ControlValue
// =============================================================================

/// Current state of a control.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlValue {
    /// Switch state.
    Switch(bool),
    /// Selected label.
    Option(String),
    /// Numeric value.
    Number(f64),
}

impl fmt::Display for ControlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Switch(true) => f.write_str("on"),
            Self::Switch(false) => f.write_str("off"),
            Self::Option(label) => f.write_str(label),
            Self::Number(v) => write!(f, "{v}"),
        }
    }
}

// =============================================================================
// ControlSet
// =============================================================================

/// The configured controls of one device.
#[derive(Debug)]
pub struct ControlSet {
    controls: Vec<ControlDescriptor>,
    by_unique_id: HashMap<String, usize>,
    /// Last successfully written value per control.
    written: Mutex<HashMap<String, f64>>,
}

impl ControlSet {
    /// Creates a control set. Control unique ids must be distinct.
    pub fn new(controls: Vec<ControlDescriptor>) -> ModbusResult<Self> {
        let mut by_unique_id = HashMap::with_capacity(controls.len());
        for (idx, control) in controls.iter().enumerate() {
            if by_unique_id.insert(control.unique_id.clone(), idx).is_some() {
                return Err(ModbusError::configuration(
                    ConfigurationError::DuplicateUniqueId {
                        unique_id: control.unique_id.clone(),
                    },
                ));
            }
        }

        Ok(Self {
            controls,
            by_unique_id,
            written: Mutex::new(HashMap::new()),
        })
    }

    /// Returns all controls in configuration order.
    pub fn controls(&self) -> &[ControlDescriptor] {
        &self.controls
    }

    /// Looks up a control.
    pub fn get(&self, unique_id: &str) -> Option<&ControlDescriptor> {
        self.by_unique_id
            .get(unique_id)
            .map(|&idx| &self.controls[idx])
    }

    /// Returns the number of controls.
    pub fn len(&self) -> usize {
        self.controls.len()
    }

    /// Returns `true` if there are no controls.
    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Turns a switch on or off.
    pub async fn switch(&self, coordinator: &Coordinator, unique_id: &str, on: bool) -> bool {
        let Some(control) = self.expect_kind(unique_id, &[ControlKind::Switch]) else {
            return false;
        };

        let raw = if on { control.on_value } else { control.off_value };
        let ok = match control.target {
            ControlTarget::Coil => coordinator.write_coil(control.address, raw != 0).await,
            ControlTarget::Holding => match register_word(raw) {
                Ok(word) => coordinator.write_single_register(control.address, word).await,
                Err(e) => {
                    e.log(unique_id);
                    false
                }
            },
        };

        if ok {
            self.remember(unique_id, raw as f64);
        }
        ok
    }

    /// Selects an option by label. Unknown labels are ignored.
    pub async fn select_option(
        &self,
        coordinator: &Coordinator,
        unique_id: &str,
        label: &str,
    ) -> bool {
        let Some(control) =
            self.expect_kind(unique_id, &[ControlKind::Select, ControlKind::Select32])
        else {
            return false;
        };

        let Some(option) = control.option(label) else {
            warn!(unique_id, label, "Unknown option");
            return false;
        };

        let ok = match control.kind {
            ControlKind::Select32 => {
                let Some(read_id) = control.read_unique_id.as_deref() else {
                    warn!(unique_id, "Bitfield select has no readback register");
                    return false;
                };
                coordinator
                    .write_bitfield(
                        read_id,
                        control.address,
                        control.mask,
                        control.shift,
                        option.value,
                        control.word_order,
                    )
                    .await
            }
            _ => match register_word(option.value) {
                Ok(word) => coordinator.write_single_register(control.address, word).await,
                Err(e) => {
                    e.log(unique_id);
                    false
                }
            },
        };

        if ok {
            self.remember(unique_id, option.value as f64);
        }
        ok
    }

    /// Sets a number control.
    pub async fn set_value(&self, coordinator: &Coordinator, unique_id: &str, value: f64) -> bool {
        let Some(control) =
            self.expect_kind(unique_id, &[ControlKind::Number, ControlKind::Number32])
        else {
            return false;
        };

        if !value.is_finite() {
            warn!(unique_id, value, "Rejecting non-finite value");
            return false;
        }

        let (stored, ok) = match control.kind {
            ControlKind::Number32 => {
                let v = value.round().clamp(control.min, control.max);
                let ok = coordinator
                    .write_u32(control.address, v as i64, control.word_order)
                    .await;
                (v, ok)
            }
            _ => {
                let v = step_and_clamp(control, value);
                let raw = (v * control.write_factor).round() as i64;
                let ok = match register_word(raw) {
                    Ok(word) => coordinator.write_single_register(control.address, word).await,
                    Err(e) => {
                        e.log(unique_id);
                        false
                    }
                };
                (v, ok)
            }
        };

        if ok {
            self.remember(unique_id, stored);
        }
        ok
    }

    /// Drives a control from its textual form: `on`/`off` for switches, a
    /// label for selects, a number for number controls.
    pub async fn apply(
        &self,
        coordinator: &Coordinator,
        unique_id: &str,
        input: &str,
    ) -> ModbusResult<bool> {
        let Some(control) = self.get(unique_id) else {
            return Err(ModbusError::configuration(ConfigurationError::invalid_descriptor(
                unique_id,
                "unknown control",
            )));
        };

        match control.kind {
            ControlKind::Switch => {
                let on = parse_switch(input).ok_or_else(|| {
                    ModbusError::configuration(ConfigurationError::invalid_descriptor(
                        unique_id,
                        format!("expected on or off, got '{input}'"),
                    ))
                })?;
                Ok(self.switch(coordinator, unique_id, on).await)
            }
            ControlKind::Select | ControlKind::Select32 => {
                Ok(self.select_option(coordinator, unique_id, input).await)
            }
            ControlKind::Number | ControlKind::Number32 => {
                let value: f64 = input.trim().parse().map_err(|_| {
                    ModbusError::configuration(ConfigurationError::invalid_descriptor(
                        unique_id,
                        format!("expected a number, got '{input}'"),
                    ))
                })?;
                Ok(self.set_value(coordinator, unique_id, value).await)
            }
        }
    }

    // =========================================================================
    // State
    // =========================================================================

    /// Returns the current state of a control, if known.
    pub fn state(&self, coordinator: &Coordinator, unique_id: &str) -> Option<ControlValue> {
        let control = self.get(unique_id)?;
        let raw = control
            .read_unique_id
            .as_deref()
            .and_then(|id| coordinator.value(id));

        match control.kind {
            ControlKind::Switch => {
                let raw = raw?;
                Some(ControlValue::Switch(
                    scaled_key(raw, control.read_factor)? == control.on_value,
                ))
            }
            ControlKind::Select => {
                let key = scaled_key(raw?, control.read_factor)?;
                control
                    .label_for(key)
                    .map(|label| ControlValue::Option(label.to_string()))
            }
            ControlKind::Select32 => {
                let word = codec::truncate_u32(raw?.round() as i64);
                let field = codec::extract_field(word, control.mask, control.shift);
                control
                    .label_for(i64::from(field))
                    .map(|label| ControlValue::Option(label.to_string()))
            }
            ControlKind::Number => {
                let value = match raw {
                    Some(raw) => step_and_clamp(control, raw * control.read_factor),
                    None => self.written(unique_id).unwrap_or(control.min),
                };
                Some(ControlValue::Number(value))
            }
            ControlKind::Number32 => self.written(unique_id).map(ControlValue::Number),
        }
    }

    fn expect_kind(&self, unique_id: &str, kinds: &[ControlKind]) -> Option<&ControlDescriptor> {
        match self.get(unique_id) {
            Some(control) if kinds.contains(&control.kind) => Some(control),
            Some(control) => {
                warn!(unique_id, kind = %control.kind, "Operation not supported by control kind");
                None
            }
            None => {
                warn!(unique_id, "Unknown control");
                None
            }
        }
    }

    fn remember(&self, unique_id: &str, value: f64) {
        debug!(unique_id, value, "Control written");
        self.written.lock().insert(unique_id.to_string(), value);
    }

    fn written(&self, unique_id: &str) -> Option<f64> {
        self.written.lock().get(unique_id).copied()
    }
}

fn step_and_clamp(control: &ControlDescriptor, value: f64) -> f64 {
    let step = if control.step > 0.0 { control.step } else { 1.0 };
    ((value / step).round() * step).clamp(control.min, control.max)
}

fn scaled_key(raw: f64, read_factor: f64) -> Option<i64> {
    let v = raw / read_factor;
    v.is_finite().then(|| v.round() as i64)
}

/// Converts a control value to a register word. Negative values down to
/// `i16::MIN` are written in two's complement.
fn register_word(value: i64) -> ModbusResult<u16> {
    if (i64::from(i16::MIN)..=i64::from(u16::MAX)).contains(&value) {
        Ok(value as u16)
    } else {
        Err(ModbusError::conversion(ConversionError::overflow(
            value,
            "a 16-bit register",
        )))
    }
}

fn parse_switch(input: &str) -> Option<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "1" => Some(true),
        "off" | "false" | "0" => Some(false),
        _ => None,
    }
}

// =============================================================================
// Readback injection
// =============================================================================

/// Adds a readback register for every control that needs one.
///
/// `select32` controls always resolve a readback id (`read_unique_id`, or
/// `rb_{unique_id}`) and get a 2-word holding register at their base address
/// unless the id already exists. Other holding controls without a
/// `read_unique_id` get `rb_{unique_id}` as a 1-word holding register.
/// Controls with `readback: false` are left alone.
///
/// Returns the number of registers added.
pub fn inject_readbacks(
    registers: &mut Vec<RegisterDescriptor>,
    controls: &mut [ControlDescriptor],
) -> usize {
    let mut known: HashSet<String> = registers.iter().map(|r| r.unique_id.clone()).collect();
    let before = registers.len();

    for control in controls.iter_mut() {
        if !control.readback {
            continue;
        }

        let count = match control.kind {
            ControlKind::Select32 => 2,
            _ if control.target == ControlTarget::Holding && control.read_unique_id.is_none() => 1,
            _ => continue,
        };

        let read_id = control
            .read_unique_id
            .clone()
            .unwrap_or_else(|| format!("rb_{}", control.unique_id));

        if known.insert(read_id.clone()) {
            debug!(
                unique_id = %read_id,
                address = control.address,
                count,
                "Injecting readback register"
            );
            registers.push(
                RegisterDescriptor::holding(read_id.clone(), control.address)
                    .with_name(format!("RB {}", control.name))
                    .with_count(count),
            );
        }
        control.read_unique_id = Some(read_id);
    }

    let added = registers.len() - before;
    if added > 0 {
        info!(added, "Readback registers injected");
    }
    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SelectOption;

    fn work_mode() -> ControlDescriptor {
        ControlDescriptor::new(ControlKind::Select32, "work_mode", 1100)
            .with_bitfield(0x0000_FF00, 8)
            .with_options(vec![
                SelectOption::new("Load First", 0),
                SelectOption::new("Battery First", 1),
                SelectOption::new("Grid First", 2),
            ])
    }

    #[test]
    fn test_inject_select32_two_words() {
        let mut registers = Vec::new();
        let mut controls = vec![work_mode()];

        assert_eq!(inject_readbacks(&mut registers, &mut controls), 1);
        assert_eq!(registers[0].unique_id, "rb_work_mode");
        assert_eq!(registers[0].count, 2);
        assert_eq!(registers[0].address, 1100);
        assert!(registers[0].is_holding());
        assert_eq!(registers[0].name, "RB work_mode");
        assert_eq!(controls[0].read_unique_id.as_deref(), Some("rb_work_mode"));
    }

    #[test]
    fn test_inject_keeps_existing_readback() {
        let mut registers = vec![RegisterDescriptor::holding("mode_raw", 1100).with_count(2)];
        let mut controls = vec![work_mode().with_read_unique_id("mode_raw")];

        assert_eq!(inject_readbacks(&mut registers, &mut controls), 0);
        assert_eq!(registers.len(), 1);
        assert_eq!(controls[0].read_unique_id.as_deref(), Some("mode_raw"));
    }

    #[test]
    fn test_inject_address_zero_and_opt_out() {
        let mut registers = Vec::new();
        let mut controls = vec![
            ControlDescriptor::new(ControlKind::Switch, "power", 0),
            ControlDescriptor::new(ControlKind::Number, "export_limit", 3),
            ControlDescriptor {
                readback: false,
                ..ControlDescriptor::new(ControlKind::Number, "no_rb", 4)
            },
            ControlDescriptor::new(ControlKind::Switch, "relay", 7).with_target(ControlTarget::Coil),
        ];

        assert_eq!(inject_readbacks(&mut registers, &mut controls), 2);
        let ids: Vec<_> = registers.iter().map(|r| r.unique_id.as_str()).collect();
        assert_eq!(ids, ["rb_power", "rb_export_limit"]);
        assert!(registers.iter().all(|r| r.count == 1));
        assert!(controls[2].read_unique_id.is_none());
        assert!(controls[3].read_unique_id.is_none());
    }

    #[test]
    fn test_inject_is_idempotent() {
        let mut registers = Vec::new();
        let mut controls = vec![ControlDescriptor::new(ControlKind::Select, "mode", 10)];

        inject_readbacks(&mut registers, &mut controls);
        assert_eq!(inject_readbacks(&mut registers, &mut controls), 0);
        assert_eq!(registers.len(), 1);
    }

    #[test]
    fn test_duplicate_controls_rejected() {
        let err = ControlSet::new(vec![
            ControlDescriptor::new(ControlKind::Switch, "a", 1),
            ControlDescriptor::new(ControlKind::Number, "a", 2),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            ModbusError::Configuration(ConfigurationError::DuplicateUniqueId { .. })
        ));
    }

    #[test]
    fn test_step_and_clamp() {
        let control = ControlDescriptor::new(ControlKind::Number, "n", 1).with_range(0.0, 100.0, 5.0);
        assert_eq!(step_and_clamp(&control, 12.4), 10.0);
        assert_eq!(step_and_clamp(&control, 12.6), 15.0);
        assert_eq!(step_and_clamp(&control, 180.0), 100.0);
        assert_eq!(step_and_clamp(&control, -3.0), 0.0);
    }

    #[test]
    fn test_register_word() {
        assert_eq!(register_word(65535).unwrap(), 0xFFFF);
        assert_eq!(register_word(-1).unwrap(), 0xFFFF);

        let err = register_word(65536).unwrap_err();
        assert_eq!(err.category(), "conversion");
        assert_eq!(err.to_string(), "Value 65536 does not fit in a 16-bit register");
        assert!(register_word(-40000).is_err());
    }

    #[test]
    fn test_parse_switch() {
        assert_eq!(parse_switch("ON"), Some(true));
        assert_eq!(parse_switch(" off "), Some(false));
        assert_eq!(parse_switch("maybe"), None);
    }

    #[test]
    fn test_control_value_display() {
        assert_eq!(ControlValue::Switch(true).to_string(), "on");
        assert_eq!(ControlValue::Option("Grid First".into()).to_string(), "Grid First");
        assert_eq!(ControlValue::Number(42.5).to_string(), "42.5");
    }
}
