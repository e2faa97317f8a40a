// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Register mapping files.
//!
//! A mapping file lists `sensors` (polled registers) and `controls`
//! (write-capable entities). Loading never fails on I/O: a missing file
//! falls back to the built-in map, an unparseable one yields an empty
//! mapping. Normalization errors (duplicate ids, invalid entries) are
//! returned to the caller.
//!
//! ```text
//! path ──► resolve ──► MappingFile ──► normalize ──► RegisterMapping
//!           │                            ├─ default unique ids
//!           ├─ "" / EMBEDDED → built-in  ├─ readback injection
//!           ├─ missing → built-in        └─ duplicate check
//!           └─ parse error → empty
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use growatt_modbus::{
    inject_readbacks, ControlDescriptor, ControlKind, ControlTarget, RegisterDescriptor,
    RegisterType, SelectOption, WordOrder,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::schema::EMBEDDED_MAPPING;

/// The built-in register map.
pub const EMBEDDED_MAP: &str = include_str!("../assets/map.yaml");

// =============================================================================
// File model
// =============================================================================

/// Raw contents of a mapping file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MappingFile {
    /// Polled registers.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub sensors: Vec<SensorEntry>,

    /// Write-capable entities.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub controls: Vec<ControlEntry>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

impl MappingFile {
    /// Parses YAML. An empty document is an empty mapping.
    pub fn parse(yaml: &str) -> ConfigResult<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(|e| {
            let line = e.location().map(|l| l.line());
            ConfigError::Parse {
                path: PathBuf::from("<mapping>"),
                message: e.to_string(),
                line,
            }
        })
    }

    /// Reads and parses a file.
    pub fn read(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        Self::parse(&content).map_err(|e| match e {
            ConfigError::Parse { message, line, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                message,
                line,
            },
            other => other,
        })
    }
}

/// One `sensors` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorEntry {
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Unique id; defaults to `s_{address}`.
    #[serde(default)]
    pub unique_id: Option<String>,
    /// Register class.
    #[serde(default)]
    pub register_type: RegisterType,
    /// Register address.
    pub address: u16,
    /// Word count (1 or 2).
    #[serde(default = "default_count")]
    pub count: u8,
    /// Multiplier applied to the raw value.
    #[serde(default = "default_factor")]
    pub scale: f64,
    /// Two's complement decoding.
    #[serde(default)]
    pub signed: bool,
    /// Enumeration labels keyed by raw value.
    #[serde(default)]
    pub options: Option<BTreeMap<i64, String>>,
    /// Unit passthrough.
    #[serde(default)]
    pub unit_of_measurement: Option<String>,
    /// Device class passthrough.
    #[serde(default)]
    pub device_class: Option<String>,
    /// State class passthrough.
    #[serde(default)]
    pub state_class: Option<String>,
}

/// One `controls` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlEntry {
    /// Control kind.
    #[serde(rename = "type")]
    pub kind: ControlKind,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Unique id; defaults to `{type}_{address}`.
    #[serde(default)]
    pub unique_id: Option<String>,
    /// Target address.
    #[serde(default)]
    pub address: Option<u16>,
    /// Base address of a 32-bit pair.
    #[serde(default)]
    pub base_address: Option<u16>,
    /// `holding` or `coil`.
    #[serde(default)]
    pub register_type: ControlTarget,
    /// Readback register id.
    #[serde(default)]
    pub read_unique_id: Option<String>,
    /// `false` disables readback injection.
    #[serde(default = "default_true")]
    pub readback: bool,
    /// Raw-to-control factor.
    #[serde(default = "default_factor")]
    pub read_factor: f64,
    /// Control-to-raw factor.
    #[serde(default = "default_factor")]
    pub write_factor: f64,
    /// Switch on value.
    #[serde(default = "default_on")]
    pub on_value: i64,
    /// Switch off value.
    #[serde(default)]
    pub off_value: i64,
    /// Select labels.
    #[serde(default)]
    pub options: Vec<SelectOption>,
    /// Bitfield mask, integer or radix-prefixed string.
    #[serde(default)]
    pub mask: Option<MaskValue>,
    /// Bitfield shift.
    #[serde(default)]
    pub shift: u32,
    /// Word order of 32-bit kinds.
    #[serde(default)]
    pub word_order: WordOrder,
    /// Number lower bound.
    #[serde(default)]
    pub min: Option<f64>,
    /// Number upper bound.
    #[serde(default)]
    pub max: Option<f64>,
    /// Number step.
    #[serde(default = "default_factor")]
    pub step: f64,
}

fn default_count() -> u8 {
    1
}

fn default_factor() -> f64 {
    1.0
}

fn default_on() -> i64 {
    1
}

fn default_true() -> bool {
    true
}

/// A bitfield mask as written in a mapping file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaskValue {
    /// Plain integer.
    Int(u64),
    /// `0x`, `0o`, `0b` prefixed or decimal string.
    Text(String),
}

impl MaskValue {
    /// Resolves the mask to 32 bits.
    pub fn resolve(&self) -> Result<u32, String> {
        let value = match self {
            MaskValue::Int(v) => *v,
            MaskValue::Text(s) => parse_radix(s)?,
        };
        u32::try_from(value).map_err(|_| format!("mask {value:#x} exceeds 32 bits"))
    }
}

fn parse_radix(text: &str) -> Result<u64, String> {
    let s = text.trim().replace('_', "");
    let lower = s.to_ascii_lowercase();
    let (digits, radix) = if let Some(d) = lower.strip_prefix("0x") {
        (d, 16)
    } else if let Some(d) = lower.strip_prefix("0o") {
        (d, 8)
    } else if let Some(d) = lower.strip_prefix("0b") {
        (d, 2)
    } else {
        (lower.as_str(), 10)
    };
    u64::from_str_radix(digits, radix).map_err(|e| format!("invalid mask '{text}': {e}"))
}

// =============================================================================
// Source resolution
// =============================================================================

/// Where a mapping came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingSource {
    /// The built-in map was requested.
    Embedded,
    /// A mapping file.
    File(PathBuf),
    /// The requested file does not exist; the built-in map was used.
    EmbeddedFallback {
        /// The missing path.
        requested: PathBuf,
    },
    /// The file could not be parsed; the mapping is empty.
    Unreadable {
        /// The failing path.
        path: PathBuf,
        /// Parse or read error.
        error: String,
    },
}

impl fmt::Display for MappingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingSource::Embedded => f.write_str("embedded"),
            MappingSource::File(path) => write!(f, "{}", path.display()),
            MappingSource::EmbeddedFallback { requested } => {
                write!(f, "embedded (fallback, {} not found)", requested.display())
            }
            MappingSource::Unreadable { path, .. } => {
                write!(f, "{} (unreadable, empty mapping)", path.display())
            }
        }
    }
}

/// Resolves a mapping path to its contents. Never fails.
pub fn resolve_mapping(path: &str) -> (MappingSource, MappingFile) {
    let trimmed = path.trim();
    let (source, parsed) = if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(EMBEDDED_MAPPING)
    {
        (MappingSource::Embedded, MappingFile::parse(EMBEDDED_MAP))
    } else {
        let requested = PathBuf::from(trimmed);
        if requested.exists() {
            let parsed = MappingFile::read(&requested);
            (MappingSource::File(requested), parsed)
        } else {
            warn!(
                path = %requested.display(),
                "Mapping not found, falling back to embedded"
            );
            (
                MappingSource::EmbeddedFallback { requested },
                MappingFile::parse(EMBEDDED_MAP),
            )
        }
    };

    match parsed {
        Ok(file) => {
            info!(
                source = %source,
                sensors = file.sensors.len(),
                controls = file.controls.len(),
                "Mapping loaded"
            );
            (source, file)
        }
        Err(e) => {
            let path = match &source {
                MappingSource::File(p) => p.clone(),
                _ => PathBuf::from(EMBEDDED_MAPPING),
            };
            error!(path = %path.display(), error = %e, "Failed to read mapping");
            (
                MappingSource::Unreadable {
                    path,
                    error: e.to_string(),
                },
                MappingFile::default(),
            )
        }
    }
}

// =============================================================================
// Normalization
// =============================================================================

/// A normalized mapping ready for the coordinator.
#[derive(Debug, Clone)]
pub struct RegisterMapping {
    /// Where the mapping came from.
    pub source: MappingSource,
    /// Polled registers, including injected readbacks.
    pub registers: Vec<RegisterDescriptor>,
    /// Controls with their readback ids resolved.
    pub controls: Vec<ControlDescriptor>,
    /// Number of readback registers added during normalization.
    pub injected: usize,
}

impl RegisterMapping {
    /// Returns the injected readback registers.
    pub fn injected_registers(&self) -> &[RegisterDescriptor] {
        &self.registers[self.registers.len() - self.injected..]
    }
}

/// Loads and normalizes the mapping at `path`.
pub fn load_register_mapping(path: &str) -> ConfigResult<RegisterMapping> {
    let (source, file) = resolve_mapping(path);
    normalize(source, file)
}

/// Turns raw entries into descriptors.
pub fn normalize(source: MappingSource, file: MappingFile) -> ConfigResult<RegisterMapping> {
    let mut registers = file
        .sensors
        .into_iter()
        .map(sensor_descriptor)
        .collect::<ConfigResult<Vec<_>>>()?;

    let mut controls = file
        .controls
        .into_iter()
        .enumerate()
        .map(|(idx, entry)| control_descriptor(idx, entry))
        .collect::<ConfigResult<Vec<_>>>()?;

    let mut sensor_ids = HashSet::new();
    for register in &registers {
        if !sensor_ids.insert(register.unique_id.as_str()) {
            return Err(ConfigError::duplicate_unique_id(&register.unique_id));
        }
    }

    let mut control_ids = HashSet::new();
    for control in &controls {
        if !control_ids.insert(control.unique_id.as_str()) {
            return Err(ConfigError::duplicate_unique_id(&control.unique_id));
        }
    }

    let injected = inject_readbacks(&mut registers, &mut controls);

    info!(
        sensors = registers.len(),
        controls = controls.len(),
        injected,
        "Mapping normalized"
    );

    Ok(RegisterMapping {
        source,
        registers,
        controls,
        injected,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn sensor_descriptor(entry: SensorEntry) -> ConfigResult<RegisterDescriptor> {
    let unique_id =
        non_empty(entry.unique_id).unwrap_or_else(|| format!("s_{}", entry.address));
    let name = non_empty(entry.name).unwrap_or_else(|| unique_id.clone());

    let descriptor = RegisterDescriptor {
        name,
        unique_id,
        register_type: entry.register_type,
        address: entry.address,
        count: entry.count,
        scale: entry.scale,
        signed: entry.signed,
        options: entry.options,
        unit_of_measurement: entry.unit_of_measurement,
        device_class: entry.device_class,
        state_class: entry.state_class,
    };

    descriptor
        .validate()
        .map_err(|e| ConfigError::mapping(&descriptor.unique_id, e.to_string()))?;
    Ok(descriptor)
}

fn control_descriptor(idx: usize, entry: ControlEntry) -> ConfigResult<ControlDescriptor> {
    let address = if entry.kind.is_wide() {
        entry.base_address.or(entry.address)
    } else {
        entry.address.or(entry.base_address)
    };

    let entry_name = non_empty(entry.unique_id.clone())
        .unwrap_or_else(|| format!("controls[{idx}]"));
    let Some(address) = address else {
        return Err(ConfigError::mapping(entry_name, "missing address"));
    };

    if entry.register_type == ControlTarget::Coil && entry.kind != ControlKind::Switch {
        return Err(ConfigError::mapping(
            entry_name,
            format!("{} controls cannot target coils", entry.kind),
        ));
    }

    let unique_id = non_empty(entry.unique_id)
        .unwrap_or_else(|| format!("{}_{}", entry.kind, address));

    let mut control = ControlDescriptor::new(entry.kind, unique_id, address);
    if let Some(name) = non_empty(entry.name) {
        control.name = name;
    }
    control.target = entry.register_type;
    control.read_unique_id = non_empty(entry.read_unique_id);
    control.readback = entry.readback;
    control.read_factor = entry.read_factor;
    control.write_factor = entry.write_factor;
    control.on_value = entry.on_value;
    control.off_value = entry.off_value;
    control.options = entry.options;
    control.shift = entry.shift;
    control.word_order = entry.word_order;
    control.step = entry.step;
    if let Some(min) = entry.min {
        control.min = min;
    }
    if let Some(max) = entry.max {
        control.max = max;
    }
    if let Some(mask) = entry.mask {
        control.mask = mask
            .resolve()
            .map_err(|e| ConfigError::mapping(&control.unique_id, e))?;
    }

    if control.read_factor == 0.0 {
        return Err(ConfigError::mapping(&control.unique_id, "read_factor cannot be 0"));
    }
    if control.shift >= 32 {
        return Err(ConfigError::mapping(&control.unique_id, "shift must be below 32"));
    }
    if control.min > control.max {
        return Err(ConfigError::mapping(&control.unique_id, "min exceeds max"));
    }

    Ok(control)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MAP: &str = r#"
sensors:
  - name: PV1 Voltage
    register_type: input
    address: 3
    scale: 0.1
  - name: Status
    unique_id: status
    register_type: input
    address: 0
    options: {0: Waiting, 1: Normal}
controls:
  - type: switch
    name: Power
    address: 0
  - type: select32
    name: Work Mode
    base_address: 1100
    mask: "0x0000FF00"
    shift: 8
    options:
      - {label: Load First, value: 0}
      - {label: Battery First, value: 1}
  - type: switch
    name: Relay
    address: 12
    register_type: coil
"#;

    fn normalized(yaml: &str) -> ConfigResult<RegisterMapping> {
        normalize(MappingSource::Embedded, MappingFile::parse(yaml)?)
    }

    #[test]
    fn test_default_unique_ids() {
        let mapping = normalized(MAP).unwrap();
        assert_eq!(mapping.registers[0].unique_id, "s_3");
        assert_eq!(mapping.registers[1].unique_id, "status");
        assert_eq!(mapping.controls[0].unique_id, "switch_0");
        assert_eq!(mapping.controls[1].unique_id, "select32_1100");
        assert_eq!(mapping.controls[2].unique_id, "switch_12");
    }

    #[test]
    fn test_readback_injection() {
        let mapping = normalized(MAP).unwrap();
        assert_eq!(mapping.injected, 2);

        let injected: Vec<_> = mapping
            .injected_registers()
            .iter()
            .map(|r| (r.unique_id.as_str(), r.address, r.count))
            .collect();
        assert_eq!(
            injected,
            [("rb_switch_0", 0, 1), ("rb_select32_1100", 1100, 2)]
        );
        assert_eq!(mapping.controls[1].mask, 0xFF00);
        assert!(mapping.controls[2].read_unique_id.is_none());
    }

    #[test]
    fn test_mask_forms() {
        assert_eq!(MaskValue::Int(0xFF).resolve(), Ok(0xFF));
        assert_eq!(MaskValue::Text("0xFF00".into()).resolve(), Ok(0xFF00));
        assert_eq!(MaskValue::Text("0b1010".into()).resolve(), Ok(10));
        assert_eq!(MaskValue::Text("0o17".into()).resolve(), Ok(15));
        assert_eq!(MaskValue::Text("255".into()).resolve(), Ok(255));
        assert!(MaskValue::Text("0x1_0000_0000".into()).resolve().is_err());
        assert!(MaskValue::Text("zz".into()).resolve().is_err());
    }

    #[test]
    fn test_duplicate_sensor_ids() {
        let yaml = r#"
sensors:
  - {unique_id: a, address: 1}
  - {unique_id: a, address: 2}
"#;
        assert!(matches!(
            normalized(yaml),
            Err(ConfigError::DuplicateUniqueId { ref unique_id }) if unique_id == "a"
        ));
    }

    #[test]
    fn test_invalid_entries() {
        let yaml = "sensors:\n  - {address: 1, count: 3}\n";
        assert!(matches!(normalized(yaml), Err(ConfigError::Mapping { .. })));

        let yaml = "controls:\n  - {type: number, name: x}\n";
        assert!(matches!(normalized(yaml), Err(ConfigError::Mapping { .. })));

        let yaml = "controls:\n  - {type: number, address: 1, register_type: coil}\n";
        assert!(matches!(normalized(yaml), Err(ConfigError::Mapping { .. })));
    }

    #[test]
    fn test_empty_and_null_lists() {
        let mapping = normalized("").unwrap();
        assert!(mapping.registers.is_empty());

        let mapping = normalized("sensors:\ncontrols:\n").unwrap();
        assert!(mapping.controls.is_empty());
    }

    #[test]
    fn test_embedded_map_loads() {
        let mapping = load_register_mapping("EMBEDDED").unwrap();
        assert_eq!(mapping.source, MappingSource::Embedded);
        assert!(!mapping.registers.is_empty());
        assert!(!mapping.controls.is_empty());
        assert!(mapping
            .controls
            .iter()
            .all(|c| c.read_unique_id.is_some()));
    }

    #[test]
    fn test_missing_file_falls_back() {
        let (source, file) = resolve_mapping("/nonexistent/map.yaml");
        assert!(matches!(source, MappingSource::EmbeddedFallback { .. }));
        assert!(!file.sensors.is_empty());
    }

    #[test]
    fn test_unparseable_file_is_empty() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(b"sensors: [ {address: ").unwrap();

        let mapping = load_register_mapping(file.path().to_str().unwrap()).unwrap();
        assert!(matches!(mapping.source, MappingSource::Unreadable { .. }));
        assert!(mapping.registers.is_empty());
        assert!(mapping.controls.is_empty());
    }

    #[test]
    fn test_file_source() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(MAP.as_bytes()).unwrap();

        let mapping = load_register_mapping(file.path().to_str().unwrap()).unwrap();
        assert_eq!(mapping.source, MappingSource::File(file.path().to_path_buf()));
        assert_eq!(mapping.registers.len(), 4);
    }
}
