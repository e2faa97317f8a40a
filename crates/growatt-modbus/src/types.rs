// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Descriptor and connection types.
//!
//! - **RegisterDescriptor**: one readable register (16 or 32 bit) with decode rules
//! - **ControlDescriptor**: one write-capable entity and its readback binding
//! - **ConnectionConfig**: TCP / RTU-over-TCP session settings with builder
//! - **SerialSettings**: framing parameters for RTU tunneled over TCP
//!
//! # Examples
//!
//! ```
//! use growatt_modbus::types::{ConnectionConfig, RegisterDescriptor, TransportKind};
//!
//! let pv1 = RegisterDescriptor::input("pv1_voltage", 3)
//!     .with_name("PV1 Voltage")
//!     .with_scale(0.1);
//! assert_eq!(pv1.end_address(), 4);
//!
//! let config = ConnectionConfig::builder()
//!     .host("192.168.1.50")
//!     .unit_id(1)
//!     .transport(TransportKind::Tcp)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.socket_addr(), "192.168.1.50:502");
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, ModbusError};

/// Published values keyed by register unique id. `None` marks an absent value.
pub type Snapshot = BTreeMap<String, Option<f64>>;

// =============================================================================
// RegisterType
// =============================================================================

/// Register class polled by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegisterType {
    /// Input register (read-only telemetry, function code 4). Read every cycle.
    #[default]
    Input,

    /// Holding register (read/write configuration, function code 3). Read once.
    Holding,
}

impl RegisterType {
    /// Returns the read function code.
    pub const fn read_function_code(&self) -> u8 {
        match self {
            Self::Input => 0x04,
            Self::Holding => 0x03,
        }
    }

    /// Returns the lowercase name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Holding => "holding",
        }
    }
}

impl fmt::Display for RegisterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegisterType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "input" | "ir" => Ok(Self::Input),
            "holding" | "hr" => Ok(Self::Holding),
            other => Err(format!("Unknown register type: {other}")),
        }
    }
}

// =============================================================================
// WordOrder
// =============================================================================

/// Significance order of the two words of a 32-bit value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WordOrder {
    /// High word at the lower address.
    #[default]
    HighLow,

    /// Low word at the lower address.
    LowHigh,
}

impl WordOrder {
    /// Returns the configuration name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::HighLow => "high_low",
            Self::LowHigh => "low_high",
        }
    }
}

impl fmt::Display for WordOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WordOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "high_low" | "big" | "abcd" => Ok(Self::HighLow),
            "low_high" | "little" | "cdab" => Ok(Self::LowHigh),
            other => Err(format!("Unknown word order: {other}")),
        }
    }
}

// =============================================================================
// RegisterDescriptor
// =============================================================================

/// One readable register and its decode rules.
///
/// Built once from the normalized mapping and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterDescriptor {
    /// Display name.
    pub name: String,

    /// Unique id within a coordinator.
    pub unique_id: String,

    /// Register class.
    #[serde(default)]
    pub register_type: RegisterType,

    /// Device-native address before offset correction.
    pub address: u16,

    /// Word width: 1 (16-bit) or 2 (32-bit).
    #[serde(default = "default_count")]
    pub count: u8,

    /// Multiplier applied after raw integer assembly.
    #[serde(default = "default_scale")]
    pub scale: f64,

    /// Two's-complement interpretation.
    #[serde(default)]
    pub signed: bool,

    /// Enum labels keyed by decoded integer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<BTreeMap<i64, String>>,

    /// Unit of measurement, passed through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<String>,

    /// Device class, passed through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_class: Option<String>,

    /// State class, passed through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_class: Option<String>,
}

fn default_count() -> u8 {
    1
}

fn default_scale() -> f64 {
    1.0
}

impl RegisterDescriptor {
    /// Creates a 16-bit descriptor with defaults.
    pub fn new(unique_id: impl Into<String>, register_type: RegisterType, address: u16) -> Self {
        let unique_id = unique_id.into();
        Self {
            name: unique_id.clone(),
            unique_id,
            register_type,
            address,
            count: default_count(),
            scale: default_scale(),
            signed: false,
            options: None,
            unit_of_measurement: None,
            device_class: None,
            state_class: None,
        }
    }

    /// Creates an input register descriptor.
    pub fn input(unique_id: impl Into<String>, address: u16) -> Self {
        Self::new(unique_id, RegisterType::Input, address)
    }

    /// Creates a holding register descriptor.
    pub fn holding(unique_id: impl Into<String>, address: u16) -> Self {
        Self::new(unique_id, RegisterType::Holding, address)
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the word width.
    pub fn with_count(mut self, count: u8) -> Self {
        self.count = count;
        self
    }

    /// Sets the scale factor.
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Sets two's-complement decoding.
    pub fn with_signed(mut self, signed: bool) -> Self {
        self.signed = signed;
        self
    }

    /// Sets the enum labels.
    pub fn with_options(mut self, options: BTreeMap<i64, String>) -> Self {
        self.options = Some(options);
        self
    }

    /// Sets the unit of measurement.
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit_of_measurement = Some(unit.into());
        self
    }

    /// Returns the first address after this register (exclusive end).
    #[inline]
    pub fn end_address(&self) -> u32 {
        u32::from(self.address) + u32::from(self.count)
    }

    /// Returns `true` for holding registers.
    #[inline]
    pub fn is_holding(&self) -> bool {
        self.register_type == RegisterType::Holding
    }

    /// Returns `true` for 32-bit registers.
    #[inline]
    pub fn is_wide(&self) -> bool {
        self.count == 2
    }

    /// Renders a decoded value for display, resolving enum labels.
    pub fn display_value(&self, value: Option<f64>) -> Option<String> {
        let value = value?;
        match &self.options {
            Some(options) => {
                let key = value.round() as i64;
                Some(options.get(&key).cloned().unwrap_or_else(|| key.to_string()))
            }
            None => Some(value.to_string()),
        }
    }

    /// Validates this descriptor.
    pub fn validate(&self) -> Result<(), ModbusError> {
        if self.unique_id.trim().is_empty() {
            return Err(ModbusError::configuration(ConfigurationError::missing_field(
                "unique_id",
            )));
        }

        if !matches!(self.count, 1 | 2) {
            return Err(ModbusError::configuration(
                ConfigurationError::invalid_descriptor(
                    &self.unique_id,
                    format!("count must be 1 or 2, got {}", self.count),
                ),
            ));
        }

        if self.end_address() > 0x1_0000 {
            return Err(ModbusError::configuration(
                ConfigurationError::invalid_descriptor(
                    &self.unique_id,
                    format!("register at {} with count {} exceeds address space", self.address, self.count),
                ),
            ));
        }

        if !self.scale.is_finite() {
            return Err(ModbusError::configuration(
                ConfigurationError::invalid_descriptor(&self.unique_id, "scale must be finite"),
            ));
        }

        Ok(())
    }
}

impl fmt::Display for RegisterDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}@{} x{} scale={}{}]",
            self.unique_id,
            self.register_type,
            self.address,
            self.count,
            self.scale,
            if self.signed { " signed" } else { "" }
        )
    }
}

// =============================================================================
// ControlDescriptor
// =============================================================================

/// Kind of write-capable entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlKind {
    /// On/off value.
    Switch,
    /// Enumerated 16-bit value.
    Select,
    /// Enumerated bitfield inside a 32-bit register pair.
    Select32,
    /// Stepped 16-bit number.
    Number,
    /// 32-bit number.
    Number32,
}

impl ControlKind {
    /// Returns the configuration name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Switch => "switch",
            Self::Select => "select",
            Self::Select32 => "select32",
            Self::Number => "number",
            Self::Number32 => "number32",
        }
    }

    /// Returns `true` for kinds written with a 32-bit register pair.
    pub const fn is_wide(&self) -> bool {
        matches!(self, Self::Select32 | Self::Number32)
    }
}

impl fmt::Display for ControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Register class a control writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlTarget {
    /// Holding register.
    #[default]
    Holding,
    /// Coil (switch only).
    Coil,
}

/// One label of a select control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    /// Display label.
    pub label: String,
    /// Raw value written for this label.
    pub value: i64,
}

impl SelectOption {
    /// Creates an option.
    pub fn new(label: impl Into<String>, value: i64) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

/// One write-capable entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlDescriptor {
    /// Control kind.
    pub kind: ControlKind,
    /// Display name.
    pub name: String,
    /// Unique id.
    pub unique_id: String,
    /// Target address (`base_address` for 32-bit kinds).
    pub address: u16,
    /// Register class written to.
    pub target: ControlTarget,
    /// Register whose cached value reflects this control's state.
    pub read_unique_id: Option<String>,
    /// Whether a readback register may be injected.
    pub readback: bool,
    /// Raw-to-control factor.
    pub read_factor: f64,
    /// Control-to-raw factor.
    pub write_factor: f64,
    /// Word order for 32-bit kinds.
    pub word_order: WordOrder,
    /// Switch on value.
    pub on_value: i64,
    /// Switch off value.
    pub off_value: i64,
    /// Select labels.
    pub options: Vec<SelectOption>,
    /// Bitfield mask (select32).
    pub mask: u32,
    /// Bitfield shift (select32).
    pub shift: u32,
    /// Number lower bound.
    pub min: f64,
    /// Number upper bound.
    pub max: f64,
    /// Number step.
    pub step: f64,
}

impl ControlDescriptor {
    /// Creates a control with the defaults of its kind.
    pub fn new(kind: ControlKind, unique_id: impl Into<String>, address: u16) -> Self {
        let unique_id = unique_id.into();
        let max = match kind {
            ControlKind::Number32 => f64::from(u32::MAX),
            _ => 100.0,
        };
        Self {
            kind,
            name: unique_id.clone(),
            unique_id,
            address,
            target: ControlTarget::Holding,
            read_unique_id: None,
            readback: true,
            read_factor: 1.0,
            write_factor: 1.0,
            word_order: WordOrder::HighLow,
            on_value: 1,
            off_value: 0,
            options: Vec::new(),
            mask: u32::MAX,
            shift: 0,
            min: 0.0,
            max,
            step: 1.0,
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the readback register id.
    pub fn with_read_unique_id(mut self, id: impl Into<String>) -> Self {
        self.read_unique_id = Some(id.into());
        self
    }

    /// Sets the select labels.
    pub fn with_options(mut self, options: Vec<SelectOption>) -> Self {
        self.options = options;
        self
    }

    /// Sets the bitfield mask and shift.
    pub fn with_bitfield(mut self, mask: u32, shift: u32) -> Self {
        self.mask = mask;
        self.shift = shift;
        self
    }

    /// Sets the number range.
    pub fn with_range(mut self, min: f64, max: f64, step: f64) -> Self {
        self.min = min;
        self.max = max;
        self.step = step;
        self
    }

    /// Sets the read and write factors.
    pub fn with_factors(mut self, read_factor: f64, write_factor: f64) -> Self {
        self.read_factor = read_factor;
        self.write_factor = write_factor;
        self
    }

    /// Sets the target register class.
    pub fn with_target(mut self, target: ControlTarget) -> Self {
        self.target = target;
        self
    }

    /// Sets the word order.
    pub fn with_word_order(mut self, order: WordOrder) -> Self {
        self.word_order = order;
        self
    }

    /// Finds an option by label.
    pub fn option(&self, label: &str) -> Option<&SelectOption> {
        self.options.iter().find(|o| o.label == label)
    }

    /// Finds the label for a raw value.
    pub fn label_for(&self, value: i64) -> Option<&str> {
        self.options
            .iter()
            .find(|o| o.value == value)
            .map(|o| o.label.as_str())
    }
}

// =============================================================================
// TransportKind
// =============================================================================

/// Transport used to reach the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TransportKind {
    /// Modbus TCP.
    #[default]
    #[serde(rename = "tcp")]
    Tcp,

    /// Modbus RTU frames tunneled over a TCP socket.
    #[serde(rename = "rtutcp", alias = "rtu_tcp", alias = "rtuovertcp")]
    RtuTcp,
}

impl TransportKind {
    /// Returns the configuration name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::RtuTcp => "rtutcp",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tcp" => Ok(Self::Tcp),
            "rtutcp" | "rtu_tcp" | "rtuovertcp" => Ok(Self::RtuTcp),
            other => Err(format!("Unknown transport: {other} (expected tcp or rtutcp)")),
        }
    }
}

// =============================================================================
// Serial Settings
// =============================================================================

/// Data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DataBits {
    /// 5 data bits.
    Five,
    /// 6 data bits.
    Six,
    /// 7 data bits.
    Seven,
    /// 8 data bits (default).
    #[default]
    Eight,
}

impl DataBits {
    /// Returns the number of bits.
    pub const fn bits(&self) -> u8 {
        match self {
            Self::Five => 5,
            Self::Six => 6,
            Self::Seven => 7,
            Self::Eight => 8,
        }
    }
}

impl TryFrom<u8> for DataBits {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            5 => Ok(Self::Five),
            6 => Ok(Self::Six),
            7 => Ok(Self::Seven),
            8 => Ok(Self::Eight),
            other => Err(format!("bytesize must be 5..=8, got {other}")),
        }
    }
}

impl From<DataBits> for u8 {
    fn from(bits: DataBits) -> Self {
        bits.bits()
    }
}

impl fmt::Display for DataBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

/// Parity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Parity {
    /// No parity (default).
    #[default]
    #[serde(rename = "N", alias = "n", alias = "none")]
    None,
    /// Even parity.
    #[serde(rename = "E", alias = "e", alias = "even")]
    Even,
    /// Odd parity.
    #[serde(rename = "O", alias = "o", alias = "odd")]
    Odd,
}

impl Parity {
    /// Returns the number of parity bits.
    pub const fn bits(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::Odd | Self::Even => 1,
        }
    }

    /// Returns the short character representation.
    pub const fn char(&self) -> char {
        match self {
            Self::None => 'N',
            Self::Even => 'E',
            Self::Odd => 'O',
        }
    }
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.char())
    }
}

/// Stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum StopBits {
    /// 1 stop bit (default).
    #[default]
    One,
    /// 2 stop bits.
    Two,
}

impl StopBits {
    /// Returns the number of stop bits.
    pub const fn bits(&self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }
}

impl TryFrom<u8> for StopBits {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            other => Err(format!("stopbits must be 1 or 2, got {other}")),
        }
    }
}

impl From<StopBits> for u8 {
    fn from(bits: StopBits) -> Self {
        bits.bits()
    }
}

impl fmt::Display for StopBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

/// Serial framing of the device behind an RTU-over-TCP gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialSettings {
    /// Baud rate (default: 9600).
    #[serde(default = "default_baudrate")]
    pub baudrate: u32,

    /// Data bits (default: 8).
    #[serde(default)]
    pub bytesize: DataBits,

    /// Parity (default: N).
    #[serde(default)]
    pub parity: Parity,

    /// Stop bits (default: 1).
    #[serde(default)]
    pub stopbits: StopBits,
}

fn default_baudrate() -> u32 {
    9600
}

impl SerialSettings {
    /// Returns the inter-frame silence for these settings.
    ///
    /// Modbus RTU frames are separated by 3.5 character times. At 9600 baud
    /// with 10 bits per character (8N1): 3.5 * 10 / 9600 ≈ 3.6ms.
    pub fn inter_frame_delay(&self) -> Duration {
        let bits_per_char =
            1 + self.bytesize.bits() + self.parity.bits() + self.stopbits.bits();

        let delay_us =
            (3.5 * f64::from(bits_per_char) / f64::from(self.baudrate.max(1)) * 1_000_000.0) as u64;

        // Minimum 1ms to account for OS scheduling
        Duration::from_micros(delay_us.max(1000))
    }
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baudrate: default_baudrate(),
            bytesize: DataBits::default(),
            parity: Parity::default(),
            stopbits: StopBits::default(),
        }
    }
}

impl fmt::Display for SerialSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}{}{}",
            self.baudrate, self.bytesize, self.parity, self.stopbits
        )
    }
}

// =============================================================================
// ConnectionConfig
// =============================================================================

/// Session settings for one device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Target host address.
    pub host: String,

    /// Target port (default: 502).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Unit ID / station address (default: 1).
    #[serde(default = "default_unit_id")]
    pub unit_id: u8,

    /// Transport kind (default: tcp).
    #[serde(default)]
    pub transport: TransportKind,

    /// Subtracted from every external address before it reaches the device.
    #[serde(default)]
    pub address_offset: i32,

    /// Connection timeout.
    #[serde(default = "default_connect_timeout")]
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Read/write operation timeout.
    #[serde(default = "default_operation_timeout")]
    #[serde(with = "humantime_serde")]
    pub operation_timeout: Duration,

    /// Serial framing for `rtutcp`.
    #[serde(default)]
    pub serial: SerialSettings,
}

fn default_port() -> u16 {
    502
}

fn default_unit_id() -> u8 {
    1
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_operation_timeout() -> Duration {
    Duration::from_secs(3)
}

impl ConnectionConfig {
    /// Creates a new builder.
    pub fn builder() -> ConnectionConfigBuilder {
        ConnectionConfigBuilder::default()
    }

    /// Creates a TCP configuration with just a host.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Default::default()
        }
    }

    /// Returns the socket address string.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns a short description for logs.
    pub fn describe(&self) -> String {
        match self.transport {
            TransportKind::Tcp => format!("tcp://{} unit {}", self.socket_addr(), self.unit_id),
            TransportKind::RtuTcp => format!(
                "rtutcp://{} unit {} ({})",
                self.socket_addr(),
                self.unit_id,
                self.serial
            ),
        }
    }

    /// Validates this configuration.
    pub fn validate(&self) -> Result<(), ModbusError> {
        if self.host.trim().is_empty() {
            return Err(ModbusError::configuration(ConfigurationError::missing_field(
                "host",
            )));
        }

        if self.port == 0 {
            return Err(ModbusError::configuration(ConfigurationError::InvalidPort {
                port: 0,
                reason: "Port must be greater than 0".to_string(),
            }));
        }

        if !(1..=247).contains(&self.unit_id) {
            return Err(ModbusError::configuration(
                ConfigurationError::invalid_unit_id(self.unit_id),
            ));
        }

        for (name, duration) in [
            ("Connect timeout", self.connect_timeout),
            ("Operation timeout", self.operation_timeout),
        ] {
            if duration.is_zero() {
                return Err(ModbusError::configuration(ConfigurationError::InvalidTimeout {
                    duration,
                    reason: format!("{name} must be greater than 0"),
                }));
            }
        }

        if self.serial.baudrate == 0 {
            return Err(ModbusError::configuration(
                ConfigurationError::InvalidSerialSetting {
                    field: "baudrate",
                    value: "0".to_string(),
                },
            ));
        }

        Ok(())
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            unit_id: default_unit_id(),
            transport: TransportKind::default(),
            address_offset: 0,
            connect_timeout: default_connect_timeout(),
            operation_timeout: default_operation_timeout(),
            serial: SerialSettings::default(),
        }
    }
}

// =============================================================================
// ConnectionConfigBuilder
// =============================================================================

/// Builder for ConnectionConfig.
#[derive(Debug, Default)]
pub struct ConnectionConfigBuilder {
    host: Option<String>,
    port: Option<u16>,
    unit_id: Option<u8>,
    transport: Option<TransportKind>,
    address_offset: Option<i32>,
    connect_timeout: Option<Duration>,
    operation_timeout: Option<Duration>,
    serial: Option<SerialSettings>,
}

impl ConnectionConfigBuilder {
    /// Sets the host address.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the unit ID.
    pub fn unit_id(mut self, unit_id: u8) -> Self {
        self.unit_id = Some(unit_id);
        self
    }

    /// Sets the transport kind.
    pub fn transport(mut self, transport: TransportKind) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the address offset.
    pub fn address_offset(mut self, offset: i32) -> Self {
        self.address_offset = Some(offset);
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets the operation timeout.
    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    /// Sets the serial framing.
    pub fn serial(mut self, serial: SerialSettings) -> Self {
        self.serial = Some(serial);
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> Result<ConnectionConfig, ModbusError> {
        let host = self.host.ok_or_else(|| {
            ModbusError::configuration(ConfigurationError::missing_field("host"))
        })?;

        let config = ConnectionConfig {
            host,
            port: self.port.unwrap_or_else(default_port),
            unit_id: self.unit_id.unwrap_or_else(default_unit_id),
            transport: self.transport.unwrap_or_default(),
            address_offset: self.address_offset.unwrap_or(0),
            connect_timeout: self.connect_timeout.unwrap_or_else(default_connect_timeout),
            operation_timeout: self.operation_timeout.unwrap_or_else(default_operation_timeout),
            serial: self.serial.unwrap_or_default(),
        };

        config.validate()?;
        Ok(config)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_type_from_str() {
        assert_eq!("holding".parse::<RegisterType>().unwrap(), RegisterType::Holding);
        assert_eq!("IR".parse::<RegisterType>().unwrap(), RegisterType::Input);
        assert!("coil".parse::<RegisterType>().is_err());
    }

    #[test]
    fn test_word_order_from_str() {
        assert_eq!("high_low".parse::<WordOrder>().unwrap(), WordOrder::HighLow);
        assert_eq!("low-high".parse::<WordOrder>().unwrap(), WordOrder::LowHigh);
    }

    #[test]
    fn test_descriptor_validation() {
        assert!(RegisterDescriptor::input("a", 10).validate().is_ok());
        assert!(RegisterDescriptor::input("a", 10).with_count(3).validate().is_err());
        assert!(RegisterDescriptor::input("", 10).validate().is_err());
        assert!(RegisterDescriptor::input("a", u16::MAX).with_count(2).validate().is_err());
        assert!(RegisterDescriptor::input("a", 0).validate().is_ok());
    }

    #[test]
    fn test_display_value_with_options() {
        let mut options = BTreeMap::new();
        options.insert(0, "Waiting".to_string());
        options.insert(1, "Normal".to_string());
        let status = RegisterDescriptor::input("status", 0).with_options(options);

        assert_eq!(status.display_value(Some(1.0)).as_deref(), Some("Normal"));
        assert_eq!(status.display_value(Some(7.0)).as_deref(), Some("7"));
        assert_eq!(status.display_value(None), None);

        let plain = RegisterDescriptor::input("v", 3);
        assert_eq!(plain.display_value(Some(230.5)).as_deref(), Some("230.5"));
    }

    #[test]
    fn test_control_defaults() {
        let number = ControlDescriptor::new(ControlKind::Number, "number_3", 3);
        assert_eq!(number.max, 100.0);
        assert_eq!(number.step, 1.0);
        assert!(number.readback);

        let wide = ControlDescriptor::new(ControlKind::Number32, "number32_30", 30);
        assert_eq!(wide.max, 4_294_967_295.0);
        assert_eq!(wide.mask, 0xFFFF_FFFF);
    }

    #[test]
    fn test_transport_kind_serde() {
        let kind: TransportKind = serde_json::from_str("\"rtutcp\"").unwrap();
        assert_eq!(kind, TransportKind::RtuTcp);
        assert_eq!(serde_json::to_string(&TransportKind::Tcp).unwrap(), "\"tcp\"");
    }

    #[test]
    fn test_serial_settings_serde() {
        let serial: SerialSettings =
            serde_json::from_str(r#"{"baudrate": 19200, "bytesize": 7, "parity": "E", "stopbits": 2}"#)
                .unwrap();
        assert_eq!(serial.bytesize, DataBits::Seven);
        assert_eq!(serial.parity, Parity::Even);
        assert_eq!(serial.stopbits, StopBits::Two);
        assert_eq!(serial.to_string(), "19200/7E2");

        let bad: Result<SerialSettings, _> = serde_json::from_str(r#"{"bytesize": 9}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_inter_frame_delay() {
        let serial = SerialSettings::default();
        let delay = serial.inter_frame_delay();
        assert!(delay >= Duration::from_millis(3));
        assert!(delay <= Duration::from_millis(5));

        let fast = SerialSettings {
            baudrate: 115_200,
            ..Default::default()
        };
        assert_eq!(fast.inter_frame_delay(), Duration::from_millis(1));
    }

    #[test]
    fn test_connection_builder() {
        let config = ConnectionConfig::builder()
            .host("10.0.0.5")
            .port(8899)
            .transport(TransportKind::RtuTcp)
            .address_offset(1)
            .build()
            .unwrap();

        assert_eq!(config.socket_addr(), "10.0.0.5:8899");
        assert_eq!(config.unit_id, 1);
        assert!(config.describe().starts_with("rtutcp://"));
    }

    #[test]
    fn test_connection_validation() {
        assert!(ConnectionConfig::builder().build().is_err());
        assert!(ConnectionConfig::builder().host("h").unit_id(0).build().is_err());
        assert!(ConnectionConfig::builder().host("h").unit_id(248).build().is_err());
        assert!(ConnectionConfig::builder().host("h").port(0).build().is_err());
        assert!(ConnectionConfig::builder()
            .host("h")
            .operation_timeout(Duration::ZERO)
            .build()
            .is_err());
    }
}
