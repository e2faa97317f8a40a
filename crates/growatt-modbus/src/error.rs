// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for register polling and writing.
//!
//! # Error Categories
//!
//! ```text
//! ModbusError
//! ├── Connection    - session could not be established or was lost
//! ├── Protocol      - device answered with an exception response
//! ├── Operation     - read/write failures, call-convention mismatches
//! ├── Conversion    - a control value does not fit its register
//! ├── Configuration - invalid settings or descriptors
//! └── Timeout       - connect or request deadline exceeded
//! ```
//!
//! A short window read is not represented here: the affected descriptor
//! simply decodes to an absent value.
//!
//! # Examples
//!
//! ```
//! use growatt_modbus::error::{ConnectionError, ModbusError};
//!
//! let error = ModbusError::connection(ConnectionError::refused("192.168.1.50", 502));
//! assert!(error.is_retryable());
//! assert_eq!(error.category(), "connection");
//! ```

use std::fmt;
use std::io;
use std::time::Duration;

use thiserror::Error;
use tracing::Level;

/// Result alias used across the crate.
pub type ModbusResult<T> = Result<T, ModbusError>;

// =============================================================================
// ModbusError - Main Error Type
// =============================================================================

/// The main error type for coordinator and transport operations.
#[derive(Debug, Error)]
pub enum ModbusError {
    /// Connection-related errors.
    #[error("{0}")]
    Connection(#[from] ConnectionError),

    /// Device-reported protocol errors.
    #[error("{0}")]
    Protocol(#[from] ProtocolError),

    /// Operation errors.
    #[error("{0}")]
    Operation(#[from] OperationError),

    /// Data conversion errors.
    #[error("{0}")]
    Conversion(#[from] ConversionError),

    /// Configuration errors.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// Timeout errors.
    #[error("{0}")]
    Timeout(#[from] TimeoutError),
}

impl ModbusError {
    // =========================================================================
    // Factory Methods
    // =========================================================================

    /// Creates a connection error.
    #[inline]
    pub fn connection(error: ConnectionError) -> Self {
        Self::Connection(error)
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(error: ProtocolError) -> Self {
        Self::Protocol(error)
    }

    /// Creates an operation error.
    #[inline]
    pub fn operation(error: OperationError) -> Self {
        Self::Operation(error)
    }

    /// Creates a conversion error.
    #[inline]
    pub fn conversion(error: ConversionError) -> Self {
        Self::Conversion(error)
    }

    /// Creates a configuration error.
    #[inline]
    pub fn configuration(error: ConfigurationError) -> Self {
        Self::Configuration(error)
    }

    /// Creates a timeout error.
    #[inline]
    pub fn timeout(error: TimeoutError) -> Self {
        Self::Timeout(error)
    }

    /// Creates a not connected error.
    pub fn not_connected() -> Self {
        Self::Connection(ConnectionError::NotConnected)
    }

    /// Creates an exception response error.
    pub fn exception(function_code: u8, exception_code: u8) -> Self {
        Self::Protocol(ProtocolError::exception_response(function_code, exception_code))
    }

    /// Creates a call-convention mismatch error.
    pub fn signature_mismatch(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Operation(OperationError::SignatureMismatch {
            operation,
            reason: reason.into(),
        })
    }

    // =========================================================================
    // Error Properties
    // =========================================================================

    /// Returns `true` if the attempted call convention does not match the
    /// transport interface. Only this kind moves on to the next convention.
    pub fn is_signature_mismatch(&self) -> bool {
        matches!(self, Self::Operation(OperationError::SignatureMismatch { .. }))
    }

    /// Returns `true` if the session should be dropped and re-established
    /// before the next request.
    pub fn invalidates_session(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout(_) => true,
            Self::Operation(OperationError::Io { .. }) => true,
            _ => false,
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(e) => e.is_retryable(),
            Self::Protocol(e) => e.is_retryable(),
            Self::Operation(e) => e.is_retryable(),
            Self::Timeout(_) => true,
            Self::Conversion(_) | Self::Configuration(_) => false,
        }
    }

    /// Returns the severity level of this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Connection(e) => e.severity(),
            Self::Protocol(e) => e.severity(),
            Self::Operation(e) => e.severity(),
            Self::Timeout(_) => ErrorSeverity::Warning,
            Self::Conversion(_) => ErrorSeverity::Error,
            Self::Configuration(_) => ErrorSeverity::Critical,
        }
    }

    /// Returns the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::Protocol(_) => "protocol",
            Self::Operation(_) => "operation",
            Self::Timeout(_) => "timeout",
            Self::Conversion(_) => "conversion",
            Self::Configuration(_) => "configuration",
        }
    }

    /// Returns a unique error code for this error.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Connection(e) => e.error_code(),
            Self::Protocol(e) => e.error_code(),
            Self::Operation(e) => e.error_code(),
            Self::Timeout(e) => e.error_code(),
            Self::Conversion(e) => e.error_code(),
            Self::Configuration(e) => e.error_code(),
        }
    }

    /// Returns recovery hints for this error.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::Connection(e) => e.recovery_hints(),
            Self::Protocol(e) => e.recovery_hints(),
            Self::Operation(e) => e.recovery_hints(),
            Self::Timeout(_) => vec![
                "Check that the inverter or data logger is powered and reachable",
                "Increase the operation timeout for slow RTU gateways",
            ],
            Self::Conversion(_) => vec!["Check min, max and write_factor of the control"],
            Self::Configuration(_) => vec!["Review the configuration and mapping files"],
        }
    }

    /// Returns the tracing level for this error.
    pub fn tracing_level(&self) -> Level {
        self.severity().to_tracing_level()
    }

    /// Logs this error with appropriate level and context.
    pub fn log(&self, context: &str) {
        let code = self.error_code();

        match self.tracing_level() {
            Level::ERROR => tracing::error!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            Level::WARN => tracing::warn!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            _ => tracing::debug!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
        }
    }
}

// =============================================================================
// ConnectionError
// =============================================================================

/// Errors raised while establishing or holding a session.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// TCP connection refused.
    #[error("Connection refused to {host}:{port}")]
    Refused {
        /// Target host.
        host: String,
        /// Target port.
        port: u16,
        /// Underlying error.
        #[source]
        source: Option<io::Error>,
    },

    /// TCP connection timed out.
    #[error("Connection timed out to {host}:{port} after {duration:?}")]
    TimedOut {
        /// Target host.
        host: String,
        /// Target port.
        port: u16,
        /// Timeout duration.
        duration: Duration,
    },

    /// DNS resolution failed.
    #[error("Failed to resolve hostname '{hostname}'")]
    DnsResolutionFailed {
        /// The hostname that failed to resolve.
        hostname: String,
        /// Underlying error.
        #[source]
        source: Option<io::Error>,
    },

    /// Connection closed unexpectedly.
    #[error("Connection closed unexpectedly{}", reason.as_ref().map(|r| format!(": {r}")).unwrap_or_default())]
    Closed {
        /// Reason for closure.
        reason: Option<String>,
    },

    /// Not connected.
    #[error("Not connected to Modbus device")]
    NotConnected,

    /// Coordinator was closed.
    #[error("Coordinator has been closed")]
    ShutDown,
}

impl ConnectionError {
    /// Creates a connection refused error.
    pub fn refused(host: impl Into<String>, port: u16) -> Self {
        Self::Refused {
            host: host.into(),
            port,
            source: None,
        }
    }

    /// Creates a connection refused error with source.
    pub fn refused_with(host: impl Into<String>, port: u16, source: io::Error) -> Self {
        Self::Refused {
            host: host.into(),
            port,
            source: Some(source),
        }
    }

    /// Creates a connection timed out error.
    pub fn timed_out(host: impl Into<String>, port: u16, duration: Duration) -> Self {
        Self::TimedOut {
            host: host.into(),
            port,
            duration,
        }
    }

    /// Creates a DNS resolution error.
    pub fn dns_failed(hostname: impl Into<String>) -> Self {
        Self::DnsResolutionFailed {
            hostname: hostname.into(),
            source: None,
        }
    }

    /// Creates a connection closed error.
    pub fn closed(reason: Option<String>) -> Self {
        Self::Closed { reason }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::ShutDown)
    }

    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::DnsResolutionFailed { .. } => ErrorSeverity::Error,
            Self::ShutDown => ErrorSeverity::Info,
            _ => ErrorSeverity::Warning,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Refused { .. } => ErrorCode::new(1, 1),
            Self::TimedOut { .. } => ErrorCode::new(1, 2),
            Self::DnsResolutionFailed { .. } => ErrorCode::new(1, 3),
            Self::Closed { .. } => ErrorCode::new(1, 4),
            Self::NotConnected => ErrorCode::new(1, 5),
            Self::ShutDown => ErrorCode::new(1, 6),
        }
    }

    /// Returns recovery hints.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::Refused { .. } => vec![
                "Verify the data logger accepts Modbus TCP on the configured port",
                "Check whether another client holds the only allowed session",
            ],
            Self::TimedOut { .. } => vec![
                "Check network connectivity to the device",
                "Verify the host address",
            ],
            Self::DnsResolutionFailed { .. } => vec!["Verify the hostname or use an IP address"],
            Self::Closed { .. } | Self::NotConnected => {
                vec!["The session is re-established on the next request"]
            }
            Self::ShutDown => vec!["Create a new coordinator"],
        }
    }
}

// =============================================================================
// ProtocolError
// =============================================================================

/// Errors reported by the device in a well-formed response.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Modbus exception response received.
    #[error("Modbus exception: function code {function_code:#04x}, exception {exception_code} ({exception_name})")]
    ExceptionResponse {
        /// The function code that caused the exception.
        function_code: u8,
        /// The exception code.
        exception_code: u8,
        /// Human-readable exception name.
        exception_name: String,
    },

    /// Response that could not be interpreted.
    #[error("Unexpected response: {message}")]
    UnexpectedResponse {
        /// Error message.
        message: String,
    },
}

impl ProtocolError {
    /// Creates an exception response error.
    pub fn exception_response(function_code: u8, exception_code: u8) -> Self {
        Self::ExceptionResponse {
            function_code,
            exception_code,
            exception_name: Self::exception_name(exception_code).to_string(),
        }
    }

    /// Creates an unexpected response error.
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            message: message.into(),
        }
    }

    /// Returns the human-readable name for an exception code.
    pub fn exception_name(code: u8) -> &'static str {
        match code {
            0x01 => "Illegal Function",
            0x02 => "Illegal Data Address",
            0x03 => "Illegal Data Value",
            0x04 => "Slave Device Failure",
            0x05 => "Acknowledge",
            0x06 => "Slave Device Busy",
            0x08 => "Memory Parity Error",
            0x0A => "Gateway Path Unavailable",
            0x0B => "Gateway Target Device Failed to Respond",
            _ => "Unknown Exception",
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ExceptionResponse { exception_code, .. } => {
                matches!(exception_code, 0x05 | 0x06 | 0x0B)
            }
            Self::UnexpectedResponse { .. } => false,
        }
    }

    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::ExceptionResponse { exception_code, .. } => match exception_code {
                0x05 | 0x06 => ErrorSeverity::Warning,
                _ => ErrorSeverity::Error,
            },
            Self::UnexpectedResponse { .. } => ErrorSeverity::Warning,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::ExceptionResponse { exception_code, .. } => ErrorCode::new(2, *exception_code),
            Self::UnexpectedResponse { .. } => ErrorCode::new(2, 0x20),
        }
    }

    /// Returns recovery hints.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::ExceptionResponse { exception_code, .. } => match exception_code {
                0x01 => vec!["The function code is not supported by this device"],
                0x02 => vec![
                    "The register address is out of range",
                    "Check address_offset and the register map for this model",
                ],
                0x03 => vec!["The value is not valid for this register"],
                0x06 => vec!["The device is busy, retry after a delay"],
                _ => vec!["Check device status and documentation"],
            },
            Self::UnexpectedResponse { .. } => vec!["Check the transport kind (tcp vs rtutcp)"],
        }
    }
}

// =============================================================================
// OperationError
// =============================================================================

/// Errors raised while executing a read or write.
#[derive(Debug, Error)]
pub enum OperationError {
    /// The attempted call convention does not match the transport.
    #[error("Call convention not accepted for {operation}: {reason}")]
    SignatureMismatch {
        /// Operation name.
        operation: &'static str,
        /// Why the convention was rejected.
        reason: String,
    },

    /// Every call convention was rejected.
    #[error("No call convention accepted for {operation} after {attempts} attempt(s)")]
    ConventionsExhausted {
        /// Operation name.
        operation: &'static str,
        /// Number of conventions tried.
        attempts: usize,
    },

    /// Address correction produced an address outside the 16-bit range.
    #[error("Address {address} with offset {offset} is outside the device address space")]
    AddressOutOfRange {
        /// External address.
        address: u16,
        /// Configured offset.
        offset: i32,
    },

    /// Transport-level I/O failure during a request.
    #[error("{operation} failed: {message}")]
    Io {
        /// Operation name.
        operation: &'static str,
        /// Error message.
        message: String,
        /// Underlying error.
        #[source]
        source: Option<io::Error>,
    },

    /// Cached value required for a read-modify-write is absent.
    #[error("No cached value for '{unique_id}'")]
    MissingCachedValue {
        /// Readback register id.
        unique_id: String,
    },
}

impl OperationError {
    /// Creates an I/O error.
    pub fn io(operation: &'static str, source: io::Error) -> Self {
        Self::Io {
            operation,
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::SignatureMismatch { .. } => ErrorSeverity::Info,
            Self::MissingCachedValue { .. } | Self::Io { .. } => ErrorSeverity::Warning,
            Self::ConventionsExhausted { .. } | Self::AddressOutOfRange { .. } => {
                ErrorSeverity::Error
            }
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::SignatureMismatch { .. } => ErrorCode::new(3, 1),
            Self::ConventionsExhausted { .. } => ErrorCode::new(3, 2),
            Self::AddressOutOfRange { .. } => ErrorCode::new(3, 3),
            Self::Io { .. } => ErrorCode::new(3, 4),
            Self::MissingCachedValue { .. } => ErrorCode::new(3, 5),
        }
    }

    /// Returns recovery hints.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::SignatureMismatch { .. } | Self::ConventionsExhausted { .. } => {
                vec!["The transport does not support the configured call conventions"]
            }
            Self::AddressOutOfRange { .. } => vec!["Check address_offset against the mapping"],
            Self::Io { .. } => vec!["The session is re-established on the next request"],
            Self::MissingCachedValue { .. } => {
                vec!["Wait for the first poll cycle before writing bitfield controls"]
            }
        }
    }
}

// =============================================================================
// ConversionError
// =============================================================================

/// Value-to-word conversion errors on the write path.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// Value does not fit the target register width.
    #[error("Value {value} does not fit in {target}")]
    Overflow {
        /// Rendered value.
        value: String,
        /// Target type.
        target: &'static str,
    },
}

impl ConversionError {
    /// Creates an overflow error.
    pub fn overflow(value: impl fmt::Display, target: &'static str) -> Self {
        Self::Overflow {
            value: value.to_string(),
            target,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Overflow { .. } => ErrorCode::new(4, 1),
        }
    }
}

// =============================================================================
// ConfigurationError
// =============================================================================

/// Invalid settings or descriptors.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Required field missing.
    #[error("Missing required field: {field}")]
    MissingField {
        /// Field name.
        field: String,
    },

    /// Unit id outside 1..=247.
    #[error("Invalid unit ID: {unit_id} (expected 1-247)")]
    InvalidUnitId {
        /// The invalid unit id.
        unit_id: u8,
    },

    /// Port zero or otherwise unusable.
    #[error("Invalid port {port}: {reason}")]
    InvalidPort {
        /// Port number.
        port: u16,
        /// Reason.
        reason: String,
    },

    /// Zero or unusable duration.
    #[error("Invalid timeout {duration:?}: {reason}")]
    InvalidTimeout {
        /// Duration.
        duration: Duration,
        /// Reason.
        reason: String,
    },

    /// Serial framing parameter outside the supported set.
    #[error("Invalid serial setting '{field}': {value}")]
    InvalidSerialSetting {
        /// Field name.
        field: &'static str,
        /// Rendered value.
        value: String,
    },

    /// Descriptor violates an invariant.
    #[error("Invalid register '{unique_id}': {reason}")]
    InvalidDescriptor {
        /// Descriptor id.
        unique_id: String,
        /// Reason.
        reason: String,
    },

    /// Two registers share a unique id.
    #[error("Duplicate register unique_id: {unique_id}")]
    DuplicateUniqueId {
        /// The duplicated id.
        unique_id: String,
    },
}

impl ConfigurationError {
    /// Creates a missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Creates an invalid unit id error.
    pub fn invalid_unit_id(unit_id: u8) -> Self {
        Self::InvalidUnitId { unit_id }
    }

    /// Creates an invalid descriptor error.
    pub fn invalid_descriptor(unique_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDescriptor {
            unique_id: unique_id.into(),
            reason: reason.into(),
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::MissingField { .. } => ErrorCode::new(5, 1),
            Self::InvalidUnitId { .. } => ErrorCode::new(5, 2),
            Self::InvalidPort { .. } => ErrorCode::new(5, 3),
            Self::InvalidTimeout { .. } => ErrorCode::new(5, 4),
            Self::InvalidSerialSetting { .. } => ErrorCode::new(5, 5),
            Self::InvalidDescriptor { .. } => ErrorCode::new(5, 6),
            Self::DuplicateUniqueId { .. } => ErrorCode::new(5, 7),
        }
    }
}

// =============================================================================
// TimeoutError
// =============================================================================

/// Deadline exceeded.
#[derive(Debug, Error)]
pub enum TimeoutError {
    /// Connect timeout.
    #[error("Connection timed out after {duration:?}")]
    Connection {
        /// Duration.
        duration: Duration,
    },

    /// Read timeout.
    #[error("Read timed out after {duration:?}")]
    Read {
        /// Duration.
        duration: Duration,
    },

    /// Write timeout.
    #[error("Write timed out after {duration:?}")]
    Write {
        /// Duration.
        duration: Duration,
    },
}

impl TimeoutError {
    /// Creates a read timeout.
    pub fn read(duration: Duration) -> Self {
        Self::Read { duration }
    }

    /// Creates a write timeout.
    pub fn write(duration: Duration) -> Self {
        Self::Write { duration }
    }

    /// Returns the elapsed deadline.
    pub fn duration(&self) -> Duration {
        match self {
            Self::Connection { duration } | Self::Read { duration } | Self::Write { duration } => {
                *duration
            }
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Connection { .. } => ErrorCode::new(6, 1),
            Self::Read { .. } => ErrorCode::new(6, 2),
            Self::Write { .. } => ErrorCode::new(6, 3),
        }
    }
}

// =============================================================================
// ErrorSeverity
// =============================================================================

/// Error severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    /// Informational - no action required.
    Info,
    /// Warning - action may be required.
    Warning,
    /// Error - action required, but recoverable.
    Error,
    /// Critical - immediate action required.
    Critical,
}

impl ErrorSeverity {
    /// Converts to tracing level.
    pub fn to_tracing_level(self) -> Level {
        match self {
            Self::Info => Level::DEBUG,
            Self::Warning => Level::WARN,
            Self::Error | Self::Critical => Level::ERROR,
        }
    }

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// ErrorCode
// =============================================================================

/// Structured error code for categorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode {
    /// Category (1=connection, 2=protocol, 3=operation, 4=conversion, 5=config, 6=timeout).
    pub category: u8,
    /// Specific error within category.
    pub code: u8,
}

impl ErrorCode {
    /// Creates a new error code.
    pub const fn new(category: u8, code: u8) -> Self {
        Self { category, code }
    }

    /// Returns the full error code as a u16.
    pub fn as_u16(&self) -> u16 {
        ((self.category as u16) << 8) | (self.code as u16)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MB-{:02X}{:02X}", self.category, self.code)
    }
}

// =============================================================================
// Tests
// =============================================================================
