// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the `growatt` binary.

use thiserror::Error;

/// Result type alias for binary operations.
pub type BinResult<T> = Result<T, BinError>;

/// Errors that can occur in the `growatt` binary.
#[derive(Debug, Error)]
pub enum BinError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Initialization error.
    #[error("Initialization error: {0}")]
    Initialization(String),

    /// Runtime error.
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),

    /// The device rejected or failed a requested write.
    #[error("Write failed: {0}")]
    WriteFailed(String),

    /// Config or mapping loading error.
    #[error("Config error: {0}")]
    Config(#[from] growatt_config::ConfigError),

    /// Modbus layer error.
    #[error("Modbus error: {0}")]
    Modbus(#[from] growatt_modbus::ModbusError),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        /// The context description.
        context: String,
        /// The underlying error.
        #[source]
        source: Box<BinError>,
    },
}

impl BinError {
    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates an initialization error.
    pub fn init(msg: impl Into<String>) -> Self {
        Self::Initialization(msg.into())
    }

    /// Creates a runtime error.
    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }

    /// Creates an I/O error.
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    /// Creates a write failure.
    pub fn write_failed(msg: impl Into<String>) -> Self {
        Self::WriteFailed(msg.into())
    }

    /// Adds context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Returns the exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) | Self::Config(_) => 1,
            Self::Initialization(_) => 2,
            Self::Runtime(_) => 3,
            Self::Io(_) => 4,
            Self::WriteFailed(_) => 5,
            Self::Modbus(_) => 6,
            Self::WithContext { source, .. } => source.exit_code(),
        }
    }

    /// Returns operator hints for device-side errors.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::Modbus(e) => e.recovery_hints(),
            Self::WithContext { source, .. } => source.recovery_hints(),
            _ => Vec::new(),
        }
    }
}

impl From<std::io::Error> for BinError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<anyhow::Error> for BinError {
    fn from(err: anyhow::Error) -> Self {
        Self::Runtime(err.to_string())
    }
}

// =============================================================================
// Error Reporting
// =============================================================================

/// Reports an error with its cause chain on stderr.
pub fn report_error(error: &BinError) {
    eprintln!("Error: {}", error);

    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        eprintln!("  Caused by: {}", cause);
        source = cause.source();
    }

    for hint in error.recovery_hints() {
        eprintln!("  Hint: {}", hint);
    }
}

/// Reports an error and exits with the appropriate code.
pub fn report_error_and_exit(error: BinError) -> ! {
    report_error(&error);
    std::process::exit(error.exit_code())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = BinError::config("test error");
        assert_eq!(err.to_string(), "Configuration error: test error");
    }

    #[test]
    fn test_error_with_context() {
        let err = BinError::write_failed("register 3").with_context("write-register");
        assert_eq!(err.to_string(), "write-register: Write failed: register 3");
        assert_eq!(err.exit_code(), 5);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(BinError::config("test").exit_code(), 1);
        assert_eq!(BinError::init("test").exit_code(), 2);
        assert_eq!(BinError::runtime("test").exit_code(), 3);
        assert_eq!(BinError::io("test").exit_code(), 4);
        assert_eq!(BinError::write_failed("test").exit_code(), 5);
    }

    #[test]
    fn test_recovery_hints_from_modbus_errors() {
        let refused = growatt_modbus::ModbusError::connection(
            growatt_modbus::ConnectionError::refused("192.168.1.50", 502),
        );
        let err = BinError::from(refused).with_context("poll");
        assert_eq!(err.exit_code(), 6);
        assert!(!err.recovery_hints().is_empty());

        assert!(BinError::runtime("test").recovery_hints().is_empty());
    }

    #[test]
    fn test_from_config_error() {
        let err: BinError = growatt_config::ConfigError::missing_field("connection.host").into();
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("connection.host"));
    }
}
