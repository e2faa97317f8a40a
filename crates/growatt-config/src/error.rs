// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration error types for growatt-config.
//!
//! Covers gateway configuration loading and register mapping normalization.

use std::path::PathBuf;

use growatt_modbus::ModbusError;
use thiserror::Error;

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to parse a configuration file.
    #[error("Failed to parse config file '{path}': {message}")]
    Parse {
        /// Path to the configuration file.
        path: PathBuf,
        /// Error message.
        message: String,
        /// Line number (if available).
        line: Option<usize>,
    },

    /// Configuration validation failed.
    #[error("Validation failed for '{field}': {message}")]
    Validation {
        /// The field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },

    /// Required field is missing.
    #[error("Missing required field: {field}")]
    MissingField {
        /// The missing field name.
        field: String,
    },

    /// File I/O error.
    #[error("Failed to read '{path}': {source}")]
    Io {
        /// Path to the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// File not found.
    #[error("File not found: {path}")]
    FileNotFound {
        /// The path that was not found.
        path: PathBuf,
    },

    /// Unsupported configuration format.
    #[error("Unsupported configuration format: {format}")]
    UnsupportedFormat {
        /// The unsupported format.
        format: String,
    },

    /// Invalid environment variable value.
    #[error("Invalid environment variable value for '{name}': {message}")]
    InvalidEnvVar {
        /// The environment variable name.
        name: String,
        /// Error message.
        message: String,
    },

    /// Serialization error.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message.
        message: String,
    },

    /// Two sensors or two controls share a unique id.
    #[error("Duplicate unique_id: {unique_id}")]
    DuplicateUniqueId {
        /// The duplicated id.
        unique_id: String,
    },

    /// A mapping entry cannot be turned into a descriptor.
    #[error("Invalid mapping entry '{entry}': {message}")]
    Mapping {
        /// Entry identifier (unique id or list position).
        entry: String,
        /// Error message.
        message: String,
    },
}

impl ConfigError {
    /// Creates a parse error.
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
            line: None,
        }
    }

    /// Creates a parse error with line number.
    pub fn parse_at_line(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        line: usize,
    ) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
            line: Some(line),
        }
    }

    /// Creates a validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField { field: field.into() }
    }

    /// Creates an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a file not found error.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Creates an unsupported format error.
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    /// Creates an invalid environment variable error.
    pub fn invalid_env_var(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEnvVar {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Creates a duplicate unique id error.
    pub fn duplicate_unique_id(unique_id: impl Into<String>) -> Self {
        Self::DuplicateUniqueId {
            unique_id: unique_id.into(),
        }
    }

    /// Creates a mapping error.
    pub fn mapping(entry: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Mapping {
            entry: entry.into(),
            message: message.into(),
        }
    }

    /// Wraps a connection settings error raised by the Modbus layer.
    pub fn from_modbus(field: impl Into<String>, error: ModbusError) -> Self {
        Self::Validation {
            field: field.into(),
            message: error.to_string(),
        }
    }

    /// Returns a short operator-facing message.
    pub fn user_message(&self) -> String {
        match self {
            ConfigError::Parse { path, message, line } => match line {
                Some(line) => format!("Cannot parse {} (line {line}): {message}", path.display()),
                None => format!("Cannot parse {}: {message}", path.display()),
            },
            ConfigError::Validation { field, message } => {
                format!("Invalid setting {field}: {message}")
            }
            ConfigError::MissingField { field } => format!("Missing setting: {field}"),
            ConfigError::Io { path, .. } => format!("Cannot read {}", path.display()),
            ConfigError::FileNotFound { path } => format!("No such file: {}", path.display()),
            ConfigError::UnsupportedFormat { format } => {
                format!("Unsupported file format: {format}")
            }
            ConfigError::InvalidEnvVar { name, message } => format!("Bad value in {name}: {message}"),
            ConfigError::Serialization { message } => format!("Cannot encode value: {message}"),
            ConfigError::DuplicateUniqueId { unique_id } => {
                format!("Id '{unique_id}' is defined twice")
            }
            ConfigError::Mapping { entry, message } => format!("Mapping entry {entry}: {message}"),
        }
    }

    /// Returns `true` if this error is related to file I/O.
    pub fn is_io_error(&self) -> bool {
        matches!(self, ConfigError::Io { .. } | ConfigError::FileNotFound { .. })
    }

    /// Returns the error type as a string for logging.
    pub fn error_type(&self) -> &'static str {
        match self {
            ConfigError::Parse { .. } => "parse",
            ConfigError::Validation { .. } => "validation",
            ConfigError::MissingField { .. } => "missing_field",
            ConfigError::Io { .. } => "io",
            ConfigError::FileNotFound { .. } => "file_not_found",
            ConfigError::UnsupportedFormat { .. } => "unsupported_format",
            ConfigError::InvalidEnvVar { .. } => "invalid_env_var",
            ConfigError::Serialization { .. } => "serialization",
            ConfigError::DuplicateUniqueId { .. } => "duplicate_unique_id",
            ConfigError::Mapping { .. } => "mapping",
        }
    }
}

/// A Result type with ConfigError.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_creation() {
        let error = ConfigError::validation("polling.scan_interval", "must be greater than 0");
        assert_eq!(error.error_type(), "validation");

        let error = ConfigError::duplicate_unique_id("pv1_voltage");
        assert_eq!(error.to_string(), "Duplicate unique_id: pv1_voltage");

        let error = ConfigError::mapping("controls[2]", "missing address");
        assert_eq!(error.error_type(), "mapping");
    }

    #[test]
    fn test_user_message() {
        let msg = ConfigError::parse_at_line("growatt.yaml", "bad indent", 7).user_message();
        assert!(msg.contains("line 7"));
        assert!(msg.contains("growatt.yaml"));

        let msg = ConfigError::missing_field("connection.host").user_message();
        assert_eq!(msg, "Missing setting: connection.host");
    }

    #[test]
    fn test_is_io_error() {
        let error = ConfigError::io(
            "map.yaml",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(error.is_io_error());
        assert!(ConfigError::file_not_found("map.yaml").is_io_error());
        assert!(!ConfigError::missing_field("host").is_io_error());
    }

    #[test]
    fn test_from_modbus() {
        let modbus = ModbusError::configuration(
            growatt_modbus::ConfigurationError::invalid_unit_id(0),
        );
        let error = ConfigError::from_modbus("connection.unit_id", modbus);
        assert!(matches!(error, ConfigError::Validation { ref field, .. } if field == "connection.unit_id"));
    }
}
