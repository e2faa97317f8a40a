// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Gateway configuration schema.
//!
//! ```text
//! GatewayConfig
//! ├── connection: ConnectionConfig   (growatt-modbus)
//! ├── polling: PollingConfig
//! ├── mapping: MappingConfig
//! └── logging: LoggingConfig
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use growatt_modbus::ConnectionConfig;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

// =============================================================================
// Constants
// =============================================================================

/// Default scan interval.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(10);

/// Default cap for the failure backoff.
pub const DEFAULT_FAILURE_BACKOFF_MAX: Duration = Duration::from_secs(300);

/// Maximum scan interval (1 hour).
pub const MAX_SCAN_INTERVAL: Duration = Duration::from_secs(3600);

/// Mapping path selecting the built-in register map.
pub const EMBEDDED_MAPPING: &str = "EMBEDDED";

// =============================================================================
// Top-Level Configuration
// =============================================================================

/// Root configuration of the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Device connection.
    pub connection: ConnectionConfig,

    /// Poll timing.
    #[serde(default)]
    pub polling: PollingConfig,

    /// Register mapping source.
    #[serde(default)]
    pub mapping: MappingConfig,

    /// Logging.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl GatewayConfig {
    /// Creates a configuration for `host` with defaults everywhere else.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            connection: ConnectionConfig::new(host),
            polling: PollingConfig::default(),
            mapping: MappingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Validates the entire configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.connection.host.trim().is_empty() {
            return Err(ConfigError::missing_field("connection.host"));
        }
        self.connection
            .validate()
            .map_err(|e| ConfigError::from_modbus("connection", e))?;

        self.polling.validate()?;

        Ok(())
    }
}

// =============================================================================
// Polling
// =============================================================================

/// Poll timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PollingConfig {
    /// Time between successful cycles.
    #[serde(default = "default_scan_interval", with = "humantime_serde")]
    pub scan_interval: Duration,

    /// Upper bound of the delay after consecutive failed cycles.
    #[serde(default = "default_failure_backoff_max", with = "humantime_serde")]
    pub failure_backoff_max: Duration,
}

fn default_scan_interval() -> Duration {
    DEFAULT_SCAN_INTERVAL
}

fn default_failure_backoff_max() -> Duration {
    DEFAULT_FAILURE_BACKOFF_MAX
}

impl PollingConfig {
    /// Validates poll timing.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.scan_interval.is_zero() {
            return Err(ConfigError::validation(
                "polling.scan_interval",
                "must be greater than 0",
            ));
        }
        if self.scan_interval > MAX_SCAN_INTERVAL {
            return Err(ConfigError::validation(
                "polling.scan_interval",
                format!(
                    "cannot exceed {}",
                    humantime::format_duration(MAX_SCAN_INTERVAL)
                ),
            ));
        }
        if self.failure_backoff_max.is_zero() {
            return Err(ConfigError::validation(
                "polling.failure_backoff_max",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            scan_interval: DEFAULT_SCAN_INTERVAL,
            failure_backoff_max: DEFAULT_FAILURE_BACKOFF_MAX,
        }
    }
}

// =============================================================================
// Mapping
// =============================================================================

/// Register mapping source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappingConfig {
    /// Mapping file path, or `EMBEDDED` / empty for the built-in map.
    #[serde(default = "default_mapping_path")]
    pub path: String,
}

fn default_mapping_path() -> String {
    EMBEDDED_MAPPING.to_string()
}

impl MappingConfig {
    /// Returns `true` if the built-in map is selected.
    pub fn is_embedded(&self) -> bool {
        let path = self.path.trim();
        path.is_empty() || path.eq_ignore_ascii_case(EMBEDDED_MAPPING)
    }
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            path: default_mapping_path(),
        }
    }
}

// =============================================================================
// Logging
// =============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    #[serde(alias = "warning")]
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Returns the filter directive.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Single-line compact text.
    Compact,
    /// JSON lines.
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::new("192.168.1.50");
        assert_eq!(config.connection.port, 502);
        assert_eq!(config.polling.scan_interval, Duration::from_secs(10));
        assert_eq!(config.polling.failure_backoff_max, Duration::from_secs(300));
        assert!(config.mapping.is_embedded());
        assert_eq!(config.logging.level, LogLevel::Info);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_missing_host() {
        let config = GatewayConfig::new("  ");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingField { .. })
        ));
    }

    #[test]
    fn test_validate_unit_id() {
        let mut config = GatewayConfig::new("inverter.local");
        config.connection.unit_id = 248;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation { ref field, .. }) if field == "connection"
        ));
    }

    #[test]
    fn test_validate_scan_interval() {
        let mut config = GatewayConfig::new("inverter.local");
        config.polling.scan_interval = Duration::ZERO;
        assert!(config.validate().is_err());

        config.polling.scan_interval = Duration::from_secs(7200);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mapping_embedded_detection() {
        for path in ["", "  ", "EMBEDDED", "embedded"] {
            let mapping = MappingConfig { path: path.into() };
            assert!(mapping.is_embedded(), "{path:?}");
        }
        let mapping = MappingConfig {
            path: "/etc/growatt/map.yaml".into(),
        };
        assert!(!mapping.is_embedded());
    }

    #[test]
    fn test_log_level_from_str() {
        assert_eq!("WARNING".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert!("loud".parse::<LogLevel>().is_err());
    }
}
