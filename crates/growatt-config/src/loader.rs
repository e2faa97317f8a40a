// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Gateway configuration loading.
//!
//! # Loading Pipeline
//!
//! 1. Read the file and pick the format from its extension
//! 2. Resolve `${VAR}` / `${VAR:default}` placeholders
//! 3. Parse into [`GatewayConfig`]
//! 4. Apply `GROWATT_*` environment overrides
//! 5. Validate
//!
//! # Environment Variable Override
//!
//! ```text
//! GROWATT_HOST=192.168.1.50
//! GROWATT_PORT=8899
//! GROWATT_TRANSPORT=rtutcp
//! GROWATT_SCAN_INTERVAL=30s
//! ```

use std::env;
use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::schema::{GatewayConfig, LogLevel};

// =============================================================================
// ConfigLoader
// =============================================================================

/// Gateway configuration loader.
///
/// # Examples
///
/// ```no_run
/// use growatt_config::loader::ConfigLoader;
///
/// let config = ConfigLoader::new().load("growatt.yaml").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Environment variable prefix.
    env_prefix: String,

    /// Whether to resolve placeholders and apply overrides.
    resolve_env_vars: bool,
}

impl ConfigLoader {
    /// Creates a loader with the `GROWATT` prefix.
    pub fn new() -> Self {
        Self {
            env_prefix: "GROWATT".to_string(),
            resolve_env_vars: true,
        }
    }

    /// Sets the environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Enables or disables environment variable resolution.
    pub fn with_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = enabled;
        self
    }

    /// Loads configuration from a file.
    ///
    /// The format is chosen by extension: `.yaml`/`.yml`, `.toml`, `.json`.
    pub fn load(&self, path: impl AsRef<Path>) -> ConfigResult<GatewayConfig> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let content = read_file(path)?;
        let format = ConfigFormat::from_path(path)?;

        let content = if self.resolve_env_vars {
            resolve_env_placeholders(&content)
        } else {
            content
        };

        let mut config: GatewayConfig = parse_str(&content, format).map_err(|e| match e {
            ConfigError::Serialization { message } => ConfigError::parse(path, message),
            other => other,
        })?;

        self.finish(&mut config)?;

        info!(
            connection = %config.connection.describe(),
            scan_interval = %humantime::format_duration(config.polling.scan_interval),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Loads configuration from a string.
    pub fn load_from_str(&self, content: &str, format: ConfigFormat) -> ConfigResult<GatewayConfig> {
        let content = if self.resolve_env_vars {
            resolve_env_placeholders(content)
        } else {
            content.to_string()
        };

        let mut config: GatewayConfig = parse_str(&content, format)?;
        self.finish(&mut config)?;
        Ok(config)
    }

    fn finish(&self, config: &mut GatewayConfig) -> ConfigResult<()> {
        if self.resolve_env_vars {
            self.apply_overrides(config, |name| env::var(name).ok())?;
        }
        config.validate()
    }

    /// Applies `{prefix}_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&self, config: &mut GatewayConfig, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| {
            let name = format!("{}_{}", self.env_prefix, suffix);
            lookup(&name).map(|value| (name, value))
        };

        if let Some((name, value)) = var("HOST") {
            debug!(var = %name, "Override applied");
            config.connection.host = value;
        }
        if let Some((name, value)) = var("PORT") {
            config.connection.port = parse_env(&name, &value, "expected a port number")?;
        }
        if let Some((name, value)) = var("UNIT_ID") {
            config.connection.unit_id = parse_env(&name, &value, "expected a unit id (1..=247)")?;
        }
        if let Some((name, value)) = var("TRANSPORT") {
            config.connection.transport = value
                .parse()
                .map_err(|e: String| ConfigError::invalid_env_var(&name, e))?;
        }
        if let Some((name, value)) = var("ADDRESS_OFFSET") {
            config.connection.address_offset =
                parse_env(&name, &value, "expected a signed integer")?;
        }
        if let Some((name, value)) = var("SCAN_INTERVAL") {
            config.polling.scan_interval = humantime::parse_duration(value.trim())
                .map_err(|e| ConfigError::invalid_env_var(&name, e.to_string()))?;
        }
        if let Some((_, value)) = var("MAPPING_PATH") {
            config.mapping.path = value;
        }
        if let Some((name, value)) = var("LOG_LEVEL") {
            config.logging.level = value
                .parse::<LogLevel>()
                .map_err(|e| ConfigError::invalid_env_var(&name, e))?;
        }

        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ConfigFormat
// =============================================================================

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML format.
    Yaml,
    /// TOML format.
    Toml,
    /// JSON format.
    Json,
}

impl ConfigFormat {
    /// Determines the format from a file path.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("json") => Ok(ConfigFormat::Json),
            Some(other) => Err(ConfigError::unsupported_format(other)),
            None => Err(ConfigError::unsupported_format("(no extension)")),
        }
    }

    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Yaml => "yaml",
            ConfigFormat::Toml => "toml",
            ConfigFormat::Json => "json",
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn read_file(path: &Path) -> ConfigResult<String> {
    if !path.exists() {
        return Err(ConfigError::file_not_found(path));
    }
    fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))
}

fn parse_str<T: DeserializeOwned>(content: &str, format: ConfigFormat) -> ConfigResult<T> {
    match format {
        ConfigFormat::Yaml => yaml_parse(content),
        ConfigFormat::Toml => {
            toml::from_str(content).map_err(|e| ConfigError::serialization(e.to_string()))
        }
        ConfigFormat::Json => {
            serde_json::from_str(content).map_err(|e| ConfigError::serialization(e.to_string()))
        }
    }
}

/// YAML goes through the `config` crate.
fn yaml_parse<T: DeserializeOwned>(content: &str) -> ConfigResult<T> {
    let config = config::Config::builder()
        .add_source(config::File::from_str(content, config::FileFormat::Yaml))
        .build()
        .map_err(|e| ConfigError::serialization(e.to_string()))?;

    config
        .try_deserialize()
        .map_err(|e| ConfigError::serialization(e.to_string()))
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str, expected: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid_env_var(name, format!("{expected}, got '{value}'")))
}

/// Resolves `${VAR_NAME}` and `${VAR_NAME:default}` placeholders.
///
/// Unknown variables without a default are left in place.
pub fn resolve_env_placeholders(content: &str) -> String {
    let mut result = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' || chars.peek() != Some(&'{') {
            result.push(c);
            continue;
        }
        chars.next();

        let mut body = String::new();
        let mut closed = false;
        for c in chars.by_ref() {
            if c == '}' {
                closed = true;
                break;
            }
            body.push(c);
        }

        if !closed {
            result.push_str("${");
            result.push_str(&body);
            continue;
        }

        let (name, default) = match body.split_once(':') {
            Some((name, default)) => (name, Some(default)),
            None => (body.as_str(), None),
        };

        match (env::var(name), default) {
            (Ok(value), _) => result.push_str(&value),
            (Err(_), Some(default)) => result.push_str(default),
            (Err(_), None) => {
                warn!(var = name, "Environment variable not found");
                result.push_str(&format!("${{{name}}}"));
            }
        }
    }

    result
}

// =============================================================================
// Convenience Functions
// =============================================================================

/// Loads configuration from a file with default settings.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<GatewayConfig> {
    ConfigLoader::new().load(path)
}

/// Loads configuration from a string with the specified format.
pub fn load_config_str(content: &str, format: ConfigFormat) -> ConfigResult<GatewayConfig> {
    ConfigLoader::new().load_from_str(content, format)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use std::time::Duration;

    use growatt_modbus::{Parity, TransportKind};

    const YAML: &str = r#"
connection:
  host: 192.168.1.50
  port: 8899
  unit_id: 3
  transport: rtutcp
  address_offset: -1
  operation_timeout: 2s
  serial:
    baudrate: 19200
    parity: E
polling:
  scan_interval: 30s
mapping:
  path: /etc/growatt/map.yaml
logging:
  level: debug
"#;

    fn loader() -> ConfigLoader {
        ConfigLoader::new().with_env_vars(false)
    }

    #[test]
    fn test_load_yaml() {
        let config = loader().load_from_str(YAML, ConfigFormat::Yaml).unwrap();
        assert_eq!(config.connection.host, "192.168.1.50");
        assert_eq!(config.connection.port, 8899);
        assert_eq!(config.connection.unit_id, 3);
        assert_eq!(config.connection.transport, TransportKind::RtuTcp);
        assert_eq!(config.connection.address_offset, -1);
        assert_eq!(config.connection.operation_timeout, Duration::from_secs(2));
        assert_eq!(config.connection.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.connection.serial.baudrate, 19200);
        assert_eq!(config.connection.serial.parity, Parity::Even);
        assert_eq!(config.polling.scan_interval, Duration::from_secs(30));
        assert_eq!(config.mapping.path, "/etc/growatt/map.yaml");
        assert_eq!(config.logging.level, LogLevel::Debug);
    }

    #[test]
    fn test_load_toml_and_json() {
        let toml = r#"
[connection]
host = "inverter.local"
"#;
        let config = loader().load_from_str(toml, ConfigFormat::Toml).unwrap();
        assert_eq!(config.connection.host, "inverter.local");
        assert_eq!(config.connection.unit_id, 1);

        let json = r#"{"connection": {"host": "10.0.0.2", "port": 503}}"#;
        let config = loader().load_from_str(json, ConfigFormat::Json).unwrap();
        assert_eq!(config.connection.port, 503);
        assert!(config.mapping.is_embedded());
    }

    #[test]
    fn test_invalid_bytesize_rejected() {
        let json = r#"{"connection": {"host": "h", "serial": {"bytesize": 9}}}"#;
        assert!(loader().load_from_str(json, ConfigFormat::Json).is_err());
    }

    #[test]
    fn test_config_format_from_path() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("growatt.YML")).unwrap(),
            ConfigFormat::Yaml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("growatt.toml")).unwrap(),
            ConfigFormat::Toml
        );
        assert!(ConfigFormat::from_path(Path::new("growatt.ini")).is_err());
        assert!(ConfigFormat::from_path(Path::new("growatt")).is_err());
    }

    #[test]
    fn test_env_placeholder_resolution() {
        env::set_var("GROWATT_LOADER_TEST_HOST", "10.1.1.1");
        let resolved = resolve_env_placeholders("host: ${GROWATT_LOADER_TEST_HOST}");
        assert_eq!(resolved, "host: 10.1.1.1");
    }

    #[test]
    fn test_env_placeholder_with_default() {
        let resolved = resolve_env_placeholders("port: ${GROWATT_LOADER_TEST_UNSET:502}");
        assert_eq!(resolved, "port: 502");

        let resolved = resolve_env_placeholders("x: ${GROWATT_LOADER_TEST_UNSET}");
        assert_eq!(resolved, "x: ${GROWATT_LOADER_TEST_UNSET}");

        let resolved = resolve_env_placeholders("cost: $5 ${open");
        assert_eq!(resolved, "cost: $5 ${open");
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("GROWATT_HOST", "override.local"),
            ("GROWATT_PORT", "1502"),
            ("GROWATT_TRANSPORT", "rtutcp"),
            ("GROWATT_SCAN_INTERVAL", "1m"),
            ("GROWATT_LOG_LEVEL", "warn"),
        ]
        .into_iter()
        .collect();

        let mut config = GatewayConfig::new("original");
        ConfigLoader::new()
            .apply_overrides(&mut config, |name| vars.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.connection.host, "override.local");
        assert_eq!(config.connection.port, 1502);
        assert_eq!(config.connection.transport, TransportKind::RtuTcp);
        assert_eq!(config.polling.scan_interval, Duration::from_secs(60));
        assert_eq!(config.logging.level, LogLevel::Warn);
    }

    #[test]
    fn test_invalid_override() {
        let mut config = GatewayConfig::new("h");
        let err = ConfigLoader::new()
            .apply_overrides(&mut config, |name| {
                (name == "GROWATT_PORT").then(|| "not-a-port".to_string())
            })
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar { ref name, .. } if name == "GROWATT_PORT"));
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(YAML.as_bytes()).unwrap();

        let config = loader().load(file.path()).unwrap();
        assert_eq!(config.connection.unit_id, 3);
    }

    #[test]
    fn test_file_not_found() {
        let err = loader().load("/nonexistent/growatt.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn test_parse_error_carries_path() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(b"{ not json").unwrap();

        let err = loader().load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
