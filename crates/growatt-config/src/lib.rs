// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # growatt-config
//!
//! Configuration and register mapping loading for the Growatt Modbus gateway.
//!
//! ## Features
//!
//! - **Gateway schema**: connection, polling, mapping source, logging
//! - **Multi-Format Support**: YAML, TOML, and JSON configuration files
//! - **Environment Overrides**: `GROWATT_*` variables and `${VAR:default}` placeholders
//! - **Register mapping**: sensors and controls from YAML, with a built-in
//!   map, default ids, and readback injection
//!
//! ## Quick Start
//!
//! ```no_run
//! use growatt_config::{load_config, load_register_mapping};
//!
//! let config = load_config("growatt.yaml").unwrap();
//! let mapping = load_register_mapping(&config.mapping.path).unwrap();
//!
//! println!("Device: {}", config.connection.describe());
//! println!("Registers: {} ({} readbacks)", mapping.registers.len(), mapping.injected);
//! ```
//!
//! ## Environment Variables
//!
//! ```text
//! GROWATT_HOST=192.168.1.50
//! GROWATT_UNIT_ID=2
//! GROWATT_MAPPING_PATH=/etc/growatt/map.yaml
//! GROWATT_LOG_LEVEL=debug
//! ```
//!
//! Values in config files can reference environment variables:
//!
//! ```yaml
//! connection:
//!   host: "${INVERTER_HOST:192.168.1.50}"
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod error;
pub mod loader;
pub mod mapping;
pub mod schema;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_config, load_config_str, ConfigFormat, ConfigLoader};
pub use mapping::{
    load_register_mapping, normalize, resolve_mapping, MappingFile, MappingSource,
    RegisterMapping, EMBEDDED_MAP,
};
pub use schema::{
    GatewayConfig, LogFormat, LogLevel, LoggingConfig, MappingConfig, PollingConfig,
    EMBEDDED_MAPPING,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
