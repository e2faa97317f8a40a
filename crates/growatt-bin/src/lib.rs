// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # growatt-bin
//!
//! Command-line gateway for Growatt inverters.
//!
//! - CLI argument parsing with clap
//! - Gateway wiring (config, mapping, coordinator, controls)
//! - Graceful shutdown handling
//! - Logging initialization
//! - Command implementations (run, poll, validate, writes, set, ...)
//!
//! ## Architecture
//!
//! ```text
//!                main.rs
//!                   │
//!                cli.rs
//!                   │
//!       ┌───────────┼───────────┐
//!       ▼           ▼           ▼
//!   commands     runtime     logging
//!                   │
//!       ┌───────────┼───────────┐
//!       ▼           ▼           ▼
//!   shutdown   growatt-config  growatt-modbus
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Poll until interrupted (default command)
//! growatt -c /etc/growatt/growatt.yaml
//!
//! # One cycle, printed as JSON
//! growatt poll --format json
//!
//! # Check configuration and mapping
//! growatt validate --strict
//!
//! # Raw and control writes
//! growatt write-register 3 80
//! growatt set priority_mode "Battery First"
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod shutdown;

// =============================================================================
// Re-exports
// =============================================================================

pub use cli::{Cli, Commands};
pub use error::{BinError, BinResult};
pub use logging::init_logging;
pub use runtime::{Gateway, GatewayBuilder};
pub use shutdown::ShutdownCoordinator;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
