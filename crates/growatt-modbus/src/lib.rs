// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # growatt-modbus
//!
//! Register polling and write-cache coordination for Growatt inverters
//! reached over Modbus TCP or RTU framing tunnelled through TCP.
//!
//! - **Value codec**: 16/32-bit decoding with sign and scale, 32-bit word
//!   encoding, bitfield packing
//! - **Window planner**: merges nearby registers into contiguous reads
//! - **Transport adapter**: lazy connect, address offset, call-convention
//!   fallback, session reset after transport failures
//! - **Coordinator**: snapshot publishing, first-cycle holding priority,
//!   write-through cache updates
//! - **Scheduler**: periodic cycles, coalesced refresh requests, failure backoff
//! - **Controls**: switch, select, bitfield select, number semantics
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐   ┌──────────────────┐
//! │  PollScheduler   │   │    ControlSet    │
//! └────────┬─────────┘   └────────┬─────────┘
//!          │ refresh()            │ write_*()
//!          ▼                      ▼
//! ┌─────────────────────────────────────────┐
//! │               Coordinator               │
//! │   cache ─► published Snapshot           │
//! └────────────────────┬────────────────────┘
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │  RegisterClient (offset, conventions)   │
//! └────────────────────┬────────────────────┘
//!            ┌─────────┴──────────┐
//!            ▼                    ▼
//! ┌────────────────────┐ ┌─────────────────────┐
//! │ ModbusTcpTransport │ │ RtuOverTcpTransport │
//! └────────────────────┘ └─────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use growatt_modbus::{ConnectionConfig, Coordinator, PollScheduler, RegisterDescriptor};
//!
//! let config = ConnectionConfig::builder().host("192.168.1.50").unit_id(1).build()?;
//! let registers = vec![
//!     RegisterDescriptor::input("pv1_voltage", 3).with_scale(0.1),
//!     RegisterDescriptor::holding("export_limit", 123),
//! ];
//!
//! let coordinator = Arc::new(Coordinator::from_config(&config, registers)?);
//! let scheduler = PollScheduler::new(Arc::clone(&coordinator), Duration::from_secs(10));
//! tokio::spawn(scheduler.run(shutdown_signal()));
//!
//! coordinator.write_single_register(123, 50).await;
//! println!("{:?}", coordinator.get_snapshot());
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod backoff;
pub mod client;
pub mod codec;
pub mod controls;
pub mod coordinator;
pub mod error;
pub mod planner;
pub mod scheduler;
pub mod types;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{
    ConfigurationError, ConnectionError, ConversionError, ErrorCode, ErrorSeverity, ModbusError,
    ModbusResult, OperationError, ProtocolError, TimeoutError,
};

pub use types::{
    ConnectionConfig, ConnectionConfigBuilder, ControlDescriptor, ControlKind, ControlTarget,
    DataBits, Parity, RegisterDescriptor, RegisterType, SelectOption, SerialSettings, Snapshot,
    StopBits, TransportKind, WordOrder,
};

pub use client::{
    CallConvention, ClientStats, ConventionChain, ModbusTcpTransport, ModbusTransport,
    RegisterClient, RtuOverTcpTransport, TransportState, WriteRequest,
};

pub use backoff::ExponentialBackoff;
pub use controls::{inject_readbacks, ControlSet, ControlValue};
pub use coordinator::Coordinator;
pub use planner::{plan_windows, Window};
pub use scheduler::{PollHealth, PollScheduler};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
