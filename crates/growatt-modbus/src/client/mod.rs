// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Transport adapter between the coordinator and the wire library.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Coordinator                              │
//! │              (poll cycle engine, write path)                    │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      RegisterClient                             │
//! │   lazy connect · address offset · call conventions · stats      │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     ModbusTransport                             │
//! └─────────────────────────────────────────────────────────────────┘
//!            │                                     │
//!            ▼                                     ▼
//! ┌─────────────────────┐             ┌──────────────────────┐
//! │  ModbusTcpTransport │             │ RtuOverTcpTransport  │
//! │   (tokio-modbus)    │             │   (tokio-modbus)     │
//! └─────────────────────┘             └──────────────────────┘
//! ```

mod convention;
mod rtu;
mod session;
mod tcp;
mod transport;

pub use convention::{CallConvention, ConventionChain};
pub use rtu::RtuOverTcpTransport;
pub use tcp::ModbusTcpTransport;
pub use transport::{ModbusTransport, TransportState};

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::error::{ModbusError, ModbusResult, OperationError};
use crate::types::{ConnectionConfig, RegisterType, TransportKind};

/// Creates the transport selected by `config.transport`.
pub fn transport_for(config: &ConnectionConfig) -> Box<dyn ModbusTransport> {
    match config.transport {
        TransportKind::Tcp => Box::new(ModbusTcpTransport::new(config.clone())),
        TransportKind::RtuTcp => Box::new(RtuOverTcpTransport::new(config.clone())),
    }
}

// =============================================================================
// WriteRequest
// =============================================================================

/// A write primitive and its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteRequest<'a> {
    /// Function code 0x06.
    SingleRegister {
        /// External address.
        address: u16,
        /// Raw value.
        value: u16,
    },
    /// Function code 0x10.
    MultipleRegisters {
        /// External base address.
        address: u16,
        /// Raw values.
        values: &'a [u16],
    },
    /// Function code 0x05.
    Coil {
        /// External address.
        address: u16,
        /// On/off.
        value: bool,
    },
}

impl WriteRequest<'_> {
    /// Returns the external target address.
    pub fn address(&self) -> u16 {
        match self {
            Self::SingleRegister { address, .. }
            | Self::MultipleRegisters { address, .. }
            | Self::Coil { address, .. } => *address,
        }
    }

    /// Returns the operation name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SingleRegister { .. } => "write_single_register",
            Self::MultipleRegisters { .. } => "write_multiple_registers",
            Self::Coil { .. } => "write_single_coil",
        }
    }
}

impl fmt::Display for WriteRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SingleRegister { address, value } => write!(f, "register {address} = {value}"),
            Self::MultipleRegisters { address, values } => {
                write!(f, "registers {address}.. = {values:?}")
            }
            Self::Coil { address, value } => write!(f, "coil {address} = {value}"),
        }
    }
}

// =============================================================================
// RegisterClient
// =============================================================================

/// One lazily-connected session to a device.
///
/// Not internally synchronized: the coordinator serializes access.
pub struct RegisterClient {
    transport: Box<dyn ModbusTransport>,
    conventions: ConventionChain,
    address_offset: i32,
    stats: Arc<ClientStats>,
}

impl RegisterClient {
    /// Creates a client over an existing transport.
    pub fn new(transport: Box<dyn ModbusTransport>, address_offset: i32) -> Self {
        let conventions = ConventionChain::new(transport.unit_id());
        Self {
            transport,
            conventions,
            address_offset,
            stats: Arc::new(ClientStats::new()),
        }
    }

    /// Creates a client with the transport selected by the configuration.
    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self::new(transport_for(config), config.address_offset)
    }

    /// Replaces the call convention order.
    pub fn with_conventions(mut self, conventions: ConventionChain) -> Self {
        self.conventions = conventions;
        self
    }

    /// Returns shared statistics.
    pub fn stats(&self) -> Arc<ClientStats> {
        Arc::clone(&self.stats)
    }

    /// Returns the transport display name.
    pub fn display_name(&self) -> String {
        self.transport.display_name()
    }

    /// Returns `true` if a session is open.
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Returns the configured address offset.
    pub fn address_offset(&self) -> i32 {
        self.address_offset
    }

    /// Converts an external address to the device-native address.
    pub fn device_address(&self, address: u16) -> ModbusResult<u16> {
        if self.address_offset == 0 {
            return Ok(address);
        }

        let corrected = i64::from(address) - i64::from(self.address_offset);
        u16::try_from(corrected).map_err(|_| {
            ModbusError::operation(OperationError::AddressOutOfRange {
                address,
                offset: self.address_offset,
            })
        })
    }

    /// Opens the session if it is not open.
    pub async fn ensure_connected(&mut self) -> ModbusResult<()> {
        if self.transport.is_connected() {
            return Ok(());
        }

        debug!(transport = %self.transport.display_name(), "Opening session");
        self.transport.connect().await?;
        self.stats.record_connection();
        Ok(())
    }

    /// Reads `count` words starting at the external `address`.
    pub async fn read_window(
        &mut self,
        register_type: RegisterType,
        address: u16,
        count: u16,
    ) -> ModbusResult<Vec<u16>> {
        let device_address = self.device_address(address)?;
        self.ensure_connected().await?;

        let started = Instant::now();
        let transport = self.transport.as_ref();
        let result = match register_type {
            RegisterType::Holding => {
                self.conventions
                    .attempt("read_holding_registers", |station| {
                        transport.read_holding_registers(station, device_address, count)
                    })
                    .await
            }
            RegisterType::Input => {
                self.conventions
                    .attempt("read_input_registers", |station| {
                        transport.read_input_registers(station, device_address, count)
                    })
                    .await
            }
        };

        self.finish(started, result).await
    }

    /// Executes one write primitive.
    pub async fn write(&mut self, request: WriteRequest<'_>) -> ModbusResult<()> {
        let device_address = self.device_address(request.address())?;
        self.ensure_connected().await?;

        let started = Instant::now();
        let transport = self.transport.as_ref();
        let result = match request {
            WriteRequest::SingleRegister { value, .. } => {
                self.conventions
                    .attempt(request.name(), |station| {
                        transport.write_single_register(station, device_address, value)
                    })
                    .await
            }
            WriteRequest::MultipleRegisters { values, .. } => {
                self.conventions
                    .attempt(request.name(), |station| {
                        transport.write_multiple_registers(station, device_address, values)
                    })
                    .await
            }
            WriteRequest::Coil { value, .. } => {
                self.conventions
                    .attempt(request.name(), |station| {
                        transport.write_single_coil(station, device_address, value)
                    })
                    .await
            }
        };

        self.finish(started, result).await
    }

    /// Closes the session. Errors are logged and discarded.
    pub async fn close(&mut self) {
        if let Err(e) = self.transport.disconnect().await {
            debug!(error = %e, "Ignoring error while closing session");
        }
    }

    async fn finish<T>(&mut self, started: Instant, result: ModbusResult<T>) -> ModbusResult<T> {
        match &result {
            Ok(_) => self.stats.record_success(started.elapsed()),
            Err(e) => {
                self.stats.record_error();
                if e.invalidates_session() && self.transport.is_connected() {
                    info!(
                        transport = %self.transport.display_name(),
                        error = %e,
                        "Dropping session, reconnecting on next request"
                    );
                    self.close().await;
                }
            }
        }
        result
    }
}

impl fmt::Debug for RegisterClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterClient")
            .field("transport", &self.transport.display_name())
            .field("state", &self.transport.state())
            .field("address_offset", &self.address_offset)
            .field("conventions", &self.conventions.order())
            .finish()
    }
}

// =============================================================================
// ClientStats
// =============================================================================

/// Request statistics for one client.
#[derive(Debug)]
pub struct ClientStats {
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    total_response_time_us: AtomicU64,
    connections: AtomicU64,
}

impl ClientStats {
    /// Creates new statistics.
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            successful_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
            total_response_time_us: AtomicU64::new(0),
            connections: AtomicU64::new(0),
        }
    }

    /// Records a successful request.
    pub fn record_success(&self, duration: Duration) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.successful_requests.fetch_add(1, Ordering::Relaxed);
        self.total_response_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    /// Records a failed request.
    pub fn record_error(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an opened session.
    pub fn record_connection(&self) {
        self.connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the total number of requests.
    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    /// Returns the number of successful requests.
    pub fn successful_requests(&self) -> u64 {
        self.successful_requests.load(Ordering::Relaxed)
    }

    /// Returns the number of failed requests.
    pub fn failed_requests(&self) -> u64 {
        self.failed_requests.load(Ordering::Relaxed)
    }

    /// Returns the success rate (0.0 - 1.0).
    pub fn success_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            return 1.0;
        }
        self.successful_requests() as f64 / total as f64
    }

    /// Returns the average response time.
    pub fn average_response_time(&self) -> Duration {
        let success = self.successful_requests();
        if success == 0 {
            return Duration::ZERO;
        }
        let total_us = self.total_response_time_us.load(Ordering::Relaxed);
        Duration::from_micros(total_us / success)
    }

    /// Returns the number of sessions opened.
    pub fn connections(&self) -> u64 {
        self.connections.load(Ordering::Relaxed)
    }
}

impl Default for ClientStats {
    fn default() -> Self {
        Self::new()
    }
}
