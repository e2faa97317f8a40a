// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Transport abstraction over the wire library.
//!
//! Every primitive takes a `station` argument. `Some(unit)` addresses the
//! request to that unit explicitly; `None` relies on the unit the session
//! was opened with. A transport that cannot honor one of the two forms
//! answers with a signature-mismatch error so the caller can fall back to
//! the next call convention.

use std::fmt;

use async_trait::async_trait;

use crate::error::ModbusResult;

// =============================================================================
// TransportState
// =============================================================================

/// Connection state of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransportState {
    /// No session.
    #[default]
    Disconnected,
    /// Session being established.
    Connecting,
    /// Session open.
    Connected,
    /// Last connect attempt failed.
    Error,
}

impl TransportState {
    /// Returns `true` if the transport is connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

// =============================================================================
// ModbusTransport Trait
// =============================================================================

/// One physical session to a device.
///
/// # Implementors
///
/// - [`ModbusTcpTransport`](super::tcp::ModbusTcpTransport): Modbus TCP
/// - [`RtuOverTcpTransport`](super::rtu::RtuOverTcpTransport): RTU frames over a TCP socket
#[async_trait]
pub trait ModbusTransport: Send + Sync {
    /// Opens the session.
    async fn connect(&mut self) -> ModbusResult<()>;

    /// Closes the session.
    async fn disconnect(&mut self) -> ModbusResult<()>;

    /// Returns `true` if a session is open.
    fn is_connected(&self) -> bool;

    /// Returns the current state.
    fn state(&self) -> TransportState;

    /// Reads holding registers (function code 0x03).
    async fn read_holding_registers(
        &self,
        station: Option<u8>,
        address: u16,
        count: u16,
    ) -> ModbusResult<Vec<u16>>;

    /// Reads input registers (function code 0x04).
    async fn read_input_registers(
        &self,
        station: Option<u8>,
        address: u16,
        count: u16,
    ) -> ModbusResult<Vec<u16>>;

    /// Writes a single register (function code 0x06).
    async fn write_single_register(
        &self,
        station: Option<u8>,
        address: u16,
        value: u16,
    ) -> ModbusResult<()>;

    /// Writes consecutive registers (function code 0x10).
    async fn write_multiple_registers(
        &self,
        station: Option<u8>,
        address: u16,
        values: &[u16],
    ) -> ModbusResult<()>;

    /// Writes a single coil (function code 0x05).
    async fn write_single_coil(
        &self,
        station: Option<u8>,
        address: u16,
        value: bool,
    ) -> ModbusResult<()>;

    /// Returns the unit the session was opened with.
    fn unit_id(&self) -> u8;

    /// Returns a display name for logs.
    fn display_name(&self) -> String;
}
