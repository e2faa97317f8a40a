// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Modbus RTU frames tunneled over a TCP socket.
//!
//! Serial-to-Ethernet gateways forward raw RTU frames (with CRC) between a
//! TCP connection and the inverter's RS485 port. The serial framing still
//! applies on the far side, so requests are spaced by the 3.5 character
//! silence derived from the configured baud rate and frame format.

use async_trait::async_trait;
use tokio_modbus::client::rtu;
use tokio_modbus::Slave;

use crate::error::ModbusResult;
use crate::types::{ConnectionConfig, RegisterType};

use super::session::{ContextSession, Request};
use super::transport::{ModbusTransport, TransportState};

/// RTU-over-TCP transport using tokio-modbus.
pub struct RtuOverTcpTransport {
    config: ConnectionConfig,
    session: ContextSession,
    state: TransportState,
}

impl RtuOverTcpTransport {
    /// Creates a new RTU-over-TCP transport.
    pub fn new(config: ConnectionConfig) -> Self {
        let session = ContextSession::new(&config, Some(config.serial.inter_frame_delay()));
        Self {
            config,
            session,
            state: TransportState::Disconnected,
        }
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }
}

#[async_trait]
impl ModbusTransport for RtuOverTcpTransport {
    async fn connect(&mut self) -> ModbusResult<()> {
        if self.state == TransportState::Connected {
            return Ok(());
        }

        self.state = TransportState::Connecting;

        let stream = match self.session.open_stream(self.config.connect_timeout).await {
            Ok(stream) => stream,
            Err(e) => {
                self.state = TransportState::Error;
                return Err(e);
            }
        };

        let ctx = rtu::attach_slave(stream, Slave(self.config.unit_id));
        self.session.install(ctx).await;
        self.state = TransportState::Connected;

        tracing::info!(
            host = %self.config.host,
            port = self.config.port,
            unit_id = self.config.unit_id,
            serial = %self.config.serial,
            inter_frame_delay = ?self.config.serial.inter_frame_delay(),
            "Connected to Modbus RTU-over-TCP gateway"
        );

        Ok(())
    }

    async fn disconnect(&mut self) -> ModbusResult<()> {
        self.session.close().await;
        self.state = TransportState::Disconnected;

        tracing::debug!(
            host = %self.config.host,
            port = self.config.port,
            "Disconnected from Modbus RTU-over-TCP gateway"
        );

        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state == TransportState::Connected
    }

    fn state(&self) -> TransportState {
        self.state
    }

    async fn read_holding_registers(
        &self,
        station: Option<u8>,
        address: u16,
        count: u16,
    ) -> ModbusResult<Vec<u16>> {
        self.session
            .execute(
                station,
                Request::Read {
                    register_type: RegisterType::Holding,
                    address,
                    count,
                },
            )
            .await
    }

    async fn read_input_registers(
        &self,
        station: Option<u8>,
        address: u16,
        count: u16,
    ) -> ModbusResult<Vec<u16>> {
        self.session
            .execute(
                station,
                Request::Read {
                    register_type: RegisterType::Input,
                    address,
                    count,
                },
            )
            .await
    }

    async fn write_single_register(
        &self,
        station: Option<u8>,
        address: u16,
        value: u16,
    ) -> ModbusResult<()> {
        self.session
            .execute(station, Request::WriteSingle { address, value })
            .await
            .map(drop)
    }

    async fn write_multiple_registers(
        &self,
        station: Option<u8>,
        address: u16,
        values: &[u16],
    ) -> ModbusResult<()> {
        self.session
            .execute(station, Request::WriteMultiple { address, values })
            .await
            .map(drop)
    }

    async fn write_single_coil(
        &self,
        station: Option<u8>,
        address: u16,
        value: bool,
    ) -> ModbusResult<()> {
        self.session
            .execute(station, Request::WriteCoil { address, value })
            .await
            .map(drop)
    }

    fn unit_id(&self) -> u8 {
        self.config.unit_id
    }

    fn display_name(&self) -> String {
        format!(
            "Modbus RTU-over-TCP {} ({})",
            self.config.socket_addr(),
            self.config.serial
        )
    }
}
