// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Modbus TCP transport.

use async_trait::async_trait;
use tokio_modbus::client::tcp;
use tokio_modbus::Slave;

use crate::error::ModbusResult;
use crate::types::{ConnectionConfig, RegisterType};

use super::session::{ContextSession, Request};
use super::transport::{ModbusTransport, TransportState};

/// Modbus TCP transport using tokio-modbus.
///
/// # Example
///
/// ```rust,ignore
/// use growatt_modbus::client::ModbusTcpTransport;
/// use growatt_modbus::types::ConnectionConfig;
///
/// let mut transport = ModbusTcpTransport::new(ConnectionConfig::new("192.168.1.50"));
/// transport.connect().await?;
/// let words = transport.read_input_registers(None, 0, 10).await?;
/// ```
pub struct ModbusTcpTransport {
    config: ConnectionConfig,
    session: ContextSession,
    state: TransportState,
}

impl ModbusTcpTransport {
    /// Creates a new TCP transport with the given configuration.
    pub fn new(config: ConnectionConfig) -> Self {
        let session = ContextSession::new(&config, None);
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
impl ModbusTransport for ModbusTcpTransport {
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

        let ctx = tcp::attach_slave(stream, Slave(self.config.unit_id));
        self.session.install(ctx).await;
        self.state = TransportState::Connected;

        tracing::info!(
            host = %self.config.host,
            port = self.config.port,
            unit_id = self.config.unit_id,
            "Connected to Modbus TCP device"
        );

        Ok(())
    }

    async fn disconnect(&mut self) -> ModbusResult<()> {
        self.session.close().await;
        self.state = TransportState::Disconnected;

        tracing::debug!(
            host = %self.config.host,
            port = self.config.port,
            "Disconnected from Modbus TCP device"
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
        format!("Modbus TCP {}", self.config.socket_addr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_tcp_transport_creation() {
        let transport = ModbusTcpTransport::new(ConnectionConfig::new("192.168.1.50"));
        assert_eq!(transport.state(), TransportState::Disconnected);
        assert!(!transport.is_connected());
        assert_eq!(transport.unit_id(), 1);
        assert_eq!(transport.display_name(), "Modbus TCP 192.168.1.50:502");
    }

    #[tokio::test]
    async fn test_connect_refused_sets_error_state() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = ConnectionConfig::builder()
            .host("127.0.0.1")
            .port(port)
            .connect_timeout(Duration::from_millis(500))
            .build()
            .unwrap();
        let mut transport = ModbusTcpTransport::new(config);

        assert!(transport.connect().await.is_err());
        assert_eq!(transport.state(), TransportState::Error);
    }

    #[tokio::test]
    async fn test_read_before_connect_fails() {
        let transport = ModbusTcpTransport::new(ConnectionConfig::new("127.0.0.1"));
        let err = transport.read_input_registers(None, 0, 1).await.unwrap_err();
        assert!(err.invalidates_session());
    }
}
