// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! tokio-modbus context shared by the TCP and RTU-over-TCP transports.
//!
//! Both transports reach the device through a TCP socket and differ only in
//! how frames are encoded on it, so socket setup, request execution, and
//! error mapping live here.

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_modbus::client::{Context as ModbusContext, Reader, Writer};
use tokio_modbus::prelude::*;
use tokio_modbus::{Error as TokioModbusError, ExceptionCode};

use crate::error::{
    ConnectionError, ModbusError, ModbusResult, OperationError, ProtocolError, TimeoutError,
};
use crate::types::{ConnectionConfig, RegisterType};

// =============================================================================
// Request
// =============================================================================

/// One request on the wire.
#[derive(Debug)]
pub(crate) enum Request<'a> {
    Read {
        register_type: RegisterType,
        address: u16,
        count: u16,
    },
    WriteSingle {
        address: u16,
        value: u16,
    },
    WriteMultiple {
        address: u16,
        values: &'a [u16],
    },
    WriteCoil {
        address: u16,
        value: bool,
    },
}

impl Request<'_> {
    fn name(&self) -> &'static str {
        match self {
            Self::Read {
                register_type: RegisterType::Holding,
                ..
            } => "read_holding_registers",
            Self::Read {
                register_type: RegisterType::Input,
                ..
            } => "read_input_registers",
            Self::WriteSingle { .. } => "write_single_register",
            Self::WriteMultiple { .. } => "write_multiple_registers",
            Self::WriteCoil { .. } => "write_single_coil",
        }
    }

    fn function_code(&self) -> u8 {
        match self {
            Self::Read { register_type, .. } => register_type.read_function_code(),
            Self::WriteSingle { .. } => 0x06,
            Self::WriteMultiple { .. } => 0x10,
            Self::WriteCoil { .. } => 0x05,
        }
    }

    fn is_write(&self) -> bool {
        !matches!(self, Self::Read { .. })
    }
}

// =============================================================================
// ContextSession
// =============================================================================

struct SessionInner {
    context: Option<ModbusContext>,
    last_frame: Option<Instant>,
}

/// A lazily-installed tokio-modbus context guarded by a mutex.
pub(crate) struct ContextSession {
    host: String,
    port: u16,
    unit_id: u8,
    operation_timeout: Duration,
    frame_gap: Option<Duration>,
    inner: Arc<Mutex<SessionInner>>,
}

impl ContextSession {
    /// Creates an empty session. `frame_gap` enforces silence between frames.
    pub(crate) fn new(config: &ConnectionConfig, frame_gap: Option<Duration>) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            unit_id: config.unit_id,
            operation_timeout: config.operation_timeout,
            frame_gap,
            inner: Arc::new(Mutex::new(SessionInner {
                context: None,
                last_frame: None,
            })),
        }
    }

    /// Resolves and connects the TCP socket within `connect_timeout`.
    pub(crate) async fn open_stream(&self, connect_timeout: Duration) -> ModbusResult<TcpStream> {
        let socket_addr = self.resolve_address().await?;

        let stream = timeout(connect_timeout, TcpStream::connect(socket_addr))
            .await
            .map_err(|_| {
                ModbusError::connection(ConnectionError::timed_out(
                    &self.host,
                    self.port,
                    connect_timeout,
                ))
            })?
            .map_err(|e| {
                ModbusError::connection(ConnectionError::refused_with(&self.host, self.port, e))
            })?;

        stream.set_nodelay(true).ok();
        Ok(stream)
    }

    async fn resolve_address(&self) -> ModbusResult<SocketAddr> {
        let addr_str = format!("{}:{}", self.host, self.port);

        if let Ok(addr) = addr_str.parse::<SocketAddr>() {
            return Ok(addr);
        }

        let mut addrs = tokio::net::lookup_host(&addr_str).await.map_err(|e| {
            ModbusError::connection(ConnectionError::DnsResolutionFailed {
                hostname: self.host.clone(),
                source: Some(e),
            })
        })?;

        addrs
            .next()
            .ok_or_else(|| ModbusError::connection(ConnectionError::dns_failed(&self.host)))
    }

    /// Stores a freshly attached context.
    pub(crate) async fn install(&self, context: ModbusContext) {
        let mut inner = self.inner.lock().await;
        inner.context = Some(context);
        inner.last_frame = None;
    }

    /// Drops the context, closing it gracefully if possible.
    pub(crate) async fn close(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(mut ctx) = inner.context.take() {
            if let Err(e) = ctx.disconnect().await {
                tracing::debug!(error = %e, "Error closing Modbus session");
            }
        }
    }

    /// Executes one request and returns the words read (empty for writes).
    pub(crate) async fn execute(
        &self,
        station: Option<u8>,
        request: Request<'_>,
    ) -> ModbusResult<Vec<u16>> {
        let mut inner = self.inner.lock().await;

        if let (Some(gap), Some(last)) = (self.frame_gap, inner.last_frame) {
            let elapsed = last.elapsed();
            if elapsed < gap {
                tokio::time::sleep(gap - elapsed).await;
            }
        }

        let ctx = inner.context.as_mut().ok_or_else(ModbusError::not_connected)?;
        ctx.set_slave(Slave(station.unwrap_or(self.unit_id)));

        let operation = request.name();
        let function_code = request.function_code();
        let deadline = self.operation_timeout;
        let elapsed_error = if request.is_write() {
            TimeoutError::write(deadline)
        } else {
            TimeoutError::read(deadline)
        };

        let outcome = match request {
            Request::Read {
                register_type: RegisterType::Holding,
                address,
                count,
            } => timeout(deadline, ctx.read_holding_registers(address, count)).await,
            Request::Read {
                register_type: RegisterType::Input,
                address,
                count,
            } => timeout(deadline, ctx.read_input_registers(address, count)).await,
            Request::WriteSingle { address, value } => {
                timeout(deadline, ctx.write_single_register(address, value))
                    .await
                    .map(|r| r.map(|r| r.map(|()| Vec::new())))
            }
            Request::WriteMultiple { address, values } => {
                timeout(deadline, ctx.write_multiple_registers(address, values))
                    .await
                    .map(|r| r.map(|r| r.map(|()| Vec::new())))
            }
            Request::WriteCoil { address, value } => {
                timeout(deadline, ctx.write_single_coil(address, value))
                    .await
                    .map(|r| r.map(|r| r.map(|()| Vec::new())))
            }
        };

        inner.last_frame = Some(Instant::now());

        outcome
            .map_err(|_| ModbusError::timeout(elapsed_error))
            .and_then(|r| r.map_err(|e| self.map_modbus_error(e, operation)))
            .and_then(|r| r.map_err(|code| map_exception(code, function_code)))
    }

    /// Maps a tokio-modbus error to ModbusError.
    fn map_modbus_error(&self, error: TokioModbusError, operation: &'static str) -> ModbusError {
        match error {
            TokioModbusError::Transport(io_error) => match io_error.kind() {
                ErrorKind::ConnectionRefused => {
                    ModbusError::connection(ConnectionError::refused(&self.host, self.port))
                }
                ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => {
                    ModbusError::connection(ConnectionError::closed(Some(io_error.to_string())))
                }
                ErrorKind::BrokenPipe | ErrorKind::UnexpectedEof => ModbusError::connection(
                    ConnectionError::closed(Some(io_error.to_string())),
                ),
                ErrorKind::NotConnected => ModbusError::not_connected(),
                ErrorKind::TimedOut => {
                    ModbusError::timeout(TimeoutError::read(self.operation_timeout))
                }
                _ => ModbusError::operation(OperationError::io(operation, io_error)),
            },
            TokioModbusError::Protocol(protocol_error) => {
                ModbusError::protocol(ProtocolError::unexpected(format!(
                    "{operation}: {protocol_error:?}"
                )))
            }
        }
    }
}

/// Converts ExceptionCode to u8.
fn exception_code_to_u8(code: &ExceptionCode) -> u8 {
    match code {
        ExceptionCode::IllegalFunction => 0x01,
        ExceptionCode::IllegalDataAddress => 0x02,
        ExceptionCode::IllegalDataValue => 0x03,
        ExceptionCode::ServerDeviceFailure => 0x04,
        ExceptionCode::Acknowledge => 0x05,
        ExceptionCode::ServerDeviceBusy => 0x06,
        ExceptionCode::MemoryParityError => 0x08,
        ExceptionCode::GatewayPathUnavailable => 0x0A,
        ExceptionCode::GatewayTargetDevice => 0x0B,
        #[allow(unreachable_patterns)]
        _ => 0xFF,
    }
}

fn map_exception(code: ExceptionCode, function_code: u8) -> ModbusError {
    ModbusError::exception(function_code, exception_code_to_u8(&code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_metadata() {
        let read = Request::Read {
            register_type: RegisterType::Input,
            address: 0,
            count: 4,
        };
        assert_eq!(read.name(), "read_input_registers");
        assert_eq!(read.function_code(), 0x04);
        assert!(!read.is_write());

        let values = [1, 2];
        let write = Request::WriteMultiple {
            address: 10,
            values: &values,
        };
        assert_eq!(write.function_code(), 0x10);
        assert!(write.is_write());
    }

    #[test]
    fn test_exception_mapping() {
        let err = map_exception(ExceptionCode::IllegalDataAddress, 0x03);
        assert_eq!(err.error_code().to_string(), "MB-0202");
        assert!(!err.is_signature_mismatch());
    }

    #[tokio::test]
    async fn test_execute_without_context_is_not_connected() {
        let config = ConnectionConfig::new("127.0.0.1");
        let session = ContextSession::new(&config, None);
        let err = session
            .execute(
                None,
                Request::Read {
                    register_type: RegisterType::Holding,
                    address: 0,
                    count: 1,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ModbusError::Connection(ConnectionError::NotConnected)
        ));
    }
}
