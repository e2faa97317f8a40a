// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Mock Transport
//!
//! An in-memory inverter behind the [`ModbusTransport`] trait.
//!
//! [`MockDevice`] is the scripting handle: tests seed register banks, inject
//! faults, and inspect recorded calls through it while the coordinator owns
//! the [`MockTransport`] built from it.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use growatt_modbus::{
    CallConvention, ConnectionError, Coordinator, ModbusError, ModbusResult, ModbusTransport,
    RegisterClient, RegisterDescriptor, RegisterType, TimeoutError, TransportState,
};

// =============================================================================
// Calls and Faults
// =============================================================================

/// One accepted transport call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// Session opened.
    Connect,
    /// Session closed.
    Disconnect,
    /// Register read.
    Read {
        /// Register class.
        register_type: RegisterType,
        /// Station argument.
        station: Option<u8>,
        /// Device-native address.
        address: u16,
        /// Word count.
        count: u16,
    },
    /// Register write (0x06 recorded as one value, 0x10 as many).
    Write {
        /// Station argument.
        station: Option<u8>,
        /// Device-native address.
        address: u16,
        /// Written words.
        values: Vec<u16>,
        /// `true` for function code 0x10.
        multiple: bool,
    },
    /// Coil write.
    Coil {
        /// Station argument.
        station: Option<u8>,
        /// Device-native address.
        address: u16,
        /// Coil state.
        value: bool,
    },
}

/// Failure injected into matching calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Socket dropped.
    ConnectionLost,
    /// Modbus exception response with the given code.
    Exception(u8),
    /// No answer within the operation timeout.
    Timeout,
}

impl Fault {
    fn to_error(self, function_code: u8) -> ModbusError {
        match self {
            Fault::ConnectionLost => {
                ModbusError::connection(ConnectionError::closed(Some("mock link down".into())))
            }
            Fault::Exception(code) => ModbusError::exception(function_code, code),
            Fault::Timeout => ModbusError::timeout(TimeoutError::read(Duration::from_millis(10))),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ReadFault {
    register_type: Option<RegisterType>,
    address: Option<u16>,
    fault: Fault,
}

impl ReadFault {
    fn matches(&self, register_type: RegisterType, address: u16, count: u16) -> bool {
        let class_matches = self.register_type.map_or(true, |t| t == register_type);
        let address_matches = self.address.map_or(true, |target| {
            u32::from(target) >= u32::from(address)
                && u32::from(target) < u32::from(address) + u32::from(count)
        });
        class_matches && address_matches
    }
}

// =============================================================================
// MockDevice
// =============================================================================

#[derive(Debug, Default)]
struct DeviceState {
    holding: BTreeMap<u16, u16>,
    input: BTreeMap<u16, u16>,
    coils: BTreeMap<u16, bool>,
    calls: Vec<Call>,
    read_faults: Vec<ReadFault>,
    write_fault: Option<Fault>,
    fail_connect: bool,
    rejected: Option<CallConvention>,
    rejections: usize,
    short_reads: Option<u16>,
    read_delay: Option<Duration>,
}

/// Shared, scriptable state of a simulated inverter.
#[derive(Debug, Clone, Default)]
pub struct MockDevice {
    state: Arc<Mutex<DeviceState>>,
}

impl MockDevice {
    /// Creates an empty device. Unset registers read as zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a holding register.
    pub fn set_holding(&self, address: u16, value: u16) -> &Self {
        self.state.lock().holding.insert(address, value);
        self
    }

    /// Seeds an input register.
    pub fn set_input(&self, address: u16, value: u16) -> &Self {
        self.state.lock().input.insert(address, value);
        self
    }

    /// Seeds two consecutive input registers, high word first.
    pub fn set_input_u32(&self, address: u16, value: u32) -> &Self {
        let mut state = self.state.lock();
        state.input.insert(address, (value >> 16) as u16);
        state.input.insert(address + 1, (value & 0xFFFF) as u16);
        drop(state);
        self
    }

    /// Seeds two consecutive holding registers, high word first.
    pub fn set_holding_u32(&self, address: u16, value: u32) -> &Self {
        let mut state = self.state.lock();
        state.holding.insert(address, (value >> 16) as u16);
        state.holding.insert(address + 1, (value & 0xFFFF) as u16);
        drop(state);
        self
    }

    /// Returns a holding register as last written or seeded.
    pub fn holding(&self, address: u16) -> Option<u16> {
        self.state.lock().holding.get(&address).copied()
    }

    /// Returns a coil state.
    pub fn coil(&self, address: u16) -> Option<bool> {
        self.state.lock().coils.get(&address).copied()
    }

    /// Fails reads of `register_type` whose window covers `address`.
    pub fn fail_reads_at(&self, register_type: RegisterType, address: u16, fault: Fault) -> &Self {
        self.state.lock().read_faults.push(ReadFault {
            register_type: Some(register_type),
            address: Some(address),
            fault,
        });
        self
    }

    /// Fails every read.
    pub fn fail_all_reads(&self, fault: Fault) -> &Self {
        self.state.lock().read_faults.push(ReadFault {
            register_type: None,
            address: None,
            fault,
        });
        self
    }

    /// Fails every write.
    pub fn fail_writes(&self, fault: Fault) -> &Self {
        self.state.lock().write_fault = Some(fault);
        self
    }

    /// Makes `connect` fail with a refused connection.
    pub fn fail_connect(&self, fail: bool) -> &Self {
        self.state.lock().fail_connect = fail;
        self
    }

    /// Removes all injected faults.
    pub fn clear_faults(&self) -> &Self {
        let mut state = self.state.lock();
        state.read_faults.clear();
        state.write_fault = None;
        state.fail_connect = false;
        drop(state);
        self
    }

    /// Answers calls made with `convention` with a signature mismatch.
    pub fn reject_convention(&self, convention: CallConvention) -> &Self {
        self.state.lock().rejected = Some(convention);
        self
    }

    /// Returns how many calls were rejected for their convention.
    pub fn rejections(&self) -> usize {
        self.state.lock().rejections
    }

    /// Truncates every read answer to at most `words` words.
    pub fn short_reads(&self, words: Option<u16>) -> &Self {
        self.state.lock().short_reads = words;
        self
    }

    /// Delays every read by `delay`.
    pub fn read_delay(&self, delay: Option<Duration>) -> &Self {
        self.state.lock().read_delay = delay;
        self
    }

    /// Returns the recorded calls.
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    /// Clears recorded calls.
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Returns the recorded reads as `(class, address, count)`.
    pub fn reads(&self) -> Vec<(RegisterType, u16, u16)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Read {
                    register_type,
                    address,
                    count,
                    ..
                } => Some((register_type, address, count)),
                _ => None,
            })
            .collect()
    }

    /// Returns the recorded register writes as `(address, values)`.
    pub fn writes(&self) -> Vec<(u16, Vec<u16>)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Write {
                    address, values, ..
                } => Some((address, values)),
                _ => None,
            })
            .collect()
    }

    /// Counts recorded calls matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|c| predicate(c)).count()
    }

    /// Builds a transport for `unit_id` over this device.
    pub fn transport(&self, unit_id: u8) -> MockTransport {
        MockTransport {
            device: self.clone(),
            unit_id,
            connected: false,
        }
    }

    /// Builds a register client with the given address offset.
    pub fn client(&self, address_offset: i32) -> RegisterClient {
        RegisterClient::new(Box::new(self.transport(1)), address_offset)
    }

    /// Builds a coordinator over this device without an address offset.
    pub fn coordinator(&self, registers: Vec<RegisterDescriptor>) -> ModbusResult<Coordinator> {
        Coordinator::new(registers, self.client(0))
    }

    fn check_convention(&self, operation: &'static str, station: Option<u8>) -> ModbusResult<()> {
        let mut state = self.state.lock();
        let convention = match station {
            Some(_) => CallConvention::Addressed,
            None => CallConvention::SessionDefault,
        };
        if state.rejected == Some(convention) {
            state.rejections += 1;
            return Err(ModbusError::signature_mismatch(
                operation,
                format!("{convention} calls not supported"),
            ));
        }
        Ok(())
    }

    async fn read(
        &self,
        register_type: RegisterType,
        station: Option<u8>,
        address: u16,
        count: u16,
    ) -> ModbusResult<Vec<u16>> {
        let operation = match register_type {
            RegisterType::Holding => "read_holding_registers",
            RegisterType::Input => "read_input_registers",
        };
        self.check_convention(operation, station)?;

        let delay = self.state.lock().read_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        state.calls.push(Call::Read {
            register_type,
            station,
            address,
            count,
        });

        if let Some(fault) = state
            .read_faults
            .iter()
            .find(|f| f.matches(register_type, address, count))
        {
            return Err(fault.fault.to_error(register_type.read_function_code()));
        }

        let bank = match register_type {
            RegisterType::Holding => &state.holding,
            RegisterType::Input => &state.input,
        };
        let answered = state.short_reads.map_or(count, |limit| count.min(limit));
        Ok((0..answered)
            .map(|i| bank.get(&address.wrapping_add(i)).copied().unwrap_or(0))
            .collect())
    }

    fn write(
        &self,
        operation: &'static str,
        function_code: u8,
        station: Option<u8>,
        call: Call,
    ) -> ModbusResult<()> {
        self.check_convention(operation, station)?;

        let mut state = self.state.lock();
        state.calls.push(call.clone());
        if let Some(fault) = state.write_fault {
            return Err(fault.to_error(function_code));
        }

        match call {
            Call::Write {
                address, values, ..
            } => {
                for (i, value) in values.into_iter().enumerate() {
                    state.holding.insert(address.wrapping_add(i as u16), value);
                }
            }
            Call::Coil { address, value, .. } => {
                state.coils.insert(address, value);
            }
            _ => {}
        }
        Ok(())
    }
}

// =============================================================================
// MockTransport
// =============================================================================

/// [`ModbusTransport`] backed by a [`MockDevice`].
#[derive(Debug)]
pub struct MockTransport {
    device: MockDevice,
    unit_id: u8,
    connected: bool,
}

#[async_trait]
impl ModbusTransport for MockTransport {
    async fn connect(&mut self) -> ModbusResult<()> {
        let mut state = self.device.state.lock();
        if state.fail_connect {
            return Err(ModbusError::connection(ConnectionError::refused("mock", 502)));
        }
        state.calls.push(Call::Connect);
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> ModbusResult<()> {
        if self.connected {
            self.device.state.lock().calls.push(Call::Disconnect);
        }
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn state(&self) -> TransportState {
        if self.connected {
            TransportState::Connected
        } else {
            TransportState::Disconnected
        }
    }

    async fn read_holding_registers(
        &self,
        station: Option<u8>,
        address: u16,
        count: u16,
    ) -> ModbusResult<Vec<u16>> {
        self.device
            .read(RegisterType::Holding, station, address, count)
            .await
    }

    async fn read_input_registers(
        &self,
        station: Option<u8>,
        address: u16,
        count: u16,
    ) -> ModbusResult<Vec<u16>> {
        self.device
            .read(RegisterType::Input, station, address, count)
            .await
    }

    async fn write_single_register(
        &self,
        station: Option<u8>,
        address: u16,
        value: u16,
    ) -> ModbusResult<()> {
        self.device.write(
            "write_single_register",
            0x06,
            station,
            Call::Write {
                station,
                address,
                values: vec![value],
                multiple: false,
            },
        )
    }

    async fn write_multiple_registers(
        &self,
        station: Option<u8>,
        address: u16,
        values: &[u16],
    ) -> ModbusResult<()> {
        self.device.write(
            "write_multiple_registers",
            0x10,
            station,
            Call::Write {
                station,
                address,
                values: values.to_vec(),
                multiple: true,
            },
        )
    }

    async fn write_single_coil(
        &self,
        station: Option<u8>,
        address: u16,
        value: bool,
    ) -> ModbusResult<()> {
        self.device.write(
            "write_single_coil",
            0x05,
            station,
            Call::Coil {
                station,
                address,
                value,
            },
        )
    }

    fn unit_id(&self) -> u8 {
        self.unit_id
    }

    fn display_name(&self) -> String {
        format!("mock (unit {})", self.unit_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_reads_seeded_values() {
        let device = MockDevice::new();
        device.set_input(10, 7).set_input_u32(20, 0x0001_0002);

        let transport = device.transport(1);
        let words = transport.read_input_registers(Some(1), 10, 1).await.unwrap();
        assert_eq!(words, vec![7]);

        let words = transport.read_input_registers(None, 20, 3).await.unwrap();
        assert_eq!(words, vec![1, 2, 0]);
        assert_eq!(device.reads().len(), 2);
    }

    #[tokio::test]
    async fn test_mock_convention_rejection() {
        let device = MockDevice::new();
        device.reject_convention(CallConvention::Addressed);

        let transport = device.transport(1);
        let err = transport.read_holding_registers(Some(1), 0, 1).await.unwrap_err();
        assert!(err.is_signature_mismatch());
        assert!(transport.read_holding_registers(None, 0, 1).await.is_ok());
        assert_eq!(device.rejections(), 1);
    }

    #[tokio::test]
    async fn test_mock_fault_matching() {
        let device = MockDevice::new();
        device.fail_reads_at(RegisterType::Input, 5, Fault::Exception(2));

        let transport = device.transport(1);
        assert!(transport.read_input_registers(None, 0, 5).await.is_ok());
        assert!(transport.read_input_registers(None, 4, 2).await.is_err());
        assert!(transport.read_holding_registers(None, 5, 1).await.is_ok());
    }
}
