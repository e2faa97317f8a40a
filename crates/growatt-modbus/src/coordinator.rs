// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Register polling and write-cache coordinator.
//!
//! # Poll Cycle
//!
//! ```text
//!                 ┌──────────── first cycle ────────────┐
//! refresh() ──►   │ read holding windows ─► cache ─► flag│ ─► read input windows ─► publish
//!                 └──────────────────────────────────────┘
//!                 ┌──────────── steady state ───────────┐
//!                 │ read input windows, holdings from cache│ ─► publish
//!                 └──────────────────────────────────────┘
//! ```
//!
//! Holding registers are read once and afterwards change only through
//! successful writes. A transport failure anywhere in a cycle aborts it and
//! leaves the previously published snapshot in place. An exception response
//! for one window leaves that window's values absent.
//!
//! # Write Path
//!
//! Every write holds the session lock, applies the address offset, executes
//! through the call-convention chain, patches the cache and the published
//! snapshot on success, and requests a refresh. Writes report `bool` and
//! never return errors.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::{Mutex, MutexGuard, Notify};
use tracing::{debug, info, warn};

use crate::client::{ClientStats, RegisterClient, WriteRequest};
use crate::codec::{self, decode_register};
use crate::error::{
    ConfigurationError, ConnectionError, ModbusError, ModbusResult, OperationError,
};
use crate::planner::plan_windows;
use crate::types::{ConnectionConfig, RegisterDescriptor, RegisterType, Snapshot, WordOrder};

// =============================================================================
// Internal State
// =============================================================================

/// State guarded by the I/O lock.
struct Session {
    client: RegisterClient,
    cache: HashMap<String, Option<f64>>,
    first_poll_done: bool,
}

/// Last published cycle result.
#[derive(Debug, Default)]
struct Published {
    snapshot: Snapshot,
    last_update_success: bool,
    last_updated: Option<DateTime<Utc>>,
}

// =============================================================================
// Coordinator
// =============================================================================

/// Owns one device session, the value cache, and the published snapshot.
///
/// Shared by reference (typically `Arc<Coordinator>`) with the scheduler and
/// every control.
pub struct Coordinator {
    name: String,
    registers: Vec<RegisterDescriptor>,
    holdings_by_address: HashMap<u16, Vec<usize>>,
    session: Mutex<Session>,
    published: RwLock<Published>,
    refresh_signal: Notify,
    closed: AtomicBool,
    stats: Arc<ClientStats>,
}

impl Coordinator {
    /// Creates a coordinator over `client` for the given registers.
    ///
    /// Fails if a descriptor is invalid or two share a unique id.
    pub fn new(registers: Vec<RegisterDescriptor>, client: RegisterClient) -> ModbusResult<Self> {
        let mut seen = HashSet::with_capacity(registers.len());
        let mut holdings_by_address: HashMap<u16, Vec<usize>> = HashMap::new();

        for (index, register) in registers.iter().enumerate() {
            register.validate()?;
            if !seen.insert(register.unique_id.as_str()) {
                return Err(ModbusError::configuration(
                    ConfigurationError::DuplicateUniqueId {
                        unique_id: register.unique_id.clone(),
                    },
                ));
            }
            if register.is_holding() {
                holdings_by_address
                    .entry(register.address)
                    .or_default()
                    .push(index);
            }
        }

        let name = client.display_name();
        let stats = client.stats();

        debug!(
            coordinator = %name,
            registers = registers.len(),
            holding_addresses = holdings_by_address.len(),
            "Coordinator created"
        );

        Ok(Self {
            name,
            registers,
            holdings_by_address,
            session: Mutex::new(Session {
                client,
                cache: HashMap::new(),
                first_poll_done: false,
            }),
            published: RwLock::new(Published::default()),
            refresh_signal: Notify::new(),
            closed: AtomicBool::new(false),
            stats,
        })
    }

    /// Creates a coordinator with the transport selected by `config`.
    pub fn from_config(
        config: &ConnectionConfig,
        registers: Vec<RegisterDescriptor>,
    ) -> ModbusResult<Self> {
        config.validate()?;
        Self::new(registers, RegisterClient::from_config(config))
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns the transport display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns all registers in mapping order.
    pub fn registers(&self) -> &[RegisterDescriptor] {
        &self.registers
    }

    /// Finds a register by unique id.
    pub fn register(&self, unique_id: &str) -> Option<&RegisterDescriptor> {
        self.registers.iter().find(|r| r.unique_id == unique_id)
    }

    /// Returns request statistics.
    pub fn stats(&self) -> &ClientStats {
        &self.stats
    }

    /// Returns a copy of the last published snapshot.
    pub fn get_snapshot(&self) -> Snapshot {
        self.published.read().snapshot.clone()
    }

    /// Returns the published value for one register.
    pub fn value(&self, unique_id: &str) -> Option<f64> {
        self.published
            .read()
            .snapshot
            .get(unique_id)
            .copied()
            .flatten()
    }

    /// Returns `false` if the last cycle failed.
    pub fn last_update_success(&self) -> bool {
        self.published.read().last_update_success
    }

    /// Returns the time of the last successful cycle.
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.published.read().last_updated
    }

    /// Returns `true` once the holding registers have been read.
    pub async fn first_poll_done(&self) -> bool {
        self.session.lock().await.first_poll_done
    }

    /// Returns `true` after [`close`](Self::close).
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    // =========================================================================
    // Poll Cycle
    // =========================================================================

    /// Runs one poll cycle and publishes its result.
    pub async fn refresh(&self) -> ModbusResult<Snapshot> {
        if self.is_closed() {
            return Err(ModbusError::connection(ConnectionError::ShutDown));
        }

        let mut session = self.session.lock().await;

        match self.poll_cycle(&mut session).await {
            Ok(result) => {
                for (unique_id, value) in &result {
                    session.cache.insert(unique_id.clone(), *value);
                }

                // Publish before releasing the session so a queued write
                // patches this snapshot rather than being overwritten by it.
                let mut published = self.published.write();
                drop(session);
                published.snapshot = result.clone();
                published.last_update_success = true;
                published.last_updated = Some(Utc::now());
                Ok(result)
            }
            Err(e) => {
                drop(session);
                self.published.write().last_update_success = false;
                Err(e)
            }
        }
    }

    async fn poll_cycle(&self, session: &mut Session) -> ModbusResult<Snapshot> {
        let (holdings, inputs): (Vec<&RegisterDescriptor>, Vec<&RegisterDescriptor>) =
            self.registers.iter().partition(|r| r.is_holding());

        let mut result = Snapshot::new();

        if !session.first_poll_done && !holdings.is_empty() {
            info!(
                coordinator = %self.name,
                holdings = holdings.len(),
                "First cycle: reading holding registers first"
            );
            Self::read_class(session, RegisterType::Holding, &holdings, &mut result).await?;
            for register in &holdings {
                let value = result.get(&register.unique_id).copied().flatten();
                session.cache.insert(register.unique_id.clone(), value);
            }
            session.first_poll_done = true;

            if !inputs.is_empty() {
                Self::read_class(session, RegisterType::Input, &inputs, &mut result).await?;
            }
        } else {
            if !inputs.is_empty() {
                Self::read_class(session, RegisterType::Input, &inputs, &mut result).await?;
            }
            for register in &holdings {
                let value = session.cache.get(&register.unique_id).copied().flatten();
                result.insert(register.unique_id.clone(), value);
            }
        }

        Ok(result)
    }

    async fn read_class(
        session: &mut Session,
        register_type: RegisterType,
        registers: &[&RegisterDescriptor],
        out: &mut Snapshot,
    ) -> ModbusResult<()> {
        for window in plan_windows(registers.iter().copied()) {
            debug!(
                register_type = %register_type,
                window_start = window.start,
                window_end = window.end,
                registers = window.registers.len(),
                "Reading window"
            );

            let words = match session
                .client
                .read_window(register_type, window.start, window.word_count())
                .await
            {
                Ok(words) => words,
                Err(e @ ModbusError::Protocol(_)) => {
                    warn!(
                        register_type = %register_type,
                        window_start = window.start,
                        window_end = window.end,
                        error_code = %e.error_code(),
                        "Window rejected by device: {e}"
                    );
                    Vec::new()
                }
                Err(e) => return Err(e),
            };

            for register in &window.registers {
                out.insert(
                    register.unique_id.clone(),
                    decode_register(&words, window.start, register),
                );
            }
        }
        Ok(())
    }

    // =========================================================================
    // Write Path
    // =========================================================================

    /// Writes one holding register.
    pub async fn write_single_register(&self, address: u16, value: u16) -> bool {
        let Some(mut session) = self.lock_open().await else {
            return false;
        };

        let request = WriteRequest::SingleRegister { address, value };
        if !Self::execute_write(&mut session, request).await {
            return false;
        }

        let updates = self.single_updates(address, value);
        self.apply_updates(&mut session, updates);
        drop(session);

        self.request_refresh();
        true
    }

    /// Writes consecutive holding registers.
    pub async fn write_multiple_registers(&self, address: u16, values: &[u16]) -> bool {
        let Some(mut session) = self.lock_open().await else {
            return false;
        };

        let ok = self
            .write_registers_locked(&mut session, address, values)
            .await;
        drop(session);

        if ok {
            self.request_refresh();
        }
        ok
    }

    /// Writes a 32-bit value across two registers.
    pub async fn write_u32(&self, base_address: u16, value: i64, word_order: WordOrder) -> bool {
        let Some(mut session) = self.lock_open().await else {
            return false;
        };

        let ok = self
            .write_u32_locked(&mut session, base_address, value, word_order)
            .await;
        drop(session);

        if ok {
            self.request_refresh();
        }
        ok
    }

    /// Writes a coil. No cached value changes.
    pub async fn write_coil(&self, address: u16, value: bool) -> bool {
        let Some(mut session) = self.lock_open().await else {
            return false;
        };

        let ok = Self::execute_write(&mut session, WriteRequest::Coil { address, value }).await;
        drop(session);

        if ok {
            self.request_refresh();
        }
        ok
    }

    /// Replaces a bitfield inside a cached 32-bit value and writes the result.
    ///
    /// The current value comes from the cache entry `read_unique_id`; the
    /// write is skipped if it is absent. `field_value` is limited to the
    /// bits left by `mask >> shift`.
    pub async fn write_bitfield(
        &self,
        read_unique_id: &str,
        base_address: u16,
        mask: u32,
        shift: u32,
        field_value: i64,
        word_order: WordOrder,
    ) -> bool {
        let Some(mut session) = self.lock_open().await else {
            return false;
        };

        let Some(current) = session.cache.get(read_unique_id).copied().flatten() else {
            ModbusError::operation(OperationError::MissingCachedValue {
                unique_id: read_unique_id.to_string(),
            })
            .log("write_bitfield");
            return false;
        };

        let old = codec::truncate_u32(current as i64);
        let field = codec::truncate_u32(field_value) & codec::field_width_mask(mask, shift);
        let packed = codec::pack_field(old, field, mask, shift);

        debug!(
            unique_id = read_unique_id,
            base_address,
            old = format_args!("{old:#010x}"),
            packed = format_args!("{packed:#010x}"),
            "Bitfield read-modify-write"
        );

        let ok = self
            .write_u32_locked(&mut session, base_address, i64::from(packed), word_order)
            .await;
        drop(session);

        if ok {
            self.request_refresh();
        }
        ok
    }

    async fn write_u32_locked(
        &self,
        session: &mut Session,
        base_address: u16,
        value: i64,
        word_order: WordOrder,
    ) -> bool {
        let words = codec::encode_u32(value, word_order);
        if !self.write_registers_locked(session, base_address, &words).await {
            return false;
        }

        let high_first = codec::encode_u32(value, WordOrder::HighLow);
        let updates = self.wide_updates(base_address, high_first);
        self.apply_updates(session, updates);
        true
    }

    async fn write_registers_locked(
        &self,
        session: &mut Session,
        address: u16,
        values: &[u16],
    ) -> bool {
        let request = WriteRequest::MultipleRegisters { address, values };
        if !Self::execute_write(session, request).await {
            return false;
        }

        let updates = self.multiple_updates(address, values);
        self.apply_updates(session, updates);
        true
    }

    async fn execute_write(session: &mut Session, request: WriteRequest<'_>) -> bool {
        match session.client.write(request).await {
            Ok(()) => {
                info!(operation = request.name(), "Wrote {request}");
                true
            }
            Err(e) => {
                e.log(request.name());
                false
            }
        }
    }

    // =========================================================================
    // Cache Coherency
    // =========================================================================

    fn holdings_at(&self, address: u16) -> impl Iterator<Item = &RegisterDescriptor> {
        self.holdings_by_address
            .get(&address)
            .into_iter()
            .flatten()
            .map(|&index| &self.registers[index])
    }

    /// Cache values for 1-word holdings at `address`, decoded like a read.
    fn single_updates(&self, address: u16, word: u16) -> Vec<(String, f64)> {
        self.holdings_at(address)
            .filter(|r| !r.is_wide())
            .filter_map(|r| {
                codec::decode(&[word], 1, r.signed, r.scale).map(|v| (r.unique_id.clone(), v))
            })
            .collect()
    }

    /// Cache values for 2-word holdings at `address`; `words` is high word first.
    fn wide_updates(&self, address: u16, words: [u16; 2]) -> Vec<(String, f64)> {
        self.holdings_at(address)
            .filter(|r| r.is_wide())
            .filter_map(|r| {
                codec::decode(&words, 2, r.signed, r.scale).map(|v| (r.unique_id.clone(), v))
            })
            .collect()
    }

    fn multiple_updates(&self, address: u16, values: &[u16]) -> Vec<(String, f64)> {
        let mut updates = Vec::new();

        for (i, value) in values.iter().enumerate() {
            let Some(target) = u16::try_from(i)
                .ok()
                .and_then(|i| address.checked_add(i))
            else {
                break;
            };
            updates.extend(self.single_updates(target, *value));
        }

        if let [hi, lo, ..] = values {
            updates.extend(self.wide_updates(address, [*hi, *lo]));
        }

        updates
    }

    fn apply_updates(&self, session: &mut Session, updates: Vec<(String, f64)>) {
        if updates.is_empty() {
            return;
        }

        let mut published = self.published.write();
        for (unique_id, value) in updates {
            debug!(unique_id = %unique_id, value, "Cache updated by write");
            session.cache.insert(unique_id.clone(), Some(value));
            published.snapshot.insert(unique_id, Some(value));
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Asks the scheduler for an out-of-band cycle.
    ///
    /// Requests made while a cycle is running collapse into one follow-up cycle.
    pub fn request_refresh(&self) {
        self.refresh_signal.notify_one();
    }

    /// Completes when a refresh has been requested.
    pub async fn refresh_requested(&self) {
        self.refresh_signal.notified().await;
    }

    /// Releases the connection. Idempotent; close errors are swallowed.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let mut session = self.session.lock().await;
        session.client.close().await;
        info!(coordinator = %self.name, "Coordinator closed");
    }

    async fn lock_open(&self) -> Option<MutexGuard<'_, Session>> {
        if self.is_closed() {
            warn!(coordinator = %self.name, "Write rejected: coordinator closed");
            return None;
        }
        Some(self.session.lock().await)
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("name", &self.name)
            .field("registers", &self.registers.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
