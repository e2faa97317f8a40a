// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Ordered call conventions tried for each transport primitive.
//!
//! ```text
//! attempt(op) ──► Addressed(unit) ──mismatch──► SessionDefault ──mismatch──► ConventionsExhausted
//!                      │                             │
//!                      └── Ok / other error ─────────┴──► returned as-is
//! ```
//!
//! Only a signature mismatch advances to the next convention. Protocol
//! errors, timeouts, and connection failures are returned immediately.

use std::fmt;
use std::future::Future;

use tracing::debug;

use crate::error::{ModbusError, ModbusResult, OperationError};

/// How the unit identifier is passed with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallConvention {
    /// The unit id travels with every request.
    Addressed,
    /// The request relies on the unit the session was opened with.
    SessionDefault,
}

impl CallConvention {
    /// Returns the station argument for this convention.
    #[inline]
    pub fn station(&self, unit_id: u8) -> Option<u8> {
        match self {
            Self::Addressed => Some(unit_id),
            Self::SessionDefault => None,
        }
    }
}

impl fmt::Display for CallConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Addressed => f.write_str("addressed"),
            Self::SessionDefault => f.write_str("session-default"),
        }
    }
}

/// Prioritized list of call conventions.
#[derive(Debug, Clone)]
pub struct ConventionChain {
    unit_id: u8,
    order: Vec<CallConvention>,
}

impl ConventionChain {
    /// Creates the default chain: addressed first, then session default.
    pub fn new(unit_id: u8) -> Self {
        Self::with_order(
            unit_id,
            vec![CallConvention::Addressed, CallConvention::SessionDefault],
        )
    }

    /// Creates a chain with an explicit order.
    pub fn with_order(unit_id: u8, order: Vec<CallConvention>) -> Self {
        Self { unit_id, order }
    }

    /// Returns the conventions in priority order.
    pub fn order(&self) -> &[CallConvention] {
        &self.order
    }

    /// Runs `call` with each convention until one is not a signature mismatch.
    pub async fn attempt<T, F, Fut>(&self, operation: &'static str, mut call: F) -> ModbusResult<T>
    where
        F: FnMut(Option<u8>) -> Fut,
        Fut: Future<Output = ModbusResult<T>>,
    {
        for convention in &self.order {
            match call(convention.station(self.unit_id)).await {
                Err(e) if e.is_signature_mismatch() => {
                    debug!(
                        operation,
                        convention = %convention,
                        error = %e,
                        "Call convention rejected, trying next"
                    );
                }
                other => return other,
            }
        }

        Err(ModbusError::operation(OperationError::ConventionsExhausted {
            operation,
            attempts: self.order.len(),
        }))
    }
}
