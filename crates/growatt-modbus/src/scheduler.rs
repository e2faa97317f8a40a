// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Periodic driver for [`Coordinator::refresh`].
//!
//! ```text
//!        ┌──────── cycle ────────┐
//! start ─┤ refresh()             ├─► wait for: scan tick | refresh request | shutdown
//!        └───────────────────────┘        │
//!             ▲                           │
//!             └───────────────────────────┘
//! ```
//!
//! A failed cycle keeps the previous snapshot and delays the next attempt
//! with exponential backoff. Refresh requests issued while a cycle runs
//! collapse into a single follow-up cycle.

use std::future::Future;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::backoff::ExponentialBackoff;
use crate::coordinator::Coordinator;

// =============================================================================
// PollHealth
// =============================================================================

/// Cycle counters shared with observers.
#[derive(Debug, Default)]
pub struct PollHealth {
    cycles_ok: AtomicU64,
    cycles_failed: AtomicU64,
    consecutive_failures: AtomicU32,
    last_success_at: RwLock<Option<DateTime<Utc>>>,
    last_error: RwLock<Option<String>>,
}

impl PollHealth {
    /// Creates empty counters.
    pub fn new() -> Self {
        Self::default()
    }

    fn record_success(&self) {
        self.cycles_ok.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);
        *self.last_success_at.write() = Some(Utc::now());
        *self.last_error.write() = None;
    }

    fn record_failure(&self, error: String) -> u32 {
        self.cycles_failed.fetch_add(1, Ordering::Relaxed);
        *self.last_error.write() = Some(error);
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Returns the number of successful cycles.
    pub fn cycles_ok(&self) -> u64 {
        self.cycles_ok.load(Ordering::Relaxed)
    }

    /// Returns the number of failed cycles.
    pub fn cycles_failed(&self) -> u64 {
        self.cycles_failed.load(Ordering::Relaxed)
    }

    /// Returns the number of failures since the last success.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    /// Returns the time of the last successful cycle.
    pub fn last_success_at(&self) -> Option<DateTime<Utc>> {
        *self.last_success_at.read()
    }

    /// Returns the last cycle error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }
}

// =============================================================================
// PollScheduler
// =============================================================================

/// Runs poll cycles on a timer and on request.
pub struct PollScheduler {
    coordinator: Arc<Coordinator>,
    scan_interval: Duration,
    backoff: ExponentialBackoff,
    health: Arc<PollHealth>,
}

impl PollScheduler {
    /// Creates a scheduler polling every `scan_interval`.
    pub fn new(coordinator: Arc<Coordinator>, scan_interval: Duration) -> Self {
        Self {
            coordinator,
            scan_interval,
            backoff: ExponentialBackoff::for_polling(scan_interval, scan_interval * 30),
            health: Arc::new(PollHealth::new()),
        }
    }

    /// Caps the delay after consecutive failures.
    pub fn with_failure_backoff_max(mut self, max_delay: Duration) -> Self {
        self.backoff = ExponentialBackoff::for_polling(self.scan_interval, max_delay);
        self
    }

    /// Replaces the failure backoff policy.
    pub fn with_backoff(mut self, backoff: ExponentialBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Returns the shared health counters.
    pub fn health(&self) -> Arc<PollHealth> {
        Arc::clone(&self.health)
    }

    /// Runs until `shutdown` completes. The first cycle starts immediately.
    pub async fn run<S>(self, shutdown: S)
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        info!(
            coordinator = %self.coordinator.name(),
            scan_interval = ?self.scan_interval,
            "Poll scheduler started"
        );

        let mut delay = Duration::ZERO;
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = self.coordinator.refresh_requested() => {
                    debug!("Refresh requested");
                }
                _ = tokio::time::sleep(delay) => {}
            }

            delay = self.run_cycle().await;
        }

        info!(
            cycles_ok = self.health.cycles_ok(),
            cycles_failed = self.health.cycles_failed(),
            "Poll scheduler stopped"
        );
    }

    /// Runs one cycle and returns the delay before the next.
    pub async fn run_cycle(&self) -> Duration {
        match self.coordinator.refresh().await {
            Ok(snapshot) => {
                self.health.record_success();
                let absent = snapshot.values().filter(|v| v.is_none()).count();
                debug!(snapshot = ?snapshot, "Published snapshot");
                info!(values = snapshot.len(), absent, "Poll cycle complete");
                self.scan_interval
            }
            Err(e) => {
                e.log("poll cycle");
                let failures = self.health.record_failure(e.to_string());
                let delay = self.backoff.delay(failures);
                warn!(
                    consecutive_failures = failures,
                    retry_in = ?delay,
                    "Poll cycle failed, keeping previous snapshot"
                );
                delay
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_counters() {
        let health = PollHealth::new();
        assert_eq!(health.record_failure("boom".into()), 1);
        assert_eq!(health.record_failure("boom".into()), 2);
        assert_eq!(health.last_error().as_deref(), Some("boom"));

        health.record_success();
        assert_eq!(health.consecutive_failures(), 0);
        assert_eq!(health.cycles_ok(), 1);
        assert_eq!(health.cycles_failed(), 2);
        assert!(health.last_success_at().is_some());
        assert!(health.last_error().is_none());
    }
}
