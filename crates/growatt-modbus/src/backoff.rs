// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Delay policy after failed poll cycles.
//!
//! ```text
//! failures:  0      1      2        3        4        ...
//! delay:     scan   scan   scan*2   scan*4   scan*8   ... capped at max, +/- jitter
//! ```

use std::time::Duration;

use rand::Rng;

/// Exponential backoff with optional jitter.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Delay after the first failure.
    pub initial_delay: Duration,
    /// Upper bound.
    pub max_delay: Duration,
    /// Growth per consecutive failure (default: 2.0).
    pub multiplier: f64,
    /// Jitter factor (0.0 = none, 1.0 = up to 100%).
    pub jitter_factor: f64,
}

impl ExponentialBackoff {
    /// Creates a backoff without jitter.
    pub fn new(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay: max_delay.max(initial_delay),
            multiplier: 2.0,
            jitter_factor: 0.0,
        }
    }

    /// Creates the poll-failure policy: starts at the scan interval, 10% jitter.
    pub fn for_polling(scan_interval: Duration, max_delay: Duration) -> Self {
        Self::new(scan_interval, max_delay).with_jitter(0.1)
    }

    /// Sets the multiplier.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier.max(1.0);
        self
    }

    /// Sets the jitter factor.
    pub fn with_jitter(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor.clamp(0.0, 1.0);
        self
    }

    /// Returns the delay after `failures` consecutive failures (1-based).
    ///
    /// Zero failures yields the initial delay without jitter.
    pub fn delay(&self, failures: u32) -> Duration {
        if failures == 0 {
            return self.initial_delay;
        }

        let exponent = i32::try_from(failures - 1).unwrap_or(i32::MAX);
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let max = self.max_delay.as_secs_f64();
        let capped = if base.is_finite() { base.min(max) } else { max };

        let final_delay = if self.jitter_factor > 0.0 {
            let jitter_range = capped * self.jitter_factor;
            let jitter = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
            (capped + jitter).clamp(0.0, max)
        } else {
            capped
        };

        Duration::from_secs_f64(final_delay)
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::for_polling(Duration::from_secs(10), Duration::from_secs(300))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_without_jitter() {
        let backoff = ExponentialBackoff::new(Duration::from_secs(10), Duration::from_secs(60));
        assert_eq!(backoff.delay(0), Duration::from_secs(10));
        assert_eq!(backoff.delay(1), Duration::from_secs(10));
        assert_eq!(backoff.delay(2), Duration::from_secs(20));
        assert_eq!(backoff.delay(3), Duration::from_secs(40));
        assert_eq!(backoff.delay(4), Duration::from_secs(60));
        assert_eq!(backoff.delay(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn test_backoff_jitter_stays_in_range() {
        let backoff = ExponentialBackoff::for_polling(Duration::from_secs(10), Duration::from_secs(300));
        for failures in 1..8 {
            let delay = backoff.delay(failures);
            assert!(delay >= Duration::from_secs(9));
            assert!(delay <= Duration::from_secs(300));
        }
    }

    #[test]
    fn test_max_never_below_initial() {
        let backoff = ExponentialBackoff::new(Duration::from_secs(30), Duration::from_secs(5));
        assert_eq!(backoff.delay(3), Duration::from_secs(30));
    }

    #[test]
    fn test_multiplier() {
        let backoff = ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(100))
            .with_multiplier(3.0);
        assert_eq!(backoff.delay(3), Duration::from_secs(9));
    }
}
