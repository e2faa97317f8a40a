// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Growatt Integration Tests
//!
//! Test utilities and integration suites for the Growatt Modbus gateway.
//!
//! ## Module Structure
//!
//! - [`common`]: shared utilities
//!   - `fixtures`: register maps, controls, and config documents
//!   - `mocks`: [`MockDevice`](common::MockDevice) and its transport
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p growatt-tests
//! cargo test -p growatt-tests --test integration_coordinator
//! cargo test -p growatt-tests --test integration_controls
//! cargo test -p growatt-tests --test integration_scheduler
//! cargo test -p growatt-tests --test integration_config
//! ```
//!
//! ## Writing New Tests
//!
//! ```rust,ignore
//! use growatt_tests::prelude::*;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let device = MockDevice::new();
//!     device.set_input(3, 2345);
//!     let coordinator = device.coordinator(RegisterFixtures::inverter()).unwrap();
//!     let snapshot = coordinator.refresh().await.unwrap();
//!     assert_close(snapshot["pv1_voltage"], 234.5);
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod common;

/// Re-export commonly used items for convenience.
pub mod prelude {
    pub use crate::common::fixtures::*;
    pub use crate::common::mocks::*;
    pub use crate::common::{assert_close, init_test_logging, temp_file};
}
