// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Common Test Utilities
//!
//! - `fixtures`: register maps, controls, and config documents
//! - `mocks`: in-memory inverter behind the transport trait

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;

use std::io::Write;
use std::sync::Once;

use tempfile::NamedTempFile;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Initializes test logging once per test binary.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("warn,growatt_modbus=debug")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Writes `content` to a temporary file whose name ends in `suffix`.
pub fn temp_file(content: &str, suffix: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .prefix("growatt-test-")
        .suffix(suffix)
        .tempfile()
        .expect("Failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("Failed to write temp file");
    file
}

/// Asserts two floats are equal within `1e-6`.
#[track_caller]
pub fn assert_close(actual: Option<f64>, expected: f64) {
    match actual {
        Some(v) => assert!(
            (v - expected).abs() < 1e-6,
            "expected {expected}, got {v}"
        ),
        None => panic!("expected {expected}, got no value"),
    }
}
