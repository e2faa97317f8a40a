// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `log-mapping` command.

use tracing::info;

use growatt_config::{load_config, load_register_mapping, RegisterMapping};

use crate::cli::Cli;
use crate::error::BinResult;

/// Logs the mapping source and every normalized sensor and control.
pub fn log_mapping(cli: &Cli) -> BinResult<()> {
    let config = load_config(&cli.config)?;
    let mapping = load_register_mapping(&config.mapping.path)?;
    emit(&mapping);
    Ok(())
}

fn emit(mapping: &RegisterMapping) {
    info!(
        source = %mapping.source,
        sensors = mapping.registers.len(),
        controls = mapping.controls.len(),
        injected = mapping.injected,
        "Register mapping"
    );

    for register in &mapping.registers {
        info!(
            unique_id = %register.unique_id,
            register_type = %register.register_type,
            address = register.address,
            count = register.count,
            scale = register.scale,
            signed = register.signed,
            "Sensor {}",
            register.name
        );
    }

    for control in &mapping.controls {
        info!(
            unique_id = %control.unique_id,
            kind = %control.kind,
            address = control.address,
            readback = control.read_unique_id.as_deref().unwrap_or("-"),
            "Control {}",
            control.name
        );
    }
}
