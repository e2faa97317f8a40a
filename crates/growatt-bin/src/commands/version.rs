// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `version` command.

use crate::cli::Cli;
use crate::error::BinResult;

/// Prints crate versions and build target.
pub fn version(_cli: &Cli) -> BinResult<()> {
    println!("growatt - Modbus polling and control for Growatt inverters");
    println!();
    println!("Version Information:");
    println!("  growatt-bin:    {}", crate::VERSION);
    println!("  growatt-modbus: {}", growatt_modbus::VERSION);
    println!("  growatt-config: {}", growatt_config::VERSION);
    println!();
    println!("Build Information:");
    println!("  Target: {}", std::env::consts::ARCH);
    println!("  OS:     {}", std::env::consts::OS);
    println!();
    println!("License: PolyForm Noncommercial License 1.0.0");
    println!("Copyright (c) 2025 Sylvex. All rights reserved.");

    Ok(())
}
