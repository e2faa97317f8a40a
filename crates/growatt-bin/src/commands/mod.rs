// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI command implementations.

mod mapping;
mod poll;
mod run;
mod set;
mod validate;
mod version;
mod write;

pub use mapping::log_mapping;
pub use poll::{poll, ControlReading, SensorReading, SnapshotReport};
pub use run::run;
pub use set::set;
pub use validate::{validate, ValidationSummary};
pub use version::version;
pub use write::{write_coil, write_register, write_registers, write_u32};

use crate::cli::{Cli, Commands};
use crate::error::BinResult;

/// Executes the appropriate command based on CLI arguments.
pub async fn execute(cli: Cli) -> BinResult<()> {
    match cli.effective_command() {
        Commands::Run(args) => run::run(&cli, args).await,
        Commands::Poll(args) => poll::poll(&cli, args).await,
        Commands::Validate(args) => validate::validate(&cli, args),
        Commands::WriteRegister(args) => write::write_register(&cli, args).await,
        Commands::WriteRegisters(args) => write::write_registers(&cli, args).await,
        Commands::WriteU32(args) => write::write_u32(&cli, args).await,
        Commands::WriteCoil(args) => write::write_coil(&cli, args).await,
        Commands::Set(args) => set::set(&cli, args).await,
        Commands::LogMapping => mapping::log_mapping(&cli),
        Commands::Version => version::version(&cli),
    }
}
