// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `run` command.

use tracing::info;

use crate::cli::{Cli, RunArgs};
use crate::error::BinResult;
use crate::runtime::Gateway;
use crate::shutdown::ShutdownCoordinator;

/// Polls the inverter until SIGINT/SIGTERM.
pub async fn run(cli: &Cli, args: RunArgs) -> BinResult<()> {
    info!(config = %cli.config.display(), "Starting growatt gateway v{}", crate::VERSION);

    let gateway = Gateway::builder().config_path(&cli.config).build()?;
    let shutdown = ShutdownCoordinator::new();

    gateway.run(&shutdown, args.scan_interval).await
}
