// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `set` command.

use tracing::{info, warn};

use crate::cli::{Cli, SetArgs};
use crate::error::{BinError, BinResult};
use crate::runtime::Gateway;

/// Primes the cache with one poll, then drives the named control.
pub async fn set(cli: &Cli, args: SetArgs) -> BinResult<()> {
    let gateway = Gateway::builder().config_path(&cli.config).build()?;
    let result = apply(&gateway, &args).await;
    gateway.close().await;
    result
}

async fn apply(gateway: &Gateway, args: &SetArgs) -> BinResult<()> {
    let controls = gateway.controls();
    if controls.get(&args.control).is_none() {
        let known: Vec<&str> = controls
            .controls()
            .iter()
            .map(|c| c.unique_id.as_str())
            .collect();
        return Err(BinError::config(format!(
            "Unknown control '{}' (known: {})",
            args.control,
            known.join(", ")
        )));
    }

    // Bitfield writes and readback states need a populated cache.
    if let Err(e) = gateway.coordinator().refresh().await {
        warn!(error = %e, "Priming poll failed, writing without a fresh cache");
    }

    let coordinator = gateway.coordinator();
    let ok = controls.apply(coordinator, &args.control, &args.value).await?;
    info!(control = %args.control, value = %args.value, "set {ok}");

    if !ok {
        return Err(BinError::write_failed(format!(
            "set {} to '{}'",
            args.control, args.value
        )));
    }

    if let Some(state) = controls.state(coordinator, &args.control) {
        println!("{} = {}", args.control, state);
    }
    Ok(())
}
