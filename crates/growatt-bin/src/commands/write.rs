// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the raw write commands.
//!
//! Each command performs one write through the coordinator, logs the outcome
//! as `<operation> true|false`, and fails with [`BinError::WriteFailed`] when
//! the device did not accept it.

use tracing::info;

use crate::cli::{Cli, WriteCoilArgs, WriteRegisterArgs, WriteRegistersArgs, WriteU32Args};
use crate::error::{BinError, BinResult};
use crate::runtime::Gateway;

/// Writes one holding register.
pub async fn write_register(cli: &Cli, args: WriteRegisterArgs) -> BinResult<()> {
    let gateway = Gateway::builder().config_path(&cli.config).build()?;
    let ok = gateway
        .coordinator()
        .write_single_register(args.address, args.value)
        .await;
    finish(&gateway, "write_register", args.address, ok).await
}

/// Writes consecutive holding registers.
pub async fn write_registers(cli: &Cli, args: WriteRegistersArgs) -> BinResult<()> {
    let gateway = Gateway::builder().config_path(&cli.config).build()?;
    let ok = gateway
        .coordinator()
        .write_multiple_registers(args.address, &args.values)
        .await;
    finish(&gateway, "write_registers", args.address, ok).await
}

/// Writes a 32-bit value.
pub async fn write_u32(cli: &Cli, args: WriteU32Args) -> BinResult<()> {
    let gateway = Gateway::builder().config_path(&cli.config).build()?;
    let ok = gateway
        .coordinator()
        .write_u32(args.address, args.value, args.word_order)
        .await;
    finish(&gateway, "write_u32", args.address, ok).await
}

/// Writes one coil.
pub async fn write_coil(cli: &Cli, args: WriteCoilArgs) -> BinResult<()> {
    let gateway = Gateway::builder().config_path(&cli.config).build()?;
    let ok = gateway
        .coordinator()
        .write_coil(args.address, args.state.is_on())
        .await;
    finish(&gateway, "write_coil", args.address, ok).await
}

async fn finish(gateway: &Gateway, operation: &str, address: u16, ok: bool) -> BinResult<()> {
    info!(address, "{operation} {ok}");
    gateway.close().await;

    if ok {
        Ok(())
    } else {
        Err(BinError::write_failed(format!("{operation} at address {address}")))
    }
}
