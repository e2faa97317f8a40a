// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use serde::Serialize;

use growatt_config::{load_config, load_register_mapping, GatewayConfig, MappingSource, RegisterMapping};
use growatt_modbus::{plan_windows, RegisterType};

use crate::cli::{Cli, OutputFormat, ValidateArgs};
use crate::error::{BinError, BinResult};

/// Result of validating a configuration and its mapping.
#[derive(Debug, Serialize)]
pub struct ValidationSummary {
    /// Always true; invalid input fails before a summary exists.
    pub valid: bool,
    /// Config file path.
    pub config_path: String,
    /// Device description.
    pub device: String,
    /// Transport name.
    pub transport: String,
    /// Mapping source.
    pub mapping: String,
    /// Sensor count, injected readbacks included.
    pub sensors: usize,
    /// Control count.
    pub controls: usize,
    /// Injected readback registers.
    pub injected_readbacks: usize,
    /// Read windows per cycle for input registers.
    pub input_windows: usize,
    /// Read windows on the first cycle for holding registers.
    pub holding_windows: usize,
    /// Non-fatal findings.
    pub warnings: Vec<String>,
}

impl ValidationSummary {
    /// Summarizes a loaded configuration and mapping.
    pub fn new(config_path: String, config: &GatewayConfig, mapping: &RegisterMapping) -> Self {
        let windows = |class: RegisterType| {
            plan_windows(mapping.registers.iter().filter(|r| r.register_type == class)).len()
        };

        Self {
            valid: true,
            config_path,
            device: config.connection.describe(),
            transport: config.connection.transport.to_string(),
            mapping: mapping.source.to_string(),
            sensors: mapping.registers.len(),
            controls: mapping.controls.len(),
            injected_readbacks: mapping.injected,
            input_windows: windows(RegisterType::Input),
            holding_windows: windows(RegisterType::Holding),
            warnings: collect_warnings(config, mapping),
        }
    }
}

fn collect_warnings(config: &GatewayConfig, mapping: &RegisterMapping) -> Vec<String> {
    let mut warnings = Vec::new();

    match &mapping.source {
        MappingSource::EmbeddedFallback { requested } => warnings.push(format!(
            "Mapping file {} not found, using the built-in map",
            requested.display()
        )),
        MappingSource::Unreadable { path, error } => warnings.push(format!(
            "Mapping file {} is unreadable ({error}), nothing will be polled",
            path.display()
        )),
        MappingSource::Embedded | MappingSource::File(_) => {}
    }

    if mapping.registers.is_empty() {
        warnings.push("No registers configured".to_string());
    }

    for control in mapping.controls.iter().filter(|c| c.read_unique_id.is_none()) {
        warnings.push(format!(
            "Control '{}' has no readback register, its state is not read from the device",
            control.unique_id
        ));
    }

    if config.polling.scan_interval < config.connection.operation_timeout {
        warnings.push(format!(
            "scan_interval ({:?}) is shorter than operation_timeout ({:?})",
            config.polling.scan_interval, config.connection.operation_timeout
        ));
    }

    warnings
}

/// Loads and checks the configuration and mapping, then prints a summary.
pub fn validate(cli: &Cli, args: ValidateArgs) -> BinResult<()> {
    let config_path = &cli.config;

    if !config_path.exists() {
        return Err(BinError::Configuration(format!(
            "Configuration file not found: {}",
            config_path.display()
        )));
    }

    let config = load_config(config_path)?;
    let mapping = load_register_mapping(&config.mapping.path)?;
    let summary = ValidationSummary::new(config_path.display().to_string(), &config, &mapping);

    match args.format {
        OutputFormat::Text => {
            println!("Configuration is valid: {}", summary.config_path);
            println!();
            println!("Summary:");
            println!("  Device:     {}", summary.device);
            println!("  Transport:  {}", summary.transport);
            println!("  Mapping:    {}", summary.mapping);
            println!("  Sensors:    {}", summary.sensors);
            println!("  Controls:   {}", summary.controls);
            println!("  Readbacks:  {} injected", summary.injected_readbacks);
            println!(
                "  Windows:    {} input per cycle, {} holding on first cycle",
                summary.input_windows, summary.holding_windows
            );

            if !summary.warnings.is_empty() {
                println!();
                println!("Warnings:");
                for warning in &summary.warnings {
                    println!("  - {}", warning);
                }
            }

            if args.show_config {
                println!();
                println!("Parsed configuration:");
                println!("{}", to_yaml(&config)?);
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "summary": &summary,
                "config": if args.show_config { Some(&config) } else { None },
            });
            let rendered = serde_json::to_string_pretty(&output)
                .map_err(|e| BinError::runtime(format!("Cannot encode summary: {e}")))?;
            println!("{}", rendered);
        }
        OutputFormat::Yaml => {
            println!("{}", to_yaml(&summary)?);
            if args.show_config {
                println!("{}", to_yaml(&config)?);
            }
        }
    }

    if args.strict && !summary.warnings.is_empty() {
        return Err(BinError::Configuration(format!(
            "Strict mode: {} warning(s) found",
            summary.warnings.len()
        )));
    }

    Ok(())
}

fn to_yaml<T: Serialize>(value: &T) -> BinResult<String> {
    serde_yaml::to_string(value).map_err(|e| BinError::runtime(format!("Cannot encode YAML: {e}")))
}
