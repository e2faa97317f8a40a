// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `poll` command.

use serde::Serialize;

use growatt_modbus::{ControlSet, Coordinator};

use crate::cli::{Cli, OutputFormat, PollArgs};
use crate::error::{BinError, BinResult};
use crate::runtime::Gateway;

/// One sensor line of the report.
#[derive(Debug, Serialize)]
pub struct SensorReading {
    /// Register unique id.
    pub unique_id: String,
    /// Display name.
    pub name: String,
    /// Decoded value, absent when unreadable.
    pub value: Option<f64>,
    /// Value with enum labels resolved.
    pub display: Option<String>,
    /// Unit of measurement.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// One control line of the report.
#[derive(Debug, Serialize)]
pub struct ControlReading {
    /// Control unique id.
    pub unique_id: String,
    /// Control kind.
    pub kind: String,
    /// Current state, if known.
    pub state: Option<String>,
}

/// Snapshot rendered for output.
#[derive(Debug, Serialize)]
pub struct SnapshotReport {
    /// Device description.
    pub device: String,
    /// RFC 3339 time of the last successful cycle.
    pub last_updated: Option<String>,
    /// Whether the last cycle succeeded.
    pub last_update_success: bool,
    /// Sensor values in mapping order.
    pub sensors: Vec<SensorReading>,
    /// Control states.
    pub controls: Vec<ControlReading>,
}

impl SnapshotReport {
    /// Collects the current snapshot of `coordinator`.
    pub fn collect(coordinator: &Coordinator, controls: &ControlSet) -> Self {
        let snapshot = coordinator.get_snapshot();

        let sensors = coordinator
            .registers()
            .iter()
            .map(|register| {
                let value = snapshot.get(&register.unique_id).copied().flatten();
                SensorReading {
                    unique_id: register.unique_id.clone(),
                    name: register.name.clone(),
                    value,
                    display: register.display_value(value),
                    unit: register.unit_of_measurement.clone(),
                }
            })
            .collect();

        let controls = controls
            .controls()
            .iter()
            .map(|control| ControlReading {
                unique_id: control.unique_id.clone(),
                kind: control.kind.to_string(),
                state: controls
                    .state(coordinator, &control.unique_id)
                    .map(|s| s.to_string()),
            })
            .collect();

        Self {
            device: coordinator.name().to_string(),
            last_updated: coordinator.last_updated().map(|t| t.to_rfc3339()),
            last_update_success: coordinator.last_update_success(),
            sensors,
            controls,
        }
    }

    /// Renders the report.
    pub fn render(&self, format: OutputFormat) -> BinResult<String> {
        match format {
            OutputFormat::Json => serde_json::to_string_pretty(self)
                .map_err(|e| BinError::runtime(format!("Cannot encode report: {e}"))),
            OutputFormat::Yaml => serde_yaml::to_string(self)
                .map_err(|e| BinError::runtime(format!("Cannot encode report: {e}"))),
            OutputFormat::Text => Ok(self.render_text()),
        }
    }

    fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Device: {}\n", self.device));
        out.push_str(&format!(
            "Updated: {} ({})\n",
            self.last_updated.as_deref().unwrap_or("never"),
            if self.last_update_success { "ok" } else { "stale" }
        ));

        out.push_str("\nSensors:\n");
        for sensor in &self.sensors {
            let display = sensor.display.as_deref().unwrap_or("-");
            let unit = sensor.unit.as_deref().unwrap_or("");
            out.push_str(&format!(
                "  {:<28} {:>12} {}\n",
                sensor.unique_id, display, unit
            ));
        }

        if !self.controls.is_empty() {
            out.push_str("\nControls:\n");
            for control in &self.controls {
                out.push_str(&format!(
                    "  {:<28} {:>12} ({})\n",
                    control.unique_id,
                    control.state.as_deref().unwrap_or("-"),
                    control.kind
                ));
            }
        }
        out
    }
}

/// Runs the requested cycles and prints the snapshot.
pub async fn poll(cli: &Cli, args: PollArgs) -> BinResult<()> {
    let gateway = Gateway::builder().config_path(&cli.config).build()?;

    let result = gateway.poll(args.cycles).await;
    let report = SnapshotReport::collect(gateway.coordinator(), gateway.controls());
    gateway.close().await;

    result?;
    println!("{}", report.render(args.format)?);
    Ok(())
}
