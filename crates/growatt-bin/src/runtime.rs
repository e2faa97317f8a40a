// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Gateway runtime orchestration.
//!
//! Wires configuration, register mapping, the coordinator, and the controls
//! together, then either drives the poll scheduler until shutdown or runs a
//! fixed number of cycles.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use growatt_config::{load_config, load_register_mapping, GatewayConfig, RegisterMapping};
use growatt_modbus::{ControlSet, Coordinator, PollScheduler, RegisterClient, Snapshot};

use crate::error::{BinError, BinResult};
use crate::shutdown::ShutdownCoordinator;

// =============================================================================
// Gateway
// =============================================================================

/// One configured device: coordinator plus controls.
pub struct Gateway {
    config: Arc<GatewayConfig>,
    mapping: RegisterMapping,
    coordinator: Arc<Coordinator>,
    controls: Arc<ControlSet>,
}

impl Gateway {
    /// Returns a builder.
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }

    /// Returns the loaded configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Returns the normalized register mapping.
    pub fn mapping(&self) -> &RegisterMapping {
        &self.mapping
    }

    /// Returns the shared coordinator.
    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    /// Returns the configured controls.
    pub fn controls(&self) -> &Arc<ControlSet> {
        &self.controls
    }

    /// Builds a poll scheduler from the polling settings.
    pub fn scheduler(&self, scan_interval: Option<Duration>) -> PollScheduler {
        let scan_interval = scan_interval.unwrap_or(self.config.polling.scan_interval);
        PollScheduler::new(Arc::clone(&self.coordinator), scan_interval)
            .with_failure_backoff_max(self.config.polling.failure_backoff_max)
    }

    /// Polls until shutdown, then closes the coordinator.
    pub async fn run(
        &self,
        shutdown: &ShutdownCoordinator,
        scan_interval: Option<Duration>,
    ) -> BinResult<()> {
        info!(
            device = %self.config.connection.describe(),
            mapping = %self.mapping.source,
            registers = self.mapping.registers.len(),
            controls = self.controls.len(),
            "Starting gateway"
        );

        let listener = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { shutdown.wait_for_shutdown().await })
        };

        let scheduler = self.scheduler(scan_interval);
        let health = scheduler.health();
        scheduler.run(shutdown.shutdown_signal()).await;

        listener.abort();
        self.coordinator.close().await;

        info!(
            cycles_ok = health.cycles_ok(),
            cycles_failed = health.cycles_failed(),
            requests = self.coordinator.stats().total_requests(),
            "Gateway stopped"
        );
        Ok(())
    }

    /// Runs `cycles` refreshes back to back and returns the last snapshot.
    ///
    /// Earlier failures are logged; the last cycle's error is returned.
    pub async fn poll(&self, cycles: u32) -> BinResult<Snapshot> {
        let cycles = cycles.max(1);
        let mut last = Err(BinError::runtime("no poll cycle ran"));

        for cycle in 1..=cycles {
            last = match self.coordinator.refresh().await {
                Ok(snapshot) => {
                    info!(cycle, values = snapshot.len(), "Poll cycle complete");
                    Ok(snapshot)
                }
                Err(e) => {
                    warn!(cycle, error = %e, "Poll cycle failed");
                    Err(BinError::from(e).with_context(format!("poll cycle {cycle}")))
                }
            };
        }

        last
    }

    /// Closes the coordinator.
    pub async fn close(&self) {
        self.coordinator.close().await;
    }
}

// =============================================================================
// GatewayBuilder
// =============================================================================

/// Builder for [`Gateway`].
#[derive(Default)]
pub struct GatewayBuilder {
    config_path: Option<PathBuf>,
    config: Option<GatewayConfig>,
    mapping: Option<RegisterMapping>,
    client: Option<RegisterClient>,
}

impl GatewayBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the configuration file path.
    pub fn config_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Uses an already loaded configuration.
    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Uses an already normalized mapping instead of `mapping.path`.
    pub fn mapping(mut self, mapping: RegisterMapping) -> Self {
        self.mapping = Some(mapping);
        self
    }

    /// Uses `client` instead of the transport selected by the connection settings.
    pub fn client(mut self, client: RegisterClient) -> Self {
        self.client = Some(client);
        self
    }

    /// Loads whatever was not supplied and builds the gateway.
    pub fn build(self) -> BinResult<Gateway> {
        let config = match (self.config, self.config_path) {
            (Some(config), _) => config,
            (None, Some(path)) => load_config(&path)?,
            (None, None) => {
                return Err(BinError::config(
                    "Either config or config_path must be provided",
                ))
            }
        };

        let mapping = match self.mapping {
            Some(mapping) => mapping,
            None => load_register_mapping(&config.mapping.path)?,
        };

        let controls = ControlSet::new(mapping.controls.clone())?;
        let client = match self.client {
            Some(client) => client,
            None => {
                config.connection.validate()?;
                RegisterClient::from_config(&config.connection)
            }
        };
        let coordinator = Coordinator::new(mapping.registers.clone(), client)?;

        Ok(Gateway {
            config: Arc::new(config),
            mapping,
            coordinator: Arc::new(coordinator),
            controls: Arc::new(controls),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
