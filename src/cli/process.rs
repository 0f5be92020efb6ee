//! `process` command: push payloads through the manager

use crate::config::settings::AppConfig;
use crate::connection::SimulatedAppliance;
use crate::manager::ProcessingManager;
use anyhow::{Context, Result};
use clap::Args;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Options shared by commands that build a manager
#[derive(Debug, Clone, Args)]
pub struct PoolArgs {
    /// Maximum number of appliance connections
    #[arg(long)]
    pub max_connections: Option<usize>,

    /// Simulated appliance latency in milliseconds
    #[arg(long)]
    pub latency_ms: Option<u64>,

    /// Give up waiting for a connection after this many milliseconds
    #[arg(long)]
    pub acquire_timeout_ms: Option<u64>,

    /// Share one appliance call between concurrent requests for the same payload
    #[arg(long, default_value = "false")]
    pub coalesce: bool,
}

impl PoolArgs {
    /// Apply command-line overrides on top of the loaded configuration
    pub fn apply(&self, config: &AppConfig) -> Result<AppConfig> {
        let mut config = config.clone();

        if let Some(max) = self.max_connections {
            config.pool.max_connections = max;
        }
        if let Some(latency) = self.latency_ms {
            config.appliance.latency_ms = latency;
        }
        if let Some(timeout) = self.acquire_timeout_ms {
            config.pool.acquire_timeout_ms = Some(timeout);
        }
        if self.coalesce {
            config.manager.coalesce_inflight = true;
        }

        config.validate().context("Invalid pool options")?;
        debug!("Effective pool configuration: {:?}", config.pool);
        Ok(config)
    }

    /// Build a manager backed by the simulated appliance
    pub fn build_manager(&self, config: &AppConfig) -> Result<ProcessingManager> {
        let config = self.apply(config)?;
        let factory = Arc::new(SimulatedAppliance::from_config(&config.appliance));
        ProcessingManager::from_config(&config, factory).context("Failed to build processing manager")
    }
}

#[derive(Debug, Args)]
pub struct ProcessArgs {
    /// Payloads to process
    #[arg(required = true)]
    pub payloads: Vec<String>,

    /// Process all payloads concurrently instead of one after another
    #[arg(long, default_value = "false")]
    pub concurrent: bool,

    #[command(flatten)]
    pub pool: PoolArgs,
}

impl ProcessArgs {
    /// Process every payload and report the results; fails if any request failed
    pub async fn execute(&self, config: &AppConfig) -> Result<()> {
        let manager = self.pool.build_manager(config)?;

        let results = if self.concurrent {
            manager.process_batch(&self.payloads).await
        } else {
            let mut results = Vec::with_capacity(self.payloads.len());
            for payload in &self.payloads {
                results.push(manager.process(payload).await);
            }
            results
        };

        let mut failures = 0;
        for (payload, result) in self.payloads.iter().zip(&results) {
            match result {
                Ok(value) => info!("Result for {}: {}", payload, value),
                Err(e) => {
                    failures += 1;
                    error!("Request for {} failed: {}", payload, e);
                }
            }
        }

        info!("{}", manager.pool().pool_info());
        info!("{}", manager.cache().cache_info());
        manager.shutdown().await;

        if failures > 0 {
            anyhow::bail!("{} of {} requests failed", failures, results.len());
        }
        Ok(())
    }
}
