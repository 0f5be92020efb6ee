//! Simulated appliance used by the CLI and the default configuration

use super::{Connection, ConnectionFactory};
use crate::config::settings::ApplianceConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Connection to the simulated appliance
pub struct SimulatedConnection {
    id: u64,
    latency: Duration,
    open: bool,
}

impl SimulatedConnection {
    pub fn new(id: u64, latency: Duration) -> Self {
        Self {
            id,
            latency,
            open: true,
        }
    }
}

#[async_trait]
impl Connection for SimulatedConnection {
    fn id(&self) -> u64 {
        self.id
    }

    async fn process(&self, payload: &str) -> Result<String> {
        if !self.open {
            return Err(Error::Connection(format!("connection #{} is closed", self.id)));
        }

        tokio::time::sleep(self.latency).await;
        debug!("Appliance connection #{} processed {} bytes", self.id, payload.len());
        Ok(format!("Encrypted_{}", payload))
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn close(&mut self) -> Result<()> {
        self.open = false;
        debug!("Closed appliance connection #{}", self.id);
        Ok(())
    }
}

/// Factory for [`SimulatedConnection`]s
#[derive(Debug, Clone)]
pub struct SimulatedAppliance {
    latency: Duration,
}

impl SimulatedAppliance {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }

    pub fn from_config(config: &ApplianceConfig) -> Self {
        Self::new(Duration::from_millis(config.latency_ms))
    }
}

impl Default for SimulatedAppliance {
    fn default() -> Self {
        Self::from_config(&ApplianceConfig::default())
    }
}

#[async_trait]
impl ConnectionFactory for SimulatedAppliance {
    async fn connect(&self, id: u64) -> Result<Box<dyn Connection>> {
        debug!("Opening simulated appliance connection #{}", id);
        Ok(Box::new(SimulatedConnection::new(id, self.latency)))
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}
