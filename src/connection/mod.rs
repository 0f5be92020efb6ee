//! Connections to the external processing appliance
//!
//! The pool treats a connection as an opaque capability with a single
//! operation, `process(payload) -> result`. Connections are created lazily
//! through a [`ConnectionFactory`] and closed explicitly when the pool shuts
//! down or when they report themselves as no longer open.

pub mod simulated;

#[cfg(test)]
pub(crate) mod mock;

use crate::error::Result;
use async_trait::async_trait;

pub use simulated::{SimulatedAppliance, SimulatedConnection};

/// A reusable handle to the processing appliance
#[async_trait]
pub trait Connection: Send + Sync {
    /// Identifier assigned by the pool when the connection was created
    fn id(&self) -> u64;

    /// Run one unit of work on the appliance
    async fn process(&self, payload: &str) -> Result<String>;

    /// Whether the connection can be handed out again
    fn is_open(&self) -> bool {
        true
    }

    /// Release any appliance-side resources held by this connection
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Opens new appliance connections on behalf of the pool
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn connect(&self, id: u64) -> Result<Box<dyn Connection>>;

    /// Short name used in log output
    fn name(&self) -> &'static str;
}
