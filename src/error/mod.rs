//! Error handling module for the appliance pool

use std::time::Duration;
use thiserror::Error;

/// Custom error type for pooled appliance processing
#[derive(Error, Debug)]
pub enum Error {
    #[error("Appliance connection error: {0}")]
    Connection(String),

    #[error("Failed to open appliance connection: {0}")]
    ConnectionCreate(String),

    #[error("Connection pool is closed")]
    PoolClosed,

    #[error("Timed out after {0:?} waiting for a pooled connection")]
    AcquireTimeout(Duration),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// Result type for the appliance pool
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(feature = "redis-support")]
impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        Error::Cache(err.to_string())
    }
}
