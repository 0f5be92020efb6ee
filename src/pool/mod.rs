//! Bounded pool of appliance connections

pub mod connection_pool;
pub mod stats;

pub use connection_pool::{ConnectionPool, PooledConnection};
pub use stats::PoolStats;
