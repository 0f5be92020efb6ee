//! Appliance Pool - bounded connection pooling and result caching for an
//! external processing appliance
//!
//! Requests go through a [`ProcessingManager`], which answers from the
//! [`RequestCache`] when it can and otherwise checks a connection out of the
//! [`ConnectionPool`], delegates the work and caches the result.

pub mod cache;
pub mod cli;
pub mod config;
pub mod connection;
pub mod error;
pub mod logging;
pub mod manager;
pub mod models;
pub mod pool;
pub mod utils;

// Re-export commonly used items
pub use cache::{MemoryCache, RequestCache};
pub use config::settings::AppConfig;
pub use connection::{Connection, ConnectionFactory, SimulatedAppliance};
pub use error::{Error, Result};
pub use logging::{init_logger_with_config, log_debug, log_error, log_info, log_trace, log_warning};
pub use manager::ProcessingManager;
pub use models::{ProcessingRecord, ResultSource};
pub use pool::{ConnectionPool, PoolStats, PooledConnection};

/// Runtime utilities for creating single-threaded vs multi-threaded Tokio runtimes
pub mod runtime {
    use crate::config::settings::RuntimeConfig;
    use anyhow::{Context, Result};
    use tokio::runtime::{Builder, Runtime};

    /// Create a Tokio runtime based on the configuration
    pub fn create_runtime(config: &RuntimeConfig) -> Result<Runtime> {
        match config.mode.as_str() {
            "single_threaded" => {
                tracing::info!("🧵 Initializing single-threaded runtime");
                Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .context("Failed to create single-threaded runtime")
            }
            "multi_threaded" => {
                let mut builder = Builder::new_multi_thread();
                builder.enable_all();

                match config.worker_threads {
                    Some(threads) if threads > 0 => {
                        tracing::info!("🧵 Initializing multi-threaded runtime with {} worker threads", threads);
                        builder.worker_threads(threads);
                    }
                    _ => {
                        tracing::info!("🧵 Initializing multi-threaded runtime with auto-detected CPU cores");
                    }
                }

                builder.build()
                    .context("Failed to create multi-threaded runtime")
            }
            _ => {
                tracing::warn!("⚠️  Unknown runtime mode '{}', defaulting to multi-threaded", config.mode);
                Builder::new_multi_thread()
                    .enable_all()
                    .build()
                    .context("Failed to create default multi-threaded runtime")
            }
        }
    }

    /// Execute an async function with the configured runtime
    pub fn run_with_runtime<F, T>(config: &RuntimeConfig, future: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        let runtime = create_runtime(config)?;
        runtime.block_on(future)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_single_threaded_runtime_runs_future() {
            let config = RuntimeConfig {
                mode: "single_threaded".to_string(),
                worker_threads: None,
            };
            let value = run_with_runtime(&config, async { Ok(21 * 2) }).unwrap();
            assert_eq!(value, 42);
        }

        #[test]
        fn test_multi_threaded_runtime_with_fixed_workers() {
            let config = RuntimeConfig {
                mode: "multi_threaded".to_string(),
                worker_threads: Some(2),
            };
            assert!(create_runtime(&config).is_ok());
        }
    }
}
