//! Appliance pool configuration settings

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration for the appliance pool
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Log level configuration
    pub log_level: String,

    /// Connection pool configuration
    pub pool: PoolConfig,

    /// Result cache configuration
    pub cache: CacheConfig,

    /// Simulated appliance configuration
    pub appliance: ApplianceConfig,

    /// Processing manager configuration
    pub manager: ManagerConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Runtime configuration
    pub runtime: RuntimeConfig,
}

/// Connection pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of appliance connections in existence at once
    pub max_connections: usize,

    /// Maximum time to wait for a connection in milliseconds (unbounded when unset)
    pub acquire_timeout_ms: Option<u64>,
}

/// Result cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache backend: "memory" or "redis"
    pub backend: String,

    /// Redis server URL (format: redis://[username:password@]host:port[/database])
    pub redis_url: String,

    /// Key prefix for entries stored in Redis
    pub key_prefix: String,
}

/// Simulated appliance configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplianceConfig {
    /// Simulated round-trip latency of one appliance call in milliseconds
    pub latency_ms: u64,
}

/// Processing manager configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Let concurrent callers for the same uncached key share one appliance call
    pub coalesce_inflight: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Enable file logging (default: false)
    pub enable_file_logging: bool,

    /// Directory for rolling log files
    pub log_dir: String,
}

/// Runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Runtime mode: "single_threaded" or "multi_threaded"
    pub mode: String,

    /// Number of worker threads for multi-threaded mode (0 = auto-detect CPU cores)
    pub worker_threads: Option<usize>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            pool: PoolConfig::default(),
            cache: CacheConfig::default(),
            appliance: ApplianceConfig::default(),
            manager: ManagerConfig::default(),
            logging: LoggingConfig::default(),
            runtime: RuntimeConfig::default(),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout_ms: None,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            redis_url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: "appliance:result:".to_string(),
        }
    }
}

impl Default for ApplianceConfig {
    fn default() -> Self {
        Self { latency_ms: 500 }
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            coalesce_inflight: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enable_file_logging: false,
            log_dir: "logs".to_string(),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            mode: "multi_threaded".to_string(),
            worker_threads: None, // Auto-detect CPU cores
        }
    }
}

impl PoolConfig {
    /// Acquire timeout as a `Duration`, if one is configured
    pub fn acquire_timeout(&self) -> Option<Duration> {
        self.acquire_timeout_ms.map(Duration::from_millis)
    }
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let config: AppConfig = serde_yaml::from_str(&contents)?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from `config.yml` with environment variable overrides
    pub fn load_config() -> Result<Self> {
        Self::load_config_from("config.yml")
    }

    /// Load configuration from the given YAML file with environment variable overrides
    pub fn load_config_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::Config(format!(
                "Config file '{}' not found",
                path.display()
            )));
        }

        let mut config = Self::from_yaml_file(path)?;
        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from environment variables on top of the defaults
    pub fn from_env_vars() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Override settings from environment variables
    pub fn apply_env_overrides(&mut self) {
        if let Ok(log_level) = std::env::var("RUST_LOG") {
            self.log_level = log_level;
        }

        // Pool settings
        if let Ok(max) = std::env::var("APPLIANCE_MAX_CONNECTIONS") {
            if let Ok(max) = max.parse() {
                self.pool.max_connections = max;
            }
        }

        if let Ok(timeout) = std::env::var("APPLIANCE_ACQUIRE_TIMEOUT_MS") {
            if let Ok(timeout) = timeout.parse() {
                self.pool.acquire_timeout_ms = Some(timeout);
            }
        }

        // Cache settings
        if let Ok(backend) = std::env::var("APPLIANCE_CACHE_BACKEND") {
            self.cache.backend = backend;
        }

        if let Ok(redis_url) = std::env::var("REDIS_URL") {
            self.cache.redis_url = redis_url;
        }

        if let Ok(prefix) = std::env::var("APPLIANCE_CACHE_KEY_PREFIX") {
            self.cache.key_prefix = prefix;
        }

        // Appliance settings
        if let Ok(latency) = std::env::var("APPLIANCE_LATENCY_MS") {
            if let Ok(latency) = latency.parse() {
                self.appliance.latency_ms = latency;
            }
        }

        // Manager settings
        if let Ok(coalesce) = std::env::var("APPLIANCE_COALESCE_INFLIGHT") {
            self.manager.coalesce_inflight = coalesce.to_lowercase() == "true";
        }

        // Logging settings
        if let Ok(enable_file_logging) = std::env::var("APPLIANCE_ENABLE_FILE_LOGGING") {
            self.logging.enable_file_logging = enable_file_logging.to_lowercase() == "true";
        }

        if let Ok(log_dir) = std::env::var("APPLIANCE_LOG_DIR") {
            self.logging.log_dir = log_dir;
        }

        // Runtime settings
        if let Ok(mode) = std::env::var("APPLIANCE_RUNTIME_MODE") {
            self.runtime.mode = mode;
        }

        if let Ok(threads) = std::env::var("APPLIANCE_WORKER_THREADS") {
            if let Ok(threads) = threads.parse() {
                self.runtime.worker_threads = Some(threads);
            }
        }
    }

    /// Reject settings the pool cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.pool.max_connections == 0 {
            return Err(Error::Config(
                "pool.max_connections must be a positive integer".to_string(),
            ));
        }

        match self.cache.backend.as_str() {
            "memory" | "redis" => {}
            other => {
                return Err(Error::Config(format!("Unknown cache backend '{}'", other)));
            }
        }

        match self.runtime.mode.as_str() {
            "single_threaded" | "multi_threaded" => {}
            other => {
                return Err(Error::Config(format!("Unknown runtime mode '{}'", other)));
            }
        }

        Ok(())
    }

    /// Render the configuration as YAML
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}
