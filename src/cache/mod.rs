//! Result caching with in-memory and Redis backends

pub mod memory;
#[cfg(feature = "redis-support")]
pub mod redis_cache;

use crate::config::settings::CacheConfig;
use crate::error::{Error, Result};
use std::sync::Arc;
use tracing::info;

pub use memory::MemoryCache;
#[cfg(feature = "redis-support")]
pub use redis_cache::RedisCache;

/// Memoized appliance results keyed by request payload
///
/// Entries are never evicted and have no TTL. Writing a key twice is allowed;
/// the appliance is deterministic per key so either value is correct.
pub trait RequestCache: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn put(&self, key: &str, result: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
    fn len(&self) -> Result<usize>;
    fn cache_info(&self) -> String;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// Build the cache backend named in the configuration
pub fn build_cache(config: &CacheConfig) -> Result<Arc<dyn RequestCache>> {
    match config.backend.as_str() {
        "memory" => {
            info!("Using in-memory result cache");
            Ok(Arc::new(MemoryCache::new()))
        }
        "redis" => {
            #[cfg(feature = "redis-support")]
            {
                let cache = RedisCache::new(&config.redis_url, Some(config.key_prefix.clone()))?;
                info!("Using Redis result cache at {}", config.redis_url);
                Ok(Arc::new(cache))
            }
            #[cfg(not(feature = "redis-support"))]
            {
                Err(Error::Config(
                    "Redis cache requested but the redis-support feature is disabled".to_string(),
                ))
            }
        }
        other => Err(Error::Config(format!("Unknown cache backend '{}'", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_memory_cache() {
        let cache = build_cache(&CacheConfig::default()).unwrap();
        assert!(cache.is_empty().unwrap());
        assert!(cache.cache_info().starts_with("Memory cache"));
    }

    #[test]
    fn test_unknown_backend() {
        let config = CacheConfig {
            backend: "disk".to_string(),
            ..CacheConfig::default()
        };
        assert!(matches!(build_cache(&config), Err(Error::Config(_))));
    }

    #[cfg(not(feature = "redis-support"))]
    #[test]
    fn test_redis_without_feature() {
        let config = CacheConfig {
            backend: "redis".to_string(),
            ..CacheConfig::default()
        };
        assert!(matches!(build_cache(&config), Err(Error::Config(_))));
    }
}
