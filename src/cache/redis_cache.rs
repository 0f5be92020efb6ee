//! Redis result cache

use super::RequestCache;
use crate::error::{Error, Result};
use redis::{Commands, Connection};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info};

/// Result cache shared through Redis; entries are stored without expiry.
///
/// Commands go over one synchronous connection, so each lookup or insert
/// blocks the calling runtime worker for a Redis round trip. Keep the server
/// close by (same host or LAN); the memory backend is the default for this
/// reason.
pub struct RedisCache {
    connection: Mutex<Connection>,
    key_prefix: String,
}

impl RedisCache {
    pub fn new(redis_url: &str, key_prefix: Option<String>) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| Error::Cache(format!("Failed to create Redis client: {}", e)))?;

        let connection = client
            .get_connection()
            .map_err(|e| Error::Cache(format!("Failed to connect to Redis: {}", e)))?;

        let key_prefix = key_prefix.unwrap_or_else(|| "appliance:result:".to_string());

        info!("Connected to Redis result cache (prefix: {})", key_prefix);

        Ok(Self {
            connection: Mutex::new(connection),
            key_prefix,
        })
    }

    fn make_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    fn connection(&self) -> MutexGuard<'_, Connection> {
        self.connection.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn prefixed_keys(&self, conn: &mut Connection) -> Result<Vec<String>> {
        let pattern = format!("{}*", self.key_prefix);
        Ok(conn.keys(&pattern)?)
    }
}

impl RequestCache for RedisCache {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let redis_key = self.make_key(key);
        let mut conn = self.connection();

        match conn.get::<_, Option<String>>(&redis_key) {
            Ok(Some(result)) => {
                debug!("Redis cache HIT for key: {}", key);
                Ok(Some(result))
            }
            Ok(None) => {
                debug!("Redis cache MISS for key: {}", key);
                Ok(None)
            }
            Err(e) => {
                error!("Redis get error for key {}: {}", key, e);
                Ok(None) // Treat as a miss; the appliance can recompute it
            }
        }
    }

    fn put(&self, key: &str, result: &str) -> Result<()> {
        let redis_key = self.make_key(key);
        let mut conn = self.connection();

        conn.set::<_, _, ()>(&redis_key, result).map_err(|e| {
            error!("Failed to cache result in Redis for key {}: {}", key, e);
            Error::Cache(format!("Redis set error: {}", e))
        })?;
        debug!("Cached result in Redis for key: {}", key);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let redis_key = self.make_key(key);
        let mut conn = self.connection();

        let count: i32 = conn
            .del(&redis_key)
            .map_err(|e| Error::Cache(format!("Redis delete error: {}", e)))?;
        if count > 0 {
            debug!("Removed result from Redis cache for key: {}", key);
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut conn = self.connection();
        let keys = self.prefixed_keys(&mut conn)?;

        if !keys.is_empty() {
            let count: i32 = conn.del(&keys)?;
            info!("Cleared Redis result cache ({} entries removed)", count);
        }
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        let mut conn = self.connection();
        Ok(self.prefixed_keys(&mut conn)?.len())
    }

    fn cache_info(&self) -> String {
        match self.len() {
            Ok(len) => format!("Redis cache: {} entries (prefix: {})", len, self.key_prefix),
            Err(_) => format!("Redis cache: unknown entries (prefix: {})", self.key_prefix),
        }
    }
}
