//! In-memory result cache

use super::RequestCache;
use crate::error::Result;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, info};

/// Process-lifetime map from request payload to appliance result
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, String>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryCache {
    pub fn new() -> Self {
        debug!("Creating in-memory result cache");
        Self::default()
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

impl RequestCache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        match entries.get(key) {
            Some(result) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Cache HIT for key: {}", key);
                Ok(Some(result.clone()))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("Cache MISS for key: {}", key);
                Ok(None)
            }
        }
    }

    fn put(&self, key: &str, result: &str) -> Result<()> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), result.to_string());
        debug!("Cached result for key: {}", key);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.remove(key).is_some() {
            debug!("Removed result from cache for key: {}", key);
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let count = entries.len();
        entries.clear();
        info!("Cleared result cache ({} entries removed)", count);
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.entries.read().unwrap_or_else(PoisonError::into_inner).len())
    }

    fn cache_info(&self) -> String {
        let len = self.entries.read().unwrap_or_else(PoisonError::into_inner).len();
        format!(
            "Memory cache: {} entries ({} hits, {} misses)",
            len,
            self.hits(),
            self.misses()
        )
    }
}
