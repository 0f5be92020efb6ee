//! Per-key turn-taking for uncached requests

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

struct KeyLock {
    lock: Arc<AsyncMutex<()>>,
    /// Callers holding or waiting for this key
    holders: usize,
}

/// Keys currently being computed, each with a lock that callers queue on
#[derive(Default)]
pub(super) struct InflightRequests {
    keys: Mutex<HashMap<String, KeyLock>>,
}

impl InflightRequests {
    fn keys(&self) -> MutexGuard<'_, HashMap<String, KeyLock>> {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait until no other caller is working on `key`
    pub(super) async fn enter(&self, key: &str) -> InflightTurn<'_> {
        let lock = {
            let mut keys = self.keys();
            let entry = keys.entry(key.to_string()).or_insert_with(|| KeyLock {
                lock: Arc::default(),
                holders: 0,
            });
            entry.holders += 1;
            entry.lock.clone()
        };

        // Registered before waiting, so a cancelled wait still unregisters.
        let mut turn = InflightTurn {
            requests: self,
            key: key.to_string(),
            guard: None,
        };
        turn.guard = Some(lock.lock_owned().await);
        turn
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.keys().len()
    }
}

/// Exclusive turn on one key; the map entry goes away with the last holder
pub(super) struct InflightTurn<'a> {
    requests: &'a InflightRequests,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for InflightTurn<'_> {
    fn drop(&mut self) {
        let mut keys = self.requests.keys();
        drop(self.guard.take());
        if let Some(entry) = keys.get_mut(&self.key) {
            entry.holders -= 1;
            if entry.holders == 0 {
                keys.remove(&self.key);
            }
        }
    }
}
