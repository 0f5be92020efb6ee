//! Cache-then-pool request processing
//!
//! A request is answered from the cache when possible. Otherwise a pooled
//! connection is checked out, the appliance does the work, a successful result
//! is cached and the connection goes back to the pool whether or not the work
//! succeeded.

mod inflight;

use crate::cache::{build_cache, RequestCache};
use crate::config::settings::AppConfig;
use crate::connection::ConnectionFactory;
use crate::error::Result;
use crate::log_processing_record;
use crate::models::ProcessingRecord;
use crate::pool::ConnectionPool;
use crate::utils::elapsed_ms;
use futures::future::join_all;
use inflight::InflightRequests;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Front door for appliance requests
pub struct ProcessingManager {
    pool: ConnectionPool,
    cache: Arc<dyn RequestCache>,
    acquire_timeout: Option<Duration>,
    inflight: Option<InflightRequests>,
}

impl ProcessingManager {
    pub fn new(pool: ConnectionPool, cache: Arc<dyn RequestCache>) -> Self {
        Self {
            pool,
            cache,
            acquire_timeout: None,
            inflight: None,
        }
    }

    /// Wire a pool and cache from configuration
    pub fn from_config(config: &AppConfig, factory: Arc<dyn ConnectionFactory>) -> Result<Self> {
        config.validate()?;

        let pool = ConnectionPool::from_config(&config.pool, factory)?;
        let cache = build_cache(&config.cache)?;

        info!(
            "Processing manager ready (max_connections: {}, acquire timeout: {:?}, coalescing: {})",
            config.pool.max_connections,
            config.pool.acquire_timeout(),
            config.manager.coalesce_inflight
        );

        Ok(Self::new(pool, cache)
            .with_acquire_timeout(config.pool.acquire_timeout())
            .with_coalescing(config.manager.coalesce_inflight))
    }

    /// Bound how long a request waits for a free connection
    pub fn with_acquire_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Make concurrent callers for the same uncached key share one appliance call
    pub fn with_coalescing(mut self, enabled: bool) -> Self {
        self.inflight = enabled.then(InflightRequests::default);
        self
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub fn cache(&self) -> &Arc<dyn RequestCache> {
        &self.cache
    }

    /// Process one request
    ///
    /// A cache hit returns without touching the pool. Appliance failures are
    /// returned to the caller and are not cached.
    pub async fn process(&self, data: &str) -> Result<String> {
        let started = Instant::now();

        if let Some(result) = self.lookup(data, started) {
            return Ok(result);
        }

        match &self.inflight {
            None => self.process_uncached(data, started).await,
            Some(inflight) => {
                let _turn = inflight.enter(data).await;
                // The caller we queued behind may have cached it already.
                if let Some(result) = self.lookup(data, started) {
                    return Ok(result);
                }
                self.process_uncached(data, started).await
            }
        }
    }

    /// Process several requests concurrently; results keep the input order
    pub async fn process_batch<S: AsRef<str>>(&self, items: &[S]) -> Vec<Result<String>> {
        join_all(items.iter().map(|item| self.process(item.as_ref()))).await
    }

    /// Close the pool. Cached results remain readable.
    pub async fn shutdown(&self) {
        self.pool.close().await;
        let stats = self.pool.stats();
        info!(
            "Processing manager shut down ({} acquisitions, {} connections opened, reuse {:.1}%)",
            stats.acquisitions,
            stats.connections_created,
            stats.reuse_rate() * 100.0
        );
    }

    fn lookup(&self, data: &str, started: Instant) -> Option<String> {
        match self.cache.get(data) {
            Ok(Some(result)) => {
                log_processing_record!(&ProcessingRecord::cache_hit(data, elapsed_ms(started)));
                Some(result)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Cache lookup failed for key {}, treating as miss: {}", data, e);
                None
            }
        }
    }

    async fn process_uncached(&self, data: &str, started: Instant) -> Result<String> {
        let conn = match self.acquire_timeout {
            Some(timeout) => self.pool.acquire_timeout(timeout).await?,
            None => self.pool.acquire().await?,
        };
        let connection_id = conn.id();

        let outcome = conn.process(data).await;

        if let Ok(result) = &outcome {
            if let Err(e) = self.cache.put(data, result) {
                warn!("Failed to cache result for key {}: {}", data, e);
            }
        }

        self.pool.release(conn);

        let record = ProcessingRecord::appliance(
            data,
            connection_id,
            outcome.as_ref().err().map(|e| e.to_string()),
            elapsed_ms(started),
        );
        log_processing_record!(&record);

        match &outcome {
            Ok(_) => debug!("Processed key {} on connection #{}", data, connection_id),
            Err(e) => warn!("Appliance failed for key {} on connection #{}: {}", data, connection_id, e),
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::connection::mock::MockFactory;
    use crate::connection::SimulatedAppliance;
    use crate::error::Error;
    use std::sync::atomic::Ordering;

    fn manager_with(factory: &MockFactory, max: usize) -> ProcessingManager {
        let pool = ConnectionPool::new(Arc::new(factory.clone()), max).unwrap();
        ProcessingManager::new(pool, Arc::new(MemoryCache::new()))
    }

    #[tokio::test]
    async fn test_repeated_request_is_served_from_cache() {
        let factory = MockFactory::new(Duration::from_millis(5));
        let manager = manager_with(&factory, 10);

        let first = manager.process("Transaction1").await.unwrap();
        assert_eq!(first, "Encrypted_Transaction1");

        let second = manager.process("Transaction2").await.unwrap();
        assert_eq!(second, "Encrypted_Transaction2");
        assert_ne!(first, second);

        let acquisitions_before = manager.pool().stats().acquisitions;
        let again = manager.process("Transaction1").await.unwrap();
        assert_eq!(again, first);
        assert_eq!(factory.counters.calls_for("Transaction1"), 1);
        assert_eq!(manager.pool().stats().acquisitions, acquisitions_before);
    }

    #[tokio::test]
    async fn test_failure_is_propagated_and_not_cached() {
        let factory = MockFactory::new(Duration::from_millis(5)).failing_on(&["bad"]);
        let manager = manager_with(&factory, 1);

        let err = manager.process("bad").await.unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
        assert_eq!(manager.cache().get("bad").unwrap(), None);

        // The connection went back to the pool.
        assert_eq!(manager.pool().in_use(), 0);
        assert_eq!(manager.pool().idle(), 1);
        let conn = manager
            .pool()
            .acquire_timeout(Duration::from_millis(20))
            .await
            .unwrap();
        drop(conn);

        // Failures are retried on the next call rather than memoized.
        assert!(manager.process("bad").await.is_err());
        assert_eq!(factory.counters.calls_for("bad"), 2);
        assert_eq!(manager.process("good").await.unwrap(), "Encrypted_good");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_requests_within_capacity_never_wait() {
        let factory = MockFactory::new(Duration::from_millis(50));
        let manager = manager_with(&factory, 4);

        let keys = ["a", "b", "c", "d"];
        let results = manager.process_batch(&keys).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(manager.pool().stats().exhausted_waits, 0);
        assert_eq!(manager.pool().live(), 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_exhaustion_delays_instead_of_failing() {
        let latency = Duration::from_millis(100);
        let factory = MockFactory::new(latency);
        let manager = manager_with(&factory, 1);

        let started = Instant::now();
        let results = manager.process_batch(&["first", "second"]).await;
        let elapsed = started.elapsed();

        assert_eq!(results[0].as_deref().unwrap(), "Encrypted_first");
        assert_eq!(results[1].as_deref().unwrap(), "Encrypted_second");
        assert!(elapsed >= latency * 2);
        assert!(manager.pool().stats().exhausted_waits >= 1);
        assert_eq!(factory.counters.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_batch_respects_pool_bound() {
        let factory = MockFactory::new(Duration::from_millis(10));
        let manager = manager_with(&factory, 3);

        let keys: Vec<String> = (0..12).map(|i| format!("tx-{}", i)).collect();
        let results = manager.process_batch(&keys).await;

        for (key, result) in keys.iter().zip(&results) {
            assert_eq!(result.as_deref().unwrap(), format!("Encrypted_{}", key));
        }
        assert!(factory.counters.peak_active.load(Ordering::SeqCst) <= 3);
        assert!(manager.pool().live() <= 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_duplicate_misses_without_coalescing_agree() {
        let factory = MockFactory::new(Duration::from_millis(30));
        let manager = manager_with(&factory, 4);

        let results = manager.process_batch(&["same", "same", "same"]).await;
        assert!(results
            .iter()
            .all(|r| r.as_deref().unwrap() == "Encrypted_same"));
        assert!(factory.counters.calls_for("same") >= 1);
        assert_eq!(manager.cache().len().unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_coalescing_shares_one_appliance_call() {
        let factory = MockFactory::new(Duration::from_millis(30));
        let manager = manager_with(&factory, 4).with_coalescing(true);

        let keys = ["same", "same", "same", "same", "other"];
        let results = manager.process_batch(&keys).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(factory.counters.calls_for("same"), 1);
        assert_eq!(factory.counters.calls_for("other"), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_coalesced_failure_lets_waiters_retry() {
        let factory = MockFactory::new(Duration::from_millis(10)).failing_on(&["bad"]);
        let manager = manager_with(&factory, 4).with_coalescing(true);

        let results = manager.process_batch(&["bad", "bad", "bad"]).await;

        assert!(results.iter().all(|r| r.is_err()));
        assert_eq!(factory.counters.calls_for("bad"), 3);
        assert_eq!(factory.counters.peak_active.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_acquire_timeout_surfaces_to_caller() {
        let factory = MockFactory::new(Duration::from_millis(200));
        let manager =
            manager_with(&factory, 1).with_acquire_timeout(Some(Duration::from_millis(20)));

        let results = manager.process_batch(&["slow-a", "slow-b"]).await;

        let timeouts = results
            .iter()
            .filter(|r| matches!(r, Err(Error::AcquireTimeout(_))))
            .count();
        assert_eq!(timeouts, 1);
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_keeps_cache_readable() {
        let factory = MockFactory::new(Duration::from_millis(1));
        let manager = manager_with(&factory, 2);

        manager.process("kept").await.unwrap();
        manager.shutdown().await;

        assert_eq!(manager.process("kept").await.unwrap(), "Encrypted_kept");
        assert!(matches!(
            manager.process("new").await,
            Err(Error::PoolClosed)
        ));
        assert_eq!(manager.pool().live(), 0);
    }

    #[tokio::test]
    async fn test_from_config_with_simulated_appliance() {
        let mut config = AppConfig::default();
        config.pool.max_connections = 2;
        config.appliance.latency_ms = 1;
        config.manager.coalesce_inflight = true;

        let factory = Arc::new(SimulatedAppliance::from_config(&config.appliance));
        let manager = ProcessingManager::from_config(&config, factory).unwrap();

        assert_eq!(manager.pool().max_connections(), 2);
        assert_eq!(
            manager.process("Transaction1").await.unwrap(),
            "Encrypted_Transaction1"
        );
        assert_eq!(manager.cache().len().unwrap(), 1);
    }

    #[test]
    fn test_from_config_rejects_zero_capacity() {
        let mut config = AppConfig::default();
        config.pool.max_connections = 0;
        let factory = Arc::new(SimulatedAppliance::default());
        assert!(matches!(
            ProcessingManager::from_config(&config, factory),
            Err(Error::Config(_))
        ));
    }
}
