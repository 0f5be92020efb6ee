//! Connection pool statistics

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time pool statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolStats {
    /// Connections opened through the factory
    pub connections_created: u64,
    /// Connections dropped instead of being returned to the idle set
    pub connections_discarded: u64,
    /// Successful acquisitions
    pub acquisitions: u64,
    /// Acquisitions served from the idle set
    pub reused: u64,
    /// Acquisitions that had to wait because every permit was taken
    pub exhausted_waits: u64,
    /// Total time spent waiting for connections (in milliseconds)
    pub total_wait_ms: u64,
}

impl PoolStats {
    /// Share of acquisitions served by an idle connection (0.0 to 1.0)
    pub fn reuse_rate(&self) -> f64 {
        if self.acquisitions == 0 {
            0.0
        } else {
            self.reused as f64 / self.acquisitions as f64
        }
    }

    pub fn avg_wait_time_ms(&self) -> f64 {
        if self.acquisitions == 0 {
            0.0
        } else {
            self.total_wait_ms as f64 / self.acquisitions as f64
        }
    }
}

/// Lock-free counters behind [`PoolStats`]
#[derive(Debug, Default)]
pub(crate) struct AtomicPoolStats {
    connections_created: AtomicU64,
    connections_discarded: AtomicU64,
    acquisitions: AtomicU64,
    reused: AtomicU64,
    exhausted_waits: AtomicU64,
    total_wait_ms: AtomicU64,
}

impl AtomicPoolStats {
    pub fn record_created(&self) {
        self.connections_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discarded(&self) {
        self.connections_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_acquisition(&self, wait_ms: u64, reused: bool) {
        self.acquisitions.fetch_add(1, Ordering::Relaxed);
        self.total_wait_ms.fetch_add(wait_ms, Ordering::Relaxed);
        if reused {
            self.reused.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_exhausted(&self) {
        self.exhausted_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PoolStats {
        PoolStats {
            connections_created: self.connections_created.load(Ordering::Relaxed),
            connections_discarded: self.connections_discarded.load(Ordering::Relaxed),
            acquisitions: self.acquisitions.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            exhausted_waits: self.exhausted_waits.load(Ordering::Relaxed),
            total_wait_ms: self.total_wait_ms.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates_on_empty_stats() {
        let stats = PoolStats::default();
        assert_eq!(stats.reuse_rate(), 0.0);
        assert_eq!(stats.avg_wait_time_ms(), 0.0);
    }

    #[test]
    fn test_snapshot_rates() {
        let stats = AtomicPoolStats::default();
        stats.record_acquisition(10, false);
        stats.record_acquisition(30, true);
        stats.record_acquisition(20, true);
        stats.record_acquisition(0, true);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.acquisitions, 4);
        assert_eq!(snapshot.reuse_rate(), 0.75);
        assert_eq!(snapshot.avg_wait_time_ms(), 15.0);
    }
}
