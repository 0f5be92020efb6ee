//! Connection pooling for the processing appliance
//!
//! Capacity is enforced by a semaphore holding one permit per allowed
//! connection. A caller holds a permit for as long as it has a connection
//! checked out, so waiting for a free connection suspends on the semaphore
//! instead of polling. The idle stack and the live-connection count sit
//! behind a single lock and are only ever changed together.

use super::stats::{AtomicPoolStats, PoolStats};
use crate::config::settings::PoolConfig;
use crate::connection::{Connection, ConnectionFactory};
use crate::error::{Error, Result};
use crate::utils::elapsed_ms;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tracing::{debug, info, warn};

struct PoolState {
    idle: Vec<Box<dyn Connection>>,
    /// Idle plus checked-out plus being opened
    live: usize,
    closed: bool,
}

struct PoolInner {
    factory: Arc<dyn ConnectionFactory>,
    semaphore: Arc<Semaphore>,
    state: Mutex<PoolState>,
    max_connections: usize,
    next_id: AtomicU64,
    stats: AtomicPoolStats,
}

/// Bounded pool of reusable appliance connections
///
/// Cloning is cheap; clones share the same connections.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    pub fn new(factory: Arc<dyn ConnectionFactory>, max_connections: usize) -> Result<Self> {
        if max_connections == 0 {
            return Err(Error::Config(
                "max_connections must be a positive integer".to_string(),
            ));
        }

        debug!(
            "Creating connection pool (factory: {}, max_connections: {})",
            factory.name(),
            max_connections
        );

        Ok(Self {
            inner: Arc::new(PoolInner {
                factory,
                semaphore: Arc::new(Semaphore::new(max_connections)),
                state: Mutex::new(PoolState {
                    idle: Vec::with_capacity(max_connections),
                    live: 0,
                    closed: false,
                }),
                max_connections,
                next_id: AtomicU64::new(0),
                stats: AtomicPoolStats::default(),
            }),
        })
    }

    pub fn from_config(config: &PoolConfig, factory: Arc<dyn ConnectionFactory>) -> Result<Self> {
        Self::new(factory, config.max_connections)
    }

    /// Check out a connection, waiting as long as it takes for one to free up.
    ///
    /// Reuses the most recently returned idle connection, or opens a new one
    /// while fewer than `max_connections` exist. Fails only when the pool has
    /// been closed or the factory cannot open a connection.
    pub async fn acquire(&self) -> Result<PooledConnection> {
        let started = Instant::now();

        let permit = match self.inner.semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(TryAcquireError::Closed) => return Err(Error::PoolClosed),
            Err(TryAcquireError::NoPermits) => {
                self.inner.stats.record_exhausted();
                debug!(
                    "Connection pool exhausted ({} checked out), waiting for a release",
                    self.inner.max_connections
                );
                self.inner
                    .semaphore
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|_| Error::PoolClosed)?
            }
        };

        // Dropping the permit on error hands the slot to the next waiter.
        let (conn, reused) = self.inner.checkout().await?;

        let waited_ms = elapsed_ms(started);
        self.inner.stats.record_acquisition(waited_ms, reused);
        debug!(
            "Acquired connection #{} ({}, waited {}ms)",
            conn.id(),
            if reused { "reused" } else { "new" },
            waited_ms
        );

        Ok(PooledConnection {
            conn: Some(conn),
            pool: self.inner.clone(),
            _permit: permit,
        })
    }

    /// Like [`acquire`](Self::acquire) but gives up after `timeout`
    pub async fn acquire_timeout(&self, timeout: Duration) -> Result<PooledConnection> {
        match tokio::time::timeout(timeout, self.acquire()).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Gave up waiting for a pooled connection after {:?}", timeout);
                Err(Error::AcquireTimeout(timeout))
            }
        }
    }

    /// Return a connection to the pool. Equivalent to dropping the guard.
    pub fn release(&self, conn: PooledConnection) {
        drop(conn);
    }

    /// Close the pool: pending and future acquisitions fail with
    /// [`Error::PoolClosed`], idle connections are closed now and checked-out
    /// connections are closed when they come back.
    pub async fn close(&self) {
        self.inner.semaphore.close();

        let idle = {
            let mut state = self.inner.state();
            if state.closed {
                return;
            }
            state.closed = true;
            let idle = std::mem::take(&mut state.idle);
            state.live -= idle.len();
            idle
        };

        let count = idle.len();
        for conn in idle {
            close_connection(conn).await;
            self.inner.stats.record_discarded();
        }

        info!("Connection pool closed ({} idle connections closed)", count);
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state().closed
    }

    pub fn max_connections(&self) -> usize {
        self.inner.max_connections
    }

    /// Connections currently in existence (idle and checked out)
    pub fn live(&self) -> usize {
        self.inner.state().live
    }

    pub fn idle(&self) -> usize {
        self.inner.state().idle.len()
    }

    pub fn in_use(&self) -> usize {
        let state = self.inner.state();
        state.live - state.idle.len()
    }

    pub fn stats(&self) -> PoolStats {
        self.inner.stats.snapshot()
    }

    pub fn pool_info(&self) -> String {
        let state = self.inner.state();
        format!(
            "Connection pool: {}/{} live, {} idle{}",
            state.live,
            self.inner.max_connections,
            state.idle.len(),
            if state.closed { " (closed)" } else { "" }
        )
    }
}

impl PoolInner {
    fn state(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take an idle connection or open a new one. The caller holds a permit.
    async fn checkout(&self) -> Result<(Box<dyn Connection>, bool)> {
        let reservation = {
            let mut state = self.state();
            if state.closed {
                return Err(Error::PoolClosed);
            }
            if let Some(conn) = state.idle.pop() {
                return Ok((conn, true));
            }
            // Holding a permit with nothing idle means fewer than max exist.
            if state.live >= self.max_connections {
                return Err(Error::Unknown(format!(
                    "pool accounting out of sync: {} live with no idle connection",
                    state.live
                )));
            }
            state.live += 1;
            LiveReservation {
                pool: self,
                committed: false,
            }
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let conn = self.factory.connect(id).await.map_err(|e| match e {
            Error::ConnectionCreate(_) => e,
            other => Error::ConnectionCreate(other.to_string()),
        })?;

        // The pool may have shut down while the factory was connecting.
        let closed = self.state().closed;
        if closed {
            close_connection(conn).await;
            return Err(Error::PoolClosed);
        }
        reservation.commit();

        self.stats.record_created();
        info!(
            "Opened appliance connection #{} ({}/{} live)",
            id,
            self.state().live,
            self.max_connections
        );

        Ok((conn, false))
    }

    fn give_back(&self, conn: Box<dyn Connection>) {
        let mut state = self.state();
        if state.closed || !conn.is_open() {
            let closed = state.closed;
            state.live -= 1;
            drop(state);
            self.stats.record_discarded();
            debug!("Discarded connection #{} on release", conn.id());
            if closed && conn.is_open() {
                close_detached(conn);
            }
            return;
        }
        debug!("Released connection #{} to the idle set", conn.id());
        state.idle.push(conn);
    }

    fn forget(&self) {
        self.state().live -= 1;
        self.stats.record_discarded();
    }
}

async fn close_connection(mut conn: Box<dyn Connection>) {
    if let Err(e) = conn.close().await {
        warn!("Failed to close connection #{}: {}", conn.id(), e);
    }
}

/// Close a connection returned after shutdown without blocking the releaser
fn close_detached(conn: Box<dyn Connection>) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(close_connection(conn));
        }
        Err(_) => warn!(
            "No runtime available to close connection #{}; dropping it unclosed",
            conn.id()
        ),
    }
}

/// Counts a connection that is being opened; undone unless committed, so a
/// failed or cancelled open does not leak capacity.
struct LiveReservation<'a> {
    pool: &'a PoolInner,
    committed: bool,
}

impl LiveReservation<'_> {
    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for LiveReservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.pool.state().live -= 1;
        }
    }
}

/// A connection checked out of the pool
///
/// Dropping the guard returns the connection to the idle set and then frees
/// its slot, so release happens exactly once on every exit path.
pub struct PooledConnection {
    conn: Option<Box<dyn Connection>>,
    pool: Arc<PoolInner>,
    // Declared last: released after the connection is back in the idle set.
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    /// Close the connection and drop it instead of returning it to the pool
    pub async fn discard(mut self) {
        if let Some(mut conn) = self.conn.take() {
            if let Err(e) = conn.close().await {
                warn!("Failed to close discarded connection #{}: {}", conn.id(), e);
            }
            debug!("Discarded connection #{}", conn.id());
            self.pool.forget();
        }
    }
}

impl std::ops::Deref for PooledConnection {
    type Target = dyn Connection;

    fn deref(&self) -> &Self::Target {
        match self.conn.as_ref() {
            Some(conn) => conn.as_ref(),
            None => unreachable!("connection is only taken when the guard is consumed"),
        }
    }
}

impl std::ops::DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self.conn.as_mut() {
            Some(conn) => conn.as_mut(),
            None => unreachable!("connection is only taken when the guard is consumed"),
        }
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.give_back(conn);
        }
    }
}
