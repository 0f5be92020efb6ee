//! Instrumented connection factory for tests

use super::{Connection, ConnectionFactory};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
pub(crate) struct Counters {
    pub connects: AtomicUsize,
    pub closes: AtomicUsize,
    pub calls: AtomicUsize,
    pub active: AtomicUsize,
    pub peak_active: AtomicUsize,
    pub per_key: Mutex<HashMap<String, usize>>,
}

impl Counters {
    pub fn calls_for(&self, key: &str) -> usize {
        self.per_key.lock().unwrap().get(key).copied().unwrap_or(0)
    }
}

/// Factory whose connections count their work and fail on chosen payloads
#[derive(Clone)]
pub(crate) struct MockFactory {
    pub counters: Arc<Counters>,
    latency: Duration,
    failing: Arc<HashSet<String>>,
    fail_connect: bool,
    connect_latency: Duration,
}

impl MockFactory {
    pub fn new(latency: Duration) -> Self {
        Self {
            counters: Arc::new(Counters::default()),
            latency,
            failing: Arc::new(HashSet::new()),
            fail_connect: false,
            connect_latency: Duration::ZERO,
        }
    }

    pub fn failing_on(mut self, payloads: &[&str]) -> Self {
        self.failing = Arc::new(payloads.iter().map(|p| p.to_string()).collect());
        self
    }

    pub fn refusing_connections(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    pub fn slow_to_connect(mut self, latency: Duration) -> Self {
        self.connect_latency = latency;
        self
    }
}

#[async_trait]
impl ConnectionFactory for MockFactory {
    async fn connect(&self, id: u64) -> Result<Box<dyn Connection>> {
        if !self.connect_latency.is_zero() {
            tokio::time::sleep(self.connect_latency).await;
        }
        if self.fail_connect {
            return Err(Error::ConnectionCreate("appliance unreachable".to_string()));
        }
        self.counters.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockConnection {
            id,
            latency: self.latency,
            failing: self.failing.clone(),
            counters: self.counters.clone(),
            open: true,
        }))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

pub(crate) struct MockConnection {
    id: u64,
    latency: Duration,
    failing: Arc<HashSet<String>>,
    counters: Arc<Counters>,
    pub open: bool,
}

#[async_trait]
impl Connection for MockConnection {
    fn id(&self) -> u64 {
        self.id
    }

    async fn process(&self, payload: &str) -> Result<String> {
        let active = self.counters.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.peak_active.fetch_max(active, Ordering::SeqCst);
        self.counters.calls.fetch_add(1, Ordering::SeqCst);
        *self
            .counters
            .per_key
            .lock()
            .unwrap()
            .entry(payload.to_string())
            .or_insert(0) += 1;

        tokio::time::sleep(self.latency).await;
        self.counters.active.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(payload) {
            Err(Error::Connection(format!("appliance rejected '{}'", payload)))
        } else {
            Ok(format!("Encrypted_{}", payload))
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn close(&mut self) -> Result<()> {
        if self.open {
            self.counters.closes.fetch_add(1, Ordering::SeqCst);
        }
        self.open = false;
        Ok(())
    }
}
