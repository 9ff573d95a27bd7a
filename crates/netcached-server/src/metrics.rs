use std::sync::atomic::{AtomicU64, Ordering};

/// Process-lifetime counters, shared by every connection task and the store.
#[derive(Default)]
pub struct Metrics {
    pub connections_total: AtomicU64,
    pub hits_total: AtomicU64,
    pub misses_total: AtomicU64,
    pub evictions_total: AtomicU64,
}

impl Metrics {
    pub fn inc_connections(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_hit(&self) {
        self.hits_total.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_miss(&self) {
        self.misses_total.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_evictions(&self, n: u64) {
        self.evictions_total.fetch_add(n, Ordering::Relaxed);
    }
}
