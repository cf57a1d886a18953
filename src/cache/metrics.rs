use std::sync::atomic::{AtomicU64, Ordering};

/// In-process counters for one cache. Read by logs and tests; never exported.
#[derive(Default)]
pub struct CacheMetrics {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub inserts: AtomicU64,
    pub removes: AtomicU64,
    pub ttl_evictions: AtomicU64,
    pub lru_evictions: AtomicU64,
    pub overflow_writes: AtomicU64,
    pub overflow_hits: AtomicU64,
}

impl CacheMetrics {
    pub fn snapshot(&self) -> CacheMetricsSnapshot {
        CacheMetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            removes: self.removes.load(Ordering::Relaxed),
            ttl_evictions: self.ttl_evictions.load(Ordering::Relaxed),
            lru_evictions: self.lru_evictions.load(Ordering::Relaxed),
            overflow_writes: self.overflow_writes.load(Ordering::Relaxed),
            overflow_hits: self.overflow_hits.load(Ordering::Relaxed),
        }
    }

    #[inline]
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(crate::utils::num::usize_to_u64(n), Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheMetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub removes: u64,
    pub ttl_evictions: u64,
    pub lru_evictions: u64,
    pub overflow_writes: u64,
    pub overflow_hits: u64,
}
