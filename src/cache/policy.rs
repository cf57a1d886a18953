use crate::cache::entry::CacheEntry;
use crate::clock::elapsed;
use crate::key::CacheKey;
use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use std::time::Duration;

/// Entries removed per lock acquisition during a sweep.
pub const SWEEP_BATCH: usize = 256;

/// The TTL / TTI / eternal rule of one cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    pub eternal: bool,
    /// Zero disables the limit.
    pub time_to_live: Duration,
    /// Zero disables the limit.
    pub time_to_idle: Duration,
}

impl ExpiryPolicy {
    pub fn is_expired(
        &self,
        inserted_at: DateTime<Utc>,
        last_accessed_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> bool {
        if self.eternal {
            return false;
        }
        let ttl_hit =
            !self.time_to_live.is_zero() && elapsed(inserted_at, now) >= self.time_to_live;
        let tti_hit =
            !self.time_to_idle.is_zero() && elapsed(last_accessed_at, now) >= self.time_to_idle;
        ttl_hit || tti_hit
    }
}

/// Removes expired entries from primary storage. Returns number removed.
///
/// The store is walked from the least recently used end in windows of `batch`
/// entries, taking the lock once per window.
pub fn purge_expired(
    store: &Mutex<LruCache<CacheKey, CacheEntry>>,
    policy: &ExpiryPolicy,
    now: DateTime<Utc>,
    batch: usize,
) -> usize {
    if policy.eternal {
        return 0;
    }
    let batch = batch.max(1);
    let mut kept = 0;
    let mut removed = 0;
    loop {
        let mut cache = store.lock();
        let mut scanned = 0;
        let mut expired = Vec::new();
        for (key, entry) in cache.iter().rev().skip(kept).take(batch) {
            scanned += 1;
            if entry.is_expired(policy, now) {
                expired.push(key.clone());
            }
        }
        kept += scanned - expired.len();
        for key in &expired {
            cache.pop(key);
        }
        removed += expired.len();
        drop(cache);
        if scanned < batch {
            return removed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn policy(ttl: u64, tti: u64) -> ExpiryPolicy {
        ExpiryPolicy {
            eternal: false,
            time_to_live: Duration::from_secs(ttl),
            time_to_idle: Duration::from_secs(tti),
        }
    }

    #[test]
    fn ttl_boundary_is_inclusive() {
        let t0 = Utc::now();
        let p = policy(60, 0);
        assert!(!p.is_expired(t0, t0, t0 + TimeDelta::seconds(59)));
        assert!(p.is_expired(t0, t0, t0 + TimeDelta::seconds(60)));
    }

    #[test]
    fn idle_time_counts_from_last_access() {
        let t0 = Utc::now();
        let t1 = t0 + TimeDelta::seconds(30);
        let p = policy(600, 45);
        assert!(!p.is_expired(t0, t1, t1 + TimeDelta::seconds(44)));
        assert!(p.is_expired(t0, t1, t1 + TimeDelta::seconds(45)));
    }

    #[test]
    fn eternal_never_expires() {
        let t0 = Utc::now();
        let p = ExpiryPolicy { eternal: true, ..policy(1, 1) };
        assert!(!p.is_expired(t0, t0, t0 + TimeDelta::days(365)));
    }

    #[test]
    fn purge_removes_only_expired_entries_in_batches() {
        use std::sync::Arc;
        let t0 = Utc::now();
        let store = Mutex::new(LruCache::unbounded());
        for i in 0..10u64 {
            let key = CacheKey::Structural(i);
            let mut entry = CacheEntry::new(key.clone(), Arc::new(i), None, t0);
            if i % 2 == 0 {
                entry.inserted_at = t0 - TimeDelta::seconds(120);
            }
            store.lock().put(key, entry);
        }
        let removed = purge_expired(&store, &policy(60, 0), t0, 3);
        assert_eq!(removed, 5);
        assert_eq!(purge_expired(&store, &policy(60, 0), t0, 1), 0);
        assert_eq!(store.lock().len(), 5);
        assert!(store.lock().iter().all(|(k, _)| matches!(k, CacheKey::Structural(n) if n % 2 == 1)));
    }

    #[test]
    fn zero_limits_are_disabled() {
        let t0 = Utc::now();
        assert!(!policy(0, 0).is_expired(t0, t0, t0 + TimeDelta::days(1)));
    }
}
