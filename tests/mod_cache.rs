use callcache::cache::{CacheConfig, CacheInstance, ExpiryPolicy};
use callcache::clock::ManualClock;
use callcache::errors::{CacheError, Result};
use callcache::key::CacheKey;
use callcache::overflow::{MemoryOverflow, OverflowRecord, SecondaryStore};
use callcache::Cacheable;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

fn manual_cache(config: CacheConfig) -> (CacheInstance, ManualClock) {
    let clock = ManualClock::new(Utc::now());
    let config = config.expiry_scan_interval(Duration::ZERO);
    let secondary: Option<Arc<dyn SecondaryStore>> =
        if config.uses_secondary() { Some(Arc::new(MemoryOverflow::new())) } else { None };
    (CacheInstance::new("test", config, secondary, Arc::new(clock.clone())), clock)
}

fn key(s: &str) -> CacheKey {
    CacheKey::Text(s.to_string())
}

#[test]
fn test_put_then_get() {
    let (cache, _) = manual_cache(CacheConfig::default());
    cache.put(key("a"), "alpha".to_string()).unwrap();
    assert_eq!(cache.get::<String>(&key("a")).unwrap().as_deref(), Some("alpha"));
    assert_eq!(cache.get::<String>(&key("b")).unwrap(), None);
    let m = cache.metrics_snapshot();
    assert_eq!((m.hits, m.misses, m.inserts), (1, 1, 1));
}

#[test]
fn test_lru_eviction() {
    let (cache, _) = manual_cache(CacheConfig::default().capacity(2));
    cache.put(key("1"), 1u32).unwrap();
    cache.put(key("2"), 2u32).unwrap();
    // touch 1 so that 2 becomes least recently used
    assert_eq!(cache.get::<u32>(&key("1")).unwrap(), Some(1));
    cache.put(key("3"), 3u32).unwrap();
    assert_eq!(cache.get::<u32>(&key("2")).unwrap(), None);
    assert_eq!(cache.get::<u32>(&key("1")).unwrap(), Some(1));
    assert_eq!(cache.get::<u32>(&key("3")).unwrap(), Some(3));
    assert_eq!(cache.len().unwrap(), 2);
    assert_eq!(cache.metrics_snapshot().lru_evictions, 1);
}

#[test]
fn test_zero_capacity_is_unbounded() {
    let (cache, _) = manual_cache(CacheConfig::default().capacity(0));
    for i in 0..5000u64 {
        cache.put(CacheKey::Structural(i), i).unwrap();
    }
    assert_eq!(cache.len().unwrap(), 5000);
}

#[test]
fn test_ttl_expiry_at_boundary() {
    let (cache, clock) = manual_cache(
        CacheConfig::default().time_to_live(Duration::from_secs(60)).time_to_idle(Duration::ZERO),
    );
    cache.put(key("k"), 5i64).unwrap();
    clock.advance(Duration::from_secs(59));
    assert_eq!(cache.get::<i64>(&key("k")).unwrap(), Some(5));
    clock.advance(Duration::from_secs(1));
    assert_eq!(cache.get::<i64>(&key("k")).unwrap(), None);
    assert_eq!(cache.len().unwrap(), 0);
}

#[test]
fn test_idle_expiry_is_refreshed_by_reads() {
    let (cache, clock) = manual_cache(
        CacheConfig::default().time_to_live(Duration::ZERO).time_to_idle(Duration::from_secs(45)),
    );
    cache.put(key("k"), 5i64).unwrap();
    for _ in 0..4 {
        clock.advance(Duration::from_secs(30));
        assert_eq!(cache.get::<i64>(&key("k")).unwrap(), Some(5));
    }
    clock.advance(Duration::from_secs(45));
    assert_eq!(cache.get::<i64>(&key("k")).unwrap(), None);
}

#[test]
fn test_eternal_ignores_limits() {
    let (cache, clock) = manual_cache(
        CacheConfig::default()
            .eternal(true)
            .time_to_live(Duration::from_secs(1))
            .time_to_idle(Duration::from_secs(1)),
    );
    cache.put(key("k"), true).unwrap();
    clock.advance(Duration::from_secs(86_400));
    assert_eq!(cache.get::<bool>(&key("k")).unwrap(), Some(true));
    assert_eq!(cache.purge_expired_now().unwrap(), 0);
}

#[test]
fn test_put_resets_timestamps() {
    let (cache, clock) = manual_cache(CacheConfig::default().time_to_live(Duration::from_secs(60)));
    cache.put(key("k"), 1u8).unwrap();
    clock.advance(Duration::from_secs(50));
    cache.put(key("k"), 2u8).unwrap();
    clock.advance(Duration::from_secs(50));
    assert_eq!(cache.get::<u8>(&key("k")).unwrap(), Some(2));
}

#[test]
fn test_purge_expired_now() {
    let (cache, clock) = manual_cache(CacheConfig::default().time_to_live(Duration::from_secs(10)));
    for i in 0..600u64 {
        cache.put(CacheKey::Structural(i), i).unwrap();
    }
    clock.advance(Duration::from_secs(5));
    cache.put(key("fresh"), 1u64).unwrap();
    clock.advance(Duration::from_secs(5));
    assert_eq!(cache.purge_expired_now().unwrap(), 600);
    assert_eq!(cache.len().unwrap(), 1);
    assert_eq!(cache.metrics_snapshot().ttl_evictions, 600);
}

#[test]
fn test_type_mismatch_is_a_miss() {
    let (cache, _) = manual_cache(CacheConfig::default());
    cache.put(key("k"), 7u32).unwrap();
    assert_eq!(cache.get::<String>(&key("k")).unwrap(), None);
    assert_eq!(cache.get::<u32>(&key("k")).unwrap(), Some(7));
}

#[test]
fn test_remove_and_clear() {
    let (cache, _) = manual_cache(CacheConfig::default());
    cache.put(key("a"), 1u32).unwrap();
    cache.put(key("b"), 2u32).unwrap();
    assert!(cache.remove(&key("a")).unwrap());
    assert!(!cache.remove(&key("a")).unwrap());
    cache.clear().unwrap();
    assert!(cache.is_empty().unwrap());
}

#[test]
fn test_overflow_receives_evicted_entries() {
    let (cache, _) = manual_cache(CacheConfig::default().capacity(2).overflow_to_secondary(true));
    cache.put(key("1"), "one".to_string()).unwrap();
    cache.put(key("2"), "two".to_string()).unwrap();
    cache.put(key("3"), "three".to_string()).unwrap();
    assert_eq!(cache.len().unwrap(), 2);
    assert_eq!(cache.overflow_len().unwrap(), 1);

    // served from overflow and moved back into primary storage
    assert_eq!(cache.get::<String>(&key("1")).unwrap().as_deref(), Some("one"));
    assert_eq!(cache.metrics_snapshot().overflow_hits, 1);
    assert_eq!(cache.len().unwrap(), 2);
    assert_eq!(cache.overflow_len().unwrap(), 1);
}

#[test]
fn test_overflow_keeps_original_insert_time() {
    let (cache, clock) = manual_cache(
        CacheConfig::default()
            .capacity(1)
            .overflow_to_secondary(true)
            .time_to_live(Duration::from_secs(60))
            .time_to_idle(Duration::ZERO),
    );
    cache.put(key("old"), 1u64).unwrap();
    clock.advance(Duration::from_secs(40));
    cache.put(key("new"), 2u64).unwrap();
    assert_eq!(cache.get::<u64>(&key("old")).unwrap(), Some(1));
    clock.advance(Duration::from_secs(20));
    assert_eq!(cache.get::<u64>(&key("old")).unwrap(), None);
}

#[derive(Clone, Debug, PartialEq)]
struct Handle(u32);
impl Cacheable for Handle {}

#[test]
fn test_unencodable_values_are_dropped_on_eviction() {
    let (cache, _) = manual_cache(CacheConfig::default().capacity(1).overflow_to_secondary(true));
    cache.put(key("a"), Handle(1)).unwrap();
    cache.put(key("b"), Handle(2)).unwrap();
    assert_eq!(cache.overflow_len().unwrap(), 0);
    assert_eq!(cache.get::<Handle>(&key("a")).unwrap(), None);
    assert_eq!(cache.get::<Handle>(&key("b")).unwrap(), Some(Handle(2)));
}

#[test]
fn test_operations_fail_after_shutdown() {
    let (cache, _) = manual_cache(CacheConfig::default());
    cache.put(key("a"), 1u32).unwrap();
    cache.shutdown().unwrap();
    assert!(cache.is_closed());
    assert!(matches!(cache.get::<u32>(&key("a")), Err(CacheError::CacheClosed(n)) if n == "test"));
    assert!(matches!(cache.put(key("a"), 1u32), Err(CacheError::CacheClosed(_))));
    assert!(matches!(cache.clear(), Err(CacheError::CacheClosed(_))));
    assert!(matches!(cache.shutdown(), Err(CacheError::CacheClosed(_))));
}

#[test]
fn test_background_sweep_removes_expired_entries() {
    let clock = ManualClock::new(Utc::now());
    let config = CacheConfig::default()
        .time_to_live(Duration::from_secs(1))
        .expiry_scan_interval(Duration::from_millis(20));
    let cache = CacheInstance::new("sweep", config, None, Arc::new(clock.clone()));
    cache.put(key("k"), 1u32).unwrap();
    clock.advance(Duration::from_secs(2));
    let mut waited = 0;
    while cache.len().unwrap() > 0 && waited < 100 {
        std::thread::sleep(Duration::from_millis(20));
        waited += 1;
    }
    assert_eq!(cache.len().unwrap(), 0);
    cache.shutdown().unwrap();
}

#[test]
fn test_concurrent_put_get() {
    let (cache, _) = manual_cache(CacheConfig::default().capacity(64));
    let cache = Arc::new(cache);
    let handles: Vec<_> = (0..8u64)
        .map(|t| {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || {
                for i in 0..500u64 {
                    let k = CacheKey::Structural(t * 1000 + i % 100);
                    cache.put(k.clone(), i).unwrap();
                    let _ = cache.get::<u64>(&k).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert!(cache.len().unwrap() <= 64);
}

/// Memory overflow whose next `load` pauses between reading the record and
/// returning it, until the test thread has passed the barrier twice.
struct PausingOverflow {
    inner: MemoryOverflow,
    armed: AtomicBool,
    gate: Barrier,
}

impl SecondaryStore for PausingOverflow {
    fn store(&self, key: &CacheKey, record: OverflowRecord) -> Result<()> {
        self.inner.store(key, record)
    }

    fn load(&self, key: &CacheKey) -> Result<Option<OverflowRecord>> {
        let found = self.inner.load(key);
        if self.armed.swap(false, Ordering::SeqCst) {
            self.gate.wait();
            self.gate.wait();
        }
        found
    }

    fn remove(&self, key: &CacheKey) -> Result<bool> {
        self.inner.remove(key)
    }

    fn evict_expired(&self, policy: &ExpiryPolicy, now: DateTime<Utc>) -> Result<usize> {
        self.inner.evict_expired(policy, now)
    }

    fn clear(&self) -> Result<()> {
        self.inner.clear()
    }

    fn len(&self) -> Result<usize> {
        self.inner.len()
    }

    fn is_persistent(&self) -> bool {
        false
    }
}

#[test]
fn test_overflow_promotion_never_overwrites_newer_put() {
    let overflow = Arc::new(PausingOverflow {
        inner: MemoryOverflow::new(),
        armed: AtomicBool::new(false),
        gate: Barrier::new(2),
    });
    let secondary: Arc<dyn SecondaryStore> = overflow.clone();
    let cache = CacheInstance::new(
        "promotion",
        CacheConfig::default().capacity(1).overflow_to_secondary(true).expiry_scan_interval(Duration::ZERO),
        Some(secondary),
        Arc::new(ManualClock::new(Utc::now())),
    );
    cache.put(key("k"), "old".to_string()).unwrap();
    cache.put(key("other"), "x".to_string()).unwrap();
    assert_eq!(cache.overflow_len().unwrap(), 1);

    overflow.armed.store(true, Ordering::SeqCst);
    let seen = std::thread::scope(|s| {
        let reader = s.spawn(|| cache.get::<String>(&key("k")).unwrap());
        // reader now holds the old record read from overflow
        overflow.gate.wait();
        cache.put(key("k"), "new".to_string()).unwrap();
        overflow.gate.wait();
        reader.join().unwrap()
    });

    assert!(seen.is_some());
    assert_eq!(cache.get::<String>(&key("k")).unwrap().as_deref(), Some("new"));
}
