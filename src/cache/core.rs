use crate::cache::config::CacheConfig;
use crate::cache::entry::CacheEntry;
use crate::cache::metrics::{CacheMetrics, CacheMetricsSnapshot};
use crate::cache::policy::{ExpiryPolicy, SWEEP_BATCH, purge_expired};
use crate::cacheable::Cacheable;
use crate::clock::Clock;
use crate::errors::{CacheError, Result};
use crate::key::CacheKey;
use crate::logger::EVICTION_TARGET;
use crate::overflow::SecondaryStore;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};

struct Inner {
    name: String,
    config: CacheConfig,
    policy: ExpiryPolicy,
    store: Mutex<LruCache<CacheKey, CacheEntry>>,
    secondary: Option<Arc<dyn SecondaryStore>>,
    clock: Arc<dyn Clock>,
    metrics: CacheMetrics,
    closed: AtomicBool,
}

struct Sweeper {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

/// One named cache: bounded LRU primary storage with TTL/TTI expiry and
/// optional secondary storage for evicted entries.
pub struct CacheInstance {
    inner: Arc<Inner>,
    sweeper: Mutex<Option<Sweeper>>,
}

impl CacheInstance {
    /// Creates the cache and, unless the scan interval is zero, starts its
    /// background expiry sweep.
    pub fn new(
        name: impl Into<String>,
        config: CacheConfig,
        secondary: Option<Arc<dyn SecondaryStore>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store = match NonZeroUsize::new(config.capacity) {
            Some(cap) => LruCache::new(cap),
            None => LruCache::unbounded(),
        };
        let inner = Arc::new(Inner {
            name: name.into(),
            policy: config.expiry_policy(),
            config,
            store: Mutex::new(store),
            secondary,
            clock,
            metrics: CacheMetrics::default(),
            closed: AtomicBool::new(false),
        });
        let sweeper = Self::spawn_sweeper(&inner);
        Self { inner, sweeper: Mutex::new(sweeper) }
    }

    fn spawn_sweeper(inner: &Arc<Inner>) -> Option<Sweeper> {
        let interval = inner.config.expiry_scan_interval;
        if interval.is_zero() || inner.policy.eternal {
            return None;
        }
        let (tx, rx) = mpsc::channel::<()>();
        let state = Arc::clone(inner);
        let spawned = thread::Builder::new()
            .name(format!("callcache-sweep-{}", inner.name))
            .spawn(move || {
                loop {
                    match rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            state.sweep();
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            });
        match spawned {
            Ok(handle) => Some(Sweeper { stop: tx, handle }),
            Err(e) => {
                warn!("Cache [{}]: expiry sweep not started: {e}", inner.name);
                None
            }
        }
    }

    fn stop_sweeper(&self) {
        if let Some(sweeper) = self.sweeper.lock().take() {
            let _ = sweeper.stop.send(());
            if sweeper.handle.join().is_err() {
                warn!("Cache [{}]: expiry sweep thread panicked", self.inner.name);
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() { Err(CacheError::CacheClosed(self.inner.name.clone())) } else { Ok(()) }
    }

    /// Looks `key` up, checking primary then secondary storage.
    ///
    /// Expired entries are removed and reported as misses. A secondary hit is
    /// decoded and moved back into primary storage with its original insertion
    /// time. A value stored under a different type is a miss.
    pub fn get<V: Cacheable>(&self, key: &CacheKey) -> Result<Option<V>> {
        self.ensure_open()?;
        let inner = &self.inner;
        let now = inner.clock.now();

        {
            let mut store = inner.store.lock();
            let state = store.get_mut(key).map(|entry| {
                if entry.is_expired(&inner.policy, now) {
                    None
                } else {
                    entry.last_accessed_at = now;
                    Some(entry.value.downcast_ref::<V>().cloned())
                }
            });
            match state {
                Some(Some(Some(value))) => {
                    CacheMetrics::bump(&inner.metrics.hits);
                    return Ok(Some(value));
                }
                Some(Some(None)) => {
                    debug!("Cache [{}]: entry {key} holds a different type", inner.name);
                    CacheMetrics::bump(&inner.metrics.misses);
                    return Ok(None);
                }
                Some(None) => {
                    store.pop(key);
                    CacheMetrics::bump(&inner.metrics.ttl_evictions);
                    CacheMetrics::bump(&inner.metrics.misses);
                    debug!(target: EVICTION_TARGET, "Cache [{}]: expired {key} on access", inner.name);
                    return Ok(None);
                }
                None => {}
            }
        }

        if let Some(value) = self.load_from_secondary::<V>(key, now) {
            CacheMetrics::bump(&inner.metrics.hits);
            CacheMetrics::bump(&inner.metrics.overflow_hits);
            return Ok(Some(value));
        }
        CacheMetrics::bump(&inner.metrics.misses);
        Ok(None)
    }

    fn load_from_secondary<V: Cacheable>(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<V> {
        let inner = &self.inner;
        let secondary = inner.secondary.as_ref()?;
        let record = match secondary.load(key) {
            Ok(found) => found?,
            Err(e) => {
                warn!("Cache [{}]: overflow read for {key} failed: {e}", inner.name);
                return None;
            }
        };
        if record.is_expired(&inner.policy, now) {
            if let Err(e) = secondary.remove(key) {
                warn!("Cache [{}]: overflow remove for {key} failed: {e}", inner.name);
            }
            CacheMetrics::bump(&inner.metrics.ttl_evictions);
            return None;
        }
        let Some(value) = V::decode(&record.bytes) else {
            debug!("Cache [{}]: overflow record {key} does not decode as requested type", inner.name);
            return None;
        };
        let mut entry =
            CacheEntry::new(key.clone(), Arc::new(value.clone()), Some(record.bytes), now);
        entry.inserted_at = record.inserted_at;
        let evicted = {
            let mut store = inner.store.lock();
            // A put that landed while the record was read is newer; keep it.
            if let Some(resident) = store.get_mut(key) {
                resident.last_accessed_at = now;
                return Some(resident.value.downcast_ref::<V>().cloned().unwrap_or(value));
            }
            push_entry(&mut store, entry)
        };
        self.settle_insert(key, evicted);
        Some(value)
    }

    /// Stores `value`, encoding it when this cache uses secondary storage.
    pub fn put<V: Cacheable>(&self, key: CacheKey, value: V) -> Result<()> {
        let encoded = if self.inner.config.wants_encoding() { value.encode() } else { None };
        self.put_encoded(key, value, encoded)
    }

    /// Stores `value` with an encoding already computed by the caller.
    pub fn put_encoded<V: Cacheable>(
        &self,
        key: CacheKey,
        value: V,
        encoded: Option<Vec<u8>>,
    ) -> Result<()> {
        self.ensure_open()?;
        let now = self.inner.clock.now();
        self.insert_entry(CacheEntry::new(key, Arc::new(value), encoded, now));
        CacheMetrics::bump(&self.inner.metrics.inserts);
        Ok(())
    }

    /// Pushes into primary storage, moving any LRU victim to secondary storage.
    /// The key's secondary copy, if any, is dropped so only one copy exists.
    fn insert_entry(&self, entry: CacheEntry) {
        let key = entry.key.clone();
        let evicted = push_entry(&mut self.inner.store.lock(), entry);
        self.settle_insert(&key, evicted);
    }

    fn settle_insert(&self, key: &CacheKey, evicted: Option<CacheEntry>) {
        let inner = &self.inner;
        if let Some(secondary) = &inner.secondary {
            if let Err(e) = secondary.remove(key) {
                warn!("Cache [{}]: overflow remove for {key} failed: {e}", inner.name);
            }
        }
        if let Some(victim) = evicted {
            CacheMetrics::bump(&inner.metrics.lru_evictions);
            self.overflow(victim);
        }
    }

    fn overflow(&self, victim: CacheEntry) {
        let inner = &self.inner;
        let now = inner.clock.now();
        let target = inner.secondary.as_ref().filter(|_| !victim.is_expired(&inner.policy, now));
        match (target, victim.to_overflow_record()) {
            (Some(secondary), Some(record)) => match secondary.store(&victim.key, record) {
                Ok(()) => {
                    CacheMetrics::bump(&inner.metrics.overflow_writes);
                    debug!(target: EVICTION_TARGET, "Cache [{}]: moved {} to overflow", inner.name, victim.key);
                }
                Err(e) => {
                    warn!("Cache [{}]: overflow write for {} failed: {e}", inner.name, victim.key);
                }
            },
            _ => {
                debug!(target: EVICTION_TARGET, "Cache [{}]: discarded {}", inner.name, victim.key);
            }
        }
    }

    /// Removes `key` from both storage tiers.
    pub fn remove(&self, key: &CacheKey) -> Result<bool> {
        self.ensure_open()?;
        let inner = &self.inner;
        let mut removed = inner.store.lock().pop(key).is_some();
        if let Some(secondary) = &inner.secondary {
            match secondary.remove(key) {
                Ok(r) => removed |= r,
                Err(e) => warn!("Cache [{}]: overflow remove for {key} failed: {e}", inner.name),
            }
        }
        if removed {
            CacheMetrics::bump(&inner.metrics.removes);
        }
        Ok(removed)
    }

    /// Empties both storage tiers.
    pub fn clear(&self) -> Result<()> {
        self.ensure_open()?;
        self.inner.store.lock().clear();
        if let Some(secondary) = &self.inner.secondary {
            if let Err(e) = secondary.clear() {
                warn!("Cache [{}]: overflow clear failed: {e}", self.inner.name);
            }
        }
        info!("Cache [{}] cleared", self.inner.name);
        Ok(())
    }

    /// Entries resident in primary storage.
    pub fn len(&self) -> Result<usize> {
        self.ensure_open()?;
        Ok(self.inner.store.lock().len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Records held by secondary storage; zero when there is none.
    pub fn overflow_len(&self) -> Result<usize> {
        self.ensure_open()?;
        match &self.inner.secondary {
            Some(secondary) => secondary.len(),
            None => Ok(0),
        }
    }

    /// Runs one expiry sweep now. Returns number of entries removed.
    pub fn purge_expired_now(&self) -> Result<usize> {
        self.ensure_open()?;
        Ok(self.inner.sweep())
    }

    pub fn metrics_snapshot(&self) -> CacheMetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Stops the sweep and releases storage. Persistent caches first write
    /// their encodable resident entries to secondary storage; non-persistent
    /// secondary storage is emptied. Later operations fail with `CacheClosed`.
    pub fn shutdown(&self) -> Result<()> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Err(CacheError::CacheClosed(self.inner.name.clone()));
        }
        self.stop_sweeper();
        let inner = &self.inner;
        let drained: Vec<CacheEntry> = {
            let mut store = inner.store.lock();
            let mut out = Vec::with_capacity(store.len());
            while let Some((_, entry)) = store.pop_lru() {
                out.push(entry);
            }
            out
        };

        let mut first_err = None;
        if let Some(secondary) = &inner.secondary {
            if secondary.is_persistent() {
                let now = inner.clock.now();
                let mut spilled = 0usize;
                for entry in drained.iter().filter(|e| !e.is_expired(&inner.policy, now)) {
                    let Some(record) = entry.to_overflow_record() else { continue };
                    match secondary.store(&entry.key, record) {
                        Ok(()) => spilled += 1,
                        Err(e) => {
                            warn!("Cache [{}]: spill of {} failed: {e}", inner.name, entry.key);
                            first_err = first_err.or(Some(e));
                        }
                    }
                }
                info!("Cache [{}]: {spilled} entries kept for next start", inner.name);
            } else if let Err(e) = secondary.clear() {
                warn!("Cache [{}]: overflow clear on shutdown failed: {e}", inner.name);
                first_err = first_err.or(Some(e));
            }
        }
        info!("Cache [{}] shut down", inner.name);
        first_err.map_or(Ok(()), Err)
    }
}

/// Pushes `entry`, returning the LRU victim it displaced, if any.
fn push_entry(store: &mut LruCache<CacheKey, CacheEntry>, entry: CacheEntry) -> Option<CacheEntry> {
    let key = entry.key.clone();
    match store.push(key.clone(), entry) {
        Some((old_key, old)) if old_key != key => Some(old),
        _ => None,
    }
}

impl Inner {
    fn sweep(&self) -> usize {
        let now = self.clock.now();
        let primary = purge_expired(&self.store, &self.policy, now, SWEEP_BATCH);
        CacheMetrics::add(&self.metrics.ttl_evictions, primary);
        let secondary = match &self.secondary {
            Some(store) => store.evict_expired(&self.policy, now).unwrap_or_else(|e| {
                warn!("Cache [{}]: overflow sweep failed: {e}", self.name);
                0
            }),
            None => 0,
        };
        CacheMetrics::add(&self.metrics.ttl_evictions, secondary);
        if primary + secondary > 0 {
            debug!(
                target: EVICTION_TARGET,
                "Cache [{}]: sweep expired {primary} resident and {secondary} overflow entries",
                self.name
            );
        }
        primary + secondary
    }
}

impl Drop for CacheInstance {
    fn drop(&mut self) {
        self.stop_sweeper();
    }
}

impl std::fmt::Debug for CacheInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheInstance")
            .field("name", &self.inner.name)
            .field("config", &self.inner.config)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
