use crate::cache::{CacheConfig, ExpiryPolicy};
use crate::errors::Result;
use crate::key::CacheKey;
use crate::overflow::{OverflowProvider, OverflowRecord, SecondaryStore};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Process-local secondary storage. Never persistent.
#[derive(Default)]
pub struct MemoryOverflow {
    records: RwLock<HashMap<CacheKey, OverflowRecord>>,
}

impl MemoryOverflow {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecondaryStore for MemoryOverflow {
    fn store(&self, key: &CacheKey, record: OverflowRecord) -> Result<()> {
        self.records.write().insert(key.clone(), record);
        Ok(())
    }

    fn load(&self, key: &CacheKey) -> Result<Option<OverflowRecord>> {
        Ok(self.records.read().get(key).cloned())
    }

    fn remove(&self, key: &CacheKey) -> Result<bool> {
        Ok(self.records.write().remove(key).is_some())
    }

    fn evict_expired(&self, policy: &ExpiryPolicy, now: DateTime<Utc>) -> Result<usize> {
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|_, record| !record.is_expired(policy, now));
        Ok(before - records.len())
    }

    fn clear(&self) -> Result<()> {
        self.records.write().clear();
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.records.read().len())
    }

    fn is_persistent(&self) -> bool {
        false
    }
}

/// Gives every overflowing cache its own [`MemoryOverflow`].
///
/// Persistent caches are accepted but lose their records at shutdown.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryOverflowProvider;

impl OverflowProvider for MemoryOverflowProvider {
    fn open(&self, _name: &str, config: &CacheConfig) -> Result<Option<Arc<dyn SecondaryStore>>> {
        if !config.uses_secondary() {
            return Ok(None);
        }
        Ok(Some(Arc::new(MemoryOverflow::new())))
    }
}
