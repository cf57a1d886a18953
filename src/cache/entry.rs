use crate::cache::policy::ExpiryPolicy;
use crate::key::CacheKey;
use crate::overflow::OverflowRecord;
use chrono::{DateTime, Utc};
use std::any::Any;
use std::sync::Arc;

/// A resident entry in primary storage.
#[derive(Clone)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub value: Arc<dyn Any + Send + Sync>,
    /// Present only for caches backed by secondary storage.
    pub encoded: Option<Vec<u8>>,
    pub inserted_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(
        key: CacheKey,
        value: Arc<dyn Any + Send + Sync>,
        encoded: Option<Vec<u8>>,
        now: DateTime<Utc>,
    ) -> Self {
        Self { key, value, encoded, inserted_at: now, last_accessed_at: now }
    }

    pub fn is_expired(&self, policy: &ExpiryPolicy, now: DateTime<Utc>) -> bool {
        policy.is_expired(self.inserted_at, self.last_accessed_at, now)
    }

    /// The secondary-storage form of this entry; `None` when it has no encoding.
    pub fn to_overflow_record(&self) -> Option<OverflowRecord> {
        self.encoded.as_ref().map(|bytes| OverflowRecord {
            key: self.key.canonical(),
            bytes: bytes.clone(),
            inserted_at: self.inserted_at,
            last_accessed_at: self.last_accessed_at,
        })
    }
}

impl std::fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEntry")
            .field("key", &self.key)
            .field("encoded_len", &self.encoded.as_ref().map(Vec::len))
            .field("inserted_at", &self.inserted_at)
            .field("last_accessed_at", &self.last_accessed_at)
            .finish()
    }
}
