//! Secondary storage for entries evicted from primary storage.
//!
//! Secondary storage only ever sees encoded bytes. Primary storage keeps the
//! live value; the two are reconciled by [`crate::cache::CacheInstance`].

mod disk;
mod memory;

pub use disk::{DiskOverflow, DiskOverflowProvider, cache_dir_name, default_overflow_root};
pub use memory::{MemoryOverflow, MemoryOverflowProvider};

use crate::cache::{CacheConfig, ExpiryPolicy};
use crate::errors::Result;
use crate::key::CacheKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// An entry as held by secondary storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverflowRecord {
    /// `CacheKey::canonical()` of the owning key.
    pub key: String,
    pub bytes: Vec<u8>,
    pub inserted_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

impl OverflowRecord {
    pub fn is_expired(&self, policy: &ExpiryPolicy, now: DateTime<Utc>) -> bool {
        policy.is_expired(self.inserted_at, self.last_accessed_at, now)
    }
}

pub trait SecondaryStore: Send + Sync {
    /// Stores or replaces the record for `key`.
    fn store(&self, key: &CacheKey, record: OverflowRecord) -> Result<()>;

    fn load(&self, key: &CacheKey) -> Result<Option<OverflowRecord>>;

    fn remove(&self, key: &CacheKey) -> Result<bool>;

    /// Drops every record expired under `policy`. Returns number removed.
    fn evict_expired(&self, policy: &ExpiryPolicy, now: DateTime<Utc>) -> Result<usize>;

    fn clear(&self) -> Result<()>;

    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Whether records survive a process restart.
    fn is_persistent(&self) -> bool;
}

/// Opens secondary storage for a cache at creation time.
pub trait OverflowProvider: Send + Sync {
    /// `Ok(None)` when `config` does not use secondary storage.
    fn open(&self, name: &str, config: &CacheConfig) -> Result<Option<Arc<dyn SecondaryStore>>>;
}

/// Disk storage under `root` for persistent caches; memory for the rest.
#[derive(Debug, Clone, Default)]
pub struct DefaultOverflowProvider {
    disk: DiskOverflowProvider,
}

impl DefaultOverflowProvider {
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        Self { disk: DiskOverflowProvider::new(root) }
    }

    pub fn root(&self) -> &std::path::Path {
        self.disk.root()
    }
}

impl OverflowProvider for DefaultOverflowProvider {
    fn open(&self, name: &str, config: &CacheConfig) -> Result<Option<Arc<dyn SecondaryStore>>> {
        if config.persistent {
            self.disk.open(name, config)
        } else {
            MemoryOverflowProvider.open(name, config)
        }
    }
}
