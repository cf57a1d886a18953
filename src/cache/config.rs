use crate::cache::policy::ExpiryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_CAPACITY: usize = 3000;
pub const DEFAULT_TIME_TO_LIVE: Duration = Duration::from_secs(120);
pub const DEFAULT_TIME_TO_IDLE: Duration = Duration::from_secs(100);
pub const DEFAULT_EXPIRY_SCAN_INTERVAL: Duration = Duration::from_secs(120);

/// Configuration for one named cache. Applied once, when the cache is created.
///
/// `capacity == 0` means unbounded. A zero `time_to_live` / `time_to_idle`
/// disables that limit, and a zero `expiry_scan_interval` disables the
/// background sweep.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Falls back to the operation name when absent.
    pub name: Option<String>,
    pub capacity: usize,
    pub overflow_to_secondary: bool,
    pub eternal: bool,
    pub time_to_live: Duration,
    pub time_to_idle: Duration,
    pub persistent: bool,
    pub expiry_scan_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: None,
            capacity: DEFAULT_CAPACITY,
            overflow_to_secondary: false,
            eternal: false,
            time_to_live: DEFAULT_TIME_TO_LIVE,
            time_to_idle: DEFAULT_TIME_TO_IDLE,
            persistent: false,
            expiry_scan_interval: DEFAULT_EXPIRY_SCAN_INTERVAL,
        }
    }
}

impl CacheConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: Some(name.into()), ..Default::default() }
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn time_to_live(mut self, ttl: Duration) -> Self {
        self.time_to_live = ttl;
        self
    }

    pub fn time_to_idle(mut self, tti: Duration) -> Self {
        self.time_to_idle = tti;
        self
    }

    pub fn eternal(mut self, eternal: bool) -> Self {
        self.eternal = eternal;
        self
    }

    pub fn overflow_to_secondary(mut self, overflow: bool) -> Self {
        self.overflow_to_secondary = overflow;
        self
    }

    pub fn persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    pub fn expiry_scan_interval(mut self, interval: Duration) -> Self {
        self.expiry_scan_interval = interval;
        self
    }

    /// Whether this cache is backed by secondary storage at all.
    pub fn uses_secondary(&self) -> bool {
        self.overflow_to_secondary || self.persistent
    }

    /// Values are encoded at `put` time only when they may leave primary storage.
    pub fn wants_encoding(&self) -> bool {
        self.uses_secondary()
    }

    /// Persistent caches refuse values that cannot be encoded.
    pub fn requires_serialization(&self) -> bool {
        self.persistent
    }

    pub fn expiry_policy(&self) -> ExpiryPolicy {
        ExpiryPolicy {
            eternal: self.eternal,
            time_to_live: self.time_to_live,
            time_to_idle: self.time_to_idle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = CacheConfig::default();
        assert_eq!(cfg.capacity, 3000);
        assert_eq!(cfg.time_to_live, Duration::from_secs(120));
        assert_eq!(cfg.time_to_idle, Duration::from_secs(100));
        assert_eq!(cfg.expiry_scan_interval, Duration::from_secs(120));
        assert!(!cfg.eternal && !cfg.persistent && !cfg.overflow_to_secondary);
        assert!(cfg.name.is_none());
    }

    #[test]
    fn builder_style_setters() {
        let cfg = CacheConfig::named("single-argument")
            .capacity(10)
            .time_to_live(Duration::from_secs(60))
            .time_to_idle(Duration::from_secs(45));
        assert_eq!(cfg.name.as_deref(), Some("single-argument"));
        assert_eq!(cfg.capacity, 10);
        assert!(!cfg.uses_secondary());
    }

    #[test]
    fn persistence_implies_secondary_storage() {
        let cfg = CacheConfig::default().persistent(true);
        assert!(cfg.uses_secondary());
        assert!(cfg.requires_serialization());
        let overflow_only = CacheConfig::default().overflow_to_secondary(true);
        assert!(overflow_only.wants_encoding());
        assert!(!overflow_only.requires_serialization());
    }
}
