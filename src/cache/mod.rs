mod config;
mod core;
mod entry;
mod metrics;
mod policy;

pub use config::{
    CacheConfig, DEFAULT_CAPACITY, DEFAULT_EXPIRY_SCAN_INTERVAL, DEFAULT_TIME_TO_IDLE,
    DEFAULT_TIME_TO_LIVE,
};
pub use core::CacheInstance;
pub use entry::CacheEntry;
pub use metrics::{CacheMetrics, CacheMetricsSnapshot};
pub use policy::{ExpiryPolicy, SWEEP_BATCH, purge_expired};
