//! In-process memoization of operation results.
//!
//! A [`CacheRegistry`] owns named caches. Each cache is an LRU-bounded store
//! with time-to-live / time-to-idle expiry and optional secondary storage for
//! evicted entries. [`lookup_or_compute`] and [`CachedOperation`] put a cache in
//! front of an operation, keyed by its arguments.
//!
//! ```no_run
//! use callcache::{CacheConfig, CacheRegistry, CacheSite, args, lookup_or_compute};
//! use std::time::Duration;
//!
//! let registry = CacheRegistry::default();
//! let site = CacheSite::new(
//!     "lookup_user",
//!     CacheConfig::named("users").capacity(10).time_to_live(Duration::from_secs(60)),
//! );
//! let name: String =
//!     lookup_or_compute(&registry, &site, &args!["u-42"], || "Ada".to_string()).unwrap();
//! assert_eq!(name, "Ada");
//! ```

pub mod cache;
pub mod cacheable;
pub mod cli;
pub mod clock;
pub mod errors;
pub mod invoke;
pub mod key;
pub mod logger;
pub mod overflow;
pub mod registry;
pub mod utils;

pub use cache::{CacheConfig, CacheInstance};
pub use cacheable::{Admission, Cacheable, admit};
pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::{CacheError, Result};
pub use invoke::{CacheSite, CachedOperation, cached_fn, lookup_or_compute, try_lookup_or_compute};
pub use key::{Argument, Arguments, CacheKey, ToArgument, derive_key};
pub use registry::{CacheRegistry, DeclaredCaches, RegistryOptions};
