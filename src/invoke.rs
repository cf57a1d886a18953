//! Memoization around an operation: derive a key from the arguments, return a
//! cached result when there is one, otherwise run the operation and cache what
//! it returned if the cache accepts it.
//!
//! There is no single-flight: concurrent misses on one key all compute, and the
//! last `put` wins.

use crate::cache::CacheConfig;
use crate::cacheable::{Admission, Cacheable, admit};
use crate::errors::{CacheError, Result};
use crate::key::{Argument, Arguments, derive_key};
use crate::registry::CacheRegistry;
use log::{debug, warn};
use std::sync::Arc;

/// Where an operation's results are cached: its name plus the cache
/// configuration attached to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSite {
    pub operation: String,
    pub config: CacheConfig,
}

impl CacheSite {
    pub fn new(operation: impl Into<String>, config: CacheConfig) -> Self {
        Self { operation: operation.into(), config }
    }

    /// The configured name, or the operation name when none is set.
    pub fn cache_name(&self) -> &str {
        match self.config.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.operation,
        }
    }
}

/// Returns the cached result for `arguments`, or runs `compute` and caches its
/// result when admissible.
///
/// # Errors
/// Fails only when the registry or the cache has been shut down.
pub fn lookup_or_compute<V, F>(
    registry: &CacheRegistry,
    site: &CacheSite,
    arguments: &[Argument],
    compute: F,
) -> Result<V>
where
    V: Cacheable,
    F: FnOnce() -> V,
{
    try_lookup_or_compute(registry, site, arguments, || Ok::<V, CacheError>(compute()))
}

/// Like [`lookup_or_compute`] for fallible operations. An `Err` from `compute`
/// is returned unchanged and nothing is cached.
pub fn try_lookup_or_compute<V, E, F>(
    registry: &CacheRegistry,
    site: &CacheSite,
    arguments: &[Argument],
    compute: F,
) -> std::result::Result<V, E>
where
    V: Cacheable,
    E: From<CacheError>,
    F: FnOnce() -> std::result::Result<V, E>,
{
    let name = site.cache_name();
    let cache = registry.resolve(name, &site.config)?;
    let key = derive_key(arguments);

    if let Some(hit) = cache.get::<V>(&key)? {
        debug!("Call to [{}] returns cached value for {key}", site.operation);
        return Ok(hit);
    }

    let value = compute()?;
    match admit(&value, cache.config()) {
        Admission::Admit { encoded } => match cache.put_encoded(key.clone(), value.clone(), encoded) {
            Ok(()) => debug!("Cached result of [{}] in [{name}] under {key}", site.operation),
            Err(e) => warn!("Result of [{}] not cached: {e}", site.operation),
        },
        Admission::Empty => {
            debug!("Empty result of [{}] for {key} not cached", site.operation);
        }
        Admission::SerializationIneligible => {
            debug!(
                "Result of [{}] for {key} cannot be encoded for persistent cache [{name}]; not cached",
                site.operation
            );
        }
    }
    Ok(value)
}

/// An operation bundled with its cache site; calling it goes through the cache.
pub struct CachedOperation<F> {
    registry: Arc<CacheRegistry>,
    site: CacheSite,
    operation: F,
}

impl<F> CachedOperation<F> {
    pub fn new(registry: Arc<CacheRegistry>, site: CacheSite, operation: F) -> Self {
        Self { registry, site, operation }
    }

    pub fn site(&self) -> &CacheSite {
        &self.site
    }

    /// # Errors
    /// Fails only when the registry or the cache has been shut down.
    pub fn call<A, V>(&self, args: A) -> Result<V>
    where
        A: Arguments,
        V: Cacheable,
        F: Fn(A) -> V,
    {
        let arguments = args.to_arguments();
        lookup_or_compute(&self.registry, &self.site, &arguments, || (self.operation)(args))
    }

    /// For operations returning `Result`; their errors pass through unchanged.
    pub fn try_call<A, V, E>(&self, args: A) -> std::result::Result<V, E>
    where
        A: Arguments,
        V: Cacheable,
        E: From<CacheError>,
        F: Fn(A) -> std::result::Result<V, E>,
    {
        let arguments = args.to_arguments();
        try_lookup_or_compute(&self.registry, &self.site, &arguments, || (self.operation)(args))
    }
}

/// Wraps `operation` in a closure with the same arguments that consults the cache first.
pub fn cached_fn<A, V, F>(
    registry: Arc<CacheRegistry>,
    site: CacheSite,
    operation: F,
) -> impl Fn(A) -> Result<V>
where
    A: Arguments,
    V: Cacheable,
    F: Fn(A) -> V,
{
    let cached = CachedOperation::new(registry, site, operation);
    move |args| cached.call(args)
}
