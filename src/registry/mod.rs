//! Name → cache instance registry.

mod declared;

pub use declared::{CacheDeclaration, DeclaredCaches};

use crate::cache::{CacheConfig, CacheInstance};
use crate::clock::{Clock, SystemClock};
use crate::errors::{CacheError, Result};
use crate::overflow::{DefaultOverflowProvider, OverflowProvider};
use log::{info, warn};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Everything a registry needs besides its caches.
#[derive(Clone)]
pub struct RegistryOptions {
    /// Declared configurations win over call-site configurations.
    pub declared: DeclaredCaches,
    pub overflow: Arc<dyn OverflowProvider>,
    pub clock: Arc<dyn Clock>,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            declared: DeclaredCaches::empty(),
            overflow: Arc::new(DefaultOverflowProvider::default()),
            clock: Arc::new(SystemClock),
        }
    }
}

impl RegistryOptions {
    pub fn with_declared(mut self, declared: DeclaredCaches) -> Self {
        self.declared = declared;
        self
    }

    pub fn with_overflow(mut self, provider: Arc<dyn OverflowProvider>) -> Self {
        self.overflow = provider;
        self
    }

    /// Overflow for persistent caches under `root`; memory for the rest.
    pub fn with_overflow_root(self, root: impl Into<std::path::PathBuf>) -> Self {
        self.with_overflow(Arc::new(DefaultOverflowProvider::new(root)))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// Owns every cache of a process (or of a test). Share it as `Arc<CacheRegistry>`.
pub struct CacheRegistry {
    caches: RwLock<HashMap<String, Arc<CacheInstance>>>,
    options: RegistryOptions,
    closed: AtomicBool,
}

impl Default for CacheRegistry {
    fn default() -> Self {
        Self::new(RegistryOptions::default())
    }
}

impl CacheRegistry {
    pub fn new(options: RegistryOptions) -> Self {
        Self { caches: RwLock::new(HashMap::new()), options, closed: AtomicBool::new(false) }
    }

    pub fn options(&self) -> &RegistryOptions {
        &self.options
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() { Err(CacheError::ClosedRegistry) } else { Ok(()) }
    }

    /// Returns the cache called `name`, creating it on first use.
    ///
    /// Creation happens exactly once per name even under concurrent callers.
    /// The configuration is taken from the declarations if `name` is declared,
    /// otherwise from `config`; later calls never reconfigure an existing cache.
    pub fn resolve(&self, name: &str, config: &CacheConfig) -> Result<Arc<CacheInstance>> {
        self.ensure_open()?;
        if name.is_empty() {
            return Err(CacheError::InvalidName);
        }
        if let Some(existing) = self.caches.read().get(name) {
            return Ok(Arc::clone(existing));
        }

        let mut caches = self.caches.write();
        self.ensure_open()?;
        if let Some(existing) = caches.get(name) {
            return Ok(Arc::clone(existing));
        }
        let (mut effective, source) = match self.options.declared.get(name) {
            Some(declared) => (declared.clone(), "declared"),
            None => (config.clone(), "call site"),
        };
        effective.name = Some(name.to_string());
        let secondary = match self.options.overflow.open(name, &effective) {
            Ok(secondary) => secondary,
            Err(e) => {
                warn!("Cache [{name}]: secondary storage unavailable, running memory-only: {e}");
                None
            }
        };
        let instance = Arc::new(CacheInstance::new(
            name,
            effective,
            secondary,
            Arc::clone(&self.options.clock),
        ));
        info!("Created cache [{name}] from {source} config: {:?}", instance.config());
        caches.insert(name.to_string(), Arc::clone(&instance));
        Ok(instance)
    }

    /// Looks a cache up without creating it.
    pub fn get(&self, name: &str) -> Result<Option<Arc<CacheInstance>>> {
        self.ensure_open()?;
        Ok(self.caches.read().get(name).cloned())
    }

    /// Names of every created cache, sorted.
    pub fn names(&self) -> Result<Vec<String>> {
        self.ensure_open()?;
        let mut names: Vec<String> = self.caches.read().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    /// Clears every cache. Caches shut down individually are skipped.
    pub fn clear_all(&self) -> Result<()> {
        self.ensure_open()?;
        let caches: Vec<Arc<CacheInstance>> = self.caches.read().values().cloned().collect();
        for cache in caches {
            match cache.clear() {
                Ok(()) | Err(CacheError::CacheClosed(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Shuts every cache down and closes the registry. Failures of individual
    /// caches are logged; the first one is returned after all have been tried.
    pub fn shutdown(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(CacheError::ClosedRegistry);
        }
        let drained: Vec<(String, Arc<CacheInstance>)> = self.caches.write().drain().collect();
        let mut first_err = None;
        for (name, cache) in drained {
            match cache.shutdown() {
                Ok(()) | Err(CacheError::CacheClosed(_)) => {}
                Err(e) => {
                    warn!("Shutdown of cache [{name}] failed: {e}");
                    first_err = first_err.or(Some(e));
                }
            }
        }
        info!("Cache registry shut down");
        first_err.map_or(Ok(()), Err)
    }
}

impl Drop for CacheRegistry {
    fn drop(&mut self) {
        if !self.is_closed() {
            if let Err(e) = self.shutdown() {
                warn!("Cache registry shutdown on drop failed: {e}");
            }
        }
    }
}
