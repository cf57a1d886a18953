//! Caches declared ahead of time in a TOML file.
//!
//! ```toml
//! [defaults]
//! capacity = 500
//!
//! [caches.file-configured]
//! capacity = 10
//! time_to_live_secs = 60
//! time_to_idle_secs = 45
//! ```
//!
//! Numeric fields are signed; a negative or absent value keeps the default.

use crate::cache::CacheConfig;
use crate::errors::Result;
use crate::utils::num::{non_negative_secs, non_negative_usize};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// One `[defaults]` or `[caches.<name>]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheDeclaration {
    pub capacity: Option<i64>,
    pub overflow_to_secondary: Option<bool>,
    pub eternal: Option<bool>,
    pub time_to_live_secs: Option<i64>,
    pub time_to_idle_secs: Option<i64>,
    pub persistent: Option<bool>,
    pub expiry_scan_interval_secs: Option<i64>,
}

impl CacheDeclaration {
    /// Layers this declaration over `base`.
    pub fn apply(&self, base: &CacheConfig) -> CacheConfig {
        let mut cfg = base.clone();
        if let Some(cap) = self.capacity.and_then(non_negative_usize) {
            cfg.capacity = cap;
        }
        if let Some(ttl) = self.time_to_live_secs.and_then(non_negative_secs) {
            cfg.time_to_live = ttl;
        }
        if let Some(tti) = self.time_to_idle_secs.and_then(non_negative_secs) {
            cfg.time_to_idle = tti;
        }
        if let Some(every) = self.expiry_scan_interval_secs.and_then(non_negative_secs) {
            cfg.expiry_scan_interval = every;
        }
        cfg.overflow_to_secondary = self.overflow_to_secondary.unwrap_or(cfg.overflow_to_secondary);
        cfg.eternal = self.eternal.unwrap_or(cfg.eternal);
        cfg.persistent = self.persistent.unwrap_or(cfg.persistent);
        cfg
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct DeclarationFile {
    #[serde(default)]
    defaults: CacheDeclaration,
    #[serde(default)]
    caches: BTreeMap<String, CacheDeclaration>,
}

/// Resolved declarations, keyed by cache name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeclaredCaches {
    defaults: CacheConfig,
    caches: BTreeMap<String, CacheConfig>,
}

impl DeclaredCaches {
    pub fn empty() -> Self {
        Self::default()
    }

    /// # Errors
    /// Returns `CacheError::Config` on malformed TOML or unknown keys.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let file: DeclarationFile = toml::from_str(source)?;
        let defaults = file.defaults.apply(&CacheConfig::default());
        let caches = file
            .caches
            .into_iter()
            .map(|(name, decl)| {
                let mut cfg = decl.apply(&defaults);
                cfg.name = Some(name.clone());
                (name, cfg)
            })
            .collect();
        Ok(Self { defaults, caches })
    }

    /// # Errors
    /// Returns `CacheError::Io` if the file cannot be read, or `CacheError::Config`.
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Declares `name` programmatically, replacing any earlier declaration.
    pub fn declare(&mut self, name: impl Into<String>, config: CacheConfig) {
        let name = name.into();
        let mut config = config;
        config.name = Some(name.clone());
        self.caches.insert(name, config);
    }

    pub fn get(&self, name: &str) -> Option<&CacheConfig> {
        self.caches.get(name)
    }

    /// `[defaults]` layered over the built-in defaults.
    pub fn defaults(&self) -> &CacheConfig {
        &self.defaults
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.caches.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CacheConfig)> {
        self.caches.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.caches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.caches.is_empty()
    }
}
