use crate::cache::CacheConfig;
use crate::overflow::{DiskOverflow, SecondaryStore, cache_dir_name};
use crate::registry::DeclaredCaches;
use chrono::{SecondsFormat, Utc};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

pub enum Command {
    /// Parse a declaration file and print the resolved configurations.
    Validate { file: PathBuf, json: bool },
    /// List the records kept in a cache's overflow directory.
    Inspect { root: PathBuf, cache: String },
    /// Delete expired records from a cache's overflow directory.
    Purge { root: PathBuf, cache: String, declarations: Option<PathBuf> },
}

fn describe(name: &str, cfg: &CacheConfig) -> String {
    format!(
        "{name} capacity={} ttl={}s tti={}s eternal={} overflow={} persistent={} scan={}s",
        cfg.capacity,
        cfg.time_to_live.as_secs(),
        cfg.time_to_idle.as_secs(),
        cfg.eternal,
        cfg.overflow_to_secondary,
        cfg.persistent,
        cfg.expiry_scan_interval.as_secs(),
    )
}

fn open_existing(root: &Path, cache: &str) -> Result<DiskOverflow, Box<dyn std::error::Error>> {
    let dir = root.join(cache_dir_name(cache));
    if !dir.is_dir() {
        return Err(format!("no overflow directory for cache [{cache}] at {}", dir.display()).into());
    }
    Ok(DiskOverflow::open(dir, true)?)
}

pub fn run(cmd: Command, out: &mut impl Write) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        Command::Validate { file, json } => {
            let declared = DeclaredCaches::load(&file)?;
            if json {
                let map: BTreeMap<&str, &CacheConfig> = declared.iter().collect();
                writeln!(out, "{}", serde_json::to_string_pretty(&map)?)?;
            } else {
                writeln!(out, "{}", describe("[defaults]", declared.defaults()))?;
                for (name, cfg) in declared.iter() {
                    writeln!(out, "{}", describe(name, cfg))?;
                }
                writeln!(out, "ok: {} cache(s) declared", declared.len())?;
            }
            Ok(())
        }
        Command::Inspect { root, cache } => {
            let store = open_existing(&root, &cache)?;
            let records = store.records()?;
            for r in &records {
                writeln!(
                    out,
                    "{} bytes={} inserted={} accessed={}",
                    r.key,
                    r.bytes.len(),
                    r.inserted_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                    r.last_accessed_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                )?;
            }
            writeln!(out, "records={}", records.len())?;
            Ok(())
        }
        Command::Purge { root, cache, declarations } => {
            let config = match declarations {
                Some(path) => {
                    let declared = DeclaredCaches::load(&path)?;
                    declared.get(&cache).cloned().unwrap_or_else(|| declared.defaults().clone())
                }
                None => CacheConfig::default(),
            };
            let store = open_existing(&root, &cache)?;
            let removed = store.evict_expired(&config.expiry_policy(), Utc::now())?;
            writeln!(out, "removed={removed} remaining={}", store.len()?)?;
            Ok(())
        }
    }
}
