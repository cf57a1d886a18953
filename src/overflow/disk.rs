use crate::cache::{CacheConfig, ExpiryPolicy};
use crate::errors::{CacheError, Result};
use crate::key::CacheKey;
use crate::overflow::{OverflowProvider, OverflowRecord, SecondaryStore};
use crate::utils::num::u64_to_usize;
use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};
use chrono::{DateTime, Utc};
use crc32fast::Hasher as Crc32Hasher;
use log::{debug, warn};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// Record file format: [magic(4)|crc32(4, LE)|len(4, LE)|bincode(OverflowRecord)]
const RECORD_MAGIC: &[u8; 4] = b"CCO1";
const HEADER_LEN: usize = 12;
const RECORD_EXT: &str = "rec";
const TMP_EXT: &str = "tmp";

/// `<cache dir>/callcache`, or a temp-dir fallback when the platform has none.
pub fn default_overflow_root() -> PathBuf {
    dirs_next::cache_dir().unwrap_or_else(std::env::temp_dir).join("callcache")
}

fn sha256_hex(input: &str) -> String {
    let mut h = Sha256::new();
    h.update(input.as_bytes());
    hex::encode(h.finalize())
}

/// Directory name for a cache. Names outside `[A-Za-z0-9._-]` are hashed.
pub fn cache_dir_name(name: &str) -> String {
    let safe = !name.is_empty()
        && !name.starts_with('.')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if safe { name.to_string() } else { sha256_hex(name)[..32].to_string() }
}

fn frame(record: &OverflowRecord) -> Result<Vec<u8>> {
    let payload = encode_to_vec(record, standard())?;
    let len = u32::try_from(payload.len())
        .map_err(|_| CacheError::CorruptRecord("record larger than 4 GiB".into()))?;
    let mut hasher = Crc32Hasher::new();
    hasher.update(&payload);
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(RECORD_MAGIC);
    out.extend_from_slice(&hasher.finalize().to_le_bytes());
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

fn unframe(buf: &[u8]) -> Result<OverflowRecord> {
    if buf.len() < HEADER_LEN || &buf[..4] != RECORD_MAGIC {
        return Err(CacheError::CorruptRecord("bad header".into()));
    }
    let crc = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
    let len = u64_to_usize(u64::from(u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]])));
    let payload = &buf[HEADER_LEN..];
    if payload.len() != len {
        return Err(CacheError::CorruptRecord(format!(
            "length mismatch: header {len}, payload {}",
            payload.len()
        )));
    }
    let mut hasher = Crc32Hasher::new();
    hasher.update(payload);
    if hasher.finalize() != crc {
        return Err(CacheError::CorruptRecord("checksum mismatch".into()));
    }
    let (record, _) = decode_from_slice::<OverflowRecord, _>(payload, standard())?;
    Ok(record)
}

/// One file per entry under the cache's own directory.
///
/// Unreadable or corrupt files are treated as misses and deleted.
pub struct DiskOverflow {
    dir: PathBuf,
    persistent: bool,
    write_lock: Mutex<()>,
}

impl DiskOverflow {
    /// Opens (creating if needed) the directory. A non-persistent store starts
    /// empty, discarding records left over from an earlier process.
    pub fn open(dir: impl Into<PathBuf>, persistent: bool) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let store = Self { dir, persistent, write_lock: Mutex::new(()) };
        if !persistent {
            store.clear()?;
        }
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.{RECORD_EXT}", sha256_hex(&key.canonical())))
    }

    fn record_files(&self) -> Result<Vec<PathBuf>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == RECORD_EXT) {
                out.push(path);
            }
        }
        Ok(out)
    }

    /// Reads one record file. Corrupt files are removed and reported as `None`.
    fn read_record(path: &Path) -> Result<Option<OverflowRecord>> {
        let buf = match fs::read(path) {
            Ok(buf) => buf,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match unframe(&buf) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!("Discarding overflow record {}: {e}", path.display());
                remove_if_exists(path)?;
                Ok(None)
            }
        }
    }

    /// All readable records in this store. Used by the `inspect` command.
    pub fn records(&self) -> Result<Vec<OverflowRecord>> {
        let mut out = Vec::new();
        for path in self.record_files()? {
            if let Some(record) = Self::read_record(&path)? {
                out.push(record);
            }
        }
        out.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(out)
    }
}

fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

impl SecondaryStore for DiskOverflow {
    fn store(&self, key: &CacheKey, record: OverflowRecord) -> Result<()> {
        let bytes = frame(&record)?;
        let path = self.path_for(key);
        let tmp = path.with_extension(TMP_EXT);
        let _guard = self.write_lock.lock();
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, &path)?;
        debug!("Wrote overflow record {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }

    fn load(&self, key: &CacheKey) -> Result<Option<OverflowRecord>> {
        let canonical = key.canonical();
        Ok(Self::read_record(&self.path_for(key))?.filter(|r| r.key == canonical))
    }

    fn remove(&self, key: &CacheKey) -> Result<bool> {
        let _guard = self.write_lock.lock();
        remove_if_exists(&self.path_for(key))
    }

    fn evict_expired(&self, policy: &ExpiryPolicy, now: DateTime<Utc>) -> Result<usize> {
        if policy.eternal {
            return Ok(0);
        }
        let mut removed = 0;
        for path in self.record_files()? {
            let expired = Self::read_record(&path)?.is_some_and(|r| r.is_expired(policy, now));
            if expired {
                let _guard = self.write_lock.lock();
                if remove_if_exists(&path)? {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == RECORD_EXT || ext == TMP_EXT) {
                remove_if_exists(&path)?;
            }
        }
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.record_files()?.len())
    }

    fn is_persistent(&self) -> bool {
        self.persistent
    }
}

/// Places every overflowing cache, persistent or not, under `<root>/<cache dir name>`.
#[derive(Debug, Clone)]
pub struct DiskOverflowProvider {
    root: PathBuf,
}

impl DiskOverflowProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir_for(&self, name: &str) -> PathBuf {
        self.root.join(cache_dir_name(name))
    }
}

impl Default for DiskOverflowProvider {
    fn default() -> Self {
        Self::new(default_overflow_root())
    }
}

impl OverflowProvider for DiskOverflowProvider {
    fn open(&self, name: &str, config: &CacheConfig) -> Result<Option<Arc<dyn SecondaryStore>>> {
        if !config.uses_secondary() {
            return Ok(None);
        }
        let store = DiskOverflow::open(self.dir_for(name), config.persistent)?;
        Ok(Some(Arc::new(store)))
    }
}
