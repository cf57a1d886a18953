use callcache::cache::CacheConfig;
use callcache::key::CacheKey;
use callcache::overflow::{DiskOverflow, DiskOverflowProvider, SecondaryStore};
use callcache::registry::{CacheRegistry, RegistryOptions};
use callcache::{CacheSite, args, lookup_or_compute};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::tempdir;

fn persistent_site() -> CacheSite {
    CacheSite::new("price", CacheConfig::named("prices").capacity(2).persistent(true))
}

#[test]
fn test_persistent_cache_survives_restart() {
    let dir = tempdir().unwrap();
    let calls = AtomicUsize::new(0);
    let price = |reg: &CacheRegistry, sku: &str| -> f64 {
        lookup_or_compute(reg, &persistent_site(), &args![sku], || {
            calls.fetch_add(1, Ordering::SeqCst);
            sku.len() as f64 * 1.5
        })
        .unwrap()
    };

    {
        let reg = CacheRegistry::new(RegistryOptions::default().with_overflow_root(dir.path()));
        for sku in ["a", "bb", "ccc"] {
            price(&reg, sku);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        reg.shutdown().unwrap();
    }
    assert_eq!(DiskOverflow::open(dir.path().join("prices"), true).unwrap().len().unwrap(), 3);

    let reg = CacheRegistry::new(RegistryOptions::default().with_overflow_root(dir.path()));
    for sku in ["a", "bb", "ccc"] {
        assert_eq!(price(&reg, sku), sku.len() as f64 * 1.5);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[test]
fn test_non_persistent_disk_overflow_is_cleared_on_shutdown() {
    let dir = tempdir().unwrap();
    let reg = CacheRegistry::new(
        RegistryOptions::default().with_overflow(Arc::new(DiskOverflowProvider::new(dir.path()))),
    );
    let cache = reg
        .resolve("spill", &CacheConfig::default().capacity(1).overflow_to_secondary(true))
        .unwrap();
    cache.put(CacheKey::Text("a".into()), "alpha".to_string()).unwrap();
    cache.put(CacheKey::Text("b".into()), "beta".to_string()).unwrap();
    assert_eq!(cache.overflow_len().unwrap(), 1);
    assert_eq!(std::fs::read_dir(dir.path().join("spill")).unwrap().count(), 1);

    reg.shutdown().unwrap();
    assert_eq!(std::fs::read_dir(dir.path().join("spill")).unwrap().count(), 0);
}

#[test]
fn test_corrupt_overflow_record_degrades_to_miss() {
    let dir = tempdir().unwrap();
    let reg = CacheRegistry::new(
        RegistryOptions::default().with_overflow(Arc::new(DiskOverflowProvider::new(dir.path()))),
    );
    let cache = reg
        .resolve("spill", &CacheConfig::default().capacity(1).overflow_to_secondary(true))
        .unwrap();
    cache.put(CacheKey::Text("a".into()), 1u64).unwrap();
    cache.put(CacheKey::Text("b".into()), 2u64).unwrap();
    for entry in std::fs::read_dir(dir.path().join("spill")).unwrap() {
        std::fs::write(entry.unwrap().path(), b"not a record").unwrap();
    }
    assert_eq!(cache.get::<u64>(&CacheKey::Text("a".into())).unwrap(), None);
    assert_eq!(cache.overflow_len().unwrap(), 0);
}
