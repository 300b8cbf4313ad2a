//! Persistent cache behavior across counting contexts.

use ftcount_circuit::{Axis, NoiseModels};
use ftcount_count::{Cache, Component, CountConfig, CountContext, CountError, KGood, Leaf, LookupTable, gadgets};
use ftcount_qec::catalog;
use std::fs;
use std::path::Path;

fn bell_meas() -> Component {
    gadgets::bell_meas(KGood::uniform(1), catalog::trivial()).unwrap()
}

fn context(dir: &Path) -> CountContext {
    CountContext::from_config(&CountConfig::default().with_cache_dir(dir)).unwrap()
}

/// Every entry file under `dir`.
fn entry_files(dir: &Path) -> Vec<std::path::PathBuf> {
    let mut files = Vec::new();
    for shard in fs::read_dir(dir).unwrap() {
        let shard = shard.unwrap().path();
        if shard.is_dir() {
            for entry in fs::read_dir(&shard).unwrap() {
                let path = entry.unwrap().path();
                if path.extension().is_some_and(|e| e == "json") {
                    files.push(path);
                }
            }
        }
    }
    files.sort();
    files
}

#[test]
fn test_second_context_reads_store() {
    let dir = tempfile::tempdir().unwrap();
    let noise = NoiseModels::counting();

    let first = context(dir.path());
    let a = bell_meas().count(&first, &noise, Axis::X, None, None).unwrap();
    assert!(first.cache().stats().writes > 0);
    assert_eq!(first.cache().stats().store_hits, 0);

    let second = context(dir.path());
    let b = bell_meas().count(&second, &noise, Axis::X, None, None).unwrap();
    assert_eq!(a, b);
    assert!(second.cache().stats().store_hits > 0);
    assert_eq!(second.cache().stats().misses, 0);
}

#[test]
fn test_fetch_disabled_leaves_store_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let noise = NoiseModels::counting();
    bell_meas().count(&context(dir.path()), &noise, Axis::Z, None, None).unwrap();
    let before: Vec<String> = entry_files(dir.path())
        .iter()
        .map(|p| fs::read_to_string(p).unwrap())
        .collect();

    // store off: recompute in memory only
    let config = CountConfig {
        fetch: false,
        ..CountConfig::default().with_cache_dir(dir.path())
    };
    let offline = CountContext::from_config(&config).unwrap();
    bell_meas().count(&offline, &noise, Axis::Z, None, None).unwrap();
    assert_eq!(offline.cache().stats().writes, 0);

    let after: Vec<String> = entry_files(dir.path())
        .iter()
        .map(|p| fs::read_to_string(p).unwrap())
        .collect();
    assert_eq!(before, after);
}

#[test]
fn test_axes_are_cached_separately() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path());
    let meas = bell_meas();
    let x = meas.count(&ctx, &NoiseModels::counting(), Axis::X, None, None).unwrap();
    let z = meas.count(&ctx, &NoiseModels::counting(), Axis::Z, None, None).unwrap();
    assert_ne!(x.counts(), z.counts());
}

#[test]
fn test_corrupt_entry_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let noise = NoiseModels::counting();
    bell_meas().count(&context(dir.path()), &noise, Axis::X, None, None).unwrap();

    let files = entry_files(dir.path());
    assert!(!files.is_empty());
    for path in &files {
        fs::write(path, r#"{"function":"component_counts","key":"0","value":[]}"#).unwrap();
    }

    let err = bell_meas()
        .count(&context(dir.path()), &noise, Axis::X, None, None)
        .unwrap_err();
    assert!(matches!(err, CountError::CacheInconsistency { .. }), "{err}");
}

#[test]
fn test_unreadable_entry_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let noise = NoiseModels::counting();
    bell_meas().count(&context(dir.path()), &noise, Axis::Z, None, None).unwrap();
    for path in entry_files(dir.path()) {
        fs::write(path, "not json").unwrap();
    }
    let err = bell_meas()
        .count(&context(dir.path()), &noise, Axis::Z, None, None)
        .unwrap_err();
    assert!(matches!(err, CountError::CacheInconsistency { .. }));
}

#[test]
fn test_stored_lookup_table_matches_recomputation() {
    let dir = tempfile::tempdir().unwrap();
    let noise = NoiseModels::counting();
    let rest: Component = Leaf::rest(KGood::uniform(2), catalog::steane().unwrap(), "a")
        .unwrap()
        .into();

    let first = context(dir.path());
    let built = LookupTable::build(&first, &rest, &noise, Axis::X, 2).unwrap();
    assert!(first.cache().stats().writes > 0);
    // Z stabilizers and Z_L see X errors
    assert_eq!(built.entries().len(), 16);

    let second = context(dir.path());
    let loaded = LookupTable::build(&second, &rest, &noise, Axis::X, 2).unwrap();
    assert!(second.cache().stats().store_hits > 0);
    assert_eq!(second.cache().stats().misses, 0);

    let uncached = CountContext::serial().with_cache(Cache::disabled());
    let fresh = LookupTable::build(&uncached, &rest, &noise, Axis::X, 2).unwrap();
    assert!(uncached.cache().stats().misses > 0);

    assert_eq!(loaded.entries(), built.entries());
    assert_eq!(loaded.entries(), fresh.entries());
    assert_eq!(loaded.mask(), fresh.mask());
    for syndrome in 0..loaded.len() as u64 {
        assert_eq!(loaded.entry(syndrome), fresh.entry(syndrome));
    }
}
