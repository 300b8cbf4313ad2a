//! Memoization of expensive counting results.
//!
//! Two layers sit in front of every cached computation: an in-process memo
//! table holding decoded values, and an optional persistent [`CacheStore`]
//! holding their JSON encoding. A lookup tries the memo, then the store,
//! and only then runs the computation, writing the result back to both.
//!
//! Each stored entry records the function identity and content address it
//! was written under. An entry whose recorded identity differs from the
//! requested one, or whose value does not decode to the expected type, is a
//! [`CountError::CacheInconsistency`]; the cache never silently recomputes
//! over a corrupt entry.

mod key;
mod store;

pub use key::{CacheKey, CacheKeyBuilder};
pub use store::{CacheStore, FileStore, MemoryStore};

pub(crate) use key::digest;

use crate::error::{CountError, FtResult};
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

/// On-store envelope of a cached value.
#[derive(Serialize, Deserialize)]
struct StoredEntry {
    function: String,
    key: String,
    value: serde_json::Value,
}

/// Hit and miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Served from the in-process memo.
    pub memo_hits: u64,
    /// Served from the persistent store.
    pub store_hits: u64,
    /// Computed.
    pub misses: u64,
    /// Written to the persistent store.
    pub writes: u64,
}

#[derive(Debug, Default)]
struct Counters {
    memo_hits: AtomicU64,
    store_hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
}

type Memo = FxHashMap<CacheKey, Arc<dyn Any + Send + Sync>>;

/// Memo table plus optional persistent store.
pub struct Cache {
    store: Option<Arc<dyn CacheStore>>,
    fetch: bool,
    memoize: bool,
    memo: Mutex<Memo>,
    counters: Counters,
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("store", &self.store)
            .field("fetch", &self.fetch)
            .field("memoize", &self.memoize)
            .field("stats", &self.stats())
            .finish()
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Cache {
    /// A cache over `store` with both layers enabled.
    pub fn new(store: Option<Arc<dyn CacheStore>>) -> Self {
        Self {
            store,
            fetch: true,
            memoize: true,
            memo: Mutex::new(Memo::default()),
            counters: Counters::default(),
        }
    }

    /// A cache that memoizes in process only.
    pub fn in_process() -> Self {
        Self::new(None)
    }

    /// A cache that never stores anything.
    pub fn disabled() -> Self {
        Self::new(None).with_memoize(false).with_fetch(false)
    }

    /// Enable or disable the persistent store.
    #[must_use]
    pub fn with_fetch(mut self, fetch: bool) -> Self {
        self.fetch = fetch;
        self
    }

    /// Enable or disable the in-process memo.
    #[must_use]
    pub fn with_memoize(mut self, memoize: bool) -> Self {
        self.memoize = memoize;
        self
    }

    /// The persistent store, if any.
    pub fn store(&self) -> Option<&Arc<dyn CacheStore>> {
        self.store.as_ref()
    }

    /// Snapshot of the hit and miss counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            memo_hits: self.counters.memo_hits.load(Ordering::Relaxed),
            store_hits: self.counters.store_hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            writes: self.counters.writes.load(Ordering::Relaxed),
        }
    }

    /// Drop every memoized value.
    pub fn clear_memo(&self) {
        self.memo
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn active_store(&self) -> Option<&Arc<dyn CacheStore>> {
        if self.fetch { self.store.as_ref() } else { None }
    }

    /// Return the value cached under `key`, computing and storing it on a
    /// miss.
    ///
    /// The computation runs without holding any lock. Two threads that miss
    /// the same key both compute; the later write wins, and both values are
    /// equal because cached computations are pure.
    pub fn get_or_compute<T, F>(&self, key: &CacheKey, compute: F) -> FtResult<T>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
        F: FnOnce() -> FtResult<T>,
    {
        if let Some(value) = self.memo_get::<T>(key)? {
            self.counters.memo_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(value);
        }

        if let Some(store) = self.active_store() {
            if let Some(raw) = store.get(key)? {
                let value: T = decode_entry(key, &raw)?;
                self.counters.store_hits.fetch_add(1, Ordering::Relaxed);
                debug!(entry = %key, "Loaded cached result");
                self.memo_put(key, &value);
                return Ok(value);
            }
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        debug!(entry = %key, "Cache miss");
        let value = compute()?;
        self.write_back(key, &value)?;
        Ok(value)
    }

    /// Recompute the value under `key` and overwrite both layers.
    pub fn force_refresh<T, F>(&self, key: &CacheKey, compute: F) -> FtResult<T>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
        F: FnOnce() -> FtResult<T>,
    {
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        let value = compute()?;
        self.write_back(key, &value)?;
        Ok(value)
    }

    fn write_back<T>(&self, key: &CacheKey, value: &T) -> FtResult<()>
    where
        T: Serialize + Clone + Send + Sync + 'static,
    {
        if let Some(store) = self.active_store() {
            let entry = StoredEntry {
                function: key.function().to_string(),
                key: key.hex().to_string(),
                value: serde_json::to_value(value)?,
            };
            store.put(key, &serde_json::to_string(&entry)?)?;
            self.counters.writes.fetch_add(1, Ordering::Relaxed);
        }
        self.memo_put(key, value);
        Ok(())
    }

    fn memo_get<T: Clone + 'static>(&self, key: &CacheKey) -> FtResult<Option<T>> {
        if !self.memoize {
            return Ok(None);
        }
        let memo = self.memo.lock().unwrap_or_else(PoisonError::into_inner);
        match memo.get(key) {
            None => Ok(None),
            Some(any) => match any.downcast_ref::<T>() {
                Some(value) => Ok(Some(value.clone())),
                None => Err(CountError::CacheInconsistency {
                    key: key.hex().to_string(),
                    reason: format!(
                        "memoized value for {} has a different type",
                        key.function()
                    ),
                }),
            },
        }
    }

    fn memo_put<T: Clone + Send + Sync + 'static>(&self, key: &CacheKey, value: &T) {
        if self.memoize {
            self.memo
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(key.clone(), Arc::new(value.clone()));
        }
    }
}

fn decode_entry<T: DeserializeOwned>(key: &CacheKey, raw: &str) -> FtResult<T> {
    let inconsistent = |reason: String| {
        warn!(entry = %key, %reason, "Rejecting cache entry");
        CountError::CacheInconsistency {
            key: key.hex().to_string(),
            reason,
        }
    };
    let entry: StoredEntry =
        serde_json::from_str(raw).map_err(|e| inconsistent(format!("unreadable entry: {e}")))?;
    if entry.function != key.function() || entry.key != key.hex() {
        return Err(inconsistent(format!(
            "entry was written for {}/{}",
            entry.function, entry.key
        )));
    }
    serde_json::from_value(entry.value)
        .map_err(|e| inconsistent(format!("value does not match the expected shape: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn key(name: &str, n: u32) -> CacheKey {
        CacheKey::builder(name).arg(&n).unwrap().finish()
    }

    #[test]
    fn test_memo_hit_skips_compute() {
        let cache = Cache::in_process();
        let calls = Cell::new(0);
        for _ in 0..3 {
            let v: u32 = cache
                .get_or_compute(&key("f", 1), || {
                    calls.set(calls.get() + 1);
                    Ok(11)
                })
                .unwrap();
            assert_eq!(v, 11);
        }
        assert_eq!(calls.get(), 1);
        assert_eq!(cache.stats().memo_hits, 2);
        assert_eq!(cache.stats().writes, 0);
    }

    #[test]
    fn test_disabled_always_computes() {
        let cache = Cache::disabled();
        let calls = Cell::new(0);
        for _ in 0..2 {
            let _: u32 = cache
                .get_or_compute(&key("f", 1), || {
                    calls.set(calls.get() + 1);
                    Ok(1)
                })
                .unwrap();
        }
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_store_survives_memo_clear() {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
        let cache = Cache::new(Some(Arc::clone(&store)));
        let _: Vec<u8> = cache.get_or_compute(&key("f", 2), || Ok(vec![1, 2])).unwrap();
        cache.clear_memo();
        let v: Vec<u8> = cache
            .get_or_compute(&key("f", 2), || panic!("must not recompute"))
            .unwrap();
        assert_eq!(v, vec![1, 2]);
        assert_eq!(cache.stats().store_hits, 1);
    }

    #[test]
    fn test_fetch_toggle_bypasses_store() {
        let store = Arc::new(MemoryStore::new());
        let cache = Cache::new(Some(store.clone() as Arc<dyn CacheStore>)).with_fetch(false);
        let _: u8 = cache.get_or_compute(&key("f", 3), || Ok(3)).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_wrong_shape_is_inconsistent() {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
        let writer = Cache::new(Some(Arc::clone(&store)));
        let _: String = writer.get_or_compute(&key("f", 4), || Ok("text".into())).unwrap();

        let reader = Cache::new(Some(store)).with_memoize(false);
        let err = reader
            .get_or_compute::<u64, _>(&key("f", 4), || Ok(0))
            .unwrap_err();
        assert!(matches!(err, CountError::CacheInconsistency { .. }));
    }

    #[test]
    fn test_foreign_entry_is_inconsistent() {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
        let k = key("f", 5);
        let forged = serde_json::json!({"function": "g", "key": k.hex(), "value": 1});
        store.put(&k, &forged.to_string()).unwrap();
        let cache = Cache::new(Some(store));
        let err = cache.get_or_compute::<u64, _>(&k, || Ok(1)).unwrap_err();
        assert!(matches!(err, CountError::CacheInconsistency { .. }));
    }

    #[test]
    fn test_force_refresh_overwrites() {
        let cache = Cache::new(Some(Arc::new(MemoryStore::new())));
        let k = key("f", 6);
        let _: u32 = cache.get_or_compute(&k, || Ok(1)).unwrap();
        let v: u32 = cache.force_refresh(&k, || Ok(2)).unwrap();
        assert_eq!(v, 2);
        assert_eq!(cache.get_or_compute::<u32, _>(&k, || Ok(3)).unwrap(), 2);
    }
}
