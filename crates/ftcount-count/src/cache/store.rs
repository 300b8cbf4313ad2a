//! Persistent stores for cache entries.

use super::key::CacheKey;
use crate::error::{CountError, FtResult};
use rustc_hash::FxHashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Key-value persistence for serialized cache entries.
pub trait CacheStore: fmt::Debug + Send + Sync {
    /// Load the entry stored under `key`.
    fn get(&self, key: &CacheKey) -> FtResult<Option<String>>;

    /// Store `entry` under `key`, replacing any previous entry.
    fn put(&self, key: &CacheKey, entry: &str) -> FtResult<()>;

    /// Remove the entry under `key`. Returns whether one existed.
    fn remove(&self, key: &CacheKey) -> FtResult<bool>;
}

/// One JSON file per entry under a base directory.
///
/// Entries are written to a temporary file in the same directory and then
/// renamed into place, so readers see either the old entry or the new one.
/// Concurrent writers of the same key race; the last rename wins.
#[derive(Debug)]
pub struct FileStore {
    base_dir: PathBuf,
    sequence: AtomicU64,
}

impl FileStore {
    /// Open a store rooted at `base_dir`, creating it if needed.
    pub fn new(base_dir: impl AsRef<Path>) -> FtResult<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir)?;
        Ok(Self {
            base_dir,
            sequence: AtomicU64::new(0),
        })
    }

    /// Root directory of the store.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        let hex = key.hex();
        self.base_dir
            .join(&hex[..2.min(hex.len())])
            .join(format!("{hex}.json"))
    }
}

impl CacheStore for FileStore {
    fn get(&self, key: &CacheKey) -> FtResult<Option<String>> {
        match fs::read_to_string(self.entry_path(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CountError::Io(e)),
        }
    }

    fn put(&self, key: &CacheKey, entry: &str) -> FtResult<()> {
        let path = self.entry_path(key);
        let dir = path.parent().unwrap_or(&self.base_dir);
        fs::create_dir_all(dir)?;
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let tmp = dir.join(format!(".{}.{}.{seq}.tmp", key.hex(), std::process::id()));
        fs::write(&tmp, entry)?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(CountError::Io(e));
        }
        Ok(())
    }

    fn remove(&self, key: &CacheKey) -> FtResult<bool> {
        match fs::remove_file(self.entry_path(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CountError::Io(e)),
        }
    }
}

/// In-memory store, for tests and short-lived runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<FxHashMap<String, String>>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().map_or(0, |e| e.len())
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> CountError {
    CountError::Dispatch("memory store lock poisoned".to_string())
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &CacheKey) -> FtResult<Option<String>> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries.get(key.hex()).cloned())
    }

    fn put(&self, key: &CacheKey, entry: &str) -> FtResult<()> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        entries.insert(key.hex().to_string(), entry.to_string());
        Ok(())
    }

    fn remove(&self, key: &CacheKey) -> FtResult<bool> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        Ok(entries.remove(key.hex()).is_some())
    }
}
