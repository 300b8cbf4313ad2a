//! Counting context and its configuration.
//!
//! Configuration precedence (highest to lowest):
//! 1. Environment variables (`FTCOUNT_` prefix)
//! 2. Values set on [`CountConfig`]
//! 3. Default values

use crate::cache::{Cache, CacheStore, FileStore};
use crate::dispatch::WorkerPool;
use crate::error::FtResult;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Settings for a [`CountContext`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountConfig {
    /// Worker threads; 0 or 1 counts on the calling thread.
    #[serde(default)]
    pub workers: usize,

    /// Directory of the persistent cache store, if any.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Read and write the persistent store.
    #[serde(default = "default_true")]
    pub fetch: bool,

    /// Keep results in the in-process memo.
    #[serde(default = "default_true")]
    pub memoize: bool,
}

fn default_true() -> bool {
    true
}

impl Default for CountConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            cache_dir: None,
            fetch: true,
            memoize: true,
        }
    }
}

impl CountConfig {
    /// Defaults overridden by `FTCOUNT_WORKERS`, `FTCOUNT_CACHE_DIR`,
    /// `FTCOUNT_FETCH` and `FTCOUNT_MEMO`. Unparseable values are ignored.
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    /// Apply environment overrides on top of `self`.
    #[must_use]
    pub fn with_env(mut self) -> Self {
        if let Ok(workers) = std::env::var("FTCOUNT_WORKERS") {
            if let Ok(val) = workers.parse() {
                self.workers = val;
            }
        }
        if let Ok(dir) = std::env::var("FTCOUNT_CACHE_DIR") {
            self.cache_dir = if dir.is_empty() { None } else { Some(PathBuf::from(dir)) };
        }
        if let Ok(fetch) = std::env::var("FTCOUNT_FETCH") {
            if let Some(val) = parse_flag(&fetch) {
                self.fetch = val;
            }
        }
        if let Ok(memo) = std::env::var("FTCOUNT_MEMO") {
            if let Some(val) = parse_flag(&memo) {
                self.memoize = val;
            }
        }
        self
    }

    /// Set the worker count.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the persistent store directory.
    #[must_use]
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Worker pool and cache shared by every `count` call of one evaluation.
#[derive(Debug, Clone)]
pub struct CountContext {
    pool: WorkerPool,
    cache: Arc<Cache>,
}

impl Default for CountContext {
    fn default() -> Self {
        Self::serial()
    }
}

impl CountContext {
    /// Serial pool and in-process memo only. Deterministic.
    pub fn serial() -> Self {
        Self {
            pool: WorkerPool::serial(),
            cache: Arc::new(Cache::in_process()),
        }
    }

    /// Build the pool and cache described by `config`.
    pub fn from_config(config: &CountConfig) -> FtResult<Self> {
        let pool = WorkerPool::threaded(config.workers)?;
        let store = match &config.cache_dir {
            Some(dir) => Some(Arc::new(FileStore::new(dir)?) as Arc<dyn CacheStore>),
            None => None,
        };
        let cache = Cache::new(store)
            .with_fetch(config.fetch)
            .with_memoize(config.memoize);
        info!(
            workers = pool.workers(),
            cache_dir = ?config.cache_dir,
            fetch = config.fetch,
            memoize = config.memoize,
            "Created counting context"
        );
        Ok(Self {
            pool,
            cache: Arc::new(cache),
        })
    }

    /// Replace the worker pool.
    #[must_use]
    pub fn with_pool(mut self, pool: WorkerPool) -> Self {
        self.pool = pool;
        self
    }

    /// Replace the cache.
    #[must_use]
    pub fn with_cache(mut self, cache: Cache) -> Self {
        self.cache = Arc::new(cache);
        self
    }

    /// The worker pool.
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// The cache.
    pub fn cache(&self) -> &Cache {
        &self.cache
    }
}
