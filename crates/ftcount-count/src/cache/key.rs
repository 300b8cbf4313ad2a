//! Content addresses for cached computations.

use crate::error::{CountError, FtResult};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

/// Deterministic address of one cached computation.
///
/// The address is the SHA-256 of the function identity followed by the
/// canonical JSON encoding of each argument, every part length-prefixed so
/// that argument boundaries are unambiguous.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    function: String,
    hex: String,
}

impl CacheKey {
    /// Start a key for `function`.
    pub fn builder(function: impl Into<String>) -> CacheKeyBuilder {
        let function = function.into();
        let mut hasher = Sha256::new();
        absorb(&mut hasher, function.as_bytes());
        CacheKeyBuilder { function, hasher }
    }

    /// Identity of the cached function.
    pub fn function(&self) -> &str {
        &self.function
    }

    /// Lowercase hex digest.
    pub fn hex(&self) -> &str {
        &self.hex
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.function, &self.hex[..12.min(self.hex.len())])
    }
}

/// Incremental builder for a [`CacheKey`].
#[derive(Debug, Clone)]
pub struct CacheKeyBuilder {
    function: String,
    hasher: Sha256,
}

impl CacheKeyBuilder {
    /// Add one argument.
    pub fn arg<T: Serialize + ?Sized>(mut self, value: &T) -> FtResult<Self> {
        let bytes = serde_json::to_vec(value).map_err(|e| {
            CountError::config(
                self.function.clone(),
                "build cache key",
                format!("malformed cache key argument: {e}"),
            )
        })?;
        absorb(&mut self.hasher, &bytes);
        Ok(self)
    }

    /// Finish the key.
    pub fn finish(self) -> CacheKey {
        CacheKey {
            function: self.function,
            hex: to_hex(&self.hasher.finalize()),
        }
    }
}

fn absorb(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

/// Lowercase hex rendering of a digest.
pub(crate) fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

/// SHA-256 of a descriptor string, in hex.
pub(crate) fn digest(text: &str) -> String {
    to_hex(&Sha256::digest(text.as_bytes()))
}
