//! Error types for the counting engine.

use ftcount_circuit::CircuitError;
use ftcount_qec::QecError;
use thiserror::Error;

/// Errors that can occur while building or counting components.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CountError {
    /// A component was assembled from parts that do not fit together.
    #[error("{component}: {operation}: {reason}")]
    Configuration {
        /// Name of the offending component.
        component: String,
        /// Operation that failed.
        operation: &'static str,
        /// What went wrong.
        reason: String,
    },

    /// Adjacent components disagree on their block layout.
    #[error("{component}: {operation}: expected blocks [{expected}], got [{got}]")]
    BlockMismatch {
        /// Name of the offending component.
        component: String,
        /// Operation that failed.
        operation: &'static str,
        /// Blocks that were expected.
        expected: String,
        /// Blocks that were supplied.
        got: String,
    },

    /// The code or basis combination has no supported key propagation.
    #[error("{component}: unsupported configuration: {reason}")]
    Unsupported {
        /// Name of the offending component.
        component: String,
        /// What is unsupported.
        reason: String,
    },

    /// A key of the wrong width reached an operation.
    #[error("{operation}: key width {got} does not match {expected}")]
    KeyWidth {
        /// Operation that failed.
        operation: &'static str,
        /// Expected width.
        expected: usize,
        /// Actual width.
        got: usize,
    },

    /// A multiplicity does not fit in a [`Count`](crate::result::Count).
    #[error("{operation}: multiplicity overflows 128 bits")]
    Overflow {
        /// Operation that failed.
        operation: &'static str,
    },

    /// A stored cache entry does not have the expected shape.
    #[error("Cache inconsistency for entry {key}: {reason}")]
    CacheInconsistency {
        /// Hex content address of the entry.
        key: String,
        /// What did not match.
        reason: String,
    },

    /// A dispatched unit of work did not produce a result.
    #[error("Dispatch failed: {0}")]
    Dispatch(String),

    /// Error from the code layer.
    #[error(transparent)]
    Qec(#[from] QecError),

    /// Error from the circuit layer.
    #[error(transparent)]
    Circuit(#[from] CircuitError),

    /// I/O error from the persistent store.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CountError {
    /// Shorthand for a [`CountError::Configuration`].
    pub fn config(
        component: impl Into<String>,
        operation: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        CountError::Configuration {
            component: component.into(),
            operation,
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`CountError::Unsupported`].
    pub fn unsupported(component: impl Into<String>, reason: impl Into<String>) -> Self {
        CountError::Unsupported {
            component: component.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for counting operations.
pub type FtResult<T> = Result<T, CountError>;
