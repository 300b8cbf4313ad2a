//! Error types for the QEC crate.

use thiserror::Error;

/// Errors that can occur when building Pauli operators or codes.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QecError {
    /// A character in a Pauli string is not one of `I`, `X`, `Y`, `Z`.
    #[error("Invalid Pauli character '{0}'")]
    InvalidPauliChar(char),

    /// Operators of different lengths were combined.
    #[error("Pauli length mismatch: expected {expected}, got {got}")]
    LengthMismatch {
        /// Expected number of qubits.
        expected: usize,
        /// Actual number of qubits.
        got: usize,
    },

    /// A qubit index is outside the operator.
    #[error("Qubit {qubit} out of range for {len}-qubit operator")]
    QubitOutOfRange {
        /// The offending qubit index.
        qubit: usize,
        /// Length of the operator.
        len: usize,
    },

    /// Operator or check list does not fit in a 64-bit word.
    #[error("{what} exceeds the supported maximum of {max} (got {got})")]
    TooLarge {
        /// What overflowed.
        what: &'static str,
        /// Maximum supported size.
        max: usize,
        /// Requested size.
        got: usize,
    },

    /// Code definition is internally inconsistent.
    #[error("Malformed code '{code}': {reason}")]
    MalformedCode {
        /// Name of the code.
        code: String,
        /// What is wrong with it.
        reason: String,
    },
}

/// Result type for QEC operations.
pub type QecResult<T> = Result<T, QecError>;
