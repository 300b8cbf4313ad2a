//! Error types for the circuit crate.

use ftcount_qec::QecError;
use thiserror::Error;

/// Errors raised while describing locations or noise.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CircuitError {
    /// A CNOT names the same qubit as control and target.
    #[error("CNOT on {block}[{qubit}] uses the same qubit twice")]
    DuplicateQubit {
        /// Block of the repeated qubit.
        block: String,
        /// Index of the repeated qubit.
        qubit: usize,
    },

    /// Locations refer to a block that the layout does not declare.
    #[error("Location refers to undeclared block '{0}'")]
    UnknownBlock(String),

    /// A location addresses a qubit beyond its block's length.
    #[error("Qubit {qubit} out of range for block '{block}' of length {len}")]
    QubitOutOfRange {
        /// Block name.
        block: String,
        /// Offending qubit.
        qubit: usize,
        /// Declared block length.
        len: usize,
    },

    /// No noise model was registered for the requested axis.
    #[error("No noise model for axis {0}")]
    MissingNoiseModel(String),

    /// A noise model produced a fault of the wrong arity.
    #[error("Noise model '{model}' gave a {got}-qubit fault for a {expected}-qubit {kind} location")]
    FaultArity {
        /// Descriptor of the model.
        model: String,
        /// Location kind.
        kind: String,
        /// Qubits the location acts on.
        expected: usize,
        /// Qubits the fault acts on.
        got: usize,
    },

    /// Error from the Pauli layer.
    #[error(transparent)]
    Qec(#[from] QecError),
}

/// Result type for circuit operations.
pub type CircuitResult<T> = Result<T, CircuitError>;
