//! Pauli operators and stabilizer codes for fault counting.
//!
//! This crate supplies the code capability used by `ftcount-count`: given an
//! error, the key of that error with respect to a code's parity checks; given
//! a stabilizer syndrome, a canonical correcting error; and the code's logical
//! and gauge operators.
//!
//! # Example
//!
//! ```rust
//! use ftcount_qec::{catalog, Code, Pauli};
//!
//! let code = catalog::trivial();
//! let x: Pauli = "X".parse().unwrap();
//! assert_eq!(code.key_of(&x), 1);
//! ```

pub mod catalog;
pub mod code;
pub mod error;
pub mod pauli;

pub use code::{Code, LogicalPair, StabilizerCode, StabilizerState, same_code};
pub use error::{QecError, QecResult};
pub use pauli::{Pauli, PauliKind, bits_msb_first};
