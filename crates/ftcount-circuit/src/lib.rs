//! Circuit description for fault counting.
//!
//! - [`Location`] and [`Locations`]: the operations of a leaf circuit, each
//!   of which may fail.
//! - [`Tally`]: location counts per kind, consumed by probability-bound
//!   construction.
//! - [`NoiseModel`] and [`NoiseModels`]: which faults occur at each kind of
//!   location, per counted [`Axis`].

pub mod error;
pub mod location;
pub mod noise;
pub mod tally;

pub use error::{CircuitError, CircuitResult};
pub use location::{BlockQubit, Location, LocationKind, Locations};
pub use noise::{Axis, CountingNoise, Fault, NoiseModel, NoiseModels, WeightedNoise};
pub use tally::Tally;
