//! Exact fault counting for fault-tolerant circuit components.
//!
//! This crate counts, order by order, how many fault configurations of a
//! composed circuit leave each possible error *key* on its output blocks.
//! A key is the parity-check pattern of the residual error, one integer per
//! block; because keys are linear in the error, independent faults combine
//! by XOR and the whole computation reduces to convolutions of count tables.
//!
//! # Overview
//!
//! - [`Key`] and [`KeyGenerator`]: per-block syndrome keys.
//! - [`KeyPropagator`]: the noiseless effect of a component on keys.
//! - [`Counts`] and [`CountResult`]: multiplicities per fault order.
//! - [`Component`]: leaves, sequential and parallel composition,
//!   concatenation, and noiseless adapters.
//! - [`convolve`](convolve::convolve): the single table-combining primitive.
//! - [`Cache`]: in-process memo plus an optional persistent store.
//! - [`WorkerPool`]: parallel dispatch of independent counts.
//! - [`LookupTable`]: decoded output counts per input syndrome.
//! - [`gadgets`]: Bell pairs, Bell measurement and teleportation.
//!
//! # Example: Bell Measurement
//!
//! ```rust
//! use ftcount_circuit::{Axis, NoiseModels};
//! use ftcount_count::{gadgets, CountContext, KGood, Key};
//! use ftcount_qec::catalog;
//!
//! let meas = gadgets::bell_meas(KGood::uniform(1), catalog::trivial()).unwrap();
//! let ctx = CountContext::serial();
//! let result = meas.count(&ctx, &NoiseModels::counting(), Axis::X, None, None).unwrap();
//!
//! // one X fault in four flips the Z-basis outcome
//! assert_eq!(result.counts().get(1, &Key::from([0, 1])), 3);
//! assert_eq!(result.counts().get(1, &Key::from([0, 0])), 1);
//! ```

pub mod block;
pub mod cache;
pub mod component;
pub mod context;
pub mod convolve;
pub mod decode;
pub mod dispatch;
pub mod error;
pub mod gadgets;
pub mod key;
pub mod propagator;
pub mod result;

mod faults;

pub use block::Block;
pub use cache::{Cache, CacheKey, CacheStats, CacheStore, FileStore, MemoryStore};
pub use component::{Adapter, AdapterKind, Component, Concatenated, KGood, Leaf, LeafKind, Parallel, Sequential};
pub use context::{CountConfig, CountContext};
pub use convolve::Combine;
pub use decode::LookupTable;
pub use dispatch::{Pending, WorkerPool};
pub use error::{CountError, FtResult};
pub use key::{Key, KeyGenerator};
pub use propagator::{KeyOp, KeyPropagator};
pub use result::{Count, CountResult, Counts, Level};
