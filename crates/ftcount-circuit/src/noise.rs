//! Counting noise models.
//!
//! A noise model tells the counter, for each location kind, which Pauli
//! faults may occur there and with what integer weight. The counting
//! models below give every fault weight one, so counts are plain numbers
//! of fault configurations. [`WeightedNoise`] scales those weights per
//! location kind, which is how marginal or biased models are expressed
//! without leaving integer arithmetic.

use crate::error::{CircuitError, CircuitResult};
use crate::location::LocationKind;
use ftcount_qec::{Pauli, PauliKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// The error type being counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Axis {
    /// Bit-flip errors only.
    X,
    /// Phase-flip errors only.
    Z,
    /// X and Z errors together.
    Y,
}

impl Axis {
    /// The corresponding single-qubit Pauli.
    pub fn pauli(self) -> PauliKind {
        match self {
            Axis::X => PauliKind::X,
            Axis::Z => PauliKind::Z,
            Axis::Y => PauliKind::Y,
        }
    }

    /// Whether a location of this kind can produce errors on this axis.
    ///
    /// `|+>` preparations and X measurements cannot cause X errors, and
    /// dually for Z.
    pub fn can_fault(self, kind: LocationKind) -> bool {
        match self {
            Axis::X => !matches!(kind, LocationKind::PrepX | LocationKind::MeasX),
            Axis::Z => !matches!(kind, LocationKind::PrepZ | LocationKind::MeasZ),
            Axis::Y => true,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pauli())
    }
}

/// One fault outcome: the Pauli applied after the location and its weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fault {
    /// Error on the location's qubits (control first for CNOT).
    pub error: Pauli,
    /// Integer weight of the outcome.
    pub weight: u64,
}

/// Noise model capability.
pub trait NoiseModel: fmt::Debug + Send + Sync {
    /// Fault outcomes for a location kind. An empty list means the
    /// location never fails.
    fn faults(&self, kind: LocationKind) -> Vec<Fault>;

    /// Canonical description, used to address cached results.
    fn descriptor(&self) -> String;

    /// Number of distinct fault outcomes for a location kind.
    fn outcomes(&self, kind: LocationKind) -> usize {
        self.faults(kind).len()
    }
}

fn faults_of(names: &[&str]) -> Vec<Fault> {
    names
        .iter()
        .filter_map(|s| s.parse::<Pauli>().ok())
        .map(|error| Fault { error, weight: 1 })
        .collect()
}

const TWO_QUBIT_NON_IDENTITY: [&str; 15] = [
    "IX", "IY", "IZ", "XI", "XX", "XY", "XZ", "YI", "YX", "YY", "YZ", "ZI", "ZX", "ZY", "ZZ",
];

/// Unit-weight noise restricted to one axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountingNoise {
    axis: Axis,
}

impl CountingNoise {
    /// Counting model for `axis`.
    pub fn new(axis: Axis) -> Self {
        Self { axis }
    }

    /// X errors only.
    pub fn x() -> Self {
        Self::new(Axis::X)
    }

    /// Z errors only.
    pub fn z() -> Self {
        Self::new(Axis::Z)
    }

    /// X and Z errors together.
    pub fn xz() -> Self {
        Self::new(Axis::Y)
    }
}

impl NoiseModel for CountingNoise {
    fn faults(&self, kind: LocationKind) -> Vec<Fault> {
        use LocationKind::{Cnot, MeasX, MeasZ, PrepX, PrepZ, Rest};
        match (self.axis, kind) {
            (Axis::X, PrepZ | MeasZ | Rest) => faults_of(&["X"]),
            (Axis::X, Cnot) => faults_of(&["IX", "XI", "XX"]),
            (Axis::Z, PrepX | MeasX | Rest) => faults_of(&["Z"]),
            (Axis::Z, Cnot) => faults_of(&["IZ", "ZI", "ZZ"]),
            (Axis::Y, PrepZ | MeasZ) => faults_of(&["X"]),
            (Axis::Y, PrepX | MeasX) => faults_of(&["Z"]),
            (Axis::Y, Rest) => faults_of(&["X", "Z", "Y"]),
            (Axis::Y, Cnot) => faults_of(&TWO_QUBIT_NON_IDENTITY),
            _ => Vec::new(),
        }
    }

    fn descriptor(&self) -> String {
        format!("counting-{}", self.axis)
    }
}

/// A base model whose weights are multiplied per location kind.
#[derive(Debug, Clone)]
pub struct WeightedNoise {
    base: Arc<dyn NoiseModel>,
    weights: [u64; 6],
}

impl WeightedNoise {
    /// Scale `base` by `weights`, given in tally order.
    pub fn new(base: Arc<dyn NoiseModel>, weights: [u64; 6]) -> Self {
        Self { base, weights }
    }

    /// Weight 8 for rest locations and 4 for everything else.
    pub fn marginal(base: Arc<dyn NoiseModel>) -> Self {
        Self::new(base, [4, 4, 4, 4, 4, 8])
    }
}

impl NoiseModel for WeightedNoise {
    fn faults(&self, kind: LocationKind) -> Vec<Fault> {
        let scale = self.weights[kind.index()];
        self.base
            .faults(kind)
            .into_iter()
            .map(|f| Fault {
                error: f.error,
                weight: f.weight * scale,
            })
            .collect()
    }

    fn descriptor(&self) -> String {
        format!("weighted{:?}({})", self.weights, self.base.descriptor())
    }
}

/// Noise models indexed by the axis they count.
#[derive(Debug, Clone, Default)]
pub struct NoiseModels {
    models: BTreeMap<Axis, Arc<dyn NoiseModel>>,
}

impl NoiseModels {
    /// An empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Unit-weight counting models for all three axes.
    pub fn counting() -> Self {
        Self::new()
            .with(Axis::X, Arc::new(CountingNoise::x()))
            .with(Axis::Z, Arc::new(CountingNoise::z()))
            .with(Axis::Y, Arc::new(CountingNoise::xz()))
    }

    /// Register a model for `axis`.
    #[must_use]
    pub fn with(mut self, axis: Axis, model: Arc<dyn NoiseModel>) -> Self {
        self.models.insert(axis, model);
        self
    }

    /// Model for `axis`.
    pub fn get(&self, axis: Axis) -> CircuitResult<&Arc<dyn NoiseModel>> {
        self.models
            .get(&axis)
            .ok_or_else(|| CircuitError::MissingNoiseModel(axis.to_string()))
    }

    /// Fault outcomes for `kind` under the `axis` model, checked against the
    /// location arity. Kinds that cannot fault on `axis` yield nothing.
    pub fn faults(&self, axis: Axis, kind: LocationKind) -> CircuitResult<Vec<Fault>> {
        if !axis.can_fault(kind) {
            return Ok(Vec::new());
        }
        let model = self.get(axis)?;
        let faults = model.faults(kind);
        if let Some(bad) = faults.iter().find(|f| f.error.len() != kind.arity()) {
            return Err(CircuitError::FaultArity {
                model: model.descriptor(),
                kind: kind.to_string(),
                expected: kind.arity(),
                got: bad.error.len(),
            });
        }
        Ok(faults)
    }

    /// Descriptor of the `axis` model.
    pub fn descriptor(&self, axis: Axis) -> CircuitResult<String> {
        Ok(self.get(axis)?.descriptor())
    }
}
