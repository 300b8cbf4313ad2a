//! Circuit locations.
//!
//! A [`Location`] is one physical operation that can fail. A [`Locations`]
//! list is the circuit of a leaf component, in time order.

use crate::error::{CircuitError, CircuitResult};
use crate::noise::Axis;
use crate::tally::Tally;
use ftcount_qec::PauliKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The six location types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LocationKind {
    /// Controlled-NOT.
    Cnot,
    /// Preparation of `|+>`.
    PrepX,
    /// Preparation of `|0>`.
    PrepZ,
    /// Measurement in the X basis.
    MeasX,
    /// Measurement in the Z basis.
    MeasZ,
    /// Idle step.
    Rest,
}

impl LocationKind {
    /// All kinds, in tally order.
    pub const ALL: [LocationKind; 6] = [
        LocationKind::Cnot,
        LocationKind::PrepX,
        LocationKind::PrepZ,
        LocationKind::MeasX,
        LocationKind::MeasZ,
        LocationKind::Rest,
    ];

    /// Position of this kind in a [`Tally`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// Number of qubits the location acts on.
    pub fn arity(self) -> usize {
        match self {
            LocationKind::Cnot => 2,
            _ => 1,
        }
    }

    /// The kind with X and Z exchanged.
    #[must_use]
    pub fn dual(self) -> Self {
        match self {
            LocationKind::PrepX => LocationKind::PrepZ,
            LocationKind::PrepZ => LocationKind::PrepX,
            LocationKind::MeasX => LocationKind::MeasZ,
            LocationKind::MeasZ => LocationKind::MeasX,
            other => other,
        }
    }

    /// Preparation in the given basis.
    pub fn prep(basis: PauliKind) -> Option<Self> {
        match basis {
            PauliKind::X => Some(LocationKind::PrepX),
            PauliKind::Z => Some(LocationKind::PrepZ),
            _ => None,
        }
    }

    /// Measurement in the given basis.
    pub fn meas(basis: PauliKind) -> Option<Self> {
        match basis {
            PauliKind::X => Some(LocationKind::MeasX),
            PauliKind::Z => Some(LocationKind::MeasZ),
            _ => None,
        }
    }
}

impl fmt::Display for LocationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LocationKind::Cnot => "cnot",
            LocationKind::PrepX => "prepX",
            LocationKind::PrepZ => "prepZ",
            LocationKind::MeasX => "measX",
            LocationKind::MeasZ => "measZ",
            LocationKind::Rest => "rest",
        };
        write!(f, "{name}")
    }
}

/// A qubit addressed by block name and position within the block.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockQubit {
    /// Block name.
    pub block: String,
    /// Qubit index inside the block.
    pub index: usize,
}

impl BlockQubit {
    /// Create a block qubit address.
    pub fn new(block: impl Into<String>, index: usize) -> Self {
        Self {
            block: block.into(),
            index,
        }
    }
}

impl fmt::Display for BlockQubit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.block, self.index)
    }
}

/// One physical operation. CNOT operands are `[control, target]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    kind: LocationKind,
    qubits: Vec<BlockQubit>,
}

impl Location {
    /// An idle step.
    pub fn rest(block: impl Into<String>, index: usize) -> Self {
        Self {
            kind: LocationKind::Rest,
            qubits: vec![BlockQubit::new(block, index)],
        }
    }

    /// A `|0>` preparation.
    pub fn prep_z(block: impl Into<String>, index: usize) -> Self {
        Self {
            kind: LocationKind::PrepZ,
            qubits: vec![BlockQubit::new(block, index)],
        }
    }

    /// A `|+>` preparation.
    pub fn prep_x(block: impl Into<String>, index: usize) -> Self {
        Self {
            kind: LocationKind::PrepX,
            qubits: vec![BlockQubit::new(block, index)],
        }
    }

    /// A Z-basis measurement.
    pub fn meas_z(block: impl Into<String>, index: usize) -> Self {
        Self {
            kind: LocationKind::MeasZ,
            qubits: vec![BlockQubit::new(block, index)],
        }
    }

    /// An X-basis measurement.
    pub fn meas_x(block: impl Into<String>, index: usize) -> Self {
        Self {
            kind: LocationKind::MeasX,
            qubits: vec![BlockQubit::new(block, index)],
        }
    }

    /// A CNOT. Fails when control and target coincide.
    pub fn cnot(
        ctrl_block: impl Into<String>,
        ctrl: usize,
        targ_block: impl Into<String>,
        targ: usize,
    ) -> CircuitResult<Self> {
        let c = BlockQubit::new(ctrl_block, ctrl);
        let t = BlockQubit::new(targ_block, targ);
        if c == t {
            return Err(CircuitError::DuplicateQubit {
                block: c.block,
                qubit: c.index,
            });
        }
        Ok(Self {
            kind: LocationKind::Cnot,
            qubits: vec![c, t],
        })
    }

    /// Location type.
    pub fn kind(&self) -> LocationKind {
        self.kind
    }

    /// Operands, control first for CNOT.
    pub fn qubits(&self) -> &[BlockQubit] {
        &self.qubits
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let operands: Vec<String> = self.qubits.iter().map(ToString::to_string).collect();
        write!(f, "{}({})", self.kind, operands.join(", "))
    }
}

/// A named, time-ordered list of locations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Locations {
    name: String,
    list: Vec<Location>,
}

impl Locations {
    /// Create a location list.
    pub fn new(name: impl Into<String>, list: Vec<Location>) -> Self {
        Self {
            name: name.into(),
            list,
        }
    }

    /// Name of the list.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of locations.
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Iterate over locations in time order.
    pub fn iter(&self) -> std::slice::Iter<'_, Location> {
        self.list.iter()
    }

    /// Append a location.
    pub fn push(&mut self, location: Location) {
        self.list.push(location);
    }

    /// Block names in order of first appearance.
    pub fn block_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for q in self.list.iter().flat_map(|l| l.qubits.iter()) {
            if !names.contains(&q.block) {
                names.push(q.block.clone());
            }
        }
        names
    }

    /// Check every operand against a declared `(block name, length)` layout.
    pub fn validate_layout(&self, layout: &[(String, usize)]) -> CircuitResult<()> {
        for q in self.list.iter().flat_map(|l| l.qubits.iter()) {
            let Some((_, len)) = layout.iter().find(|(name, _)| *name == q.block) else {
                return Err(CircuitError::UnknownBlock(q.block.clone()));
            };
            if q.index >= *len {
                return Err(CircuitError::QubitOutOfRange {
                    block: q.block.clone(),
                    qubit: q.index,
                    len: *len,
                });
            }
        }
        Ok(())
    }

    /// Location counts per kind.
    pub fn tally(&self) -> Tally {
        self.list.iter().map(Location::kind).collect()
    }

    /// Location counts per kind, restricted to the locations that can
    /// produce errors on `axis`.
    pub fn tally_for(&self, axis: Axis) -> Tally {
        self.list
            .iter()
            .map(Location::kind)
            .filter(|k| axis.can_fault(*k))
            .collect()
    }
}

impl<'a> IntoIterator for &'a Locations {
    type Item = &'a Location;
    type IntoIter = std::slice::Iter<'a, Location>;

    fn into_iter(self) -> Self::IntoIter {
        self.list.iter()
    }
}

impl FromIterator<Location> for Locations {
    fn from_iter<I: IntoIterator<Item = Location>>(iter: I) -> Self {
        Self::new("", iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Locations {
        Locations::new(
            "sample",
            vec![
                Location::prep_z("b", 0),
                Location::cnot("a", 0, "b", 0).unwrap(),
                Location::meas_x("a", 0),
                Location::rest("b", 0),
            ],
        )
    }

    #[test]
    fn test_block_names_first_appearance() {
        assert_eq!(sample().block_names(), vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_cnot_rejects_same_qubit() {
        assert!(matches!(
            Location::cnot("a", 1, "a", 1),
            Err(CircuitError::DuplicateQubit { qubit: 1, .. })
        ));
    }

    #[test]
    fn test_validate_layout() {
        let locs = sample();
        let good = vec![("a".to_string(), 1), ("b".to_string(), 1)];
        assert!(locs.validate_layout(&good).is_ok());
        let missing = vec![("a".to_string(), 1)];
        assert!(matches!(
            locs.validate_layout(&missing),
            Err(CircuitError::UnknownBlock(name)) if name == "b"
        ));
    }

    #[test]
    fn test_tally_for_axis() {
        let locs = sample();
        assert_eq!(locs.tally().total(), 4);
        // measX cannot produce X errors
        assert_eq!(locs.tally_for(Axis::X).total(), 3);
        // prepZ cannot produce Z errors
        assert_eq!(locs.tally_for(Axis::Z).total(), 3);
        assert_eq!(locs.tally_for(Axis::Y).total(), 4);
    }

    #[test]
    fn test_display() {
        let cnot = Location::cnot("a", 0, "b", 2).unwrap();
        assert_eq!(cnot.to_string(), "cnot(a[0], b[2])");
    }
}
