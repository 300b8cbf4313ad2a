//! Per-kind location counts.

use crate::location::LocationKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul};

/// Location counts indexed by [`LocationKind`], in the order
/// `cnot, prepX, prepZ, measX, measZ, rest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Tally([u64; 6]);

impl Tally {
    /// A tally from raw counts in tally order.
    pub fn new(counts: [u64; 6]) -> Self {
        Self(counts)
    }

    /// Count for one kind.
    pub fn get(&self, kind: LocationKind) -> u64 {
        self.0[kind.index()]
    }

    /// Raw counts.
    pub fn counts(&self) -> [u64; 6] {
        self.0
    }

    /// Sum over all kinds.
    pub fn total(&self) -> u64 {
        self.0.iter().sum()
    }

    /// Swap the X- and Z-type preparation and measurement counts.
    #[must_use]
    pub fn dual(&self) -> Self {
        let mut out = [0; 6];
        for kind in LocationKind::ALL {
            out[kind.dual().index()] = self.get(kind);
        }
        Self(out)
    }
}

impl Add for Tally {
    type Output = Tally;

    fn add(mut self, rhs: Tally) -> Tally {
        self += rhs;
        self
    }
}

impl AddAssign for Tally {
    fn add_assign(&mut self, rhs: Tally) {
        for (a, b) in self.0.iter_mut().zip(rhs.0) {
            *a += b;
        }
    }
}

impl Mul<u64> for Tally {
    type Output = Tally;

    fn mul(self, rhs: u64) -> Tally {
        Tally(self.0.map(|c| c * rhs))
    }
}

impl std::iter::Sum for Tally {
    fn sum<I: Iterator<Item = Tally>>(iter: I) -> Tally {
        iter.fold(Tally::default(), Add::add)
    }
}

impl FromIterator<LocationKind> for Tally {
    fn from_iter<I: IntoIterator<Item = LocationKind>>(iter: I) -> Self {
        let mut out = Tally::default();
        for kind in iter {
            out.0[kind.index()] += 1;
        }
        out
    }
}

impl fmt::Display for Tally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = LocationKind::ALL
            .iter()
            .map(|k| format!("{k}={}", self.get(*k)))
            .collect();
        write!(f, "Tally({})", parts.join(", "))
    }
}
