//! Pauli operators over a block of qubits.
//!
//! A [`Pauli`] stores its X and Z parts as two bit-planes, so operator
//! multiplication (up to phase) is a bitwise XOR and commutation is a
//! parity of overlaps. Qubit `i` lives at bit `i`; the string form lists
//! qubit 0 first, so `"XI"` is an X on qubit 0.

use crate::error::{QecError, QecResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitXor;
use std::str::FromStr;

/// Largest supported operator length.
pub const MAX_QUBITS: usize = 64;

/// A single-qubit Pauli, ignoring phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PauliKind {
    /// Identity.
    I,
    /// Bit flip.
    X,
    /// Both flips.
    Y,
    /// Phase flip.
    Z,
}

impl PauliKind {
    /// Split into (has X part, has Z part).
    pub fn parts(self) -> (bool, bool) {
        match self {
            PauliKind::I => (false, false),
            PauliKind::X => (true, false),
            PauliKind::Y => (true, true),
            PauliKind::Z => (false, true),
        }
    }

    /// Build from (has X part, has Z part).
    pub fn from_parts(x: bool, z: bool) -> Self {
        match (x, z) {
            (false, false) => PauliKind::I,
            (true, false) => PauliKind::X,
            (true, true) => PauliKind::Y,
            (false, true) => PauliKind::Z,
        }
    }

    /// The letter used in string form.
    pub fn symbol(self) -> char {
        match self {
            PauliKind::I => 'I',
            PauliKind::X => 'X',
            PauliKind::Y => 'Y',
            PauliKind::Z => 'Z',
        }
    }
}

impl fmt::Display for PauliKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl TryFrom<char> for PauliKind {
    type Error = QecError;

    fn try_from(c: char) -> QecResult<Self> {
        match c {
            'I' => Ok(PauliKind::I),
            'X' => Ok(PauliKind::X),
            'Y' => Ok(PauliKind::Y),
            'Z' => Ok(PauliKind::Z),
            other => Err(QecError::InvalidPauliChar(other)),
        }
    }
}

/// An n-qubit Pauli operator (phase ignored), n <= 64.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Pauli {
    len: u8,
    x: u64,
    z: u64,
}

fn mask_for(len: usize) -> u64 {
    if len >= MAX_QUBITS {
        u64::MAX
    } else {
        (1u64 << len) - 1
    }
}

fn check_len(len: usize) -> QecResult<u8> {
    if len > MAX_QUBITS {
        return Err(QecError::TooLarge {
            what: "Pauli length",
            max: MAX_QUBITS,
            got: len,
        });
    }
    // len <= 64 fits in u8
    Ok(len as u8)
}

impl Pauli {
    /// The identity on `len` qubits.
    pub fn identity(len: usize) -> QecResult<Self> {
        Ok(Self {
            len: check_len(len)?,
            x: 0,
            z: 0,
        })
    }

    /// Build from raw bit-planes. Bits above `len` must be clear.
    pub fn from_bits(len: usize, x: u64, z: u64) -> QecResult<Self> {
        let l = check_len(len)?;
        let mask = mask_for(len);
        if x & !mask != 0 || z & !mask != 0 {
            return Err(QecError::QubitOutOfRange {
                qubit: 63 - ((x | z) & !mask).leading_zeros() as usize,
                len,
            });
        }
        Ok(Self { len: l, x, z })
    }

    pub(crate) const fn from_raw(len: u8, x: u64, z: u64) -> Self {
        Self { len, x, z }
    }

    /// A single-qubit Pauli `kind` acting on `qubit` of a `len`-qubit block.
    pub fn single(len: usize, qubit: usize, kind: PauliKind) -> QecResult<Self> {
        let mut p = Self::identity(len)?;
        p.set(qubit, kind)?;
        Ok(p)
    }

    /// Number of qubits.
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Whether the operator acts on zero qubits.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// X bit-plane.
    pub fn x_bits(&self) -> u64 {
        self.x
    }

    /// Z bit-plane.
    pub fn z_bits(&self) -> u64 {
        self.z
    }

    /// Whether every qubit carries the identity.
    pub fn is_identity(&self) -> bool {
        self.x == 0 && self.z == 0
    }

    /// Number of qubits with a non-identity Pauli.
    pub fn weight(&self) -> u32 {
        (self.x | self.z).count_ones()
    }

    /// Pauli acting on `qubit`.
    pub fn get(&self, qubit: usize) -> QecResult<PauliKind> {
        if qubit >= self.len() {
            return Err(QecError::QubitOutOfRange {
                qubit,
                len: self.len(),
            });
        }
        Ok(PauliKind::from_parts(
            self.x >> qubit & 1 == 1,
            self.z >> qubit & 1 == 1,
        ))
    }

    /// Overwrite the Pauli acting on `qubit`.
    pub fn set(&mut self, qubit: usize, kind: PauliKind) -> QecResult<()> {
        if qubit >= self.len() {
            return Err(QecError::QubitOutOfRange {
                qubit,
                len: self.len(),
            });
        }
        let (x, z) = kind.parts();
        let bit = 1u64 << qubit;
        self.x = (self.x & !bit) | if x { bit } else { 0 };
        self.z = (self.z & !bit) | if z { bit } else { 0 };
        Ok(())
    }

    /// The X-only (`PauliKind::X`) or Z-only (`PauliKind::Z`) part.
    ///
    /// `Y` returns the operator unchanged and `I` returns the identity.
    #[must_use]
    pub fn partial(&self, kind: PauliKind) -> Self {
        let (keep_x, keep_z) = kind.parts();
        Self {
            len: self.len,
            x: if keep_x { self.x } else { 0 },
            z: if keep_z { self.z } else { 0 },
        }
    }

    /// Whether the two operators commute. Operators of different lengths
    /// are compared on their common qubits.
    pub fn commutes_with(&self, other: &Pauli) -> bool {
        ((self.x & other.z) ^ (self.z & other.x)).count_ones() % 2 == 0
    }

    /// Product of two operators of equal length (phase dropped).
    pub fn compose(&self, other: &Pauli) -> QecResult<Pauli> {
        if self.len != other.len {
            return Err(QecError::LengthMismatch {
                expected: self.len(),
                got: other.len(),
            });
        }
        Ok(*self ^ *other)
    }

    /// Tensor product `self ⊗ other`; `self` occupies the low qubits.
    pub fn tensor(&self, other: &Pauli) -> QecResult<Pauli> {
        let len = self.len() + other.len();
        let l = check_len(len)?;
        let shift = self.len() as u32;
        Ok(Pauli {
            len: l,
            x: self.x | other.x.checked_shl(shift).unwrap_or(0),
            z: self.z | other.z.checked_shl(shift).unwrap_or(0),
        })
    }

    /// The tensor power `self^{⊗count}`.
    pub fn repeat(&self, count: usize) -> QecResult<Pauli> {
        let mut out = Pauli::identity(0)?;
        for _ in 0..count {
            out = out.tensor(self)?;
        }
        Ok(out)
    }
}

impl BitXor for Pauli {
    type Output = Pauli;

    /// Product up to phase. The result takes the longer length.
    fn bitxor(self, rhs: Pauli) -> Pauli {
        Pauli {
            len: self.len.max(rhs.len),
            x: self.x ^ rhs.x,
            z: self.z ^ rhs.z,
        }
    }
}

impl fmt::Display for Pauli {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for q in 0..self.len() {
            let kind = PauliKind::from_parts(self.x >> q & 1 == 1, self.z >> q & 1 == 1);
            write!(f, "{}", kind.symbol())?;
        }
        Ok(())
    }
}

impl FromStr for Pauli {
    type Err = QecError;

    fn from_str(s: &str) -> QecResult<Self> {
        let chars: Vec<char> = s.chars().filter(|c| !c.is_whitespace()).collect();
        let mut p = Pauli::identity(chars.len())?;
        for (q, c) in chars.into_iter().enumerate() {
            p.set(q, PauliKind::try_from(c)?)?;
        }
        Ok(p)
    }
}

/// Pack a list of booleans into an integer, first entry at the most
/// significant position.
pub fn bits_msb_first<I: IntoIterator<Item = bool>>(flags: I) -> u64 {
    flags
        .into_iter()
        .fold(0u64, |acc, flag| (acc << 1) | u64::from(flag))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn p(s: &str) -> Pauli {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        let op = p("XIZY");
        assert_eq!(op.len(), 4);
        assert_eq!(op.x_bits(), 0b1001);
        assert_eq!(op.z_bits(), 0b1100);
        assert_eq!(op.to_string(), "XIZY");
        assert!(matches!(
            "XQ".parse::<Pauli>(),
            Err(QecError::InvalidPauliChar('Q'))
        ));
    }

    #[test]
    fn test_commutation() {
        assert!(p("XX").commutes_with(&p("ZZ")));
        assert!(!p("XI").commutes_with(&p("ZI")));
        assert!(!p("Y").commutes_with(&p("X")));
        assert!(p("Y").commutes_with(&p("Y")));
    }

    #[test]
    fn test_partial() {
        let op = p("XYZI");
        assert_eq!(op.partial(PauliKind::X), p("XXII"));
        assert_eq!(op.partial(PauliKind::Z), p("IZZI"));
        assert_eq!(op.partial(PauliKind::Y), op);
        assert!(op.partial(PauliKind::I).is_identity());
    }

    #[test]
    fn test_tensor() {
        let op = p("X").tensor(&p("Z")).unwrap();
        assert_eq!(op, p("XZ"));
        assert_eq!(p("Z").repeat(3).unwrap(), p("ZZZ"));
        let big = Pauli::identity(40).unwrap();
        assert!(big.tensor(&big).is_err());
    }

    #[test]
    fn test_compose_length_mismatch() {
        assert!(matches!(
            p("X").compose(&p("XX")),
            Err(QecError::LengthMismatch { expected: 1, got: 2 })
        ));
        assert_eq!(p("XZ").compose(&p("ZZ")).unwrap(), p("YI"));
    }

    #[test]
    fn test_from_bits_rejects_high_bits() {
        assert!(Pauli::from_bits(2, 0b100, 0).is_err());
        assert!(Pauli::from_bits(64, u64::MAX, u64::MAX).is_ok());
    }

    #[test]
    fn test_bits_msb_first() {
        assert_eq!(bits_msb_first([true, false]), 0b10);
        assert_eq!(bits_msb_first([false, true, true]), 0b011);
        assert_eq!(bits_msb_first(std::iter::empty()), 0);
    }

    proptest! {
        #[test]
        fn prop_commutation_is_symmetric(a in 0u64..256, b in 0u64..256, c in 0u64..256, d in 0u64..256) {
            let p1 = Pauli::from_bits(8, a, b).unwrap();
            let p2 = Pauli::from_bits(8, c, d).unwrap();
            prop_assert_eq!(p1.commutes_with(&p2), p2.commutes_with(&p1));
        }

        #[test]
        fn prop_string_round_trip(a in 0u64..1024, b in 0u64..1024) {
            let op = Pauli::from_bits(10, a, b).unwrap();
            prop_assert_eq!(op.to_string().parse::<Pauli>().unwrap(), op);
        }
    }
}
