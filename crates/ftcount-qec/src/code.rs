//! The code capability consumed by the counting engine.
//!
//! Everything the engine needs from a code is expressed through the
//! [`Code`] trait: its parity checks (stabilizers followed by normalizers),
//! a syndrome-to-correction map, and a mask selecting which parity-check
//! bits are meaningful for the block. Codes are compared by their check
//! structure through [`Code::fingerprint`], never by identity.

use crate::error::{QecError, QecResult};
use crate::pauli::{Pauli, PauliKind, bits_msb_first};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Largest number of parity checks a key may carry.
pub const MAX_CHECKS: usize = 63;

/// Largest block length for which a correction table is built by
/// exhaustive search.
pub const MAX_TABLE_QUBITS: usize = 12;

/// Logical X and Z operators of one encoded qubit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogicalPair {
    /// Logical X.
    pub x: Pauli,
    /// Logical Z.
    pub z: Pauli,
}

impl LogicalPair {
    /// Operator of the given type (`X` or `Z`); anything else yields `None`.
    pub fn get(&self, kind: PauliKind) -> Option<Pauli> {
        match kind {
            PauliKind::X => Some(self.x),
            PauliKind::Z => Some(self.z),
            _ => None,
        }
    }
}

/// A stabilizer code, or a state of one, as seen by the counting engine.
pub trait Code: fmt::Debug + Send + Sync {
    /// Short human-readable name.
    fn name(&self) -> &str;

    /// Number of physical qubits per block.
    fn block_length(&self) -> usize;

    /// Stabilizer generators.
    fn stabilizers(&self) -> &[Pauli];

    /// Logical operator pairs, one per encoded qubit.
    fn logical_operators(&self) -> &[LogicalPair];

    /// Gauge operators. Plain stabilizer codes have none.
    fn gauge_operators(&self) -> &[Pauli] {
        &[]
    }

    /// Canonical correction for a stabilizer syndrome (first stabilizer at
    /// the most significant bit).
    fn correction(&self, syndrome: u64) -> Pauli;

    /// The code this one refines, if it is a logical state of a code.
    fn underlying(&self) -> Option<Arc<dyn Code>> {
        None
    }

    /// Normalizer generators, ordered `[X_1, Z_1, X_2, Z_2, ...]`.
    fn normalizers(&self) -> Vec<Pauli> {
        self.logical_operators()
            .iter()
            .flat_map(|pair| [pair.x, pair.z])
            .collect()
    }

    /// Checks used to build keys: stabilizers followed by normalizers.
    fn parity_checks(&self) -> Vec<Pauli> {
        let mut checks = self.stabilizers().to_vec();
        checks.extend(self.normalizers());
        checks
    }

    /// Bits of the key that carry information for this block.
    fn key_mask(&self) -> u64 {
        let n = self.parity_checks().len();
        if n >= 64 { u64::MAX } else { (1u64 << n) - 1 }
    }

    /// Key of an error: one bit per parity check (set when the error
    /// anticommutes with the check, first check at the most significant
    /// bit), restricted to [`Code::key_mask`].
    fn key_of(&self, error: &Pauli) -> u64 {
        let checks = self.parity_checks();
        bits_msb_first(checks.iter().map(|c| !c.commutes_with(error))) & self.key_mask()
    }

    /// Stabilizer syndrome of an error.
    fn syndrome_of(&self, error: &Pauli) -> u64 {
        bits_msb_first(self.stabilizers().iter().map(|s| !s.commutes_with(error)))
    }

    /// Canonical description used for equality and content addressing.
    fn fingerprint(&self) -> String {
        let checks: Vec<String> = self.parity_checks().iter().map(ToString::to_string).collect();
        format!("n={};checks={};mask={:#x}", self.block_length(), checks.join(","), self.key_mask())
    }
}

/// Whether two codes have the same check structure.
pub fn same_code(a: &dyn Code, b: &dyn Code) -> bool {
    a.fingerprint() == b.fingerprint()
}

/// A stabilizer code with a minimum-weight correction table.
#[derive(Debug, Clone)]
pub struct StabilizerCode {
    name: String,
    n: usize,
    stabilizers: Vec<Pauli>,
    logicals: Vec<LogicalPair>,
    corrections: Vec<Pauli>,
}

impl StabilizerCode {
    /// Build a code and its correction table.
    ///
    /// Fails if the generators have inconsistent lengths, do not commute,
    /// if a logical pair is not a valid (anticommuting, stabilizer-commuting)
    /// pair, or if some syndrome has no correcting error.
    pub fn new(
        name: impl Into<String>,
        n: usize,
        stabilizers: Vec<Pauli>,
        logicals: Vec<LogicalPair>,
    ) -> QecResult<Self> {
        let name = name.into();
        let malformed = |reason: String| QecError::MalformedCode {
            code: name.clone(),
            reason,
        };

        let all_ops = stabilizers
            .iter()
            .chain(logicals.iter().flat_map(|l| [&l.x, &l.z]));
        for op in all_ops {
            if op.len() != n {
                return Err(malformed(format!("operator {op} does not act on {n} qubits")));
            }
        }
        let n_checks = stabilizers.len() + 2 * logicals.len();
        if n_checks > MAX_CHECKS {
            return Err(QecError::TooLarge {
                what: "parity checks",
                max: MAX_CHECKS,
                got: n_checks,
            });
        }
        for (i, a) in stabilizers.iter().enumerate() {
            for b in &stabilizers[i + 1..] {
                if !a.commutes_with(b) {
                    return Err(malformed(format!("stabilizers {a} and {b} anticommute")));
                }
            }
        }
        for pair in &logicals {
            if pair.x.commutes_with(&pair.z) {
                return Err(malformed(format!("logicals {} and {} commute", pair.x, pair.z)));
            }
            for s in &stabilizers {
                if !s.commutes_with(&pair.x) || !s.commutes_with(&pair.z) {
                    return Err(malformed(format!("stabilizer {s} anticommutes with a logical")));
                }
            }
        }

        let corrections = correction_table(&name, n, &stabilizers)?;
        Ok(Self {
            name,
            n,
            stabilizers,
            logicals,
            corrections,
        })
    }

    /// Wrap in an `Arc<dyn Code>`.
    pub fn into_shared(self) -> Arc<dyn Code> {
        Arc::new(self)
    }
}

/// Minimum-weight correction for every stabilizer syndrome, ties broken by
/// enumeration order.
fn correction_table(name: &str, n: usize, stabilizers: &[Pauli]) -> QecResult<Vec<Pauli>> {
    let size = 1usize << stabilizers.len();
    if stabilizers.is_empty() {
        return Ok(vec![Pauli::identity(n)?]);
    }
    if n > MAX_TABLE_QUBITS {
        return Err(QecError::TooLarge {
            what: "block length for table decoding",
            max: MAX_TABLE_QUBITS,
            got: n,
        });
    }

    let mut table: Vec<Option<Pauli>> = vec![None; size];
    let mut remaining = size;
    let span = 1u64 << n;
    'weights: for weight in 0..=n as u32 {
        for x in 0..span {
            for z in 0..span {
                if (x | z).count_ones() != weight {
                    continue;
                }
                let e = Pauli::from_bits(n, x, z)?;
                let s = bits_msb_first(stabilizers.iter().map(|g| !g.commutes_with(&e)));
                let slot = &mut table[s as usize];
                if slot.is_none() {
                    *slot = Some(e);
                    remaining -= 1;
                    if remaining == 0 {
                        break 'weights;
                    }
                }
            }
        }
    }

    table
        .into_iter()
        .enumerate()
        .map(|(s, e)| {
            e.ok_or_else(|| QecError::MalformedCode {
                code: name.to_string(),
                reason: format!("syndrome {s:#b} is unreachable (dependent stabilizers?)"),
            })
        })
        .collect()
}

impl Code for StabilizerCode {
    fn name(&self) -> &str {
        &self.name
    }

    fn block_length(&self) -> usize {
        self.n
    }

    fn stabilizers(&self) -> &[Pauli] {
        &self.stabilizers
    }

    fn logical_operators(&self) -> &[LogicalPair] {
        &self.logicals
    }

    fn correction(&self, syndrome: u64) -> Pauli {
        let index = syndrome as usize & (self.corrections.len() - 1);
        self.corrections[index]
    }
}

/// A logical state of a code: the code plus stabilizers fixing the state.
///
/// Keys keep the underlying code's bit layout so they combine with keys of
/// the code itself; bits for checks that are not stabilizers of the state
/// are masked out.
#[derive(Debug, Clone)]
pub struct StabilizerState {
    name: String,
    code: Arc<dyn Code>,
    stabilizers: Vec<Pauli>,
    mask: u64,
}

impl StabilizerState {
    /// A state of `code` additionally stabilized by `extra`.
    pub fn new(name: impl Into<String>, code: Arc<dyn Code>, extra: Vec<Pauli>) -> QecResult<Self> {
        let name = name.into();
        let n = code.block_length();
        if let Some(op) = extra.iter().find(|op| op.len() != n) {
            return Err(QecError::MalformedCode {
                code: name,
                reason: format!("state stabilizer {op} does not act on {n} qubits"),
            });
        }
        let mut stabilizers = code.stabilizers().to_vec();
        stabilizers.extend(extra);
        let mask = bits_msb_first(code.parity_checks().iter().map(|c| stabilizers.contains(c)));
        Ok(Self {
            name,
            code,
            stabilizers,
            mask,
        })
    }

    /// The encoded `|0>` state (stabilized by every logical Z).
    pub fn zero(code: Arc<dyn Code>) -> QecResult<Self> {
        let extra = code.logical_operators().iter().map(|l| l.z).collect();
        let name = format!("|0>_{}", code.name());
        Self::new(name, code, extra)
    }

    /// The encoded `|+>` state (stabilized by every logical X).
    pub fn plus(code: Arc<dyn Code>) -> QecResult<Self> {
        let extra = code.logical_operators().iter().map(|l| l.x).collect();
        let name = format!("|+>_{}", code.name());
        Self::new(name, code, extra)
    }

    /// The state fixed by logical `basis` (`Z` for `|0>`, `X` for `|+>`).
    pub fn eigenstate(code: Arc<dyn Code>, basis: PauliKind) -> QecResult<Self> {
        match basis {
            PauliKind::Z => Self::zero(code),
            PauliKind::X => Self::plus(code),
            other => Err(QecError::MalformedCode {
                code: code.name().to_string(),
                reason: format!("no eigenstate preparation for basis {other}"),
            }),
        }
    }

    /// Wrap in an `Arc<dyn Code>`.
    pub fn into_shared(self) -> Arc<dyn Code> {
        Arc::new(self)
    }
}

impl Code for StabilizerState {
    fn name(&self) -> &str {
        &self.name
    }

    fn block_length(&self) -> usize {
        self.code.block_length()
    }

    fn stabilizers(&self) -> &[Pauli] {
        &self.stabilizers
    }

    fn logical_operators(&self) -> &[LogicalPair] {
        &[]
    }

    fn correction(&self, syndrome: u64) -> Pauli {
        // the extra state stabilizers sit in the low bits
        let extra = self.stabilizers.len() - self.code.stabilizers().len();
        self.code.correction(syndrome >> extra)
    }

    fn underlying(&self) -> Option<Arc<dyn Code>> {
        Some(Arc::clone(&self.code))
    }

    fn parity_checks(&self) -> Vec<Pauli> {
        self.code.parity_checks()
    }

    fn key_mask(&self) -> u64 {
        self.mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;

    #[test]
    fn test_trivial_code_keys() {
        let code = catalog::trivial();
        assert_eq!(code.parity_checks().len(), 2);
        assert_eq!(code.key_of(&"X".parse().unwrap()), 1);
        assert_eq!(code.key_of(&"Z".parse().unwrap()), 2);
        assert_eq!(code.key_of(&"Y".parse().unwrap()), 3);
        assert_eq!(code.key_of(&"I".parse().unwrap()), 0);
        assert!(code.correction(0).is_identity());
    }

    #[test]
    fn test_state_masks() {
        let code = catalog::trivial();
        let zero = StabilizerState::zero(Arc::clone(&code)).unwrap();
        let plus = StabilizerState::plus(Arc::clone(&code)).unwrap();
        assert_eq!(zero.key_mask(), 0b01);
        assert_eq!(plus.key_mask(), 0b10);
        assert_eq!(zero.key_of(&"X".parse().unwrap()), 1);
        assert_eq!(zero.key_of(&"Z".parse().unwrap()), 0);
        assert_eq!(plus.key_of(&"Z".parse().unwrap()), 2);
        assert!(!same_code(&zero, code.as_ref()));
        assert!(same_code(zero.underlying().unwrap().as_ref(), code.as_ref()));
    }

    #[test]
    fn test_steane_corrections_fix_single_errors() {
        let code = catalog::steane().unwrap();
        for q in 0..7 {
            for kind in [PauliKind::X, PauliKind::Y, PauliKind::Z] {
                let e = Pauli::single(7, q, kind).unwrap();
                let fix = code.correction(code.syndrome_of(&e));
                let residual = e ^ fix;
                assert_eq!(code.syndrome_of(&residual), 0);
                // distance three: single errors never leave a logical error
                for l in code.normalizers() {
                    assert!(l.commutes_with(&residual), "{e} left logical residue");
                }
            }
        }
    }

    #[test]
    fn test_rejects_anticommuting_stabilizers() {
        let err = StabilizerCode::new(
            "bad",
            1,
            vec!["X".parse().unwrap(), "Z".parse().unwrap()],
            vec![],
        );
        assert!(matches!(err, Err(QecError::MalformedCode { .. })));
    }

    #[test]
    fn test_rejects_wrong_length() {
        let err = StabilizerCode::new("bad", 2, vec!["ZZZ".parse().unwrap()], vec![]);
        assert!(matches!(err, Err(QecError::MalformedCode { .. })));
    }

    #[test]
    fn test_equal_codes_share_fingerprint() {
        let a = catalog::steane().unwrap();
        let b = catalog::steane().unwrap();
        assert!(same_code(a.as_ref(), b.as_ref()));
        assert!(!same_code(a.as_ref(), catalog::trivial().as_ref()));
    }
}
