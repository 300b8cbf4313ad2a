//! Ready-made codes.

use crate::code::{Code, LogicalPair, StabilizerCode};
use crate::error::QecResult;
use crate::pauli::Pauli;
use std::sync::Arc;

fn ops(list: &[&str]) -> QecResult<Vec<Pauli>> {
    list.iter().map(|s| s.parse()).collect()
}

fn pair(x: &str, z: &str) -> QecResult<LogicalPair> {
    Ok(LogicalPair {
        x: x.parse()?,
        z: z.parse()?,
    })
}

/// The trivial one-qubit code: no stabilizers, logicals `X` and `Z`.
///
/// Keys are two bits wide; an X error has key 1, Z has key 2, Y has key 3.
pub fn trivial() -> Arc<dyn Code> {
    Arc::new(TrivialCode)
}

/// The unencoded qubit.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrivialCode;

const TRIVIAL_LOGICALS: [LogicalPair; 1] = [LogicalPair {
    x: pauli_const(1, 1, 0),
    z: pauli_const(1, 0, 1),
}];

const fn pauli_const(len: u8, x: u64, z: u64) -> Pauli {
    Pauli::from_raw(len, x, z)
}

impl Code for TrivialCode {
    fn name(&self) -> &str {
        "trivial"
    }

    fn block_length(&self) -> usize {
        1
    }

    fn stabilizers(&self) -> &[Pauli] {
        &[]
    }

    fn logical_operators(&self) -> &[LogicalPair] {
        &TRIVIAL_LOGICALS
    }

    fn correction(&self, _syndrome: u64) -> Pauli {
        TRIVIAL_IDENTITY
    }
}

const TRIVIAL_IDENTITY: Pauli = pauli_const(1, 0, 0);

/// The three-qubit bit-flip repetition code.
pub fn bit_flip() -> QecResult<Arc<dyn Code>> {
    let code = StabilizerCode::new(
        "bitflip3",
        3,
        ops(&["ZZI", "IZZ"])?,
        vec![pair("XXX", "ZZZ")?],
    )?;
    Ok(code.into_shared())
}

/// The Steane [[7,1,3]] code, X-type stabilizers first.
pub fn steane() -> QecResult<Arc<dyn Code>> {
    let code = StabilizerCode::new(
        "steane",
        7,
        ops(&[
            "XXXXIII", "XXIIXXI", "XIXIXIX", "ZZZZIII", "ZZIIZZI", "ZIZIZIZ",
        ])?,
        vec![pair("XXXXXXX", "ZZZZZZZ")?],
    )?;
    Ok(code.into_shared())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_sizes() {
        assert_eq!(trivial().parity_checks().len(), 2);
        assert_eq!(bit_flip().unwrap().parity_checks().len(), 4);
        assert_eq!(steane().unwrap().parity_checks().len(), 8);
    }

    #[test]
    fn test_bit_flip_corrects_single_x() {
        let code = bit_flip().unwrap();
        let e: Pauli = "IXI".parse().unwrap();
        assert_eq!(code.correction(code.syndrome_of(&e)), e);
    }
}
