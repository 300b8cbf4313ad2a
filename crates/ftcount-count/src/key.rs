//! Syndrome keys.
//!
//! A [`Key`] holds one integer per block. Each integer packs the parity
//! check bits of that block's error (first check at the most significant
//! bit). Because a key is linear in the error, keys of composed errors are
//! the XOR of the individual keys.

use crate::block::Block;
use ftcount_qec::{Code, Pauli};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-block syndrome key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Key(Vec<u64>);

impl Key {
    /// The all-zero key over `width` blocks.
    pub fn zeros(width: usize) -> Self {
        Key(vec![0; width])
    }

    /// Number of blocks.
    pub fn width(&self) -> usize {
        self.0.len()
    }

    /// Value for block `i`, or zero beyond the key's width.
    pub fn get(&self, i: usize) -> u64 {
        self.0.get(i).copied().unwrap_or(0)
    }

    /// Per-block values.
    pub fn as_slice(&self) -> &[u64] {
        &self.0
    }

    /// Mutable per-block values.
    pub fn as_mut_slice(&mut self) -> &mut [u64] {
        &mut self.0
    }

    /// Consume into the per-block values.
    pub fn into_vec(self) -> Vec<u64> {
        self.0
    }

    /// Whether every block is zero.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|v| *v == 0)
    }

    /// Positional XOR. The shorter key is zero-extended.
    #[must_use]
    pub fn xor(&self, other: &Key) -> Key {
        let (long, short) = if self.width() >= other.width() {
            (self, other)
        } else {
            (other, self)
        };
        let mut out = long.0.clone();
        for (o, s) in out.iter_mut().zip(&short.0) {
            *o ^= s;
        }
        Key(out)
    }

    /// Concatenation of the two keys' blocks.
    #[must_use]
    pub fn concat(&self, other: &Key) -> Key {
        let mut out = self.0.clone();
        out.extend_from_slice(&other.0);
        Key(out)
    }
}

impl From<Vec<u64>> for Key {
    fn from(v: Vec<u64>) -> Self {
        Key(v)
    }
}

impl From<&[u64]> for Key {
    fn from(v: &[u64]) -> Self {
        Key(v.to_vec())
    }
}

impl<const N: usize> From<[u64; N]> for Key {
    fn from(v: [u64; N]) -> Self {
        Key(v.to_vec())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{v}")?;
        }
        if self.0.len() == 1 {
            write!(f, ",")?;
        }
        write!(f, ")")
    }
}

/// Precomputed key contributions of single-qubit X and Z errors on a block.
#[derive(Debug, Clone)]
pub struct KeyGenerator {
    x_keys: Vec<u64>,
    z_keys: Vec<u64>,
}

impl KeyGenerator {
    /// Generator for a block's code.
    pub fn for_block(block: &Block) -> Self {
        Self::for_code(block.code().as_ref())
    }

    /// Generator for a code.
    pub fn for_code(code: &dyn Code) -> Self {
        let n = code.block_length();
        let mut x_keys = Vec::with_capacity(n);
        let mut z_keys = Vec::with_capacity(n);
        for q in 0..n {
            let bit = 1u64 << q;
            // n <= 64 is guaranteed by the code itself
            x_keys.push(code.key_of(&pauli_bits(n, bit, 0)));
            z_keys.push(code.key_of(&pauli_bits(n, 0, bit)));
        }
        Self { x_keys, z_keys }
    }

    /// Key of an X error on each qubit.
    pub fn x_keys(&self) -> &[u64] {
        &self.x_keys
    }

    /// Key of a Z error on each qubit.
    pub fn z_keys(&self) -> &[u64] {
        &self.z_keys
    }

    /// Key of an error on the block.
    pub fn key_of(&self, error: &Pauli) -> u64 {
        self.key_of_bits(error.x_bits(), error.z_bits())
    }

    /// Key of the error with X part `x` and Z part `z` (qubit 0 in bit 0).
    pub fn key_of_bits(&self, mut x: u64, mut z: u64) -> u64 {
        let mut key = 0;
        while x != 0 {
            let q = x.trailing_zeros() as usize;
            key ^= self.x_keys.get(q).copied().unwrap_or(0);
            x &= x - 1;
        }
        while z != 0 {
            let q = z.trailing_zeros() as usize;
            key ^= self.z_keys.get(q).copied().unwrap_or(0);
            z &= z - 1;
        }
        key
    }
}

fn pauli_bits(n: usize, x: u64, z: u64) -> Pauli {
    Pauli::from_bits(n, x, z).unwrap_or_else(|_| Pauli::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ftcount_qec::catalog;

    #[test]
    fn test_xor_extends_shorter() {
        let a = Key::from([1, 2, 3]);
        let b = Key::from([1]);
        assert_eq!(a.xor(&b), Key::from([0, 2, 3]));
        assert_eq!(b.xor(&a), Key::from([0, 2, 3]));
    }

    #[test]
    fn test_concat_and_display() {
        let k = Key::from([0]).concat(&Key::from([5]));
        assert_eq!(k, Key::from([0, 5]));
        assert_eq!(k.to_string(), "(0, 5)");
        assert_eq!(Key::from([3]).to_string(), "(3,)");
    }

    #[test]
    fn test_generator_matches_code() {
        let code = catalog::steane().unwrap();
        let generator = KeyGenerator::for_code(code.as_ref());
        for s in ["XIIIIII", "IIZIIIY", "XXXXXXX", "ZZIIIIZ"] {
            let e: Pauli = s.parse().unwrap();
            assert_eq!(generator.key_of(&e), code.key_of(&e), "{s}");
        }
    }
}
