//! Key propagators.
//!
//! A [`KeyPropagator`] is the noiseless effect of a component on error
//! keys, written as a pipeline of [`KeyOp`] steps. Composing two
//! components appends their pipelines, so a whole sequential circuit is a
//! single propagator applied once per key.
//!
//! Every step works on block positions of a [`Key`]. Positions beyond the
//! ones a step names are carried through untouched, which lets a component
//! act on the leading blocks of a wider key.

use crate::key::Key;
use serde::{Deserialize, Serialize};

fn low_mask(bits: usize) -> u64 {
    if bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 }
}

/// One step of a key propagator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyOp {
    /// `key[to] ^= key[from] & mask`.
    Copy {
        /// Source block.
        from: usize,
        /// Destination block.
        to: usize,
        /// Bits to copy.
        mask: u64,
    },

    /// `key[b] &= mask` for the listed blocks, or all blocks when `None`.
    Mask {
        /// Bits to keep.
        mask: u64,
        /// Blocks to mask.
        blocks: Option<Vec<usize>>,
    },

    /// `out[i] = key[perm[i]]` for `i < perm.len()`.
    Permute(Vec<usize>),

    /// Drop the listed blocks.
    Remove(Vec<usize>),

    /// Insert `count` zero blocks before position `index`.
    Insert {
        /// Insertion position.
        index: usize,
        /// Number of new blocks.
        count: usize,
    },

    /// Rotate blocks left by the given amount (negative rotates right).
    Rotate(isize),

    /// Bit-concatenate the leading `widths.len()` blocks into one, the
    /// first block in the most significant bits.
    Merge {
        /// Bit width of each merged block.
        widths: Vec<usize>,
    },

    /// Inverse of [`KeyOp::Merge`]: split block 0 into `widths.len()` blocks.
    Split {
        /// Bit width of each resulting block.
        widths: Vec<usize>,
    },

    /// Decode one block into logical bits: the stabilizer part selects a
    /// correction whose effect on the logical bits is `table[syndrome]`.
    Decode {
        /// Block to decode.
        block: usize,
        /// Number of logical (normalizer) bits at the bottom of the key.
        logical_bits: usize,
        /// Logical flips of the correction, indexed by stabilizer syndrome.
        table: Vec<u64>,
    },

    /// Replace `x_keys.len()` decoded single-qubit blocks starting at
    /// `start` with one block of an outer code. A decoded key carries a
    /// logical X flip in bit 0 and a logical Z flip in bit 1.
    Lift {
        /// First inner block.
        start: usize,
        /// Outer key of an X error on each qubit.
        x_keys: Vec<u64>,
        /// Outer key of a Z error on each qubit.
        z_keys: Vec<u64>,
    },

    /// Map keys whose leading blocks equal one of `from` to `to`.
    Replace {
        /// Leading-block patterns to replace.
        from: Vec<Key>,
        /// Replacement for the leading blocks.
        to: Key,
    },

    /// Reject keys with any `mask` bit set on the listed blocks.
    Reject {
        /// Blocks to check.
        blocks: Vec<usize>,
        /// Bits that must be zero.
        mask: u64,
    },
}

impl KeyOp {
    fn apply(&self, mut v: Vec<u64>) -> Option<Vec<u64>> {
        match self {
            KeyOp::Copy { from, to, mask } => {
                let src = v.get(*from).copied().unwrap_or(0);
                if let Some(dst) = v.get_mut(*to) {
                    *dst ^= src & mask;
                }
            }
            KeyOp::Mask { mask, blocks } => match blocks {
                Some(blocks) => {
                    for b in blocks {
                        if let Some(x) = v.get_mut(*b) {
                            *x &= mask;
                        }
                    }
                }
                None => v.iter_mut().for_each(|x| *x &= mask),
            },
            KeyOp::Permute(perm) => {
                let head: Vec<u64> = perm.iter().map(|&i| v.get(i).copied().unwrap_or(0)).collect();
                let n = head.len().min(v.len());
                v.splice(..n, head);
            }
            KeyOp::Remove(blocks) => {
                v = v
                    .into_iter()
                    .enumerate()
                    .filter(|(i, _)| !blocks.contains(i))
                    .map(|(_, x)| x)
                    .collect();
            }
            KeyOp::Insert { index, count } => {
                let at = (*index).min(v.len());
                v.splice(at..at, std::iter::repeat_n(0, *count));
            }
            KeyOp::Rotate(by) => {
                if !v.is_empty() {
                    let r = by.rem_euclid(v.len() as isize) as usize;
                    v.rotate_left(r);
                }
            }
            KeyOp::Merge { widths } => {
                let n = widths.len().min(v.len());
                let merged = v[..n]
                    .iter()
                    .zip(widths)
                    .fold(0u64, |acc, (x, w)| acc.checked_shl(*w as u32).unwrap_or(0) | (x & low_mask(*w)));
                if n > 0 {
                    v.splice(..n, [merged]);
                }
            }
            KeyOp::Split { widths } => {
                let mut whole = v.first().copied().unwrap_or(0);
                let mut parts = vec![0u64; widths.len()];
                for (part, w) in parts.iter_mut().zip(widths).rev() {
                    *part = whole & low_mask(*w);
                    whole = whole.checked_shr(*w as u32).unwrap_or(0);
                }
                let n = v.len().min(1);
                v.splice(..n, parts);
            }
            KeyOp::Decode {
                block,
                logical_bits,
                table,
            } => {
                if let Some(x) = v.get_mut(*block) {
                    let logical = *x & low_mask(*logical_bits);
                    let syndrome = x.checked_shr(*logical_bits as u32).unwrap_or(0) as usize;
                    let flip = table.get(syndrome).copied().unwrap_or(0);
                    *x = logical ^ flip;
                }
            }
            KeyOp::Lift {
                start,
                x_keys,
                z_keys,
            } => {
                let n = x_keys.len();
                let end = (start + n).min(v.len());
                let start = (*start).min(end);
                let mut outer = 0u64;
                for (x, (xk, zk)) in v[start..end].iter().zip(x_keys.iter().zip(z_keys)) {
                    if x & 1 == 1 {
                        outer ^= xk;
                    }
                    if x & 2 == 2 {
                        outer ^= zk;
                    }
                }
                if end > start {
                    v.splice(start..end, [outer]);
                }
            }
            KeyOp::Replace { from, to } => {
                let n = to.width().min(v.len());
                if from.iter().any(|f| f.as_slice() == &v[..n]) {
                    v.splice(..n, to.as_slice().iter().copied());
                }
            }
            KeyOp::Reject { blocks, mask } => {
                if blocks.iter().any(|b| v.get(*b).is_some_and(|x| x & mask != 0)) {
                    return None;
                }
            }
        }
        Some(v)
    }

    fn output_width(&self, width: usize) -> usize {
        match self {
            KeyOp::Remove(blocks) => width - blocks.iter().filter(|b| **b < width).count(),
            KeyOp::Insert { count, .. } => width + count,
            KeyOp::Merge { widths } => match widths.len().min(width) {
                0 => width,
                n => width + 1 - n,
            },
            KeyOp::Split { widths } if width > 0 => width - 1 + widths.len(),
            KeyOp::Lift { start, x_keys, .. } => {
                match (start + x_keys.len()).min(width) - (*start).min(width) {
                    0 => width,
                    covered => width + 1 - covered,
                }
            }
            _ => width,
        }
    }

    /// Whether the step commutes with XOR of keys.
    pub fn is_linear(&self) -> bool {
        !matches!(
            self,
            KeyOp::Decode { .. } | KeyOp::Replace { .. } | KeyOp::Reject { .. }
        )
    }
}

/// A pipeline of key operations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct KeyPropagator {
    ops: Vec<KeyOp>,
}

impl KeyPropagator {
    /// The identity propagator.
    pub fn identity() -> Self {
        Self::default()
    }

    /// A propagator of one step.
    pub fn single(op: KeyOp) -> Self {
        Self { ops: vec![op] }
    }

    /// Append a step.
    #[must_use]
    pub fn then(mut self, op: KeyOp) -> Self {
        self.ops.push(op);
        self
    }

    /// Run `self`, then `next`.
    #[must_use]
    pub fn and_then(mut self, next: &KeyPropagator) -> Self {
        self.ops.extend(next.ops.iter().cloned());
        self
    }

    /// Steps in application order.
    pub fn ops(&self) -> &[KeyOp] {
        &self.ops
    }

    /// Whether the propagator leaves keys unchanged.
    pub fn is_identity(&self) -> bool {
        self.ops.is_empty()
    }

    /// Whether the propagator commutes with XOR of keys.
    pub fn is_linear(&self) -> bool {
        self.ops.iter().all(KeyOp::is_linear)
    }

    /// Propagate a key. `None` means the key was rejected.
    pub fn apply(&self, key: &Key) -> Option<Key> {
        let mut v = key.as_slice().to_vec();
        for op in &self.ops {
            v = op.apply(v)?;
        }
        Some(Key::from(v))
    }

    /// Width of the keys produced from keys of `width` blocks.
    pub fn output_width(&self, width: usize) -> usize {
        self.ops.iter().fold(width, |w, op| op.output_width(w))
    }
}

impl From<KeyOp> for KeyPropagator {
    fn from(op: KeyOp) -> Self {
        Self::single(op)
    }
}
