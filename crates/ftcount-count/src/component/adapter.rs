//! Noiseless adapters.
//!
//! Adapters rearrange, relabel or filter blocks without adding faults.
//! Their counts are their input pushed through the propagator.

use super::component_id;
use crate::block::Block;
use crate::error::{CountError, FtResult};
use crate::key::{Key, KeyGenerator};
use crate::propagator::{KeyOp, KeyPropagator};
use crate::result::{CountResult, Counts, Level};
use ftcount_qec::{bits_msb_first, catalog};

/// Largest stabilizer count for which an ideal decoder table is built.
pub const MAX_DECODE_STABILIZERS: usize = 20;

/// What an adapter does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterKind {
    /// Reorder blocks.
    Permute(Vec<usize>),
    /// Drop blocks.
    Discard(Vec<usize>),
    /// Add error-free blocks at a position.
    Insert {
        /// Insertion position.
        index: usize,
        /// Number of inserted blocks.
        count: usize,
    },
    /// Fuse blocks into one.
    Merge,
    /// Split one block into several.
    Split,
    /// Worst case over equivalent blocks.
    Combine,
    /// Decode every block to its logical error.
    IdealDecode,
    /// Treat listed logical keys as error free.
    LogicalFilter,
    /// Reject keys with a nonzero syndrome.
    Postselect,
    /// Pauli frame update after teleportation.
    TeleportCorrect,
}

/// A noiseless block adapter.
#[derive(Debug, Clone)]
pub struct Adapter {
    name: String,
    kind: AdapterKind,
    in_blocks: Vec<Block>,
    out_blocks: Vec<Block>,
    propagator: KeyPropagator,
    id: String,
}

impl Adapter {
    fn build(
        name: &str,
        kind: AdapterKind,
        in_blocks: Vec<Block>,
        out_blocks: Vec<Block>,
        propagator: KeyPropagator,
    ) -> Self {
        let descriptor = format!(
            "adapter:{name}:{kind:?}:[{}]:[{}]:{:?}",
            in_blocks.iter().map(Block::descriptor).collect::<Vec<_>>().join(","),
            out_blocks.iter().map(Block::descriptor).collect::<Vec<_>>().join(","),
            propagator.ops(),
        );
        Self {
            name: name.to_string(),
            kind,
            in_blocks,
            out_blocks,
            propagator,
            id: component_id(&descriptor),
        }
    }

    /// Output block `i` is input block `perm[i]`.
    pub fn permute(blocks: Vec<Block>, perm: Vec<usize>) -> FtResult<Self> {
        let mut seen = vec![false; blocks.len()];
        for &p in &perm {
            match seen.get_mut(p) {
                Some(s) if !*s => *s = true,
                _ => {
                    return Err(CountError::config(
                        "permute",
                        "build adapter",
                        format!("{perm:?} is not a permutation of {} blocks", blocks.len()),
                    ));
                }
            }
        }
        if perm.len() != blocks.len() {
            return Err(CountError::config(
                "permute",
                "build adapter",
                format!("{perm:?} is not a permutation of {} blocks", blocks.len()),
            ));
        }
        let out = perm.iter().map(|&p| blocks[p].clone()).collect();
        Ok(Self::build(
            "permute",
            AdapterKind::Permute(perm.clone()),
            blocks,
            out,
            KeyPropagator::single(KeyOp::Permute(perm)),
        ))
    }

    /// Drop the blocks at `indices`.
    pub fn discard(blocks: Vec<Block>, indices: Vec<usize>) -> FtResult<Self> {
        if let Some(bad) = indices.iter().find(|&&i| i >= blocks.len()) {
            return Err(CountError::config(
                "discard",
                "build adapter",
                format!("block index {bad} out of range for {} blocks", blocks.len()),
            ));
        }
        let out = blocks
            .iter()
            .enumerate()
            .filter(|(i, _)| !indices.contains(i))
            .map(|(_, b)| b.clone())
            .collect();
        Ok(Self::build(
            "discard",
            AdapterKind::Discard(indices.clone()),
            blocks,
            out,
            KeyPropagator::single(KeyOp::Remove(indices)),
        ))
    }

    /// Insert error-free `inserted` blocks before position `index`.
    pub fn insert(blocks: Vec<Block>, index: usize, inserted: Vec<Block>) -> FtResult<Self> {
        if index > blocks.len() {
            return Err(CountError::config(
                "insert",
                "build adapter",
                format!("position {index} out of range for {} blocks", blocks.len()),
            ));
        }
        let count = inserted.len();
        let mut out = blocks.clone();
        out.splice(index..index, inserted);
        Ok(Self::build(
            "insert",
            AdapterKind::Insert { index, count },
            blocks,
            out,
            KeyPropagator::single(KeyOp::Insert { index, count }),
        ))
    }

    /// Fuse `blocks` into the single block `out`, whose key bits are the
    /// concatenation of theirs.
    pub fn merge(blocks: Vec<Block>, out: Block) -> FtResult<Self> {
        let widths: Vec<usize> = blocks.iter().map(Block::key_bits).collect();
        let total: usize = widths.iter().sum();
        if total != out.key_bits() || total > 64 {
            return Err(CountError::config(
                "merge",
                "build adapter",
                format!("{total} key bits cannot be merged into {}", out),
            ));
        }
        Ok(Self::build(
            "merge",
            AdapterKind::Merge,
            blocks,
            vec![out],
            KeyPropagator::single(KeyOp::Merge { widths }),
        ))
    }

    /// Split `block` into `outs`, the first taking the most significant
    /// key bits.
    pub fn split(block: Block, outs: Vec<Block>) -> FtResult<Self> {
        let widths: Vec<usize> = outs.iter().map(Block::key_bits).collect();
        let total: usize = widths.iter().sum();
        if total != block.key_bits() {
            return Err(CountError::config(
                "split",
                "build adapter",
                format!("{} does not split into {total} key bits", block),
            ));
        }
        Ok(Self::build(
            "split",
            AdapterKind::Split,
            vec![block],
            outs,
            KeyPropagator::single(KeyOp::Split { widths }),
        ))
    }

    /// Keep the worst case over interchangeable blocks.
    ///
    /// The output is the first block; its counts are, per order and key,
    /// the largest marginal over all input blocks. This bounds rather than
    /// conserves the total multiplicity.
    pub fn combine(blocks: Vec<Block>) -> FtResult<Self> {
        let Some(first) = blocks.first() else {
            return Err(CountError::config("combine", "build adapter", "no blocks"));
        };
        if let Some(other) = blocks.iter().find(|b| b.key_bits() != first.key_bits()) {
            return Err(CountError::config(
                "combine",
                "build adapter",
                format!("{first} and {other} have different key bits"),
            ));
        }
        let out = vec![first.clone()];
        let propagator = KeyPropagator::single(KeyOp::Remove((1..blocks.len()).collect()));
        Ok(Self::build("combine", AdapterKind::Combine, blocks, out, propagator))
    }

    /// Ideal decoding of every block into the logical error left after
    /// the code's canonical correction.
    pub fn ideal_decode(blocks: Vec<Block>) -> FtResult<Self> {
        let mut propagator = KeyPropagator::identity();
        for (i, block) in blocks.iter().enumerate() {
            propagator = propagator.then(ideal_decode_op(i, block)?);
        }
        let out = blocks
            .iter()
            .map(|b| Block::new(b.name(), catalog::trivial()))
            .collect();
        Ok(Self::build("idealDecode", AdapterKind::IdealDecode, blocks, out, propagator))
    }

    /// Map every key whose leading blocks equal one of `keys` to zero.
    pub fn logical_filter(blocks: Vec<Block>, keys: Vec<Key>) -> FtResult<Self> {
        let width = keys.first().map_or(0, Key::width);
        if width > blocks.len() || keys.iter().any(|k| k.width() != width) {
            return Err(CountError::config(
                "logicalFilter",
                "build adapter",
                format!("filter keys must share a width of at most {}", blocks.len()),
            ));
        }
        let propagator = KeyPropagator::single(KeyOp::Replace {
            from: keys,
            to: Key::zeros(width),
        });
        Ok(Self::build(
            "logicalFilter",
            AdapterKind::LogicalFilter,
            blocks.clone(),
            blocks,
            propagator,
        ))
    }

    /// Reject keys with any `mask` bit set on the listed blocks.
    pub fn postselect(blocks: Vec<Block>, on: Vec<usize>, mask: u64) -> FtResult<Self> {
        if let Some(bad) = on.iter().find(|&&i| i >= blocks.len()) {
            return Err(CountError::config(
                "postselect",
                "build adapter",
                format!("block index {bad} out of range for {} blocks", blocks.len()),
            ));
        }
        let propagator = KeyPropagator::single(KeyOp::Reject { blocks: on, mask });
        Ok(Self::build(
            "postselect",
            AdapterKind::Postselect,
            blocks.clone(),
            blocks,
            propagator,
        ))
    }

    /// Reject keys with a nonzero stabilizer syndrome on the listed blocks.
    ///
    /// The listed blocks must share their stabilizer and logical counts.
    pub fn postselect_syndromes(blocks: Vec<Block>, on: Vec<usize>) -> FtResult<Self> {
        let shapes: Vec<(usize, usize)> = on
            .iter()
            .filter_map(|&i| blocks.get(i))
            .map(|b| {
                let code = b.underlying();
                (code.code().stabilizers().len(), code.code().logical_operators().len())
            })
            .collect();
        let Some(&(stabs, logicals)) = shapes.first() else {
            return Err(CountError::config("postselect", "build adapter", "no blocks selected"));
        };
        if shapes.iter().any(|s| *s != (stabs, logicals)) {
            return Err(CountError::config(
                "postselect",
                "build adapter",
                "selected blocks have different check layouts",
            ));
        }
        let mask = low_bits(stabs).checked_shl(2 * logicals as u32).unwrap_or(0);
        Self::postselect(blocks, on, mask)
    }

    /// Frame update after teleportation: blocks `[mx, mz, data]`, where a
    /// flipped X-basis outcome on `mx` becomes a logical Z error on `data`
    /// and a flipped Z-basis outcome on `mz` becomes a logical X error.
    pub fn teleport_correct(blocks: Vec<Block>) -> FtResult<Self> {
        if blocks.len() != 3 {
            return Err(CountError::config(
                "teleportCorrect",
                "build adapter",
                format!("expected 3 blocks, got {}", blocks.len()),
            ));
        }
        let mut masks = Vec::with_capacity(3);
        for block in &blocks {
            let code = block.underlying();
            if code.code().logical_operators().len() != 1 {
                return Err(CountError::unsupported(
                    "teleportCorrect",
                    format!("{block} does not encode exactly one qubit"),
                ));
            }
            let n = code.code().stabilizers().len();
            // checks end with [X_L, Z_L]
            let x_l = bits_msb_first((0..n + 2).map(|i| i == n));
            let z_l = bits_msb_first((0..n + 2).map(|i| i == n + 1));
            masks.push((x_l, z_l));
        }
        let (data_x, data_z) = masks[2];
        if masks[0].0 != data_x || masks[1].1 != data_z {
            return Err(CountError::unsupported(
                "teleportCorrect",
                "measured blocks and data block have different logical bits",
            ));
        }
        let propagator = KeyPropagator::identity()
            .then(KeyOp::Copy {
                from: 0,
                to: 2,
                mask: data_x,
            })
            .then(KeyOp::Copy {
                from: 1,
                to: 2,
                mask: data_z,
            });
        Ok(Self::build(
            "teleportCorrect",
            AdapterKind::TeleportCorrect,
            blocks.clone(),
            blocks,
            propagator,
        ))
    }

    /// Adapter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adapter kind.
    pub fn kind(&self) -> &AdapterKind {
        &self.kind
    }

    /// Content address.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Input blocks.
    pub fn in_blocks(&self) -> &[Block] {
        &self.in_blocks
    }

    /// Output blocks.
    pub fn out_blocks(&self) -> &[Block] {
        &self.out_blocks
    }

    /// Noiseless effect on keys.
    pub fn key_propagator(&self) -> &KeyPropagator {
        &self.propagator
    }

    pub(crate) fn count(&self, input: Option<&CountResult>, k_max: Option<usize>) -> FtResult<CountResult> {
        let trivial;
        let input = match input {
            Some(input) => input,
            None => {
                trivial = CountResult::trivial(self.in_blocks.clone());
                &trivial
            }
        };
        let mut result = if self.kind == AdapterKind::Combine {
            let counts = combine_marginals(input.counts(), self.in_blocks.len());
            let mut blocks = self.out_blocks.clone();
            blocks.extend(input.blocks().iter().skip(self.in_blocks.len()).cloned());
            CountResult::new(blocks, counts)?
        } else {
            input.propagate(&self.propagator, self.in_blocks.len(), &self.out_blocks)?
        };
        if let Some(k) = k_max {
            let (blocks, mut counts) = (result.blocks().to_vec(), result.into_counts());
            counts.truncate(k);
            result = CountResult::from_parts(blocks, counts);
        }
        Ok(result)
    }
}

fn low_bits(n: usize) -> u64 {
    if n >= 64 { u64::MAX } else { (1u64 << n) - 1 }
}

/// Per order and key, the largest marginal over the leading `n` blocks.
/// Trailing blocks beyond `n` stay attached to every marginal.
fn combine_marginals(counts: &Counts, n: usize) -> Counts {
    let width = counts.width().saturating_sub(n) + 1;
    let mut out = Counts::empty(width);
    for (k, level) in counts.levels().iter().enumerate() {
        out.ensure_level(k);
        let mut best = Level::default();
        for i in 0..n {
            let mut marginal = Level::default();
            for (key, count) in level {
                let mut v = Vec::with_capacity(width);
                v.push(key.get(i));
                v.extend_from_slice(key.as_slice().get(n..).unwrap_or(&[]));
                *marginal.entry(Key::from(v)).or_insert(0) += count;
            }
            for (key, count) in marginal {
                let slot = best.entry(key).or_insert(0);
                *slot = (*slot).max(count);
            }
        }
        for (key, count) in best {
            out.add(k, key, count);
        }
        let rejected = counts.rejected().get(k).copied().unwrap_or(0);
        if rejected > 0 {
            out.add_rejected(k, rejected);
        }
    }
    out
}

/// Decode step for block `index`: the stabilizer syndrome selects the
/// underlying code's canonical correction, whose logical effect is XORed
/// into the logical bits.
pub(crate) fn ideal_decode_op(index: usize, block: &Block) -> FtResult<KeyOp> {
    let base = block.underlying();
    let code = base.code();
    if code.logical_operators().len() != 1 {
        return Err(CountError::unsupported(
            "idealDecode",
            format!("{block} does not encode exactly one qubit"),
        ));
    }
    let stabs = code.stabilizers().len();
    if stabs > MAX_DECODE_STABILIZERS {
        return Err(CountError::unsupported(
            "idealDecode",
            format!("{stabs} stabilizers exceed the decoder limit of {MAX_DECODE_STABILIZERS}"),
        ));
    }
    let generator = KeyGenerator::for_code(code.as_ref());
    let table = (0..1u64 << stabs)
        .map(|s| generator.key_of(&code.correction(s)) & 0b11)
        .collect();
    Ok(KeyOp::Decode {
        block: index,
        logical_bits: 2,
        table,
    })
}
