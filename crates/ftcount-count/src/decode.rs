//! Decoder lookup tables.
//!
//! A [`LookupTable`] precomputes, for every syndrome that may arrive on a
//! component's single input block, the counts of the decoded logical
//! errors on its output blocks. Applying the table to input counts then
//! replaces a full component count with one table lookup per input key.
//!
//! Only the key bits that can be set on the counted axis are tabulated:
//! for X errors that is the checks with a Z part, for Z errors the checks
//! with an X part. Other bits are ignored on lookup.

use crate::block::{Block, describe};
use crate::cache::CacheKey;
use crate::component::{Adapter, Component};
use crate::context::CountContext;
use crate::error::{CountError, FtResult};
use crate::key::Key;
use crate::result::{CountResult, Counts, mul_counts};
use ftcount_circuit::{Axis, NoiseModels};
use ftcount_qec::{PauliKind, bits_msb_first};
use rustc_hash::FxHashMap;
use tracing::{debug, info, instrument};

/// Largest number of key bits on the input block.
pub const MAX_LOOKUP_BITS: usize = 20;

/// Decoded output counts per input syndrome.
#[derive(Debug, Clone)]
pub struct LookupTable {
    in_block: Block,
    out_blocks: Vec<Block>,
    mask: u64,
    /// Dense map from full key to an index into `entries`.
    index: Vec<u32>,
    entries: Vec<Counts>,
}

/// Key bits of `block` that errors on `axis` can set.
fn axis_mask(block: &Block, axis: Axis) -> u64 {
    let checks = block.code().parity_checks();
    let sees = |c: &ftcount_qec::Pauli| match axis {
        Axis::X => !c.partial(PauliKind::Z).is_identity(),
        Axis::Z => !c.partial(PauliKind::X).is_identity(),
        Axis::Y => true,
    };
    bits_msb_first(checks.iter().map(sees)) & block.code().key_mask()
}

/// Every submask of `mask`, in increasing order.
fn submasks(mask: u64) -> Vec<u64> {
    let mut out = Vec::with_capacity(1 << mask.count_ones());
    let mut sub = mask;
    loop {
        out.push(sub);
        if sub == 0 {
            break;
        }
        sub = (sub - 1) & mask;
    }
    out.reverse();
    out
}

impl LookupTable {
    /// Build the table of `component` for `axis`, counting up to `k_max`
    /// faults inside the component.
    #[instrument(skip(ctx, component, noise), fields(component = component.name()))]
    pub fn build(
        ctx: &CountContext,
        component: &Component,
        noise: &NoiseModels,
        axis: Axis,
        k_max: usize,
    ) -> FtResult<Self> {
        let [in_block] = component.in_blocks() else {
            return Err(CountError::config(
                component.name(),
                "build lookup table",
                format!("expected one input block, got [{}]", describe(component.in_blocks())),
            ));
        };
        let bits = in_block.key_bits();
        if bits == 0 || bits > MAX_LOOKUP_BITS {
            return Err(CountError::unsupported(
                component.name(),
                format!("lookup over {bits} key bits (supported: 1 to {MAX_LOOKUP_BITS})"),
            ));
        }
        let decoder = Adapter::ideal_decode(component.out_blocks().to_vec())?;
        let mask = axis_mask(in_block, axis);
        let syndromes = submasks(mask);

        let key = CacheKey::builder("decode_lookup_table")
            .arg(component.id())?
            .arg(&noise.descriptor(axis)?)?
            .arg(&axis)?
            .arg(&k_max)?
            .finish();
        let entries: Vec<Counts> = ctx.cache().get_or_compute(&key, || {
            info!(
                component = %component,
                %axis,
                syndromes = syndromes.len(),
                "Building lookup table"
            );
            ctx.pool().try_map(syndromes.clone(), |s| {
                let input = CountResult::single(vec![in_block.clone()], Key::from([s]))?;
                let counted = component.count(ctx, noise, axis, Some(&input), Some(k_max))?;
                Ok(Component::from(decoder.clone())
                    .count(ctx, noise, axis, Some(&counted), None)?
                    .into_counts())
            })
        })?;

        let width = decoder.out_blocks().len();
        if entries.len() != syndromes.len() {
            return Err(CountError::CacheInconsistency {
                key: key.to_string(),
                reason: format!("{} entries for {} syndromes", entries.len(), syndromes.len()),
            });
        }
        if let Some(bad) = entries.iter().find(|e| e.width() != width) {
            return Err(CountError::CacheInconsistency {
                key: key.to_string(),
                reason: format!("entry width {} does not match {width} output blocks", bad.width()),
            });
        }

        let position: FxHashMap<u64, u32> = syndromes
            .iter()
            .enumerate()
            .map(|(i, s)| (*s, i as u32))
            .collect();
        let index = (0..1u64 << bits)
            .map(|s| position.get(&(s & mask)).copied().unwrap_or(0))
            .collect();
        debug!(entries = entries.len(), bits, "Lookup table ready");
        Ok(Self {
            in_block: in_block.clone(),
            out_blocks: decoder.out_blocks().to_vec(),
            mask,
            index,
            entries,
        })
    }

    /// The input block.
    pub fn in_block(&self) -> &Block {
        &self.in_block
    }

    /// Decoded output blocks.
    pub fn out_blocks(&self) -> &[Block] {
        &self.out_blocks
    }

    /// Key bits that select an entry.
    pub fn mask(&self) -> u64 {
        self.mask
    }

    /// Number of syndromes covered, one per possible input key.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the table is empty. Built tables never are.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Distinct entries, one per syndrome under [`mask`](Self::mask), in
    /// increasing syndrome order.
    pub fn entries(&self) -> &[Counts] {
        &self.entries
    }

    /// Decoded counts for input key `syndrome`.
    pub fn entry(&self, syndrome: u64) -> &Counts {
        let i = self
            .index
            .get(syndrome as usize)
            .or_else(|| self.index.get((syndrome & self.mask) as usize))
            .copied()
            .unwrap_or(0);
        &self.entries[i as usize]
    }

    /// Replace a component count with table lookups.
    ///
    /// Input keys select entries by their first block; trailing blocks are
    /// appended to every entry key. Input rejected at order `k` combines
    /// with the total of the error-free entry.
    pub fn apply(&self, input: &CountResult, k_max: Option<usize>) -> FtResult<CountResult> {
        const OP: &str = "apply lookup table";
        let Some(first) = input.blocks().first().filter(|b| **b == self.in_block) else {
            return Err(CountError::BlockMismatch {
                component: "lookup table".into(),
                operation: "apply",
                expected: self.in_block.to_string(),
                got: describe(input.blocks()),
            });
        };
        let mut blocks = self.out_blocks.clone();
        blocks.extend(input.blocks().iter().skip(1).cloned());
        debug!(input = %first, "Applying lookup table");

        let counts = input.counts();
        let fits = |k: usize| k_max.is_none_or(|m| k <= m);
        let mut out = Counts::empty(blocks.len());
        for (k1, level) in counts.levels().iter().enumerate() {
            if !fits(k1) {
                break;
            }
            out.ensure_level(k1);
            for (key, count) in level {
                let entry = self.entry(key.get(0));
                let tail = Key::from(key.as_slice().get(1..).unwrap_or(&[]));
                for (k2, entry_level) in entry.levels().iter().enumerate() {
                    if !fits(k1 + k2) {
                        break;
                    }
                    for (decoded, c) in entry_level {
                        out.add(k1 + k2, decoded.concat(&tail), mul_counts(*count, *c, OP)?);
                    }
                    let rejected = entry.rejected()[k2];
                    if rejected > 0 {
                        out.add_rejected(k1 + k2, mul_counts(*count, rejected, OP)?);
                    }
                }
            }
            let rejected = counts.rejected()[k1];
            if rejected > 0 {
                let clean = self.entry(0);
                for k2 in 0..clean.num_levels() {
                    if fits(k1 + k2) {
                        out.add_rejected(k1 + k2, mul_counts(rejected, clean.total(k2), OP)?);
                    }
                }
            }
        }
        CountResult::new(blocks, out)
    }
}
