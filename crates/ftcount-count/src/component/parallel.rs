//! Sub-components side by side.

use super::{Component, KGood, cached_counts, component_id, k_limit, sub_ids};
use crate::block::Block;
use crate::context::CountContext;
use crate::convolve::{Combine, convolve_all};
use crate::error::{CountError, FtResult};
use crate::propagator::{KeyOp, KeyPropagator};
use crate::result::CountResult;
use ftcount_circuit::{Axis, NoiseModels};
use tracing::debug;

/// Sub-components acting on disjoint blocks at the same time.
///
/// Blocks are the concatenation of the sub-components' blocks, in order.
#[derive(Debug, Clone)]
pub struct Parallel {
    name: String,
    k_good: KGood,
    subs: Vec<Component>,
    in_blocks: Vec<Block>,
    out_blocks: Vec<Block>,
    propagator: KeyPropagator,
    id: String,
}

impl Parallel {
    /// Place `subs` side by side.
    pub fn new(name: impl Into<String>, k_good: KGood, subs: Vec<Component>) -> FtResult<Self> {
        let name = name.into();
        if subs.is_empty() {
            return Err(CountError::config(name, "build parallel", "no sub-components"));
        }
        let in_blocks: Vec<Block> = subs.iter().flat_map(|s| s.in_blocks().iter().cloned()).collect();
        let out_blocks: Vec<Block> = subs.iter().flat_map(|s| s.out_blocks().iter().cloned()).collect();

        // each sub acts on the leading blocks, then its output rotates to the back
        let mut propagator = KeyPropagator::identity();
        for sub in &subs {
            propagator = propagator
                .and_then(sub.key_propagator())
                .then(KeyOp::Rotate(sub.out_blocks().len() as isize));
        }
        propagator = propagator.then(KeyOp::Rotate(-(out_blocks.len() as isize)));

        let id = component_id(&format!("parallel:{name}:{k_good:?}:{}", sub_ids(&subs)));
        Ok(Self {
            name,
            k_good,
            subs,
            in_blocks,
            out_blocks,
            propagator,
            id,
        })
    }

    /// Component name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Content address.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Per-axis cutoffs.
    pub fn k_good(&self) -> KGood {
        self.k_good
    }

    /// Sub-components in block order.
    pub fn subcomponents(&self) -> &[Component] {
        &self.subs
    }

    /// Concatenated input blocks.
    pub fn in_blocks(&self) -> &[Block] {
        &self.in_blocks
    }

    /// Concatenated output blocks.
    pub fn out_blocks(&self) -> &[Block] {
        &self.out_blocks
    }

    /// Noiseless effect on keys.
    pub fn key_propagator(&self) -> &KeyPropagator {
        &self.propagator
    }

    pub(crate) fn count(
        &self,
        ctx: &CountContext,
        noise: &NoiseModels,
        axis: Axis,
        input: Option<&CountResult>,
        k_max: Option<usize>,
    ) -> FtResult<CountResult> {
        let k_good = self.k_good.get(axis);
        let Some(input) = input else {
            let k = k_limit(k_good, 0, k_max);
            let counts = cached_counts(ctx, "component_counts", &self.id, noise, axis, Some(k), || {
                // sub-components are independent until their tables are joined
                let subs: Vec<&Component> = self.subs.iter().collect();
                let tables = ctx.pool().try_map(subs, |sub| {
                    Ok(sub.count(ctx, noise, axis, None, Some(k))?.into_counts())
                })?;
                debug!(parallel = %self.name, parts = tables.len(), "Joining parallel tables");
                convolve_all(ctx.pool(), &tables, Some(k), Combine::Concat)
            })?;
            return CountResult::new(self.out_blocks.clone(), counts);
        };

        let k = k_limit(k_good, input.k_max(), k_max);
        let mut current = input.clone();
        for sub in &self.subs {
            current = sub
                .count(ctx, noise, axis, Some(&current), Some(k))?
                .rotated(sub.out_blocks().len() as isize);
        }
        Ok(current.rotated(-(self.out_blocks.len() as isize)))
    }
}
