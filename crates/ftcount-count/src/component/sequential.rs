//! Sub-components in time order.

use super::{Component, KGood, cached_counts, component_id, k_limit, sub_ids};
use crate::block::{Block, describe};
use crate::context::CountContext;
use crate::error::{CountError, FtResult};
use crate::propagator::KeyPropagator;
use crate::result::{CountResult, Counts};
use ftcount_circuit::{Axis, NoiseModels};
use tracing::debug;

/// Sub-components run one after another; each consumes the previous one's
/// output blocks.
#[derive(Debug, Clone)]
pub struct Sequential {
    name: String,
    k_good: KGood,
    subs: Vec<Component>,
    propagator: KeyPropagator,
    id: String,
}

impl Sequential {
    /// Chain `subs`. The output blocks of each must equal the input blocks
    /// of the next.
    pub fn new(name: impl Into<String>, k_good: KGood, subs: Vec<Component>) -> FtResult<Self> {
        let name = name.into();
        if subs.is_empty() {
            return Err(CountError::config(name, "build sequential", "no sub-components"));
        }
        for pair in subs.windows(2) {
            if pair[0].out_blocks() != pair[1].in_blocks() {
                return Err(CountError::BlockMismatch {
                    component: name,
                    operation: "chain sub-components",
                    expected: describe(pair[0].out_blocks()),
                    got: describe(pair[1].in_blocks()),
                });
            }
        }
        let propagator = subs
            .iter()
            .fold(KeyPropagator::identity(), |acc, s| acc.and_then(s.key_propagator()));
        let id = component_id(&format!("sequential:{name}:{k_good:?}:{}", sub_ids(&subs)));
        Ok(Self {
            name,
            k_good,
            subs,
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

    /// Sub-components in time order.
    pub fn subcomponents(&self) -> &[Component] {
        &self.subs
    }

    /// Input blocks of the first sub-component.
    pub fn in_blocks(&self) -> &[Block] {
        self.subs.first().map_or(&[], Component::in_blocks)
    }

    /// Output blocks of the last sub-component.
    pub fn out_blocks(&self) -> &[Block] {
        self.subs.last().map_or(&[], Component::out_blocks)
    }

    /// The sub-components' propagators, in order.
    pub fn key_propagator(&self) -> &KeyPropagator {
        &self.propagator
    }

    /// Run `input` through every sub-component with cutoff `budget`.
    fn thread(
        &self,
        ctx: &CountContext,
        noise: &NoiseModels,
        axis: Axis,
        input: Option<CountResult>,
        budget: usize,
    ) -> FtResult<CountResult> {
        let mut current = input;
        for sub in &self.subs {
            current = Some(sub.count(ctx, noise, axis, current.as_ref(), Some(budget))?);
        }
        // subs is never empty
        current.ok_or_else(|| CountError::config(self.name.as_str(), "count", "no sub-components"))
    }

    /// Count with the input split by fault order.
    ///
    /// Input faults of order `k` leave a budget of `k_limit - k` for the
    /// sub-components, capped at the component's own cutoff; the results
    /// are shifted back up by `k` and summed.
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
            let k_lim = k_limit(k_good, 0, k_max);
            let counts = cached_counts(ctx, "component_counts", &self.id, noise, axis, Some(k_lim), || {
                Ok(self.thread(ctx, noise, axis, None, k_lim)?.into_counts())
            })?;
            return CountResult::new(self.out_blocks().to_vec(), counts);
        };

        let k_in = input.k_max();
        let k_lim = k_limit(k_good, k_in, k_max);
        let mut blocks = self.out_blocks().to_vec();
        blocks.extend(input.blocks().iter().skip(self.in_blocks().len()).cloned());
        let mut total = Counts::empty(blocks.len());

        for k in 0..=k_lim.min(k_in) {
            let slice = order_slice(input.counts(), k)?;
            if slice.total(0) == 0 {
                continue;
            }
            let budget = k_good.min(k_lim - k);
            debug!(sequential = %self.name, order = k, budget, "Threading input order");
            let sliced = CountResult::new(input.blocks().to_vec(), slice)?;
            let result = self.thread(ctx, noise, axis, Some(sliced), budget)?;
            total.merge(&result.into_counts().shifted(k))?;
        }
        CountResult::new(blocks, total)
    }
}

/// Level `k` of `counts` as an order-zero table.
fn order_slice(counts: &Counts, k: usize) -> FtResult<Counts> {
    let level = counts.level(k).cloned().unwrap_or_default();
    let mut out = Counts::from_levels(counts.width(), vec![level])?;
    let rejected = counts.rejected().get(k).copied().unwrap_or(0);
    if rejected > 0 {
        out.add_rejected(0, rejected);
    }
    Ok(out)
}
