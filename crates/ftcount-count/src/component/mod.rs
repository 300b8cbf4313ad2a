//! Countable components.
//!
//! A [`Component`] is a piece of a fault-tolerant circuit with declared input
//! and output blocks. Counting a component yields, for every fault order up
//! to a cutoff, the multiplicity of every output key. Components compose:
//!
//! - [`Leaf`]: physical locations counted directly.
//! - [`Sequential`]: sub-components in time order.
//! - [`Parallel`]: sub-components side by side on disjoint blocks.
//! - [`Concatenated`]: an inner level decoded into the blocks of an outer
//!   level.
//! - [`Adapter`]: noiseless block bookkeeping (permute, discard, decode, ...).
//!
//! Every component also exposes its noiseless [`KeyPropagator`], used to
//! push input counts through it, and its location tally.
//!
//! When a count receives input counts with more blocks than the component
//! declares, the extra trailing blocks are carried through unchanged.

mod adapter;
mod concatenated;
mod leaf;
mod parallel;
mod sequential;

pub use adapter::{Adapter, AdapterKind};
pub use concatenated::Concatenated;
pub use leaf::{Leaf, LeafKind};
pub use parallel::Parallel;
pub use sequential::Sequential;

pub(crate) use adapter::ideal_decode_op;

use crate::block::{Block, describe, starts_with};
use crate::cache::{CacheKey, digest};
use crate::context::CountContext;
use crate::error::{CountError, FtResult};
use crate::propagator::KeyPropagator;
use crate::result::{CountResult, Counts};
use ftcount_circuit::{Axis, NoiseModels, Tally};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::instrument;

/// Largest fault order counted inside a component, per axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct KGood {
    /// Cutoff for X errors.
    pub x: usize,
    /// Cutoff for Z errors.
    pub z: usize,
    /// Cutoff for X and Z errors counted together.
    pub y: usize,
}

impl KGood {
    /// Per-axis cutoffs.
    pub fn new(x: usize, z: usize, y: usize) -> Self {
        Self { x, z, y }
    }

    /// The same cutoff on every axis.
    pub fn uniform(k: usize) -> Self {
        Self::new(k, k, k)
    }

    /// Cutoff for `axis`.
    pub fn get(&self, axis: Axis) -> usize {
        match axis {
            Axis::X => self.x,
            Axis::Z => self.z,
            Axis::Y => self.y,
        }
    }
}

impl fmt::Display for KGood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "kGood(X={}, Z={}, Y={})", self.x, self.z, self.y)
    }
}

/// A composable, countable circuit piece.
#[derive(Debug, Clone)]
pub enum Component {
    /// Physical locations.
    Leaf(Leaf),
    /// Sub-components in time order.
    Sequential(Sequential),
    /// Sub-components on disjoint blocks.
    Parallel(Parallel),
    /// Inner level decoded into an outer level.
    Concatenated(Concatenated),
    /// Noiseless block bookkeeping.
    Adapter(Adapter),
}

impl Component {
    /// Human-readable name.
    pub fn name(&self) -> &str {
        match self {
            Component::Leaf(c) => c.name(),
            Component::Sequential(c) => c.name(),
            Component::Parallel(c) => c.name(),
            Component::Concatenated(c) => c.name(),
            Component::Adapter(c) => c.name(),
        }
    }

    /// Content address of the component's structure, in hex.
    ///
    /// Equal ids mean equal counts for equal noise, axis and cutoff.
    pub fn id(&self) -> &str {
        match self {
            Component::Leaf(c) => c.id(),
            Component::Sequential(c) => c.id(),
            Component::Parallel(c) => c.id(),
            Component::Concatenated(c) => c.id(),
            Component::Adapter(c) => c.id(),
        }
    }

    /// Per-axis fault cutoffs.
    pub fn k_good(&self) -> KGood {
        match self {
            Component::Leaf(c) => c.k_good(),
            Component::Sequential(c) => c.k_good(),
            Component::Parallel(c) => c.k_good(),
            Component::Concatenated(c) => c.k_good(),
            Component::Adapter(_) => KGood::default(),
        }
    }

    /// Declared input blocks.
    pub fn in_blocks(&self) -> &[Block] {
        match self {
            Component::Leaf(c) => c.in_blocks(),
            Component::Sequential(c) => c.in_blocks(),
            Component::Parallel(c) => c.in_blocks(),
            Component::Concatenated(c) => c.in_blocks(),
            Component::Adapter(c) => c.in_blocks(),
        }
    }

    /// Declared output blocks.
    pub fn out_blocks(&self) -> &[Block] {
        match self {
            Component::Leaf(c) => c.out_blocks(),
            Component::Sequential(c) => c.out_blocks(),
            Component::Parallel(c) => c.out_blocks(),
            Component::Concatenated(c) => c.out_blocks(),
            Component::Adapter(c) => c.out_blocks(),
        }
    }

    /// End-to-end noiseless effect on keys.
    ///
    /// For a tree holding a [`AdapterKind::Combine`] adapter this only
    /// tracks the first combined block; counts go through the max-marginal
    /// instead, see [`propagate_counts`](Self::propagate_counts).
    pub fn key_propagator(&self) -> &KeyPropagator {
        match self {
            Component::Leaf(c) => c.key_propagator(),
            Component::Sequential(c) => c.key_propagator(),
            Component::Parallel(c) => c.key_propagator(),
            Component::Concatenated(c) => c.key_propagator(),
            Component::Adapter(c) => c.key_propagator(),
        }
    }

    /// Location totals per kind over the whole tree, restricted to the
    /// locations that can fail on `axis`.
    pub fn location_tally(&self, axis: Axis) -> Tally {
        match self {
            Component::Leaf(c) => c.locations().tally_for(axis),
            Component::Sequential(c) => c.subcomponents().iter().map(|s| s.location_tally(axis)).sum(),
            Component::Parallel(c) => c.subcomponents().iter().map(|s| s.location_tally(axis)).sum(),
            Component::Concatenated(c) => c.inner().location_tally(axis) + c.outer().location_tally(axis),
            Component::Adapter(_) => Tally::default(),
        }
    }

    /// Direct sub-components.
    pub fn subcomponents(&self) -> &[Component] {
        match self {
            Component::Sequential(c) => c.subcomponents(),
            Component::Parallel(c) => c.subcomponents(),
            Component::Concatenated(c) => c.parts(),
            Component::Leaf(_) | Component::Adapter(_) => &[],
        }
    }

    /// Count the faults of this component.
    ///
    /// `input` are counts on (a superset of) the input blocks; without it the
    /// input is error free. The result holds orders up to
    /// `min(k_good(axis) + input order, k_max)`.
    #[instrument(skip_all, fields(component = self.name(), %axis, ?k_max))]
    pub fn count(
        &self,
        ctx: &CountContext,
        noise: &NoiseModels,
        axis: Axis,
        input: Option<&CountResult>,
        k_max: Option<usize>,
    ) -> FtResult<CountResult> {
        if let Some(input) = input {
            self.check_input(input, "count")?;
        }
        match self {
            Component::Leaf(c) => c.count(ctx, noise, axis, input, k_max),
            Component::Sequential(c) => c.count(ctx, noise, axis, input, k_max),
            Component::Parallel(c) => c.count(ctx, noise, axis, input, k_max),
            Component::Concatenated(c) => c.count(ctx, noise, axis, input, k_max),
            Component::Adapter(c) => c.count(input, k_max),
        }
    }

    /// Push counts through the component without adding faults.
    ///
    /// Trees holding a combine adapter are rejected: the max-marginal is not
    /// a key map, so no propagator reproduces what `count` returns.
    pub fn propagate_counts(&self, input: &CountResult) -> FtResult<CountResult> {
        self.check_input(input, "propagate counts")?;
        if self.has_combine() {
            return Err(CountError::unsupported(
                self.name(),
                "propagating counts through a combine adapter",
            ));
        }
        input.propagate(self.key_propagator(), self.in_blocks().len(), self.out_blocks())
    }

    fn has_combine(&self) -> bool {
        match self {
            Component::Adapter(a) => *a.kind() == AdapterKind::Combine,
            _ => self.subcomponents().iter().any(Component::has_combine),
        }
    }

    pub(crate) fn check_input(&self, input: &CountResult, operation: &'static str) -> FtResult<()> {
        if starts_with(input.blocks(), self.in_blocks()) {
            Ok(())
        } else {
            Err(CountError::BlockMismatch {
                component: self.name().to_string(),
                operation,
                expected: describe(self.in_blocks()),
                got: describe(input.blocks()),
            })
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.name(), &self.id()[..12])
    }
}

impl From<Leaf> for Component {
    fn from(c: Leaf) -> Self {
        Component::Leaf(c)
    }
}

impl From<Sequential> for Component {
    fn from(c: Sequential) -> Self {
        Component::Sequential(c)
    }
}

impl From<Parallel> for Component {
    fn from(c: Parallel) -> Self {
        Component::Parallel(c)
    }
}

impl From<Concatenated> for Component {
    fn from(c: Concatenated) -> Self {
        Component::Concatenated(c)
    }
}

impl From<Adapter> for Component {
    fn from(c: Adapter) -> Self {
        Component::Adapter(c)
    }
}

/// Highest order a component may produce.
pub(crate) fn k_limit(k_good: usize, k_in: usize, k_max: Option<usize>) -> usize {
    let natural = k_good + k_in;
    k_max.map_or(natural, |k| k.min(natural))
}

/// Content address of a component descriptor.
pub(crate) fn component_id(descriptor: &str) -> String {
    digest(descriptor)
}

/// Counts of a component with error-free input, served from the cache.
pub(crate) fn cached_counts<F>(
    ctx: &CountContext,
    function: &str,
    id: &str,
    noise: &NoiseModels,
    axis: Axis,
    k_max: Option<usize>,
    compute: F,
) -> FtResult<Counts>
where
    F: FnOnce() -> FtResult<Counts>,
{
    let key = CacheKey::builder(function)
        .arg(id)?
        .arg(&noise.descriptor(axis)?)?
        .arg(&axis)?
        .arg(&k_max)?
        .finish();
    ctx.cache().get_or_compute(&key, compute)
}

/// Sub-component ids, for composite descriptors.
pub(crate) fn sub_ids(subs: &[Component]) -> String {
    subs.iter().map(Component::id).collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_k_limit() {
        assert_eq!(k_limit(2, 1, None), 3);
        assert_eq!(k_limit(2, 1, Some(2)), 2);
        assert_eq!(k_limit(0, 0, Some(5)), 0);
    }

    #[test]
    fn test_propagate_counts_rejects_combine() {
        use ftcount_qec::catalog;
        let t = |name: &str| Block::new(name, catalog::trivial());
        let mut counts = Counts::trivial(2);
        counts.add(1, crate::key::Key::from([1, 2]), 3);
        let input = CountResult::new(vec![t("a"), t("b")], counts).unwrap();

        let combine: Component = Adapter::combine(vec![t("a"), t("b")]).unwrap().into();
        let err = combine.propagate_counts(&input).unwrap_err();
        assert!(matches!(err, CountError::Unsupported { .. }));

        let k1 = KGood::uniform(1);
        let rests = || -> Component {
            let rest = Leaf::rest(k1, catalog::trivial(), "a").unwrap();
            let idle = Leaf::empty(catalog::trivial(), "b").unwrap();
            Parallel::new("rests", k1, vec![rest.into(), idle.into()]).unwrap().into()
        };
        let nested: Component = Sequential::new("restCombine", k1, vec![rests(), combine])
            .unwrap()
            .into();
        assert!(nested.propagate_counts(&input).is_err());

        // without the combine step the same counts pass through unchanged
        assert_eq!(rests().propagate_counts(&input).unwrap().counts(), input.counts());
    }

    #[test]
    fn test_kgood() {
        let k = KGood::new(1, 2, 3);
        assert_eq!(k.get(Axis::X), 1);
        assert_eq!(k.get(Axis::Z), 2);
        assert_eq!(k.get(Axis::Y), 3);
        assert_eq!(KGood::uniform(4), KGood::new(4, 4, 4));
    }
}
