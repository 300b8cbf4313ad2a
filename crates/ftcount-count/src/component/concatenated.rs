//! Two levels of code concatenation.
//!
//! The inner component works on physical blocks of the inner code. Its
//! output blocks are decoded to logical errors and regrouped, one group per
//! block of the outer component, whose keys are then built from the outer
//! code's checks.

use super::{Component, KGood, cached_counts, component_id, ideal_decode_op, k_limit};
use crate::block::{Block, describe};
use crate::context::CountContext;
use crate::error::{CountError, FtResult};
use crate::key::KeyGenerator;
use crate::propagator::{KeyOp, KeyPropagator};
use crate::result::CountResult;
use ftcount_circuit::{Axis, NoiseModels};
use tracing::debug;

/// An inner level feeding an outer level.
#[derive(Debug, Clone)]
pub struct Concatenated {
    name: String,
    k_good: KGood,
    /// `[inner, outer]`.
    parts: Vec<Component>,
    relabel: KeyPropagator,
    propagator: KeyPropagator,
    id: String,
}

impl Concatenated {
    /// Concatenate `inner` into `outer`.
    ///
    /// Outer input block `j` of length `n_j` takes the next `n_j` inner
    /// output blocks, in order; the block lengths must account for every
    /// inner output block. Each inner output block must encode one qubit.
    pub fn new(name: impl Into<String>, k_good: KGood, inner: Component, outer: Component) -> FtResult<Self> {
        let name = name.into();
        let needed: usize = outer.in_blocks().iter().map(Block::len).sum();
        if needed != inner.out_blocks().len() {
            return Err(CountError::config(
                name,
                "build concatenation",
                format!(
                    "outer blocks [{}] need {needed} inner blocks, inner provides {}",
                    describe(outer.in_blocks()),
                    inner.out_blocks().len()
                ),
            ));
        }

        let mut relabel = KeyPropagator::identity();
        for (i, block) in inner.out_blocks().iter().enumerate() {
            relabel = relabel.then(ideal_decode_op(i, block)?);
        }
        for (j, block) in outer.in_blocks().iter().enumerate() {
            let generator = KeyGenerator::for_block(block);
            relabel = relabel.then(KeyOp::Lift {
                start: j,
                x_keys: generator.x_keys().to_vec(),
                z_keys: generator.z_keys().to_vec(),
            });
        }
        let propagator = inner
            .key_propagator()
            .clone()
            .and_then(&relabel)
            .and_then(outer.key_propagator());
        let id = component_id(&format!(
            "concatenated:{name}:{k_good:?}:{}:{}",
            inner.id(),
            outer.id()
        ));
        Ok(Self {
            name,
            k_good,
            parts: vec![inner, outer],
            relabel,
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

    /// The inner level.
    pub fn inner(&self) -> &Component {
        &self.parts[0]
    }

    /// The outer level.
    pub fn outer(&self) -> &Component {
        &self.parts[1]
    }

    /// Inner and outer level.
    pub fn parts(&self) -> &[Component] {
        &self.parts
    }

    /// Inner input blocks.
    pub fn in_blocks(&self) -> &[Block] {
        self.inner().in_blocks()
    }

    /// Outer output blocks.
    pub fn out_blocks(&self) -> &[Block] {
        self.outer().out_blocks()
    }

    /// Noiseless effect on keys, inner input to outer output.
    pub fn key_propagator(&self) -> &KeyPropagator {
        &self.propagator
    }

    fn count_through(
        &self,
        ctx: &CountContext,
        noise: &NoiseModels,
        axis: Axis,
        input: Option<&CountResult>,
        k_lim: usize,
    ) -> FtResult<CountResult> {
        let inner = self.inner().count(ctx, noise, axis, input, Some(k_lim))?;
        let lifted = inner.propagate(&self.relabel, self.inner().out_blocks().len(), self.outer().in_blocks())?;
        debug!(
            concatenated = %self.name,
            blocks = %describe(lifted.blocks()),
            "Lifted inner counts"
        );
        self.outer().count(ctx, noise, axis, Some(&lifted), Some(k_lim))
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
        match input {
            Some(input) => {
                let k_lim = k_limit(k_good, input.k_max(), k_max);
                self.count_through(ctx, noise, axis, Some(input), k_lim)
            }
            None => {
                let k_lim = k_limit(k_good, 0, k_max);
                let counts = cached_counts(ctx, "component_counts", &self.id, noise, axis, Some(k_lim), || {
                    Ok(self.count_through(ctx, noise, axis, None, k_lim)?.into_counts())
                })?;
                CountResult::new(self.out_blocks().to_vec(), counts)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Adapter, Leaf, Parallel};
    use crate::key::Key;
    use ftcount_qec::catalog;

    /// Three trivial-code rests feeding a bit-flip code block.
    fn rests_into_bit_flip(outer_k: usize) -> Concatenated {
        let rests = (0..3)
            .map(|i| Component::from(Leaf::rest(KGood::uniform(1), catalog::trivial(), format!("q{i}")).unwrap()))
            .collect();
        let inner = Component::from(Parallel::new("rests", KGood::uniform(1), rests).unwrap());
        let bit_flip = catalog::bit_flip().unwrap();
        let outer = Component::from(Leaf::rest(KGood::uniform(outer_k), bit_flip, "L").unwrap());
        Concatenated::new("level2", KGood::uniform(1), inner, outer).unwrap()
    }

    #[test]
    fn test_block_count_must_match() {
        let inner = Component::from(Leaf::rest(KGood::uniform(1), catalog::trivial(), "q").unwrap());
        let outer = Component::from(Leaf::rest(KGood::uniform(0), catalog::bit_flip().unwrap(), "L").unwrap());
        let err = Concatenated::new("bad", KGood::uniform(1), inner, outer).unwrap_err();
        assert!(matches!(err, CountError::Configuration { .. }));
    }

    #[test]
    fn test_inner_faults_lift_to_outer_keys() {
        let c = Component::from(rests_into_bit_flip(0));
        let ctx = CountContext::serial();
        let r = c.count(&ctx, &NoiseModels::counting(), Axis::X, None, None).unwrap();
        assert_eq!(r.blocks().len(), 1);
        let generator = KeyGenerator::for_block(&r.blocks()[0]);
        let mut expected: Vec<(Key, u128)> = generator
            .x_keys()
            .iter()
            .map(|k| (Key::from([*k]), 1))
            .collect();
        expected.sort_unstable();
        assert_eq!(r.counts().sorted_level(1), expected);
        assert_eq!(r.counts().total(1), 3);
    }

    #[test]
    fn test_propagator_matches_counting() {
        let c = rests_into_bit_flip(0);
        let input = CountResult::single(c.in_blocks().to_vec(), Key::from([1, 0, 0])).unwrap();
        let ctx = CountContext::serial();
        let r = Component::from(c.clone())
            .count(&ctx, &NoiseModels::counting(), Axis::X, Some(&input), Some(0))
            .unwrap();
        let propagated = c.key_propagator().apply(&Key::from([1, 0, 0])).unwrap();
        assert_eq!(r.counts().sorted_level(0), vec![(propagated, 1)]);
    }

    #[test]
    fn test_multi_qubit_inner_blocks_unsupported() {
        let inner = Component::from(
            Adapter::discard(vec![Block::new("w", catalog::steane().unwrap())], vec![]).unwrap(),
        );
        let pair = ftcount_qec::StabilizerCode::new(
            "pair",
            2,
            vec![],
            vec![
                ftcount_qec::LogicalPair {
                    x: "XI".parse().unwrap(),
                    z: "ZI".parse().unwrap(),
                },
                ftcount_qec::LogicalPair {
                    x: "IX".parse().unwrap(),
                    z: "IZ".parse().unwrap(),
                },
            ],
        )
        .unwrap()
        .into_shared();
        let inner_pair = Component::from(
            Adapter::discard(vec![Block::new("p", pair)], vec![]).unwrap(),
        );
        let outer = Component::from(Leaf::empty(catalog::trivial(), "L").unwrap());
        assert!(Concatenated::new("ok", KGood::uniform(1), inner, outer.clone()).is_ok());
        let err = Concatenated::new("bad", KGood::uniform(1), inner_pair, outer).unwrap_err();
        assert!(matches!(err, CountError::Unsupported { .. }));
    }
}
