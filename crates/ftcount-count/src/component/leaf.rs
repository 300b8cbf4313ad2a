//! Leaf components: physical locations counted directly.

use super::{KGood, cached_counts, component_id};
use crate::block::{Block, describe};
use crate::context::CountContext;
use crate::convolve::{Combine, convolve_in};
use crate::error::{CountError, FtResult};
use crate::faults::leaf_counts;
use crate::propagator::{KeyOp, KeyPropagator};
use crate::result::{CountResult, Counts};
use ftcount_circuit::{Axis, Location, Locations, NoiseModels};
use ftcount_qec::{Code, PauliKind, bits_msb_first, same_code};
use std::sync::Arc;
use tracing::debug;

/// Which kind of leaf, for descriptors and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeafKind {
    /// Transversal CNOT between two blocks.
    Cnot,
    /// Transversal measurement in a basis.
    Meas(PauliKind),
    /// Transversal idle step.
    Rest,
    /// Preparation of a logical state.
    Prep,
    /// No locations at all.
    Empty,
    /// Arbitrary locations with an explicit propagator.
    Custom,
}

/// A component made of physical locations.
#[derive(Debug, Clone)]
pub struct Leaf {
    name: String,
    kind: LeafKind,
    k_good: KGood,
    locations: Locations,
    in_blocks: Vec<Block>,
    out_blocks: Vec<Block>,
    propagator: KeyPropagator,
    id: String,
}

/// Name of the CNOT control block.
pub const CTRL: &str = "ctrl";
/// Name of the CNOT target block.
pub const TARG: &str = "targ";

impl Leaf {
    /// A leaf over arbitrary locations.
    ///
    /// Locations address `out_blocks` by name, so those names must be
    /// unique and every operand must lie inside its block.
    pub fn custom(
        name: impl Into<String>,
        k_good: KGood,
        locations: Locations,
        in_blocks: Vec<Block>,
        out_blocks: Vec<Block>,
        propagator: KeyPropagator,
    ) -> FtResult<Self> {
        Self::build(name.into(), LeafKind::Custom, k_good, locations, in_blocks, out_blocks, propagator)
    }

    fn build(
        name: String,
        kind: LeafKind,
        k_good: KGood,
        locations: Locations,
        in_blocks: Vec<Block>,
        out_blocks: Vec<Block>,
        propagator: KeyPropagator,
    ) -> FtResult<Self> {
        for (i, block) in out_blocks.iter().enumerate() {
            if out_blocks[..i].iter().any(|b| b.name() == block.name()) {
                return Err(CountError::config(
                    name,
                    "build leaf",
                    format!("duplicate block name {}", block.name()),
                ));
            }
        }
        let layout: Vec<(String, usize)> = out_blocks
            .iter()
            .map(|b| (b.name().to_string(), b.len()))
            .collect();
        locations.validate_layout(&layout)?;

        let width = propagator.output_width(in_blocks.len());
        if width != out_blocks.len() {
            return Err(CountError::config(
                name,
                "build leaf",
                format!(
                    "propagator maps {} input blocks to {width}, but {} output blocks are declared",
                    in_blocks.len(),
                    out_blocks.len()
                ),
            ));
        }

        let locs: Vec<String> = locations.iter().map(ToString::to_string).collect();
        let descriptor = format!(
            "leaf:{name}:{kind:?}:{k_good:?}:[{}]:[{}]:{:?}:{}",
            in_blocks.iter().map(Block::descriptor).collect::<Vec<_>>().join(","),
            out_blocks.iter().map(Block::descriptor).collect::<Vec<_>>().join(","),
            propagator.ops(),
            locs.join(";"),
        );
        Ok(Self {
            id: component_id(&descriptor),
            name,
            kind,
            k_good,
            locations,
            in_blocks,
            out_blocks,
            propagator,
        })
    }

    /// Transversal CNOT from a `ctrl` block to a `targ` block.
    ///
    /// Input blocks keep the given codes, which may be logical states;
    /// output blocks carry the underlying codes. Both codes must have the
    /// same check structure with every check purely X or purely Z.
    pub fn cnot(k_good: KGood, ctrl: Arc<dyn Code>, targ: Arc<dyn Code>) -> FtResult<Self> {
        let n = ctrl.block_length();
        let name = format!("transCNOT.{n}");
        if n != targ.block_length() {
            return Err(CountError::config(
                name,
                "build transversal CNOT",
                format!(
                    "control ({n}) and target ({}) block lengths do not match",
                    targ.block_length()
                ),
            ));
        }
        let ctrl_block = Block::new(CTRL, ctrl);
        let targ_block = Block::new(TARG, targ);
        let ctrl_out = ctrl_block.underlying();
        let targ_out = targ_block.underlying();
        if !same_code(ctrl_out.code().as_ref(), targ_out.code().as_ref()) {
            return Err(CountError::unsupported(
                name,
                format!(
                    "control code {} and target code {} have different checks",
                    ctrl_out.code().name(),
                    targ_out.code().name()
                ),
            ));
        }

        let checks = ctrl_out.code().parity_checks();
        if let Some(check) = checks
            .iter()
            .find(|c| !c.partial(PauliKind::X).is_identity() && !c.partial(PauliKind::Z).is_identity())
        {
            return Err(CountError::unsupported(
                name,
                format!("check {check} mixes X and Z"),
            ));
        }
        // X errors on the control reach the target; Z-type checks see them.
        let from_ctrl = bits_msb_first(checks.iter().map(|c| c.partial(PauliKind::X).is_identity()));
        // Z errors on the target reach the control; X-type checks see them.
        let from_targ = bits_msb_first(checks.iter().map(|c| c.partial(PauliKind::Z).is_identity()));
        let propagator = KeyPropagator::identity()
            .then(KeyOp::Copy {
                from: 0,
                to: 1,
                mask: from_ctrl,
            })
            .then(KeyOp::Copy {
                from: 1,
                to: 0,
                mask: from_targ,
            });

        let list = (0..n)
            .map(|i| Location::cnot(CTRL, i, TARG, i))
            .collect::<Result<Vec<_>, _>>()?;
        let locations = Locations::new(name.clone(), list);
        Self::build(
            name,
            LeafKind::Cnot,
            k_good,
            locations,
            vec![ctrl_block, targ_block],
            vec![ctrl_out, targ_out],
            propagator,
        )
    }

    /// Transversal measurement of a block in the X or Z basis.
    ///
    /// Key bits of checks that cannot see errors flipping the outcome are
    /// dropped.
    pub fn meas(
        k_good: KGood,
        code: Arc<dyn Code>,
        basis: PauliKind,
        block_name: impl Into<String>,
    ) -> FtResult<Self> {
        let n = code.block_length();
        let name = format!("transMeas{basis}.{n}");
        let block = Block::new(block_name, code);
        let list: Vec<Location> = match basis {
            PauliKind::X => (0..n).map(|i| Location::meas_x(block.name(), i)).collect(),
            PauliKind::Z => (0..n).map(|i| Location::meas_z(block.name(), i)).collect(),
            other => {
                return Err(CountError::unsupported(
                    name,
                    format!("transversal measurement in basis {other}"),
                ));
            }
        };
        let checks = block.code().parity_checks();
        let mask = bits_msb_first(checks.iter().map(|c| !c.partial(basis).is_identity()));
        let propagator = KeyPropagator::single(KeyOp::Mask {
            mask,
            blocks: Some(vec![0]),
        });
        let locations = Locations::new(name.clone(), list);
        Self::build(
            name,
            LeafKind::Meas(basis),
            k_good,
            locations,
            vec![block.clone()],
            vec![block],
            propagator,
        )
    }

    /// Transversal idle step on one block.
    pub fn rest(k_good: KGood, code: Arc<dyn Code>, block_name: impl Into<String>) -> FtResult<Self> {
        let n = code.block_length();
        let name = format!("transRest.{n}");
        let block = Block::new(block_name, code);
        let list = (0..n).map(|i| Location::rest(block.name(), i)).collect();
        let locations = Locations::new(name.clone(), list);
        Self::build(
            name,
            LeafKind::Rest,
            k_good,
            locations,
            vec![block.clone()],
            vec![block],
            KeyPropagator::identity(),
        )
    }

    /// Preparation of `state` by the given locations.
    ///
    /// The prepared blocks are named by the locations, in order of first
    /// appearance. Input and output blocks coincide; errors arriving on
    /// them are erased by the preparation.
    pub fn prep(k_good: KGood, state: Arc<dyn Code>, locations: Locations) -> FtResult<Self> {
        let name = format!("prep.{}", locations.name());
        let blocks: Vec<Block> = locations
            .block_names()
            .into_iter()
            .map(|b| Block::new(b, Arc::clone(&state)))
            .collect();
        if blocks.is_empty() {
            return Err(CountError::config(name, "build preparation", "no locations"));
        }
        let propagator = KeyPropagator::single(KeyOp::Mask {
            mask: 0,
            blocks: Some((0..blocks.len()).collect()),
        });
        Self::build(name, LeafKind::Prep, k_good, locations, blocks.clone(), blocks, propagator)
    }

    /// Transversal preparation of an X or Z eigenstate: every qubit of the
    /// block is prepared in `basis`.
    pub fn transversal_prep(
        k_good: KGood,
        state: Arc<dyn Code>,
        basis: PauliKind,
        block_name: impl Into<String>,
    ) -> FtResult<Self> {
        let block_name = block_name.into();
        let n = state.block_length();
        let list: Vec<Location> = match basis {
            PauliKind::X => (0..n).map(|i| Location::prep_x(block_name.as_str(), i)).collect(),
            PauliKind::Z => (0..n).map(|i| Location::prep_z(block_name.as_str(), i)).collect(),
            other => {
                return Err(CountError::unsupported(
                    format!("transPrep{other}.{n}"),
                    format!("transversal preparation in basis {other}"),
                ));
            }
        };
        Self::prep(k_good, state, Locations::new(format!("trans{basis}.{n}"), list))
    }

    /// A block with no locations.
    pub fn empty(code: Arc<dyn Code>, block_name: impl Into<String>) -> FtResult<Self> {
        let block = Block::new(block_name, code);
        Self::build(
            format!("empty.{}", block.name()),
            LeafKind::Empty,
            KGood::default(),
            Locations::new("empty", Vec::new()),
            vec![block.clone()],
            vec![block],
            KeyPropagator::identity(),
        )
    }

    /// Leaf name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Leaf kind.
    pub fn kind(&self) -> LeafKind {
        self.kind
    }

    /// Content address.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Per-axis cutoffs.
    pub fn k_good(&self) -> KGood {
        self.k_good
    }

    /// The leaf's own locations.
    pub fn locations(&self) -> &Locations {
        &self.locations
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

    /// Counts of the leaf's own faults over its output blocks, levels
    /// `0..=k`.
    fn own_counts(&self, ctx: &CountContext, noise: &NoiseModels, axis: Axis, k: usize) -> FtResult<Counts> {
        cached_counts(ctx, "leaf_counts", &self.id, noise, axis, Some(k), || {
            let mut counts = leaf_counts(
                ctx.pool(),
                &self.name,
                &self.locations,
                &self.out_blocks,
                noise,
                axis,
                k,
            )?;
            counts.ensure_level(k);
            Ok(counts)
        })
    }

    pub(crate) fn count(
        &self,
        ctx: &CountContext,
        noise: &NoiseModels,
        axis: Axis,
        input: Option<&CountResult>,
        k_max: Option<usize>,
    ) -> FtResult<CountResult> {
        let k_own = k_max.map_or(self.k_good.get(axis), |k| k.min(self.k_good.get(axis)));
        let own = self.own_counts(ctx, noise, axis, k_own)?;
        let Some(input) = input else {
            return CountResult::new(self.out_blocks.clone(), own);
        };
        let propagated = input.propagate(&self.propagator, self.in_blocks.len(), &self.out_blocks)?;
        debug!(
            leaf = %self.name,
            blocks = %describe(propagated.blocks()),
            "Convolving leaf with input"
        );
        let counts = convolve_in(ctx.pool(), propagated.counts(), &own, k_max, Combine::Xor)?;
        CountResult::new(propagated.blocks().to_vec(), counts)
    }
}
