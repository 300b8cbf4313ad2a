//! Standard fault-tolerant gadgets assembled from components.
//!
//! All gadgets use transversal operations and share one cutoff for the
//! gadget and its parts.

use crate::component::{Adapter, Component, KGood, Leaf, Parallel, Sequential};
use crate::error::{CountError, FtResult};
use crate::key::{Key, KeyGenerator};
use ftcount_qec::{Code, PauliKind, StabilizerState};
use std::sync::Arc;

/// Encoded Bell pair: `|+>` and `|0>` blocks joined by a transversal CNOT.
pub fn bell_pair(k_good: KGood, code: Arc<dyn Code>) -> FtResult<Component> {
    let plus = StabilizerState::plus(Arc::clone(&code))?.into_shared();
    let zero = StabilizerState::zero(code)?.into_shared();
    let preps = Parallel::new(
        "prepPlusZero",
        k_good,
        vec![
            Leaf::transversal_prep(k_good, Arc::clone(&plus), PauliKind::X, "ctrl")?.into(),
            Leaf::transversal_prep(k_good, Arc::clone(&zero), PauliKind::Z, "targ")?.into(),
        ],
    )?;
    let cnot = Leaf::cnot(k_good, plus, zero)?;
    Ok(Sequential::new("bellPair", k_good, vec![preps.into(), cnot.into()])?.into())
}

/// [`bell_pair`] followed by a filter that drops the pair's own
/// stabilizers: logical `XX` and `ZZ` errors act trivially on the pair.
pub fn bell_pair_filtered(k_good: KGood, code: Arc<dyn Code>) -> FtResult<Component> {
    let [logical] = code.logical_operators() else {
        return Err(CountError::unsupported(
            "bellPair",
            format!("{} does not encode exactly one qubit", code.name()),
        ));
    };
    let generator = KeyGenerator::for_code(code.as_ref());
    let xx = generator.key_of(&logical.x);
    let zz = generator.key_of(&logical.z);
    let pair = bell_pair(k_good, code)?;
    let filter = Adapter::logical_filter(
        pair.out_blocks().to_vec(),
        vec![Key::from([xx, xx]), Key::from([zz, zz])],
    )?;
    Ok(Sequential::new("bellPairFiltered", k_good, vec![pair, filter.into()])?.into())
}

/// Bell-basis measurement: transversal CNOT, then X on the control and Z
/// on the target.
pub fn bell_meas(k_good: KGood, code: Arc<dyn Code>) -> FtResult<Component> {
    let cnot = Leaf::cnot(k_good, Arc::clone(&code), Arc::clone(&code))?;
    let meas = Parallel::new(
        "measXZ",
        k_good,
        vec![
            Leaf::meas(k_good, Arc::clone(&code), PauliKind::X, "ctrl")?.into(),
            Leaf::meas(k_good, code, PauliKind::Z, "targ")?.into(),
        ],
    )?;
    Ok(Sequential::new("bellMeas", k_good, vec![cnot.into(), meas.into()])?.into())
}

/// Teleportation keeping the measured blocks.
///
/// Blocks in: `[data]`. Blocks out: `[mx, mz, data']`, where `mx` and `mz`
/// are the Bell measurement outcomes and `data'` is the second half of the
/// Bell pair after the Pauli frame update. With `rest`, the output block
/// idles once while the measurements complete.
pub fn teleport_with_meas(
    k_good: KGood,
    bell_pair: Component,
    bell_meas: Component,
    rest: bool,
) -> FtResult<Component> {
    let [data, _] = bell_meas.in_blocks() else {
        return Err(CountError::config(
            "teleport",
            "build teleportation",
            "Bell measurement must act on two blocks",
        ));
    };
    let data = data.clone();
    let [_, half] = bell_pair.out_blocks() else {
        return Err(CountError::config(
            "teleport",
            "build teleportation",
            "Bell pair must produce two blocks",
        ));
    };
    let half = half.clone();

    let insert = Adapter::insert(vec![data.clone()], 1, bell_pair.in_blocks().to_vec())?;
    let prepare = Parallel::new(
        "dataAndPair",
        k_good,
        vec![Leaf::empty(Arc::clone(data.code()), data.name())?.into(), bell_pair],
    )?;
    let measure = Parallel::new(
        "measureData",
        k_good,
        vec![bell_meas, Leaf::empty(Arc::clone(half.code()), half.name())?.into()],
    )?;
    let mut subs: Vec<Component> = vec![insert.into(), prepare.into(), measure.into()];

    if rest {
        let measured = subs[2].out_blocks().to_vec();
        let idle = Parallel::new(
            "restOutput",
            k_good,
            vec![
                Leaf::empty(Arc::clone(measured[0].code()), measured[0].name())?.into(),
                Leaf::empty(Arc::clone(measured[1].code()), measured[1].name())?.into(),
                Leaf::rest(k_good, Arc::clone(half.code()), half.name())?.into(),
            ],
        )?;
        subs.push(idle.into());
    }

    let correct = Adapter::teleport_correct(subs[subs.len() - 1].out_blocks().to_vec())?;
    subs.push(correct.into());
    Ok(Sequential::new("teleportWithMeas", k_good, subs)?.into())
}

/// Teleportation: [`teleport_with_meas`] with the measured blocks
/// discarded.
pub fn teleport(k_good: KGood, bell_pair: Component, bell_meas: Component, rest: bool) -> FtResult<Component> {
    let with_meas = teleport_with_meas(k_good, bell_pair, bell_meas, rest)?;
    let discard = Adapter::discard(with_meas.out_blocks().to_vec(), vec![0, 1])?;
    Ok(Sequential::new("teleport", k_good, vec![with_meas, discard.into()])?.into())
}

/// Error-detecting teleportation: configurations with a nonzero syndrome
/// on either measured block are rejected before the measured blocks are
/// discarded.
pub fn teleport_ed(k_good: KGood, bell_pair: Component, bell_meas: Component, rest: bool) -> FtResult<Component> {
    let with_meas = teleport_with_meas(k_good, bell_pair, bell_meas, rest)?;
    let blocks = with_meas.out_blocks().to_vec();
    let postselect = Adapter::postselect_syndromes(blocks.clone(), vec![0, 1])?;
    let discard = Adapter::discard(blocks, vec![0, 1])?;
    Ok(Sequential::new(
        "teleportED",
        k_good,
        vec![with_meas, postselect.into(), discard.into()],
    )?
    .into())
}

/// Extended rectangle: leading error correction, the gate, trailing error
/// correction.
pub fn ex_rec(
    name: impl Into<String>,
    k_good: KGood,
    leading: Vec<Component>,
    gate: Component,
    trailing: Vec<Component>,
) -> FtResult<Component> {
    let mut subs = leading;
    subs.push(gate);
    subs.extend(trailing);
    Ok(Sequential::new(name, k_good, subs)?.into())
}
