//! End-to-end counts of small gadgets over the trivial code.
//!
//! The trivial code has checks `[X_L, Z_L]`, so an X error has key 1, a Z
//! error key 2 and a Y error key 3.

use ftcount_circuit::{Axis, NoiseModels};
use ftcount_count::{Adapter, Component, CountContext, CountResult, KGood, Key, Leaf, Sequential, gadgets};
use ftcount_qec::{PauliKind, StabilizerState, catalog};
use std::sync::Arc;

fn k(v: &[u64]) -> Key {
    Key::from(v)
}

fn count(component: &Component, axis: Axis) -> CountResult {
    component
        .count(&CountContext::serial(), &NoiseModels::counting(), axis, None, None)
        .unwrap()
}

/// Sorted entries of every level, for comparing whole tables.
fn levels(result: &CountResult) -> Vec<Vec<(Key, u128)>> {
    (0..result.counts().num_levels())
        .map(|level| result.counts().sorted_level(level))
        .collect()
}

// ============================================================================
// Bell measurement
// ============================================================================

#[test]
fn test_bell_meas_x() {
    let meas = gadgets::bell_meas(KGood::uniform(1), catalog::trivial()).unwrap();
    let r = count(&meas, Axis::X);
    assert_eq!(
        levels(&r),
        vec![vec![(k(&[0, 0]), 1)], vec![(k(&[0, 0]), 1), (k(&[0, 1]), 3)]]
    );
}

#[test]
fn test_bell_meas_z() {
    let meas = gadgets::bell_meas(KGood::uniform(1), catalog::trivial()).unwrap();
    let r = count(&meas, Axis::Z);
    assert_eq!(
        levels(&r),
        vec![vec![(k(&[0, 0]), 1)], vec![(k(&[0, 0]), 1), (k(&[2, 0]), 3)]]
    );
}

// ============================================================================
// Bell pair
// ============================================================================

#[test]
fn test_bell_pair_x() {
    let pair = gadgets::bell_pair(KGood::uniform(1), catalog::trivial()).unwrap();
    let r = count(&pair, Axis::X);
    assert_eq!(
        levels(&r),
        vec![
            vec![(k(&[0, 0]), 1)],
            vec![(k(&[0, 1]), 2), (k(&[1, 0]), 1), (k(&[1, 1]), 1)],
        ]
    );
}

#[test]
fn test_bell_pair_filter_drops_xx() {
    let pair = gadgets::bell_pair_filtered(KGood::uniform(1), catalog::trivial()).unwrap();
    let r = count(&pair, Axis::X);
    assert_eq!(
        r.counts().sorted_level(1),
        vec![(k(&[0, 0]), 1), (k(&[0, 1]), 2), (k(&[1, 0]), 1)]
    );
}

#[test]
fn test_bell_pair_filter_drops_zz() {
    let pair = gadgets::bell_pair_filtered(KGood::uniform(1), catalog::trivial()).unwrap();
    let r = count(&pair, Axis::Z);
    assert_eq!(r.counts().get(1, &k(&[2, 2])), 0);
    assert!(r.counts().get(1, &k(&[0, 0])) > 0);
}

// ============================================================================
// Preparation
// ============================================================================

#[test]
fn test_prep_zero_and_plus() {
    let zero = StabilizerState::zero(catalog::trivial()).unwrap().into_shared();
    let plus = StabilizerState::plus(catalog::trivial()).unwrap().into_shared();
    let prep_zero: Component = Leaf::transversal_prep(KGood::uniform(1), zero, PauliKind::Z, "q")
        .unwrap()
        .into();
    let prep_plus: Component = Leaf::transversal_prep(KGood::uniform(1), plus, PauliKind::X, "q")
        .unwrap()
        .into();

    assert_eq!(levels(&count(&prep_zero, Axis::X)), vec![vec![(k(&[0]), 1)], vec![(k(&[1]), 1)]]);
    assert_eq!(levels(&count(&prep_plus, Axis::X)), vec![vec![(k(&[0]), 1)], vec![]]);
    assert_eq!(levels(&count(&prep_plus, Axis::Z)), vec![vec![(k(&[0]), 1)], vec![(k(&[2]), 1)]]);
}

// ============================================================================
// Sequential rests
// ============================================================================

#[test]
fn test_two_rests_xz() {
    let rest = || -> Component {
        Leaf::rest(KGood::uniform(1), catalog::trivial(), "q")
            .unwrap()
            .into()
    };
    let seq: Component = Sequential::new("rests", KGood::uniform(2), vec![rest(), rest()])
        .unwrap()
        .into();
    let r = count(&seq, Axis::Y);
    assert_eq!(
        r.counts().sorted_level(1),
        vec![(k(&[1]), 2), (k(&[2]), 2), (k(&[3]), 2)]
    );
    assert_eq!(r.counts().total(2), 9);
}

// ============================================================================
// Teleportation
// ============================================================================

fn teleport_parts(k_good: KGood) -> (Component, Component) {
    let code = catalog::trivial();
    (
        gadgets::bell_pair(k_good, Arc::clone(&code)).unwrap(),
        gadgets::bell_meas(k_good, code).unwrap(),
    )
}

#[test]
fn test_teleport_x() {
    let k1 = KGood::uniform(1);
    let (pair, meas) = teleport_parts(k1);
    let t = gadgets::teleport(k1, pair, meas, false).unwrap();
    let r = count(&t, Axis::X);
    assert_eq!(r.blocks().len(), 1);
    assert_eq!(levels(&r), vec![vec![(k(&[0]), 1)], vec![(k(&[0]), 2), (k(&[1]), 6)]]);
}

/// Single-block table from `(key, count)` pairs per level.
fn table(levels: &[&[(u64, u128)]]) -> Vec<Vec<(Key, u128)>> {
    levels
        .iter()
        .map(|level| level.iter().map(|&(key, c)| (k(&[key]), c)).collect())
        .collect()
}

/// The X or Z error key on one trivial block.
fn error_key(axis: Axis) -> u64 {
    match axis {
        Axis::X => 1,
        _ => 2,
    }
}

#[test]
fn test_teleport_with_meas_tables() {
    let k1 = KGood::uniform(1);
    let (pair, meas) = teleport_parts(k1);
    let t = gadgets::teleport_with_meas(k1, pair, meas, true).unwrap();

    let x = count(&t, Axis::X);
    assert_eq!(
        levels(&x),
        vec![
            vec![(k(&[0, 0, 0]), 1)],
            vec![
                (k(&[0, 0, 0]), 1),
                (k(&[0, 0, 1]), 3),
                (k(&[0, 1, 0]), 1),
                (k(&[0, 1, 1]), 4),
            ],
        ]
    );

    let z = count(&t, Axis::Z);
    assert_eq!(
        levels(&z),
        vec![
            vec![(k(&[0, 0, 0]), 1)],
            vec![
                (k(&[0, 0, 0]), 1),
                (k(&[0, 0, 2]), 2),
                (k(&[2, 0, 0]), 1),
                (k(&[2, 0, 2]), 5),
            ],
        ]
    );
}

#[test]
fn test_teleport_ed_second_order() {
    let k2 = KGood::uniform(2);
    for axis in [Axis::X, Axis::Z] {
        let (pair, meas) = teleport_parts(k2);
        let t = gadgets::teleport_ed(k2, pair, meas, true).unwrap();
        let r = count(&t, axis);
        let e = error_key(axis);
        assert_eq!(levels(&r), table(&[&[(0, 1)], &[(0, 2), (e, 7)], &[(0, 20), (e, 10)]]), "{axis}");
        assert!(r.counts().rejected().iter().all(|c| *c == 0));
    }
}

/// Error-detecting teleportation, an idle gate and a decoded trailing
/// teleportation.
fn teleport_ex_rec(k_good: KGood) -> Component {
    let ted = || {
        let (pair, meas) = teleport_parts(k_good);
        gadgets::teleport_ed(k_good, pair, meas, true).unwrap()
    };
    let leading = ted();
    let gate: Component = Leaf::empty(catalog::trivial(), leading.out_blocks()[0].name())
        .unwrap()
        .into();
    let trailing = ted();
    let decode: Component = Adapter::ideal_decode(trailing.out_blocks().to_vec()).unwrap().into();
    gadgets::ex_rec("exRecTeleportED", k_good, vec![leading], gate, vec![trailing, decode]).unwrap()
}

#[test]
fn test_ex_rec_teleport_ed() {
    let exrec = teleport_ex_rec(KGood::uniform(2));
    assert_eq!(exrec.subcomponents().len(), 4);
    for axis in [Axis::X, Axis::Z] {
        let e = error_key(axis);
        // one fault: 2 + 2 harmless in either ED, 7 + 7 errors
        // two faults: 7 * 7 + 2 * 2 + 2 * 20 harmless, 2 * 7 * 2 + 2 * 10 errors
        let expected = table(&[&[(0, 1)], &[(0, 4), (e, 14)], &[(0, 93), (e, 48)]]);
        assert_eq!(levels(&count(&exrec, axis)), expected, "{axis}");
    }
}

#[test]
fn test_teleport_rest_adds_one_location() {
    let k1 = KGood::uniform(1);
    let (pair, meas) = teleport_parts(k1);
    let t = gadgets::teleport(k1, pair, meas, true).unwrap();
    let r = count(&t, Axis::X);
    assert_eq!(r.counts().get(1, &k(&[1])), 7);
    // prepZ, two CNOTs, measZ and the rest can fail on X
    assert_eq!(t.location_tally(Axis::X).total(), 5);
}

#[test]
fn test_teleport_ed_trivial_rejects_nothing() {
    let k1 = KGood::uniform(1);
    let (pair, meas) = teleport_parts(k1);
    let t = gadgets::teleport_ed(k1, pair, meas, false).unwrap();
    let r = count(&t, Axis::Y);
    assert!(r.counts().rejected().iter().all(|c| *c == 0));
}

#[test]
fn test_teleport_ed_steane_rejects_syndromes() {
    let code = catalog::steane().unwrap();
    let k1 = KGood::uniform(1);
    let t = gadgets::teleport_ed(
        k1,
        gadgets::bell_pair(k1, Arc::clone(&code)).unwrap(),
        gadgets::bell_meas(k1, code).unwrap(),
        false,
    )
    .unwrap();
    let r = count(&t, Axis::X);
    // every single X fault that reaches a measured block is detected
    assert!(r.counts().rejected()[1] > 0);
    // 7 prepZ, 14 CNOTs with 3 outcomes, 7 measZ
    assert_eq!(r.counts().total(1), 56);
}
