//! Property-based tests for count-table convolution.

use ftcount_count::convolve::{convolve, convolve_in};
use ftcount_count::{Combine, Count, Counts, Key, WorkerPool};
use proptest::prelude::*;

/// Random table over `width` blocks with small keys, up to three levels,
/// and occasional rejected mass.
fn arb_counts(width: usize) -> impl Strategy<Value = Counts> {
    let entry = (0usize..3, prop::collection::vec(0u64..4, width), 1u128..5);
    (
        prop::collection::vec(entry, 0..8),
        prop::collection::vec(0u128..3, 3),
    )
        .prop_map(move |(entries, rejected)| {
            let mut counts = Counts::trivial(width);
            for (k, key, c) in entries {
                counts.add(k, Key::from(key), c);
            }
            for (k, r) in rejected.into_iter().enumerate() {
                if r > 0 && k > 0 {
                    counts.add_rejected(k, r);
                }
            }
            counts
        })
}

fn totals(c: &Counts) -> Vec<Count> {
    (0..c.num_levels()).map(|k| c.total(k)).collect()
}

proptest! {
    #[test]
    fn trivial_is_identity(a in arb_counts(2)) {
        let out = convolve(&a, &Counts::trivial(2), None, Combine::Xor).unwrap();
        prop_assert_eq!(out, a);
    }

    #[test]
    fn xor_is_commutative(a in arb_counts(2), b in arb_counts(2)) {
        let ab = convolve(&a, &b, None, Combine::Xor).unwrap();
        let ba = convolve(&b, &a, None, Combine::Xor).unwrap();
        prop_assert_eq!(ab, ba);
    }

    #[test]
    fn xor_is_associative(a in arb_counts(1), b in arb_counts(1), c in arb_counts(1)) {
        let left = convolve(&convolve(&a, &b, None, Combine::Xor).unwrap(), &c, None, Combine::Xor).unwrap();
        let right = convolve(&a, &convolve(&b, &c, None, Combine::Xor).unwrap(), None, Combine::Xor).unwrap();
        prop_assert_eq!(left, right);
    }

    #[test]
    fn totals_multiply(a in arb_counts(1), b in arb_counts(2)) {
        let out = convolve(&a, &b, None, Combine::Concat).unwrap();
        let (ta, tb) = (totals(&a), totals(&b));
        for (k, total) in totals(&out).into_iter().enumerate() {
            let expected: Count = (0..=k)
                .filter_map(|i| Some(ta.get(i)? * tb.get(k - i)?))
                .sum();
            prop_assert_eq!(total, expected, "order {}", k);
        }
        prop_assert_eq!(out.width(), 3);
    }

    #[test]
    fn cutoff_truncates(a in arb_counts(2), b in arb_counts(2), k_max in 0usize..4) {
        let full = convolve(&a, &b, None, Combine::Xor).unwrap();
        let cut = convolve(&a, &b, Some(k_max), Combine::Xor).unwrap();
        prop_assert!(cut.num_levels() <= k_max + 1);
        for k in 0..cut.num_levels() {
            prop_assert_eq!(cut.sorted_level(k), full.sorted_level(k));
            prop_assert_eq!(cut.rejected()[k], full.rejected()[k]);
        }
    }

    #[test]
    fn threaded_matches_serial(a in arb_counts(2), b in arb_counts(2)) {
        let pool = WorkerPool::threaded(3).unwrap();
        let serial = convolve(&a, &b, None, Combine::Xor).unwrap();
        let threaded = convolve_in(&pool, &a, &b, None, Combine::Xor).unwrap();
        prop_assert_eq!(serial, threaded);
    }
}
