//! Convolution of count tables.
//!
//! Two independent sets of faults combine by convolution: a configuration
//! of order `k1` from one side and order `k2` from the other is a
//! configuration of order `k1 + k2`, and its key is the combination of the
//! two keys. Multiplicities multiply. Everything the engine counts flows
//! through [`convolve`]; there is no second code path for index arithmetic.

use crate::dispatch::WorkerPool;
use crate::error::FtResult;
use crate::key::Key;
use crate::result::{Count, Counts, Level, add_counts, mul_counts};
use tracing::trace;

/// How keys from the two sides are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Combine {
    /// Both sides describe the same blocks; keys add (XOR).
    Xor,
    /// The sides describe disjoint blocks; keys are concatenated.
    Concat,
}

impl Combine {
    fn key(self, a: &Key, b: &Key) -> Key {
        match self {
            Combine::Xor => a.xor(b),
            Combine::Concat => a.concat(b),
        }
    }

    fn width(self, a: usize, b: usize) -> usize {
        match self {
            Combine::Xor => a.max(b),
            Combine::Concat => a + b,
        }
    }
}

/// Highest order the convolution of `a` and `b` can produce, capped by `k_max`.
fn limit(a: &Counts, b: &Counts, k_max: Option<usize>) -> Option<usize> {
    if a.num_levels() == 0 || b.num_levels() == 0 {
        return None;
    }
    let natural = a.k_max() + b.k_max();
    Some(k_max.map_or(natural, |k| k.min(natural)))
}

fn level_at(a: &Counts, b: &Counts, k: usize, combine: Combine) -> FtResult<(Level, Count)> {
    const OP: &str = "convolve";
    let mut level = Level::default();
    let mut rejected: Count = 0;
    for k1 in 0..=k.min(a.k_max()) {
        let k2 = k - k1;
        if k2 > b.k_max() {
            continue;
        }
        let (Some(la), Some(lb)) = (a.level(k1), b.level(k2)) else {
            continue;
        };
        for (ka, ca) in la {
            for (kb, cb) in lb {
                let slot = level.entry(combine.key(ka, kb)).or_insert(0);
                *slot = add_counts(*slot, mul_counts(*ca, *cb, OP)?, OP)?;
            }
        }
        let from_a = mul_counts(a.rejected()[k1], b.total(k2), OP)?;
        let from_b = mul_counts(a.accepted_total(k1), b.rejected()[k2], OP)?;
        rejected = add_counts(rejected, add_counts(from_a, from_b, OP)?, OP)?;
    }
    Ok((level, rejected))
}

fn assemble(width: usize, parts: Vec<(Level, Count)>) -> FtResult<Counts> {
    let mut levels = Vec::with_capacity(parts.len());
    let mut rejected = Vec::with_capacity(parts.len());
    for (level, rej) in parts {
        levels.push(level);
        rejected.push(rej);
    }
    let mut out = Counts::from_levels(width, levels)?;
    for (k, rej) in rejected.into_iter().enumerate() {
        if rej > 0 {
            out.add_rejected(k, rej);
        }
    }
    Ok(out)
}

/// Convolve two tables on the calling thread.
pub fn convolve(a: &Counts, b: &Counts, k_max: Option<usize>, combine: Combine) -> FtResult<Counts> {
    convolve_in(&WorkerPool::Serial, a, b, k_max, combine)
}

/// Convolve two tables, computing output levels on `pool`.
///
/// Rejected configurations of either side stay rejected: a rejected
/// configuration combined with anything from the other side is rejected.
pub fn convolve_in(
    pool: &WorkerPool,
    a: &Counts,
    b: &Counts,
    k_max: Option<usize>,
    combine: Combine,
) -> FtResult<Counts> {
    let width = combine.width(a.width(), b.width());
    let Some(k_lim) = limit(a, b, k_max) else {
        return Ok(Counts::empty(width));
    };
    trace!(k_lim, width_a = a.width(), width_b = b.width(), ?combine, "Convolving");
    let parts = pool.try_map((0..=k_lim).collect(), |k| level_at(a, b, k, combine))?;
    assemble(width, parts)
}

/// Convolve a list of tables left to right.
///
/// An empty list yields the trivial table of width zero.
pub fn convolve_all(
    pool: &WorkerPool,
    tables: &[Counts],
    k_max: Option<usize>,
    combine: Combine,
) -> FtResult<Counts> {
    let mut iter = tables.iter();
    let Some(first) = iter.next() else {
        return Ok(Counts::trivial(0));
    };
    let mut acc = first.clone();
    if let Some(k) = k_max {
        acc.truncate(k);
    }
    for next in iter {
        acc = convolve_in(pool, &acc, next, k_max, combine)?;
    }
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CountError;

    fn table(width: usize, entries: &[(usize, &[u64], Count)]) -> Counts {
        let mut c = Counts::empty(width);
        for (k, key, n) in entries {
            c.add(*k, Key::from(*key), *n);
        }
        c
    }

    #[test]
    fn test_trivial_is_identity() {
        let a = table(1, &[(0, &[0], 1), (1, &[1], 2), (1, &[2], 1)]);
        let out = convolve(&a, &Counts::trivial(1), None, Combine::Xor).unwrap();
        assert_eq!(out, a);
    }

    #[test]
    fn test_xor_orders_add() {
        let a = table(1, &[(0, &[0], 1), (1, &[1], 1)]);
        let out = convolve(&a, &a, None, Combine::Xor).unwrap();
        assert_eq!(out.get(0, &Key::from([0])), 1);
        assert_eq!(out.get(1, &Key::from([1])), 2);
        // two flips cancel
        assert_eq!(out.get(2, &Key::from([0])), 1);
        assert_eq!(out.k_max(), 2);
    }

    #[test]
    fn test_k_max_truncates() {
        let a = table(1, &[(0, &[0], 1), (1, &[1], 1)]);
        let out = convolve(&a, &a, Some(1), Combine::Xor).unwrap();
        assert_eq!(out.k_max(), 1);
    }

    #[test]
    fn test_concat_width() {
        let a = table(1, &[(0, &[1], 1)]);
        let b = table(2, &[(0, &[2, 3], 1)]);
        let out = convolve(&a, &b, None, Combine::Concat).unwrap();
        assert_eq!(out.width(), 3);
        assert_eq!(out.get(0, &Key::from([1, 2, 3])), 1);
    }

    #[test]
    fn test_rejections_propagate() {
        let mut a = table(1, &[(0, &[0], 1), (1, &[1], 1)]);
        a.add_rejected(1, 1);
        let b = table(1, &[(0, &[0], 1), (1, &[2], 3)]);
        let out = convolve(&a, &b, None, Combine::Xor).unwrap();
        for k in 0..=2 {
            let expected: Count = (0..=k).map(|k1| a.total(k1) * b.total(k - k1)).sum();
            assert_eq!(out.total(k), expected, "order {k}");
        }
        // the rejected order-1 configuration times b's order-1 total
        assert_eq!(out.rejected()[2], 3);
    }

    #[test]
    fn test_overflow_is_reported() {
        let a = table(1, &[(0, &[1], 1 << 127)]);
        let b = table(1, &[(0, &[0], 2)]);
        let err = convolve(&a, &b, None, Combine::Xor).unwrap_err();
        assert!(matches!(err, CountError::Overflow { .. }));
        // the same tables fit when the large side meets a single configuration
        let one = table(1, &[(0, &[0], 1)]);
        assert_eq!(convolve(&a, &one, None, Combine::Xor).unwrap().get(0, &Key::from([1])), 1 << 127);
    }

    #[test]
    fn test_empty_side() {
        let a = table(1, &[(0, &[0], 1)]);
        let out = convolve(&a, &Counts::empty(1), None, Combine::Xor).unwrap();
        assert_eq!(out.num_levels(), 0);
    }

    #[test]
    fn test_threaded_matches_serial() {
        let a = table(2, &[(0, &[0, 0], 1), (1, &[1, 0], 2), (1, &[0, 3], 1), (2, &[1, 3], 5)]);
        let b = table(2, &[(0, &[0, 0], 1), (1, &[2, 1], 4), (2, &[3, 3], 2)]);
        let pool = WorkerPool::threaded(4).unwrap();
        assert_eq!(
            convolve_in(&pool, &a, &b, None, Combine::Xor).unwrap(),
            convolve(&a, &b, None, Combine::Xor).unwrap()
        );
    }
}
