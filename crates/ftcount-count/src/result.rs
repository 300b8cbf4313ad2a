//! Count results.
//!
//! [`Counts`] is the block-free table: for every fault order `k`, a map
//! from key to multiplicity, plus the multiplicity of configurations that
//! were rejected by post-selection. [`CountResult`] attaches the blocks the
//! keys refer to. Only [`Counts`] is serializable; blocks carry codes, which
//! are supplied by the component that owns the result.

use crate::block::{Block, describe};
use crate::error::{CountError, FtResult};
use crate::key::Key;
use crate::propagator::KeyPropagator;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Multiplicity of a set of fault configurations.
pub type Count = u128;

/// `a * b`, or [`CountError::Overflow`].
pub(crate) fn mul_counts(a: Count, b: Count, operation: &'static str) -> FtResult<Count> {
    a.checked_mul(b).ok_or(CountError::Overflow { operation })
}

/// `a + b`, or [`CountError::Overflow`].
pub(crate) fn add_counts(a: Count, b: Count, operation: &'static str) -> FtResult<Count> {
    a.checked_add(b).ok_or(CountError::Overflow { operation })
}

/// Key multiplicities at one fault order.
pub type Level = FxHashMap<Key, Count>;

/// Multiplicities per fault order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCounts", into = "RawCounts")]
pub struct Counts {
    width: usize,
    levels: Vec<Level>,
    rejected: Vec<Count>,
}

/// Canonical serialized form: levels as sorted entry lists.
#[derive(Serialize, Deserialize)]
struct RawCounts {
    width: usize,
    levels: Vec<Vec<(Key, Count)>>,
    rejected: Vec<Count>,
}

impl From<Counts> for RawCounts {
    fn from(c: Counts) -> Self {
        let levels = c
            .levels
            .into_iter()
            .map(|level| {
                let mut entries: Vec<(Key, Count)> = level.into_iter().collect();
                entries.sort_unstable();
                entries
            })
            .collect();
        RawCounts {
            width: c.width,
            levels,
            rejected: c.rejected,
        }
    }
}

impl TryFrom<RawCounts> for Counts {
    type Error = String;

    fn try_from(raw: RawCounts) -> Result<Self, String> {
        if raw.rejected.len() != raw.levels.len() {
            return Err(format!(
                "{} rejected entries for {} levels",
                raw.rejected.len(),
                raw.levels.len()
            ));
        }
        let mut levels = Vec::with_capacity(raw.levels.len());
        for (k, entries) in raw.levels.into_iter().enumerate() {
            let mut level = Level::default();
            for (key, count) in entries {
                if key.width() != raw.width {
                    return Err(format!(
                        "key {key} at level {k} has width {}, expected {}",
                        key.width(),
                        raw.width
                    ));
                }
                if level.insert(key, count).is_some() {
                    return Err(format!("duplicate key at level {k}"));
                }
            }
            levels.push(level);
        }
        Ok(Counts {
            width: raw.width,
            levels,
            rejected: raw.rejected,
        })
    }
}

impl Counts {
    /// No levels at all.
    pub fn empty(width: usize) -> Self {
        Self {
            width,
            levels: Vec::new(),
            rejected: Vec::new(),
        }
    }

    /// The zero-fault identity: one configuration with the zero key.
    pub fn trivial(width: usize) -> Self {
        Self::single(Key::zeros(width))
    }

    /// One configuration with the given key at order zero.
    pub fn single(key: Key) -> Self {
        let mut out = Self::empty(key.width());
        out.add(0, key, 1);
        out
    }

    /// Build from explicit levels, checking key widths.
    pub fn from_levels(width: usize, levels: Vec<Level>) -> FtResult<Self> {
        for level in &levels {
            if let Some(key) = level.keys().find(|k| k.width() != width) {
                return Err(CountError::KeyWidth {
                    operation: "Counts::from_levels",
                    expected: width,
                    got: key.width(),
                });
            }
        }
        let rejected = vec![0; levels.len()];
        Ok(Self {
            width,
            levels,
            rejected,
        })
    }

    /// Number of blocks per key.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of stored levels.
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// Highest stored fault order.
    pub fn k_max(&self) -> usize {
        self.levels.len().saturating_sub(1)
    }

    /// All levels.
    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    /// Level `k`, if stored.
    pub fn level(&self, k: usize) -> Option<&Level> {
        self.levels.get(k)
    }

    /// Multiplicity of `key` at order `k`.
    pub fn get(&self, k: usize, key: &Key) -> Count {
        self.levels
            .get(k)
            .and_then(|l| l.get(key))
            .copied()
            .unwrap_or(0)
    }

    /// Rejected multiplicity per level.
    pub fn rejected(&self) -> &[Count] {
        &self.rejected
    }

    /// Sum of accepted multiplicities at order `k`.
    pub fn accepted_total(&self, k: usize) -> Count {
        self.levels.get(k).map_or(0, |l| l.values().sum())
    }

    /// Accepted plus rejected multiplicity at order `k`.
    pub fn total(&self, k: usize) -> Count {
        self.accepted_total(k) + self.rejected.get(k).copied().unwrap_or(0)
    }

    /// Make sure levels `0..=k` exist.
    pub fn ensure_level(&mut self, k: usize) {
        while self.levels.len() <= k {
            self.levels.push(Level::default());
            self.rejected.push(0);
        }
    }

    /// Add `count` configurations with `key` at order `k`.
    pub fn add(&mut self, k: usize, key: Key, count: Count) {
        self.ensure_level(k);
        if count > 0 {
            *self.levels[k].entry(key).or_insert(0) += count;
        }
    }

    /// Add `count` rejected configurations at order `k`.
    pub fn add_rejected(&mut self, k: usize, count: Count) {
        self.ensure_level(k);
        self.rejected[k] += count;
    }

    /// Drop every level above `k_max`.
    pub fn truncate(&mut self, k_max: usize) {
        self.levels.truncate(k_max + 1);
        self.rejected.truncate(k_max + 1);
    }

    /// Shift every level up by `by` fault orders.
    #[must_use]
    pub fn shifted(&self, by: usize) -> Self {
        let mut out = Self::empty(self.width);
        out.ensure_level(by.saturating_sub(1));
        out.levels.truncate(by);
        out.rejected.truncate(by);
        out.levels.extend(self.levels.iter().cloned());
        out.rejected.extend(self.rejected.iter().copied());
        out
    }

    /// Key-wise sum with another table of the same width.
    pub fn merge(&mut self, other: &Counts) -> FtResult<()> {
        if other.width != self.width && !other.levels.is_empty() {
            return Err(CountError::KeyWidth {
                operation: "Counts::merge",
                expected: self.width,
                got: other.width,
            });
        }
        if other.levels.is_empty() {
            return Ok(());
        }
        self.ensure_level(other.k_max());
        for (k, level) in other.levels.iter().enumerate() {
            for (key, count) in level {
                *self.levels[k].entry(key.clone()).or_insert(0) += count;
            }
            self.rejected[k] += other.rejected[k];
        }
        Ok(())
    }

    /// Apply a propagator to every key. Rejected keys move to the
    /// rejected stream.
    pub fn map_keys(&self, propagator: &KeyPropagator) -> Counts {
        if propagator.is_identity() {
            return self.clone();
        }
        let mut out = Counts::empty(propagator.output_width(self.width));
        out.ensure_level(self.k_max());
        out.levels.truncate(self.levels.len());
        out.rejected.truncate(self.levels.len());
        for (k, level) in self.levels.iter().enumerate() {
            for (key, count) in level {
                match propagator.apply(key) {
                    Some(mapped) => *out.levels[k].entry(mapped).or_insert(0) += count,
                    None => out.rejected[k] += count,
                }
            }
            out.rejected[k] += self.rejected[k];
        }
        out
    }

    /// Entries of level `k` in key order.
    pub fn sorted_level(&self, k: usize) -> Vec<(Key, Count)> {
        let mut entries: Vec<(Key, Count)> = self
            .levels
            .get(k)
            .map(|l| l.iter().map(|(key, c)| (key.clone(), *c)).collect())
            .unwrap_or_default();
        entries.sort_unstable();
        entries
    }
}

impl fmt::Display for Counts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for k in 0..self.levels.len() {
            if k > 0 {
                write!(f, ", ")?;
            }
            let entries: Vec<String> = self
                .sorted_level(k)
                .into_iter()
                .map(|(key, c)| format!("{key}: {c}"))
                .collect();
            write!(f, "{{{}}}", entries.join(", "))?;
        }
        write!(f, "]")?;
        if self.rejected.iter().any(|r| *r > 0) {
            write!(f, " rejected={:?}", self.rejected)?;
        }
        Ok(())
    }
}

/// Counts together with the blocks their keys refer to.
#[derive(Debug, Clone, PartialEq)]
pub struct CountResult {
    blocks: Vec<Block>,
    counts: Counts,
}

impl CountResult {
    /// Attach blocks to a table, checking that the key width matches.
    pub fn new(blocks: Vec<Block>, counts: Counts) -> FtResult<Self> {
        if counts.width() != blocks.len() {
            return Err(CountError::KeyWidth {
                operation: "CountResult::new",
                expected: blocks.len(),
                got: counts.width(),
            });
        }
        Ok(Self { blocks, counts })
    }

    /// The zero-fault identity over `blocks`.
    pub fn trivial(blocks: Vec<Block>) -> Self {
        let counts = Counts::trivial(blocks.len());
        Self { blocks, counts }
    }

    /// One configuration with `key` at order zero.
    pub fn single(blocks: Vec<Block>, key: Key) -> FtResult<Self> {
        Self::new(blocks, Counts::single(key))
    }

    /// Blocks, one per key position.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// The count table.
    pub fn counts(&self) -> &Counts {
        &self.counts
    }

    /// Consume into the count table.
    pub fn into_counts(self) -> Counts {
        self.counts
    }

    /// Highest stored fault order.
    pub fn k_max(&self) -> usize {
        self.counts.k_max()
    }

    /// Apply a propagator and relabel the leading blocks as `out_blocks`.
    ///
    /// Blocks beyond those the propagator consumes are carried through.
    pub fn propagate(
        &self,
        propagator: &KeyPropagator,
        consumed: usize,
        out_blocks: &[Block],
    ) -> FtResult<CountResult> {
        let counts = self.counts.map_keys(propagator);
        let mut blocks = out_blocks.to_vec();
        blocks.extend(self.blocks.iter().skip(consumed).cloned());
        if blocks.len() != counts.width() {
            return Err(CountError::BlockMismatch {
                component: "propagate".into(),
                operation: "relabel blocks",
                expected: describe(&blocks),
                got: format!("{} key positions", counts.width()),
            });
        }
        Ok(CountResult { blocks, counts })
    }

    /// Rotate blocks left by `by` (negative rotates right).
    #[must_use]
    pub fn rotated(&self, by: isize) -> CountResult {
        let propagator = KeyPropagator::single(crate::propagator::KeyOp::Rotate(by));
        let mut blocks = self.blocks.clone();
        if !blocks.is_empty() {
            let r = by.rem_euclid(blocks.len() as isize) as usize;
            blocks.rotate_left(r);
        }
        CountResult {
            blocks,
            counts: self.counts.map_keys(&propagator),
        }
    }

    pub(crate) fn from_parts(blocks: Vec<Block>, counts: Counts) -> Self {
        Self { blocks, counts }
    }
}

impl fmt::Display for CountResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CountResult[{}] {}", describe(&self.blocks), self.counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::propagator::KeyOp;

    fn k(v: &[u64]) -> Key {
        Key::from(v)
    }

    #[test]
    fn test_trivial() {
        let c = Counts::trivial(2);
        assert_eq!(c.k_max(), 0);
        assert_eq!(c.get(0, &k(&[0, 0])), 1);
        assert_eq!(c.total(0), 1);
        assert_eq!(c.rejected(), &[0]);
    }

    #[test]
    fn test_shift_and_merge() {
        let mut a = Counts::trivial(1);
        a.add(1, k(&[1]), 3);
        let shifted = a.shifted(2);
        assert_eq!(shifted.num_levels(), 4);
        assert_eq!(shifted.get(2, &k(&[0])), 1);
        assert_eq!(shifted.get(3, &k(&[1])), 3);
        assert!(shifted.level(0).unwrap().is_empty());

        let mut b = Counts::trivial(1);
        b.merge(&shifted).unwrap();
        assert_eq!(b.get(0, &k(&[0])), 1);
        assert_eq!(b.get(3, &k(&[1])), 3);

        assert!(matches!(
            b.merge(&Counts::trivial(2)),
            Err(CountError::KeyWidth { .. })
        ));
    }

    #[test]
    fn test_map_keys_tracks_rejections() {
        let mut c = Counts::trivial(1);
        c.add(1, k(&[1]), 2);
        c.add(1, k(&[2]), 5);
        let reject = KeyPropagator::single(KeyOp::Reject {
            blocks: vec![0],
            mask: 0b10,
        });
        let out = c.map_keys(&reject);
        assert_eq!(out.get(1, &k(&[1])), 2);
        assert_eq!(out.rejected(), &[0, 5]);
        assert_eq!(out.total(1), c.total(1));
    }

    #[test]
    fn test_serde_round_trip_and_validation() {
        let mut c = Counts::trivial(2);
        c.add(1, k(&[1, 0]), 7);
        c.add_rejected(1, 2);
        let json = serde_json::to_string(&c).unwrap();
        let back: Counts = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);

        let bad = r#"{"width":2,"levels":[[[[0],1]]],"rejected":[0]}"#;
        assert!(serde_json::from_str::<Counts>(bad).is_err());
        let short = r#"{"width":1,"levels":[[[[0],1]]],"rejected":[]}"#;
        assert!(serde_json::from_str::<Counts>(short).is_err());
    }

    #[test]
    fn test_serialization_is_canonical() {
        let mut a = Counts::empty(1);
        let mut b = Counts::empty(1);
        for v in 0..20u64 {
            a.add(0, k(&[v]), 1);
            b.add(0, k(&[19 - v]), 1);
        }
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn test_display() {
        let mut c = Counts::trivial(1);
        c.add(1, k(&[2]), 1);
        c.add(1, k(&[1]), 1);
        assert_eq!(c.to_string(), "[{(0,): 1}, {(1,): 1, (2,): 1}]");
    }
}
