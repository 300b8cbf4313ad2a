//! Fault enumeration inside a leaf.
//!
//! A leaf is a flat list of physical locations over named blocks. Every
//! fault is injected right after its location and pushed through the rest
//! of the list; what remains on the output blocks is reduced to a key.
//!
//! Propagation and key extraction are both linear, so the work is done per
//! error *part*: for each location operand, the X part and the Z part are
//! propagated once, and a fault's key is the XOR of the keys of its parts.
//! Each fault-bearing location then becomes a two-level table (no fault,
//! one fault) and the leaf's counts are the XOR convolution of those tables.

use crate::block::Block;
use crate::convolve::{Combine, convolve};
use crate::dispatch::WorkerPool;
use crate::error::{CountError, FtResult};
use crate::key::{Key, KeyGenerator};
use crate::result::{Count, Counts};
use ftcount_circuit::{Axis, Location, LocationKind, Locations, NoiseModels};
use tracing::{debug, instrument};

/// One qubit operand resolved to block position and qubit index.
#[derive(Debug, Clone, Copy)]
struct Operand {
    block: usize,
    bit: u64,
}

/// Per-block error as X and Z bit-planes.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Frame(Vec<(u64, u64)>);

impl Frame {
    fn clear(width: usize) -> Self {
        Frame(vec![(0, 0); width])
    }

    fn flip(&mut self, op: Operand, x: bool, z: bool) {
        let (ex, ez) = &mut self.0[op.block];
        if x {
            *ex ^= op.bit;
        }
        if z {
            *ez ^= op.bit;
        }
    }

    fn get(&self, op: Operand) -> (bool, bool) {
        let (ex, ez) = self.0[op.block];
        (ex & op.bit != 0, ez & op.bit != 0)
    }

    fn clear_bits(&mut self, op: Operand, x: bool, z: bool) {
        let (ex, ez) = &mut self.0[op.block];
        if x {
            *ex &= !op.bit;
        }
        if z {
            *ez &= !op.bit;
        }
    }

    /// Noiseless action of one location.
    fn step(&mut self, kind: LocationKind, ops: &[Operand]) {
        match (kind, ops) {
            (LocationKind::PrepX | LocationKind::PrepZ, [q]) => self.clear_bits(*q, true, true),
            (LocationKind::MeasZ, [q]) => self.clear_bits(*q, false, true),
            (LocationKind::MeasX, [q]) => self.clear_bits(*q, true, false),
            (LocationKind::Cnot, [ctrl, targ]) => {
                let (cx, _) = self.get(*ctrl);
                self.flip(*targ, cx, false);
                let (_, tz) = self.get(*targ);
                self.flip(*ctrl, false, tz);
            }
            _ => {}
        }
    }

    fn key(&self, generators: &[KeyGenerator]) -> Key {
        Key::from(
            self.0
                .iter()
                .zip(generators)
                .map(|((x, z), g)| g.key_of_bits(*x, *z))
                .collect::<Vec<u64>>(),
        )
    }
}

/// Locations resolved against an ordered block list.
#[derive(Debug)]
pub(crate) struct ResolvedLeaf {
    steps: Vec<(LocationKind, Vec<Operand>)>,
    generators: Vec<KeyGenerator>,
}

impl ResolvedLeaf {
    /// Resolve `locations` against `blocks`, matching operands by block name.
    pub(crate) fn new(component: &str, locations: &Locations, blocks: &[Block]) -> FtResult<Self> {
        let layout: Vec<(String, usize)> = blocks
            .iter()
            .map(|b| (b.name().to_string(), b.len()))
            .collect();
        locations.validate_layout(&layout)?;
        let mut steps = Vec::with_capacity(locations.len());
        for location in locations {
            steps.push((location.kind(), resolve(component, location, blocks)?));
        }
        let generators = blocks.iter().map(KeyGenerator::for_block).collect();
        Ok(Self { steps, generators })
    }

    fn width(&self) -> usize {
        self.generators.len()
    }

    /// Key of each error part of location `i`, indexed `[operand][x, z]`.
    fn part_keys(&self, i: usize) -> Vec<[Key; 2]> {
        let (_, ops) = &self.steps[i];
        ops.iter()
            .map(|op| {
                [(true, false), (false, true)].map(|(x, z)| {
                    let mut frame = Frame::clear(self.width());
                    frame.flip(*op, x, z);
                    for (kind, later) in &self.steps[i + 1..] {
                        frame.step(*kind, later);
                    }
                    frame.key(&self.generators)
                })
            })
            .collect()
    }

    /// Zero- and one-fault table of location `i`, or `None` when the
    /// location cannot fail on `axis`.
    fn location_table(&self, i: usize, noise: &NoiseModels, axis: Axis) -> FtResult<Option<Counts>> {
        let (kind, _) = &self.steps[i];
        let faults = noise.faults(axis, *kind)?;
        if faults.is_empty() {
            return Ok(None);
        }
        let parts = self.part_keys(i);
        let zero = Key::zeros(self.width());
        let mut table = Counts::trivial(self.width());
        for fault in faults {
            let mut key = zero.clone();
            for (j, part) in parts.iter().enumerate() {
                let (x, z) = fault.error.get(j)?.parts();
                if x {
                    key = key.xor(&part[0]);
                }
                if z {
                    key = key.xor(&part[1]);
                }
            }
            table.add(1, key, Count::from(fault.weight));
        }
        Ok(Some(table))
    }
}

fn resolve(component: &str, location: &Location, blocks: &[Block]) -> FtResult<Vec<Operand>> {
    location
        .qubits()
        .iter()
        .map(|q| {
            let block = blocks
                .iter()
                .position(|b| b.name() == q.block)
                .ok_or_else(|| {
                    CountError::config(component, "resolve locations", format!("unknown block {}", q.block))
                })?;
            Ok(Operand {
                block,
                bit: 1u64 << q.index,
            })
        })
        .collect()
}

/// Count the faults of a leaf's own locations up to order `k_max`.
///
/// Keys are over `blocks`, in order. Per-location tables are built and
/// convolved in chunks on `pool`.
#[instrument(skip(pool, locations, blocks, noise), fields(leaf = locations.name(), n = locations.len()))]
pub(crate) fn leaf_counts(
    pool: &WorkerPool,
    component: &str,
    locations: &Locations,
    blocks: &[Block],
    noise: &NoiseModels,
    axis: Axis,
    k_max: usize,
) -> FtResult<Counts> {
    let leaf = ResolvedLeaf::new(component, locations, blocks)?;
    let indices: Vec<usize> = (0..locations.len()).collect();
    let chunk = pool.chunk_size(indices.len());
    let counts = pool.map_reduce(
        &indices,
        chunk,
        |chunk| {
            let mut acc = Counts::trivial(leaf.width());
            for &i in chunk {
                if let Some(table) = leaf.location_table(i, noise, axis)? {
                    acc = convolve(&acc, &table, Some(k_max), Combine::Xor)?;
                }
            }
            Ok(acc)
        },
        |a, b| convolve(&a, &b, Some(k_max), Combine::Xor),
    )?;
    let counts = counts.unwrap_or_else(|| Counts::trivial(leaf.width()));
    debug!(k_max = counts.k_max(), "Counted leaf");
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ftcount_qec::catalog;

    fn trivial(name: &str) -> Block {
        Block::new(name, catalog::trivial())
    }

    #[test]
    fn test_cnot_propagation() {
        let mut frame = Frame::clear(2);
        let ctrl = Operand { block: 0, bit: 1 };
        let targ = Operand { block: 1, bit: 1 };
        frame.flip(ctrl, true, false);
        frame.flip(targ, false, true);
        frame.step(LocationKind::Cnot, &[ctrl, targ]);
        assert_eq!(frame, Frame(vec![(1, 1), (1, 1)]));
    }

    #[test]
    fn test_measurement_and_prep_propagation() {
        let q = Operand { block: 0, bit: 1 };
        let mut frame = Frame::clear(1);
        frame.flip(q, true, true);
        frame.step(LocationKind::MeasZ, &[q]);
        assert_eq!(frame, Frame(vec![(1, 0)]));
        frame.step(LocationKind::PrepX, &[q]);
        assert_eq!(frame, Frame(vec![(0, 0)]));
    }

    #[test]
    fn test_fault_before_cnot_spreads() {
        let locations = Locations::new(
            "spread",
            vec![
                Location::rest("a", 0),
                Location::cnot("a", 0, "b", 0).unwrap(),
            ],
        );
        let blocks = vec![trivial("a"), trivial("b")];
        let counts = leaf_counts(
            &WorkerPool::serial(),
            "spread",
            &locations,
            &blocks,
            &NoiseModels::counting(),
            Axis::X,
            1,
        )
        .unwrap();
        // rest fault X on a spreads to b; cnot faults IX, XI, XX
        assert_eq!(counts.get(1, &Key::from([1, 1])), 2);
        assert_eq!(counts.get(1, &Key::from([0, 1])), 1);
        assert_eq!(counts.get(1, &Key::from([1, 0])), 1);
        assert_eq!(counts.total(1), 4);
    }

    #[test]
    fn test_unknown_block_is_rejected() {
        let locations = Locations::new("bad", vec![Location::rest("missing", 0)]);
        let err = leaf_counts(
            &WorkerPool::serial(),
            "bad",
            &locations,
            &[trivial("a")],
            &NoiseModels::counting(),
            Axis::X,
            1,
        )
        .unwrap_err();
        assert!(matches!(err, CountError::Circuit(_)));
    }

    #[test]
    fn test_threaded_matches_serial() {
        let list = (0..7)
            .map(|i| Location::rest("s", i))
            .chain((0..7).map(|i| Location::meas_x("s", i)))
            .collect::<Vec<_>>();
        let locations = Locations::new("steane-rest", list);
        let blocks = vec![Block::new("s", catalog::steane().unwrap())];
        let noise = NoiseModels::counting();
        let serial = leaf_counts(&WorkerPool::serial(), "s", &locations, &blocks, &noise, Axis::Y, 3).unwrap();
        let pool = WorkerPool::threaded(4).unwrap();
        let threaded = leaf_counts(&pool, "s", &locations, &blocks, &noise, Axis::Y, 3).unwrap();
        assert_eq!(serial, threaded);
        // 7 rests with 3 outcomes and 7 measurements with 1 outcome
        assert_eq!(serial.total(1), 7 * 3 + 7);
    }
}
