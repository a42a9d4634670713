//! Per-voxel column: ordered hypothesis lists keyed by vertical index, plus
//! the garbage bookkeeping a single cell needs to support deferred sweeping.

use crate::contracts::Pose;
use crate::math::logodds::log_odds_to_probability;
use crate::spatial::hypothesis::{HypothesisArena, HypothesisHandle};

/// One `(x, y)` voxel column of height `H`.
///
/// Each vertical slot is `None` until first written, then holds an
/// append-only list of hypothesis handles. A slot that loses all of its
/// entries during a sweep is released back to `None` rather than left as an
/// empty `Vec`, per the memory-reclamation invariant.
#[derive(Debug, Clone)]
pub struct Cell {
    slots: Vec<Option<Vec<HypothesisHandle>>>,
    dirty: Vec<bool>,
    garbage_entries: usize,
}

impl Cell {
    /// Create an empty column of the given vertical height.
    pub fn new(height: usize) -> Self {
        Self {
            slots: vec![None; height],
            dirty: vec![false; height],
            garbage_entries: 0,
        }
    }

    /// Append a hypothesis handle to the slot at `z`, creating the list if
    /// this is the first write to that slot. Out-of-range `z` is a no-op: the
    /// grid is responsible for keeping `z` within the column's height.
    pub fn add(&mut self, z: usize, handle: HypothesisHandle) {
        if let Some(slot) = self.slots.get_mut(z) {
            slot.get_or_insert_with(Vec::new).push(handle);
        }
    }

    /// Pose-conditioned log-odds (or probability) at a single vertical slot.
    ///
    /// Returns `None` ("no evidence") if the slot has never been written, or
    /// if every hypothesis an ancestor path contributed is either tombstoned
    /// or fails the temporal gate `pose.time_step() > hypothesis.owner_time_step`.
    /// The temporal gate keeps a pose from reinforcing itself with rays it
    /// just deposited.
    pub fn probability<P: Pose>(
        &self,
        arena: &HypothesisArena,
        pose: &P,
        x: i32,
        y: i32,
        z: usize,
        return_log_odds: bool,
    ) -> Option<f64> {
        let slot_has_evidence = self.slots.get(z).is_some_and(Option::is_some);
        if !slot_has_evidence {
            return None;
        }

        let mut sum = 0.0;
        let mut hits = 0usize;
        for path in pose.previous_paths() {
            for handle in path.hypotheses_at(x, y, z as i32) {
                if let Some(h) = arena.get(handle) {
                    if h.enabled && pose.time_step() > h.owner_time_step {
                        sum += h.p;
                        hits += 1;
                    }
                }
            }
        }

        if hits == 0 {
            return None;
        }
        Some(if return_log_odds {
            sum
        } else {
            log_odds_to_probability(sum)
        })
    }

    /// Pose-conditioned probability summed across every vertical slot that
    /// carries evidence.
    ///
    /// Slots without evidence contribute nothing. The per-slot log-odds are
    /// summed raw and converted to a probability once at the end, treating
    /// independent vertical observations as independent log-odds evidence —
    /// an approximation, not an exact marginal.
    pub fn probability_over_column<P: Pose>(&self, arena: &HypothesisArena, pose: &P, x: i32, y: i32) -> f64 {
        let mut total = 0.0;
        for z in 0..self.slots.len() {
            if let Some(log_odds) = self.probability(arena, pose, x, y, z, true) {
                total += log_odds;
            }
        }
        log_odds_to_probability(total)
    }

    /// Mark the slot at `z` as holding at least one freshly tombstoned entry.
    ///
    /// Called by `Grid::remove`. Increments the column-wide garbage counter
    /// unconditionally; the caller is responsible for pushing this cell onto
    /// the grid's worklist exactly once (gated on the counter being zero
    /// beforehand).
    pub fn mark_garbage(&mut self, z: usize) {
        if let Some(d) = self.dirty.get_mut(z) {
            *d = true;
        }
        self.garbage_entries += 1;
    }

    /// Number of disabled-but-resident hypotheses in this column.
    pub fn garbage_entries(&self) -> usize {
        self.garbage_entries
    }

    /// Sweep a single dirty slot, removing tombstoned entries tail-first.
    ///
    /// Stops early once the column's garbage counter reaches zero — later
    /// dirty slots, if any, are left for a later call. Releases the slot back
    /// to `None` if it ends up empty. Returns the number of entries removed.
    pub fn collect(&mut self, z: usize, arena: &HypothesisArena) -> usize {
        if !self.dirty.get(z).copied().unwrap_or(false) {
            return 0;
        }

        let mut removed = 0usize;
        if let Some(Some(list)) = self.slots.get_mut(z) {
            let mut i = list.len();
            while i > 0 && self.garbage_entries > 0 {
                i -= 1;
                let disabled = list
                    .get(i)
                    .copied()
                    .and_then(|h| arena.get(h))
                    .is_some_and(|hyp| !hyp.enabled);
                if disabled {
                    list.remove(i);
                    removed += 1;
                    self.garbage_entries -= 1;
                }
            }
        }

        if let Some(slot) = self.slots.get_mut(z) {
            if slot.as_ref().is_some_and(Vec::is_empty) {
                *slot = None;
            }
        }
        if let Some(d) = self.dirty.get_mut(z) {
            *d = false;
        }
        removed
    }

    /// Sweep every dirty slot in this column. Short-circuits as soon as the
    /// garbage counter reaches zero.
    pub fn collect_all(&mut self, arena: &HypothesisArena) -> usize {
        let mut total = 0usize;
        for z in 0..self.dirty.len() {
            if self.garbage_entries == 0 {
                break;
            }
            if self.dirty.get(z).copied().unwrap_or(false) {
                total += self.collect(z, arena);
            }
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::Path;

    struct FixturePath {
        entries: Vec<(i32, i32, i32, HypothesisHandle)>,
    }

    impl Path for FixturePath {
        fn hypotheses_at(&self, x: i32, y: i32, z: i32) -> Vec<HypothesisHandle> {
            self.entries
                .iter()
                .filter(|(ex, ey, ez, _)| *ex == x && *ey == y && *ez == z)
                .map(|(.., h)| *h)
                .collect()
        }
    }

    struct FixturePose {
        time_step: i64,
        paths: Vec<FixturePath>,
    }

    impl Pose for FixturePose {
        type Path = FixturePath;

        fn time_step(&self) -> i64 {
            self.time_step
        }

        fn previous_paths(&self) -> &[Self::Path] {
            &self.paths
        }

        fn add_hypothesis(&mut self, _handle: HypothesisHandle, _width: usize, _height: usize) {}
    }

    #[test]
    fn empty_slot_is_no_evidence() {
        let cell = Cell::new(4);
        let arena = HypothesisArena::new();
        let pose = FixturePose {
            time_step: 10,
            paths: vec![],
        };
        assert!(cell.probability(&arena, &pose, 0, 0, 0, false).is_none());
    }

    #[test]
    fn written_slot_with_no_paths_is_no_evidence() {
        let mut cell = Cell::new(4);
        let mut arena = HypothesisArena::new();
        let h = arena.alloc(0, 0, 0, 0.5, 0);
        cell.add(0, h);
        let pose = FixturePose {
            time_step: 10,
            paths: vec![],
        };
        assert!(cell.probability(&arena, &pose, 0, 0, 0, false).is_none());
    }

    #[test]
    fn temporal_gate_excludes_same_time_step() {
        let mut cell = Cell::new(4);
        let mut arena = HypothesisArena::new();
        let h = arena.alloc(0, 0, 0, 1.0, 5);
        cell.add(0, h);
        let pose = FixturePose {
            time_step: 5,
            paths: vec![FixturePath {
                entries: vec![(0, 0, 0, h)],
            }],
        };
        assert!(cell.probability(&arena, &pose, 0, 0, 0, false).is_none());
    }

    #[test]
    fn later_pose_sees_contribution() {
        let mut cell = Cell::new(4);
        let mut arena = HypothesisArena::new();
        let h = arena.alloc(0, 0, 0, 1.0, 5);
        cell.add(0, h);
        let pose = FixturePose {
            time_step: 6,
            paths: vec![FixturePath {
                entries: vec![(0, 0, 0, h)],
            }],
        };
        let p = cell.probability(&arena, &pose, 0, 0, 0, false);
        assert!(p.is_some_and(|v| v > 0.5));
    }

    #[test]
    fn collect_removes_disabled_and_releases_empty_slot() {
        let mut cell = Cell::new(2);
        let mut arena = HypothesisArena::new();
        let h = arena.alloc(0, 0, 0, 1.0, 0);
        cell.add(0, h);
        arena.disable(h);
        cell.mark_garbage(0);
        assert_eq!(cell.garbage_entries(), 1);
        let removed = cell.collect(0, &arena);
        assert_eq!(removed, 1);
        assert_eq!(cell.garbage_entries(), 0);
        assert!(cell.probability(&arena, &FixturePose { time_step: 1, paths: vec![] }, 0, 0, 0, false).is_none());
    }

    #[test]
    fn collect_all_stops_once_garbage_is_zero() {
        let mut cell = Cell::new(3);
        let mut arena = HypothesisArena::new();
        let a = arena.alloc(0, 0, 0, 1.0, 0);
        let b = arena.alloc(0, 0, 1, 1.0, 0);
        cell.add(0, a);
        cell.add(1, b);
        arena.disable(a);
        arena.disable(b);
        cell.mark_garbage(0);
        cell.mark_garbage(1);
        let removed = cell.collect_all(&arena);
        assert_eq!(removed, 2);
        assert_eq!(cell.garbage_entries(), 0);
    }
}
