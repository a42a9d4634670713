//! Contracts for the external collaborators this crate never implements.
//!
//! The particle-filter / pose-tree (`Pose`, `Path`, resampling), the ray
//! geometry producer, and the pre-tabulated sensor model all live outside
//! this crate. `Pose` and `Path` are expressed as traits so the grid core can
//! be built and tested without depending on a concrete particle filter;
//! `EvidenceRay` and `SensorModelLookup` are plain data the caller hands in.

use crate::math::vec3::Vec3;
use crate::spatial::hypothesis::HypothesisHandle;

/// One step of a particle's ancestry chain.
///
/// A `Path` answers, for a single voxel, the subset of hypotheses *this* path
/// segment wrote there. The probability query sums over `pose.previous_paths()`
/// rather than walking the whole tree, because each path replays only its own
/// contributions.
pub trait Path {
    /// Hypotheses this path wrote at voxel `(x, y, z)`.
    ///
    /// Order is irrelevant; the probability query sums commutatively.
    fn hypotheses_at(&self, x: i32, y: i32, z: i32) -> Vec<HypothesisHandle>;
}

/// A particle hypothesis (robot trajectory candidate).
///
/// Implemented by the external particle filter. `Grid` only ever needs a
/// pose's time step (for the temporal gate), its ancestor chain (for
/// probability queries), and a place to record newly written hypotheses (so
/// resampling can retract them later).
pub trait Pose {
    /// Concrete `Path` type used by this pose's ancestry.
    type Path: Path;

    /// Logical time at which this pose was created.
    ///
    /// Used only as a monotonically increasing gate, never as a wall-clock
    /// value.
    fn time_step(&self) -> i64;

    /// The ancestor chain, one `Path` per generation. Order does not matter.
    fn previous_paths(&self) -> &[Self::Path];

    /// Record ownership of a newly inserted hypothesis.
    ///
    /// Called once per hypothesis written during `Grid::insert`, so that
    /// dropping this pose (on resample) can retract everything it wrote via
    /// `Grid::remove`. `width`/`height` are the grid's cell-space dimensions,
    /// passed through in case the implementation indexes its own write set by
    /// them.
    fn add_hypothesis(&mut self, handle: HypothesisHandle, width: usize, height: usize);
}

/// Stereo range evidence: one occupied region plus the two vacancy wedges
/// back to each camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvidenceRay {
    /// Near and far edges (world mm) of the occupied region.
    pub vertices: [Vec3; 2],
    /// Camera-rig position (world mm) the range measurement was taken from.
    pub observed_from: Vec3,
    /// Cross-section width of the occupied region, in millimetres.
    pub width: f64,
    /// Length of the occupied region, in millimetres.
    pub length: f64,
    /// Stereo disparity in pixels (proxy for inverse depth).
    pub disparity: f64,
    /// Fractional position along the occupied region where the diamond
    /// cross-section peaks, in `[0, 1]`.
    pub fattest_point: f64,
}

/// Pre-tabulated sensor model: `probability[disparity_index][step_index]`.
///
/// Values are expected to lie in `[-1, 1]`; a missing row or column resolves
/// to `0.0` rather than panicking, per the "resolve to zero contributions"
/// rule for anomalous sensor-model lookups.
#[derive(Debug, Clone)]
pub struct SensorModelLookup {
    rows: Vec<Vec<f64>>,
}

impl SensorModelLookup {
    /// Build a lookup table from its rows (indexed by disparity, then step).
    pub const fn new(rows: Vec<Vec<f64>>) -> Self {
        Self { rows }
    }

    /// Number of disparity rows in the table.
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Sample `probability[row][step]`, or `0.0` if either index is out of
    /// range.
    pub fn get(&self, row: usize, step: usize) -> f64 {
        self.rows
            .get(row)
            .and_then(|r| r.get(step))
            .copied()
            .unwrap_or(0.0)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensor_model_lookup_out_of_range_resolves_to_zero() {
        let lookup = SensorModelLookup::new(vec![vec![0.5, 0.25]]);
        assert!((lookup.get(0, 0) - 0.5).abs() < 1e-12);
        assert!((lookup.get(5, 0) - 0.0).abs() < 1e-12);
        assert!((lookup.get(0, 50) - 0.0).abs() < 1e-12);
    }

    #[test]
    fn sensor_model_lookup_num_rows() {
        let lookup = SensorModelLookup::new(vec![vec![0.0], vec![0.0], vec![0.0]]);
        assert_eq!(lookup.num_rows(), 3);
    }
}
