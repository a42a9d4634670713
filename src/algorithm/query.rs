//! Pose-conditioned probability query (spec §4.3): projects a voxel's
//! hypotheses through a pose's ancestor paths into a log-odds sum.

use crate::contracts::Pose;
use crate::math::logodds::log_odds_to_probability;
use crate::spatial::grid::Grid;

/// Probability (or raw log-odds) of a single voxel slot, as seen by `pose`.
///
/// `None` ("no evidence") if `(x, y, z)` is out of bounds, the slot has never
/// been written, or every contributing hypothesis is tombstoned or fails the
/// temporal gate.
pub fn probability<P: Pose>(grid: &Grid, pose: &P, x: i32, y: i32, z: i32, return_log_odds: bool) -> Option<f64> {
    if !grid.in_bounds(x, y) || !grid.z_in_bounds(z) {
        return None;
    }
    grid.cell(x as usize, y as usize)?
        .probability(grid.arena(), pose, x, y, z as usize, return_log_odds)
}

/// Probability of a whole column at `(x, y)`, as seen by `pose`.
///
/// Returns the `0.5` baseline for an out-of-bounds or never-written column,
/// matching `log_odds_to_probability(0.0)`.
pub fn probability_column<P: Pose>(grid: &Grid, pose: &P, x: i32, y: i32) -> f64 {
    if !grid.in_bounds(x, y) {
        return log_odds_to_probability(0.0);
    }
    match grid.cell(x as usize, y as usize) {
        Some(cell) => cell.probability_over_column(grid.arena(), pose, x, y),
        None => log_odds_to_probability(0.0),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::GridConfig;
    use crate::contracts::test_support::FixturePose;
    use crate::math::vec3::Vec3;
    use crate::spatial::grid::Grid;

    fn grid() -> Grid {
        Grid::new(GridConfig {
            width: 8,
            height: 4,
            cell_mm: 50.0,
            loc_radius_mm: 100.0,
            max_map_mm: 10_000.0,
            origin: Vec3::new(0.0, 0.0, 0.0),
        })
        .expect("valid config")
    }

    #[test]
    fn out_of_bounds_query_is_no_evidence() {
        let g = grid();
        let pose = FixturePose::default();
        assert!(probability(&g, &pose, 100, 100, 0, false).is_none());
    }

    #[test]
    fn empty_path_list_gives_baseline_probability() {
        let g = grid();
        let pose = FixturePose::default();
        assert!((probability_column(&g, &pose, 0, 0) - 0.5).abs() < 1e-12);
    }
}
