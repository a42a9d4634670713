//! Sensor-model ray casting (spec §4.4): three traversal components
//! (OCCUPIED, VACANT_LEFT, VACANT_RIGHT) walked along a discretised 3D line,
//! simultaneously updating the map and accumulating a localisation match
//! score.

use tracing::{trace, warn};

use crate::contracts::{EvidenceRay, Pose, SensorModelLookup};
use crate::math::logodds::{log_odds, sample_half_profile};
use crate::math::vec3::{Axis, Vec3};
use crate::spatial::grid::Grid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ComponentKind {
    Occupied,
    Vacant,
}

struct ComponentGeometry {
    origin: Vec3,
    delta_per_step: Vec3,
    steps: usize,
    longest_axis: Axis,
    widest_point: f64,
}

/// Walk the three sensor-model components of `ray`, writing new hypotheses
/// into `grid` and accumulating a localisation match score against the
/// existing map, all under `pose`.
///
/// Returns the accumulated match score (sum of log-odds contributions).
pub fn insert<P: Pose>(
    grid: &mut Grid,
    ray: &EvidenceRay,
    pose: &mut P,
    sensor_model: &SensorModelLookup,
    left_cam: Vec3,
    right_cam: Vec3,
) -> f64 {
    let v0 = ray.vertices[0];
    let v1 = ray.vertices[1];
    let occupied_delta = v1.sub(v0);
    let occupied_longest_axis = if occupied_delta.x.abs() >= occupied_delta.y.abs() {
        Axis::X
    } else {
        Axis::Y
    };

    let raw_idx = (ray.disparity * 2.0).round() as i64;
    let small_disparity = raw_idx < 2;
    let last_row = sensor_model.num_rows().saturating_sub(1) as i64;
    let idx = raw_idx.max(2).min(last_row.max(0)).max(0) as usize;

    let starting_range = {
        let axis_delta = match occupied_longest_axis {
            Axis::X => v0.x - ray.observed_from.x,
            Axis::Y => v0.y - ray.observed_from.y,
            Axis::Z => 0.0,
        };
        axis_delta.abs() / grid.cell_mm()
    };

    let ray_width_cells = (ray.width / (2.0 * grid.cell_mm())).round() as i32;

    // Source quirk, preserved: the y component is derived from the x delta,
    // not the y delta (see DESIGN.md).
    let intersect = Vec3::new(
        v0.x + ray.fattest_point * occupied_delta.x,
        v0.y + ray.fattest_point * occupied_delta.x,
        v0.z + ray.fattest_point * occupied_delta.z,
    );

    let occupied_steps = (occupied_delta.x.abs().max(occupied_delta.y.abs()) / grid.cell_mm())
        .round()
        .max(1.0) as usize;
    let occupied_geometry = ComponentGeometry {
        origin: v0,
        delta_per_step: occupied_delta.scale(1.0 / occupied_steps as f64),
        steps: occupied_steps,
        longest_axis: occupied_longest_axis,
        widest_point: ray.fattest_point * occupied_steps as f64 / ray.length.max(f64::EPSILON),
    };

    let mut match_score = 0.0;

    trace!(steps = occupied_geometry.steps, "ray component occupied");
    let (contribution, aborted) = process_component(
        grid,
        pose,
        Some(sensor_model),
        idx,
        ComponentKind::Occupied,
        &occupied_geometry,
        ray_width_cells,
        small_disparity,
        starting_range,
    );
    match_score += contribution;
    if aborted {
        warn!("ray left the mappable band during the occupied component");
        return match_score;
    }

    for (cam, label) in [(left_cam, "vacant_left"), (right_cam, "vacant_right")] {
        let geometry = vacancy_geometry(cam, intersect, ray.width, grid.cell_mm());
        trace!(steps = geometry.steps, component = label, "ray component vacancy");
        let (contribution, aborted) = process_component(
            grid,
            pose,
            None,
            idx,
            ComponentKind::Vacant,
            &geometry,
            ray_width_cells,
            small_disparity,
            starting_range,
        );
        match_score += contribution;
        if aborted {
            warn!(component = label, "ray left the mappable band during a vacancy component");
            return match_score;
        }
    }

    match_score
}

fn vacancy_geometry(cam: Vec3, intersect: Vec3, shorten_by_mm: f64, cell_mm: f64) -> ComponentGeometry {
    let delta = intersect.sub(cam);
    let magnitude = (delta.x * delta.x + delta.y * delta.y + delta.z * delta.z).sqrt();
    let shortened = (magnitude - shorten_by_mm).max(0.0);
    let factor = if magnitude > 0.0 { shortened / magnitude } else { 0.0 };
    let scaled = delta.scale(factor);
    let longest_axis = if scaled.x.abs() >= scaled.y.abs() { Axis::X } else { Axis::Y };
    let steps = (scaled.x.abs().max(scaled.y.abs()) / cell_mm).round().max(1.0) as usize;
    ComponentGeometry {
        origin: cam,
        delta_per_step: scaled.scale(1.0 / steps as f64),
        steps,
        longest_axis,
        widest_point: steps as f64,
    }
}

/// Diamond cross-section width, in cells, at step `s` of `steps`.
fn diamond_width(s: usize, steps: usize, ray_width_cells: i32, widest_point: f64, small_disparity: bool) -> i32 {
    let s_f = s as f64;
    let width = if s_f < widest_point {
        (s_f * ray_width_cells as f64) / widest_point.max(f64::EPSILON)
    } else if small_disparity {
        ray_width_cells as f64
    } else {
        let denom = (steps as f64 - widest_point).max(f64::EPSILON);
        ((steps as f64 - s_f + widest_point) * ray_width_cells as f64) / denom
    };
    width.round().max(0.0) as i32
}

fn process_component<P: Pose>(
    grid: &mut Grid,
    pose: &mut P,
    sensor_model: Option<&SensorModelLookup>,
    idx: usize,
    kind: ComponentKind,
    geometry: &ComponentGeometry,
    ray_width_cells: i32,
    small_disparity: bool,
    starting_range: f64,
) -> (f64, bool) {
    let mut local_match = 0.0;
    let mut pos = geometry.origin;
    let lateral_axis = geometry.longest_axis.perpendicular_horizontal();
    let width_grid = grid.width() as i32;

    for s in 0..geometry.steps {
        pos = pos.add(geometry.delta_per_step);
        let (gx, gy, gz) = grid.to_cell_index(pos);

        let width = diamond_width(s, geometry.steps, ray_width_cells, geometry.widest_point, small_disparity);
        let loc_width = ((width as f64) + grid.localisation_search_cells()).round().max(0.0) as i32;

        let centre_in_band =
            gx >= loc_width && gx < width_grid - loc_width && gy >= loc_width && gy < width_grid - loc_width;
        if !centre_in_band || !grid.z_in_bounds(gz) {
            return (local_match, true);
        }

        let within_mapping_range = (s as f64 + starting_range) <= grid.max_mapping_range_cells();

        let centre_prob = match kind {
            ComponentKind::Occupied => {
                let lookup_val = sensor_model.map_or(0.0, |sm| sm.get(idx, s));
                0.5 + lookup_val / 2.0
            }
            ComponentKind::Vacant => {
                let frac = s as f64 / geometry.steps as f64;
                let v = 0.1 + 0.9 * (-(frac * frac)).exp();
                0.5 - (v / geometry.steps as f64)
            }
        };

        for w in -loc_width..=loc_width {
            let (x2, y2) = match lateral_axis {
                Axis::X => (gx + w, gy),
                Axis::Y | Axis::Z => (gx, gy + w),
            };
            if !grid.in_bounds(x2, y2) {
                continue;
            }

            let inside_mapping = w.abs() <= width;
            let gaussian = grid.gaussian();
            let prob = if w != 0 && inside_mapping {
                centre_prob * sample_half_profile(gaussian, w, width.max(1))
            } else {
                centre_prob
            };
            let prob_loc = if w != 0 {
                centre_prob * sample_half_profile(gaussian, w, loc_width.max(1))
            } else {
                centre_prob
            };

            if kind == ComponentKind::Occupied && grid.cell(x2 as usize, y2 as usize).is_some() {
                local_match += matching(grid, pose, x2, y2, gz, prob_loc);
            }

            if inside_mapping && within_mapping_range {
                let p_log_odds = log_odds(prob.clamp(0.0, 1.0));
                let time_step = pose.time_step();
                if let Some(handle) =
                    grid.insert_hypothesis(x2 as usize, y2 as usize, gz as usize, p_log_odds, time_step)
                {
                    pose.add_hypothesis(handle, grid.width(), grid.height());
                }
            }
        }
    }

    (local_match, false)
}

/// Agreement between a ray-derived probability `p_ray` and the map's
/// existing probability at `(x, y, z)` under `pose`.
///
/// Contributes `0.0` ("no evidence") when the voxel has never been written.
fn matching<P: Pose>(grid: &Grid, pose: &P, x: i32, y: i32, z: i32, p_ray: f64) -> f64 {
    match grid.probability(pose, x, y, z, false) {
        None => 0.0,
        Some(p_map) => log_odds((p_ray * p_map + (1.0 - p_ray) * (1.0 - p_map)).clamp(f64::EPSILON, 1.0 - f64::EPSILON)),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::GridConfig;
    use crate::contracts::test_support::FixturePose;

    fn grid() -> Grid {
        Grid::new(GridConfig {
            width: 32,
            height: 32,
            cell_mm: 50.0,
            loc_radius_mm: 100.0,
            max_map_mm: 10_000.0,
            origin: Vec3::new(0.0, 0.0, 0.0),
        })
        .expect("valid config")
    }

    fn sensor_model() -> SensorModelLookup {
        let rows = (0..16).map(|_| vec![0.6; 200]).collect();
        SensorModelLookup::new(rows)
    }

    #[test]
    fn insert_on_empty_grid_produces_zero_match_score() {
        let mut grid = grid();
        let mut pose = FixturePose::default();
        let ray = EvidenceRay {
            vertices: [Vec3::new(500.0, 0.0, 0.0), Vec3::new(700.0, 0.0, 0.0)],
            observed_from: Vec3::new(0.0, 0.0, 0.0),
            width: 50.0,
            length: 200.0,
            disparity: 4.0,
            fattest_point: 0.5,
        };
        let score = insert(
            &mut grid,
            &ray,
            &mut pose,
            &sensor_model(),
            Vec3::new(-30.0, 0.0, 0.0),
            Vec3::new(30.0, 0.0, 0.0),
        );
        assert!((score).abs() < 1e-9);
        assert!(grid.memory_stats().total_valid_hypotheses > 0);
    }

    #[test]
    fn small_disparity_sets_infinite_tail_width() {
        let width = diamond_width(199, 200, 5, 10.0, true);
        assert_eq!(width, 5);
    }

    #[test]
    fn non_small_disparity_tapers_after_widest_point() {
        let near_end = diamond_width(199, 200, 5, 10.0, false);
        assert!(near_end < 5);
    }

    #[test]
    fn beyond_max_mapping_range_no_hypotheses_are_written() {
        let mut grid = Grid::new(GridConfig {
            width: 32,
            height: 32,
            cell_mm: 50.0,
            loc_radius_mm: 100.0,
            max_map_mm: 1.0,
            origin: Vec3::new(0.0, 0.0, 0.0),
        })
        .expect("valid config");
        let mut pose = FixturePose::default();
        let ray = EvidenceRay {
            vertices: [Vec3::new(500.0, 0.0, 0.0), Vec3::new(700.0, 0.0, 0.0)],
            observed_from: Vec3::new(0.0, 0.0, 0.0),
            width: 50.0,
            length: 200.0,
            disparity: 4.0,
            fattest_point: 0.5,
        };
        insert(
            &mut grid,
            &ray,
            &mut pose,
            &sensor_model(),
            Vec3::new(-30.0, 0.0, 0.0),
            Vec3::new(30.0, 0.0, 0.0),
        );

        assert_eq!(grid.memory_stats().total_valid_hypotheses, 0);
    }

    #[test]
    fn ray_width_is_symmetric_about_centreline() {
        let mut grid = grid();
        let mut pose = FixturePose::default();
        let ray = EvidenceRay {
            vertices: [Vec3::new(500.0, 0.0, 0.0), Vec3::new(700.0, 0.0, 0.0)],
            observed_from: Vec3::new(0.0, 0.0, 0.0),
            width: 100.0,
            length: 200.0,
            disparity: 6.0,
            fattest_point: 0.5,
        };
        insert(
            &mut grid,
            &ray,
            &mut pose,
            &sensor_model(),
            Vec3::new(-30.0, 0.0, 0.0),
            Vec3::new(30.0, 0.0, 0.0),
        );

        let (cx, cy, _) = grid.to_cell_index(Vec3::new(600.0, 0.0, 0.0));
        let mut found_symmetric_pair = false;
        for offset in 1..6usize {
            let below = cy as usize >= offset && grid.cell(cx as usize, cy as usize - offset).is_some();
            let above = grid.cell(cx as usize, cy as usize + offset).is_some();
            if below && above {
                found_symmetric_pair = true;
                break;
            }
        }
        assert!(found_symmetric_pair, "expected at least one symmetric (y-offset) written pair");
    }
}
