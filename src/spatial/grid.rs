//! Dense voxel grid: fixed-size array of optional `Cell`s, global hypothesis
//! counters, and the deferred-reclamation worklist.

use ndarray::Array2;
use tracing::debug;

use crate::algorithm::query;
use crate::config::GridConfig;
use crate::error::Result;
use crate::math::logodds::gaussian_half_lookup;
use crate::math::vec3::Vec3;
use crate::spatial::cell::Cell;
use crate::spatial::hypothesis::{HypothesisArena, HypothesisHandle};

/// Fixed-size `W x W` array of optional voxel columns plus the bookkeeping
/// `insert`, `remove`, and `garbage_collect` need.
///
/// `(x, y)` range over `[0, width)`; each resident `Cell` has `height`
/// vertical slots for `z`. Cells are created lazily on first write and never
/// destroyed; only their column contents are ever reclaimed.
#[derive(Debug, Clone)]
pub struct Grid {
    cells: Array2<Option<Cell>>,
    arena: HypothesisArena,
    worklist: Vec<(usize, usize)>,
    total_valid_hypotheses: usize,
    total_garbage_hypotheses: usize,
    gaussian: Vec<f64>,
    config: GridConfig,
    localisation_search_cells: f64,
    max_mapping_range_cells: f64,
}

/// Summary of a grid's memory/occupancy state, for the embedding system's
/// diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryStats {
    /// Live (enabled) hypotheses across all cells.
    pub total_valid_hypotheses: usize,
    /// Tombstoned hypotheses still resident, awaiting a sweep.
    pub total_garbage_hypotheses: usize,
    /// Number of cells currently on the reclamation worklist.
    pub dirty_cell_count: usize,
    /// Number of `(x, y)` cells that have ever been written to.
    pub occupied_voxel_count: usize,
}

impl Grid {
    /// Allocate a grid per `config`, deriving the localisation search radius
    /// and maximum mapping range in cells and precomputing the Gaussian
    /// half-profile lookup table.
    ///
    /// # Errors
    ///
    /// Returns `GridError` if `config` fails validation (zero `cell_mm`,
    /// zero dimensions, or a negative radius/range).
    pub fn new(config: GridConfig) -> Result<Self> {
        config.validate()?;

        let cells = Array2::from_elem((config.width, config.width), None);
        let localisation_search_cells = config.loc_radius_mm / config.cell_mm;
        let max_mapping_range_cells = config.max_map_mm / config.cell_mm;
        let gaussian = gaussian_half_lookup(crate::config::GAUSSIAN_SAMPLES);

        Ok(Self {
            cells,
            arena: HypothesisArena::new(),
            worklist: Vec::new(),
            total_valid_hypotheses: 0,
            total_garbage_hypotheses: 0,
            gaussian,
            config,
            localisation_search_cells,
            max_mapping_range_cells,
        })
    }

    /// Horizontal extent `W` of the grid (both `x` and `y` range over
    /// `[0, width)`).
    pub const fn width(&self) -> usize {
        self.config.width
    }

    /// Vertical extent `H` of every column.
    pub const fn height(&self) -> usize {
        self.config.height
    }

    /// Edge length of one cubic voxel, in millimetres.
    pub const fn cell_mm(&self) -> f64 {
        self.config.cell_mm
    }

    /// Localisation search radius, in cells (fractional; ray insertion rounds
    /// as needed).
    pub const fn localisation_search_cells(&self) -> f64 {
        self.localisation_search_cells
    }

    /// Maximum mapping range, in cells (fractional).
    pub const fn max_mapping_range_cells(&self) -> f64 {
        self.max_mapping_range_cells
    }

    /// The precomputed Gaussian half-profile lookup table.
    pub fn gaussian(&self) -> &[f64] {
        &self.gaussian
    }

    /// The hypothesis arena, for probability queries that need to resolve a
    /// handle to its contribution.
    pub const fn arena(&self) -> &HypothesisArena {
        &self.arena
    }

    /// Borrow the cell at `(x, y)`, if it has ever been written to.
    pub fn cell(&self, x: usize, y: usize) -> Option<&Cell> {
        self.cells.get((x, y)).and_then(Option::as_ref)
    }

    /// Whether `(x, y)` lies within the grid's horizontal extent.
    pub const fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.config.width && (y as usize) < self.config.width
    }

    /// Whether `z` lies within the column height.
    pub const fn z_in_bounds(&self, z: i32) -> bool {
        z >= 0 && (z as usize) < self.config.height
    }

    /// World-space position of the grid's own centre, in millimetres.
    pub const fn origin(&self) -> Vec3 {
        self.config.origin
    }

    /// Convert a world-millimetre position to cell indices, relative to the
    /// grid origin `(origin.x - W*cell_mm/2, origin.y - W*cell_mm/2, origin.z)`.
    pub fn to_cell_index(&self, world: Vec3) -> (i32, i32, i32) {
        let half_extent = self.config.width as f64 * self.config.cell_mm / 2.0;
        let origin = self.config.origin;
        let gx = ((world.x - (origin.x - half_extent)) / self.config.cell_mm).round() as i32;
        let gy = ((world.y - (origin.y - half_extent)) / self.config.cell_mm).round() as i32;
        let gz = ((world.z - origin.z) / self.config.cell_mm).round() as i32;
        (gx, gy, gz)
    }

    /// Write a new hypothesis into the cell at `(x, y, z)`, creating the cell
    /// if this is its first write. Returns the handle so the caller can hand
    /// it to the owning pose's write set.
    ///
    /// `p` is already in log-odds form.
    pub(crate) fn insert_hypothesis(
        &mut self,
        x: usize,
        y: usize,
        z: usize,
        p: f64,
        owner_time_step: i64,
    ) -> Option<HypothesisHandle> {
        let height = self.config.height;
        let slot = self.cells.get_mut((x, y))?;
        let cell = slot.get_or_insert_with(|| Cell::new(height));
        let handle = self.arena.alloc(x as i32, y as i32, z as i32, p, owner_time_step);
        cell.add(z, handle);
        self.total_valid_hypotheses += 1;
        Some(handle)
    }

    /// Pose-conditioned probability at a single voxel slot. `None` if the
    /// voxel is out of bounds, never written, or carries no evidence visible
    /// to `pose`.
    pub fn probability<P: crate::contracts::Pose>(
        &self,
        pose: &P,
        x: i32,
        y: i32,
        z: i32,
        return_log_odds: bool,
    ) -> Option<f64> {
        query::probability(self, pose, x, y, z, return_log_odds)
    }

    /// Pose-conditioned probability summed across the whole column at
    /// `(x, y)`. Returns the baseline `0.5` for an out-of-bounds or never
    /// written column.
    pub fn probability_column<P: crate::contracts::Pose>(&self, pose: &P, x: i32, y: i32) -> f64 {
        query::probability_column(self, pose, x, y)
    }

    /// Tombstone a hypothesis. No-op (returns `false`) if the handle is
    /// unknown or already disabled — callers are expected to uphold the
    /// "currently enabled" precondition, but violating it is treated as
    /// harmless rather than a panic.
    pub fn remove(&mut self, handle: HypothesisHandle) -> bool {
        let Some(hyp) = self.arena.get(handle) else {
            return false;
        };
        let (x, y, z) = (hyp.x as usize, hyp.y as usize, hyp.z as usize);

        if !self.arena.disable(handle) {
            return false;
        }

        let Some(Some(cell)) = self.cells.get_mut((x, y)) else {
            return false;
        };
        let was_clean = cell.garbage_entries() == 0;
        cell.mark_garbage(z);
        if was_clean {
            self.worklist.push((x, y));
        }
        self.total_garbage_hypotheses += 1;
        self.total_valid_hypotheses = self.total_valid_hypotheses.saturating_sub(1);
        true
    }

    /// Sweep the worklist tail-to-head, reclaiming tombstoned entries.
    ///
    /// `budget_percent` caps the fraction of the worklist visited this call;
    /// the sweep is idempotent regardless of the value, so a caller that
    /// always passes `100` simply processes the whole list every time.
    /// Returns the number of hypotheses reclaimed.
    pub fn garbage_collect(&mut self, budget_percent: u8) -> usize {
        if self.worklist.is_empty() {
            return 0;
        }

        let budget_percent = budget_percent.min(100);
        let to_visit = ((self.worklist.len() * budget_percent as usize) / 100).max(1);
        let mut reclaimed = 0usize;
        let mut visited = 0usize;

        while visited < to_visit {
            let Some((x, y)) = self.worklist.pop() else {
                break;
            };
            visited += 1;

            if let Some(Some(cell)) = self.cells.get_mut((x, y)) {
                reclaimed += cell.collect_all(&self.arena);
                if cell.garbage_entries() > 0 {
                    self.worklist.push((x, y));
                }
            }
        }

        self.total_garbage_hypotheses = self.total_garbage_hypotheses.saturating_sub(reclaimed);
        debug!(reclaimed, visited, remaining = self.worklist.len(), "garbage_collect swept worklist");
        reclaimed
    }

    /// Sample the grid by nearest neighbour and paint an 8-bit RGB buffer.
    ///
    /// `buf` must be at least `w_px * h_px * 3` bytes; excess capacity is
    /// ignored. Never written cells are white; otherwise the column
    /// probability is bucketed into four shades of grey.
    pub fn probability_image<P: crate::contracts::Pose>(
        &self,
        buf: &mut [u8],
        w_px: usize,
        h_px: usize,
        pose: &P,
    ) {
        let width = self.config.width.max(1);
        for py in 0..h_px {
            for px in 0..w_px {
                let gx = (px * width) / w_px.max(1);
                let gy = (py * width) / h_px.max(1);
                let shade = match self.cell(gx, gy) {
                    None => 255u8,
                    Some(_) => {
                        let p = self.probability_column(pose, gx as i32, gy as i32);
                        if p > 0.7 {
                            0
                        } else if p > 0.5 {
                            100
                        } else if p >= 0.3 {
                            200
                        } else {
                            230
                        }
                    }
                };
                let offset = (py * w_px + px) * 3;
                if let Some(pixel) = buf.get_mut(offset..offset + 3) {
                    pixel.iter_mut().for_each(|channel| *channel = shade);
                }
            }
        }
    }

    /// Number of `(x, y)` cells ever written to.
    pub fn occupied_voxel_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    /// Snapshot of the grid's memory/occupancy counters.
    pub fn memory_stats(&self) -> MemoryStats {
        MemoryStats {
            total_valid_hypotheses: self.total_valid_hypotheses,
            total_garbage_hypotheses: self.total_garbage_hypotheses,
            dirty_cell_count: self.worklist.len(),
            occupied_voxel_count: self.occupied_voxel_count(),
        }
    }
}
