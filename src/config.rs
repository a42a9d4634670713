//! Tunable constants and the bundled construction parameters for `Grid::new`.

use crate::error::{GridError, Result};
use crate::math::vec3::Vec3;

/// Number of samples in the Gaussian half-profile lookup table.
pub const GAUSSIAN_SAMPLES: usize = crate::math::logodds::GAUSSIAN_SAMPLES;

/// Default upper bound on the fraction of the worklist processed by a single
/// `garbage_collect` call when the caller doesn't have a tighter budget in
/// mind. Advisory: `Grid::garbage_collect` is idempotent regardless of the
/// value passed.
pub const DEFAULT_GC_BUDGET_PERCENT: u8 = 100;

/// Construction parameters for `Grid::new`, bundled so callers don't have to
/// thread five positional arguments through.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridConfig {
    /// Grid width, in cells.
    pub width: usize,
    /// Grid height, in cells (the Z extent of each column).
    pub height: usize,
    /// Edge length of one cubic voxel, in millimetres.
    pub cell_mm: f64,
    /// Localisation search radius, in millimetres.
    pub loc_radius_mm: f64,
    /// Maximum mapping range, in millimetres.
    pub max_map_mm: f64,
    /// World-space position of the grid's own centre, in millimetres. Ray
    /// insertion converts incoming world coordinates to cell indices relative
    /// to this point.
    pub origin: Vec3,
}

impl GridConfig {
    /// Validate the configuration, returning the same construction failures
    /// `Grid::new` reports.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(GridError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        if self.cell_mm <= 0.0 {
            return Err(GridError::InvalidCellSize {
                cell_mm: self.cell_mm,
            });
        }
        if self.loc_radius_mm < 0.0 {
            return Err(GridError::InvalidLocalisationRadius {
                loc_radius_mm: self.loc_radius_mm,
            });
        }
        if self.max_map_mm < 0.0 {
            return Err(GridError::InvalidMaxMappingRange {
                max_map_mm: self.max_map_mm,
            });
        }
        Ok(())
    }
}
