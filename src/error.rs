//! Error types for grid construction.
//!
//! The crate's failure taxonomy is intentionally narrow: out-of-bounds ray
//! steps, no-evidence probability queries, and degenerate disparity indices
//! are in-band control flow, not errors (see `GridError`'s doc comment).
//! Construction is the only place that can fail outright.

use std::fmt;

/// Construction-time failure for `Grid::new`.
#[derive(Debug, Clone, PartialEq)]
pub enum GridError {
    /// `cell_mm` was zero or negative.
    InvalidCellSize {
        /// The rejected value.
        cell_mm: f64,
    },
    /// `W` or `H` was zero.
    InvalidDimensions {
        /// Rejected width, in cells.
        width: usize,
        /// Rejected height, in cells.
        height: usize,
    },
    /// `loc_radius_mm` was negative.
    InvalidLocalisationRadius {
        /// The rejected value.
        loc_radius_mm: f64,
    },
    /// `max_map_mm` was negative.
    InvalidMaxMappingRange {
        /// The rejected value.
        max_map_mm: f64,
    },
}

impl fmt::Display for GridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCellSize { cell_mm } => {
                write!(f, "cell_mm must be positive, got {cell_mm}")
            }
            Self::InvalidDimensions { width, height } => {
                write!(f, "grid dimensions must be non-zero, got {width}x{height}")
            }
            Self::InvalidLocalisationRadius { loc_radius_mm } => {
                write!(
                    f,
                    "loc_radius_mm must be non-negative, got {loc_radius_mm}"
                )
            }
            Self::InvalidMaxMappingRange { max_map_mm } => {
                write!(f, "max_map_mm must be non-negative, got {max_map_mm}")
            }
        }
    }
}

impl std::error::Error for GridError {}

/// Convenience alias for fallible grid construction.
pub type Result<T> = std::result::Result<T, GridError>;
