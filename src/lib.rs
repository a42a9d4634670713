//! Probabilistic 3D occupancy voxel grid for distributed-particle SLAM
//!
//! The grid ingests stereo range evidence as rays tagged by the particle pose
//! that produced them, answers pose-conditioned occupancy probability
//! queries against an arbitrary pose's ancestry through the particle tree,
//! and grades incoming rays against the existing map with a localisation
//! match score. The particle filter itself — pose tree, resampling, ray
//! geometry production — lives outside this crate; see `contracts`.

#![forbid(unsafe_code)]

/// Ray insertion and pose-conditioned probability query
pub mod algorithm;
/// External collaborator contracts (`Pose`, `Path`, `EvidenceRay`, `SensorModelLookup`)
pub mod contracts;
/// Tunable constants and `GridConfig`
pub mod config;
/// Construction-failure error type
pub mod error;
/// Log-odds arithmetic and vector helpers
pub mod math;
/// Voxel storage: hypothesis arena, per-column cells, the dense grid
pub mod spatial;

pub use error::{GridError, Result};
