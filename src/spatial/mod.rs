/// Hypothesis arena and handle type
pub mod hypothesis;
/// Per-voxel column storage
pub mod cell;
/// Dense voxel grid and its public contract
pub mod grid;
