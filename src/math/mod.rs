/// Log-odds conversions and the Gaussian cross-section lookup table
pub mod logodds;
/// Minimal millimetre-space vector type for ray geometry
pub mod vec3;
