/// Pose-conditioned probability query
pub mod query;
/// Sensor-model ray casting: map update and localisation scoring
pub mod ray;
