//! Log-odds arithmetic and the Gaussian cross-section lookup used to shape ray width.

/// Number of samples in the half-profile Gaussian lookup table.
pub const GAUSSIAN_SAMPLES: usize = 10;

/// Convert a probability in `(0, 1)` to its log-odds representation.
///
/// `log_odds(p) = ln(p / (1 - p))`. Log-odds are additive under independent
/// evidence, which is the entire reason the cell storage accumulates them
/// instead of probabilities directly.
pub fn log_odds(p: f64) -> f64 {
    let p = p.clamp(f64::EPSILON, 1.0 - f64::EPSILON);
    (p / (1.0 - p)).ln()
}

/// Convert a log-odds sum back to a probability via the logistic sigmoid.
///
/// `log_odds_to_probability(l) = 1 / (1 + exp(-l))`.
pub fn log_odds_to_probability(l: f64) -> f64 {
    1.0 / (1.0 + (-l).exp())
}

/// Build a non-increasing half-profile Gaussian lookup of `n` samples.
///
/// Sample `i` holds `exp(-t * t)` with `t = i / n`, so index `0` is always
/// `1.0` and the table decays towards (but never quite reaches) zero at the
/// last index. Used to shape the lateral cross-section of a ray: the index
/// `|w| * (n - 1) / width` saturates at `n - 1` for any `w` at or beyond the
/// profile's width.
///
/// # Panics
///
/// Panics if `n == 0`.
pub fn gaussian_half_lookup(n: usize) -> Vec<f64> {
    assert!(n > 0, "gaussian_half_lookup requires at least one sample");

    (0..n)
        .map(|i| {
            let t = i as f64 / n as f64;
            (-(t * t)).exp()
        })
        .collect()
}

/// Sample the half-profile table at a saturating lateral offset index.
///
/// `offset` and `width` are both expressed in cells; the returned index is
/// `offset * (table.len() - 1) / width`, clamped into the table's range so a
/// lateral offset at or beyond `width` always reads the table's last
/// (smallest) entry rather than panicking or wrapping.
pub fn sample_half_profile(table: &[f64], offset: i32, width: i32) -> f64 {
    if table.is_empty() || width <= 0 {
        return 0.0;
    }

    let last = table.len() - 1;
    let idx = (offset.unsigned_abs() as usize) * last / width.unsigned_abs() as usize;
    let idx = idx.min(last);

    table.get(idx).copied().unwrap_or(0.0)
}
