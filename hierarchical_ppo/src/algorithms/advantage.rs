//! Advantage standardization.

/// Offset added to the standard deviation before dividing.
pub const ADVANTAGE_EPS: f32 = 1e-5;

/// Standardize advantages: `(a - mean) / (std + 1e-5)`.
///
/// `std` is the unbiased (n - 1) sample deviation; with fewer than two
/// samples it is taken as zero, so a single advantage becomes `0.0`.
/// Non-finite inputs are not filtered and propagate into the output.
pub fn standardize_advantages(advantages: &[f32]) -> Vec<f32> {
    let n = advantages.len();
    if n == 0 {
        log::warn!("standardizing an empty advantage batch");
        return Vec::new();
    }

    let mean = advantages.iter().sum::<f32>() / n as f32;
    let std = if n < 2 {
        0.0
    } else {
        let ss: f32 = advantages.iter().map(|a| (a - mean).powi(2)).sum();
        (ss / (n - 1) as f32).sqrt()
    };

    let denom = std + ADVANTAGE_EPS;
    advantages.iter().map(|a| (a - mean) / denom).collect()
}
