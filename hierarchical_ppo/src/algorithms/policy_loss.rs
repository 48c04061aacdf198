//! PPO loss terms.
//!
//! Tensor versions are generic over any backend so they can run inside the
//! autodiff graph; scalar versions operate on host slices and are used to
//! hand-check the tensor code.
//!
//! The ratio is `exp(log_prob - old_log_prob)` without clamping; overflow
//! and NaN propagate to the caller.

use burn::tensor::{backend::Backend, Tensor};

/// Negative mean of the clipped surrogate objective.
///
/// ```text
/// ratio = exp(log_prob - old_log_prob)
/// L     = -mean(min(ratio * A, clip(ratio, 1 - ε, 1 + ε) * A))
/// ```
///
/// All inputs are `[batch]`; the result is a single-element tensor.
pub fn clipped_surrogate_loss<B: Backend>(
    log_probs: Tensor<B, 1>,
    old_log_probs: Tensor<B, 1>,
    advantages: Tensor<B, 1>,
    clip_param: f32,
) -> Tensor<B, 1> {
    let ratio = (log_probs - old_log_probs).exp();
    let clipped = ratio.clone().clamp(1.0 - clip_param, 1.0 + clip_param);

    let surr1 = ratio * advantages.clone();
    let surr2 = clipped * advantages;

    -surr1.min_pair(surr2).mean()
}

/// Mean squared error over every element.
pub fn mse_loss<B: Backend, const D: usize>(
    prediction: Tensor<B, D>,
    target: Tensor<B, D>,
) -> Tensor<B, 1> {
    (prediction - target).powf_scalar(2.0).mean()
}

/// Per-sample clipped surrogate term `min(ratio * A, clip(ratio) * A)`.
pub fn clipped_surrogate_scalar(ratio: f32, advantage: f32, clip_param: f32) -> f32 {
    let surr1 = ratio * advantage;
    let surr2 = ratio.clamp(1.0 - clip_param, 1.0 + clip_param) * advantage;
    surr1.min(surr2)
}

/// Host-side counterpart of [`clipped_surrogate_loss`].
pub fn clipped_surrogate_loss_scalar(
    log_probs: &[f32],
    old_log_probs: &[f32],
    advantages: &[f32],
    clip_param: f32,
) -> f32 {
    let n = log_probs.len();
    debug_assert_eq!(old_log_probs.len(), n);
    debug_assert_eq!(advantages.len(), n);
    if n == 0 {
        return 0.0;
    }

    let total: f32 = log_probs
        .iter()
        .zip(old_log_probs)
        .zip(advantages)
        .map(|((lp, old), adv)| {
            let ratio = (lp - old).exp();
            clipped_surrogate_scalar(ratio, *adv, clip_param)
        })
        .sum();

    -total / n as f32
}

/// Host-side counterpart of [`mse_loss`].
pub fn mse_loss_scalar(prediction: &[f32], target: &[f32]) -> f32 {
    let n = prediction.len();
    debug_assert_eq!(target.len(), n);
    if n == 0 {
        return 0.0;
    }
    let sum: f32 = prediction
        .iter()
        .zip(target)
        .map(|(p, t)| (p - t).powi(2))
        .sum();
    sum / n as f32
}
