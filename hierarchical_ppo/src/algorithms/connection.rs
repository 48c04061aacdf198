//! Gradient-connection estimator.
//!
//! Measures how strongly a model's output reacts to one of its inputs: for
//! each sample, the L2 norm of `d sum(output) / d input` divided by the
//! square root of the per-sample input size. A small epsilon inside the
//! square root keeps it differentiable at zero, so an output that ignores the
//! input reports `1e-6 / sqrt(width)` rather than exactly 0.
//!
//! burn has no double-backward, so the differentiable estimator builds the
//! Jacobian-vector products from central differences inside the autodiff
//! graph: every input coordinate is nudged by `±h` for the whole batch at
//! once and the per-sample output sums are differenced. The result stays
//! connected to the model parameters, so a loss built on it backpropagates
//! into them. Each sample's output must depend only on that sample's input.
//!
//! [`exact_gradient_connection`] computes the same quantity from a true
//! backward pass. It is detached from the parameters and serves as the
//! reference value.

use burn::tensor::{
    backend::{AutodiffBackend, Backend},
    Tensor, TensorData,
};

/// Default finite-difference step.
pub const DEFAULT_FD_STEP: f32 = 1e-2;

/// Keeps `sqrt` differentiable at a zero gradient.
const NORM_EPS: f32 = 1e-12;

/// The input never reached the output in the autodiff graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissingInputGradient;

impl std::fmt::Display for MissingInputGradient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "output does not depend on the connection input")
    }
}

impl std::error::Error for MissingInputGradient {}

/// Per-sample sum of a `[batch, ...]` tensor, as `[batch, 1]`.
fn per_sample_sum<B: Backend, const K: usize>(output: Tensor<B, K>) -> Tensor<B, 2> {
    let dims = output.dims();
    let batch = dims[0];
    let width: usize = dims.iter().skip(1).product();
    output.reshape([batch, width]).sum_dim(1)
}

/// Differentiable normalized gradient norm of `forward` w.r.t. `input`.
///
/// `input` is `[batch, ...]`; `forward` maps it to any `[batch, ...]` output.
/// Returns `[batch]`, or [`MissingInputGradient`] when the input has no
/// per-sample elements.
pub fn gradient_connection<B, F, const D: usize, const K: usize>(
    input: Tensor<B, D>,
    forward: F,
    step: f32,
) -> Result<Tensor<B, 1>, MissingInputGradient>
where
    B: Backend,
    F: Fn(Tensor<B, D>) -> Tensor<B, K>,
{
    let dims = input.dims();
    let device = input.device();
    let batch = dims[0];
    let width: usize = dims.iter().skip(1).product();
    if width == 0 {
        return Err(MissingInputGradient);
    }
    let flat = input.reshape([batch, width]);

    let mut columns = Vec::with_capacity(width);
    for j in 0..width {
        let mut nudge = vec![0.0f32; batch * width];
        for row in 0..batch {
            nudge[row * width + j] = step;
        }
        let nudge = Tensor::<B, 2>::from_data(TensorData::new(nudge, [batch, width]), &device);

        let plus = forward((flat.clone() + nudge.clone()).reshape(dims));
        let minus = forward((flat.clone() - nudge).reshape(dims));
        let column = (per_sample_sum(plus) - per_sample_sum(minus)).div_scalar(2.0 * step);
        columns.push(column);
    }

    let jacobian = Tensor::cat(columns, 1);
    Ok(normalized_norm(jacobian, width))
}

/// `[batch, width]` gradient rows to `sqrt(sum g^2) / sqrt(width)` per row.
fn normalized_norm<B: Backend>(grad: Tensor<B, 2>, width: usize) -> Tensor<B, 1> {
    grad.powf_scalar(2.0)
        .sum_dim(1)
        .add_scalar(NORM_EPS)
        .sqrt()
        .div_scalar((width as f32).sqrt())
        .flatten(0, 1)
}

/// Normalized gradient norm from a real backward pass.
///
/// `input` lives on the inner backend; it is lifted, marked as requiring a
/// gradient, pushed through `forward`, and the resulting gradient is read
/// back. Returns `[batch]` on the inner backend.
pub fn exact_gradient_connection<B, F, const D: usize, const K: usize>(
    input: Tensor<B::InnerBackend, D>,
    forward: F,
) -> Result<Tensor<B::InnerBackend, 1>, MissingInputGradient>
where
    B: AutodiffBackend,
    F: Fn(Tensor<B, D>) -> Tensor<B, K>,
{
    let dims = input.dims();
    let batch = dims[0];
    let width: usize = dims.iter().skip(1).product();
    if width == 0 {
        return Err(MissingInputGradient);
    }

    let input = Tensor::<B, D>::from_inner(input).require_grad();
    let output = forward(input.clone());
    let grads = output.sum().backward();
    let grad = input.grad(&grads).ok_or(MissingInputGradient)?;

    Ok(normalized_norm(grad.reshape([batch, width]), width))
}

/// `log(1 + norm)` averaged over the batch and scaled by `coefficient`.
///
/// This is the auxiliary term the optimizer *maximizes*.
pub fn connection_reward<B: Backend>(norm: Tensor<B, 1>, coefficient: f32) -> Tensor<B, 1> {
    norm.log1p().mean().mul_scalar(coefficient)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use burn::module::Module;
    use burn::nn::{Linear, LinearConfig};
    use burn::optim::GradientsParams;
    use burn::tensor::ElementConversion;

    type Inner = NdArray<f32>;
    type AD = Autodiff<Inner>;

    fn values<Bk: Backend>(t: Tensor<Bk, 1>) -> Vec<f32> {
        t.into_data().to_vec().unwrap()
    }

    #[test]
    fn test_sum_of_input_has_unit_connection() {
        let device = Default::default();
        let x = Tensor::<AD, 2>::from_floats([[0.3, -1.0, 2.0, 0.5], [1.0, 1.0, 1.0, 1.0]], &device);

        let approx = values(gradient_connection(x.clone(), |t: Tensor<AD, 2>| t.sum_dim(1), DEFAULT_FD_STEP).unwrap());
        let exact = values(
            exact_gradient_connection::<AD, _, 2, 2>(x.inner(), |t: Tensor<AD, 2>| t.sum_dim(1)).unwrap(),
        );
        for v in approx.iter().chain(exact.iter()) {
            assert!((v - 1.0).abs() < 1e-4, "got {}", v);
        }
    }

    #[test]
    fn test_linear_map_has_known_jacobian() {
        // y = 2 * x0 - 3 * x1  =>  grad = [2, -3], norm / sqrt(2) = sqrt(13 / 2)
        let device = Default::default();
        let x = Tensor::<AD, 2>::from_floats([[1.0, 4.0], [-2.0, 0.0], [0.0, 0.0]], &device);
        let w = Tensor::<AD, 2>::from_floats([[2.0], [-3.0]], &device);
        let expected = (13.0f32 / 2.0).sqrt();

        let approx = values(gradient_connection(x, |t: Tensor<AD, 2>| t.matmul(w.clone()), DEFAULT_FD_STEP).unwrap());
        assert_eq!(approx.len(), 3);
        for v in approx {
            assert!((v - expected).abs() < 1e-3, "got {}", v);
        }
    }

    #[test]
    fn test_quadratic_matches_exact() {
        let device = Default::default();
        let x = Tensor::<AD, 2>::from_floats([[0.5, -0.25, 1.5]], &device);
        let f = |t: Tensor<AD, 2>| t.clone().mul(t).sum_dim(1);

        let approx = values(gradient_connection(x.clone(), f, DEFAULT_FD_STEP).unwrap());
        let exact = values(exact_gradient_connection::<AD, _, 2, 2>(x.inner(), f).unwrap());
        assert!((approx[0] - exact[0]).abs() < 1e-3);
    }

    #[derive(Module, Debug)]
    struct Tiny<B: Backend> {
        linear: Linear<B>,
    }

    #[test]
    fn test_connection_reward_backpropagates_into_parameters() {
        let device = Default::default();
        let tiny = Tiny::<AD> { linear: LinearConfig::new(2, 1).init(&device) };
        let x = Tensor::<AD, 2>::from_floats([[1.0, 0.0], [0.0, 1.0]], &device);

        let norm = gradient_connection(x, |t: Tensor<AD, 2>| tiny.linear.forward(t), DEFAULT_FD_STEP).unwrap();
        let reward = connection_reward(norm, 0.1);
        let value: f32 = reward.clone().into_scalar().elem();
        assert!(value.is_finite() && value > 0.0);

        let grads = GradientsParams::from_grads(reward.backward(), &tiny);
        let weight_grad = grads.get::<Inner, 2>(tiny.linear.weight.id);
        assert!(weight_grad.is_some());
    }

    #[test]
    fn test_constant_output_reports_epsilon_floor() {
        // d(0 * x)/dx = 0 everywhere; the floor is sqrt(1e-12) / sqrt(width)
        let device = Default::default();
        let x = Tensor::<AD, 2>::from_floats([[1.0, 2.0, 3.0, 4.0]], &device);
        let approx = values(gradient_connection(x, |t: Tensor<AD, 2>| t.mul_scalar(0.0).sum_dim(1), DEFAULT_FD_STEP).unwrap());
        assert!((approx[0] - 1e-6 / 2.0).abs() < 1e-7, "got {}", approx[0]);
    }

    #[test]
    fn test_connection_reward_value() {
        let device = Default::default();
        let norm = Tensor::<Inner, 1>::from_floats([0.0, (1.0f32).exp() - 1.0], &device);
        let reward: f32 = connection_reward(norm, 0.5).into_scalar().elem();
        // mean(log1p) = (0 + 1) / 2 = 0.5, times 0.5
        assert!((reward - 0.25).abs() < 1e-6);
    }
}
