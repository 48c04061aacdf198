//! Linear layer with orthogonal weight initialization.
//!
//! Weights are drawn from a standard normal and orthonormalized with
//! Gram-Schmidt on the host, then scaled by `gain`:
//!
//! - 1.0 for linear outputs (value heads)
//! - 0.01 for policy logits
//! - sqrt(2) for hidden layers
//!
//! Drawing from a caller-supplied RNG keeps initialization reproducible
//! under a fixed seed.

use burn::module::{Module, Param};
use burn::prelude::*;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

/// Configuration for [`OrthogonalLinear`].
#[derive(Debug, Clone)]
pub struct OrthogonalLinearConfig {
    pub d_input: usize,
    pub d_output: usize,
    /// Scale applied to the orthonormal matrix.
    pub gain: f64,
    pub bias: bool,
}

impl OrthogonalLinearConfig {
    pub fn new(d_input: usize, d_output: usize) -> Self {
        Self {
            d_input,
            d_output,
            gain: 1.0,
            bias: true,
        }
    }

    pub fn with_gain(mut self, gain: f64) -> Self {
        self.gain = gain;
        self
    }

    pub fn with_bias(mut self, bias: bool) -> Self {
        self.bias = bias;
        self
    }

    /// Initialize with weights drawn from `rng`. Bias starts at zero.
    pub fn init<B: Backend, R: Rng + ?Sized>(&self, device: &B::Device, rng: &mut R) -> OrthogonalLinear<B> {
        let rows = orthogonal_rows(self.d_output, self.d_input, self.gain, rng);
        let weight = Tensor::from_data(TensorData::new(rows, [self.d_output, self.d_input]), device);

        let bias = self
            .bias
            .then(|| Param::from_tensor(Tensor::zeros([self.d_output], device)));

        OrthogonalLinear {
            weight: Param::from_tensor(weight),
            bias,
        }
    }
}

/// `y = x W^T + b` with orthogonally initialized `W`.
#[derive(Module, Debug)]
pub struct OrthogonalLinear<B: Backend> {
    /// [d_output, d_input]
    pub weight: Param<Tensor<B, 2>>,
    /// [d_output]
    pub bias: Option<Param<Tensor<B, 1>>>,
}

impl<B: Backend> OrthogonalLinear<B> {
    /// `[batch, d_input] -> [batch, d_output]`
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let output = input.matmul(self.weight.val().transpose());
        match &self.bias {
            Some(bias) => output + bias.val().unsqueeze_dim(0),
            None => output,
        }
    }

    pub fn d_input(&self) -> usize {
        self.weight.val().dims()[1]
    }

    pub fn d_output(&self) -> usize {
        self.weight.val().dims()[0]
    }
}

/// Row-major `[rows, cols]` matrix with orthonormal rows (wide / square) or
/// orthonormal columns (tall), scaled by `gain`.
pub fn orthogonal_rows<R: Rng + ?Sized>(rows: usize, cols: usize, gain: f64, rng: &mut R) -> Vec<f32> {
    // Orthonormalize the shorter side as a set of long vectors.
    let (count, len) = if rows <= cols { (rows, cols) } else { (cols, rows) };
    let mut vectors: Vec<Vec<f64>> = (0..count)
        .map(|_| (0..len).map(|_| standard_normal(rng)).collect())
        .collect();
    gram_schmidt(&mut vectors, rng);

    let mut out = vec![0.0f32; rows * cols];
    for (i, v) in vectors.iter().enumerate() {
        for (j, x) in v.iter().enumerate() {
            let (r, c) = if rows <= cols { (i, j) } else { (j, i) };
            out[r * cols + c] = (x * gain) as f32;
        }
    }
    out
}

fn gram_schmidt<R: Rng + ?Sized>(vectors: &mut [Vec<f64>], rng: &mut R) {
    for i in 0..vectors.len() {
        loop {
            let (done, rest) = vectors.split_at_mut(i);
            let v = &mut rest[0];
            for u in done.iter() {
                let proj: f64 = v.iter().zip(u).map(|(a, b)| a * b).sum();
                v.iter_mut().zip(u).for_each(|(a, b)| *a -= proj * b);
            }
            let norm = v.iter().map(|a| a * a).sum::<f64>().sqrt();
            if norm > 1e-10 {
                v.iter_mut().for_each(|a| *a /= norm);
                break;
            }
            // Linearly dependent draw; resample.
            v.iter_mut().for_each(|a| *a = standard_normal(rng));
        }
    }
}

fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    StandardNormal.sample(rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    type TestBackend = NdArray<f32>;

    fn gram(m: &[f32], rows: usize, cols: usize, by_rows: bool) -> Vec<f32> {
        let n = if by_rows { rows } else { cols };
        let at = |i: usize, k: usize| if by_rows { m[i * cols + k] } else { m[k * cols + i] };
        let len = if by_rows { cols } else { rows };
        let mut g = vec![0.0; n * n];
        for i in 0..n {
            for j in 0..n {
                g[i * n + j] = (0..len).map(|k| at(i, k) * at(j, k)).sum();
            }
        }
        g
    }

    fn assert_identity(g: &[f32], n: usize) {
        for i in 0..n {
            for j in 0..n {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((g[i * n + j] - expected).abs() < 1e-4, "gram[{},{}] = {}", i, j, g[i * n + j]);
            }
        }
    }

    #[test]
    fn test_normal_draws_have_unit_moments() {
        let mut rng = StdRng::seed_from_u64(5);
        let n = 20_000;
        let draws: Vec<f64> = (0..n).map(|_| standard_normal(&mut rng)).collect();
        let mean = draws.iter().sum::<f64>() / n as f64;
        let var = draws.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        assert!(mean.abs() < 0.05, "mean {}", mean);
        assert!((var - 1.0).abs() < 0.05, "variance {}", var);
    }

    #[test]
    fn test_square_is_orthonormal() {
        let mut rng = StdRng::seed_from_u64(0);
        let m = orthogonal_rows(4, 4, 1.0, &mut rng);
        assert_identity(&gram(&m, 4, 4, true), 4);
    }

    #[test]
    fn test_tall_has_orthonormal_columns() {
        let mut rng = StdRng::seed_from_u64(1);
        let m = orthogonal_rows(8, 3, 1.0, &mut rng);
        assert_identity(&gram(&m, 8, 3, false), 3);
    }

    #[test]
    fn test_wide_has_orthonormal_rows() {
        let mut rng = StdRng::seed_from_u64(2);
        let m = orthogonal_rows(3, 8, 1.0, &mut rng);
        assert_identity(&gram(&m, 3, 8, true), 3);
    }

    #[test]
    fn test_gain_scales_norm() {
        let mut rng = StdRng::seed_from_u64(3);
        let m = orthogonal_rows(2, 5, 0.01, &mut rng);
        let row_norm: f32 = m[..5].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((row_norm - 0.01).abs() < 1e-6);
    }

    #[test]
    fn test_same_seed_same_layer() {
        let device = Default::default();
        let config = OrthogonalLinearConfig::new(4, 3);
        let a: OrthogonalLinear<TestBackend> = config.init(&device, &mut StdRng::seed_from_u64(9));
        let b: OrthogonalLinear<TestBackend> = config.init(&device, &mut StdRng::seed_from_u64(9));
        let wa: Vec<f32> = a.weight.val().into_data().to_vec().unwrap();
        let wb: Vec<f32> = b.weight.val().into_data().to_vec().unwrap();
        assert_eq!(wa, wb);
        assert_eq!((a.d_input(), a.d_output()), (4, 3));
    }

    #[test]
    fn test_forward_shape_and_no_bias() {
        let device = Default::default();
        let layer: OrthogonalLinear<TestBackend> = OrthogonalLinearConfig::new(4, 3)
            .with_bias(false)
            .init(&device, &mut StdRng::seed_from_u64(4));
        assert!(layer.bias.is_none());
        let out = layer.forward(Tensor::ones([2, 4], &device));
        assert_eq!(out.dims(), [2, 3]);
    }
}
