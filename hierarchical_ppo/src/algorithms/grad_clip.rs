//! Global gradient-norm clipping.
//!
//! Adam's built-in clipping in burn acts per parameter tensor. The
//! actor-critic update needs the norm taken over *all* parameters jointly,
//! so the gradients are walked with a [`ModuleVisitor`] and rescaled in place.

use burn::module::{AutodiffModule, ModuleVisitor, ParamId};
use burn::optim::GradientsParams;
use burn::tensor::{backend::AutodiffBackend, ElementConversion, Tensor};

struct SquaredNorm<'a> {
    grads: &'a GradientsParams,
    total: f64,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for SquaredNorm<'_> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.get::<B::InnerBackend, D>(id) {
            let sq: f32 = grad.powf_scalar(2.0).sum().into_scalar().elem();
            self.total += sq as f64;
        }
    }
}

struct Rescale<'a> {
    grads: &'a mut GradientsParams,
    scale: f32,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for Rescale<'_> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.remove::<B::InnerBackend, D>(id) {
            self.grads.register(id, grad.mul_scalar(self.scale));
        }
    }
}

/// L2 norm of all gradients belonging to `module`.
pub fn global_grad_norm<B, M>(module: &M, grads: &GradientsParams) -> f32
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let mut visitor = SquaredNorm { grads, total: 0.0 };
    module.visit(&mut visitor);
    visitor.total.sqrt() as f32
}

/// Rescale `grads` so their global norm is at most `max_norm`.
///
/// Returns the norm measured before clipping. A non-finite norm leaves the
/// gradients untouched.
pub fn clip_global_norm<B, M>(module: &M, mut grads: GradientsParams, max_norm: f32) -> (GradientsParams, f32)
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let norm = global_grad_norm::<B, M>(module, &grads);
    if norm.is_finite() && norm > max_norm {
        let scale = max_norm / (norm + 1e-6);
        let mut visitor = Rescale { grads: &mut grads, scale };
        module.visit(&mut visitor);
    }
    (grads, norm)
}
