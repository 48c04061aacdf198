use burn::tensor::activation::log_softmax;
use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};

/// Categorical distribution over the last dimension of `[batch, n]` logits.
#[derive(Debug, Clone)]
pub struct Categorical<B: Backend> {
    log_probs: Tensor<B, 2>,
}

impl<B: Backend> Categorical<B> {
    pub fn from_logits(logits: Tensor<B, 2>) -> Self {
        Self {
            log_probs: log_softmax(logits, 1),
        }
    }

    pub fn num_actions(&self) -> usize {
        self.log_probs.dims()[1]
    }

    /// `[batch, n]` normalized log-probabilities.
    pub fn log_probs(&self) -> Tensor<B, 2> {
        self.log_probs.clone()
    }

    /// Log-probability of `actions`: `[batch]`.
    pub fn log_prob(&self, actions: Tensor<B, 1, Int>) -> Tensor<B, 1> {
        let [batch] = actions.dims();
        self.log_probs
            .clone()
            .gather(1, actions.reshape([batch, 1]))
            .flatten(0, 1)
    }

    /// Per-sample entropy `-sum p log p`: `[batch]`.
    pub fn entropy(&self) -> Tensor<B, 1> {
        let p = self.log_probs.clone().exp();
        -(p * self.log_probs.clone()).sum_dim(1).flatten(0, 1)
    }
}
