//! Model contracts driven by the PPO optimizer.
//!
//! Both models are opaque trainable modules: the optimizer only needs their
//! parameters (through [`AutodiffModule`]) and a differentiable forward pass.
//!
//! - [`ActorCritic`]: policy + value head with action evaluation
//! - [`TransitionModel`]: `(observation, one-hot action) -> next observation`

mod categorical;

pub use categorical::Categorical;

use burn::module::AutodiffModule;
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::{Int, Tensor};

/// Output of [`ActorCritic::evaluate_actions`].
#[derive(Debug, Clone)]
pub struct ActionEvaluation<B: Backend> {
    /// [batch, 1]
    pub values: Tensor<B, 2>,
    /// Log-probability of the taken actions: [batch]
    pub action_log_probs: Tensor<B, 1>,
    /// Mean policy entropy over the batch: [1]
    pub dist_entropy: Tensor<B, 1>,
    /// Updated recurrent state: [batch, state_size]
    pub states: Tensor<B, 2>,
}

/// Actor-critic model trained by the PPO branch.
pub trait ActorCritic<B: AutodiffBackend>: AutodiffModule<B> + Clone {
    /// Re-evaluate stored actions under the current parameters.
    ///
    /// - `inputs`: [batch, obs_dim]
    /// - `states`: [batch, state_size]
    /// - `masks`: [batch, 1], `0.0` resets the recurrent state
    /// - `actions`: [batch]
    /// - `input_action`: [batch, input_action_dim], the auxiliary action input
    fn evaluate_actions(
        &self,
        inputs: Tensor<B, 2>,
        states: Tensor<B, 2>,
        masks: Tensor<B, 2>,
        actions: Tensor<B, 1, Int>,
        input_action: Tensor<B, 2>,
    ) -> ActionEvaluation<B>;

    /// Number of discrete actions the policy chooses between. Stored actions
    /// at or above this bound are rejected before an update.
    fn output_action_space(&self) -> usize;
}

/// Output of [`TransitionModel::forward`].
#[derive(Debug, Clone)]
pub struct TransitionOutput<B: Backend> {
    /// [batch, obs_dim]
    pub predicted_next: Tensor<B, 2>,
    /// Last hidden activation before the output projection.
    pub before_deconv: Tensor<B, 2>,
}

/// Forward-dynamics model trained by the transition branch.
pub trait TransitionModel<B: AutodiffBackend>: AutodiffModule<B> + Clone {
    /// `inputs`: [batch, obs_dim], `input_action`: [batch, num_actions] (one-hot).
    fn forward(&self, inputs: Tensor<B, 2>, input_action: Tensor<B, 2>) -> TransitionOutput<B>;

    /// Width of the one-hot action input the model was built for.
    fn input_action_space(&self) -> usize;
}
