//! Layer context objects bound into the PPO optimizer.
//!
//! A [`ThisLayer`] owns the actor-critic being trained, its rollouts and its
//! arguments. An [`UpperLayer`] owns the shared transition model and the
//! coarser-timescale rollouts it learns from. Both are moved into the
//! optimizer once, at bind time.

use std::marker::PhantomData;

use burn::tensor::backend::AutodiffBackend;

use crate::buffers::RolloutBuffer;
use crate::config::LayerArgs;
use crate::models::{ActorCritic, TransitionModel};

/// The layer whose actor-critic the optimizer updates.
#[derive(Debug, Clone)]
pub struct ThisLayer<B: AutodiffBackend, AC: ActorCritic<B>> {
    pub actor_critic: AC,
    pub rollouts: RolloutBuffer,
    pub args: LayerArgs,
    _backend: PhantomData<B>,
}

impl<B: AutodiffBackend, AC: ActorCritic<B>> ThisLayer<B, AC> {
    pub fn new(actor_critic: AC, rollouts: RolloutBuffer, args: LayerArgs) -> Self {
        Self {
            actor_critic,
            rollouts,
            args,
            _backend: PhantomData,
        }
    }
}

/// The layer above, holding the transition model.
#[derive(Debug, Clone)]
pub struct UpperLayer<B: AutodiffBackend, TM: TransitionModel<B>> {
    pub transition_model: TM,
    pub rollouts: RolloutBuffer,
    /// Cardinality of the upper layer's discrete action space.
    pub action_space_n: usize,
    /// Step of the upper layer's rollout that transition windows end at.
    /// Starts at the rollout cursor; the training loop advances it.
    pub step_i: usize,
    _backend: PhantomData<B>,
}

impl<B: AutodiffBackend, TM: TransitionModel<B>> UpperLayer<B, TM> {
    pub fn new(transition_model: TM, rollouts: RolloutBuffer, action_space_n: usize) -> Self {
        let step_i = rollouts.step();
        Self {
            transition_model,
            rollouts,
            action_space_n,
            step_i,
            _backend: PhantomData,
        }
    }

    pub fn with_step_i(mut self, step_i: usize) -> Self {
        self.step_i = step_i;
        self
    }
}
