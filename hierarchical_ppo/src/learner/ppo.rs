//! PPO optimizer for a two-level layer hierarchy.
//!
//! One `update` call runs every epoch of one of two branches:
//!
//! - **actor-critic**: clipped-surrogate PPO over this layer's rollouts, with
//!   global gradient-norm clipping before each Adam step;
//! - **transition model**: one-step prediction error over a recent window of
//!   the upper layer's rollouts, skipping transitions that cross an episode
//!   boundary. This branch is not gradient-clipped.
//!
//! When the connection term is enabled for the active branch, the
//! normalized sensitivity of the model output to its action input is turned
//! into a reward that is *maximized* alongside the primary loss. Both terms
//! are folded into one objective (`primary - reward`) so a single backward
//! pass yields the summed gradients before the one optimizer step.

use burn::optim::adaptor::OptimizerAdaptor;
use burn::optim::{Adam, AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::{ElementConversion, Tensor};
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::error::TrainError;
use super::losses::{ActorCriticLosses, TransitionModelLosses, UpdateLosses};
use crate::algorithms::{
    clip_global_norm, clipped_surrogate_loss, connection_reward, gradient_connection, mse_loss,
    one_hot, standardize_advantages, DEFAULT_FD_STEP,
};
use crate::config::UpdateType;
use crate::hierarchy::{ThisLayer, UpperLayer};
use crate::models::{ActorCritic, TransitionModel};

/// Adam state for a module `M`.
pub type AdamOptimizer<M, B> = OptimizerAdaptor<Adam, M, B>;

/// Primary loss plus an optional reward to maximize with it.
struct Objective<B: AutodiffBackend> {
    primary: Tensor<B, 1>,
    reward: Option<Tensor<B, 1>>,
}

impl<B: AutodiffBackend> Objective<B> {
    fn reward_value(&self) -> Option<f32> {
        self.reward.as_ref().map(|r| scalar(r.clone()))
    }

    /// Gradients of `primary - reward`.
    fn backward(self) -> B::Gradients {
        match self.reward {
            Some(reward) => (self.primary - reward).backward(),
            None => self.primary.backward(),
        }
    }
}

fn scalar<B: AutodiffBackend>(t: Tensor<B, 1>) -> f32 {
    t.into_scalar().elem::<f32>()
}

/// PPO optimizer bound to a [`ThisLayer`] and optionally an [`UpperLayer`].
pub struct PPO<B, AC, TM>
where
    B: AutodiffBackend,
    AC: ActorCritic<B>,
    TM: TransitionModel<B>,
{
    this_layer: Option<ThisLayer<B, AC>>,
    actor_critic_optimizer: Option<AdamOptimizer<AC, B>>,
    upper_layer: Option<UpperLayer<B, TM>>,
    transition_model_optimizer: Option<AdamOptimizer<TM, B>>,
    rng: StdRng,
    device: B::Device,
    num_updates: u64,
}

impl<B, AC, TM> PPO<B, AC, TM>
where
    B: AutodiffBackend,
    AC: ActorCritic<B>,
    TM: TransitionModel<B>,
{
    pub fn new(device: B::Device) -> Self {
        Self {
            this_layer: None,
            actor_critic_optimizer: None,
            upper_layer: None,
            transition_model_optimizer: None,
            rng: StdRng::from_entropy(),
            device,
            num_updates: 0,
        }
    }

    /// Attach the layer whose actor-critic is trained and create its Adam
    /// state. A seed in the layer's arguments makes mini-batch shuffles
    /// reproducible.
    pub fn bind_this_layer(&mut self, layer: ThisLayer<B, AC>) -> Result<(), TrainError> {
        if self.this_layer.is_some() {
            return Err(TrainError::AlreadyBound("this layer"));
        }
        layer.args.validate()?;
        if layer
            .args
            .encourage_ac_connection
            .applies_to(UpdateType::ActorCritic)
            && layer.rollouts.input_action_dim() == 0
        {
            return Err(TrainError::ShapeMismatch {
                field: "input_action_dim",
                expected: 1,
                actual: 0,
            });
        }

        let optimizer = AdamConfig::new()
            .with_epsilon(layer.args.eps)
            .init::<B, AC>();
        if let Some(seed) = layer.args.seed {
            self.rng = StdRng::seed_from_u64(seed);
        }

        log::debug!(
            "bound this layer: {} steps x {} processes, connection {}",
            layer.rollouts.num_steps(),
            layer.rollouts.num_processes(),
            layer.args.encourage_ac_connection
        );
        self.actor_critic_optimizer = Some(optimizer);
        self.this_layer = Some(layer);
        Ok(())
    }

    /// Attach the layer holding the transition model and create its Adam
    /// state with this layer's `transition_model_betas`.
    ///
    /// This layer must be bound first, and `action_space_n` must match the
    /// model's one-hot input width.
    pub fn bind_upper_layer(&mut self, layer: UpperLayer<B, TM>) -> Result<(), TrainError> {
        if self.upper_layer.is_some() {
            return Err(TrainError::AlreadyBound("upper layer"));
        }
        let this = self.this_layer.as_ref().ok_or(TrainError::ThisLayerNotBound)?;
        let expected = layer.transition_model.input_action_space();
        if layer.action_space_n != expected {
            return Err(TrainError::ShapeMismatch {
                field: "action_space_n",
                expected,
                actual: layer.action_space_n,
            });
        }

        let (beta_1, beta_2) = this.args.transition_model_betas;
        let optimizer = AdamConfig::new()
            .with_beta_1(beta_1)
            .with_beta_2(beta_2)
            .init::<B, TM>();

        self.transition_model_optimizer = Some(optimizer);
        self.upper_layer = Some(layer);
        Ok(())
    }

    pub fn this_layer(&self) -> Option<&ThisLayer<B, AC>> {
        self.this_layer.as_ref()
    }

    pub fn this_layer_mut(&mut self) -> Option<&mut ThisLayer<B, AC>> {
        self.this_layer.as_mut()
    }

    pub fn upper_layer(&self) -> Option<&UpperLayer<B, TM>> {
        self.upper_layer.as_ref()
    }

    pub fn upper_layer_mut(&mut self) -> Option<&mut UpperLayer<B, TM>> {
        self.upper_layer.as_mut()
    }

    /// Number of completed `update` calls.
    pub fn num_updates(&self) -> u64 {
        self.num_updates
    }

    /// Run all epochs of one branch and return the summed losses.
    ///
    /// A failure aborts the remaining mini-batches and epochs; updates
    /// already applied are kept.
    pub fn update(&mut self, update_type: UpdateType) -> Result<UpdateLosses, TrainError> {
        let losses = match update_type {
            UpdateType::ActorCritic => UpdateLosses::ActorCritic(self.update_actor_critic()?),
            UpdateType::TransitionModel => {
                UpdateLosses::TransitionModel(self.update_transition_model()?)
            }
        };
        self.num_updates += 1;
        log::debug!("update {} ({}): {:?}", self.num_updates, update_type, losses.entries());
        Ok(losses)
    }

    /// Parse `update_type` and run [`PPO::update`].
    pub fn update_named(&mut self, update_type: &str) -> Result<UpdateLosses, TrainError> {
        let update_type: UpdateType = update_type.parse()?;
        self.update(update_type)
    }

    fn update_actor_critic(&mut self) -> Result<ActorCriticLosses, TrainError> {
        let layer = self.this_layer.as_mut().ok_or(TrainError::ThisLayerNotBound)?;
        let optimizer = self
            .actor_critic_optimizer
            .as_mut()
            .ok_or(TrainError::ThisLayerNotBound)?;
        let args = layer.args.clone();

        if layer.rollouts.is_empty() {
            return Err(TrainError::EmptyRollout);
        }
        let num_classes = layer.actor_critic.output_action_space();
        if let Some(&action) = layer.rollouts.actions.iter().find(|&&a| a as usize >= num_classes) {
            return Err(TrainError::ActionOutOfRange { action, num_classes });
        }

        let advantages = standardize_advantages(&layer.rollouts.advantages());
        let connect = args.encourage_ac_connection.applies_to(UpdateType::ActorCritic);

        let mut losses = ActorCriticLosses {
            gradients_reward: connect.then_some(0.0),
            ..Default::default()
        };

        for _ in 0..args.ppo_epoch {
            let generator = layer.rollouts.feed_forward_generator(
                advantages.clone(),
                args.actor_critic_mini_batch_size,
                &mut self.rng,
            )?;

            for batch in generator {
                let t = batch.to_tensors::<B>(&self.device);
                let model = layer.actor_critic.clone();

                let eval = model.evaluate_actions(
                    t.observations.clone(),
                    t.states.clone(),
                    t.masks.clone(),
                    t.actions.clone(),
                    t.input_actions.clone(),
                );

                let value_loss = mse_loss(eval.values.flatten(0, 1), t.returns);
                let action_loss = clipped_surrogate_loss(
                    eval.action_log_probs,
                    t.old_action_log_probs,
                    t.advantages,
                    args.clip_param,
                );
                let primary = value_loss.clone().mul_scalar(args.value_loss_coef)
                    + action_loss.clone()
                    - eval.dist_entropy.clone().mul_scalar(args.entropy_coef);

                let reward = connect
                    .then(|| {
                        gradient_connection(
                            t.input_actions,
                            |input_action| {
                                model
                                    .evaluate_actions(
                                        t.observations.clone(),
                                        t.states.clone(),
                                        t.masks.clone(),
                                        t.actions.clone(),
                                        input_action,
                                    )
                                    .values
                            },
                            DEFAULT_FD_STEP,
                        )
                        .map(|norm| connection_reward(norm, args.encourage_ac_connection_coefficient))
                    })
                    .transpose()?;

                let objective = Objective { primary, reward };
                if let (Some(sum), Some(r)) = (losses.gradients_reward.as_mut(), objective.reward_value()) {
                    *sum += r;
                }

                let grads = GradientsParams::from_grads(objective.backward(), &model);
                let (grads, grad_norm) = clip_global_norm::<B, AC>(&model, grads, args.max_grad_norm);
                layer.actor_critic = optimizer.step(args.lr, model, grads);

                losses.value += scalar(value_loss);
                losses.action += scalar(action_loss);
                losses.dist_entropy += scalar(eval.dist_entropy);
                losses.max_grad_norm = losses.max_grad_norm.max(grad_norm);
                losses.num_mini_batches += 1;
            }
        }

        Ok(losses)
    }

    fn update_transition_model(&mut self) -> Result<TransitionModelLosses, TrainError> {
        let this = self.this_layer.as_ref().ok_or(TrainError::ThisLayerNotBound)?;
        let upper = self.upper_layer.as_mut().ok_or(TrainError::UpperLayerNotBound)?;
        let optimizer = self
            .transition_model_optimizer
            .as_mut()
            .ok_or(TrainError::UpperLayerNotBound)?;
        let args = &this.args;

        let recent_steps = args.recent_steps(this.rollouts.num_steps());
        let recent_at = upper.step_i;
        let connect = args
            .encourage_ac_connection
            .applies_to(UpdateType::TransitionModel);

        let mut losses = TransitionModelLosses {
            gradients_reward: connect.then_some(0.0),
            ..Default::default()
        };

        for _ in 0..args.transition_model_epoch {
            let generator = upper.rollouts.transition_model_feed_forward_generator(
                args.transition_model_mini_batch_size,
                recent_steps,
                recent_at,
                &mut self.rng,
            )?;

            for batch in generator {
                let batch = batch.filter_valid();
                if batch.is_empty() {
                    log::warn!("transition mini-batch has only boundary transitions; skipped");
                    losses.skipped_mini_batches += 1;
                    continue;
                }

                let observations = batch.observations_tensor::<B>(&self.device);
                let targets = batch.next_observations_tensor::<B>(&self.device);
                let actions = one_hot::<B>(&batch.actions, upper.action_space_n, &self.device)?;
                let model = upper.transition_model.clone();

                let output = model.forward(observations.clone(), actions.clone());
                let mse = mse_loss(output.predicted_next, targets);

                let reward = connect
                    .then(|| {
                        gradient_connection(
                            actions,
                            |action| model.forward(observations.clone(), action).predicted_next,
                            DEFAULT_FD_STEP,
                        )
                        .map(|norm| connection_reward(norm, args.encourage_ac_connection_coefficient))
                    })
                    .transpose()?;

                let objective = Objective { primary: mse.clone(), reward };
                if let (Some(sum), Some(r)) = (losses.gradients_reward.as_mut(), objective.reward_value()) {
                    *sum += r;
                }

                let grads = GradientsParams::from_grads(objective.backward(), &model);
                upper.transition_model = optimizer.step(args.transition_model_lr, model, grads);

                losses.mse += scalar(mse);
                losses.num_mini_batches += 1;
            }
        }

        Ok(losses)
    }
}
