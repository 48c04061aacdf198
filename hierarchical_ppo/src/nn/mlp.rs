//! Small MLP models implementing the optimizer's model contracts.

use burn::module::Module;
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::orthogonal::{OrthogonalLinear, OrthogonalLinearConfig};
use crate::models::{ActionEvaluation, ActorCritic, Categorical, TransitionModel, TransitionOutput};

const HIDDEN_GAIN: f64 = std::f64::consts::SQRT_2;
const POLICY_GAIN: f64 = 0.01;

/// Configuration for [`MlpActorCritic`].
#[derive(Debug, Clone)]
pub struct MlpActorCriticConfig {
    pub obs_dim: usize,
    pub input_action_dim: usize,
    pub num_actions: usize,
    pub hidden_size: usize,
    pub seed: u64,
}

impl MlpActorCriticConfig {
    pub fn new(obs_dim: usize, input_action_dim: usize, num_actions: usize) -> Self {
        Self {
            obs_dim,
            input_action_dim,
            num_actions,
            hidden_size: 64,
            seed: 0,
        }
    }

    pub fn with_hidden_size(mut self, hidden_size: usize) -> Self {
        self.hidden_size = hidden_size;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> MlpActorCritic<B> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let d_in = self.obs_dim + self.input_action_dim;
        let h = self.hidden_size;
        MlpActorCritic {
            hidden1: OrthogonalLinearConfig::new(d_in, h).with_gain(HIDDEN_GAIN).init(device, &mut rng),
            hidden2: OrthogonalLinearConfig::new(h, h).with_gain(HIDDEN_GAIN).init(device, &mut rng),
            actor: OrthogonalLinearConfig::new(h, self.num_actions)
                .with_gain(POLICY_GAIN)
                .init(device, &mut rng),
            critic: OrthogonalLinearConfig::new(h, 1).init(device, &mut rng),
            num_actions: self.num_actions,
        }
    }
}

/// Two tanh hidden layers over `observation ⊕ input_action`, with separate
/// categorical policy and value heads.
///
/// The model is feed-forward; recurrent state is passed through and zeroed
/// where the mask marks a new episode.
#[derive(Module, Debug)]
pub struct MlpActorCritic<B: Backend> {
    hidden1: OrthogonalLinear<B>,
    hidden2: OrthogonalLinear<B>,
    actor: OrthogonalLinear<B>,
    critic: OrthogonalLinear<B>,
    num_actions: usize,
}

impl<B: Backend> MlpActorCritic<B> {
    fn features(&self, inputs: Tensor<B, 2>, input_action: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = Tensor::cat(vec![inputs, input_action], 1);
        let x = self.hidden1.forward(x).tanh();
        self.hidden2.forward(x).tanh()
    }

    /// Policy logits `[batch, num_actions]` and values `[batch, 1]`.
    pub fn forward(&self, inputs: Tensor<B, 2>, input_action: Tensor<B, 2>) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let h = self.features(inputs, input_action);
        (self.actor.forward(h.clone()), self.critic.forward(h))
    }

    /// Value estimates `[batch, 1]`.
    pub fn value(&self, inputs: Tensor<B, 2>, input_action: Tensor<B, 2>) -> Tensor<B, 2> {
        self.critic.forward(self.features(inputs, input_action))
    }
}

impl<B: AutodiffBackend> ActorCritic<B> for MlpActorCritic<B> {
    fn evaluate_actions(
        &self,
        inputs: Tensor<B, 2>,
        states: Tensor<B, 2>,
        masks: Tensor<B, 2>,
        actions: Tensor<B, 1, Int>,
        input_action: Tensor<B, 2>,
    ) -> ActionEvaluation<B> {
        let (logits, values) = self.forward(inputs, input_action);
        let dist = Categorical::from_logits(logits);
        ActionEvaluation {
            values,
            action_log_probs: dist.log_prob(actions),
            dist_entropy: dist.entropy().mean(),
            states: states * masks,
        }
    }

    fn output_action_space(&self) -> usize {
        self.num_actions
    }
}

/// Configuration for [`MlpTransitionModel`].
#[derive(Debug, Clone)]
pub struct MlpTransitionModelConfig {
    pub obs_dim: usize,
    pub num_actions: usize,
    pub hidden_size: usize,
    pub seed: u64,
}

impl MlpTransitionModelConfig {
    pub fn new(obs_dim: usize, num_actions: usize) -> Self {
        Self {
            obs_dim,
            num_actions,
            hidden_size: 64,
            seed: 0,
        }
    }

    pub fn with_hidden_size(mut self, hidden_size: usize) -> Self {
        self.hidden_size = hidden_size;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> MlpTransitionModel<B> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let h = self.hidden_size;
        MlpTransitionModel {
            encoder: OrthogonalLinearConfig::new(self.obs_dim + self.num_actions, h)
                .with_gain(HIDDEN_GAIN)
                .init(device, &mut rng),
            decoder: OrthogonalLinearConfig::new(h, self.obs_dim).init(device, &mut rng),
            num_actions: self.num_actions,
        }
    }
}

/// Predicts `obs + decoder(tanh(encoder(obs ⊕ action)))`.
#[derive(Module, Debug)]
pub struct MlpTransitionModel<B: Backend> {
    encoder: OrthogonalLinear<B>,
    decoder: OrthogonalLinear<B>,
    num_actions: usize,
}

impl<B: Backend> MlpTransitionModel<B> {
    pub fn predict(&self, inputs: Tensor<B, 2>, input_action: Tensor<B, 2>) -> TransitionOutput<B> {
        let hidden = self
            .encoder
            .forward(Tensor::cat(vec![inputs.clone(), input_action], 1))
            .tanh();
        TransitionOutput {
            predicted_next: inputs + self.decoder.forward(hidden.clone()),
            before_deconv: hidden,
        }
    }
}

impl<B: AutodiffBackend> TransitionModel<B> for MlpTransitionModel<B> {
    fn forward(&self, inputs: Tensor<B, 2>, input_action: Tensor<B, 2>) -> TransitionOutput<B> {
        self.predict(inputs, input_action)
    }

    fn input_action_space(&self) -> usize {
        self.num_actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::one_hot;
    use burn::backend::{Autodiff, NdArray};
    use burn::tensor::{ElementConversion, TensorData};

    type B = Autodiff<NdArray<f32>>;

    fn int_actions(values: &[i64], device: &<B as Backend>::Device) -> Tensor<B, 1, Int> {
        Tensor::from_data(
            TensorData::new(values.to_vec(), [values.len()]).convert::<<B as Backend>::IntElem>(),
            device,
        )
    }

    #[test]
    fn test_actor_critic_shapes() {
        let device = Default::default();
        let model: MlpActorCritic<B> = MlpActorCriticConfig::new(3, 2, 4).with_hidden_size(8).init(&device);
        let eval = model.evaluate_actions(
            Tensor::ones([5, 3], &device),
            Tensor::ones([5, 1], &device),
            Tensor::zeros([5, 1], &device),
            int_actions(&[0, 1, 2, 3, 0], &device),
            Tensor::zeros([5, 2], &device),
        );
        assert_eq!(eval.values.dims(), [5, 1]);
        assert_eq!(eval.action_log_probs.dims(), [5]);
        assert_eq!(eval.dist_entropy.dims(), [1]);
        let states: Vec<f32> = eval.states.into_data().to_vec().unwrap();
        assert!(states.iter().all(|s| *s == 0.0));
        assert_eq!(model.output_action_space(), 4);
    }

    #[test]
    fn test_small_policy_gain_starts_near_uniform() {
        let device = Default::default();
        let model: MlpActorCritic<B> = MlpActorCriticConfig::new(3, 1, 4).init(&device);
        let eval = model.evaluate_actions(
            Tensor::ones([1, 3], &device),
            Tensor::zeros([1, 1], &device),
            Tensor::ones([1, 1], &device),
            int_actions(&[2], &device),
            Tensor::zeros([1, 1], &device),
        );
        let lp: f32 = eval.action_log_probs.into_scalar().elem();
        assert!((lp - (0.25f32).ln()).abs() < 0.05);
    }

    #[test]
    fn test_transition_model_shapes() {
        let device = Default::default();
        let model: MlpTransitionModel<B> = MlpTransitionModelConfig::new(3, 4).with_hidden_size(6).init(&device);
        let action = one_hot::<B>(&[1, 3], 4, &device).unwrap();
        let out = TransitionModel::forward(&model, Tensor::zeros([2, 3], &device), action);
        assert_eq!(out.predicted_next.dims(), [2, 3]);
        assert_eq!(out.before_deconv.dims(), [2, 6]);
        assert_eq!(model.input_action_space(), 4);
    }
}
