//! Fixed-length on-policy rollout storage.
//!
//! The buffer holds `num_steps + 1` rows for quantities that need a bootstrap
//! row (observations, recurrent states, value predictions, returns, masks)
//! and `num_steps` rows for per-action quantities (rewards, actions, input
//! actions, action log-probs). Every row covers all `num_processes` parallel
//! actors, so storage is step-major: `[step][process][feature]`.
//!
//! A mask of `0.0` at row `t` means observation `t` is the first of a new
//! episode, i.e. the transition `t-1 -> t` crossed an episode boundary.

use rand::Rng;

use super::generators::{FeedForwardGenerator, TransitionModelGenerator};

/// Error type for rollout buffer operations.
#[derive(Debug, Clone, PartialEq)]
pub enum BufferError {
    /// A slice passed to the buffer has the wrong length.
    ShapeMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    /// Mini-batch size must be positive.
    InvalidMiniBatchSize,
    /// The requested recent window does not fit in the buffer.
    InvalidRecentWindow {
        recent_at: usize,
        num_steps: usize,
    },
    /// No samples are available for the requested generator.
    Empty,
}

impl std::fmt::Display for BufferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BufferError::ShapeMismatch { field, expected, actual } => {
                write!(f, "{} has length {}, expected {}", field, actual, expected)
            }
            BufferError::InvalidMiniBatchSize => write!(f, "mini-batch size must be > 0"),
            BufferError::InvalidRecentWindow { recent_at, num_steps } => write!(
                f,
                "recent window ends at step {} but the buffer only holds {} steps",
                recent_at, num_steps
            ),
            BufferError::Empty => write!(f, "rollout buffer has no samples to generate"),
        }
    }
}

impl std::error::Error for BufferError {}

fn check_len(field: &'static str, actual: usize, expected: usize) -> Result<(), BufferError> {
    if actual == expected {
        Ok(())
    } else {
        Err(BufferError::ShapeMismatch { field, expected, actual })
    }
}

/// Rollout storage for `num_processes` actors over `num_steps` steps.
#[derive(Debug, Clone)]
pub struct RolloutBuffer {
    /// Observations: [(num_steps + 1) * num_processes * obs_dim]
    pub observations: Vec<f32>,
    /// Recurrent states: [(num_steps + 1) * num_processes * state_size]
    pub states: Vec<f32>,
    /// Rewards: [num_steps * num_processes]
    pub rewards: Vec<f32>,
    /// Value predictions: [(num_steps + 1) * num_processes]
    pub value_preds: Vec<f32>,
    /// Return targets: [(num_steps + 1) * num_processes]
    pub returns: Vec<f32>,
    /// Old action log-probabilities: [num_steps * num_processes]
    pub action_log_probs: Vec<f32>,
    /// Discrete actions: [num_steps * num_processes]
    pub actions: Vec<u32>,
    /// Externally supplied action inputs: [num_steps * num_processes * input_action_dim]
    pub input_actions: Vec<f32>,
    /// Episode masks: [(num_steps + 1) * num_processes]
    pub masks: Vec<f32>,

    num_steps: usize,
    num_processes: usize,
    obs_dim: usize,
    state_size: usize,
    input_action_dim: usize,
    step: usize,
}

impl RolloutBuffer {
    /// Allocate a zeroed buffer with all masks set to `1.0`.
    pub fn new(
        num_steps: usize,
        num_processes: usize,
        obs_dim: usize,
        state_size: usize,
        input_action_dim: usize,
    ) -> Self {
        let rows = num_steps + 1;
        Self {
            observations: vec![0.0; rows * num_processes * obs_dim],
            states: vec![0.0; rows * num_processes * state_size],
            rewards: vec![0.0; num_steps * num_processes],
            value_preds: vec![0.0; rows * num_processes],
            returns: vec![0.0; rows * num_processes],
            action_log_probs: vec![0.0; num_steps * num_processes],
            actions: vec![0; num_steps * num_processes],
            input_actions: vec![0.0; num_steps * num_processes * input_action_dim],
            masks: vec![1.0; rows * num_processes],
            num_steps,
            num_processes,
            obs_dim,
            state_size,
            input_action_dim,
            step: 0,
        }
    }

    pub fn num_steps(&self) -> usize {
        self.num_steps
    }

    pub fn num_processes(&self) -> usize {
        self.num_processes
    }

    pub fn obs_dim(&self) -> usize {
        self.obs_dim
    }

    pub fn state_size(&self) -> usize {
        self.state_size
    }

    pub fn input_action_dim(&self) -> usize {
        self.input_action_dim
    }

    /// Current write cursor, in `[0, num_steps)`.
    pub fn step(&self) -> usize {
        self.step
    }

    /// Number of action-bearing samples (`num_steps * num_processes`).
    pub fn len(&self) -> usize {
        self.num_steps * self.num_processes
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the observation that row 0 starts from.
    pub fn set_initial_observation(&mut self, observations: &[f32]) -> Result<(), BufferError> {
        let width = self.num_processes * self.obs_dim;
        check_len("observations", observations.len(), width)?;
        self.observations[..width].copy_from_slice(observations);
        Ok(())
    }

    /// Record one step for all processes.
    ///
    /// `observations`, `states` and `masks` describe the state reached after
    /// acting and land in row `step + 1`; the remaining arguments describe
    /// the action taken from row `step`.
    #[allow(clippy::too_many_arguments)]
    pub fn insert(
        &mut self,
        observations: &[f32],
        states: &[f32],
        actions: &[u32],
        input_actions: &[f32],
        action_log_probs: &[f32],
        value_preds: &[f32],
        rewards: &[f32],
        masks: &[f32],
    ) -> Result<(), BufferError> {
        let n = self.num_processes;
        check_len("observations", observations.len(), n * self.obs_dim)?;
        check_len("states", states.len(), n * self.state_size)?;
        check_len("actions", actions.len(), n)?;
        check_len("input_actions", input_actions.len(), n * self.input_action_dim)?;
        check_len("action_log_probs", action_log_probs.len(), n)?;
        check_len("value_preds", value_preds.len(), n)?;
        check_len("rewards", rewards.len(), n)?;
        check_len("masks", masks.len(), n)?;

        let step = self.step;
        let next = step + 1;

        write_row(&mut self.observations, next, n * self.obs_dim, observations);
        write_row(&mut self.states, next, n * self.state_size, states);
        write_row(&mut self.masks, next, n, masks);

        write_row(&mut self.actions, step, n, actions);
        write_row(&mut self.input_actions, step, n * self.input_action_dim, input_actions);
        write_row(&mut self.action_log_probs, step, n, action_log_probs);
        write_row(&mut self.value_preds, step, n, value_preds);
        write_row(&mut self.rewards, step, n, rewards);

        self.step = next % self.num_steps.max(1);
        Ok(())
    }

    /// Carry the final observation, state and mask over to row 0 for the
    /// next rollout.
    pub fn after_update(&mut self) {
        let last = self.num_steps;
        copy_row(&mut self.observations, last, 0, self.num_processes * self.obs_dim);
        copy_row(&mut self.states, last, 0, self.num_processes * self.state_size);
        copy_row(&mut self.masks, last, 0, self.num_processes);
    }

    /// Fill `returns` from the rewards, bootstrapping from `next_value`.
    ///
    /// With `use_gae` the returns are GAE(γ, τ) advantages plus value
    /// predictions; otherwise plain discounted returns. Masks zero the
    /// bootstrap across episode boundaries.
    pub fn compute_returns(
        &mut self,
        next_value: &[f32],
        use_gae: bool,
        gamma: f32,
        tau: f32,
    ) -> Result<(), BufferError> {
        let n = self.num_processes;
        let t_max = self.num_steps;
        check_len("next_value", next_value.len(), n)?;

        if use_gae {
            write_row(&mut self.value_preds, t_max, n, next_value);
            for p in 0..n {
                let mut gae = 0.0f32;
                for t in (0..t_max).rev() {
                    let mask = self.masks[(t + 1) * n + p];
                    let delta = self.rewards[t * n + p]
                        + gamma * self.value_preds[(t + 1) * n + p] * mask
                        - self.value_preds[t * n + p];
                    gae = delta + gamma * tau * mask * gae;
                    self.returns[t * n + p] = gae + self.value_preds[t * n + p];
                }
            }
        } else {
            write_row(&mut self.returns, t_max, n, next_value);
            for p in 0..n {
                for t in (0..t_max).rev() {
                    self.returns[t * n + p] = self.returns[(t + 1) * n + p]
                        * gamma
                        * self.masks[(t + 1) * n + p]
                        + self.rewards[t * n + p];
                }
            }
        }
        Ok(())
    }

    /// Raw advantages `returns[0..T] - value_preds[0..T]`, step-major.
    pub fn advantages(&self) -> Vec<f32> {
        let len = self.len();
        self.returns[..len]
            .iter()
            .zip(&self.value_preds[..len])
            .map(|(r, v)| r - v)
            .collect()
    }

    /// Shuffled actor-critic mini-batches over all `num_steps * num_processes`
    /// samples. `advantages` must be step-major with one entry per sample.
    pub fn feed_forward_generator<R: Rng + ?Sized>(
        &self,
        advantages: Vec<f32>,
        mini_batch_size: usize,
        rng: &mut R,
    ) -> Result<FeedForwardGenerator<'_>, BufferError> {
        if mini_batch_size == 0 {
            return Err(BufferError::InvalidMiniBatchSize);
        }
        if self.is_empty() {
            return Err(BufferError::Empty);
        }
        check_len("advantages", advantages.len(), self.len())?;
        Ok(FeedForwardGenerator::new(self, advantages, mini_batch_size, rng))
    }

    /// Shuffled transition mini-batches over the window of transitions
    /// `t -> t + 1` with `t` in `[recent_at - recent_steps, recent_at)`
    /// (clamped at 0).
    pub fn transition_model_feed_forward_generator<R: Rng + ?Sized>(
        &self,
        mini_batch_size: usize,
        recent_steps: usize,
        recent_at: usize,
        rng: &mut R,
    ) -> Result<TransitionModelGenerator<'_>, BufferError> {
        if mini_batch_size == 0 {
            return Err(BufferError::InvalidMiniBatchSize);
        }
        if recent_at > self.num_steps {
            return Err(BufferError::InvalidRecentWindow {
                recent_at,
                num_steps: self.num_steps,
            });
        }
        let start = recent_at.saturating_sub(recent_steps);
        if start == recent_at || self.num_processes == 0 {
            return Err(BufferError::Empty);
        }
        Ok(TransitionModelGenerator::new(
            self,
            start..recent_at,
            mini_batch_size,
            rng,
        ))
    }
}

fn write_row<T: Copy>(dst: &mut [T], row: usize, width: usize, src: &[T]) {
    dst[row * width..(row + 1) * width].copy_from_slice(src);
}

fn copy_row<T: Copy>(data: &mut [T], from: usize, to: usize, width: usize) {
    data.copy_within(from * width..(from + 1) * width, to * width);
}
