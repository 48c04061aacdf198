//! Lazy mini-batch generators over a [`RolloutBuffer`].
//!
//! Each generator shuffles its sample indices once on construction and then
//! yields contiguous chunks of the shuffled order. The final chunk carries
//! the remainder, so every sample is visited exactly once per pass.

use std::ops::Range;

use burn::tensor::{backend::Backend, Int, Tensor, TensorData};
use rand::seq::SliceRandom;
use rand::Rng;

use super::rollout_buffer::RolloutBuffer;

/// Host-side actor-critic mini-batch, one row per sample.
#[derive(Debug, Clone)]
pub struct ActorCriticMiniBatch {
    /// [batch * obs_dim]
    pub observations: Vec<f32>,
    /// [batch * state_size]
    pub states: Vec<f32>,
    pub actions: Vec<u32>,
    /// [batch * input_action_dim]
    pub input_actions: Vec<f32>,
    pub value_preds: Vec<f32>,
    pub returns: Vec<f32>,
    pub masks: Vec<f32>,
    pub old_action_log_probs: Vec<f32>,
    pub advantages: Vec<f32>,
    pub obs_dim: usize,
    pub state_size: usize,
    pub input_action_dim: usize,
}

impl ActorCriticMiniBatch {
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Upload the mini-batch to `device`.
    pub fn to_tensors<B: Backend>(&self, device: &B::Device) -> ActorCriticTensors<B> {
        let b = self.len();
        ActorCriticTensors {
            observations: matrix(&self.observations, b, self.obs_dim, device),
            states: matrix(&self.states, b, self.state_size, device),
            actions: int_vector(&self.actions, device),
            input_actions: matrix(&self.input_actions, b, self.input_action_dim, device),
            returns: Tensor::from_floats(self.returns.as_slice(), device),
            masks: matrix(&self.masks, b, 1, device),
            old_action_log_probs: Tensor::from_floats(self.old_action_log_probs.as_slice(), device),
            advantages: Tensor::from_floats(self.advantages.as_slice(), device),
        }
    }
}

/// Device-side view of an [`ActorCriticMiniBatch`].
#[derive(Debug, Clone)]
pub struct ActorCriticTensors<B: Backend> {
    /// [batch, obs_dim]
    pub observations: Tensor<B, 2>,
    /// [batch, state_size]
    pub states: Tensor<B, 2>,
    /// [batch]
    pub actions: Tensor<B, 1, Int>,
    /// [batch, input_action_dim]
    pub input_actions: Tensor<B, 2>,
    /// [batch]
    pub returns: Tensor<B, 1>,
    /// [batch, 1]
    pub masks: Tensor<B, 2>,
    /// [batch]
    pub old_action_log_probs: Tensor<B, 1>,
    /// [batch]
    pub advantages: Tensor<B, 1>,
}

/// Host-side transition mini-batch: `obs[t] --action[t]--> obs[t + 1]`.
#[derive(Debug, Clone)]
pub struct TransitionMiniBatch {
    /// [batch * obs_dim]
    pub observations: Vec<f32>,
    /// [batch * obs_dim]
    pub next_observations: Vec<f32>,
    pub actions: Vec<u32>,
    /// `masks[t + 1]` for each entry; `0.0` marks a boundary crossing.
    pub next_masks: Vec<f32>,
    pub obs_dim: usize,
}

impl TransitionMiniBatch {
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Positions of entries whose next mask is nonzero.
    pub fn valid_indices(&self) -> Vec<usize> {
        self.next_masks
            .iter()
            .enumerate()
            .filter(|(_, &m)| m != 0.0)
            .map(|(i, _)| i)
            .collect()
    }

    /// Keep only entries that do not cross an episode boundary.
    pub fn filter_valid(&self) -> TransitionMiniBatch {
        let keep = self.valid_indices();
        let d = self.obs_dim;
        let mut out = TransitionMiniBatch {
            observations: Vec::with_capacity(keep.len() * d),
            next_observations: Vec::with_capacity(keep.len() * d),
            actions: Vec::with_capacity(keep.len()),
            next_masks: Vec::with_capacity(keep.len()),
            obs_dim: d,
        };
        for i in keep {
            out.observations.extend_from_slice(&self.observations[i * d..(i + 1) * d]);
            out.next_observations
                .extend_from_slice(&self.next_observations[i * d..(i + 1) * d]);
            out.actions.push(self.actions[i]);
            out.next_masks.push(self.next_masks[i]);
        }
        out
    }

    pub fn observations_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 2> {
        matrix(&self.observations, self.len(), self.obs_dim, device)
    }

    pub fn next_observations_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 2> {
        matrix(&self.next_observations, self.len(), self.obs_dim, device)
    }

    pub fn actions_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 1, Int> {
        int_vector(&self.actions, device)
    }
}

fn matrix<B: Backend>(data: &[f32], rows: usize, cols: usize, device: &B::Device) -> Tensor<B, 2> {
    Tensor::from_data(TensorData::new(data.to_vec(), [rows, cols]), device)
}

fn int_vector<B: Backend>(data: &[u32], device: &B::Device) -> Tensor<B, 1, Int> {
    let values: Vec<i64> = data.iter().map(|&a| a as i64).collect();
    Tensor::from_data(
        TensorData::new(values, [data.len()]).convert::<B::IntElem>(),
        device,
    )
}

fn shuffled<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..len).collect();
    indices.shuffle(rng);
    indices
}

/// Iterator over shuffled actor-critic mini-batches.
///
/// Flat index `i` maps to step `i / num_processes`, process `i % num_processes`.
pub struct FeedForwardGenerator<'a> {
    buffer: &'a RolloutBuffer,
    advantages: Vec<f32>,
    indices: Vec<usize>,
    mini_batch_size: usize,
    cursor: usize,
}

impl<'a> FeedForwardGenerator<'a> {
    pub(crate) fn new<R: Rng + ?Sized>(
        buffer: &'a RolloutBuffer,
        advantages: Vec<f32>,
        mini_batch_size: usize,
        rng: &mut R,
    ) -> Self {
        let indices = shuffled(buffer.len(), rng);
        Self {
            buffer,
            advantages,
            indices,
            mini_batch_size,
            cursor: 0,
        }
    }

    /// Number of mini-batches this pass yields in total.
    pub fn num_mini_batches(&self) -> usize {
        self.indices.len().div_ceil(self.mini_batch_size)
    }

    fn gather(&self, chunk: &[usize]) -> ActorCriticMiniBatch {
        let buf = self.buffer;
        let n = buf.num_processes();
        let (od, sd, ad) = (buf.obs_dim(), buf.state_size(), buf.input_action_dim());
        let b = chunk.len();

        let mut batch = ActorCriticMiniBatch {
            observations: Vec::with_capacity(b * od),
            states: Vec::with_capacity(b * sd),
            actions: Vec::with_capacity(b),
            input_actions: Vec::with_capacity(b * ad),
            value_preds: Vec::with_capacity(b),
            returns: Vec::with_capacity(b),
            masks: Vec::with_capacity(b),
            old_action_log_probs: Vec::with_capacity(b),
            advantages: Vec::with_capacity(b),
            obs_dim: od,
            state_size: sd,
            input_action_dim: ad,
        };

        for &i in chunk {
            let (step, proc) = (i / n, i % n);
            // Row-major offset of (step, proc) inside a [rows][n] layout equals i.
            debug_assert_eq!(step * n + proc, i);
            batch.observations.extend_from_slice(&buf.observations[i * od..(i + 1) * od]);
            batch.states.extend_from_slice(&buf.states[i * sd..(i + 1) * sd]);
            batch.actions.push(buf.actions[i]);
            batch
                .input_actions
                .extend_from_slice(&buf.input_actions[i * ad..(i + 1) * ad]);
            batch.value_preds.push(buf.value_preds[i]);
            batch.returns.push(buf.returns[i]);
            batch.masks.push(buf.masks[i]);
            batch.old_action_log_probs.push(buf.action_log_probs[i]);
            batch.advantages.push(self.advantages[i]);
        }
        batch
    }
}

impl Iterator for FeedForwardGenerator<'_> {
    type Item = ActorCriticMiniBatch;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.indices.len() {
            return None;
        }
        let end = (self.cursor + self.mini_batch_size).min(self.indices.len());
        let batch = self.gather(&self.indices[self.cursor..end]);
        self.cursor = end;
        Some(batch)
    }
}

/// Iterator over shuffled transition mini-batches from a window of steps.
pub struct TransitionModelGenerator<'a> {
    buffer: &'a RolloutBuffer,
    window: Range<usize>,
    indices: Vec<usize>,
    mini_batch_size: usize,
    cursor: usize,
}

impl<'a> TransitionModelGenerator<'a> {
    pub(crate) fn new<R: Rng + ?Sized>(
        buffer: &'a RolloutBuffer,
        window: Range<usize>,
        mini_batch_size: usize,
        rng: &mut R,
    ) -> Self {
        let indices = shuffled(window.len() * buffer.num_processes(), rng);
        Self {
            buffer,
            window,
            indices,
            mini_batch_size,
            cursor: 0,
        }
    }

    /// Steps `t` whose transitions `t -> t + 1` this generator samples.
    pub fn window(&self) -> Range<usize> {
        self.window.clone()
    }

    pub fn num_mini_batches(&self) -> usize {
        self.indices.len().div_ceil(self.mini_batch_size)
    }

    fn gather(&self, chunk: &[usize]) -> TransitionMiniBatch {
        let buf = self.buffer;
        let n = buf.num_processes();
        let d = buf.obs_dim();
        let mut batch = TransitionMiniBatch {
            observations: Vec::with_capacity(chunk.len() * d),
            next_observations: Vec::with_capacity(chunk.len() * d),
            actions: Vec::with_capacity(chunk.len()),
            next_masks: Vec::with_capacity(chunk.len()),
            obs_dim: d,
        };
        for &local in chunk {
            let step = self.window.start + local / n;
            let proc = local % n;
            let here = step * n + proc;
            let next = (step + 1) * n + proc;
            batch.observations.extend_from_slice(&buf.observations[here * d..(here + 1) * d]);
            batch
                .next_observations
                .extend_from_slice(&buf.observations[next * d..(next + 1) * d]);
            batch.actions.push(buf.actions[here]);
            batch.next_masks.push(buf.masks[next]);
        }
        batch
    }
}

impl Iterator for TransitionModelGenerator<'_> {
    type Item = TransitionMiniBatch;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.indices.len() {
            return None;
        }
        let end = (self.cursor + self.mini_batch_size).min(self.indices.len());
        let batch = self.gather(&self.indices[self.cursor..end]);
        self.cursor = end;
        Some(batch)
    }
}
