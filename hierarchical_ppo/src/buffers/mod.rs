//! On-policy rollout storage and its mini-batch generators.
//!
//! - `RolloutBuffer`: fixed-length, step-major trajectories for `num_processes`
//!   parallel actors, with discounted / GAE return computation.
//! - `FeedForwardGenerator`: shuffled actor-critic mini-batches.
//! - `TransitionModelGenerator`: shuffled `obs[t] -> obs[t + 1]` mini-batches
//!   over a recent window of steps.

pub mod generators;
pub mod rollout_buffer;

pub use generators::{
    ActorCriticMiniBatch, ActorCriticTensors, FeedForwardGenerator, TransitionMiniBatch,
    TransitionModelGenerator,
};
pub use rollout_buffer::{BufferError, RolloutBuffer};

#[cfg(test)]
mod tests;
