//! The PPO optimizer and its result and error types.
//!
//! - `PPO`: binds layers and runs actor-critic / transition-model updates
//! - `UpdateLosses`: per-call loss sums
//! - `TrainError`: everything `update` and the bind calls can fail with

mod error;
mod losses;
mod ppo;


pub use error::TrainError;
pub use losses::{ActorCriticLosses, TransitionModelLosses, UpdateLosses};
pub use ppo::{AdamOptimizer, PPO};
