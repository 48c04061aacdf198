//! # Hierarchical PPO
//!
//! PPO optimizer for a two-level hierarchy of learners, built on burn.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                             PPO                              │
//! │                                                              │
//! │  ThisLayer                          UpperLayer (optional)    │
//! │  ┌──────────────────┐               ┌──────────────────┐     │
//! │  │ ActorCritic      │               │ TransitionModel  │     │
//! │  │ RolloutBuffer    │               │ RolloutBuffer    │     │
//! │  │ LayerArgs        │               │ step_i           │     │
//! │  └────────┬─────────┘               └────────┬─────────┘     │
//! │           ▼                                  ▼               │
//! │  feed_forward_generator      transition_model_feed_forward   │
//! │           │                        _generator (recent window)│
//! │           ▼                                  ▼               │
//! │  clipped surrogate + value          one-step MSE on valid    │
//! │  - entropy [- connection]           transitions [- connection]│
//! │           │                                  │               │
//! │  global-norm clip -> Adam            Adam (lr 1e-4, β 0/0.9)  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The optional *connection* term rewards sensitivity of the value output
//! (or the predicted next observation) to the action input, measured by the
//! normalized gradient norm in [`algorithms::connection`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use hierarchical_ppo::{LayerArgs, PPO, RolloutBuffer, ThisLayer, UpdateType};
//!
//! let args = LayerArgs::new().with_ppo_epoch(4).with_seed(7).build()?;
//! let mut ppo: PPO<B, MyActorCritic<B>, MyTransitionModel<B>> = PPO::new(device);
//! ppo.bind_this_layer(ThisLayer::new(actor_critic, rollouts, args))?;
//!
//! // after filling the rollouts and calling compute_returns(...)
//! let losses = ppo.update(UpdateType::ActorCritic)?;
//! println!("{:?}", losses.entries());
//! ```

pub mod algorithms;
pub mod buffers;
pub mod config;
pub mod hierarchy;
pub mod learner;
pub mod metrics;
pub mod models;
pub mod nn;

pub use buffers::{BufferError, RolloutBuffer};
pub use config::{ConfigError, ConnectionMode, LayerArgs, UpdateType};
pub use hierarchy::{ThisLayer, UpperLayer};
pub use learner::{ActorCriticLosses, TrainError, TransitionModelLosses, UpdateLosses, PPO};
pub use metrics::{ConsoleLogger, CsvLogger, LossSnapshot, MetricsLogger, MultiLogger};
pub use models::{ActionEvaluation, ActorCritic, TransitionModel, TransitionOutput};
