//! Network building blocks and reference models.
//!
//! - [`orthogonal`]: linear layer with orthogonal initialization
//! - [`mlp`]: MLP actor-critic and transition model

pub mod mlp;
pub mod orthogonal;

pub use mlp::{MlpActorCritic, MlpActorCriticConfig, MlpTransitionModel, MlpTransitionModelConfig};
pub use orthogonal::{orthogonal_rows, OrthogonalLinear, OrthogonalLinearConfig};
