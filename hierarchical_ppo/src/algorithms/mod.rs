//! Loss terms and numeric helpers used by the PPO optimizer.
//!
//! - `advantage`: advantage standardization
//! - `policy_loss`: clipped surrogate and squared-error losses
//! - `connection`: gradient-connection estimator and reward
//! - `one_hot`: discrete action encoding
//! - `grad_clip`: global gradient-norm clipping

pub mod advantage;
pub mod connection;
pub mod grad_clip;
pub mod one_hot;
pub mod policy_loss;

pub use advantage::{standardize_advantages, ADVANTAGE_EPS};
pub use connection::{
    connection_reward, exact_gradient_connection, gradient_connection, MissingInputGradient,
    DEFAULT_FD_STEP,
};
pub use grad_clip::{clip_global_norm, global_grad_norm};
pub use one_hot::{one_hot, one_hot_rows, ActionOutOfRange};
pub use policy_loss::{
    clipped_surrogate_loss, clipped_surrogate_loss_scalar, clipped_surrogate_scalar, mse_loss,
    mse_loss_scalar,
};
