//! Configuration for hierarchical PPO training.
//!
//! `LayerArgs` is the per-layer argument set owned by a [`ThisLayer`]. It
//! carries the PPO hyperparameters for the actor-critic update, the
//! transition-model schedule used when an upper layer is bound, and the
//! gradient-connection settings that couple the two.
//!
//! [`ThisLayer`]: crate::hierarchy::ThisLayer

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Configuration validation error.
///
/// Returned when configuration parameters are invalid or inconsistent, or
/// when a string-valued mode does not name a known variant.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A count parameter (epochs, mini-batch sizes, ...) must be positive.
    InvalidCount {
        field: &'static str,
        value: usize,
    },
    /// A parameter is outside its valid range.
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    /// Unknown update type name.
    UnsupportedUpdateType(String),
    /// Unknown connection mode name.
    UnsupportedConnection(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidCount { field, value } => {
                write!(f, "{} must be > 0, got {}", field, value)
            }
            ConfigError::OutOfRange { field, value, min, max } => {
                write!(f, "{} must be in [{}, {}], got {}", field, min, max, value)
            }
            ConfigError::UnsupportedUpdateType(name) => {
                write!(f, "update type '{}' is not supported", name)
            }
            ConfigError::UnsupportedConnection(name) => {
                write!(f, "connection mode '{}' is not supported", name)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Update selection
// ============================================================================

/// Which model a call to `PPO::update` trains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateType {
    /// Clipped-surrogate update of this layer's actor-critic.
    ActorCritic,
    /// Forward-dynamics regression of the upper layer's transition model.
    TransitionModel,
}

impl UpdateType {
    /// Canonical name, matching the `FromStr` spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateType::ActorCritic => "actor_critic",
            UpdateType::TransitionModel => "transition_model",
        }
    }
}

impl fmt::Display for UpdateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpdateType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "actor_critic" => Ok(UpdateType::ActorCritic),
            "transition_model" => Ok(UpdateType::TransitionModel),
            other => Err(ConfigError::UnsupportedUpdateType(other.to_string())),
        }
    }
}

/// Which updates carry the gradient-connection term.
///
/// When enabled for an update, the optimizer ascends
/// `log(1 + ‖∂output/∂input_action‖) · coefficient` alongside the primary
/// loss, rewarding sensitivity of the model output to its action input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionMode {
    /// No connection term.
    #[default]
    None,
    /// Value output vs. input action, actor-critic updates only.
    ActorCritic,
    /// Predicted next observation vs. one-hot action, transition-model updates only.
    TransitionModel,
    /// Both updates.
    Both,
}

impl ConnectionMode {
    /// Whether the connection term is active for `update_type`.
    pub fn applies_to(&self, update_type: UpdateType) -> bool {
        matches!(
            (self, update_type),
            (ConnectionMode::Both, _)
                | (ConnectionMode::ActorCritic, UpdateType::ActorCritic)
                | (ConnectionMode::TransitionModel, UpdateType::TransitionModel)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionMode::None => "none",
            ConnectionMode::ActorCritic => "actor_critic",
            ConnectionMode::TransitionModel => "transition_model",
            ConnectionMode::Both => "both",
        }
    }
}

impl fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(ConnectionMode::None),
            "actor_critic" => Ok(ConnectionMode::ActorCritic),
            "transition_model" => Ok(ConnectionMode::TransitionModel),
            "both" => Ok(ConnectionMode::Both),
            other => Err(ConfigError::UnsupportedConnection(other.to_string())),
        }
    }
}

// ============================================================================
// LayerArgs
// ============================================================================

/// Hyperparameters of one hierarchy layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerArgs {
    // Actor-critic optimizer
    /// Adam learning rate for the actor-critic.
    pub lr: f64,
    /// Adam epsilon for the actor-critic.
    pub eps: f32,

    // PPO settings
    /// Epochs per actor-critic update.
    pub ppo_epoch: usize,
    /// Samples per actor-critic mini-batch.
    pub actor_critic_mini_batch_size: usize,
    /// Clipping parameter ε of the surrogate objective.
    pub clip_param: f32,
    /// Value loss coefficient.
    pub value_loss_coef: f32,
    /// Entropy bonus coefficient.
    pub entropy_coef: f32,
    /// Global gradient-norm ceiling for the actor-critic step.
    pub max_grad_norm: f32,

    // Transition model settings
    /// Epochs per transition-model update.
    pub transition_model_epoch: usize,
    /// Samples per transition-model mini-batch (before boundary filtering).
    pub transition_model_mini_batch_size: usize,
    /// Adam learning rate for the transition model.
    pub transition_model_lr: f64,
    /// Adam (β1, β2) for the transition model.
    pub transition_model_betas: (f32, f32),

    // Connection term
    pub encourage_ac_connection: ConnectionMode,
    pub encourage_ac_connection_coefficient: f32,

    /// Base-layer steps per upper-layer step.
    pub hierarchy_interval: usize,

    /// Seed for mini-batch shuffling. `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for LayerArgs {
    fn default() -> Self {
        Self {
            lr: 7e-4,
            eps: 1e-5,

            ppo_epoch: 4,
            actor_critic_mini_batch_size: 32,
            clip_param: 0.1,
            value_loss_coef: 0.5,
            entropy_coef: 0.01,
            max_grad_norm: 0.5,

            transition_model_epoch: 4,
            transition_model_mini_batch_size: 32,
            transition_model_lr: 1e-4,
            transition_model_betas: (0.0, 0.9),

            encourage_ac_connection: ConnectionMode::None,
            encourage_ac_connection_coefficient: 0.1,

            hierarchy_interval: 4,

            seed: None,
        }
    }
}

impl LayerArgs {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate all configuration parameters.
    ///
    /// # Validation Rules
    /// - epochs, mini-batch sizes and hierarchy_interval must be > 0
    /// - clip_param must be in (0.0, 1.0]
    /// - learning rates and max_grad_norm must be positive
    /// - transition-model betas must lie in [0.0, 1.0)
    pub fn validate(&self) -> Result<(), ConfigError> {
        let counts = [
            ("ppo_epoch", self.ppo_epoch),
            ("actor_critic_mini_batch_size", self.actor_critic_mini_batch_size),
            ("transition_model_epoch", self.transition_model_epoch),
            ("transition_model_mini_batch_size", self.transition_model_mini_batch_size),
            ("hierarchy_interval", self.hierarchy_interval),
        ];
        for (field, value) in counts {
            if value == 0 {
                return Err(ConfigError::InvalidCount { field, value });
            }
        }

        if self.clip_param <= 0.0 || self.clip_param > 1.0 {
            return Err(ConfigError::OutOfRange {
                field: "clip_param",
                value: self.clip_param as f64,
                min: 0.0,
                max: 1.0,
            });
        }

        let positives = [
            ("lr", self.lr),
            ("eps", self.eps as f64),
            ("max_grad_norm", self.max_grad_norm as f64),
            ("transition_model_lr", self.transition_model_lr),
        ];
        for (field, value) in positives {
            if !(value > 0.0) {
                return Err(ConfigError::OutOfRange {
                    field,
                    value,
                    min: f64::MIN_POSITIVE,
                    max: f64::INFINITY,
                });
            }
        }

        let (beta_1, beta_2) = self.transition_model_betas;
        for (field, value) in [("transition_model_betas.0", beta_1), ("transition_model_betas.1", beta_2)] {
            if !(0.0..1.0).contains(&value) {
                return Err(ConfigError::OutOfRange {
                    field,
                    value: value as f64,
                    min: 0.0,
                    max: 1.0,
                });
            }
        }

        Ok(())
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<Self, ConfigError> {
        self.validate()?;
        Ok(self)
    }

    /// Window length used to sample the upper layer's rollouts: the number of
    /// upper-layer transitions covered by one base-layer rollout of
    /// `num_steps`, minus the transition still in flight.
    pub fn recent_steps(&self, num_steps: usize) -> usize {
        (num_steps / self.hierarchy_interval).saturating_sub(1)
    }

    pub fn with_lr(mut self, lr: f64) -> Self {
        self.lr = lr;
        self
    }

    pub fn with_eps(mut self, eps: f32) -> Self {
        self.eps = eps;
        self
    }

    pub fn with_ppo_epoch(mut self, epochs: usize) -> Self {
        self.ppo_epoch = epochs;
        self
    }

    pub fn with_actor_critic_mini_batch_size(mut self, size: usize) -> Self {
        self.actor_critic_mini_batch_size = size;
        self
    }

    pub fn with_clip_param(mut self, clip: f32) -> Self {
        self.clip_param = clip;
        self
    }

    pub fn with_value_loss_coef(mut self, coef: f32) -> Self {
        self.value_loss_coef = coef;
        self
    }

    pub fn with_entropy_coef(mut self, coef: f32) -> Self {
        self.entropy_coef = coef;
        self
    }

    pub fn with_max_grad_norm(mut self, norm: f32) -> Self {
        self.max_grad_norm = norm;
        self
    }

    pub fn with_transition_model_epoch(mut self, epochs: usize) -> Self {
        self.transition_model_epoch = epochs;
        self
    }

    pub fn with_transition_model_mini_batch_size(mut self, size: usize) -> Self {
        self.transition_model_mini_batch_size = size;
        self
    }

    pub fn with_transition_model_lr(mut self, lr: f64) -> Self {
        self.transition_model_lr = lr;
        self
    }

    pub fn with_transition_model_betas(mut self, beta_1: f32, beta_2: f32) -> Self {
        self.transition_model_betas = (beta_1, beta_2);
        self
    }

    pub fn with_encourage_ac_connection(mut self, mode: ConnectionMode) -> Self {
        self.encourage_ac_connection = mode;
        self
    }

    pub fn with_encourage_ac_connection_coefficient(mut self, coef: f32) -> Self {
        self.encourage_ac_connection_coefficient = coef;
        self
    }

    pub fn with_hierarchy_interval(mut self, interval: usize) -> Self {
        self.hierarchy_interval = interval;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(LayerArgs::default().validate().is_ok());
    }

    #[test]
    fn test_update_type_parsing() {
        assert_eq!("actor_critic".parse::<UpdateType>(), Ok(UpdateType::ActorCritic));
        assert_eq!("transition_model".parse::<UpdateType>(), Ok(UpdateType::TransitionModel));
        assert_eq!(
            "value".parse::<UpdateType>(),
            Err(ConfigError::UnsupportedUpdateType("value".to_string()))
        );
    }

    #[test]
    fn test_connection_mode_parsing() {
        for mode in [
            ConnectionMode::None,
            ConnectionMode::ActorCritic,
            ConnectionMode::TransitionModel,
            ConnectionMode::Both,
        ] {
            assert_eq!(mode.as_str().parse::<ConnectionMode>(), Ok(mode));
        }
        assert!(matches!(
            "policy".parse::<ConnectionMode>(),
            Err(ConfigError::UnsupportedConnection(_))
        ));
    }

    #[test]
    fn test_connection_mode_applies_to() {
        use ConnectionMode::*;
        use UpdateType as U;

        assert!(!None.applies_to(U::ActorCritic));
        assert!(!None.applies_to(U::TransitionModel));
        assert!(ActorCritic.applies_to(U::ActorCritic));
        assert!(!ActorCritic.applies_to(U::TransitionModel));
        assert!(!TransitionModel.applies_to(U::ActorCritic));
        assert!(TransitionModel.applies_to(U::TransitionModel));
        assert!(Both.applies_to(U::ActorCritic));
        assert!(Both.applies_to(U::TransitionModel));
    }

    #[test]
    fn test_validation_rejects_zero_counts() {
        let err = LayerArgs::new().with_ppo_epoch(0).build().unwrap_err();
        assert_eq!(err, ConfigError::InvalidCount { field: "ppo_epoch", value: 0 });

        let err = LayerArgs::new().with_hierarchy_interval(0).build().unwrap_err();
        assert_eq!(err, ConfigError::InvalidCount { field: "hierarchy_interval", value: 0 });
    }

    #[test]
    fn test_validation_rejects_bad_ranges() {
        assert!(matches!(
            LayerArgs::new().with_clip_param(0.0).build(),
            Err(ConfigError::OutOfRange { field: "clip_param", .. })
        ));
        assert!(matches!(
            LayerArgs::new().with_max_grad_norm(-1.0).build(),
            Err(ConfigError::OutOfRange { field: "max_grad_norm", .. })
        ));
        assert!(matches!(
            LayerArgs::new().with_transition_model_betas(0.0, 1.0).build(),
            Err(ConfigError::OutOfRange { field: "transition_model_betas.1", .. })
        ));
    }

    #[test]
    fn test_recent_steps() {
        let args = LayerArgs::new().with_hierarchy_interval(4);
        assert_eq!(args.recent_steps(20), 4);
        assert_eq!(args.recent_steps(4), 0);
        assert_eq!(args.recent_steps(2), 0);
    }

    #[test]
    fn test_error_display() {
        let err = ConfigError::UnsupportedUpdateType("foo".into());
        assert_eq!(err.to_string(), "update type 'foo' is not supported");
    }
}
