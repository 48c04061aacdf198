use crate::algorithms::{ActionOutOfRange, MissingInputGradient};
use crate::buffers::BufferError;
use crate::config::ConfigError;

/// Errors raised by the PPO optimizer.
#[derive(Debug, Clone, PartialEq)]
pub enum TrainError {
    /// An update was requested before `bind_this_layer`.
    ThisLayerNotBound,
    /// A transition-model update was requested without an upper layer.
    UpperLayerNotBound,
    /// A layer slot was bound twice.
    AlreadyBound(&'static str),
    /// The rollout holds no samples for the requested update.
    EmptyRollout,
    /// The recent window ends past the end of the upper layer's rollout.
    InvalidRecentWindow { recent_at: usize, num_steps: usize },
    /// A tensor or slice did not have the expected size.
    ShapeMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    /// A stored action does not fit the action space.
    ActionOutOfRange { action: u32, num_classes: usize },
    /// The connection input is not part of the output's graph.
    MissingInputGradient,
    Config(ConfigError),
}

impl std::fmt::Display for TrainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrainError::ThisLayerNotBound => write!(f, "no layer bound for training"),
            TrainError::UpperLayerNotBound => {
                write!(f, "transition model update requested without an upper layer")
            }
            TrainError::AlreadyBound(slot) => write!(f, "{} is already bound", slot),
            TrainError::EmptyRollout => write!(f, "rollout has no samples"),
            TrainError::InvalidRecentWindow { recent_at, num_steps } => write!(
                f,
                "recent window ends at {} but the rollout holds {} steps",
                recent_at, num_steps
            ),
            TrainError::ShapeMismatch { field, expected, actual } => {
                write!(f, "{} has length {}, expected {}", field, actual, expected)
            }
            TrainError::ActionOutOfRange { action, num_classes } => write!(
                f,
                "action {} outside action space of {}",
                action, num_classes
            ),
            TrainError::MissingInputGradient => {
                write!(f, "connection input does not reach the model output")
            }
            TrainError::Config(e) => write!(f, "configuration error: {}", e),
        }
    }
}

impl std::error::Error for TrainError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TrainError::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for TrainError {
    fn from(e: ConfigError) -> Self {
        TrainError::Config(e)
    }
}

impl From<BufferError> for TrainError {
    fn from(e: BufferError) -> Self {
        match e {
            BufferError::ShapeMismatch { field, expected, actual } => {
                TrainError::ShapeMismatch { field, expected, actual }
            }
            BufferError::InvalidRecentWindow { recent_at, num_steps } => {
                TrainError::InvalidRecentWindow { recent_at, num_steps }
            }
            BufferError::InvalidMiniBatchSize => TrainError::Config(ConfigError::InvalidCount {
                field: "mini_batch_size",
                value: 0,
            }),
            BufferError::Empty => TrainError::EmptyRollout,
        }
    }
}

impl From<ActionOutOfRange> for TrainError {
    fn from(e: ActionOutOfRange) -> Self {
        TrainError::ActionOutOfRange {
            action: e.action,
            num_classes: e.num_classes,
        }
    }
}

impl From<MissingInputGradient> for TrainError {
    fn from(_: MissingInputGradient) -> Self {
        TrainError::MissingInputGradient
    }
}
