use crate::config::UpdateType;

/// Loss sums from one actor-critic `update` call.
///
/// Every field is summed over all mini-batches of all epochs.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ActorCriticLosses {
    pub value: f32,
    pub action: f32,
    pub dist_entropy: f32,
    /// Present when the connection term is enabled for this update.
    pub gradients_reward: Option<f32>,
    /// Largest pre-clip global gradient norm seen during the call.
    pub max_grad_norm: f32,
    pub num_mini_batches: usize,
}

/// Loss sums from one transition-model `update` call.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TransitionModelLosses {
    pub mse: f32,
    pub gradients_reward: Option<f32>,
    pub num_mini_batches: usize,
    /// Mini-batches skipped because every entry crossed an episode boundary.
    pub skipped_mini_batches: usize,
}

/// Result of [`crate::learner::PPO::update`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UpdateLosses {
    ActorCritic(ActorCriticLosses),
    TransitionModel(TransitionModelLosses),
}

impl UpdateLosses {
    pub fn update_type(&self) -> UpdateType {
        match self {
            UpdateLosses::ActorCritic(_) => UpdateType::ActorCritic,
            UpdateLosses::TransitionModel(_) => UpdateType::TransitionModel,
        }
    }

    /// Named loss sums, in a fixed order.
    pub fn entries(&self) -> Vec<(&'static str, f32)> {
        match self {
            UpdateLosses::ActorCritic(l) => {
                let mut out = vec![
                    ("value", l.value),
                    ("action", l.action),
                    ("dist_entropy", l.dist_entropy),
                ];
                if let Some(r) = l.gradients_reward {
                    out.push(("gradients_reward", r));
                }
                out
            }
            UpdateLosses::TransitionModel(l) => {
                let mut out = vec![("mse", l.mse)];
                if let Some(r) = l.gradients_reward {
                    out.push(("gradients_reward", r));
                }
                out
            }
        }
    }

    /// Look up one named sum.
    pub fn get(&self, name: &str) -> Option<f32> {
        self.entries()
            .into_iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v)
    }

    pub fn num_mini_batches(&self) -> usize {
        match self {
            UpdateLosses::ActorCritic(l) => l.num_mini_batches,
            UpdateLosses::TransitionModel(l) => l.num_mini_batches,
        }
    }

    pub fn as_actor_critic(&self) -> Option<&ActorCriticLosses> {
        match self {
            UpdateLosses::ActorCritic(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_transition_model(&self) -> Option<&TransitionModelLosses> {
        match self {
            UpdateLosses::TransitionModel(l) => Some(l),
            _ => None,
        }
    }
}
