//! One-hot encoding of discrete actions.

use burn::tensor::{backend::Backend, Tensor, TensorData};

/// An action index at or beyond the number of categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionOutOfRange {
    pub action: u32,
    pub num_classes: usize,
}

impl std::fmt::Display for ActionOutOfRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "action {} is outside an action space of {} categories",
            self.action, self.num_classes
        )
    }
}

impl std::error::Error for ActionOutOfRange {}

/// Row-major `[actions.len(), num_classes]` one-hot matrix on the host.
pub fn one_hot_rows(actions: &[u32], num_classes: usize) -> Result<Vec<f32>, ActionOutOfRange> {
    let mut rows = vec![0.0f32; actions.len() * num_classes];
    for (i, &action) in actions.iter().enumerate() {
        let k = action as usize;
        if k >= num_classes {
            return Err(ActionOutOfRange { action, num_classes });
        }
        rows[i * num_classes + k] = 1.0;
    }
    Ok(rows)
}

/// One-hot tensor `[batch, num_classes]`.
pub fn one_hot<B: Backend>(
    actions: &[u32],
    num_classes: usize,
    device: &B::Device,
) -> Result<Tensor<B, 2>, ActionOutOfRange> {
    let rows = one_hot_rows(actions, num_classes)?;
    Ok(Tensor::from_data(
        TensorData::new(rows, [actions.len(), num_classes]),
        device,
    ))
}
