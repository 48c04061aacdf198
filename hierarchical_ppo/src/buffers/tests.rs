//! Behavioral tests for rollout storage and mini-batch generation.
//!
//! Test categories:
//! 1. Feed-forward generator coverage and shuffling
//! 2. Transition generator windows and boundary filtering
//! 3. Tensor upload shapes

use std::collections::HashSet;

use burn::backend::NdArray;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::*;

type B = NdArray<f32>;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Build a buffer whose observation at (step, proc) is `[step, proc]` and
/// whose action at (step, proc) is `step * 10 + proc`.
fn tagged_buffer(num_steps: usize, num_processes: usize) -> RolloutBuffer {
    let mut buffer = RolloutBuffer::new(num_steps, num_processes, 2, 1, 1);
    let initial: Vec<f32> = (0..num_processes).flat_map(|p| [0.0, p as f32]).collect();
    buffer.set_initial_observation(&initial).unwrap();

    for step in 0..num_steps {
        let next_obs: Vec<f32> = (0..num_processes)
            .flat_map(|p| [(step + 1) as f32, p as f32])
            .collect();
        let actions: Vec<u32> = (0..num_processes).map(|p| (step * 10 + p) as u32).collect();
        let values: Vec<f32> = (0..num_processes).map(|p| (step * 10 + p) as f32).collect();
        buffer
            .insert(
                &next_obs,
                &vec![0.0; num_processes],
                &actions,
                &vec![0.5; num_processes],
                &vec![-1.0; num_processes],
                &values,
                &vec![1.0; num_processes],
                &vec![1.0; num_processes],
            )
            .unwrap();
    }
    buffer
}

/// Set `masks[t + 1]` for process 0 to the given pattern.
fn set_next_masks(buffer: &mut RolloutBuffer, pattern: &[f32]) {
    let n = buffer.num_processes();
    for (t, &m) in pattern.iter().enumerate() {
        buffer.masks[(t + 1) * n] = m;
    }
}

// =============================================================================
// FEED-FORWARD GENERATOR
// =============================================================================

/// INTENT: One pass visits every (step, process) sample exactly once.
#[test]
fn test_feed_forward_visits_every_sample_once() {
    let buffer = tagged_buffer(5, 4);
    let mut rng = StdRng::seed_from_u64(7);
    let advantages: Vec<f32> = (0..buffer.len()).map(|i| i as f32).collect();

    let mut seen = Vec::new();
    for batch in buffer.feed_forward_generator(advantages, 4, &mut rng).unwrap() {
        assert!(batch.len() <= 4);
        seen.extend(batch.actions.iter().copied());
    }

    assert_eq!(seen.len(), 20);
    let unique: HashSet<u32> = seen.into_iter().collect();
    assert_eq!(unique.len(), 20);
}

/// INTENT: The remainder forms a final, smaller mini-batch.
#[test]
fn test_feed_forward_keeps_remainder() {
    let buffer = tagged_buffer(5, 2);
    let mut rng = StdRng::seed_from_u64(1);
    let generator = buffer
        .feed_forward_generator(vec![0.0; buffer.len()], 4, &mut rng)
        .unwrap();
    assert_eq!(generator.num_mini_batches(), 3);
    let sizes: Vec<usize> = generator.map(|b| b.len()).collect();
    assert_eq!(sizes, vec![4, 4, 2]);
}

/// INTENT: Every field of a sample comes from the same (step, process) slot.
#[test]
fn test_feed_forward_fields_stay_aligned() {
    let buffer = tagged_buffer(3, 3);
    let mut rng = StdRng::seed_from_u64(3);
    let advantages: Vec<f32> = (0..buffer.len()).map(|i| 100.0 + i as f32).collect();

    for batch in buffer.feed_forward_generator(advantages, 2, &mut rng).unwrap() {
        for k in 0..batch.len() {
            let action = batch.actions[k] as usize;
            let (step, proc) = (action / 10, action % 10);
            assert_eq!(batch.observations[2 * k], step as f32);
            assert_eq!(batch.observations[2 * k + 1], proc as f32);
            assert_eq!(batch.value_preds[k], action as f32);
            assert_eq!(batch.advantages[k], 100.0 + (step * 3 + proc) as f32);
        }
    }
}

/// INTENT: Two calls with different RNG state produce different orders.
#[test]
fn test_feed_forward_reshuffles_per_call() {
    let buffer = tagged_buffer(8, 4);
    let mut rng = StdRng::seed_from_u64(11);
    let first: Vec<u32> = buffer
        .feed_forward_generator(vec![0.0; buffer.len()], 32, &mut rng)
        .unwrap()
        .flat_map(|b| b.actions)
        .collect();
    let second: Vec<u32> = buffer
        .feed_forward_generator(vec![0.0; buffer.len()], 32, &mut rng)
        .unwrap()
        .flat_map(|b| b.actions)
        .collect();
    assert_ne!(first, second);
}

/// INTENT: Mis-sized advantages and a zero mini-batch size are rejected.
#[test]
fn test_feed_forward_argument_validation() {
    let buffer = tagged_buffer(2, 2);
    let mut rng = StdRng::seed_from_u64(0);
    assert!(matches!(
        buffer.feed_forward_generator(vec![0.0; 3], 2, &mut rng),
        Err(BufferError::ShapeMismatch { field: "advantages", expected: 4, actual: 3 })
    ));
    assert!(matches!(
        buffer.feed_forward_generator(vec![0.0; 4], 0, &mut rng),
        Err(BufferError::InvalidMiniBatchSize)
    ));
}

// =============================================================================
// TRANSITION GENERATOR
// =============================================================================

/// INTENT: Only steps inside [recent_at - recent_steps, recent_at) are sampled,
/// and each entry pairs obs[t] with obs[t + 1].
#[test]
fn test_transition_window_bounds() {
    let buffer = tagged_buffer(6, 2);
    let mut rng = StdRng::seed_from_u64(5);
    let generator = buffer
        .transition_model_feed_forward_generator(3, 2, 5, &mut rng)
        .unwrap();
    assert_eq!(generator.window(), 3..5);

    let mut count = 0;
    for batch in generator {
        for k in 0..batch.len() {
            let step = batch.observations[2 * k] as usize;
            assert!((3..5).contains(&step));
            assert_eq!(batch.next_observations[2 * k], (step + 1) as f32);
            assert_eq!(batch.observations[2 * k + 1], batch.next_observations[2 * k + 1]);
            assert_eq!(batch.actions[k] as usize / 10, step);
            count += 1;
        }
    }
    assert_eq!(count, 4);
}

/// INTENT: A window reaching before step 0 is clamped.
#[test]
fn test_transition_window_clamped_at_zero() {
    let buffer = tagged_buffer(4, 1);
    let mut rng = StdRng::seed_from_u64(5);
    let generator = buffer
        .transition_model_feed_forward_generator(8, 10, 2, &mut rng)
        .unwrap();
    assert_eq!(generator.window(), 0..2);
    assert_eq!(generator.flat_map(|b| b.actions).count(), 2);
}

/// INTENT: With next-mask pattern [1, 1, 0, 1], the filtered batches never
/// contain the transition that crosses the boundary (t = 2).
#[test]
fn test_transition_filter_drops_boundary_crossings() {
    let mut buffer = tagged_buffer(4, 1);
    set_next_masks(&mut buffer, &[1.0, 1.0, 0.0, 1.0]);
    let mut rng = StdRng::seed_from_u64(9);

    let mut kept_steps = Vec::new();
    for batch in buffer
        .transition_model_feed_forward_generator(2, 4, 4, &mut rng)
        .unwrap()
    {
        let valid = batch.filter_valid();
        assert!(valid.next_masks.iter().all(|&m| m != 0.0));
        kept_steps.extend(valid.actions.iter().map(|&a| a / 10));
    }
    kept_steps.sort_unstable();
    assert_eq!(kept_steps, vec![0, 1, 3]);
}

/// INTENT: valid_indices reports positions, filter_valid keeps rows aligned.
#[test]
fn test_filter_valid_keeps_rows_aligned() {
    let batch = TransitionMiniBatch {
        observations: vec![0.0, 0.0, 1.0, 1.0, 2.0, 2.0],
        next_observations: vec![1.0, 1.0, 2.0, 2.0, 3.0, 3.0],
        actions: vec![0, 1, 2],
        next_masks: vec![1.0, 0.0, 1.0],
        obs_dim: 2,
    };
    assert_eq!(batch.valid_indices(), vec![0, 2]);
    let valid = batch.filter_valid();
    assert_eq!(valid.actions, vec![0, 2]);
    assert_eq!(valid.observations, vec![0.0, 0.0, 2.0, 2.0]);
    assert_eq!(valid.next_observations, vec![1.0, 1.0, 3.0, 3.0]);
}

// =============================================================================
// TENSOR UPLOAD
// =============================================================================

/// INTENT: Uploaded tensors carry [batch, feature] shapes.
#[test]
fn test_actor_critic_tensor_shapes() {
    let buffer = tagged_buffer(3, 2);
    let mut rng = StdRng::seed_from_u64(2);
    let device = Default::default();
    let batch = buffer
        .feed_forward_generator(vec![0.0; buffer.len()], 4, &mut rng)
        .unwrap()
        .next()
        .unwrap();
    let tensors = batch.to_tensors::<B>(&device);
    assert_eq!(tensors.observations.dims(), [4, 2]);
    assert_eq!(tensors.states.dims(), [4, 1]);
    assert_eq!(tensors.input_actions.dims(), [4, 1]);
    assert_eq!(tensors.masks.dims(), [4, 1]);
    assert_eq!(tensors.actions.dims(), [4]);
    assert_eq!(tensors.advantages.dims(), [4]);
}

// =============================================================================
// PROPERTIES
// =============================================================================

proptest! {
    /// INTENT: Boundary filtering holds for arbitrary mask patterns.
    #[test]
    fn prop_transition_batches_never_cross_boundaries(
        pattern in prop::collection::vec(prop_oneof![Just(0.0f32), Just(1.0f32)], 1..12),
        mini_batch_size in 1usize..6,
        seed in any::<u64>(),
    ) {
        let steps = pattern.len();
        let mut buffer = tagged_buffer(steps, 1);
        set_next_masks(&mut buffer, &pattern);
        let mut rng = StdRng::seed_from_u64(seed);

        let mut kept = 0usize;
        for batch in buffer
            .transition_model_feed_forward_generator(mini_batch_size, steps, steps, &mut rng)
            .unwrap()
        {
            let valid = batch.filter_valid();
            for &a in &valid.actions {
                prop_assert_eq!(pattern[(a / 10) as usize], 1.0);
            }
            kept += valid.len();
        }
        let expected = pattern.iter().filter(|&&m| m != 0.0).count();
        prop_assert_eq!(kept, expected);
    }
}
