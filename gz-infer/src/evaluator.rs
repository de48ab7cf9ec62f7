//! The policy/value oracle contract and root symmetry averaging.

use gz_core::{Board, Stone, Transform};
use gz_features::{encode_board_v1, Features};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InferError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("safetensors: {0}")]
    Safetensors(#[from] safetensors::SafeTensorError),
    #[error("model shape mismatch: {0}")]
    Shape(String),
    #[error("http: {0}")]
    Http(String),
    #[error("empty batch")]
    EmptyBatch,
}

/// One network output: a policy over all `n*n` cells (non-negative, summing
/// to 1 before any legality masking) and a value in [-1, 1] from the
/// side-to-move's perspective.
#[derive(Debug, Clone)]
pub struct Prediction {
    pub policy: Vec<f32>,
    pub value: f32,
}

/// Batchable policy/value oracle.
///
/// Implementations must be thread-safe or be serialized by the caller.
/// Batching is mandatory for throughput but carries no semantics: the
/// outputs must equal element-wise single evaluations.
pub trait Evaluator: Send + Sync {
    fn predict_batch(&self, inputs: &[Features]) -> Result<Vec<Prediction>, InferError>;

    fn predict_one(&self, input: &Features) -> Result<Prediction, InferError> {
        let mut out = self.predict_batch(std::slice::from_ref(input))?;
        out.pop().ok_or(InferError::EmptyBatch)
    }
}

/// Uniform policy + zero value. Baseline for tests and bootstrap play.
pub struct UniformEvaluator;

impl Evaluator for UniformEvaluator {
    fn predict_batch(&self, inputs: &[Features]) -> Result<Vec<Prediction>, InferError> {
        Ok(inputs
            .iter()
            .map(|f| {
                let cells = f.n * f.n;
                Prediction {
                    policy: vec![1.0 / cells as f32; cells],
                    value: 0.0,
                }
            })
            .collect())
    }
}

/// How many root symmetries to average given the total think budget.
///
/// 8 by default, 4 under tight budgets, 1 in fast mode.
pub fn symmetry_count_for_budget(budget_ms: u64, fast_mode: bool) -> usize {
    if fast_mode || budget_ms <= 900 {
        1
    } else if budget_ms <= 1200 {
        4
    } else {
        8
    }
}

/// Evaluate `board` under `count` symmetries in one batch, map each policy
/// back to the original orientation and average policies and values.
pub fn evaluate_symmetry_averaged(
    evaluator: &dyn Evaluator,
    board: &Board,
    to_move: Stone,
    count: usize,
) -> Result<Prediction, InferError> {
    let count = count.clamp(1, Transform::ALL.len());
    let n = board.size();
    let transforms = &Transform::ALL[..count];

    let inputs: Vec<Features> = transforms
        .iter()
        .map(|t| encode_board_v1(&t.apply_board(board), to_move))
        .collect();
    let preds = evaluator.predict_batch(&inputs)?;
    if preds.len() != transforms.len() {
        return Err(InferError::Shape(format!(
            "expected {} predictions, got {}",
            transforms.len(),
            preds.len()
        )));
    }

    let mut policy = vec![0.0f32; n * n];
    let mut value = 0.0f32;
    for (t, pred) in transforms.iter().zip(&preds) {
        let back = t.inverse().apply_policy(&pred.policy, n);
        for (acc, p) in policy.iter_mut().zip(&back) {
            *acc += p;
        }
        value += pred.value;
    }
    let inv = 1.0 / transforms.len() as f32;
    for p in &mut policy {
        *p *= inv;
    }
    Ok(Prediction {
        policy,
        value: value * inv,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gz_core::Move;

    /// Evaluator that concentrates all policy mass on one fixed cell of
    /// whatever orientation it is handed, by reading plane 0.
    struct SpikeEvaluator;

    impl Evaluator for SpikeEvaluator {
        fn predict_batch(&self, inputs: &[Features]) -> Result<Vec<Prediction>, InferError> {
            Ok(inputs
                .iter()
                .map(|f| {
                    let cells = f.n * f.n;
                    let mut policy = vec![0.0; cells];
                    // Put mass where the side-to-move stone sits.
                    let spike = (0..cells)
                        .find(|&i| f.data[i * gz_features::PLANES] > 0.5)
                        .unwrap_or(0);
                    policy[spike] = 1.0;
                    Prediction { policy, value: 0.25 }
                })
                .collect())
        }
    }

    #[test]
    fn symmetry_average_returns_to_original_orientation() {
        let mut b = Board::new(15);
        b.place(Move::new(2, 5), Stone::Black);

        let pred = evaluate_symmetry_averaged(&SpikeEvaluator, &b, Stone::Black, 8).unwrap();
        // Every symmetric evaluation spikes on the transformed stone; after
        // inverse mapping all mass lands back on (2,5).
        let spike = Move::new(2, 5).flat(15);
        assert!((pred.policy[spike] - 1.0).abs() < 1e-5);
        let total: f32 = pred.policy.iter().sum();
        assert!((total - 1.0).abs() < 1e-4);
        assert!((pred.value - 0.25).abs() < 1e-6);
    }

    #[test]
    fn budget_selects_symmetry_count() {
        assert_eq!(symmetry_count_for_budget(2000, false), 8);
        assert_eq!(symmetry_count_for_budget(1200, false), 4);
        assert_eq!(symmetry_count_for_budget(900, false), 1);
        assert_eq!(symmetry_count_for_budget(5000, true), 1);
    }
}
