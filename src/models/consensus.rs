//! Consensus analysis across per-model predictions.
//!
//! Pure functions over a slice of per-model results: majority vote,
//! agreement strength, unanimity, and the pairwise disagreement list.
//!
//! Tie-break: the majority vote is parasitized only when the positive
//! count is STRICTLY greater than half. An even split therefore
//! resolves to uninfected. This mirrors the historical behavior and is
//! pending product-owner confirmation; do not change it silently.

use crate::types::prediction::{PredictionResult, Verdict};
use crate::types::report::{ConsensusSummary, PairwiseDisagreement};

/// Majority-vote summary for a non-empty prediction set.
pub fn summarize(predictions: &[PredictionResult]) -> ConsensusSummary {
    let total = predictions.len();
    let positive = predictions.iter().filter(|p| p.is_parasitized).count();
    let negative = total - positive;

    let majority_vote = if positive * 2 > total {
        Verdict::Parasitized
    } else {
        Verdict::Uninfected
    };

    ConsensusSummary {
        majority_vote,
        agreement_percentage: positive.max(negative) as f64 / total as f64 * 100.0,
        unanimous: positive == 0 || positive == total,
    }
}

/// Every unordered pair of models with opposite verdicts, with the
/// absolute confidence delta.
///
/// Quadratic in the model count, which stays in the single digits.
pub fn disagreements(predictions: &[PredictionResult]) -> Vec<PairwiseDisagreement> {
    let mut found = Vec::new();
    for (index, first) in predictions.iter().enumerate() {
        for second in &predictions[index + 1..] {
            if first.is_parasitized != second.is_parasitized {
                found.push(PairwiseDisagreement {
                    model_a: first.model_name.clone(),
                    model_b: second.model_name.clone(),
                    confidence_delta: (first.confidence - second.confidence).abs(),
                });
            }
        }
    }
    found
}
