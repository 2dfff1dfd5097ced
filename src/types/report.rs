//! Multi-model comparison report data structures

use crate::types::prediction::{EnsembleResult, PredictionResult, Verdict};
use serde::{Deserialize, Serialize};

/// Majority-vote summary across all models for one input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusSummary {
    /// Verdict of the strict majority. An even split resolves to
    /// uninfected; see [`crate::models::consensus`].
    pub majority_vote: Verdict,

    /// Share of models on the winning side, as a percentage
    pub agreement_percentage: f64,

    /// True when every model produced the same verdict
    pub unanimous: bool,
}

/// A pair of models that classified the same input with opposite
/// verdicts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairwiseDisagreement {
    pub model_a: String,
    pub model_b: String,
    /// Absolute difference between the two confidence percentages
    pub confidence_delta: f64,
}

/// A model that failed during an ensemble call and was excluded from
/// the combined verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelFailure {
    pub model_id: String,
    pub error: String,
}

/// Full multi-model comparison for one input image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    /// Number of models that produced a result
    pub models_compared: usize,

    /// Per-model results, in catalog order, failures omitted
    pub predictions: Vec<PredictionResult>,

    /// Accuracy-weighted combination of the surviving models
    pub ensemble: EnsembleResult,

    /// Majority-vote summary
    pub consensus: ConsensusSummary,

    /// Every unordered pair of models with opposite verdicts
    pub disagreements: Vec<PairwiseDisagreement>,

    /// Models excluded because their inference failed
    pub failures: Vec<ModelFailure>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_serialization() {
        let report = ComparisonReport {
            models_compared: 2,
            predictions: vec![
                PredictionResult::from_probability("model_1", "CNN", 0.9, 10.0),
                PredictionResult::from_probability("model_2", "VGG", 0.4, 20.0),
            ],
            ensemble: EnsembleResult::from_probability(0.65, vec![0.5, 0.5]),
            consensus: ConsensusSummary {
                majority_vote: Verdict::Uninfected,
                agreement_percentage: 50.0,
                unanimous: false,
            },
            disagreements: vec![PairwiseDisagreement {
                model_a: "CNN".to_string(),
                model_b: "VGG".to_string(),
                confidence_delta: 30.0,
            }],
            failures: vec![],
        };

        let json = serde_json::to_string(&report).unwrap();
        let deserialized: ComparisonReport = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.models_compared, 2);
        assert_eq!(deserialized.disagreements.len(), 1);
        assert_eq!(deserialized.consensus.majority_vote, Verdict::Uninfected);
    }
}
