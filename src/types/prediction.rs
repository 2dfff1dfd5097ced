//! Prediction result data structures

use serde::{Deserialize, Serialize};

/// Binary classification verdict for a blood-smear image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Parasitized,
    Uninfected,
}

impl Verdict {
    /// Classify a raw positive-class probability.
    ///
    /// The threshold is strict: exactly 0.5 classifies as uninfected.
    pub fn from_probability(raw_probability: f64) -> Self {
        if raw_probability > 0.5 {
            Verdict::Parasitized
        } else {
            Verdict::Uninfected
        }
    }

    /// Human-readable label used in API responses.
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Parasitized => "Parasitized",
            Verdict::Uninfected => "Uninfected",
        }
    }
}

/// Result of a single-model classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Model identifier from the catalog
    pub model_id: String,

    /// Human-readable model name
    pub model_name: String,

    /// Classification label
    pub prediction: String,

    /// Whether the sample was classified as parasitized
    pub is_parasitized: bool,

    /// Raw positive-class probability (0.0 - 1.0)
    pub raw_probability: f64,

    /// Confidence in the verdict, as a percentage
    pub confidence: f64,

    /// Probability the sample is parasitized, as a percentage
    pub probability_parasitized: f64,

    /// Probability the sample is uninfected, as a percentage
    pub probability_uninfected: f64,

    /// Measured inference time in milliseconds
    pub inference_time_ms: f64,
}

impl PredictionResult {
    /// Build a result from a model's raw positive-class probability.
    pub fn from_probability(
        model_id: &str,
        model_name: &str,
        raw_probability: f64,
        inference_time_ms: f64,
    ) -> Self {
        let verdict = Verdict::from_probability(raw_probability);
        let confidence = if verdict == Verdict::Parasitized {
            raw_probability
        } else {
            1.0 - raw_probability
        };

        Self {
            model_id: model_id.to_string(),
            model_name: model_name.to_string(),
            prediction: verdict.label().to_string(),
            is_parasitized: verdict == Verdict::Parasitized,
            raw_probability,
            confidence: confidence * 100.0,
            probability_parasitized: raw_probability * 100.0,
            probability_uninfected: (1.0 - raw_probability) * 100.0,
            inference_time_ms,
        }
    }

    /// The verdict as an enum.
    pub fn verdict(&self) -> Verdict {
        if self.is_parasitized {
            Verdict::Parasitized
        } else {
            Verdict::Uninfected
        }
    }
}

/// Result of combining all registered models into a weighted verdict.
///
/// Same shape as [`PredictionResult`] plus the normalized weight vector
/// that produced the combined probability. The weights always refer to
/// the surviving model subset, in the order of `per_model` results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleResult {
    pub model_id: String,
    pub model_name: String,
    pub prediction: String,
    pub is_parasitized: bool,
    pub raw_probability: f64,
    pub confidence: f64,
    pub probability_parasitized: f64,
    pub probability_uninfected: f64,

    /// Normalized accuracy weights applied to each surviving model
    pub weights: Vec<f64>,
}

impl EnsembleResult {
    /// Build an ensemble result from the combined probability and the
    /// weight vector used to compute it.
    pub fn from_probability(raw_probability: f64, weights: Vec<f64>) -> Self {
        let verdict = Verdict::from_probability(raw_probability);
        let confidence = if verdict == Verdict::Parasitized {
            raw_probability
        } else {
            1.0 - raw_probability
        };

        Self {
            model_id: "ensemble".to_string(),
            model_name: "Ensemble (Weighted Average)".to_string(),
            prediction: verdict.label().to_string(),
            is_parasitized: verdict == Verdict::Parasitized,
            raw_probability,
            confidence: confidence * 100.0,
            probability_parasitized: raw_probability * 100.0,
            probability_uninfected: (1.0 - raw_probability) * 100.0,
            weights,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probabilities_are_complementary() {
        for &p in &[0.0, 0.1, 0.5, 0.73, 0.999, 1.0] {
            let result = PredictionResult::from_probability("model_1", "CNN", p, 10.0);
            let sum = result.probability_parasitized + result.probability_uninfected;
            assert!((sum - 100.0).abs() < 1e-6, "p={p} sum={sum}");
        }
    }

    #[test]
    fn test_threshold_is_strict() {
        // Exactly 0.5 classifies as uninfected with 50% confidence.
        let boundary = PredictionResult::from_probability("model_1", "CNN", 0.5, 10.0);
        assert!(!boundary.is_parasitized);
        assert_eq!(boundary.prediction, "Uninfected");
        assert!((boundary.confidence - 50.0).abs() < 1e-6);

        let above = PredictionResult::from_probability("model_1", "CNN", 0.500001, 10.0);
        assert!(above.is_parasitized);
    }

    #[test]
    fn test_confidence_tracks_winning_class() {
        let positive = PredictionResult::from_probability("model_1", "CNN", 0.9, 10.0);
        assert!((positive.confidence - 90.0).abs() < 1e-6);

        let negative = PredictionResult::from_probability("model_1", "CNN", 0.2, 10.0);
        assert!((negative.confidence - 80.0).abs() < 1e-6);
    }

    #[test]
    fn test_ensemble_result_shape() {
        let result = EnsembleResult::from_probability(0.6125, vec![0.375, 0.333, 0.292]);
        assert_eq!(result.model_id, "ensemble");
        assert!(result.is_parasitized);
        assert!((result.confidence - 61.25).abs() < 1e-6);
        assert_eq!(result.weights.len(), 3);
    }

    #[test]
    fn test_serialization_round_trip() {
        let result = PredictionResult::from_probability("model_2", "VGG Deep", 0.87, 24.0);
        let json = serde_json::to_string(&result).unwrap();
        let deserialized: PredictionResult = serde_json::from_str(&json).unwrap();
        assert_eq!(result.model_id, deserialized.model_id);
        assert_eq!(result.is_parasitized, deserialized.is_parasitized);
        assert_eq!(result.raw_probability, deserialized.raw_probability);
    }
}
