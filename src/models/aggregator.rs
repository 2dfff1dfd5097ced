//! Accuracy-weighted score aggregation for the model ensemble.
//!
//! Weights come from the catalog's static per-model accuracy metadata,
//! normalized to sum to 1 over whichever models are currently in play.
//! They are recomputed per call, never cached independently of the
//! registry's membership, so a model excluded for failing simply drops
//! out of the normalization.

/// Normalize per-model accuracies into ensemble weights summing to 1.
///
/// A degenerate all-zero accuracy set falls back to equal weights.
pub fn normalized_weights(accuracies: &[f64]) -> Vec<f64> {
    if accuracies.is_empty() {
        return Vec::new();
    }
    let total: f64 = accuracies.iter().sum();
    if total <= 0.0 {
        let equal = 1.0 / accuracies.len() as f64;
        return vec![equal; accuracies.len()];
    }
    accuracies.iter().map(|a| a / total).collect()
}

/// Weighted mean of positive-class probabilities.
///
/// `probabilities` and `weights` are parallel vectors over the same
/// surviving model subset; weights are assumed normalized.
pub fn weighted_probability(probabilities: &[f64], weights: &[f64]) -> f64 {
    debug_assert_eq!(probabilities.len(), weights.len());
    probabilities
        .iter()
        .zip(weights)
        .map(|(p, w)| p * w)
        .sum::<f64>()
        .clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weights_sum_to_one() {
        for accuracies in [
            vec![0.9, 0.8, 0.7],
            vec![0.5],
            vec![0.99, 0.01],
            vec![0.3, 0.3, 0.3, 0.3],
        ] {
            let weights = normalized_weights(&accuracies);
            let sum: f64 = weights.iter().sum();
            assert!((sum - 1.0).abs() < 1e-6, "{accuracies:?} -> {weights:?}");
        }
    }

    #[test]
    fn test_reference_ensemble() {
        // Accuracies [0.9, 0.8, 0.7] with probabilities [0.9, 0.3, 0.6]
        // combine to ~0.6125, a positive classification.
        let weights = normalized_weights(&[0.9, 0.8, 0.7]);
        assert!((weights[0] - 0.375).abs() < 1e-3);
        assert!((weights[1] - 0.333).abs() < 1e-3);
        assert!((weights[2] - 0.292).abs() < 1e-3);

        let p = weighted_probability(&[0.9, 0.3, 0.6], &weights);
        assert!((p - 0.6125).abs() < 1e-4);
        assert!(p > 0.5);
    }

    #[test]
    fn test_renormalization_over_surviving_subset() {
        // Dropping a member renormalizes the rest to sum 1 again.
        let survivors = normalized_weights(&[0.9, 0.7]);
        assert!((survivors[0] - 0.9 / 1.6).abs() < 1e-9);
        assert!((survivors[1] - 0.7 / 1.6).abs() < 1e-9);
        assert!((survivors.iter().sum::<f64>() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_accuracy_falls_back_to_equal_weights() {
        let weights = normalized_weights(&[0.0, 0.0]);
        assert_eq!(weights, vec![0.5, 0.5]);
    }

    #[test]
    fn test_empty_input() {
        assert!(normalized_weights(&[]).is_empty());
    }
}
