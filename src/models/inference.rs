//! Multi-model inference engine for malaria detection.
//!
//! Single-model prediction resolves a handle through the lazy cache
//! and maps the raw positive-class probability into the response
//! shape. Ensemble prediction runs every registered model, excludes
//! (and reports) failures, and combines the survivors under
//! accuracy-derived weights.

use crate::error::{Result, ServiceError};
use crate::models::aggregator;
use crate::models::cache::{ModelCache, ModelInfo};
use crate::models::consensus;
use crate::models::registry::Recommendation;
use crate::preprocess::ImageTensor;
use crate::types::prediction::{EnsembleResult, PredictionResult};
use crate::types::report::{ComparisonReport, ModelFailure};
use std::time::Instant;
use tracing::{debug, warn};

/// Result of running every registered model on one input.
#[derive(Debug, Clone)]
pub struct EnsembleOutcome {
    /// Surviving per-model results, in catalog order
    pub per_model: Vec<PredictionResult>,
    /// Weighted combination of the survivors
    pub ensemble: EnsembleResult,
    /// Models excluded because their inference failed
    pub failures: Vec<ModelFailure>,
}

/// Inference engine over the lazily materialized model set.
///
/// Constructed once at process start and shared by reference across
/// request handlers; never reached through ambient global state.
pub struct InferenceEngine {
    cache: ModelCache,
}

impl InferenceEngine {
    pub fn new(cache: ModelCache) -> Self {
        Self { cache }
    }

    /// Number of registered models.
    pub fn model_count(&self) -> usize {
        self.cache.registry().len()
    }

    /// Catalog entries plus load state for the API surface.
    pub fn models_info(&self) -> Vec<ModelInfo> {
        self.cache.models_info()
    }

    /// Use-case recommendations derived from catalog metadata.
    pub fn recommendation(&self) -> Recommendation {
        self.cache.registry().recommendation()
    }

    /// The model used when callers omit an explicit id.
    pub fn default_id(&self) -> String {
        self.cache.default_id()
    }

    /// Change the fallback model id.
    pub fn set_default(&self, id: &str) -> Result<()> {
        self.cache.set_default(id)
    }

    /// Classify one image with a single model.
    ///
    /// Falls back to the current default model when `model_id` is
    /// omitted. Materializes the model on first use.
    pub async fn predict(
        &self,
        tensor: &ImageTensor,
        model_id: Option<&str>,
    ) -> Result<PredictionResult> {
        let id = match model_id {
            Some(id) => id.to_string(),
            None => self.cache.default_id(),
        };
        let descriptor = self.cache.registry().get(&id)?.clone();
        let handle = self.cache.resolve(&id).await?;

        // Inference is synchronous and CPU-bound; run it off the async
        // workers. The handle is immutable shared state, the tensor is
        // request-scoped input.
        let input = tensor.clone();
        let started = Instant::now();
        let raw_probability =
            tokio::task::spawn_blocking(move || handle.predict_probability(&input))
                .await
                .map_err(|e| ServiceError::inference(&id, format!("inference task: {e}")))??;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        debug!(
            model = %descriptor.id,
            raw_probability,
            inference_time_ms = elapsed_ms,
            "Prediction complete"
        );

        Ok(PredictionResult::from_probability(
            &descriptor.id,
            &descriptor.name,
            raw_probability,
            elapsed_ms,
        ))
    }

    /// Classify one image with every registered model and combine the
    /// results into a weighted ensemble verdict.
    ///
    /// A failing model is logged, excluded from the per-model results,
    /// and dropped from the weight normalization; the exclusion stays
    /// visible in `failures`. The call fails only when every model
    /// fails.
    pub async fn predict_all(&self, tensor: &ImageTensor) -> Result<EnsembleOutcome> {
        let ids: Vec<String> = self
            .cache
            .registry()
            .descriptors()
            .iter()
            .map(|d| d.id.clone())
            .collect();

        let mut per_model = Vec::with_capacity(ids.len());
        let mut accuracies = Vec::with_capacity(ids.len());
        let mut failures = Vec::new();

        for id in &ids {
            match self.predict(tensor, Some(id)).await {
                Ok(result) => {
                    accuracies.push(self.cache.registry().get(id)?.accuracy);
                    per_model.push(result);
                }
                Err(e) => {
                    warn!(model = %id, error = %e, "Model failed during ensemble, excluding");
                    failures.push(ModelFailure {
                        model_id: id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        if per_model.is_empty() {
            return Err(ServiceError::inference(
                "ensemble",
                format!("all {} models failed", ids.len()),
            ));
        }

        let weights = aggregator::normalized_weights(&accuracies);
        let probabilities: Vec<f64> = per_model.iter().map(|p| p.raw_probability).collect();
        let combined = aggregator::weighted_probability(&probabilities, &weights);

        debug!(
            survivors = per_model.len(),
            failed = failures.len(),
            combined,
            "Ensemble complete"
        );

        Ok(EnsembleOutcome {
            per_model,
            ensemble: EnsembleResult::from_probability(combined, weights),
            failures,
        })
    }

    /// Run every model on one image and analyze their agreement.
    pub async fn compare(&self, tensor: &ImageTensor) -> Result<ComparisonReport> {
        let outcome = self.predict_all(tensor).await?;
        let consensus = consensus::summarize(&outcome.per_model);
        let disagreements = consensus::disagreements(&outcome.per_model);

        Ok(ComparisonReport {
            models_compared: outcome.per_model.len(),
            predictions: outcome.per_model,
            ensemble: outcome.ensemble,
            consensus,
            disagreements,
            failures: outcome.failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::cache::test_support::{CountingFetcher, StubLoader};
    use crate::models::registry::test_support::descriptor;
    use crate::models::registry::ModelRegistry;
    use crate::types::prediction::Verdict;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn engine_with(probs: HashMap<String, f64>, load_failures: Vec<String>) -> InferenceEngine {
        let registry = Arc::new(
            ModelRegistry::from_descriptors(vec![
                descriptor("model_1", 0.9, false),
                descriptor("model_2", 0.8, true),
                descriptor("model_3", 0.7, false),
            ])
            .unwrap(),
        );
        let mut loader = StubLoader::new(probs);
        loader.load_failures = load_failures;
        let cache = ModelCache::new(registry, Arc::new(CountingFetcher::new()), Arc::new(loader));
        InferenceEngine::new(cache)
    }

    fn tensor() -> ImageTensor {
        ImageTensor::from_values(64, vec![0.5; 64 * 64 * 3]).unwrap()
    }

    fn all_probs() -> HashMap<String, f64> {
        HashMap::from([
            ("model_1".to_string(), 0.9),
            ("model_2".to_string(), 0.3),
            ("model_3".to_string(), 0.6),
        ])
    }

    #[tokio::test]
    async fn test_predict_uses_default_when_id_omitted() {
        let engine = engine_with(all_probs(), vec![]);
        let result = engine.predict(&tensor(), None).await.unwrap();
        assert_eq!(result.model_id, "model_2");
        assert!(!result.is_parasitized);
        assert!((result.probability_parasitized - 30.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_predict_explicit_model() {
        let engine = engine_with(all_probs(), vec![]);
        let result = engine.predict(&tensor(), Some("model_1")).await.unwrap();
        assert_eq!(result.model_id, "model_1");
        assert!(result.is_parasitized);
        assert!((result.confidence - 90.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_predict_unknown_model() {
        let engine = engine_with(all_probs(), vec![]);
        let err = engine.predict(&tensor(), Some("model_9")).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_ensemble_reference_fixture() {
        // Accuracies [0.9, 0.8, 0.7], probabilities [0.9, 0.3, 0.6]:
        // combined ~0.6125, classified parasitized.
        let engine = engine_with(all_probs(), vec![]);
        let outcome = engine.predict_all(&tensor()).await.unwrap();

        assert_eq!(outcome.per_model.len(), 3);
        assert!(outcome.failures.is_empty());
        assert!((outcome.ensemble.weights.iter().sum::<f64>() - 1.0).abs() < 1e-6);
        assert!((outcome.ensemble.raw_probability - 0.6125).abs() < 1e-4);
        assert!(outcome.ensemble.is_parasitized);
        assert!((outcome.ensemble.confidence - 61.25).abs() < 1e-2);
    }

    #[tokio::test]
    async fn test_one_model_failing_is_excluded_and_visible() {
        // model_2 materializes but fails at inference time.
        let probs = HashMap::from([
            ("model_1".to_string(), 0.9),
            ("model_3".to_string(), 0.6),
        ]);
        let engine = engine_with(probs, vec![]);
        let outcome = engine.predict_all(&tensor()).await.unwrap();

        assert_eq!(outcome.per_model.len(), 2);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].model_id, "model_2");

        // Weights renormalized over the survivors: [0.9, 0.7] / 1.6.
        assert_eq!(outcome.ensemble.weights.len(), 2);
        assert!((outcome.ensemble.weights[0] - 0.9 / 1.6).abs() < 1e-9);
        assert!((outcome.ensemble.weights[1] - 0.7 / 1.6).abs() < 1e-9);
        let expected = 0.9 * (0.9 / 1.6) + 0.6 * (0.7 / 1.6);
        assert!((outcome.ensemble.raw_probability - expected).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_all_models_failing_is_inference_error() {
        let engine = engine_with(HashMap::new(), vec![]);
        let err = engine.predict_all(&tensor()).await.unwrap_err();
        match err {
            ServiceError::Inference { model_id, .. } => assert_eq!(model_id, "ensemble"),
            other => panic!("expected inference error, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_load_failure_excluded_from_ensemble() {
        // model_3's artifact is corrupt; the other two carry the vote.
        let engine = engine_with(all_probs(), vec!["model_3".to_string()]);
        let outcome = engine.predict_all(&tensor()).await.unwrap();

        assert_eq!(outcome.per_model.len(), 2);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].model_id, "model_3");
        assert!((outcome.ensemble.weights.iter().sum::<f64>() - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_compare_report() {
        let engine = engine_with(all_probs(), vec![]);
        let report = engine.compare(&tensor()).await.unwrap();

        assert_eq!(report.models_compared, 3);
        // 2 of 3 positive: majority parasitized, not unanimous.
        assert_eq!(report.consensus.majority_vote, Verdict::Parasitized);
        assert!(!report.consensus.unanimous);
        assert!((report.consensus.agreement_percentage - 2.0 / 3.0 * 100.0).abs() < 1e-9);
        // model_2 disagrees with both others.
        assert_eq!(report.disagreements.len(), 2);
    }

    #[tokio::test]
    async fn test_set_default_changes_predict_fallback() {
        let engine = engine_with(all_probs(), vec![]);
        engine.set_default("model_1").unwrap();
        let result = engine.predict(&tensor(), None).await.unwrap();
        assert_eq!(result.model_id, "model_1");
    }
}
