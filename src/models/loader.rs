//! ONNX model deserialization.
//!
//! Turns a fetched artifact into an in-memory, inference-capable
//! handle. The artifact format comes from the descriptor's validated
//! [`ModelFormat`]; both supported formats load through ONNX Runtime.

use crate::error::{Result, ServiceError};
use crate::models::registry::{ModelDescriptor, ModelFormat};
use crate::preprocess::ImageTensor;
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

/// An inference-capable model handle.
///
/// Handles are immutable once created and shared across request tasks;
/// `predict_probability` returns the positive-class (parasitized)
/// probability for one normalized image tensor.
pub trait InferenceModel: Send + Sync {
    fn predict_probability(&self, tensor: &ImageTensor) -> Result<f64>;
}

impl std::fmt::Debug for dyn InferenceModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("InferenceModel")
    }
}

/// Deserializes a fetched artifact into an inference handle.
///
/// Trait-based for the same reason as the fetcher: tests substitute a
/// counting stub to pin down the lazy-load guarantees.
pub trait ArtifactLoader: Send + Sync {
    fn load(&self, descriptor: &ModelDescriptor, artifact: &Path) -> Result<Arc<dyn InferenceModel>>;
}

/// Handle backed by an ONNX Runtime session.
pub struct OnnxModel {
    model_id: String,
    input_name: String,
    output_name: String,
    // ort sessions take &mut to run; the lock serializes calls into one
    // session while different models still run in parallel.
    session: Mutex<Session>,
}

impl InferenceModel for OnnxModel {
    fn predict_probability(&self, tensor: &ImageTensor) -> Result<f64> {
        use ort::value::Tensor;

        let shape: Vec<i64> = tensor.shape().to_vec();
        let input = Tensor::from_array((shape, tensor.data().to_vec()))
            .map_err(|e| ServiceError::inference(&self.model_id, format!("input tensor: {e}")))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| ServiceError::inference(&self.model_id, format!("session lock: {e}")))?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input])
            .map_err(|e| ServiceError::inference(&self.model_id, e.to_string()))?;

        let output = outputs.get(self.output_name.as_str()).ok_or_else(|| {
            ServiceError::inference(
                &self.model_id,
                format!("output {} missing from session results", self.output_name),
            )
        })?;

        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| ServiceError::inference(&self.model_id, format!("output tensor: {e}")))?;

        let dims: Vec<i64> = shape.iter().copied().collect();
        positive_probability(&dims, data)
            .ok_or_else(|| ServiceError::inference(&self.model_id, "empty output tensor"))
    }
}

/// Extract the positive-class probability from a classifier output.
///
/// Handles both `[batch, 2]` softmax heads (index 1 is the positive
/// class) and `[batch, 1]` sigmoid heads.
fn positive_probability(dims: &[i64], data: &[f32]) -> Option<f64> {
    let classes = match dims {
        [_, n] => *n as usize,
        [n] => *n as usize,
        _ => data.len(),
    };
    match classes {
        0 => None,
        1 => data.first().map(|&v| v as f64),
        _ => data.get(1).map(|&v| v as f64),
    }
}

/// Loader for ONNX model artifacts.
pub struct ModelLoader {
    /// Number of intra-op threads per session
    onnx_threads: usize,
}

impl ModelLoader {
    /// Create a loader and initialize the ONNX Runtime environment.
    pub fn new(onnx_threads: usize) -> Result<Self> {
        ort::init()
            .commit()
            .map_err(|e| ServiceError::Config(format!("onnx runtime init: {e}")))?;
        info!(onnx_threads, "ONNX Runtime initialized");
        Ok(Self { onnx_threads })
    }

    fn load_onnx(
        &self,
        descriptor: &ModelDescriptor,
        artifact: &Path,
    ) -> Result<Arc<dyn InferenceModel>> {
        info!(
            model = %descriptor.id,
            path = %artifact.display(),
            threads = self.onnx_threads,
            "Loading ONNX model"
        );

        let session = Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.with_intra_threads(self.onnx_threads))
            .and_then(|b| b.commit_from_file(artifact))
            .map_err(|e| ServiceError::load(&descriptor.id, e.to_string()))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "input".to_string());

        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob") || o.name.contains("output"))
            .or_else(|| session.outputs.last())
            .map(|o| o.name.clone())
            .unwrap_or_else(|| "output".to_string());

        info!(
            model = %descriptor.id,
            input = %input_name,
            output = %output_name,
            "Model loaded"
        );

        Ok(Arc::new(OnnxModel {
            model_id: descriptor.id.clone(),
            input_name,
            output_name,
            session: Mutex::new(session),
        }))
    }
}

impl ArtifactLoader for ModelLoader {
    fn load(
        &self,
        descriptor: &ModelDescriptor,
        artifact: &Path,
    ) -> Result<Arc<dyn InferenceModel>> {
        match descriptor.format {
            ModelFormat::Onnx | ModelFormat::Ort => self.load_onnx(descriptor, artifact),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_probability_from_sigmoid_head() {
        let p = positive_probability(&[1, 1], &[0.83]).unwrap();
        assert!((p - 0.83f32 as f64).abs() < 1e-9);
    }

    #[test]
    fn test_positive_probability_from_softmax_head() {
        let p = positive_probability(&[1, 2], &[0.3, 0.7]).unwrap();
        assert!((p - 0.7f32 as f64).abs() < 1e-9);
    }

    #[test]
    fn test_positive_probability_empty_output() {
        assert_eq!(positive_probability(&[1, 0], &[]), None);
    }
}
