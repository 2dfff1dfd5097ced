//! Model catalog loading and validation.
//!
//! The registry owns the static side of the model manager: the
//! declarative YAML catalog of model descriptors. Loading the catalog
//! touches neither the network nor the model artifacts; it only
//! validates that the descriptor set is usable before the service
//! starts taking requests.

use crate::error::{Result, ServiceError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Serialization formats the loader understands.
///
/// Validated at catalog-load time so an unsupported format fails at
/// startup instead of at first use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFormat {
    /// Standard ONNX protobuf graph
    Onnx,
    /// ONNX Runtime optimized format
    Ort,
}

/// Static metadata for one model: identity, reported accuracy, and how
/// to obtain the artifact.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelDescriptor {
    /// Unique catalog key
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Validation accuracy in [0, 1]; doubles as the ensemble weight
    pub accuracy: f64,

    /// Expected inference latency, informational
    #[serde(default)]
    pub inference_time_ms: f64,

    /// Parameter count description, informational
    #[serde(default)]
    pub parameters: String,

    /// Recommended use case label, informational
    #[serde(default)]
    pub use_case: String,

    /// Selects the fallback model when a caller omits a model id.
    /// At most one descriptor may carry this flag.
    #[serde(default)]
    pub is_default: bool,

    /// Remote backend scheme, e.g. "huggingface"
    pub remote: String,

    /// Remote artifact address
    pub url: String,

    /// Destination path on local durable storage
    pub local_path: PathBuf,

    /// Artifact serialization format
    pub format: ModelFormat,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    models: Vec<ModelDescriptor>,
}

/// Model recommendations by use case, derived from catalog metadata.
#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    /// Lowest expected latency
    pub speed: String,
    /// Highest reported accuracy
    pub accuracy: String,
    /// The catalog default
    pub production: String,
    /// Maximum precision across all models
    pub ensemble: String,
}

/// Immutable, validated view of the model catalog.
pub struct ModelRegistry {
    descriptors: Vec<Arc<ModelDescriptor>>,
    by_id: HashMap<String, usize>,
    default_id: String,
}

impl ModelRegistry {
    /// Load and validate the catalog from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ServiceError::Config(format!("cannot read catalog {}: {e}", path.display()))
        })?;

        let catalog: CatalogFile = serde_yaml::from_str(&raw)
            .map_err(|e| ServiceError::Config(format!("cannot parse catalog: {e}")))?;

        let registry = Self::from_descriptors(catalog.models)?;
        info!(
            catalog = %path.display(),
            models = registry.len(),
            default = %registry.default_id(),
            "Model catalog loaded"
        );
        Ok(registry)
    }

    /// Validate a descriptor list directly. Used by tests and by
    /// callers that source the catalog elsewhere.
    pub fn from_descriptors(descriptors: Vec<ModelDescriptor>) -> Result<Self> {
        if descriptors.is_empty() {
            return Err(ServiceError::Config("catalog declares no models".into()));
        }

        let mut by_id = HashMap::new();
        let mut default_id = None;

        for (index, descriptor) in descriptors.iter().enumerate() {
            if descriptor.id.is_empty() {
                return Err(ServiceError::Config(format!(
                    "descriptor #{index} has an empty id"
                )));
            }
            if !(0.0..=1.0).contains(&descriptor.accuracy) {
                return Err(ServiceError::Config(format!(
                    "model {} declares accuracy {} outside [0, 1]",
                    descriptor.id, descriptor.accuracy
                )));
            }
            if by_id.insert(descriptor.id.clone(), index).is_some() {
                return Err(ServiceError::Config(format!(
                    "duplicate model id: {}",
                    descriptor.id
                )));
            }
            if descriptor.is_default {
                if let Some(previous) = default_id.replace(descriptor.id.clone()) {
                    return Err(ServiceError::Config(format!(
                        "both {previous} and {} are flagged default",
                        descriptor.id
                    )));
                }
            }
        }

        let default_id = default_id
            .ok_or_else(|| ServiceError::Config("no model is flagged as default".into()))?;

        Ok(Self {
            descriptors: descriptors.into_iter().map(Arc::new).collect(),
            by_id,
            default_id,
        })
    }

    /// Descriptors in catalog order.
    pub fn descriptors(&self) -> &[Arc<ModelDescriptor>] {
        &self.descriptors
    }

    /// Look up a descriptor by id.
    pub fn get(&self, id: &str) -> Result<&Arc<ModelDescriptor>> {
        self.by_id
            .get(id)
            .map(|&index| &self.descriptors[index])
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// The catalog-declared default model id.
    pub fn default_id(&self) -> &str {
        &self.default_id
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Recommend a model per use case from catalog metadata.
    pub fn recommendation(&self) -> Recommendation {
        let fastest = self
            .descriptors
            .iter()
            .min_by(|a, b| a.inference_time_ms.total_cmp(&b.inference_time_ms))
            .map(|d| d.id.clone())
            .unwrap_or_else(|| self.default_id.clone());
        let most_accurate = self
            .descriptors
            .iter()
            .max_by(|a, b| a.accuracy.total_cmp(&b.accuracy))
            .map(|d| d.id.clone())
            .unwrap_or_else(|| self.default_id.clone());

        Recommendation {
            speed: fastest,
            accuracy: most_accurate,
            production: self.default_id.clone(),
            ensemble: "ensemble".to_string(),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Descriptor fixture used across the models module tests.
    pub fn descriptor(id: &str, accuracy: f64, is_default: bool) -> ModelDescriptor {
        ModelDescriptor {
            id: id.to_string(),
            name: format!("Model {id}"),
            accuracy,
            inference_time_ms: 10.0,
            parameters: "1.2M".to_string(),
            use_case: "test".to_string(),
            is_default,
            remote: "huggingface".to_string(),
            url: format!("https://huggingface.co/acme/malaria-models/resolve/main/{id}.onnx"),
            local_path: PathBuf::from(format!("models/{id}.onnx")),
            format: ModelFormat::Onnx,
        }
    }
}
