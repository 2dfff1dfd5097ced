//! Error types for the malaria detection service.
//!
//! The model manager surfaces five failure classes with different
//! recovery semantics: bad catalog configuration is fatal at startup,
//! unknown model ids are caller errors, artifact fetch failures are
//! retryable, deserialization failures are not, and inference failures
//! carry the offending model id.

use thiserror::Error;

/// Main error type for model manager operations.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The model catalog is unparseable or inconsistent. Fatal at
    /// startup; there is no partial-catalog mode.
    #[error("invalid model catalog: {0}")]
    Config(String),

    /// The requested model id is not registered.
    #[error("model not found: {0}")]
    NotFound(String),

    /// The model artifact could not be retrieved from remote storage.
    /// Retryable by the caller; the fetcher itself does not retry.
    #[error("failed to fetch artifact for model {model_id}: {reason}")]
    Fetch { model_id: String, reason: String },

    /// The artifact was retrieved but could not be deserialized into a
    /// usable model. Not retryable without operator intervention.
    #[error("failed to load model {model_id}: {reason}")]
    Load { model_id: String, reason: String },

    /// The model executed but failed on this input, or every model in
    /// an ensemble call failed.
    #[error("inference failed for model {model_id}: {reason}")]
    Inference { model_id: String, reason: String },

    /// The uploaded image failed validation or could not be decoded.
    #[error("invalid image: {0}")]
    InvalidImage(String),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ServiceError>;

impl ServiceError {
    /// Whether retrying the same request may succeed without operator
    /// intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Fetch { .. })
    }

    /// Fetch error helper.
    pub fn fetch(model_id: impl Into<String>, reason: impl Into<String>) -> Self {
        ServiceError::Fetch {
            model_id: model_id.into(),
            reason: reason.into(),
        }
    }

    /// Load error helper.
    pub fn load(model_id: impl Into<String>, reason: impl Into<String>) -> Self {
        ServiceError::Load {
            model_id: model_id.into(),
            reason: reason.into(),
        }
    }

    /// Inference error helper.
    pub fn inference(model_id: impl Into<String>, reason: impl Into<String>) -> Self {
        ServiceError::Inference {
            model_id: model_id.into(),
            reason: reason.into(),
        }
    }
}
