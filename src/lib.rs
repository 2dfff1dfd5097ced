//! Malaria Detection Service Library
//!
//! A web API that classifies microscope blood-smear images as
//! parasitized or uninfected using multiple interchangeable deep
//! learning models, with lazy artifact download, weighted ensemble
//! inference, and multi-model consensus analysis.

pub mod api;
pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod preprocess;
pub mod types;

pub use config::AppConfig;
pub use error::{Result, ServiceError};
pub use models::inference::InferenceEngine;
pub use preprocess::{ImagePreprocessor, ImageTensor};
pub use types::{ComparisonReport, EnsembleResult, PredictionResult};
