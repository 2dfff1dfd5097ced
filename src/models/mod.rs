//! Model management: catalog, lazy materialization, inference,
//! ensemble combination, and consensus analysis.

pub mod aggregator;
pub mod cache;
pub mod consensus;
pub mod fetcher;
pub mod inference;
pub mod loader;
pub mod registry;

pub use cache::{ModelCache, ModelInfo};
pub use fetcher::{ArtifactFetcher, HubFetcher};
pub use inference::{EnsembleOutcome, InferenceEngine};
pub use loader::{ArtifactLoader, InferenceModel, ModelLoader};
pub use registry::{ModelDescriptor, ModelFormat, ModelRegistry};
