//! Lazy model materialization.
//!
//! One [`ModelSlot`] per catalog descriptor, created empty at startup.
//! The first resolve for a model id fetches the artifact and
//! deserializes it under per-slot single-flight, so N concurrent first
//! requests produce exactly one fetch and one load. A materialized
//! handle is never replaced or evicted for the process lifetime;
//! changing the default model only moves a pointer.

use crate::error::{Result, ServiceError};
use crate::models::fetcher::ArtifactFetcher;
use crate::models::loader::{ArtifactLoader, InferenceModel};
use crate::models::registry::{ModelDescriptor, ModelRegistry};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::{Mutex, OnceCell};
use tracing::info;

/// Mutable cell holding one model's lazily materialized handle.
struct ModelSlot {
    descriptor: Arc<ModelDescriptor>,
    handle: OnceCell<Arc<dyn InferenceModel>>,
    /// Serializes load attempts so concurrent first requests coalesce
    /// onto one fetch-and-load.
    inflight: Mutex<()>,
}

impl ModelSlot {
    fn new(descriptor: Arc<ModelDescriptor>) -> Self {
        Self {
            descriptor,
            handle: OnceCell::new(),
            inflight: Mutex::new(()),
        }
    }

    fn is_loaded(&self) -> bool {
        self.handle.initialized()
    }
}

/// Catalog entry plus runtime load state, for the models API surface.
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub accuracy: f64,
    pub inference_time_ms: f64,
    pub parameters: String,
    pub use_case: String,
    pub is_default: bool,
    pub loaded: bool,
}

/// Process-wide table of model slots plus the current default pointer.
pub struct ModelCache {
    registry: Arc<ModelRegistry>,
    slots: HashMap<String, Arc<ModelSlot>>,
    default_id: RwLock<String>,
    fetcher: Arc<dyn ArtifactFetcher>,
    loader: Arc<dyn ArtifactLoader>,
}

impl ModelCache {
    pub fn new(
        registry: Arc<ModelRegistry>,
        fetcher: Arc<dyn ArtifactFetcher>,
        loader: Arc<dyn ArtifactLoader>,
    ) -> Self {
        let slots = registry
            .descriptors()
            .iter()
            .map(|d| (d.id.clone(), Arc::new(ModelSlot::new(d.clone()))))
            .collect();
        let default_id = RwLock::new(registry.default_id().to_string());

        Self {
            registry,
            slots,
            default_id,
            fetcher,
            loader,
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Resolve a model id to its inference handle, materializing it on
    /// first use.
    ///
    /// Concurrent callers for the same unloaded id wait on one
    /// fetch-and-load; on success all receive the same handle. A failed
    /// attempt leaves the slot empty so a later request can retry.
    ///
    /// The fetch-and-load runs on a detached task that fills the slot
    /// itself, so the shared work survives even when the request that
    /// started it is canceled.
    pub async fn resolve(&self, id: &str) -> Result<Arc<dyn InferenceModel>> {
        let slot = self
            .slots
            .get(id)
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))?;

        if let Some(handle) = slot.handle.get() {
            return Ok(handle.clone());
        }

        let _permit = slot.inflight.lock().await;
        // A queued waiter may find the slot filled by the load that
        // held the lock before it.
        if let Some(handle) = slot.handle.get() {
            return Ok(handle.clone());
        }

        let fetcher = self.fetcher.clone();
        let loader = self.loader.clone();
        let task_slot = slot.clone();
        let task = tokio::spawn(async move {
            let result = materialize(fetcher, loader, task_slot.descriptor.clone()).await;
            if let Ok(handle) = &result {
                let _ = task_slot.handle.set(handle.clone());
            }
            result
        });

        task.await
            .map_err(|e| ServiceError::load(id, format!("load task: {e}")))?
    }

    /// Whether a model's handle has been materialized.
    pub fn is_loaded(&self, id: &str) -> bool {
        self.slots.get(id).map(|s| s.is_loaded()).unwrap_or(false)
    }

    /// The model id used when callers omit an explicit one.
    pub fn default_id(&self) -> String {
        self.default_id
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Point the default at another registered model. Does not force
    /// loading and never touches a slot's handle.
    pub fn set_default(&self, id: &str) -> Result<()> {
        if !self.slots.contains_key(id) {
            return Err(ServiceError::NotFound(id.to_string()));
        }
        let mut default = self.default_id.write().unwrap_or_else(|e| e.into_inner());
        *default = id.to_string();
        info!(model = %id, "Default model updated");
        Ok(())
    }

    /// Catalog entries plus load state, in catalog order.
    pub fn models_info(&self) -> Vec<ModelInfo> {
        let default_id = self.default_id();
        self.registry
            .descriptors()
            .iter()
            .map(|d| ModelInfo {
                id: d.id.clone(),
                name: d.name.clone(),
                accuracy: d.accuracy,
                inference_time_ms: d.inference_time_ms,
                parameters: d.parameters.clone(),
                use_case: d.use_case.clone(),
                is_default: d.id == default_id,
                loaded: self.is_loaded(&d.id),
            })
            .collect()
    }
}

async fn materialize(
    fetcher: Arc<dyn ArtifactFetcher>,
    loader: Arc<dyn ArtifactLoader>,
    descriptor: Arc<ModelDescriptor>,
) -> Result<Arc<dyn InferenceModel>> {
    let artifact = fetcher.ensure_local(&descriptor).await?;

    // Session construction reads and parses the whole artifact;
    // keep it off the async workers.
    let model_id = descriptor.id.clone();
    let handle = tokio::task::spawn_blocking(move || loader.load(&descriptor, &artifact))
        .await
        .map_err(|e| ServiceError::load(&model_id, format!("load task: {e}")))??;

    info!(model = %model_id, "Model materialized");
    Ok(handle)
}
