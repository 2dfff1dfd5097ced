//! Malaria Detection Service - Main Entry Point
//!
//! Loads the model catalog, wires the inference engine, and serves the
//! HTTP API. Models materialize lazily on first use; a bad catalog
//! aborts startup.

use anyhow::{Context, Result};
use malaria_detection_service::{
    api::{self, AppState},
    config::AppConfig,
    metrics::{MetricsReporter, PredictionMetrics},
    models::{
        cache::ModelCache, fetcher::HubFetcher, inference::InferenceEngine, loader::ModelLoader,
        registry::ModelRegistry,
    },
    preprocess::ImagePreprocessor,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("malaria_detection_service={}", config.logging.level).parse()?);

    if config.logging.format == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load()?;
    init_logging(&config)?;

    info!("Starting Malaria Detection Service");

    // Load and validate the model catalog; configuration errors abort
    // startup, there is no partial-catalog mode.
    let registry = Arc::new(ModelRegistry::load(&config.models.catalog_path)?);
    info!(
        models = registry.len(),
        default = %registry.default_id(),
        "Model registry initialized"
    );

    let fetcher = Arc::new(HubFetcher::new(Duration::from_secs(
        config.models.fetch_timeout_secs,
    ))?);
    let loader = Arc::new(ModelLoader::new(config.models.onnx_threads)?);
    let engine = Arc::new(InferenceEngine::new(ModelCache::new(
        registry, fetcher, loader,
    )));

    let preprocessor = Arc::new(ImagePreprocessor::new(
        config.upload.image_size,
        config.upload.max_upload_bytes,
        config.upload.allowed_extensions.clone(),
    ));

    // Start metrics reporter (prints summary every 60 seconds)
    let metrics = Arc::new(PredictionMetrics::new());
    let metrics_clone = metrics.clone();
    tokio::spawn(async move {
        let reporter = MetricsReporter::new(metrics_clone, 60);
        reporter.start().await;
    });

    let state = AppState {
        engine,
        preprocessor,
        metrics,
    };
    let app = api::router(state, config.upload.max_upload_bytes);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("cannot bind {addr}"))?;
    info!(addr = %addr, "Listening");

    axum::serve(listener, app)
        .await
        .context("server terminated")?;

    Ok(())
}
