//! HTTP surface for the prediction service.
//!
//! Conventional transport glue over the inference engine: route
//! definitions, request validation, and the mapping from the error
//! taxonomy to HTTP statuses. Identity and persistence stay with
//! external collaborators; result records are returned to the caller
//! rather than stored.

use crate::error::ServiceError;
use crate::metrics::PredictionMetrics;
use crate::models::inference::InferenceEngine;
use crate::preprocess::ImagePreprocessor;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Shared per-request context, constructed once at startup.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<InferenceEngine>,
    pub preprocessor: Arc<ImagePreprocessor>,
    pub metrics: Arc<PredictionMetrics>,
}

/// Build the API router.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/predict", post(predict))
        .route("/api/v1/predict/compare", post(compare))
        .route("/api/v1/models/list", get(list_models))
        .route("/api/v1/models/info/:model_id", get(model_info))
        .route("/api/v1/models/set-default/:model_id", post(set_default))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct PredictParams {
    /// Model to use; falls back to the current default when omitted
    model_id: Option<String>,
    /// Original filename, used for extension validation when present
    filename: Option<String>,
}

#[derive(Debug, Serialize)]
struct PredictionResponse {
    success: bool,
    prediction_id: Uuid,
    result: crate::types::prediction::PredictionResult,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct ComparisonResponse {
    success: bool,
    prediction_id: Uuid,
    comparison: crate::types::report::ComparisonReport,
    created_at: DateTime<Utc>,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::InvalidImage(_) => StatusCode::BAD_REQUEST,
            ServiceError::Fetch { .. } => StatusCode::BAD_GATEWAY,
            ServiceError::Load { .. }
            | ServiceError::Inference { .. }
            | ServiceError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({
            "success": false,
            "error": self.to_string(),
            "retryable": self.is_retryable(),
        }));
        (status, body).into_response()
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Decode and normalize an upload off the async workers.
async fn decode(
    state: &AppState,
    body: Bytes,
    filename: Option<&str>,
) -> Result<crate::preprocess::ImageTensor, ServiceError> {
    state.preprocessor.validate_upload(&body, filename)?;

    let preprocessor = state.preprocessor.clone();
    tokio::task::spawn_blocking(move || preprocessor.preprocess(&body))
        .await
        .map_err(|e| ServiceError::InvalidImage(format!("decode task: {e}")))?
}

async fn predict(
    State(state): State<AppState>,
    Query(params): Query<PredictParams>,
    body: Bytes,
) -> Result<impl IntoResponse, ServiceError> {
    let tensor = decode(&state, body, params.filename.as_deref()).await?;
    let result = state.engine.predict(&tensor, params.model_id.as_deref()).await?;
    state.metrics.record_prediction(&result);

    info!(
        model = %result.model_id,
        prediction = %result.prediction,
        confidence = result.confidence,
        "Prediction served"
    );

    Ok(Json(PredictionResponse {
        success: true,
        prediction_id: Uuid::new_v4(),
        result,
        created_at: Utc::now(),
    }))
}

async fn compare(
    State(state): State<AppState>,
    Query(params): Query<PredictParams>,
    body: Bytes,
) -> Result<impl IntoResponse, ServiceError> {
    let tensor = decode(&state, body, params.filename.as_deref()).await?;
    let report = state.engine.compare(&tensor).await?;
    state
        .metrics
        .record_comparison(&report.predictions, report.consensus.agreement_percentage);

    info!(
        models_compared = report.models_compared,
        failed = report.failures.len(),
        majority = ?report.consensus.majority_vote,
        unanimous = report.consensus.unanimous,
        "Comparison served"
    );

    Ok(Json(ComparisonResponse {
        success: true,
        prediction_id: Uuid::new_v4(),
        comparison: report,
        created_at: Utc::now(),
    }))
}

async fn list_models(State(state): State<AppState>) -> impl IntoResponse {
    let models = state.engine.models_info();
    Json(json!({
        "success": true,
        "total_models": models.len(),
        "default_model": state.engine.default_id(),
        "models": models,
        "recommendation": state.engine.recommendation(),
    }))
}

async fn model_info(
    State(state): State<AppState>,
    Path(model_id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let model = state
        .engine
        .models_info()
        .into_iter()
        .find(|m| m.id == model_id)
        .ok_or(ServiceError::NotFound(model_id))?;

    Ok(Json(json!({ "success": true, "model": model })))
}

async fn set_default(
    State(state): State<AppState>,
    Path(model_id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    state.engine.set_default(&model_id)?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Default model set to {model_id}"),
        "default_model": model_id,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (ServiceError::NotFound("model_9".into()), StatusCode::NOT_FOUND),
            (
                ServiceError::InvalidImage("empty".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                ServiceError::fetch("model_1", "offline"),
                StatusCode::BAD_GATEWAY,
            ),
            (
                ServiceError::load("model_1", "corrupt"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ServiceError::inference("model_1", "shape mismatch"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }
}
