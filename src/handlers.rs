use crate::analysis::IntelEngine;
use crate::config::Config;
use crate::errors::OsintError;
use crate::models::*;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Analysis engine (owns the probes and both cache tiers).
    pub engine: Arc<IntelEngine>,
    /// Application configuration.
    pub config: Config,
}

/// Health check, outside any rate limit.
pub fn health_routes() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health))
}

/// Analysis and cache routes. Body and rate limits are layered on by the caller.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/analyze", post(analyze))
        .route("/api/v1/analyze/batch", post(analyze_batch))
        .route("/api/v1/cache", delete(clear_cache))
}

/// Health check endpoint.
///
/// Returns the service status, version and the enabled probes.
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    let probes: Vec<&str> = state
        .engine
        .probe_ids()
        .into_iter()
        .map(|id| id.as_str())
        .collect();
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "phone-osint",
            "version": env!("CARGO_PKG_VERSION"),
            "probes": probes,
        })),
    )
}

/// POST /api/v1/analyze
///
/// Analyzes a single number. Returns 400 when the number cannot be parsed;
/// probe failures never fail the request.
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<IntelligenceRecord>, OsintError> {
    let request_id = Uuid::new_v4();
    tracing::info!("[{}] POST /api/v1/analyze - number: {}", request_id, request.number);

    let record = state
        .engine
        .analyze(&request.number, request.country.as_deref())
        .await?;

    tracing::info!(
        "[{}] {} scored {} ({:?})",
        request_id,
        record.number,
        record.score,
        record.level
    );
    Ok(Json(record))
}

/// POST /api/v1/analyze/batch
///
/// Analyzes up to `max_batch_size` numbers. Results come back in input
/// order; an unparsable input yields an `error` entry instead of failing the
/// whole batch.
pub async fn analyze_batch(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BatchAnalyzeRequest>,
) -> Result<Json<BatchAnalyzeResponse>, OsintError> {
    let request_id = Uuid::new_v4();
    tracing::info!(
        "[{}] POST /api/v1/analyze/batch - {} number(s)",
        request_id,
        request.numbers.len()
    );

    if request.numbers.is_empty() {
        return Err(OsintError::BadRequest("numbers must not be empty".to_string()));
    }
    let limit = state.config.max_batch_size;
    if request.numbers.len() > limit {
        return Err(OsintError::BadRequest(format!(
            "at most {} numbers per batch, got {}",
            limit,
            request.numbers.len()
        )));
    }

    let outcomes = state
        .engine
        .analyze_batch(&request.numbers, request.country.as_deref())
        .await;

    let mut results = Vec::with_capacity(outcomes.len());
    for (input, outcome) in request.numbers.into_iter().zip(outcomes) {
        match outcome {
            Ok(record) => results.push(BatchItem {
                input,
                record: Some(record),
                error: None,
            }),
            Err(e) => results.push(BatchItem {
                input,
                record: None,
                error: Some(e.to_string()),
            }),
        }
    }

    let failed = results.iter().filter(|r| r.error.is_some()).count();
    tracing::info!(
        "[{}] Batch complete: {} analyzed, {} rejected",
        request_id,
        results.len() - failed,
        failed
    );

    Ok(Json(BatchAnalyzeResponse { results }))
}

/// DELETE /api/v1/cache
///
/// Drops every cached probe result.
pub async fn clear_cache(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, OsintError> {
    tracing::info!("DELETE /api/v1/cache");
    let removed = state.engine.clear_cache().await?;
    Ok(Json(json!({ "removed": removed })))
}
