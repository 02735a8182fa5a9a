use axum::{Json, extract::State};

use super::AppState;
use crate::models::{CatalogStats, HealthResponse};

/// Health check endpoint: liveness plus LLM key presence.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        llm_configured: state.llm_configured,
    })
}

/// Catalog statistics endpoint
pub async fn stats(State(state): State<AppState>) -> Json<CatalogStats> {
    Json(state.catalog.stats())
}
