pub mod api;
pub mod communities;
pub mod consultations;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Consultation recordings can run long; cap uploads at 32 MiB.
const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

use crate::services::{CatalogStore, Pipeline};

/// Shared state behind every handler
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<CatalogStore>,
    pub pipeline: Arc<Pipeline>,
    pub llm_configured: bool,
}

/// Build the application router (shared by main and the API tests).
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/process-audio", post(consultations::process_audio))
        .route("/api/process-text", post(consultations::process_text))
        .route(
            "/api/communities",
            get(communities::list).post(communities::create),
        )
        .route(
            "/api/communities/{id}",
            get(communities::get_one)
                .put(communities::update)
                .delete(communities::remove),
        )
        .route("/api/stats", get(api::stats))
        .route("/api/health", get(api::health))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}
