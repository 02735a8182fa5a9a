//! # Community Catalog Routes
//!
//! CRUD over the community catalog. Writes re-run load-time
//! normalization and publish a fresh snapshot; in-flight consultations
//! keep the snapshot they started with.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;

use super::AppState;
use crate::error::AppError;
use crate::models::{
    CommunitiesResponse, Community, CommunityCreatedResponse, CommunityUpsert, MessageResponse,
};
use crate::services::catalog::CatalogError;

impl From<CatalogError> for AppError {
    fn from(error: CatalogError) -> Self {
        match error {
            CatalogError::DuplicateId(_) => AppError::Conflict(error.to_string()),
            CatalogError::UnknownId(_) => AppError::NotFound(error.to_string()),
            CatalogError::InvalidCareLevel(_) | CatalogError::NegativeFee(_) => {
                AppError::BadRequest(error.to_string())
            }
        }
    }
}

/// POST /api/communities body: workbook-shaped fields, optionally with
/// an explicit id (the store allocates the next free one otherwise).
#[derive(Debug, Deserialize)]
pub struct CreateCommunityRequest {
    pub community_id: Option<u32>,
    #[serde(flatten)]
    pub fields: CommunityUpsert,
}

/// GET /api/communities
pub async fn list(State(state): State<AppState>) -> Json<CommunitiesResponse> {
    let snapshot = state.catalog.snapshot();
    Json(CommunitiesResponse {
        communities: snapshot.communities.clone(),
    })
}

/// GET /api/communities/{id}
pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<Community>, AppError> {
    let snapshot = state.catalog.snapshot();
    let community = snapshot
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("community {id} not found")))?;
    Ok(Json(community.clone()))
}

/// POST /api/communities
pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateCommunityRequest>,
) -> Result<Json<CommunityCreatedResponse>, AppError> {
    let community_id = state.catalog.create(request.community_id, &request.fields)?;
    Ok(Json(CommunityCreatedResponse { community_id }))
}

/// PUT /api/communities/{id}
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Json(fields): Json<CommunityUpsert>,
) -> Result<Json<MessageResponse>, AppError> {
    state.catalog.update(id, &fields)?;
    Ok(Json(MessageResponse {
        message: format!("Community {id} updated"),
    }))
}

/// DELETE /api/communities/{id}
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<MessageResponse>, AppError> {
    state.catalog.delete(id)?;
    Ok(Json(MessageResponse {
        message: format!("Community {id} removed"),
    }))
}
