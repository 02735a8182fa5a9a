//! # Consultation Routes
//!
//! One consultation per request, from a transcript or an uploaded
//! recording. Input validation happens here; everything past the
//! boundary is the pipeline's contract.

use axum::{
    Json,
    extract::{Multipart, State},
};
use tracing::debug;

use super::AppState;
use crate::error::AppError;
use crate::models::{ConsultationResult, ProcessTextRequest, RankWeights};
use crate::services::extractor::ConsultationInput;
use crate::services::pipeline::{PipelineError, ProcessOptions};

impl From<PipelineError> for AppError {
    fn from(error: PipelineError) -> Self {
        match error {
            PipelineError::ExtractionFailed(msg) => AppError::ExtractionFailed(msg),
            PipelineError::LlmUnavailable(msg) => AppError::LlmUnavailable(msg),
        }
    }
}

/// POST /api/process-text
pub async fn process_text(
    State(state): State<AppState>,
    Json(request): Json<ProcessTextRequest>,
) -> Result<Json<ConsultationResult>, AppError> {
    if request.text.trim().is_empty() {
        return Err(AppError::BadRequest("text must not be empty".to_string()));
    }

    let weights = match &request.weights {
        Some(overrides) => {
            RankWeights::with_overrides(overrides).map_err(AppError::BadRequest)?
        }
        None => RankWeights::default(),
    };

    let result = state
        .pipeline
        .process(
            ConsultationInput::Text(request.text),
            ProcessOptions {
                weights,
                push_to_crm: request.push_to_crm,
            },
        )
        .await?;
    Ok(Json(result))
}

/// POST /api/process-audio (multipart: `audio`, optional `push_to_crm`
/// and `language` fields)
pub async fn process_audio(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ConsultationResult>, AppError> {
    let mut audio: Option<(Vec<u8>, String)> = None;
    let mut push_to_crm = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "audio" => {
                let mime = field
                    .content_type()
                    .unwrap_or("audio/mpeg")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("unreadable audio field: {e}")))?;
                audio = Some((bytes.to_vec(), mime));
            }
            "push_to_crm" => {
                let text = field.text().await.unwrap_or_default();
                push_to_crm = matches!(text.trim(), "true" | "1" | "yes");
            }
            "language" => {
                // Accepted for the upload contract; extraction is
                // language-agnostic.
                let language = field.text().await.unwrap_or_default();
                debug!("consultation language hint: {}", language);
            }
            other => {
                debug!("ignoring unknown multipart field {:?}", other);
            }
        }
    }

    let (bytes, mime) = audio
        .ok_or_else(|| AppError::BadRequest("missing audio field".to_string()))?;
    if bytes.is_empty() {
        return Err(AppError::BadRequest("audio upload is empty".to_string()));
    }

    let result = state
        .pipeline
        .process(
            ConsultationInput::Audio { bytes, mime },
            ProcessOptions {
                weights: RankWeights::default(),
                push_to_crm,
            },
        )
        .await?;
    Ok(Json(result))
}
