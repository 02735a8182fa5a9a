//! # Requirement Extractor
//!
//! Turns one consultation (audio blob or transcript) into a
//! [`ClientRequirements`] record via a schema-constrained LLM call.
//! Care level is the only hard requirement; everything else degrades
//! later stages instead of failing the consultation.

use std::sync::Arc;

use serde_json::{Value, json};
use thiserror::Error;
use tracing::info;

use crate::models::{ApartmentType, CareLevel, ClientRequirements, LlmCallMetrics, Timeline};
use crate::services::llm::{GenerateRequest, LlmClient, LlmError, PromptPart};
use crate::services::locations::LocationResolver;

/// Temperature 0.0 for audio and text alike keeps replays reproducible.
const EXTRACTION_TEMPERATURE: f32 = 0.0;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("consultation input is empty")]
    EmptyInput,

    #[error("could not determine the client's care level from the consultation")]
    CareLevelMissing,

    #[error(transparent)]
    Llm(#[from] LlmError),
}

/// What a consultation arrives as
#[derive(Debug, Clone)]
pub enum ConsultationInput {
    Text(String),
    Audio { bytes: Vec<u8>, mime: String },
}

pub struct Extractor {
    llm: Arc<LlmClient>,
    locations: Arc<LocationResolver>,
}

impl Extractor {
    pub fn new(llm: Arc<LlmClient>, locations: Arc<LocationResolver>) -> Self {
        Self { llm, locations }
    }

    /// Extract structured requirements from one consultation.
    pub async fn extract(
        &self,
        input: &ConsultationInput,
    ) -> Result<(ClientRequirements, LlmCallMetrics), ExtractError> {
        let parts = match input {
            ConsultationInput::Text(text) => {
                if text.trim().is_empty() {
                    return Err(ExtractError::EmptyInput);
                }
                vec![PromptPart::Text(format!(
                    "{}\n\nConsultation transcript:\n{}",
                    extraction_prompt(),
                    text
                ))]
            }
            ConsultationInput::Audio { bytes, mime } => {
                if bytes.is_empty() {
                    return Err(ExtractError::EmptyInput);
                }
                vec![
                    PromptPart::Text(format!(
                        "{}\n\nThe consultation recording follows.",
                        extraction_prompt()
                    )),
                    PromptPart::Audio {
                        mime: mime.clone(),
                        data: bytes.clone(),
                    },
                ]
            }
        };

        let request = GenerateRequest {
            parts,
            temperature: EXTRACTION_TEMPERATURE,
            response_schema: Some(extraction_schema()),
        };

        let (value, metrics) = self.llm.generate_json("extraction", request).await?;
        let requirements = self.parse(&value)?;

        info!(
            "Extracted requirements: {} / {} / budget {:?}",
            requirements.care_level.as_str(),
            requirements.timeline.as_str(),
            requirements.budget_monthly
        );
        Ok((requirements, metrics))
    }

    fn parse(&self, value: &Value) -> Result<ClientRequirements, ExtractError> {
        let care_level = value["care_level"]
            .as_str()
            .and_then(CareLevel::from_raw)
            .ok_or(ExtractError::CareLevelMissing)?;

        let timeline = value["timeline"]
            .as_str()
            .and_then(parse_timeline)
            .unwrap_or(Timeline::Flexible);

        let budget_monthly = number_field(&value["budget_monthly"]).filter(|b| *b > 0.0);

        let location_preference = string_field(&value["location_preference"]);
        let resolved_zip = location_preference
            .as_deref()
            .and_then(|loc| self.locations.resolve(loc));

        let apartment_preference = string_field(&value["apartment_preference"])
            .map(|s| ApartmentType::from_raw(&s))
            .filter(|a| *a != ApartmentType::Unknown);

        Ok(ClientRequirements {
            client_name: string_field(&value["client_name"]),
            care_level,
            budget_monthly,
            timeline,
            location_preference,
            resolved_zip,
            needs_enhanced: value["needs_enhanced"].as_bool().unwrap_or(false),
            needs_enriched: value["needs_enriched"].as_bool().unwrap_or(false),
            is_couple: value["is_couple"].as_bool().unwrap_or(false),
            has_pet: value["has_pet"].as_bool().unwrap_or(false),
            apartment_preference,
            special_notes: string_field(&value["special_notes"]),
        })
    }
}

fn parse_timeline(raw: &str) -> Option<Timeline> {
    match raw.trim().to_lowercase().as_str() {
        "immediate" => Some(Timeline::Immediate),
        "near-term" | "near term" => Some(Timeline::NearTerm),
        "flexible" => Some(Timeline::Flexible),
        _ => None,
    }
}

fn string_field(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("null"))
        .map(String::from)
}

/// Budgets sometimes come back as "$5,500" strings despite the schema.
fn number_field(value: &Value) -> Option<f64> {
    if let Some(n) = value.as_f64() {
        return Some(n);
    }
    let text: String = value
        .as_str()?
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();
    text.parse().ok()
}

fn extraction_prompt() -> &'static str {
    "You are assisting a senior-living placement consultant. Extract the \
     prospective client's requirements from the consultation. Use exactly \
     the allowed values for care_level, timeline and apartment_preference. \
     timeline: immediate = moving within 1 month, near-term = 1-3 months, \
     flexible = 3+ months. Leave any field you cannot infer as null. \
     Respond ONLY with JSON matching the schema."
}

fn extraction_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "client_name": {"type": "string", "nullable": true},
            "care_level": {
                "type": "string",
                "enum": ["Independent Living", "Assisted Living", "Memory Care"],
            },
            "budget_monthly": {"type": "number", "nullable": true},
            "timeline": {
                "type": "string",
                "enum": ["immediate", "near-term", "flexible"],
            },
            "location_preference": {"type": "string", "nullable": true},
            "needs_enhanced": {"type": "boolean"},
            "needs_enriched": {"type": "boolean"},
            "is_couple": {"type": "boolean"},
            "has_pet": {"type": "boolean"},
            "apartment_preference": {
                "type": "string",
                "enum": ["studio", "1BR", "2BR", "double-occupancy", "unknown"],
                "nullable": true,
            },
            "special_notes": {"type": "string", "nullable": true},
        },
        "required": ["care_level", "timeline"],
    })
}
