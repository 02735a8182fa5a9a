//! # LLM Client
//!
//! Structured-JSON generation from text or audio via the Gemini
//! `generateContent` API, behind a [`GenerativeModel`] trait so the
//! pipeline and tests can inject scripted models.
//!
//! Transient provider failures (transport errors, timeouts, 429, 5xx)
//! are retried with exponential backoff (2 s, 4 s, 8 s); exhaustion
//! surfaces as [`LlmError::Unavailable`]. Every successful call reports
//! token counts and latency.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::LlmCallMetrics;

/// Backoff schedule after each failed attempt (initial try + 3 retries).
const RETRY_DELAYS: [Duration; 3] = [
    Duration::from_secs(2),
    Duration::from_secs(4),
    Duration::from_secs(8),
];

/// Soft per-call deadline; a call past this counts as a transient failure.
const DEFAULT_CALL_DEADLINE: Duration = Duration::from_secs(30);

#[derive(Error, Debug, Clone)]
pub enum LlmError {
    /// Transport failure, timeout, or provider-side overload after retries.
    #[error("LLM provider unavailable: {0}")]
    Unavailable(String),

    /// The provider answered, but not with usable JSON.
    #[error("LLM returned an unusable response: {0}")]
    InvalidResponse(String),
}

/// One piece of a multimodal prompt
#[derive(Debug, Clone)]
pub enum PromptPart {
    Text(String),
    Audio { mime: String, data: Vec<u8> },
}

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub parts: Vec<PromptPart>,
    pub temperature: f32,
    /// Optional JSON schema the provider is asked to conform to.
    pub response_schema: Option<Value>,
}

impl GenerateRequest {
    pub fn text(prompt: impl Into<String>, temperature: f32) -> Self {
        Self {
            parts: vec![PromptPart::Text(prompt.into())],
            temperature,
            response_schema: None,
        }
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.response_schema = Some(schema);
        self
    }
}

#[derive(Debug, Clone)]
pub struct GenerateResponse {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Provider capability: structured JSON from a text or audio prompt.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, LlmError>;
}

/// Gemini `generateContent` adapter. Auth is an API key query parameter.
pub struct GeminiModel {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiModel {
    pub fn new(api_key: &str, model: &str) -> Result<Self, LlmError> {
        Self::with_base_url(api_key, model, "https://generativelanguage.googleapis.com")
    }

    pub fn with_base_url(api_key: &str, model: &str, base_url: &str) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_CALL_DEADLINE)
            .build()
            .map_err(|e| LlmError::Unavailable(format!("HTTP client init failed: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        )
    }

    fn build_body(&self, request: &GenerateRequest) -> Value {
        let parts: Vec<Value> = request
            .parts
            .iter()
            .map(|part| match part {
                PromptPart::Text(text) => json!({"text": text}),
                PromptPart::Audio { mime, data } => json!({
                    "inline_data": {
                        "mime_type": mime,
                        "data": BASE64.encode(data),
                    }
                }),
            })
            .collect();

        let mut gen_config = json!({
            "temperature": request.temperature,
            "responseMimeType": "application/json",
        });
        if let Some(schema) = &request.response_schema {
            gen_config["responseSchema"] = schema.clone();
        }

        json!({
            "contents": [{"role": "user", "parts": parts}],
            "generationConfig": gen_config,
        })
    }
}

#[async_trait]
impl GenerativeModel for GeminiModel {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, LlmError> {
        let body = self.build_body(&request);

        let response = self
            .client
            .post(self.generate_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(LlmError::Unavailable(format!("provider returned {status}")));
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(LlmError::InvalidResponse(format!(
                "provider returned {status}: {detail}"
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("non-JSON body: {e}")))?;

        let text = payload["candidates"][0]["content"]["parts"]
            .as_array()
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .filter(|t| !t.is_empty())
            .ok_or_else(|| LlmError::InvalidResponse("no candidate text".to_string()))?;

        let usage = &payload["usageMetadata"];
        Ok(GenerateResponse {
            text,
            input_tokens: usage["promptTokenCount"].as_u64().unwrap_or(0),
            output_tokens: usage["candidatesTokenCount"].as_u64().unwrap_or(0),
        })
    }
}

/// Retrying front over a [`GenerativeModel`] that parses JSON replies
/// and reports per-call metrics.
pub struct LlmClient {
    model: Arc<dyn GenerativeModel>,
    call_deadline: Duration,
}

impl LlmClient {
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self {
            model,
            call_deadline: DEFAULT_CALL_DEADLINE,
        }
    }

    pub fn with_call_deadline(mut self, deadline: Duration) -> Self {
        self.call_deadline = deadline;
        self
    }

    /// One logical provider call: retries transient failures, then
    /// parses the reply as JSON (tolerating markdown fences).
    pub async fn generate_json(
        &self,
        label: &str,
        request: GenerateRequest,
    ) -> Result<(Value, LlmCallMetrics), LlmError> {
        let started = std::time::Instant::now();
        let response = self.call_with_retry(label, &request).await?;

        let value = extract_json(&response.text).ok_or_else(|| {
            LlmError::InvalidResponse(format!(
                "{label}: reply was not JSON ({} chars)",
                response.text.len()
            ))
        })?;

        let metrics = LlmCallMetrics {
            label: label.to_string(),
            latency_ms: started.elapsed().as_millis() as u64,
            input_tokens: response.input_tokens,
            output_tokens: response.output_tokens,
        };
        debug!(
            "LLM call {} done in {} ms ({} in / {} out tokens)",
            label, metrics.latency_ms, metrics.input_tokens, metrics.output_tokens
        );
        Ok((value, metrics))
    }

    async fn call_with_retry(
        &self,
        label: &str,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse, LlmError> {
        let mut attempt = 0usize;
        loop {
            let outcome =
                tokio::time::timeout(self.call_deadline, self.model.generate(request.clone()))
                    .await;

            let transient = match outcome {
                Ok(Ok(response)) => return Ok(response),
                // Garbage output is not transient; retrying buys nothing.
                Ok(Err(LlmError::InvalidResponse(e))) => {
                    return Err(LlmError::InvalidResponse(e));
                }
                Ok(Err(LlmError::Unavailable(e))) => e,
                Err(_) => format!("call exceeded {:?} deadline", self.call_deadline),
            };

            if attempt >= RETRY_DELAYS.len() {
                return Err(LlmError::Unavailable(format!(
                    "{label}: retries exhausted: {transient}"
                )));
            }

            let delay = RETRY_DELAYS[attempt];
            warn!(
                "LLM call {} failed (attempt {}): {}; retrying in {:?}",
                label,
                attempt + 1,
                transient,
                delay
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

/// Pull the first JSON value out of a possibly fenced or chatty reply.
pub fn extract_json(text: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(text.trim()) {
        return Some(value);
    }

    for (open, close) in [('{', '}'), ('[', ']')] {
        if let (Some(start), Some(end)) = (text.find(open), text.rfind(close))
            && start < end
            && let Ok(value) = serde_json::from_str::<Value>(&text[start..=end])
        {
            return Some(value);
        }
    }
    None
}

/// USD per input/output token for known Gemini models.
///
/// Unknown ids fall back to flash-tier pricing so cost estimates stay
/// conservative rather than zero.
pub fn model_pricing(model_id: &str) -> (f64, f64) {
    match model_id {
        "gemini-2.5-pro" | "gemini-2.5-pro-latest" => (1.25e-6, 1.0e-5),
        "gemini-2.5-flash" | "gemini-2.5-flash-latest" => (1.5e-7, 6.0e-7),
        "gemini-2.0-flash" => (1.0e-7, 4.0e-7),
        _ => (1.5e-7, 6.0e-7),
    }
}
