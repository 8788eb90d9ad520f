//! Google Gemini provider implementation

use super::types::{LlmRequest, LlmResponse, MessageRole, Usage};
use super::{LlmError, LlmService};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini service implementation
pub struct GeminiService {
    client: Client,
    api_key: String,
    url: String,
    model_id: String,
}

impl GeminiService {
    /// `gateway` replaces the public endpoint, e.g. for a proxy that injects
    /// credentials itself.
    pub fn new(api_key: String, model: &str, gateway: Option<&str>) -> Result<Self, LlmError> {
        let base = gateway.unwrap_or(DEFAULT_BASE_URL).trim_end_matches('/');
        let url = format!("{base}/models/{model}:generateContent");

        // Transport defaults only: no timeout override, no retries.
        let client = Client::builder()
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            url,
            model_id: model.to_string(),
        })
    }

    fn translate_request(request: &LlmRequest) -> GeminiRequest {
        let contents = request
            .messages
            .iter()
            .map(|msg| GeminiContent {
                role: Some(
                    match msg.role {
                        MessageRole::User => "user",
                        MessageRole::Model => "model",
                    }
                    .to_string(),
                ),
                parts: vec![GeminiPart {
                    text: msg.text.clone(),
                }],
            })
            .collect();

        GeminiRequest { contents }
    }

    fn normalize_response(resp: GeminiResponse) -> Result<LlmResponse, LlmError> {
        let candidate = resp.candidates.into_iter().next().ok_or_else(|| {
            let reason = resp
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no candidates".to_string());
            LlmError::unknown(format!("Empty response: {reason}"))
        })?;

        let text = candidate
            .content
            .map(|c| {
                c.parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(LlmError::unknown(format!(
                "Response has no text (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }

        let usage = resp.usage_metadata.unwrap_or_default();
        Ok(LlmResponse {
            text,
            usage: Usage {
                input_tokens: u64::from(usage.prompt_token_count),
                output_tokens: u64::from(usage.candidates_token_count),
            },
        })
    }

    /// Map a non-success HTTP response onto an error class
    fn classify_error(status: StatusCode, body: &str) -> LlmError {
        let Ok(error_resp) = serde_json::from_str::<GeminiErrorResponse>(body) else {
            return if status == StatusCode::TOO_MANY_REQUESTS {
                LlmError::rate_limit(format!("HTTP {status}"))
            } else {
                LlmError::unknown(format!("HTTP {status} error: {body}"))
            };
        };

        let message = error_resp.error.message;
        if error_resp.error.status.as_deref() == Some("RESOURCE_EXHAUSTED") {
            return LlmError::rate_limit(format!("Quota exhausted: {message}"));
        }

        match status.as_u16() {
            400 => LlmError::invalid_request(format!("Invalid request: {message}")),
            401 | 403 => LlmError::auth(format!("Authentication failed: {message}")),
            429 => LlmError::rate_limit(format!("Rate limit exceeded: {message}")),
            500..=599 => LlmError::server_error(format!("Server error: {message}")),
            _ => LlmError::unknown(format!("HTTP {status}: {message}")),
        }
    }
}

#[async_trait]
impl LlmService for GeminiService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let gemini_request = Self::translate_request(request);

        let mut builder = self.client.post(&self.url).json(&gemini_request);
        if !self.api_key.is_empty() {
            builder = builder.header("x-goog-api-key", &self.api_key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::network(format!("Request timeout: {e}"))
            } else if e.is_connect() {
                LlmError::network(format!("Connection failed: {e}"))
            } else {
                LlmError::unknown(format!("Request failed: {e}"))
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(Self::classify_error(status, &body));
        }

        let gemini_response: GeminiResponse = serde_json::from_str(&body)
            .map_err(|e| LlmError::unknown(format!("Failed to parse response: {e}")))?;

        Self::normalize_response(gemini_response)
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// Gemini API types

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsageMetadata>,
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiError,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
    status: Option<String>,
}
