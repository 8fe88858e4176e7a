//! Gemini `generateContent` oracle client
//!
//! Sends one request per transformation: a fixed role directive part
//! followed by the instruction and source text, with a bounded output size
//! and near-deterministic sampling.

use crate::client::OracleClient;
use crate::error::OracleError;
use crate::fence;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Gemini client configuration
///
/// The API key is never serialized and is redacted from `Debug` output.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    /// API base URL (without the `/models/...` suffix)
    pub base_url: String,
    /// Model name
    pub model: String,
    /// API key, read from the credentials file
    #[serde(skip)]
    pub api_key: String,
    /// Role directive sent ahead of every prompt
    pub role_directive: String,
    /// Label placed in front of the source text in the prompt
    pub source_label: String,
    /// Fence tag of the code block to extract from responses
    pub target_language: String,
    /// Output token ceiling
    pub max_output_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        GeminiConfig {
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.0-flash".to_string(),
            api_key: String::new(),
            role_directive: "You are a C++ unit test generator specializing in Drogon framework."
                .to_string(),
            source_label: "C++ Source Code".to_string(),
            target_language: "cpp".to_string(),
            max_output_tokens: 4000,
            temperature: 0.1,
            timeout_secs: 120,
        }
    }
}

impl GeminiConfig {
    /// Set the API key
    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = api_key.to_string();
        self
    }

    /// Full `generateContent` endpoint for the configured model
    pub fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("target_language", &self.target_language)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("temperature", &self.temperature)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

/// Response body of `generateContent`.
///
/// Every field is optional: the oracle answers with content, with prompt
/// feedback only, or with something else entirely.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<CandidateContent>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResponsePart {
    pub text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    pub block_reason: Option<String>,
    pub block_reason_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
    status: Option<String>,
}

/// Assemble the instruction/source prompt.
pub fn build_prompt(instruction: &str, source_label: &str, source: &str) -> String {
    format!("{instruction}\n\n{source_label}:\n{source}\n")
}

/// Pull the response text out of a parsed `generateContent` body.
pub fn response_text(response: GenerateResponse) -> Result<String, OracleError> {
    if let Some(candidate) = response.candidates.into_iter().next() {
        let Some(content) = candidate.content else {
            return Err(match candidate.finish_reason {
                Some(reason) if reason != "STOP" => OracleError::Rejected { reason },
                _ => OracleError::Protocol("no content found in candidate".to_string()),
            });
        };

        if candidate.finish_reason.as_deref() == Some("MAX_TOKENS") {
            warn!("oracle response truncated at the output token ceiling");
        }

        let part = content
            .parts
            .into_iter()
            .next()
            .ok_or_else(|| OracleError::Protocol("no parts found in content".to_string()))?;

        return part
            .text
            .ok_or_else(|| OracleError::Protocol("first part carries no text".to_string()));
    }

    if let Some(feedback) = response.prompt_feedback {
        let reason = feedback
            .block_reason_message
            .or(feedback.block_reason)
            .unwrap_or_else(|| "prompt feedback returned instead of content".to_string());
        return Err(OracleError::Rejected { reason });
    }

    Err(OracleError::Protocol(
        "unexpected response structure".to_string(),
    ))
}

/// Map a non-success HTTP reply to an error, preferring the oracle's message.
fn error_from_status(status: reqwest::StatusCode, body: &str) -> OracleError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            error:
                ErrorDetail {
                    message: Some(message),
                    status: detail_status,
                },
        }) => OracleError::Rejected {
            reason: match detail_status {
                Some(s) => format!("{s}: {message}"),
                None => message,
            },
        },
        _ => OracleError::Transport(format!("HTTP {}", status)),
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Oracle client backed by the Gemini REST API
pub struct GeminiClient {
    config: GeminiConfig,
    http_client: reqwest::Client,
}

impl GeminiClient {
    /// Create a new Gemini client
    pub fn new(config: GeminiConfig) -> Result<Self, OracleError> {
        if config.api_key.trim().is_empty() {
            return Err(OracleError::Configuration(
                "API key must not be empty".to_string(),
            ));
        }

        let http_client = reqwest::Client::builder()
            .user_agent(concat!("testgen-oracle/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| OracleError::Configuration(e.to_string()))?;

        Ok(GeminiClient {
            config,
            http_client,
        })
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }
}

#[async_trait]
impl OracleClient for GeminiClient {
    async fn transform(&self, source: &str, instruction: &str) -> Result<String, OracleError> {
        let prompt = build_prompt(instruction, &self.config.source_label, source);
        let body = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![
                    RequestPart {
                        text: &self.config.role_directive,
                    },
                    RequestPart { text: &prompt },
                ],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: self.config.max_output_tokens,
                temperature: self.config.temperature,
            },
        };

        debug!(
            model = %self.config.model,
            prompt_bytes = prompt.len(),
            "sending generateContent request"
        );

        let response = self
            .http_client
            .post(self.config.endpoint())
            .query(&[("key", self.config.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let raw = response.text().await?;
        if !status.is_success() {
            return Err(error_from_status(status, &raw));
        }

        let parsed: GenerateResponse = serde_json::from_str(&raw)
            .map_err(|e| OracleError::Protocol(format!("malformed response body: {e}")))?;
        let text = response_text(parsed)?;

        Ok(fence::extract_code(&text, &self.config.target_language))
    }

    fn name(&self) -> &str {
        "gemini"
    }

    fn model_info(&self) -> Option<String> {
        Some(self.config.model.clone())
    }
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> GenerateResponse {
        serde_json::from_value(value).expect("deserialize response")
    }

    #[test]
    fn test_default_config() {
        let config = GeminiConfig::default();
        assert_eq!(config.model, "gemini-2.0-flash");
        assert_eq!(config.max_output_tokens, 4000);
        assert_eq!(config.timeout_secs, 120);
        assert_eq!(config.target_language, "cpp");
        assert!((config.temperature - 0.1).abs() < f32::EPSILON);
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let config = GeminiConfig {
            base_url: "http://localhost:8080/v1beta/".to_string(),
            model: "m".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.endpoint(),
            "http://localhost:8080/v1beta/models/m:generateContent"
        );
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = GeminiConfig::default().with_api_key("AIzaSECRET");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("AIzaSECRET"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_api_key_is_not_serialized() {
        let config = GeminiConfig::default().with_api_key("AIzaSECRET");
        let raw = serde_json::to_string(&config).expect("serialize");
        assert!(!raw.contains("AIzaSECRET"));
    }

    #[test]
    fn test_build_prompt_layout() {
        let prompt = build_prompt("Write tests.", "C++ Source Code", "int f();");
        assert_eq!(prompt, "Write tests.\n\nC++ Source Code:\nint f();\n");
    }

    #[test]
    fn test_request_body_shape() {
        let body = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: "role" }, RequestPart { text: "prompt" }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: 4000,
                temperature: 0.1,
            },
        };
        let value = serde_json::to_value(&body).expect("serialize");
        assert_eq!(value["contents"][0]["parts"][0]["text"], "role");
        assert_eq!(value["contents"][0]["parts"][1]["text"], "prompt");
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 4000);
    }

    #[test]
    fn test_response_text_success() {
        let response = parse(json!({
            "candidates": [{
                "content": { "parts": [{ "text": "hello" }] },
                "finishReason": "STOP"
            }]
        }));
        assert_eq!(response_text(response).unwrap(), "hello");
    }

    #[test]
    fn test_response_text_truncated_still_returns_text() {
        let response = parse(json!({
            "candidates": [{
                "content": { "parts": [{ "text": "partial" }] },
                "finishReason": "MAX_TOKENS"
            }]
        }));
        assert_eq!(response_text(response).unwrap(), "partial");
    }

    #[test]
    fn test_response_without_parts_is_protocol_failure() {
        let response = parse(json!({ "candidates": [{ "content": { "parts": [] } }] }));
        assert!(matches!(
            response_text(response),
            Err(OracleError::Protocol(_))
        ));
    }

    #[test]
    fn test_candidate_without_content_passes_reason_through() {
        let response = parse(json!({ "candidates": [{ "finishReason": "SAFETY" }] }));
        assert_eq!(
            response_text(response),
            Err(OracleError::Rejected {
                reason: "SAFETY".to_string()
            })
        );
    }

    #[test]
    fn test_prompt_feedback_is_rejection() {
        let response = parse(json!({ "promptFeedback": { "blockReason": "OTHER" } }));
        assert_eq!(
            response_text(response),
            Err(OracleError::Rejected {
                reason: "OTHER".to_string()
            })
        );
    }

    #[test]
    fn test_unexpected_structure_is_protocol_failure() {
        let response = parse(json!({ "usageMetadata": {} }));
        assert!(matches!(
            response_text(response),
            Err(OracleError::Protocol(_))
        ));
    }

    #[test]
    fn test_error_body_message_is_passed_through() {
        let body = r#"{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#;
        let err = error_from_status(reqwest::StatusCode::BAD_REQUEST, body);
        assert_eq!(
            err,
            OracleError::Rejected {
                reason: "INVALID_ARGUMENT: API key not valid".to_string()
            }
        );
    }

    #[test]
    fn test_opaque_error_status_is_transport_failure() {
        let err = error_from_status(reqwest::StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");
        assert!(matches!(err, OracleError::Transport(_)));
    }

    #[test]
    fn test_client_requires_key() {
        let result = GeminiClient::new(GeminiConfig::default());
        assert!(matches!(result, Err(OracleError::Configuration(_))));
    }

    #[test]
    fn test_client_creation() {
        let client = GeminiClient::new(GeminiConfig::default().with_api_key("AIzaTEST")).unwrap();
        assert_eq!(client.name(), "gemini");
        assert_eq!(client.model_info(), Some("gemini-2.0-flash".to_string()));
    }
}
