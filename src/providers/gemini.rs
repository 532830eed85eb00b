use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};
use zeroize::Zeroizing;

use crate::error::{AppError, Result};

/// Text used when the provider answers without a first candidate text part.
pub const NO_RESPONSE_PLACEHOLDER: &str = "No response";

/// Something that turns a user message into a model response.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// One synchronous round trip; no streaming, no retry.
    async fn generate(&self, message: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

/// Builds `{"contents":[{"parts":[{"text": message}]}]}`.
fn build_request(message: &str) -> GenerateRequest<'_> {
    GenerateRequest {
        contents: vec![RequestContent {
            parts: vec![RequestPart { text: message }],
        }],
    }
}

/// Reads `candidates[0].content.parts[0].text`, falling back to the placeholder.
pub fn extract_text(body: &str) -> Result<String> {
    let response: GenerateResponse = sonic_rs::from_str(body)
        .map_err(|e| AppError::Upstream(format!("Failed to parse response: {}", e)))?;

    let text = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .unwrap_or_else(|| NO_RESPONSE_PLACEHOLDER.to_string());

    Ok(text)
}

/// Client for the Generative Language `generateContent` endpoint.
pub struct GeminiClient {
    client: Client,
    api_url: String,
    api_key: Zeroizing<String>,
}

impl GeminiClient {
    pub fn new(api_url: impl Into<String>, api_key: Zeroizing<String>) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.into(),
            api_key,
        }
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    #[instrument(skip_all)]
    async fn generate(&self, message: &str) -> Result<String> {
        let response = self
            .client
            .post(&self.api_url)
            .query(&[("key", self.api_key.as_str())])
            .json(&build_request(message))
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("HTTP request failed: {}", e.without_url())))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to read response: {}", e.without_url())))?;

        if !status.is_success() {
            error!(status = %status, body = %body, "Text generation API error");
            return Err(AppError::Upstream(format!("status {}", status)));
        }

        debug!(status = %status, bytes = body.len(), "Text generation API responded");
        extract_text(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_has_the_contents_parts_text_shape() {
        let json = sonic_rs::to_string(&build_request("hello")).unwrap();
        assert_eq!(json, r#"{"contents":[{"parts":[{"text":"hello"}]}]}"#);
    }

    #[test]
    fn extracts_first_candidate_first_part() {
        let body = r#"{"candidates":[
            {"content":{"parts":[{"text":"first"},{"text":"second"}],"role":"model"}},
            {"content":{"parts":[{"text":"other"}]}}
        ]}"#;
        assert_eq!(extract_text(body).unwrap(), "first");
    }

    #[test]
    fn missing_shape_falls_back_to_placeholder() {
        assert_eq!(extract_text("{}").unwrap(), NO_RESPONSE_PLACEHOLDER);
        assert_eq!(
            extract_text(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#).unwrap(),
            NO_RESPONSE_PLACEHOLDER
        );
    }

    #[test]
    fn non_json_body_is_an_upstream_error() {
        assert!(matches!(extract_text("<html>"), Err(AppError::Upstream(_))));
    }
}
