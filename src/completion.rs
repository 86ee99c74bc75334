//! Single-shot text completion against a hosted model.
//!
//! One prompt goes out, one reply (or error) comes back. There is no retry and
//! no timeout; a stalled backend keeps the request pending.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::{Backend, CompletionConfig};

pub const EMPTY_RESPONSE: &str = "Received empty response.";

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("Prompt is required")]
    EmptyPrompt,

    #[error("No API key configured (set {0})")]
    MissingApiKey(String),

    /// Non-2xx reply. `message` is what the backend said, or a generic line.
    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("Failed to reach the completion service")]
    Transport(#[source] reqwest::Error),

    #[error("Failed to read the completion response")]
    Decode(#[source] reqwest::Error),
}

impl CompletionError {
    pub fn status(&self) -> Option<u16> {
        match self {
            CompletionError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[async_trait]
pub trait Completer: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;
}

#[derive(Debug, Serialize)]
struct RelayRequest<'a> {
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct RelayResponse {
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateResponse {
    fn into_text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

pub struct CompletionClient {
    config: CompletionConfig,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl CompletionClient {
    pub fn new(config: &CompletionConfig, api_key: Option<String>) -> Self {
        CompletionClient {
            config: config.clone(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    async fn send_relay(&self, prompt: &str) -> Result<String, CompletionError> {
        let mut request = self
            .client
            .post(&self.config.endpoint)
            .json(&RelayRequest { prompt });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(CompletionError::Transport)?;
        let response = check_status(response).await?;

        let body: RelayResponse = response.json().await.map_err(CompletionError::Decode)?;
        Ok(body.text.unwrap_or_else(|| EMPTY_RESPONSE.to_string()))
    }

    async fn send_gemini(&self, prompt: &str) -> Result<String, CompletionError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| CompletionError::MissingApiKey(self.config.api_key_env.clone()))?;

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model
        );
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                top_p: self.config.top_p,
                max_output_tokens: self.config.max_output_tokens,
            },
        };

        let response = self
            .client
            .post(url)
            .query(&[("key", key)])
            .json(&request)
            .send()
            .await
            .map_err(CompletionError::Transport)?;
        let response = check_status(response).await?;

        let body: GenerateResponse = response.json().await.map_err(CompletionError::Decode)?;
        Ok(body.into_text().unwrap_or_else(|| EMPTY_RESPONSE.to_string()))
    }
}

#[async_trait]
impl Completer for CompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        if prompt.trim().is_empty() {
            return Err(CompletionError::EmptyPrompt);
        }

        tracing::debug!(backend = ?self.config.backend, model = %self.config.model, "sending completion request");
        match self.config.backend {
            Backend::Relay => self.send_relay(prompt).await,
            Backend::Gemini => self.send_gemini(prompt).await,
        }
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, CompletionError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body)
        .unwrap_or_else(|| format!("Failed to fetch response. Status: {}", status.as_u16()));
    Err(CompletionError::Status {
        status: status.as_u16(),
        message,
    })
}

/// Pull a human-readable message out of an error body: `message`, a string
/// `error`, or `error.message`.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| value.get("error").and_then(Value::as_str))
        .or_else(|| value.pointer("/error/message").and_then(Value::as_str))?;
    if message.is_empty() {
        None
    } else {
        Some(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn relay_config(server: &MockServer) -> CompletionConfig {
        CompletionConfig {
            backend: Backend::Relay,
            endpoint: format!("{}/api/gemini", server.uri()),
            ..CompletionConfig::default()
        }
    }

    fn gemini_config(server: &MockServer) -> CompletionConfig {
        CompletionConfig {
            backend: Backend::Gemini,
            endpoint: server.uri(),
            max_output_tokens: Some(1000),
            ..CompletionConfig::default()
        }
    }

    #[tokio::test]
    async fn test_relay_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/gemini"))
            .and(body_json(json!({ "prompt": "2+2" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "text": "4" })))
            .expect(1)
            .mount(&server)
            .await;

        let client = CompletionClient::new(&relay_config(&server), None);
        assert_eq!(client.complete("2+2").await.unwrap(), "4");
    }

    #[tokio::test]
    async fn test_relay_missing_text_uses_placeholder() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let client = CompletionClient::new(&relay_config(&server), None);
        assert_eq!(client.complete("hello").await.unwrap(), EMPTY_RESPONSE);
    }

    #[tokio::test]
    async fn test_empty_prompt_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "text": "never" })))
            .expect(0)
            .mount(&server)
            .await;

        let client = CompletionClient::new(&relay_config(&server), None);
        let err = client.complete("   \n\t").await.unwrap_err();
        assert!(matches!(err, CompletionError::EmptyPrompt));
        assert_eq!(err.to_string(), "Prompt is required");
    }

    #[tokio::test]
    async fn test_error_body_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "error": "rate limited" })))
            .expect(1)
            .mount(&server)
            .await;

        let client = CompletionClient::new(&relay_config(&server), None);
        let err = client.complete("hi").await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(err.to_string(), "rate limited");
    }

    #[tokio::test]
    async fn test_unstructured_error_falls_back_to_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
            .mount(&server)
            .await;

        let client = CompletionClient::new(&relay_config(&server), None);
        let err = client.complete("hi").await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to fetch response. Status: 502");
    }

    #[tokio::test]
    async fn test_undecodable_success_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = CompletionClient::new(&relay_config(&server), None);
        let err = client.complete("hi").await.unwrap_err();
        assert!(matches!(err, CompletionError::Decode(_)));
    }

    #[tokio::test]
    async fn test_unreachable_service() {
        let config = CompletionConfig {
            backend: Backend::Relay,
            endpoint: "http://127.0.0.1:1/api/gemini".to_string(),
            ..CompletionConfig::default()
        };
        let client = CompletionClient::new(&config, None);
        let err = client.complete("hi").await.unwrap_err();
        assert!(matches!(err, CompletionError::Transport(_)));
        assert_eq!(err.to_string(), "Failed to reach the completion service");
    }

    #[tokio::test]
    async fn test_gemini_request_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
            .and(query_param("key", "secret"))
            .and(body_json(json!({
                "contents": [{ "role": "user", "parts": [{ "text": "hello" }] }],
                "generationConfig": { "temperature": 0.9, "topP": 0.8, "maxOutputTokens": 1000 }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [{ "text": "Hi " }, { "text": "there" }] } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = CompletionClient::new(&gemini_config(&server), Some("secret".to_string()));
        assert_eq!(client.model(), "gemini-1.5-flash");
        assert_eq!(client.complete("hello").await.unwrap(), "Hi there");
    }

    #[tokio::test]
    async fn test_gemini_no_candidates_uses_placeholder() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
            .mount(&server)
            .await;

        let client = CompletionClient::new(&gemini_config(&server), Some("k".to_string()));
        assert_eq!(client.complete("hello").await.unwrap(), EMPTY_RESPONSE);
    }

    #[tokio::test]
    async fn test_gemini_nested_error_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": { "code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT" }
            })))
            .mount(&server)
            .await;

        let client = CompletionClient::new(&gemini_config(&server), Some("bad".to_string()));
        assert_eq!(client.complete("hello").await.unwrap_err().to_string(), "API key not valid");
    }

    #[tokio::test]
    async fn test_gemini_without_key_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = CompletionClient::new(&gemini_config(&server), None);
        let err = client.complete("hello").await.unwrap_err();
        assert_eq!(err.to_string(), "No API key configured (set GEMINI_API_KEY)");
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message(r#"{"message":"m","error":"e"}"#).as_deref(), Some("m"));
        assert_eq!(error_message(r#"{"error":"e"}"#).as_deref(), Some("e"));
        assert_eq!(error_message(r#"{"error":{"message":"nested"}}"#).as_deref(), Some("nested"));
        assert_eq!(error_message(r#"{"error":""}"#), None);
        assert_eq!(error_message("plain text"), None);
    }
}
