//! Language model boundary.
//!
//! The tutor treats text generation as an opaque capability behind the
//! [`LanguageModel`] trait. Two HTTP implementations are provided (Gemini
//! `generateContent` and OpenAI-compatible chat completions), plus
//! [`RetryingModel`], which bounds every call with a timeout and retries
//! transient failures.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::{LlmProvider, ModelConfig};
use crate::error::{GenerationErrorKind, Result, TutorError};

/// A text generation backend.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generates a completion for a single user prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Builds the configured model client, wrapped with timeout and retry handling.
///
/// Reads the API key from the environment variable named in the config,
/// loading a `.env` file first when one is present.
pub fn build_model(config: &ModelConfig) -> Result<Arc<dyn LanguageModel>> {
    dotenvy::dotenv().ok();

    let api_key = std::env::var(&config.api_key_env)
        .ok()
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| TutorError::missing_api_key(&config.api_key_env))?;

    let client = Client::builder()
        .timeout(config.request_timeout())
        .build()
        .map_err(|e| TutorError::generation(GenerationErrorKind::Other, e.to_string()))?;

    let inner: Arc<dyn LanguageModel> = match config.provider {
        LlmProvider::Gemini => Arc::new(GeminiClient::new(client, api_key, config)),
        LlmProvider::OpenAi => Arc::new(OpenAiCompatibleClient::new(client, api_key, config)),
    };

    tracing::info!(
        provider = ?config.provider,
        model = %config.model_name,
        "Language model configured"
    );

    Ok(Arc::new(RetryingModel::new(
        inner,
        config.request_timeout(),
        config.max_retries,
    )))
}

// ============================================================================
// Timeout and retry
// ============================================================================

/// Wraps a model with a per-call timeout and retries for transient errors.
pub struct RetryingModel {
    inner: Arc<dyn LanguageModel>,
    timeout: Duration,
    max_retries: u32,
    backoff: Duration,
}

impl RetryingModel {
    /// Creates a wrapper around `inner`.
    pub fn new(inner: Arc<dyn LanguageModel>, timeout: Duration, max_retries: u32) -> Self {
        Self {
            inner,
            timeout,
            max_retries,
            backoff: Duration::from_millis(500),
        }
    }

    /// Overrides the base delay between attempts.
    #[must_use]
    pub const fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    async fn attempt(&self, prompt: &str) -> Result<String> {
        tokio::time::timeout(self.timeout, self.inner.generate(prompt))
            .await
            .unwrap_or_else(|_| Err(TutorError::generation_timeout(self.timeout.as_secs())))
    }
}

#[async_trait]
impl LanguageModel for RetryingModel {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let mut attempt = 0;
        loop {
            match self.attempt(prompt).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        attempt,
                        max_retries = self.max_retries,
                        error = %e,
                        "Transient generation failure, retrying"
                    );
                    tokio::time::sleep(self.backoff * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Maps a reqwest failure, dropping the request URL from the message.
fn map_transport_error(err: reqwest::Error) -> TutorError {
    let err = err.without_url();
    let kind = if err.is_timeout() {
        GenerationErrorKind::Timeout
    } else if err.is_connect() || err.is_request() {
        GenerationErrorKind::Network
    } else {
        GenerationErrorKind::Other
    };
    TutorError::generation(kind, err.to_string())
}

fn map_http_error(status: u16, body: &str) -> TutorError {
    let message = serde_json::from_str::<ErrorWrapper>(body)
        .ok()
        .and_then(|wrapper| wrapper.error.message)
        .unwrap_or_else(|| body.to_string());
    TutorError::generation(
        GenerationErrorKind::from_status(status),
        format!("HTTP {status}: {message}"),
    )
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

// ============================================================================
// Gemini
// ============================================================================

/// Client for the Gemini `generateContent` REST endpoint.
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl GeminiClient {
    /// Creates a client from model settings and an API key.
    pub fn new(client: Client, api_key: String, config: &ModelConfig) -> Self {
        Self {
            client,
            base_url: config.resolved_base_url().trim_end_matches('/').to_string(),
            api_key,
            model: config.model_name.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url, self.model
        );
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_tokens,
            },
        };

        tracing::debug!(model = %self.model, prompt_len = prompt.len(), "Calling Gemini");

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(map_http_error(status.as_u16(), &text));
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(|e| {
            TutorError::generation(
                GenerationErrorKind::Other,
                format!("failed to parse Gemini response: {e}"),
            )
        })?;

        extract_gemini_text(parsed)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

fn extract_gemini_text(response: GenerateContentResponse) -> Result<String> {
    let text: String = response
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .map(|part| part.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(TutorError::generation(
            GenerationErrorKind::EmptyResponse,
            "Gemini returned no text in the response candidates",
        ));
    }
    Ok(text)
}

// ============================================================================
// OpenAI-compatible
// ============================================================================

/// Client for any OpenAI-compatible `chat/completions` endpoint.
pub struct OpenAiCompatibleClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiCompatibleClient {
    /// Creates a client from model settings and an API key.
    pub fn new(client: Client, api_key: String, config: &ModelConfig) -> Self {
        Self {
            client,
            base_url: config.resolved_base_url().trim_end_matches('/').to_string(),
            api_key,
            model: config.model_name.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

#[async_trait]
impl LanguageModel for OpenAiCompatibleClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: Some(prompt.to_string()),
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        tracing::debug!(model = %self.model, prompt_len = prompt.len(), "Calling chat completions");

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(map_http_error(status.as_u16(), &text));
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|e| {
            TutorError::generation(
                GenerationErrorKind::Other,
                format!("failed to parse chat completion response: {e}"),
            )
        })?;

        extract_chat_text(parsed)
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

fn extract_chat_text(response: ChatCompletionResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| {
            TutorError::generation(
                GenerationErrorKind::EmptyResponse,
                "LLM response had no text content",
            )
        })
}


#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::testing::{ScriptedModel, StalledModel};
    use super::*;

    fn transient() -> TutorError {
        TutorError::generation(GenerationErrorKind::Server, "HTTP 503")
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_error() {
        let inner = Arc::new(ScriptedModel::new(vec![
            Err(transient()),
            Ok("hello".to_string()),
        ]));
        let model = RetryingModel::new(inner.clone(), Duration::from_secs(5), 1)
            .with_backoff(Duration::ZERO);

        assert_eq!(model.generate("hi").await.unwrap(), "hello");
        assert_eq!(inner.calls(), 2);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_retries() {
        let inner = Arc::new(ScriptedModel::new(vec![
            Err(transient()),
            Err(transient()),
            Ok("too late".to_string()),
        ]));
        let model = RetryingModel::new(inner.clone(), Duration::from_secs(5), 1)
            .with_backoff(Duration::ZERO);

        let err = model.generate("hi").await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(inner.calls(), 2);
    }

    #[tokio::test]
    async fn test_no_retry_for_permanent_error() {
        let inner = Arc::new(ScriptedModel::new(vec![
            Err(TutorError::generation(
                GenerationErrorKind::Authentication,
                "bad key",
            )),
            Ok("unused".to_string()),
        ]));
        let model = RetryingModel::new(inner.clone(), Duration::from_secs(5), 3)
            .with_backoff(Duration::ZERO);

        let err = model.generate("hi").await.unwrap_err();
        assert!(matches!(
            err,
            TutorError::GenerationError {
                kind: GenerationErrorKind::Authentication,
                ..
            }
        ));
        assert_eq!(inner.calls(), 1);
    }

    #[tokio::test]
    async fn test_timeout_maps_to_generation_error() {
        let model = RetryingModel::new(Arc::new(StalledModel), Duration::from_millis(20), 0);

        let err = model.generate("hi").await.unwrap_err();
        assert!(matches!(
            err,
            TutorError::GenerationError {
                kind: GenerationErrorKind::Timeout,
                ..
            }
        ));
    }

    #[test]
    fn test_extract_gemini_text_joins_parts() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Photo"},{"text":"synthesis"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_gemini_text(response).unwrap(), "Photosynthesis");
    }

    #[test]
    fn test_extract_gemini_text_empty_candidates() {
        let response: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        let err = extract_gemini_text(response).unwrap_err();
        assert!(matches!(
            err,
            TutorError::GenerationError {
                kind: GenerationErrorKind::EmptyResponse,
                ..
            }
        ));
    }

    #[test]
    fn test_extract_chat_text() {
        let response: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"Hi there"}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_chat_text(response).unwrap(), "Hi there");

        let empty: ChatCompletionResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(extract_chat_text(empty).is_err());
    }

    #[test]
    fn test_map_http_error_reads_provider_message() {
        let err = map_http_error(
            429,
            r#"{"error":{"code":429,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#,
        );
        assert!(err.is_transient());
        assert!(err.to_string().contains("Quota exceeded"));

        let err = map_http_error(401, "unauthorized");
        assert!(!err.is_transient());
        assert!(err.to_string().contains("unauthorized"));
    }

    #[test]
    fn test_gemini_request_shape() {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: "Explain gravity".to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.5,
                max_output_tokens: 2048,
            },
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["contents"][0]["parts"][0]["text"], "Explain gravity");
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 2048);
    }

    #[tokio::test]
    async fn test_transport_errors_do_not_leak_api_key() {
        let config = ModelConfig {
            base_url: Some("http://127.0.0.1:1".to_string()),
            ..Default::default()
        };
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();

        let gemini = GeminiClient::new(client.clone(), "SUPERSECRETKEY".to_string(), &config);
        let err = gemini.generate("hi").await.unwrap_err();
        assert!(matches!(
            err,
            TutorError::GenerationError {
                kind: GenerationErrorKind::Network | GenerationErrorKind::Timeout,
                ..
            }
        ));
        assert!(!err.to_string().contains("SUPERSECRETKEY"), "{err}");

        let openai = OpenAiCompatibleClient::new(client, "SUPERSECRETKEY".to_string(), &config);
        let err = openai.generate("hi").await.unwrap_err();
        assert!(!err.to_string().contains("SUPERSECRETKEY"), "{err}");
    }

    #[test]
    fn test_build_model_requires_api_key() {
        let config = ModelConfig {
            api_key_env: "ETERNA_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..Default::default()
        };
        let err = build_model(&config).err().unwrap();
        assert!(matches!(err, TutorError::MissingApiKey { ref env_var } if env_var == "ETERNA_TEST_KEY_THAT_IS_NEVER_SET"));
    }
}
