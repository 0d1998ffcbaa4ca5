//! OpenRouter LLM client implementation
//!
//! Provides async HTTP client for OpenRouter API with:
//! - Chat completions with optional reasoning
//! - Request timeout from configuration
//! - Rate limit handling with exponential backoff

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use tracing::{debug, info, warn};

use crate::config::LlmConfig;
use crate::error::{Error, Result};

use super::backend::CompletionBackend;
use super::types::{ChatRequest, ChatResponse, LlmResponse, Message};

/// Maximum number of attempts for rate-limited requests
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff (in milliseconds)
const BACKOFF_BASE_MS: u64 = 1000;

/// Wait used when a 429 response does not say how long to back off
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

const APP_REFERER: &str = "https://github.com/chronos-assistant/chronos";
const APP_TITLE: &str = "Chronos";

/// OpenRouter LLM client
///
/// Thread-safe client for making chat completion requests to OpenRouter API.
#[derive(Clone)]
pub struct LlmClient {
    /// HTTP client for making requests
    http_client: HttpClient,
    /// LLM configuration (model, temperature, etc.)
    config: LlmConfig,
    /// API key for authentication
    api_key: String,
    /// Base URL for the API
    base_url: String,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("base_url", &self.base_url)
            .field("default_model", &self.config.default_model)
            .field("reasoning", &self.config.reasoning)
            .finish()
    }
}

/// Builder for creating an LlmClient
#[derive(Default)]
pub struct LlmClientBuilder {
    config: Option<LlmConfig>,
    api_key: Option<String>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

impl LlmClientBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the LLM configuration
    pub fn config(mut self, config: LlmConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the API key
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Override the configured base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Override the configured request timeout
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Build the LlmClient
    pub fn build(self) -> Result<LlmClient> {
        let config = self.config.unwrap_or_default();
        let api_key = self
            .api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or(Error::ApiKeyMissing)?;

        let timeout_secs = self.timeout_secs.unwrap_or(config.timeout_secs);

        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(Error::NetworkError)?;

        let base_url = self
            .base_url
            .unwrap_or_else(|| config.base_url.clone())
            .trim_end_matches('/')
            .to_string();

        Ok(LlmClient {
            http_client,
            config,
            api_key,
            base_url,
        })
    }
}

impl LlmClient {
    /// Create a new LlmClient with the given configuration and API key
    pub fn new(config: LlmConfig, api_key: impl Into<String>) -> Result<Self> {
        LlmClientBuilder::new()
            .config(config)
            .api_key(api_key)
            .build()
    }

    /// Create a client from configuration, reading the key from the environment
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .resolved_api_key()
            .map_err(|e| Error::ConfigError(e.to_string()))?
            .ok_or(Error::ApiKeyMissing)?;
        Self::new(config.clone(), api_key)
    }

    /// Create a new builder for LlmClient
    pub fn builder() -> LlmClientBuilder {
        LlmClientBuilder::new()
    }

    /// Get the default model from configuration
    pub fn default_model(&self) -> &str {
        &self.config.default_model
    }

    /// Make a chat completion request
    ///
    /// Sends messages to the specified model (or the default) and returns the
    /// first choice.
    pub async fn complete(&self, messages: Vec<Message>, model: Option<&str>) -> Result<LlmResponse> {
        let model = model.unwrap_or(&self.config.default_model);

        let request = ChatRequest::new(model, messages)
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens)
            .with_reasoning(self.config.reasoning);

        let response = self.execute_request(&request).await?;
        info!(
            model = %response.model,
            tokens = response.tokens_used,
            finish = %response.finish_reason,
            "Chat completion successful"
        );
        Ok(response)
    }

    /// Execute a chat request with retry logic
    async fn execute_request(&self, request: &ChatRequest) -> Result<LlmResponse> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            match self.send_request(request).await {
                Ok(response) => return Ok(response),
                Err(Error::RateLimited(wait_secs)) if attempts < MAX_RETRY_ATTEMPTS => {
                    let backoff = calculate_backoff(attempts, wait_secs);
                    warn!(
                        attempt = attempts,
                        wait_ms = backoff,
                        "Rate limited, retrying after backoff"
                    );
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Send a single request to the API
    async fn send_request(&self, request: &ChatRequest) -> Result<LlmResponse> {
        let url = format!("{}/chat/completions", self.base_url);

        debug!(
            model = %request.model,
            messages = request.messages.len(),
            reasoning = request.reasoning.is_some(),
            "Sending chat completion request"
        );

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", APP_REFERER)
            .header("X-Title", APP_TITLE)
            .json(request)
            .send()
            .await
            .map_err(Error::NetworkError)?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::LLMError(format!("Failed to parse response: {}", e)))?;

        LlmResponse::from_chat_response(chat_response)
            .ok_or_else(|| Error::LLMError("Empty response from API".to_string()))
    }
}

#[async_trait]
impl CompletionBackend for LlmClient {
    async fn complete(&self, messages: Vec<Message>) -> Result<LlmResponse> {
        LlmClient::complete(self, messages, None).await
    }

    fn model(&self) -> &str {
        self.default_model()
    }
}

/// Map an unsuccessful HTTP status to an error
fn status_error(status: reqwest::StatusCode, body: &str) -> Error {
    match status.as_u16() {
        401 => Error::LLMError(
            "Unauthorized: Invalid API key. Set CHRONOS_API_KEY or OPENROUTER_API_KEY environment variable.".to_string(),
        ),
        429 => Error::RateLimited(extract_retry_after(body).unwrap_or(DEFAULT_RETRY_AFTER_SECS)),
        400 => Error::LLMError(format!("Bad request: {}", body)),
        402 => Error::LLMError(
            "Payment required: Insufficient credits on OpenRouter account".to_string(),
        ),
        403 => Error::LLMError(format!("Forbidden: {}", body)),
        404 => Error::LLMError(format!(
            "Model not found or endpoint unavailable: {}",
            body
        )),
        500..=599 => Error::LLMError(format!("Server error ({}): {}", status, body)),
        _ => Error::LLMError(format!("HTTP error {}: {}", status, body)),
    }
}

/// Calculate backoff delay with jitter
fn calculate_backoff(attempt: u32, suggested_wait: u64) -> u64 {
    let base = BACKOFF_BASE_MS * 2u64.pow(attempt.saturating_sub(1));
    let suggested = suggested_wait.saturating_mul(1000);

    // Use the larger of calculated backoff or suggested wait
    let delay = base.max(suggested);

    // Up to 10% jitter
    let jitter = delay / 10;
    delay + (clock_jitter() % jitter.max(1))
}

/// Pseudo-random jitter from the clock's sub-second part
fn clock_jitter() -> u64 {
    use std::time::SystemTime;
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64 % 1000)
        .unwrap_or(0)
}

/// Extract retry-after value from error response
fn extract_retry_after(body: &str) -> Option<u64> {
    let json = serde_json::from_str::<serde_json::Value>(body).ok()?;
    json.get("retry_after")
        .and_then(|v| v.as_u64())
        .or_else(|| {
            json.get("error")
                .and_then(|error| error.get("retry_after"))
                .and_then(|v| v.as_u64())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    fn test_config() -> LlmConfig {
        LlmConfig {
            default_model: "test/model".to_string(),
            timeout_secs: 30,
            ..LlmConfig::default()
        }
    }

    #[test]
    fn test_client_builder() {
        let client = LlmClient::builder()
            .config(test_config())
            .api_key("test-key")
            .base_url("https://example.com/api/")
            .timeout_secs(60)
            .build()
            .unwrap();

        assert_eq!(client.default_model(), "test/model");
        assert_eq!(client.base_url, "https://example.com/api");
    }

    #[test]
    fn test_client_builder_uses_config_base_url() {
        let client = LlmClient::new(test_config(), "test-key").unwrap();
        assert_eq!(client.base_url, "https://openrouter.ai/api/v1");
    }

    #[test]
    fn test_client_builder_requires_api_key() {
        let result = LlmClient::builder().config(test_config()).build();
        assert!(matches!(result, Err(Error::ApiKeyMissing)));

        let blank = LlmClient::builder().config(test_config()).api_key("  ").build();
        assert!(matches!(blank, Err(Error::ApiKeyMissing)));
    }

    #[test]
    fn test_client_debug_hides_key() {
        let client = LlmClient::new(test_config(), "sk-or-secret").unwrap();
        let debug = format!("{:?}", client);
        assert!(debug.contains("LlmClient"));
        assert!(debug.contains("test/model"));
        assert!(!debug.contains("sk-or-secret"));
    }

    #[test]
    fn test_client_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LlmClient>();
    }

    #[test]
    fn test_backend_model() {
        let client = LlmClient::new(test_config(), "test-key").unwrap();
        assert_eq!(CompletionBackend::model(&client), "test/model");
    }

    #[test]
    fn test_status_error_mapping() {
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, r#"{"retry_after": 7}"#),
            Error::RateLimited(7)
        ));
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, "slow down"),
            Error::RateLimited(DEFAULT_RETRY_AFTER_SECS)
        ));
        let unauthorized = status_error(StatusCode::UNAUTHORIZED, "");
        assert!(unauthorized.to_string().contains("OPENROUTER_API_KEY"));
        let server = status_error(StatusCode::BAD_GATEWAY, "upstream");
        assert!(matches!(server, Error::LLMError(ref msg) if msg.starts_with("Server error")));
        assert!(server.is_connectivity());
    }

    #[test]
    fn test_calculate_backoff() {
        let backoff1 = calculate_backoff(1, 0);
        assert!(backoff1 >= BACKOFF_BASE_MS);
        assert!(backoff1 < BACKOFF_BASE_MS + BACKOFF_BASE_MS / 10);

        let backoff2 = calculate_backoff(2, 0);
        assert!(backoff2 >= BACKOFF_BASE_MS * 2);

        // With suggested wait
        let backoff_with_wait = calculate_backoff(1, 5);
        assert!(backoff_with_wait >= 5000);
    }

    #[test]
    fn test_extract_retry_after() {
        assert_eq!(extract_retry_after(r#"{"retry_after": 30}"#), Some(30));
        assert_eq!(extract_retry_after(r#"{"error": {"retry_after": 60}}"#), Some(60));
        assert_eq!(extract_retry_after(r#"{"message": "rate limited"}"#), None);
        assert_eq!(extract_retry_after("not json"), None);
    }
}
