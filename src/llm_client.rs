//! Anthropic Messages API client behind the `LanguageModel` seam.

use async_trait::async_trait;
use failsafe::futures::CircuitBreaker;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::circuit_breaker::{create_model_circuit_breaker, ModelCircuitBreaker};
use crate::config::Config;
use crate::errors::AppError;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Why a model call did not produce a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelCallError {
    /// HTTP 429.
    RateLimited(String),
    /// Request or read timed out.
    Timeout(String),
    /// 5xx, overloaded or connection failure.
    Unavailable(String),
    /// Any other non-success status.
    Api(String),
    /// Response body could not be understood.
    Malformed(String),
    /// The circuit breaker is open.
    CircuitOpen,
}

impl ModelCallError {
    /// Worth retrying after a delay.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ModelCallError::RateLimited(_) | ModelCallError::Timeout(_) | ModelCallError::Unavailable(_)
        )
    }
}

impl fmt::Display for ModelCallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelCallError::RateLimited(msg) => write!(f, "Rate limited: {}", msg),
            ModelCallError::Timeout(msg) => write!(f, "Model call timed out: {}", msg),
            ModelCallError::Unavailable(msg) => write!(f, "Model API unavailable: {}", msg),
            ModelCallError::Api(msg) => write!(f, "Model API error: {}", msg),
            ModelCallError::Malformed(msg) => write!(f, "Malformed model response: {}", msg),
            ModelCallError::CircuitOpen => write!(f, "Model circuit breaker is open"),
        }
    }
}

impl std::error::Error for ModelCallError {}

impl From<reqwest::Error> for ModelCallError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ModelCallError::Timeout(err.to_string())
        } else if err.is_decode() {
            ModelCallError::Malformed(err.to_string())
        } else {
            ModelCallError::Unavailable(err.to_string())
        }
    }
}

impl From<ModelCallError> for AppError {
    fn from(err: ModelCallError) -> Self {
        AppError::upstream("anthropic", err.to_string())
    }
}

/// A tool the model is forced to call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub model: String,
    pub system: Option<String>,
    pub prompt: String,
    pub max_tokens: u32,
    pub tool: Option<ToolSpec>,
}

impl ModelRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            system: None,
            prompt: prompt.into(),
            max_tokens,
            tool: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_tool(mut self, tool: ToolSpec) -> Self {
        self.tool = Some(tool);
        self
    }

    /// Request body for `POST /v1/messages`.
    pub fn to_body(&self) -> Value {
        let mut body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": [{ "role": "user", "content": self.prompt }],
        });
        if let Some(system) = &self.system {
            body["system"] = json!(system);
        }
        if let Some(tool) = &self.tool {
            body["tools"] = json!([{
                "name": tool.name,
                "description": tool.description,
                "input_schema": tool.input_schema,
            }]);
            body["tool_choice"] = json!({ "type": "tool", "name": tool.name });
        }
        body
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelResponse {
    pub model: String,
    /// Concatenated text blocks.
    pub text: String,
    /// Input of the first `tool_use` block.
    pub tool_input: Option<Value>,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl ModelResponse {
    pub fn tokens_used(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        input: Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

impl From<MessagesResponse> for ModelResponse {
    fn from(raw: MessagesResponse) -> Self {
        let mut text = Vec::new();
        let mut tool_input = None;
        for block in raw.content {
            match block {
                ContentBlock::Text { text: t } => text.push(t),
                ContentBlock::ToolUse { input } if tool_input.is_none() => tool_input = Some(input),
                _ => {}
            }
        }
        Self {
            model: raw.model,
            text: text.join(""),
            tool_input,
            input_tokens: raw.usage.input_tokens,
            output_tokens: raw.usage.output_tokens,
        }
    }
}

/// One completion against a hosted language model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, ModelCallError>;
}

/// Client for the Anthropic Messages API.
#[derive(Clone)]
pub struct AnthropicClient {
    client: Client,
    base_url: String,
    api_key: String,
    breaker: ModelCircuitBreaker,
}

impl AnthropicClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            breaker: create_model_circuit_breaker(),
        })
    }

    /// `None` when no API key is configured; callers then run in mock mode.
    pub fn from_config(config: &Config) -> Result<Option<Arc<dyn LanguageModel>>, AppError> {
        let Some(api_key) = config.anthropic_api_key.as_deref() else {
            tracing::warn!("⚠ ANTHROPIC_API_KEY not set, content generation runs in mock mode");
            return Ok(None);
        };
        let client = Self::new(
            config.anthropic_base_url.clone(),
            api_key,
            Duration::from_secs(config.llm_timeout_secs),
        )?;
        tracing::info!("✓ Anthropic client initialized ({})", config.anthropic_base_url);
        Ok(Some(Arc::new(client)))
    }

    async fn send(&self, request: &ModelRequest) -> Result<ModelResponse, ModelCallError> {
        let url = format!("{}/v1/messages", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request.to_body())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let message = format!("Anthropic returned status {}: {}", status, error_text);
            return Err(classify_status(status, message));
        }

        let raw: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ModelCallError::Malformed(e.to_string()))?;
        Ok(raw.into())
    }
}

fn classify_status(status: StatusCode, message: String) -> ModelCallError {
    match status.as_u16() {
        429 => ModelCallError::RateLimited(message),
        408 => ModelCallError::Timeout(message),
        500..=599 => ModelCallError::Unavailable(message),
        _ => ModelCallError::Api(message),
    }
}

#[async_trait]
impl LanguageModel for AnthropicClient {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, ModelCallError> {
        tracing::debug!(
            "Calling model {} (max_tokens={}, tool={})",
            request.model,
            request.max_tokens,
            request.tool.as_ref().map(|t| t.name.as_str()).unwrap_or("none")
        );
        match self
            .breaker
            .call_with(ModelCallError::is_transient, self.send(request))
            .await
        {
            Ok(response) => Ok(response),
            Err(failsafe::Error::Inner(e)) => Err(e),
            Err(failsafe::Error::Rejected) => {
                tracing::warn!("⚠ Model circuit breaker open, skipping call");
                Err(ModelCallError::CircuitOpen)
            }
        }
    }
}

/// Bounded retry for transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.llm_max_retries.max(1),
            delay: Duration::from_millis(config.llm_retry_delay_ms),
        }
    }

    /// Delay before the attempt after `attempt` (1-based), growing linearly.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.delay * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

/// Calls the model, retrying rate limits, timeouts and outages with a growing delay.
pub async fn complete_with_retry(
    model: &dyn LanguageModel,
    request: &ModelRequest,
    policy: RetryPolicy,
) -> Result<ModelResponse, ModelCallError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match model.complete(request).await {
            Ok(response) => return Ok(response),
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.backoff(attempt);
                tracing::warn!(
                    "⚠ {} (attempt {}/{}), retrying in {:?}",
                    e,
                    attempt,
                    policy.max_attempts,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Strips a surrounding ```json fence.
pub fn strip_code_fence(text: &str) -> &str {
    let mut content = text.trim();
    if let Some(rest) = content.strip_prefix("```json") {
        content = rest;
    } else if let Some(rest) = content.strip_prefix("```") {
        content = rest;
    }
    if let Some(rest) = content.strip_suffix("```") {
        content = rest;
    }
    content.trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    struct Scripted {
        replies: Mutex<Vec<Result<ModelResponse, ModelCallError>>>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl LanguageModel for Scripted {
        async fn complete(&self, _request: &ModelRequest) -> Result<ModelResponse, ModelCallError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies.lock().unwrap().remove(0)
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_request_body_forces_tool() {
        let request = ModelRequest::new("claude-sonnet-4-20250514", "hello", 2000)
            .with_system("be brief")
            .with_tool(ToolSpec {
                name: "generate_executive_review".to_string(),
                description: "d".to_string(),
                input_schema: json!({"type": "object"}),
            });
        let body = request.to_body();
        assert_eq!(body["max_tokens"], 2000);
        assert_eq!(body["system"], "be brief");
        assert_eq!(body["messages"][0]["content"], "hello");
        assert_eq!(body["tool_choice"]["name"], "generate_executive_review");
        assert_eq!(body["tools"][0]["input_schema"]["type"], "object");
    }

    #[test]
    fn test_response_blocks() {
        let raw: MessagesResponse = serde_json::from_value(json!({
            "model": "m",
            "content": [
                {"type": "text", "text": "a"},
                {"type": "tool_use", "id": "t1", "name": "x", "input": {"k": 1}},
                {"type": "thinking", "thinking": "..."}
            ],
            "usage": {"input_tokens": 10, "output_tokens": 5}
        }))
        .unwrap();
        let response = ModelResponse::from(raw);
        assert_eq!(response.text, "a");
        assert_eq!(response.tool_input, Some(json!({"k": 1})));
        assert_eq!(response.tokens_used(), 15);
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, String::new()),
            ModelCallError::RateLimited(_)
        ));
        assert!(classify_status(StatusCode::from_u16(529).unwrap(), String::new()).is_transient());
        assert!(!classify_status(StatusCode::BAD_REQUEST, String::new()).is_transient());
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("  {} "), "{}");
    }

    #[tokio::test]
    async fn test_retry_recovers_from_rate_limit() {
        let model = Scripted {
            replies: Mutex::new(vec![
                Err(ModelCallError::RateLimited("429".into())),
                Ok(ModelResponse {
                    text: "ok".into(),
                    ..Default::default()
                }),
            ]),
            calls: AtomicU32::new(0),
        };
        let request = ModelRequest::new("m", "p", 10);
        let response = complete_with_retry(&model, &request, fast_policy()).await.unwrap();
        assert_eq!(response.text, "ok");
        assert_eq!(model.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_gives_up_on_client_errors() {
        let model = Scripted {
            replies: Mutex::new(vec![Err(ModelCallError::Api("400".into()))]),
            calls: AtomicU32::new(0),
        };
        let request = ModelRequest::new("m", "p", 10);
        let err = complete_with_retry(&model, &request, fast_policy()).await.unwrap_err();
        assert_eq!(err, ModelCallError::Api("400".into()));
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_is_bounded() {
        let model = Scripted {
            replies: Mutex::new(vec![
                Err(ModelCallError::Timeout("t".into())),
                Err(ModelCallError::Timeout("t".into())),
                Err(ModelCallError::Timeout("t".into())),
            ]),
            calls: AtomicU32::new(0),
        };
        let request = ModelRequest::new("m", "p", 10);
        assert!(complete_with_retry(&model, &request, fast_policy()).await.is_err());
        assert_eq!(model.calls.load(Ordering::SeqCst), 3);
    }
}
