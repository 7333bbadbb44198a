//! Planner client for OpenAI-compatible function calling.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

use super::conversation::{ActionCall, Conversation};

/// Default number of retry attempts for failed requests.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default delay between retry attempts in seconds.
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 2;

/// Planner client errors.
#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("Failed to parse response: {0}")]
    ParseError(String),
    #[error("API error: {0}")]
    ApiError(String),
    #[error("Max retries exceeded after {0} attempts: {1}")]
    MaxRetriesExceeded(u32, String),
}

/// Configuration for the reasoning service.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    pub base_url: String,
    pub api_key: String,
    pub model_name: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Maximum number of retry attempts for failed requests.
    pub max_retries: u32,
    /// Delay between retry attempts in seconds.
    pub retry_delay_secs: u64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: "EMPTY".to_string(),
            model_name: "gpt-4o".to_string(),
            max_tokens: 2048,
            temperature: 0.0,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
        }
    }
}

impl PlannerConfig {
    /// Create a new PlannerConfig with custom base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Create a new PlannerConfig with custom API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    /// Create a new PlannerConfig with custom model name.
    pub fn with_model_name(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = model_name.into();
        self
    }

    /// Set the maximum number of retry attempts for failed requests.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the delay between retry attempts in seconds.
    pub fn with_retry_delay(mut self, delay_secs: u64) -> Self {
        self.retry_delay_secs = delay_secs;
        self
    }
}

/// What the planner decided for one think step.
#[derive(Debug, Clone)]
pub enum PlannerDecision {
    /// Zero or more structured calls, dispatched in order.
    ActionPlan(Vec<ActionCall>),
    /// A plain-text reply; the task is complete with this message.
    Message(String),
}

/// The think-step seam between the loop and the reasoning service.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(
        &self,
        conversation: &Conversation,
        tool_definitions: &[Value],
    ) -> Result<PlannerDecision, PlannerError>;
}

/// Chat-completions wire structures.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

/// Client for OpenAI-compatible chat-completions endpoints with tool calling.
pub struct PlannerClient {
    config: PlannerConfig,
    client: Client,
}

impl PlannerClient {
    /// Create a new PlannerClient with the given configuration.
    pub fn new(config: PlannerConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    /// Create a new PlannerClient with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(PlannerConfig::default())
    }

    /// Check if an error is retryable (network errors, rate limits, 5xx).
    fn is_retryable_error(error: &PlannerError) -> bool {
        match error {
            PlannerError::RequestFailed(_) => true,
            PlannerError::ApiError(msg) => {
                msg.contains("500")
                    || msg.contains("502")
                    || msg.contains("503")
                    || msg.contains("504")
                    || msg.contains("429")
                    || msg.to_lowercase().contains("timeout")
                    || msg.to_lowercase().contains("rate limit")
            }
            PlannerError::ParseError(_) => false,
            PlannerError::MaxRetriesExceeded(_, _) => false,
        }
    }

    /// Send a single request to the API.
    async fn send_request(&self, url: &str, body: &Value) -> Result<PlannerDecision, PlannerError> {
        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(PlannerError::ApiError(format!("{}: {}", status, error_text)));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| PlannerError::ParseError(e.to_string()))?;

        let Some(choice) = completion.choices.into_iter().next() else {
            return Err(PlannerError::ParseError("No choices in response".to_string()));
        };

        Ok(Self::decide(choice.message))
    }

    /// Turn one wire message into a decision.
    fn decide(message: WireMessage) -> PlannerDecision {
        match message.tool_calls {
            Some(calls) if !calls.is_empty() => {
                let plan = calls
                    .into_iter()
                    .map(|c| {
                        let arguments = parse_arguments(&c.function.name, &c.function.arguments);
                        ActionCall::new(c.id, c.function.name, arguments)
                    })
                    .collect();
                PlannerDecision::ActionPlan(plan)
            }
            _ => PlannerDecision::Message(message.content.unwrap_or_default()),
        }
    }
}

/// Parse the JSON-string argument payload of one tool call.
///
/// A malformed argument string degrades to an empty object; schema
/// validation then reports the missing fields back to the planner as an
/// observation instead of killing the task.
fn parse_arguments(tool_name: &str, raw: &str) -> Map<String, Value> {
    if raw.trim().is_empty() {
        return Map::new();
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => {
            tracing::warn!(tool = tool_name, "Discarding unparseable tool arguments");
            Map::new()
        }
    }
}

#[async_trait]
impl Planner for PlannerClient {
    async fn plan(
        &self,
        conversation: &Conversation,
        tool_definitions: &[Value],
    ) -> Result<PlannerDecision, PlannerError> {
        let url = format!("{}/chat/completions", self.config.base_url);

        let body = json!({
            "messages": conversation.messages(),
            "model": self.config.model_name,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "tools": tool_definitions,
            "tool_choice": "auto",
        });

        let mut last_error: Option<PlannerError> = None;
        let max_attempts = self.config.max_retries + 1; // +1 for the initial attempt

        for attempt in 1..=max_attempts {
            match self.send_request(&url, &body).await {
                Ok(decision) => return Ok(decision),
                Err(e) => {
                    let is_retryable = Self::is_retryable_error(&e);

                    if attempt < max_attempts && is_retryable {
                        tracing::warn!(
                            attempt,
                            max_attempts,
                            error = %e,
                            "Planner request failed, retrying in {}s",
                            self.config.retry_delay_secs
                        );
                        sleep(Duration::from_secs(self.config.retry_delay_secs)).await;
                        last_error = Some(e);
                    } else if !is_retryable {
                        return Err(e);
                    } else {
                        last_error = Some(e);
                    }
                }
            }
        }

        Err(PlannerError::MaxRetriesExceeded(
            self.config.max_retries,
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planner_config_default() {
        let config = PlannerConfig::default();
        assert_eq!(config.base_url, "https://api.openai.com/v1");
        assert_eq!(config.model_name, "gpt-4o");
    }

    #[test]
    fn test_planner_config_builder() {
        let config = PlannerConfig::default()
            .with_base_url("http://localhost:8000/v1")
            .with_model_name("local-planner")
            .with_max_retries(1)
            .with_retry_delay(0);
        assert_eq!(config.base_url, "http://localhost:8000/v1");
        assert_eq!(config.model_name, "local-planner");
        assert_eq!(config.max_retries, 1);
    }

    #[test]
    fn test_decide_tool_calls() {
        let message = WireMessage {
            content: None,
            tool_calls: Some(vec![WireToolCall {
                id: "call_9".to_string(),
                function: WireFunction {
                    name: "browser_navigate".to_string(),
                    arguments: r#"{"url": "https://example.com"}"#.to_string(),
                },
            }]),
        };
        match PlannerClient::decide(message) {
            PlannerDecision::ActionPlan(plan) => {
                assert_eq!(plan.len(), 1);
                assert_eq!(plan[0].call_id, "call_9");
                assert_eq!(plan[0].str_arg("url"), Some("https://example.com"));
            }
            PlannerDecision::Message(_) => panic!("expected an action plan"),
        }
    }

    #[test]
    fn test_decide_plain_text() {
        let message = WireMessage {
            content: Some("Hello! How can I help?".to_string()),
            tool_calls: None,
        };
        match PlannerClient::decide(message) {
            PlannerDecision::Message(text) => assert_eq!(text, "Hello! How can I help?"),
            PlannerDecision::ActionPlan(_) => panic!("expected a message"),
        }
    }

    #[test]
    fn test_parse_arguments_malformed_degrades_to_empty() {
        let args = parse_arguments("wait", "{not json");
        assert!(args.is_empty());
        let args = parse_arguments("wait", "");
        assert!(args.is_empty());
        let args = parse_arguments("wait", "[1, 2]");
        assert!(args.is_empty());
    }

    #[test]
    fn test_is_retryable_error() {
        assert!(PlannerClient::is_retryable_error(&PlannerError::ApiError(
            "503 Service Unavailable".to_string()
        )));
        assert!(PlannerClient::is_retryable_error(&PlannerError::ApiError(
            "429 rate limit".to_string()
        )));
        assert!(!PlannerClient::is_retryable_error(
            &PlannerError::ParseError("bad json".to_string())
        ));
    }
}
