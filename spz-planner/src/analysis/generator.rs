//! Text-generation gateway
//!
//! [`TextGenerator`] turns a prompt into a JSON value. [`OpenAiGenerator`]
//! talks to an OpenAI-compatible `chat/completions` endpoint;
//! [`StubGenerator`] replays canned results without network access.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use spz_common::config::OpenAiConfig;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const USER_AGENT: &str = concat!("spz-planner/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("No API key configured for text generation")]
    NotConfigured,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Send `prompt` and parse the reply as JSON
    async fn generate_json(&self, prompt: &str) -> Result<Value, GenerationError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: Value,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

pub struct OpenAiGenerator {
    http_client: reqwest::Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl OpenAiGenerator {
    /// `api_key` overrides `config.api_key` when present
    pub fn new(config: &OpenAiConfig, api_key: Option<String>) -> Result<Self, GenerationError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            api_key: api_key.or_else(|| config.api_key.clone()).filter(|k| !k.is_empty()),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn generate_json(&self, prompt: &str) -> Result<Value, GenerationError> {
        let api_key = self.api_key.as_deref().ok_or(GenerationError::NotConfigured)?;

        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            response_format: json!({ "type": "json_object" }),
        };

        debug!(model = %self.model, prompt_len = prompt.len(), "Requesting completion");

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api(status.as_u16(), body));
        }

        let completion: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Parse(e.to_string()))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        parse_reply(&content)
    }
}

/// Parse model output; an empty reply counts as an empty object
pub fn parse_reply(content: &str) -> Result<Value, GenerationError> {
    let content = content.trim();
    if content.is_empty() {
        return Ok(json!({}));
    }
    serde_json::from_str(content).map_err(|e| GenerationError::Parse(e.to_string()))
}

/// Canned generator for tests and offline runs
///
/// Replies are consumed in order; once exhausted every call returns `{}`.
/// Every prompt is recorded.
#[derive(Default)]
pub struct StubGenerator {
    replies: Mutex<VecDeque<Result<Value, String>>>,
    prompts: Mutex<Vec<String>>,
}

impl StubGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply
    pub fn push_reply(&self, value: Value) {
        self.lock_replies().push_back(Ok(value));
    }

    /// Queue a gateway failure
    pub fn push_failure(&self, message: impl Into<String>) {
        self.lock_replies().push_back(Err(message.into()));
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn lock_replies(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<Value, String>>> {
        self.replies.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl TextGenerator for StubGenerator {
    async fn generate_json(&self, prompt: &str) -> Result<Value, GenerationError> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(prompt.to_string());

        match self.lock_replies().pop_front() {
            Some(Ok(value)) => Ok(value),
            Some(Err(message)) => Err(GenerationError::Network(message)),
            None => Ok(json!({})),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reply_accepts_object() {
        let value = parse_reply(r#"{"practices": ["A"]}"#).unwrap();
        assert_eq!(value["practices"][0], "A");
    }

    #[test]
    fn test_parse_reply_empty_is_empty_object() {
        assert_eq!(parse_reply("  ").unwrap(), json!({}));
    }

    #[test]
    fn test_parse_reply_rejects_prose() {
        let err = parse_reply("Sure! Here is your analysis").unwrap_err();
        assert!(matches!(err, GenerationError::Parse(_)));
    }

    #[tokio::test]
    async fn test_missing_key_is_not_configured() {
        let generator = OpenAiGenerator::new(&OpenAiConfig::default(), None).unwrap();
        assert!(!generator.is_configured());
        let err = generator.generate_json("hi").await.unwrap_err();
        assert!(matches!(err, GenerationError::NotConfigured));
    }

    #[tokio::test]
    async fn test_stub_replays_in_order_and_records_prompts() {
        let stub = StubGenerator::new();
        stub.push_reply(json!({"a": 1}));
        stub.push_failure("boom");

        assert_eq!(stub.generate_json("p1").await.unwrap(), json!({"a": 1}));
        assert!(stub.generate_json("p2").await.is_err());
        assert_eq!(stub.generate_json("p3").await.unwrap(), json!({}));
        assert_eq!(stub.prompts(), vec!["p1", "p2", "p3"]);
    }
}
