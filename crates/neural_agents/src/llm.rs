//! LLM adapter for chat completions.
//!
//! Supports OpenAI and Anthropic APIs. The provider comes from settings,
//! the API key only from the environment.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{AgentError, AgentResult};
use crate::roles::AgentRole;

/// LLM provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    OpenAI,
    Anthropic,
}

impl LlmProvider {
    pub fn parse(s: &str) -> AgentResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "anthropic" => Ok(Self::Anthropic),
            other => Err(AgentError::UnknownProvider(other.to_string())),
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAI => "gpt-5-mini",
            Self::Anthropic => "claude-sonnet-4.5",
        }
    }

    /// Environment variable holding the API key.
    pub fn key_var(&self) -> &'static str {
        match self {
            Self::OpenAI => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
        }
    }
}

/// Provider and model selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub provider: LlmProvider,
    /// Overrides the provider's default model
    pub model: Option<String>,
    pub max_tokens: u32,
    /// Attempts for transient failures (5xx, 429, network)
    pub max_retries: u32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAI,
            model: None,
            max_tokens: 4096,
            max_retries: 3,
        }
    }
}

/// One prompt sent to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub role: AgentRole,
    pub system: String,
    pub user: String,
    /// Ask the provider for a JSON object response
    pub json: bool,
}

impl CompletionRequest {
    pub fn new(role: AgentRole, system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            role,
            system: system.into(),
            user: user.into(),
            json: role.returns_json(),
        }
    }
}

/// Anything that can turn a prompt into raw model text.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> AgentResult<String>;
}

/// Response from LLM including usage info
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub model: String,
}

/// HTTP adapter for the hosted chat APIs.
pub struct LlmAdapter {
    provider: LlmProvider,
    api_key: String,
    model: String,
    max_tokens: u32,
    max_retries: u32,
    client: reqwest::Client,
}

impl LlmAdapter {
    /// Create a new LLM adapter with explicit configuration
    pub fn new(settings: &LlmSettings, api_key: String) -> Self {
        Self {
            provider: settings.provider,
            api_key,
            model: settings
                .model
                .clone()
                .unwrap_or_else(|| settings.provider.default_model().to_string()),
            max_tokens: settings.max_tokens,
            max_retries: settings.max_retries.max(1),
            client: reqwest::Client::new(),
        }
    }

    /// Create an adapter for the configured provider, reading its key from the environment.
    pub fn from_env(settings: &LlmSettings) -> AgentResult<Self> {
        match std::env::var(settings.provider.key_var()) {
            Ok(key) if !key.is_empty() => Ok(Self::new(settings, key)),
            _ => Err(AgentError::LlmNotConfigured),
        }
    }

    /// Get the current provider
    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    /// Get the current model
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run one completion with retries on transient errors.
    pub async fn chat(&self, request: &CompletionRequest) -> AgentResult<LlmResponse> {
        let mut last_error = None;

        for attempt in 0..self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 2s, 4s, ...
                tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
            }

            let sent = match self.provider {
                LlmProvider::OpenAI => self.send_openai(request).await,
                LlmProvider::Anthropic => self.send_anthropic(request).await,
            };

            match sent {
                Ok(response) => {
                    debug!(
                        role = %request.role,
                        input_tokens = response.input_tokens,
                        output_tokens = response.output_tokens,
                        "LLM completion"
                    );
                    return Ok(response);
                }
                Err(Attempt::Retry(message)) => {
                    warn!(
                        "{:?} request failed (attempt {}/{}): {}",
                        self.provider,
                        attempt + 1,
                        self.max_retries,
                        message
                    );
                    last_error = Some(AgentError::Llm(message));
                }
                Err(Attempt::Fatal(e)) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| AgentError::Llm("Max retries exceeded".to_string())))
    }

    async fn send_openai(&self, request: &CompletionRequest) -> Result<LlmResponse, Attempt> {
        let body = OpenAIRequest {
            model: self.model.clone(),
            messages: vec![
                OpenAIMessage {
                    role: "system".to_string(),
                    content: request.system.clone(),
                },
                OpenAIMessage {
                    role: "user".to_string(),
                    content: request.user.clone(),
                },
            ],
            max_completion_tokens: Some(self.max_tokens),
            response_format: request.json.then(|| ResponseFormat {
                kind: "json_object".to_string(),
            }),
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| Attempt::Retry(format!("Network error: {}", e)))?;

        let result: OpenAIResponse = check_status(response, "OpenAI").await?;
        let content = result
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Attempt::Fatal(AgentError::Llm("No response from OpenAI".to_string())))?;
        let (input_tokens, output_tokens) = result
            .usage
            .map(|u| (u.prompt_tokens, u.completion_tokens))
            .unwrap_or((0, 0));

        Ok(LlmResponse {
            content,
            input_tokens,
            output_tokens,
            model: self.model.clone(),
        })
    }

    async fn send_anthropic(&self, request: &CompletionRequest) -> Result<LlmResponse, Attempt> {
        let mut user = request.user.clone();
        if request.json {
            user.push_str("\n\nRespond with a single JSON object and nothing else.");
        }

        let body = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: Some(request.system.clone()),
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: user,
            }],
        };

        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .map_err(|e| Attempt::Retry(format!("Network error: {}", e)))?;

        let result: AnthropicResponse = check_status(response, "Anthropic").await?;
        let content = result
            .content
            .into_iter()
            .next()
            .map(|c| c.text)
            .ok_or_else(|| {
                Attempt::Fatal(AgentError::Llm("No response from Anthropic".to_string()))
            })?;
        let (input_tokens, output_tokens) = result
            .usage
            .map(|u| (u.input_tokens, u.output_tokens))
            .unwrap_or((0, 0));

        Ok(LlmResponse {
            content,
            input_tokens,
            output_tokens,
            model: self.model.clone(),
        })
    }
}

#[async_trait]
impl CompletionBackend for LlmAdapter {
    async fn complete(&self, request: &CompletionRequest) -> AgentResult<String> {
        Ok(self.chat(request).await?.content)
    }
}

/// Outcome of a single HTTP attempt that did not succeed.
enum Attempt {
    Retry(String),
    Fatal(AgentError),
}

async fn check_status<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
    provider: &str,
) -> Result<T, Attempt> {
    let status = response.status();

    // Retry on server errors (5xx) and rate limits (429)
    if status.is_server_error() || status.as_u16() == 429 {
        let body = response.text().await.unwrap_or_default();
        return Err(Attempt::Retry(format!("{} API error {}: {}", provider, status, body)));
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Attempt::Fatal(AgentError::Llm(format!(
            "{} API error {}: {}",
            provider, status, body
        ))));
    }

    response
        .json()
        .await
        .map_err(|e| Attempt::Fatal(AgentError::Llm(format!("Failed to parse response: {}", e))))
}

// OpenAI API types
#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: String,
}

// Anthropic API types
#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u64,
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parse() {
        assert_eq!(LlmProvider::parse("OpenAI").unwrap(), LlmProvider::OpenAI);
        assert_eq!(LlmProvider::parse("anthropic").unwrap(), LlmProvider::Anthropic);
        assert!(matches!(
            LlmProvider::parse("gemini"),
            Err(AgentError::UnknownProvider(_))
        ));
    }

    #[test]
    fn test_default_models() {
        let openai = LlmAdapter::new(&LlmSettings::default(), "key".to_string());
        assert_eq!(openai.model(), "gpt-5-mini");

        let settings = LlmSettings {
            provider: LlmProvider::Anthropic,
            ..Default::default()
        };
        let anthropic = LlmAdapter::new(&settings, "key".to_string());
        assert_eq!(anthropic.model(), "claude-sonnet-4.5");
    }

    #[test]
    fn test_custom_model() {
        let settings = LlmSettings {
            model: Some("gpt-4.1".to_string()),
            ..Default::default()
        };
        let adapter = LlmAdapter::new(&settings, "key".to_string());
        assert_eq!(adapter.model(), "gpt-4.1");
        assert_eq!(adapter.provider(), LlmProvider::OpenAI);
    }

    #[test]
    fn test_json_requests_follow_role() {
        let request = CompletionRequest::new(AgentRole::Planner, "sys", "user");
        assert!(request.json);
        let request = CompletionRequest::new(AgentRole::Coder, "sys", "user");
        assert!(!request.json);
    }

    #[test]
    fn test_openai_request_shape() {
        let body = OpenAIRequest {
            model: "m".to_string(),
            messages: vec![],
            max_completion_tokens: None,
            response_format: Some(ResponseFormat {
                kind: "json_object".to_string(),
            }),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["response_format"]["type"], "json_object");
        assert!(json.get("max_completion_tokens").is_none());
    }
}
