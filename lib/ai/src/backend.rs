//! OpenAI-compatible chat completions backend.
//!
//! OpenAI, Ollama (`/v1`) and most hosted gateways accept the same request
//! shape, so one client covers all configured providers.

use crate::error::AiError;
use crate::responder::{AiResponder, AiResult, AiTask, user_message};
use async_trait::async_trait;
use rootcause::Report;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, instrument};

/// Available LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    /// OpenAI API.
    #[default]
    OpenAi,
    /// Local Ollama instance via its OpenAI-compatible endpoint.
    Ollama,
    /// Any other OpenAI-compatible API.
    OpenAiCompatible,
}

/// Configuration for the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmBackendConfig {
    /// The provider type.
    #[serde(default)]
    pub provider: LlmProvider,
    /// Base URL up to and including the API version segment.
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// API key (if required).
    #[serde(default)]
    pub api_key: Option<String>,
    /// Sampling temperature.
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl LlmBackendConfig {
    /// Creates an OpenAI configuration.
    #[must_use]
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: LlmProvider::OpenAi,
            base_url: "https://api.openai.com/v1".to_string(),
            model: model.into(),
            api_key: Some(api_key.into()),
            temperature: None,
        }
    }

    /// Creates an Ollama configuration.
    #[must_use]
    pub fn ollama(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: LlmProvider::Ollama,
            base_url: base_url.into(),
            model: model.into(),
            api_key: None,
            temperature: None,
        }
    }

    /// Sets the temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum MessageRole {
    System,
    User,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: MessageRole,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

impl ChatResponse {
    fn first_content(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
    }
}

/// [`AiResponder`] over a chat completions endpoint.
#[derive(Debug, Clone)]
pub struct ChatCompletionsBackend {
    client: reqwest::Client,
    config: LlmBackendConfig,
}

impl ChatCompletionsBackend {
    /// Creates a backend sharing the given client.
    #[must_use]
    pub fn new(client: reqwest::Client, config: LlmBackendConfig) -> Self {
        Self { client, config }
    }

    /// Returns the configured model.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn build_request<'a>(
        &'a self,
        prompt: &str,
        context: &JsonValue,
        task: AiTask,
    ) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: MessageRole::System,
                    content: task.system_prompt().to_string(),
                },
                ChatMessage {
                    role: MessageRole::User,
                    content: user_message(prompt, context),
                },
            ],
            // Classification should be stable across runs.
            temperature: match task {
                AiTask::Sentiment => Some(0.0),
                AiTask::Generation => self.config.temperature,
            },
        }
    }
}

#[async_trait]
impl AiResponder for ChatCompletionsBackend {
    #[instrument(skip(self, prompt, context), fields(model = %self.config.model, task = ?task))]
    async fn generate(
        &self,
        prompt: &str,
        context: &JsonValue,
        task: AiTask,
    ) -> Result<AiResult, Report<AiError>> {
        let mut request = self
            .client
            .post(self.config.completions_url())
            .json(&self.build_request(prompt, context, task));
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| AiError::RequestFailed {
            reason: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Rejected {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let parsed: ChatResponse =
            response
                .json()
                .await
                .map_err(|e| AiError::ResponseParseFailed {
                    reason: e.to_string(),
                })?;
        let content = parsed.first_content().ok_or(AiError::EmptyResponse)?;
        debug!(chars = content.len(), "AI backend answered");

        Ok(AiResult {
            result: task.normalise(&content),
        })
    }
}
