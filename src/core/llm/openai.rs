use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use zeroize::Zeroize;

use super::{ChatCompletion, ChatMessage, ChatRequest, LlmError, LlmResult};
use crate::config::ServerConfig;

const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const USER_AGENT: &str = concat!("osce-gateway/", env!("CARGO_PKG_VERSION"));

/// Settings for [`OpenAIChatClient`].
#[derive(Clone)]
pub struct ChatSettings {
    pub api_key: Option<String>,
    /// Base URL without the `/chat/completions` suffix
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl ChatSettings {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            api_key: config.get_api_key("openai").ok(),
            base_url: config.openai_base_url.clone(),
            model: config.chat_model.clone(),
            max_tokens: config.chat_max_tokens,
            temperature: config.chat_temperature,
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

impl std::fmt::Debug for ChatSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl Drop for ChatSettings {
    fn drop(&mut self) {
        if let Some(key) = self.api_key.as_mut() {
            key.zeroize();
        }
    }
}

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAIChatClient {
    settings: ChatSettings,
    http_client: Client,
}

impl OpenAIChatClient {
    pub fn new(settings: ChatSettings) -> LlmResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| LlmError::Request(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            settings,
            http_client,
        })
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }
}

#[async_trait]
impl ChatCompletion for OpenAIChatClient {
    async fn complete(&self, request: ChatRequest) -> LlmResult<String> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                LlmError::MissingCredentials(
                    "OpenAI API key not configured in server environment".to_string(),
                )
            })?;

        let body = CompletionBody {
            model: &self.settings.model,
            messages: &request.messages,
            max_tokens: request.max_tokens.unwrap_or(self.settings.max_tokens),
            temperature: request.temperature.unwrap_or(self.settings.temperature),
            response_format: request.json_mode.then_some(ResponseFormat {
                format_type: "json_object",
            }),
        };

        debug!(
            model = %self.settings.model,
            messages = request.messages.len(),
            json_mode = request.json_mode,
            "Sending chat completion request"
        );

        let response = self
            .http_client
            .post(self.settings.completions_url())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| LlmError::Request(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&response_text)
                .map(|r| r.error.message)
                .unwrap_or(response_text);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: CompletionResponse = serde_json::from_str(&response_text)
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("Response contained no message".to_string()))
    }

    fn is_configured(&self) -> bool {
        self.settings
            .api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }
}
