//! Chat-completion client used for text chat, assessment and case generation.
//!
//! Every call is a single request/response with no retries and no streaming.
//! The credential is checked per call so the server can start without one;
//! callers see [`LlmError::MissingCredentials`] instead.

mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

pub use openai::{ChatSettings, OpenAIChatClient};

/// Errors from the chat-completion API.
#[derive(Debug, Error)]
pub enum LlmError {
    /// No API key configured
    #[error("{0}")]
    MissingCredentials(String),

    /// The request never produced a response
    #[error("Request failed: {0}")]
    Request(String),

    /// The API answered with a non-success status
    #[error("Chat completion API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The API answered but the payload was unusable
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

pub type LlmResult<T> = Result<T, LlmError>;

/// One chat-completion message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

impl From<&crate::core::case::ConversationMessage> for ChatMessage {
    fn from(message: &crate::core::case::ConversationMessage) -> Self {
        Self {
            role: message.role.as_str().to_string(),
            content: message.content.clone(),
        }
    }
}

/// A completion request. Unset limits fall back to the client's settings.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Ask for a JSON object response
    pub json_mode: bool,
}

/// Anything that can answer a chat-completion request.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Returns the text of the first choice.
    async fn complete(&self, request: ChatRequest) -> LlmResult<String>;

    /// Whether a credential is configured.
    fn is_configured(&self) -> bool;
}

pub type SharedChatCompletion = Arc<dyn ChatCompletion>;
