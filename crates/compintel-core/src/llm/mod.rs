mod anthropic;
mod openai;
mod settings;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

pub use anthropic::AnthropicClient;
pub use openai::OpenAiCompatClient;
pub use settings::{LlmSettings, ProviderKind, UnknownProviderError};

/// Message role accepted by the completion endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// One chat message within a completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Whether the endpoint should be constrained to emit a JSON object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Text,
    Json,
}

/// A single chat-completion invocation.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub response_format: ResponseFormat,
    pub max_tokens: Option<u32>,
}

/// Client abstraction for the chat-completion endpoint. Synchronous
/// (awaited), single-shot, fallible; no retry layer on top.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Issue one completion call and return the raw response text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// Placeholder used when no provider is configured. JSON requests get an
/// empty competitor list so a run still flows end to end.
#[derive(Debug, Default, Clone)]
pub struct NoopClient;

#[async_trait]
impl CompletionClient for NoopClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        Ok(match request.response_format {
            ResponseFormat::Json => r#"{"competitors": []}"#.to_string(),
            ResponseFormat::Text => {
                "Completion provider not configured; section text unavailable.".to_string()
            }
        })
    }
}

/// Build the concrete client selected by the settings.
pub fn client_from_settings(settings: &LlmSettings) -> Result<Box<dyn CompletionClient>> {
    match settings.provider.parse::<ProviderKind>()? {
        kind @ (ProviderKind::OpenAi | ProviderKind::Groq) => {
            Ok(Box::new(OpenAiCompatClient::new(kind, settings)?))
        }
        ProviderKind::Anthropic => Ok(Box::new(AnthropicClient::new(settings)?)),
        ProviderKind::Noop => Ok(Box::new(NoopClient)),
    }
}
