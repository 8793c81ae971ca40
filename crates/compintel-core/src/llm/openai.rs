use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{ChatMessage, CompletionClient, CompletionRequest, LlmSettings, ProviderKind, ResponseFormat};

/// Adapter for OpenAI-compatible `/v1/chat/completions` endpoints. Serves
/// both the OpenAI API and Groq's OpenAI-compatible surface.
#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    http: Client,
    url: String,
    api_key: String,
}

impl OpenAiCompatClient {
    pub fn new(kind: ProviderKind, settings: &LlmSettings) -> Result<Self> {
        if settings.api_key.trim().is_empty() {
            bail!(
                "API key must be provided via {} for provider `{}`",
                LlmSettings::API_KEY_VAR,
                settings.provider
            );
        }
        let default_base = match kind {
            ProviderKind::Groq => "https://api.groq.com/openai",
            _ => "https://api.openai.com",
        };
        let base = settings
            .endpoint
            .clone()
            .unwrap_or_else(|| default_base.to_string());
        let url = format!("{}/v1/chat/completions", base.trim_end_matches('/'));
        let mut builder = Client::builder().user_agent("compintel/0.3");
        if let Some(secs) = settings.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder
            .build()
            .context("failed to build chat-completions HTTP client")?;
        Ok(Self {
            http,
            url,
            api_key: settings.api_key.clone(),
        })
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompatClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let payload = WireRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: match request.response_format {
                ResponseFormat::Json => Some(WireResponseFormat {
                    kind: "json_object",
                }),
                ResponseFormat::Text => None,
            },
        };

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .context("failed to call chat completions API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("chat completions API error ({status}): {body}");
        }

        let chat: WireResponse = response
            .json()
            .await
            .context("failed to parse chat completions response")?;
        chat.choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("chat completions response missing message content"))
    }
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<WireResponseFormat>,
}

#[derive(Serialize)]
struct WireResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Deserialize)]
struct WireMessage {
    content: Option<String>,
}
