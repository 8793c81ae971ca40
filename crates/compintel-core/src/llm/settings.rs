use std::collections::HashMap;
use std::str::FromStr;

use anyhow::{Context, Result};
use thiserror::Error;

/// Providers the factory knows how to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Groq,
    Anthropic,
    Noop,
}

impl ProviderKind {
    /// Model used when the settings do not name one.
    pub fn default_model(self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o-mini",
            Self::Groq => "llama3-70b-8192",
            Self::Anthropic => "claude-3-haiku-20240307",
            Self::Noop => "noop",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown completion provider `{0}`")]
pub struct UnknownProviderError(pub String);

impl FromStr for ProviderKind {
    type Err = UnknownProviderError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "groq" => Ok(Self::Groq),
            "anthropic" => Ok(Self::Anthropic),
            "noop" => Ok(Self::Noop),
            other => Err(UnknownProviderError(other.to_string())),
        }
    }
}

/// Configuration required for the completion adapters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmSettings {
    pub provider: String,
    pub api_key: String,
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl LlmSettings {
    pub const PROVIDER_VAR: &'static str = "COMPINTEL_PROVIDER";
    pub const API_KEY_VAR: &'static str = "COMPINTEL_API_KEY";
    pub const ENDPOINT_VAR: &'static str = "COMPINTEL_ENDPOINT";
    pub const MODEL_VAR: &'static str = "COMPINTEL_MODEL";
    pub const TIMEOUT_VAR: &'static str = "COMPINTEL_TIMEOUT_SECS";

    /// Load settings from environment variables.
    ///
    /// * `COMPINTEL_PROVIDER` — provider identifier (default: `openai`).
    /// * `COMPINTEL_API_KEY`  — API key/token (required unless `noop`).
    /// * `COMPINTEL_ENDPOINT` — optional custom base URL.
    /// * `COMPINTEL_MODEL`    — optional model override.
    /// * `COMPINTEL_TIMEOUT_SECS` — optional request timeout.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars().collect())
    }

    /// Resolve settings from an explicit variable map. Callers layering a
    /// config file underneath the environment seed the map with file values
    /// first, then let real environment variables override them.
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self> {
        let provider = vars
            .get(Self::PROVIDER_VAR)
            .cloned()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "openai".to_string())
            .trim()
            .to_string();
        let api_key = match provider.to_lowercase().as_str() {
            "noop" => vars.get(Self::API_KEY_VAR).cloned().unwrap_or_default(),
            _ => vars
                .get(Self::API_KEY_VAR)
                .cloned()
                .filter(|v| !v.trim().is_empty())
                .with_context(|| {
                    format!(
                        "{} (or the [llm] api_key config entry) must be set for provider `{provider}`",
                        Self::API_KEY_VAR
                    )
                })?,
        };
        let endpoint = vars
            .get(Self::ENDPOINT_VAR)
            .cloned()
            .filter(|v| !v.trim().is_empty());
        let model = vars
            .get(Self::MODEL_VAR)
            .cloned()
            .filter(|v| !v.trim().is_empty());
        let timeout_secs = vars
            .get(Self::TIMEOUT_VAR)
            .and_then(|v| v.trim().parse::<u64>().ok());

        Ok(Self {
            provider,
            api_key,
            endpoint,
            model,
            timeout_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_to_openai_provider() {
        let settings =
            LlmSettings::from_vars(vars(&[(LlmSettings::API_KEY_VAR, "secret")])).unwrap();
        assert_eq!(settings.provider, "openai");
        assert_eq!(settings.api_key, "secret");
        assert!(settings.endpoint.is_none());
        assert!(settings.model.is_none());
        assert!(settings.timeout_secs.is_none());
    }

    #[test]
    fn errors_when_api_key_missing() {
        let err = LlmSettings::from_vars(vars(&[(LlmSettings::PROVIDER_VAR, "groq")]))
            .expect_err("missing API key should error");
        assert!(err.to_string().contains(LlmSettings::API_KEY_VAR));
    }

    #[test]
    fn noop_provider_allows_missing_key() {
        let settings =
            LlmSettings::from_vars(vars(&[(LlmSettings::PROVIDER_VAR, "noop")])).unwrap();
        assert_eq!(settings.provider, "noop");
        assert!(settings.api_key.is_empty());
    }

    #[test]
    fn parses_endpoint_model_and_timeout() {
        let settings = LlmSettings::from_vars(vars(&[
            (LlmSettings::PROVIDER_VAR, "groq"),
            (LlmSettings::API_KEY_VAR, "secret"),
            (LlmSettings::ENDPOINT_VAR, "https://example.com"),
            (LlmSettings::MODEL_VAR, "llama3-70b-8192"),
            (LlmSettings::TIMEOUT_VAR, "45"),
        ]))
        .unwrap();
        assert_eq!(settings.endpoint.as_deref(), Some("https://example.com"));
        assert_eq!(settings.model.as_deref(), Some("llama3-70b-8192"));
        assert_eq!(settings.timeout_secs, Some(45));
    }

    #[test]
    fn blank_values_are_treated_as_unset() {
        let settings = LlmSettings::from_vars(vars(&[
            (LlmSettings::PROVIDER_VAR, "noop"),
            (LlmSettings::ENDPOINT_VAR, "  "),
            (LlmSettings::MODEL_VAR, ""),
        ]))
        .unwrap();
        assert!(settings.endpoint.is_none());
        assert!(settings.model.is_none());
    }

    #[test]
    fn provider_kind_parses_known_names() {
        assert_eq!("openai".parse(), Ok(ProviderKind::OpenAi));
        assert_eq!(" Groq ".parse(), Ok(ProviderKind::Groq));
        assert_eq!("ANTHROPIC".parse(), Ok(ProviderKind::Anthropic));
        assert_eq!("noop".parse(), Ok(ProviderKind::Noop));
    }

    #[test]
    fn provider_kind_rejects_unknown_names() {
        let err = "mystery".parse::<ProviderKind>().unwrap_err();
        assert_eq!(err, UnknownProviderError("mystery".into()));
    }
}
