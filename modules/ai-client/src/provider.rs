use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::error::{AiError, Result};
use crate::groq::Groq;
use crate::openai::OpenAi;
use crate::traits::LlmProvider;

const ANTHROPIC_COMPAT_URL: &str = "https://api.anthropic.com/v1";

/// Which upstream chat service to talk to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProviderKind {
    #[default]
    Groq,
    OpenAi,
    Anthropic,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Groq => "groq",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Groq => "llama-3.3-70b-versatile",
            ProviderKind::OpenAi => "gpt-4o-mini",
            ProviderKind::Anthropic => "claude-3-haiku-20240307",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = AiError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "groq" => Ok(ProviderKind::Groq),
            "openai" => Ok(ProviderKind::OpenAi),
            "anthropic" => Ok(ProviderKind::Anthropic),
            other => Err(AiError::Config(format!("Unknown LLM provider: {other}"))),
        }
    }
}

/// Everything needed to build a provider. `model: None` selects the
/// provider's default model.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub api_key: String,
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub rate_limit_retries: u32,
    pub rate_limit_delay: Duration,
    pub base_url: Option<String>,
}

impl ProviderSettings {
    pub fn new(kind: ProviderKind, api_key: impl Into<String>) -> Self {
        Self {
            kind,
            api_key: api_key.into(),
            model: None,
            temperature: 0.7,
            max_tokens: 4096,
            rate_limit_retries: 5,
            rate_limit_delay: Duration::from_secs(5),
            base_url: None,
        }
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(self.kind.default_model())
    }
}

/// Build the configured provider. Fails only when the API key is empty.
pub fn create_provider(settings: &ProviderSettings) -> Result<Arc<dyn LlmProvider>> {
    if settings.api_key.trim().is_empty() {
        return Err(AiError::Config(format!(
            "No API key configured for LLM provider '{}'",
            settings.kind
        )));
    }

    let model = settings.model().to_string();
    info!(provider = %settings.kind, model = %model, "Creating LLM provider");

    let provider: Arc<dyn LlmProvider> = match settings.kind {
        ProviderKind::Groq => {
            let mut groq = Groq::new(&settings.api_key, model)
                .with_temperature(settings.temperature)
                .with_max_tokens(settings.max_tokens)
                .with_rate_limit_delay(settings.rate_limit_delay)
                .with_max_rate_limit_retries(settings.rate_limit_retries);
            if let Some(ref url) = settings.base_url {
                groq = groq.with_base_url(url);
            }
            Arc::new(groq)
        }
        ProviderKind::OpenAi | ProviderKind::Anthropic => {
            let default_url = match settings.kind {
                ProviderKind::Anthropic => Some(ANTHROPIC_COMPAT_URL),
                _ => None,
            };
            let mut openai = OpenAi::new(&settings.api_key, model)
                .with_temperature(settings.temperature)
                .with_max_tokens(settings.max_tokens);
            if let Some(url) = settings.base_url.as_deref().or(default_url) {
                openai = openai.with_base_url(url);
            }
            Arc::new(openai)
        }
    };

    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_provider_names() {
        assert_eq!("groq".parse::<ProviderKind>().unwrap(), ProviderKind::Groq);
        assert_eq!(" OpenAI ".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!(
            "anthropic".parse::<ProviderKind>().unwrap(),
            ProviderKind::Anthropic
        );
        assert!("mistral".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn missing_key_is_config_error() {
        let settings = ProviderSettings::new(ProviderKind::OpenAi, "  ");
        assert!(matches!(
            create_provider(&settings),
            Err(AiError::Config(_))
        ));
    }

    #[test]
    fn default_models_per_provider() {
        let groq = create_provider(&ProviderSettings::new(ProviderKind::Groq, "k")).unwrap();
        assert_eq!(groq.name(), "groq");
        assert_eq!(groq.model(), "llama-3.3-70b-versatile");

        let anthropic =
            create_provider(&ProviderSettings::new(ProviderKind::Anthropic, "k")).unwrap();
        assert_eq!(anthropic.name(), "openai");
        assert_eq!(anthropic.model(), "claude-3-haiku-20240307");
    }

    #[test]
    fn model_override_wins() {
        let mut settings = ProviderSettings::new(ProviderKind::OpenAi, "k");
        settings.model = Some("gpt-4o".into());
        let provider = create_provider(&settings).unwrap();
        assert_eq!(provider.model(), "gpt-4o");
    }
}
