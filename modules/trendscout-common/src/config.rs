use std::env;
use std::str::FromStr;
use std::time::Duration;

use ai_client::{ProviderKind, ProviderSettings};
use tracing::{info, warn};

/// Application configuration loaded from environment variables.
/// Nothing is required: every value has a default, and a missing LLM key
/// only fails later when the provider is built.
#[derive(Debug, Clone)]
pub struct Config {
    // LLM
    pub llm_provider: ProviderKind,
    pub groq_api_key: String,
    pub openai_api_key: String,
    pub anthropic_api_key: String,
    pub llm_model: Option<String>,
    pub llm_temperature: f32,
    pub llm_max_tokens: u32,
    pub llm_rate_limit_retries: u32,

    // Collectors
    pub helius_api_key: Option<String>,
    pub github_token: Option<String>,
    pub lunarcrush_api_key: Option<String>,

    // Agents
    pub idea_call_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm_provider: ProviderKind::Groq,
            groq_api_key: String::new(),
            openai_api_key: String::new(),
            anthropic_api_key: String::new(),
            llm_model: None,
            llm_temperature: 0.7,
            llm_max_tokens: 4096,
            llm_rate_limit_retries: 5,
            helius_api_key: None,
            github_token: None,
            lunarcrush_api_key: None,
            idea_call_delay: Duration::from_millis(2000),
        }
    }
}

impl Config {
    /// Load `.env` (if present) and then read the process environment.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup. Empty values count
    /// as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let llm_provider = match var("LLM_PROVIDER") {
            Some(name) => name.parse().unwrap_or_else(|_| {
                warn!(value = %name, "Unknown LLM_PROVIDER, falling back to groq");
                ProviderKind::Groq
            }),
            None => defaults.llm_provider,
        };

        Self {
            llm_provider,
            groq_api_key: var("GROQ_API_KEY").unwrap_or_default(),
            openai_api_key: var("OPENAI_API_KEY").unwrap_or_default(),
            anthropic_api_key: var("ANTHROPIC_API_KEY").unwrap_or_default(),
            llm_model: var("LLM_MODEL"),
            llm_temperature: parse_or("LLM_TEMPERATURE", var("LLM_TEMPERATURE"), defaults.llm_temperature),
            llm_max_tokens: parse_or("LLM_MAX_TOKENS", var("LLM_MAX_TOKENS"), defaults.llm_max_tokens),
            llm_rate_limit_retries: parse_or(
                "LLM_RATE_LIMIT_RETRIES",
                var("LLM_RATE_LIMIT_RETRIES"),
                defaults.llm_rate_limit_retries,
            ),
            helius_api_key: var("HELIUS_API_KEY"),
            github_token: var("GITHUB_TOKEN"),
            lunarcrush_api_key: var("LUNARCRUSH_API_KEY"),
            idea_call_delay: Duration::from_millis(parse_or(
                "IDEA_CALL_DELAY_MS",
                var("IDEA_CALL_DELAY_MS"),
                defaults.idea_call_delay.as_millis() as u64,
            )),
        }
    }

    /// API key for the selected provider (empty when unset).
    pub fn llm_api_key(&self) -> &str {
        match self.llm_provider {
            ProviderKind::Groq => &self.groq_api_key,
            ProviderKind::OpenAi => &self.openai_api_key,
            ProviderKind::Anthropic => &self.anthropic_api_key,
        }
    }

    pub fn provider_settings(&self) -> ProviderSettings {
        let mut settings = ProviderSettings::new(self.llm_provider, self.llm_api_key());
        settings.model = self.llm_model.clone();
        settings.temperature = self.llm_temperature;
        settings.max_tokens = self.llm_max_tokens;
        settings.rate_limit_retries = self.llm_rate_limit_retries;
        settings
    }

    /// Log the effective configuration with secrets masked.
    pub fn log_redacted(&self) {
        fn preview(val: &str) -> String {
            if val.is_empty() {
                return "<not set>".to_string();
            }
            let n = val.char_indices().nth(4).map(|(i, _)| i).unwrap_or(val.len());
            format!("{}...({} chars)", &val[..n], val.len())
        }
        fn preview_opt(val: &Option<String>) -> String {
            val.as_deref().map(preview).unwrap_or_else(|| "<not set>".to_string())
        }

        info!("Config loaded:");
        info!("  LLM_PROVIDER: {}", self.llm_provider);
        info!("  LLM_MODEL: {}", self.llm_model.as_deref().unwrap_or(self.llm_provider.default_model()));
        info!("  LLM_API_KEY: {}", preview(self.llm_api_key()));
        info!("  HELIUS_API_KEY: {}", preview_opt(&self.helius_api_key));
        info!("  GITHUB_TOKEN: {}", preview_opt(&self.github_token));
        info!("  LUNARCRUSH_API_KEY: {}", preview_opt(&self.lunarcrush_api_key));
        info!("  IDEA_CALL_DELAY_MS: {}", self.idea_call_delay.as_millis());
    }
}

fn parse_or<T: FromStr + Copy + std::fmt::Display>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        Some(value) => value.parse().unwrap_or_else(|_| {
            warn!(key, value = %value, default = %default, "Unparseable config value, using default");
            default
        }),
        None => default,
    }
}
