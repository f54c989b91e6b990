use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::error::Result;
use crate::openai::OpenAi;
use crate::traits::{ChatResponse, LlmProvider, Message};

pub const GROQ_API_URL: &str = "https://api.groq.com/openai/v1";

const DEFAULT_RATE_LIMIT_DELAY: Duration = Duration::from_secs(5);
const DEFAULT_MAX_RATE_LIMIT_RETRIES: u32 = 5;

// =============================================================================
// Groq Provider
// =============================================================================

/// Groq speaks the OpenAI wire format. On a 429 it waits `rate_limit_delay`
/// and reissues the identical request, up to `max_rate_limit_retries` times;
/// the last 429 is returned as [`crate::AiError::ProviderHttp`].
#[derive(Clone)]
pub struct Groq {
    inner: OpenAi,
    rate_limit_delay: Duration,
    max_rate_limit_retries: u32,
}

impl Groq {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            inner: OpenAi::new(api_key, model).with_base_url(GROQ_API_URL),
            rate_limit_delay: DEFAULT_RATE_LIMIT_DELAY,
            max_rate_limit_retries: DEFAULT_MAX_RATE_LIMIT_RETRIES,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.inner = self.inner.with_base_url(url);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.inner = self.inner.with_temperature(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.inner = self.inner.with_max_tokens(max_tokens);
        self
    }

    pub fn with_rate_limit_delay(mut self, delay: Duration) -> Self {
        self.rate_limit_delay = delay;
        self
    }

    pub fn with_max_rate_limit_retries(mut self, retries: u32) -> Self {
        self.max_rate_limit_retries = retries;
        self
    }
}

#[async_trait]
impl LlmProvider for Groq {
    fn name(&self) -> &str {
        "groq"
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn chat(&self, messages: &[Message]) -> Result<ChatResponse> {
        let client = self.inner.client();
        let request = self.inner.request(messages);

        let mut retries = 0;
        loop {
            match client.chat(&request).await {
                Err(e) if e.is_rate_limited() && retries < self.max_rate_limit_retries => {
                    retries += 1;
                    warn!(
                        model = self.model(),
                        attempt = retries,
                        delay_ms = self.rate_limit_delay.as_millis() as u64,
                        "Groq rate limited, waiting before retry"
                    );
                    tokio::time::sleep(self.rate_limit_delay).await;
                }
                other => return other,
            }
        }
    }
}
