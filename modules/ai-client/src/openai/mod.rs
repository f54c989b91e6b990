mod client;
pub(crate) mod types;

use async_trait::async_trait;

pub(crate) use client::OpenAiClient;

use crate::error::Result;
use crate::traits::{ChatResponse, LlmProvider, Message};
use types::ChatRequest;

// =============================================================================
// OpenAi Provider
// =============================================================================

/// Plain OpenAI-compatible provider. Non-2xx responses fail immediately with
/// [`crate::AiError::ProviderHttp`]; there is no retry at this layer.
///
/// The HTTP client is built once and reused for every call.
#[derive(Clone)]
pub struct OpenAi {
    client: OpenAiClient,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAi {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: OpenAiClient::new(&api_key.into()),
            model: model.into(),
            temperature: 0.7,
            max_tokens: 4096,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.client = self.client.with_base_url(&url.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub(crate) fn client(&self) -> &OpenAiClient {
        &self.client
    }

    pub(crate) fn request(&self, messages: &[Message]) -> ChatRequest {
        ChatRequest::new(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
    }
}

#[async_trait]
impl LlmProvider for OpenAi {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn chat(&self, messages: &[Message]) -> Result<ChatResponse> {
        self.client.chat(&self.request(messages)).await
    }
}
