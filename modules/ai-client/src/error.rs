use thiserror::Error;

pub type Result<T> = std::result::Result<T, AiError>;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider HTTP error ({status}): {body}")]
    ProviderHttp { status: u16, body: String },

    #[error("Empty response from {0}")]
    EmptyResponse(String),

    #[error("Failed to parse LLM response as JSON: {0}")]
    JsonExtraction(String),
}

impl AiError {
    /// Whether this error is an upstream 429.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, AiError::ProviderHttp { status: 429, .. })
    }
}

impl From<reqwest::Error> for AiError {
    fn from(e: reqwest::Error) -> Self {
        AiError::Network(e.to_string())
    }
}
