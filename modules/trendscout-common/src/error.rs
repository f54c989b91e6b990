use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrendScoutError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Analysis already in progress")]
    RunInProgress,

    #[error(transparent)]
    Ai(#[from] ai_client::AiError),
}
