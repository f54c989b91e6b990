//! Provider-agnostic LLM chat client.
//!
//! Providers implement [`LlmProvider`] (one chat round-trip). Typed answers go
//! through [`structured_output`], which adds the JSON-only instruction and
//! recovers JSON from fenced or chatty replies.

pub mod error;
pub mod groq;
pub mod openai;
pub mod provider;
pub mod schema;
pub mod structured;
pub mod traits;
pub mod util;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use error::{AiError, Result};
pub use groq::Groq;
pub use openai::OpenAi;
pub use provider::{create_provider, ProviderKind, ProviderSettings};
pub use schema::schema_hint;
pub use structured::{parse_structured, structured_output};
pub use traits::{ChatResponse, LlmProvider, Message, MessageRole, Usage};
