use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{AiError, Result};
use crate::traits::{LlmProvider, Message, MessageRole};
use crate::util::{find_balanced, strip_code_fence, truncate_to_char_boundary};

const JSON_ONLY_INSTRUCTION: &str = "IMPORTANT: You MUST respond with valid JSON only. \
No markdown, no code blocks, no extra text. Just raw JSON.";

/// Ask `provider` for a JSON answer and deserialize it into `T`.
///
/// The JSON-only instruction (and `schema_hint`, when given) is appended to
/// the system message; a system message is inserted at the front when the
/// conversation has none. The reply is parsed with [`parse_structured`].
pub async fn structured_output<T, P>(
    provider: &P,
    messages: Vec<Message>,
    schema_hint: Option<&str>,
) -> Result<T>
where
    T: DeserializeOwned,
    P: LlmProvider + ?Sized,
{
    let messages = with_json_instruction(messages, schema_hint);
    let response = provider.chat(&messages).await?;

    debug!(
        provider = provider.name(),
        model = %response.model,
        prompt_tokens = response.usage.prompt_tokens,
        completion_tokens = response.usage.completion_tokens,
        "Structured output response received"
    );

    parse_structured(&response.content)
}

/// Coerce free text into `T`, trying in order: the whole (unfenced) text, the
/// first top-level `{...}` span, the first top-level `[...]` span.
pub fn parse_structured<T: DeserializeOwned>(content: &str) -> Result<T> {
    let direct = serde_json::from_str::<T>(strip_code_fence(content));
    let first_error = match direct {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    warn!(
        preview = truncate_to_char_boundary(content, 200),
        "Failed to parse LLM JSON response directly, attempting extraction"
    );

    for (open, close) in [('{', '}'), ('[', ']')] {
        if let Some(span) = find_balanced(content, open, close) {
            if let Ok(value) = serde_json::from_str::<T>(span) {
                return Ok(value);
            }
        }
    }

    Err(AiError::JsonExtraction(first_error.to_string()))
}

fn with_json_instruction(mut messages: Vec<Message>, schema_hint: Option<&str>) -> Vec<Message> {
    let mut suffix = format!("\n\n{JSON_ONLY_INSTRUCTION}");
    if let Some(schema) = schema_hint {
        suffix.push_str("\n\nExpected JSON schema:\n");
        suffix.push_str(schema);
    }

    match messages.iter_mut().find(|m| m.role == MessageRole::System) {
        Some(system) => system.content.push_str(&suffix),
        None => messages.insert(0, Message::system(suffix.trim_start())),
    }

    messages
}
