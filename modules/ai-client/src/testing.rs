//! Test doubles for code that talks to an [`LlmProvider`].

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{AiError, Result};
use crate::traits::{ChatResponse, LlmProvider, Message, Usage};

/// Provider that replays scripted replies in order and records every
/// conversation it was sent.
#[derive(Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String>>>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply with the given content.
    pub fn respond(self, content: &str) -> Self {
        self.push(Ok(content.to_string()));
        self
    }

    /// Queue an HTTP failure.
    pub fn fail_http(self, status: u16, body: &str) -> Self {
        self.push(Err(AiError::ProviderHttp {
            status,
            body: body.to_string(),
        }));
        self
    }

    /// Every message list passed to `chat`, in call order.
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn push(&self, reply: Result<String>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    async fn chat(&self, messages: &[Message]) -> Result<ChatResponse> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(messages.to_vec());
        }

        let next = self
            .replies
            .lock()
            .ok()
            .and_then(|mut replies| replies.pop_front());

        match next {
            Some(Ok(content)) => Ok(ChatResponse {
                content,
                model: self.model().to_string(),
                usage: Usage::default(),
            }),
            Some(Err(e)) => Err(e),
            None => Err(AiError::EmptyResponse(
                "ScriptedProvider has no replies left".into(),
            )),
        }
    }
}
