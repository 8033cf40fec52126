//! Deterministic mock LLM client for mock mode and tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration};

use crate::error::{ProviderError, Result};

use super::{CompletionRequest, CompletionResponse, LlmClient, Role, TokenUsage};

/// Canned replies used when no scripted step is queued. Selection is by
/// user-message count, so a given turn always gets the same reply.
const CANNED_REPLIES: &[&str] = &[
    "Thanks for sharing that. How did it leave you feeling?",
    "That sounds like a lot to carry. What stood out most to you about it?",
    "I hear you. Is there anything about today you'd want to remember?",
    "That makes sense. What would help you feel more at ease right now?",
];

/// Deterministic step for scripted mock completions.
#[derive(Debug, Clone)]
pub enum MockStepKind {
    /// Return a plain assistant message.
    Text(String),
    /// Fail as if the provider were unreachable.
    Unavailable,
    /// Fail as if the provider throttled the request.
    RateLimited,
}

/// Scripted completion step with optional delay.
#[derive(Debug, Clone)]
pub struct MockStep {
    pub delay_ms: u64,
    pub kind: MockStepKind,
}

impl MockStep {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            delay_ms: 0,
            kind: MockStepKind::Text(content.into()),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            delay_ms: 0,
            kind: MockStepKind::Unavailable,
        }
    }

    pub fn rate_limited() -> Self {
        Self {
            delay_ms: 0,
            kind: MockStepKind::RateLimited,
        }
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }
}

/// A deterministic mock LLM client driven by scripted steps, falling back
/// to a fixed canned reply set when the script runs out.
#[derive(Debug, Clone, Default)]
pub struct MockLlmClient {
    model: String,
    script: Arc<Mutex<VecDeque<MockStep>>>,
}

impl MockLlmClient {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            script: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    pub fn from_steps(model: impl Into<String>, steps: Vec<MockStep>) -> Self {
        Self {
            model: model.into(),
            script: Arc::new(Mutex::new(VecDeque::from(steps))),
        }
    }

    pub async fn push_step(&self, step: MockStep) {
        self.script.lock().await.push_back(step);
    }

    async fn next_step(&self) -> Option<MockStep> {
        self.script.lock().await.pop_front()
    }

    fn usage_for(content_len: usize) -> TokenUsage {
        let completion_tokens = content_len as u32;
        TokenUsage {
            prompt_tokens: 1,
            completion_tokens,
            total_tokens: 1 + completion_tokens,
        }
    }

    /// Pick a canned reply keyed off the number of user messages in the
    /// request, so repeating a request repeats the reply.
    pub fn canned_reply(request: &CompletionRequest) -> &'static str {
        let user_turns = request
            .messages
            .iter()
            .filter(|msg| msg.role == Role::User)
            .count();
        CANNED_REPLIES[user_turns % CANNED_REPLIES.len()]
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    fn provider(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let step = self.next_step().await;
        let Some(step) = step else {
            let text = Self::canned_reply(&request);
            return Ok(CompletionResponse {
                content: text.to_string(),
                usage: Some(Self::usage_for(text.len())),
            });
        };

        if step.delay_ms > 0 {
            sleep(Duration::from_millis(step.delay_ms)).await;
        }

        match step.kind {
            MockStepKind::Text(content) => Ok(CompletionResponse {
                usage: Some(Self::usage_for(content.len())),
                content,
            }),
            MockStepKind::Unavailable => {
                Err(ProviderError::Unavailable("mock provider down".to_string()))
            }
            MockStepKind::RateLimited => Err(ProviderError::RateLimited {
                retry_after_secs: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatMessage, CompletionRequest};

    #[tokio::test]
    async fn mock_client_returns_scripted_text() {
        let client = MockLlmClient::from_steps("mock-model", vec![MockStep::text("hello")]);

        let response = client
            .complete(CompletionRequest::new(vec![ChatMessage::user("ping")]))
            .await
            .expect("mock response should succeed");

        assert_eq!(response.content, "hello");
    }

    #[tokio::test]
    async fn mock_client_returns_scripted_error() {
        let client = MockLlmClient::from_steps("mock-model", vec![MockStep::unavailable()]);

        let err = client
            .complete(CompletionRequest::new(vec![ChatMessage::user("ping")]))
            .await
            .expect_err("scripted step should fail");

        assert!(matches!(err, ProviderError::Unavailable(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn mock_client_canned_fallback_is_deterministic() {
        let client = MockLlmClient::new("mock-model");
        let request = CompletionRequest::new(vec![
            ChatMessage::system("framing"),
            ChatMessage::user("first"),
        ]);

        let a = client.complete(request.clone()).await.unwrap();
        let b = client.complete(request).await.unwrap();
        assert_eq!(a.content, b.content);

        // A different turn count picks a different canned reply.
        let longer = CompletionRequest::new(vec![
            ChatMessage::user("first"),
            ChatMessage::assistant("reply"),
            ChatMessage::user("second"),
        ]);
        let c = client.complete(longer).await.unwrap();
        assert_ne!(a.content, c.content);
    }
}
