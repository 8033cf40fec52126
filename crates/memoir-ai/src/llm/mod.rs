//! LLM clients: trait, live OpenAI provider, deterministic mock.

mod client;
mod mock_client;
mod openai;
pub(crate) mod retry;

pub use client::{ChatMessage, CompletionRequest, CompletionResponse, LlmClient, Role, TokenUsage};
pub use mock_client::{MockLlmClient, MockStep, MockStepKind};
pub use openai::OpenAIClient;
pub use retry::RetryConfig;
