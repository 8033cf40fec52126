//! Memoir AI - capability layer for the journaling engine
//!
//! This crate provides:
//! - Completion capability: [`LlmClient`] with a live OpenAI client and a
//!   deterministic mock client
//! - Embedding capability: [`EmbeddingProvider`] with live and mock
//!   implementations
//! - Retry/backoff policy shared by the live providers
//!
//! Live vs mock is decided once at construction time; business logic in
//! memoir-core only ever sees the traits.

pub mod embedding;
pub mod error;
pub mod llm;

pub use embedding::{EmbeddingConfig, EmbeddingProvider, MockEmbedding, OpenAIEmbedding};
pub use error::{ProviderError, Result};
pub use llm::{
    ChatMessage, CompletionRequest, CompletionResponse, LlmClient, MockLlmClient, MockStep,
    MockStepKind, OpenAIClient, RetryConfig, Role, TokenUsage,
};
