//! Embedding providers and utilities.

mod mock;
mod openai;
mod provider;

pub use mock::MockEmbedding;
pub use openai::OpenAIEmbedding;
pub use provider::{EmbeddingConfig, EmbeddingProvider};
