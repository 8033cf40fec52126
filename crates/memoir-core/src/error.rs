//! Error types for the core engine.

use thiserror::Error;
use uuid::Uuid;

use crate::models::ConversationStatus;

#[derive(Error, Debug)]
pub enum CoreError {
    /// An operation was attempted in a conversation state that does not
    /// allow it.
    #[error("Invalid action '{action}' in state '{from}'")]
    InvalidState {
        from: ConversationStatus,
        action: String,
    },

    /// A completion or embedding capability failed after its retry
    /// budget was exhausted.
    #[error(transparent)]
    Provider(#[from] memoir_ai::ProviderError),

    /// A journal record and its index entry went out of sync. This is an
    /// invariant violation and must be surfaced, never repaired silently.
    #[error("Commit inconsistency: {0}")]
    CommitInconsistency(String),

    /// The retention sweep attempted to touch a conversation with an
    /// in-flight operation. No-op; retried on the next sweep.
    #[error("Retention sweep raced an in-flight operation on conversation {0}")]
    RetentionRace(Uuid),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
