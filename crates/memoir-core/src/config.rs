//! Process-wide immutable configuration.
//!
//! Constructed once at startup, validated, and passed explicitly into
//! each component. Components never read ambient global state.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

pub const MIN_RETENTION_DAYS: u32 = 7;
pub const MAX_RETENTION_DAYS: u32 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoirConfig {
    /// Lifetime of a raw transcript before the retention sweep removes it.
    pub retention_days: u32,
    /// How many recent messages enter the assistant's context window.
    pub recent_window: usize,
    /// How many prior journals retrieval contributes to each turn.
    pub top_k: usize,
    /// How many emotion scores a journal keeps.
    pub emotion_top_k: usize,
    /// How often a pending journal may postpone its retention deadline.
    pub max_grace_extensions: u32,
    /// Length of one grace extension, in hours.
    pub grace_hours: u32,
    /// Attempts per journal-generation step before giving up.
    pub generation_max_attempts: u32,
    /// Dimension of the embedding vectors; must match the provider.
    pub embedding_dimension: usize,
}

impl Default for MemoirConfig {
    fn default() -> Self {
        Self {
            retention_days: 14,
            recent_window: 8,
            top_k: 3,
            emotion_top_k: 5,
            max_grace_extensions: 3,
            grace_hours: 24,
            generation_max_attempts: 3,
            embedding_dimension: 1536,
        }
    }
}

impl MemoirConfig {
    pub fn validate(&self) -> Result<()> {
        if !(MIN_RETENTION_DAYS..=MAX_RETENTION_DAYS).contains(&self.retention_days) {
            return Err(CoreError::Config(format!(
                "retention_days must be between {} and {}, got {}",
                MIN_RETENTION_DAYS, MAX_RETENTION_DAYS, self.retention_days
            )));
        }
        if self.recent_window == 0 {
            return Err(CoreError::Config(
                "recent_window must be at least 1".to_string(),
            ));
        }
        if self.top_k == 0 {
            return Err(CoreError::Config("top_k must be at least 1".to_string()));
        }
        if self.emotion_top_k == 0 {
            return Err(CoreError::Config(
                "emotion_top_k must be at least 1".to_string(),
            ));
        }
        if self.grace_hours == 0 {
            return Err(CoreError::Config(
                "grace_hours must be at least 1".to_string(),
            ));
        }
        if self.generation_max_attempts == 0 {
            return Err(CoreError::Config(
                "generation_max_attempts must be at least 1".to_string(),
            ));
        }
        if self.embedding_dimension == 0 {
            return Err(CoreError::Config(
                "embedding_dimension must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn retention_window(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.retention_days))
    }

    pub fn grace_window(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.grace_hours))
    }
}
