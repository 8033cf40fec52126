//! Conversation and message models.
//!
//! A conversation is transient: it carries the raw transcript until a
//! journal is produced or the retention sweep removes it. All status
//! changes go through [`Conversation::transition`], which enforces the
//! forward-only state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// One transcript entry. Immutable once appended; ordered by `seq`
/// within its conversation (wall-clock ties are broken by `seq`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub role: MessageRole,
    pub text: String,
    pub seq: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Created,
    Active,
    /// `end()` has been called but the journal commit has not landed yet.
    Finalizing,
    Completed,
    Expired,
    Abandoned,
}

impl ConversationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Expired | Self::Abandoned)
    }

    /// Legal forward transitions. Terminal states have no exits.
    pub fn can_transition_to(self, next: ConversationStatus) -> bool {
        use ConversationStatus::*;
        matches!(
            (self, next),
            (Created, Active)
                | (Created, Finalizing)
                | (Created, Expired)
                | (Created, Abandoned)
                | (Active, Finalizing)
                | (Active, Expired)
                | (Active, Abandoned)
                | (Finalizing, Completed)
        )
    }
}

impl std::fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Active => "active",
            Self::Finalizing => "finalizing",
            Self::Completed => "completed",
            Self::Expired => "expired",
            Self::Abandoned => "abandoned",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub user_id: String,
    pub status: ConversationStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Fixed at creation: `started_at + retention_window`. Never mutated;
    /// grace extensions are tracked separately.
    pub retention_deadline: DateTime<Utc>,
    pub grace_extensions: u32,
    pub messages: Vec<Message>,
    next_seq: u64,
}

impl Conversation {
    pub fn new(user_id: impl Into<String>, retention_window: chrono::Duration) -> Self {
        let started_at = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            status: ConversationStatus::Created,
            started_at,
            ended_at: None,
            retention_deadline: started_at + retention_window,
            grace_extensions: 0,
            messages: Vec::new(),
            next_seq: 0,
        }
    }

    /// Append a message, assigning the next sequence number.
    pub fn push_message(&mut self, role: MessageRole, text: impl Into<String>) -> Message {
        let message = Message {
            id: Uuid::new_v4(),
            conversation_id: self.id,
            role,
            text: text.into(),
            seq: self.next_seq,
            created_at: Utc::now(),
        };
        self.next_seq += 1;
        self.messages.push(message.clone());
        message
    }

    /// The last N messages, oldest first.
    pub fn recent_messages(&self, window: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(window);
        &self.messages[start..]
    }

    /// Whether at least one user/assistant exchange happened.
    pub fn has_exchange(&self) -> bool {
        let has_user = self.messages.iter().any(|m| m.role == MessageRole::User);
        let has_assistant = self
            .messages
            .iter()
            .any(|m| m.role == MessageRole::Assistant);
        has_user && has_assistant
    }

    /// Retention deadline including any granted grace extensions.
    pub fn effective_deadline(&self, grace: chrono::Duration) -> DateTime<Utc> {
        self.retention_deadline + grace * self.grace_extensions as i32
    }

    /// Move to `next` if the state machine allows it.
    pub fn transition(&mut self, next: ConversationStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidState {
                from: self.status,
                action: format!("transition to {next}"),
            });
        }
        self.status = next;
        Ok(())
    }
}
