//! Conversation session manager.
//!
//! One turn lock per conversation serializes `submit_message`, `end`,
//! and `cancel`; different conversations proceed independently. Every
//! status change goes through the state machine's compare-and-set under
//! that lock, so at most one terminal transition ever fires. During
//! journal generation the conversation id sits in a lease set that the
//! retention sweep respects.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::MemoirConfig;
use crate::context::ContextAssembler;
use crate::error::{CoreError, Result};
use crate::generate::JournalGenerator;
use crate::models::{Conversation, ConversationStatus, Journal, Message, MessageRole};
use crate::store::ConversationStore;

/// Outcome of the retention sweep asking for exclusive access.
pub(crate) enum SweepClaim {
    /// No active session; the sweep may proceed.
    Idle,
    /// Turn lock acquired; held for the duration of the sweep step.
    Guarded(OwnedMutexGuard<()>),
    /// Leased or mid-turn; the sweep must skip this conversation.
    Busy,
}

pub struct SessionManager {
    store: ConversationStore,
    assembler: ContextAssembler,
    generator: JournalGenerator,
    config: Arc<MemoirConfig>,
    turn_locks: DashMap<Uuid, Arc<Mutex<()>>>,
    leases: DashMap<Uuid, ()>,
}

impl SessionManager {
    pub fn new(
        store: ConversationStore,
        assembler: ContextAssembler,
        generator: JournalGenerator,
        config: Arc<MemoirConfig>,
    ) -> Self {
        Self {
            store,
            assembler,
            generator,
            config,
            turn_locks: DashMap::new(),
            leases: DashMap::new(),
        }
    }

    /// Open a new conversation for a user.
    pub async fn open(&self, user_id: &str) -> Result<Conversation> {
        let conversation = Conversation::new(user_id, self.config.retention_window());
        self.store.save(&conversation)?;
        info!(
            conversation_id = %conversation.id,
            user_id,
            retention_deadline = %conversation.retention_deadline,
            "Opened conversation"
        );
        Ok(conversation)
    }

    /// Open a conversation and produce the assistant's opening greeting.
    pub async fn open_with_greeting(&self, user_id: &str) -> Result<(Conversation, Message)> {
        let opened = self.open(user_id).await?;
        let lock = self.turn_lock(opened.id);
        let _turn = lock.lock().await;

        let mut conversation = self.load(opened.id)?;
        let greeting = self.assembler.opening_message(user_id).await?;
        let message = conversation.push_message(MessageRole::Assistant, greeting);
        self.store.save(&conversation)?;
        Ok((conversation, message))
    }

    /// Submit a user message and return the assistant's reply message.
    ///
    /// Valid in `Created` (first message activates the conversation) and
    /// `Active`. The turn lock serializes concurrent submissions.
    pub async fn submit_message(&self, conversation_id: Uuid, text: &str) -> Result<Message> {
        let lock = self.turn_lock(conversation_id);
        let _turn = lock.lock().await;

        let mut conversation = self.load(conversation_id)?;
        match conversation.status {
            ConversationStatus::Created => {
                conversation.transition(ConversationStatus::Active)?;
            }
            ConversationStatus::Active => {}
            other => {
                return Err(CoreError::InvalidState {
                    from: other,
                    action: "submit_message".to_string(),
                });
            }
        }

        conversation.push_message(MessageRole::User, text);
        let reply = self.assembler.assistant_reply(&conversation).await?;
        let message = conversation.push_message(MessageRole::Assistant, reply);
        self.store.save(&conversation)?;
        Ok(message)
    }

    /// End the conversation and produce its journal.
    ///
    /// Does not report success until the journal commit has landed. On a
    /// recoverable generation failure the conversation stays in
    /// `Finalizing` for a later [`retry_pending`](Self::retry_pending).
    pub async fn end(&self, conversation_id: Uuid) -> Result<Journal> {
        let lock = self.turn_lock(conversation_id);
        let _turn = lock.lock().await;

        let mut conversation = self.load(conversation_id)?;
        match conversation.status {
            ConversationStatus::Active => {}
            ConversationStatus::Created if conversation.has_exchange() => {}
            other => {
                return Err(CoreError::InvalidState {
                    from: other,
                    action: "end".to_string(),
                });
            }
        }
        conversation.transition(ConversationStatus::Finalizing)?;
        conversation.ended_at = Some(Utc::now());
        self.store.save(&conversation)?;

        self.finalize(conversation).await
    }

    /// Reattempt journal generation for a conversation stuck in
    /// `Finalizing` after an earlier failure.
    pub async fn retry_pending(&self, conversation_id: Uuid) -> Result<Journal> {
        let lock = self.turn_lock(conversation_id);
        let _turn = lock.lock().await;

        let conversation = self.load(conversation_id)?;
        if conversation.status != ConversationStatus::Finalizing {
            return Err(CoreError::InvalidState {
                from: conversation.status,
                action: "retry_pending".to_string(),
            });
        }
        self.finalize(conversation).await
    }

    /// Abandon the conversation without producing a journal.
    ///
    /// Waits for any in-flight turn, so an assistant message already
    /// produced is appended before the conversation goes terminal.
    pub async fn cancel(&self, conversation_id: Uuid) -> Result<()> {
        let lock = self.turn_lock(conversation_id);
        let _turn = lock.lock().await;

        let mut conversation = self.load(conversation_id)?;
        conversation.transition(ConversationStatus::Abandoned)?;
        conversation.ended_at = Some(Utc::now());
        self.store.save(&conversation)?;
        self.turn_locks.remove(&conversation_id);
        info!(conversation_id = %conversation_id, "Conversation abandoned");
        Ok(())
    }

    pub fn get(&self, conversation_id: Uuid) -> Result<Option<Conversation>> {
        self.store.get(conversation_id)
    }

    /// Runs generation under the retention lease; caller holds the turn
    /// lock and has already moved the conversation to `Finalizing`.
    async fn finalize(&self, mut conversation: Conversation) -> Result<Journal> {
        let conversation_id = conversation.id;
        self.leases.insert(conversation_id, ());
        let result = self.generator.generate(&conversation).await;
        self.leases.remove(&conversation_id);

        match result {
            Ok(journal) => {
                conversation.transition(ConversationStatus::Completed)?;
                self.store.save(&conversation)?;
                self.turn_locks.remove(&conversation_id);
                info!(
                    conversation_id = %conversation_id,
                    journal_id = %journal.id,
                    "Conversation completed"
                );
                Ok(journal)
            }
            Err(err) => {
                warn!(
                    conversation_id = %conversation_id,
                    error = %err,
                    "Journal generation failed, conversation queued for reattempt"
                );
                Err(err)
            }
        }
    }

    fn load(&self, conversation_id: Uuid) -> Result<Conversation> {
        self.store
            .get(conversation_id)?
            .ok_or_else(|| CoreError::NotFound(format!("conversation {conversation_id}")))
    }

    fn turn_lock(&self, conversation_id: Uuid) -> Arc<Mutex<()>> {
        self.turn_locks
            .entry(conversation_id)
            .or_default()
            .clone()
    }

    /// Ask for exclusive access on behalf of the retention sweep.
    pub(crate) fn try_claim_for_sweep(&self, conversation_id: Uuid) -> SweepClaim {
        if self.leases.contains_key(&conversation_id) {
            return SweepClaim::Busy;
        }
        match self.turn_locks.get(&conversation_id) {
            None => SweepClaim::Idle,
            Some(lock) => match lock.value().clone().try_lock_owned() {
                Ok(guard) => SweepClaim::Guarded(guard),
                Err(_) => SweepClaim::Busy,
            },
        }
    }

    /// Drop the in-memory handle for a conversation the sweep removed.
    pub(crate) fn forget(&self, conversation_id: Uuid) {
        self.turn_locks.remove(&conversation_id);
    }

    #[cfg(test)]
    pub(crate) fn hold_lease(&self, conversation_id: Uuid) {
        self.leases.insert(conversation_id, ());
    }

    #[cfg(test)]
    pub(crate) fn release_lease(&self, conversation_id: Uuid) {
        self.leases.remove(&conversation_id);
    }
}
