//! Retention sweep for transient conversation transcripts.
//!
//! Journals are permanent; raw transcripts are not. The sweep walks all
//! stored conversations and, past their effective deadline:
//! - journaled conversations lose their transcript,
//! - abandoned/expired/unconverted ones are deleted outright,
//! - `Finalizing` ones get a bounded grace extension instead,
//! - anything leased or mid-turn is skipped and retried next sweep.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::MemoirConfig;
use crate::error::Result;
use crate::models::ConversationStatus;
use crate::session::{SessionManager, SweepClaim};
use crate::store::{ConversationStore, JournalStore};

/// Counters for one sweep pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub examined: usize,
    /// Created/Active conversations forced to Expired and removed.
    pub expired: usize,
    /// Abandoned or already-Expired conversations removed.
    pub deleted: usize,
    /// Journaled conversations whose transcript was purged.
    pub purged_journaled: usize,
    /// Finalizing conversations granted another grace extension.
    pub grace_extended: usize,
    /// Conversations skipped because a lease or turn was in flight.
    pub skipped_busy: usize,
    /// Finalizing conversations past all grace extensions.
    pub overdue: usize,
    /// Completed conversations found without a journal.
    pub inconsistent: usize,
}

impl SweepReport {
    pub fn removed(&self) -> usize {
        self.expired + self.deleted + self.purged_journaled
    }
}

pub struct RetentionSweeper {
    sessions: Arc<SessionManager>,
    store: ConversationStore,
    journals: JournalStore,
    config: Arc<MemoirConfig>,
}

impl RetentionSweeper {
    pub fn new(
        sessions: Arc<SessionManager>,
        store: ConversationStore,
        journals: JournalStore,
        config: Arc<MemoirConfig>,
    ) -> Self {
        Self {
            sessions,
            store,
            journals,
            config,
        }
    }

    /// Run one sweep pass over all stored conversations.
    pub fn sweep(&self) -> Result<SweepReport> {
        let now = Utc::now();
        let grace = self.config.grace_window();
        let mut report = SweepReport::default();

        for mut conversation in self.store.list()? {
            report.examined += 1;
            if now <= conversation.effective_deadline(grace) {
                continue;
            }
            let id = conversation.id;

            // Holding the claim guard keeps a turn from starting while
            // this conversation is processed.
            let _guard = match self.sessions.try_claim_for_sweep(id) {
                SweepClaim::Busy => {
                    warn!(conversation_id = %id, "Sweep skipped conversation with in-flight operation");
                    report.skipped_busy += 1;
                    continue;
                }
                SweepClaim::Idle => None,
                SweepClaim::Guarded(guard) => Some(guard),
            };

            if self.journals.exists_for_conversation(id)? {
                self.store.delete(id)?;
                self.sessions.forget(id);
                report.purged_journaled += 1;
                debug!(conversation_id = %id, "Purged transcript of journaled conversation");
                continue;
            }

            match conversation.status {
                ConversationStatus::Abandoned | ConversationStatus::Expired => {
                    self.store.delete(id)?;
                    self.sessions.forget(id);
                    report.deleted += 1;
                    debug!(conversation_id = %id, status = %conversation.status, "Deleted conversation");
                }
                ConversationStatus::Created | ConversationStatus::Active => {
                    conversation.transition(ConversationStatus::Expired)?;
                    self.store.delete(id)?;
                    self.sessions.forget(id);
                    report.expired += 1;
                    info!(conversation_id = %id, "Expired conversation past retention deadline");
                }
                ConversationStatus::Finalizing => {
                    if conversation.grace_extensions < self.config.max_grace_extensions {
                        conversation.grace_extensions += 1;
                        self.store.save(&conversation)?;
                        report.grace_extended += 1;
                        info!(
                            conversation_id = %id,
                            extensions = conversation.grace_extensions,
                            "Extended grace window for pending journal"
                        );
                    } else {
                        // Never deleted, but loudly flagged every sweep.
                        error!(
                            conversation_id = %id,
                            extensions = conversation.grace_extensions,
                            "Journal generation overdue past all grace extensions"
                        );
                        report.overdue += 1;
                    }
                }
                ConversationStatus::Completed => {
                    error!(
                        conversation_id = %id,
                        "Completed conversation has no journal"
                    );
                    report.inconsistent += 1;
                }
            }
        }

        info!(
            examined = report.examined,
            removed = report.removed(),
            grace_extended = report.grace_extended,
            skipped_busy = report.skipped_busy,
            "Retention sweep finished"
        );
        Ok(report)
    }

    /// Spawn the periodic sweep task.
    pub fn spawn_periodic(self: &Arc<Self>, period: Duration) -> tokio::task::JoinHandle<()> {
        let sweeper = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(err) = sweeper.sweep() {
                    error!(error = %err, "Retention sweep failed");
                }
            }
        })
    }
}
