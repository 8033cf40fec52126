//! Memoir core - conversation lifecycle and journal generation engine
//!
//! The engine turns transient assistant conversations into permanent,
//! retrievable journal entries:
//!
//! - [`SessionManager`] drives the conversation state machine
//!   (`Created → Active → Finalizing → Completed`, or `Expired` /
//!   `Abandoned`) with one serialized turn at a time per conversation.
//! - [`ContextAssembler`] builds each assistant turn from retrieved
//!   prior journals plus the recent transcript window.
//! - [`JournalGenerator`] converts a finished transcript into a journal
//!   (summary, topics, emotion scores, embedding) and commits the record
//!   and its vector atomically.
//! - [`RetentionSweeper`] enforces the bounded lifetime of raw
//!   transcripts; journals are permanent.
//!
//! Capabilities (completion, embedding) come from `memoir-ai` as trait
//! objects; persistence comes from `memoir-storage`. [`Memoir`] wires
//! the pieces together.

pub mod config;
pub mod context;
pub mod error;
pub mod export;
pub mod generate;
pub mod models;
pub mod retention;
pub mod session;
pub mod store;

use std::sync::Arc;

use memoir_ai::{EmbeddingProvider, LlmClient};
use memoir_storage::Storage;

pub use config::MemoirConfig;
pub use context::ContextAssembler;
pub use error::{CoreError, Result};
pub use export::{JournalExporter, MarkdownExporter};
pub use generate::JournalGenerator;
pub use models::{
    Conversation, ConversationStatus, EmotionScore, Journal, Message, MessageRole,
};
pub use retention::{RetentionSweeper, SweepReport};
pub use session::SessionManager;
pub use store::{ConversationStore, EmotionAverage, JournalStore};

/// Fully wired engine instance.
pub struct Memoir {
    pub sessions: Arc<SessionManager>,
    pub conversations: ConversationStore,
    pub journals: JournalStore,
    pub sweeper: Arc<RetentionSweeper>,
    pub config: Arc<MemoirConfig>,
}

impl Memoir {
    /// Wire the engine over an open storage instance and a pair of
    /// capability providers. Which providers (live or mock) is decided
    /// here, once; nothing downstream branches on it.
    pub fn new(
        storage: Arc<Storage>,
        llm: Arc<dyn LlmClient>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: MemoirConfig,
    ) -> Result<Self> {
        config.validate()?;
        if embedder.dimension() != config.embedding_dimension {
            return Err(CoreError::Config(format!(
                "embedding provider dimension {} does not match configured {}",
                embedder.dimension(),
                config.embedding_dimension
            )));
        }
        let config = Arc::new(config);

        let conversations = ConversationStore::new(storage.clone());
        let journals = JournalStore::new(storage);
        let assembler = ContextAssembler::new(
            llm.clone(),
            embedder.clone(),
            journals.clone(),
            config.clone(),
        );
        let generator = JournalGenerator::new(llm, embedder, journals.clone(), config.clone());
        let sessions = Arc::new(SessionManager::new(
            conversations.clone(),
            assembler,
            generator,
            config.clone(),
        ));
        let sweeper = Arc::new(RetentionSweeper::new(
            sessions.clone(),
            conversations.clone(),
            journals.clone(),
            config.clone(),
        ));

        Ok(Self {
            sessions,
            conversations,
            journals,
            sweeper,
            config,
        })
    }
}
