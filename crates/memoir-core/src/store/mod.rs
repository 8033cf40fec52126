//! Typed persistence wrappers over the byte-level storage crate.
//!
//! Records are serialized as JSON; the storage crate never sees domain
//! types. All multi-entity writes (journal + vector) go through the
//! storage crate's transactional commit.

mod conversation;
mod journal;

pub use conversation::ConversationStore;
pub use journal::{EmotionAverage, JournalStore};
