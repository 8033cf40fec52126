//! Domain models: conversations, messages, journals.

mod conversation;
mod journal;

pub use conversation::{Conversation, ConversationStatus, Message, MessageRole};
pub use journal::{EmotionScore, Journal};
