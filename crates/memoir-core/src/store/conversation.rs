use std::sync::Arc;

use memoir_storage::Storage;
use uuid::Uuid;

use crate::error::Result;
use crate::models::Conversation;

/// Typed CRUD over the transient conversation records.
#[derive(Clone)]
pub struct ConversationStore {
    storage: Arc<Storage>,
}

impl ConversationStore {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// Insert or overwrite a conversation record.
    pub fn save(&self, conversation: &Conversation) -> Result<()> {
        let data = serde_json::to_vec(conversation)?;
        self.storage
            .conversations
            .put_raw(&conversation.id.to_string(), &data)?;
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Result<Option<Conversation>> {
        match self.storage.conversations.get_raw(&id.to_string())? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    pub fn list(&self) -> Result<Vec<Conversation>> {
        let mut conversations = Vec::new();
        for (_, data) in self.storage.conversations.list_raw()? {
            conversations.push(serde_json::from_slice(&data)?);
        }
        Ok(conversations)
    }

    pub fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self.storage.conversations.delete(&id.to_string())?)
    }

    pub fn exists(&self, id: Uuid) -> Result<bool> {
        Ok(self.storage.conversations.exists(&id.to_string())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConversationStatus, MessageRole};
    use memoir_storage::VectorConfig;
    use tempfile::tempdir;

    fn create_test_store() -> (ConversationStore, tempfile::TempDir) {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let storage = Arc::new(
            Storage::new(db_path.to_str().unwrap(), VectorConfig { dimension: 4 }).unwrap(),
        );
        (ConversationStore::new(storage), temp_dir)
    }

    #[test]
    fn test_save_and_get_round_trip() {
        let (store, _tmp) = create_test_store();

        let mut conversation = Conversation::new("user-1", chrono::Duration::days(14));
        conversation.push_message(MessageRole::User, "hello");
        store.save(&conversation).unwrap();

        let loaded = store.get(conversation.id).unwrap().unwrap();
        assert_eq!(loaded.id, conversation.id);
        assert_eq!(loaded.status, ConversationStatus::Created);
        assert_eq!(loaded.messages.len(), 1);
        assert_eq!(loaded.messages[0].text, "hello");
    }

    #[test]
    fn test_get_missing_returns_none() {
        let (store, _tmp) = create_test_store();
        assert!(store.get(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_list_and_delete() {
        let (store, _tmp) = create_test_store();

        let first = Conversation::new("user-1", chrono::Duration::days(14));
        let second = Conversation::new("user-2", chrono::Duration::days(14));
        store.save(&first).unwrap();
        store.save(&second).unwrap();

        assert_eq!(store.list().unwrap().len(), 2);

        assert!(store.delete(first.id).unwrap());
        assert!(!store.exists(first.id).unwrap());
        assert_eq!(store.list().unwrap().len(), 1);
    }
}
