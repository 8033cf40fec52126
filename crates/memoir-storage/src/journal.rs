//! Journal storage - byte-level API for the permanent journal records.
//!
//! Journals never expire and are never auto-deleted. Secondary indexes
//! support the retrieval paths the core needs:
//!
//! # Tables
//!
//! - `journals`: journal_id -> journal_data
//! - `journal_user_index`: user_id:journal_id -> journal_id (for listing by user)
//! - `journal_conversation_index`: conversation_id -> journal_id
//!   (enforces at most one journal per conversation)

use anyhow::Result;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::sync::Arc;

pub(crate) const JOURNALS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("journals");
/// Index: user_id:journal_id -> journal_id
pub(crate) const JOURNAL_USER_INDEX: TableDefinition<&str, &str> =
    TableDefinition::new("journal_user_index");
/// Index: conversation_id -> journal_id
pub(crate) const JOURNAL_CONVERSATION_INDEX: TableDefinition<&str, &str> =
    TableDefinition::new("journal_conversation_index");

/// Low-level journal storage with byte-level API
#[derive(Debug, Clone)]
pub struct JournalStorage {
    db: Arc<Database>,
}

impl JournalStorage {
    pub fn new(db: Arc<Database>) -> Result<Self> {
        let write_txn = db.begin_write()?;
        write_txn.open_table(JOURNALS_TABLE)?;
        write_txn.open_table(JOURNAL_USER_INDEX)?;
        write_txn.open_table(JOURNAL_CONVERSATION_INDEX)?;
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Store a raw journal record with its index entries.
    ///
    /// Fails if the conversation already has a journal.
    pub fn put_raw(
        &self,
        journal_id: &str,
        user_id: &str,
        conversation_id: &str,
        data: &[u8],
    ) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut conv_index = write_txn.open_table(JOURNAL_CONVERSATION_INDEX)?;
            let existing = conv_index
                .get(conversation_id)?
                .map(|value| value.value().to_string());
            if let Some(existing_id) = existing {
                anyhow::bail!(
                    "conversation {} already has journal {}",
                    conversation_id,
                    existing_id
                );
            }
            conv_index.insert(conversation_id, journal_id)?;

            let mut journal_table = write_txn.open_table(JOURNALS_TABLE)?;
            journal_table.insert(journal_id, data)?;

            let mut user_index = write_txn.open_table(JOURNAL_USER_INDEX)?;
            let user_key = format!("{}:{}", user_id, journal_id);
            user_index.insert(user_key.as_str(), journal_id)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Get raw journal data by ID
    pub fn get_raw(&self, journal_id: &str) -> Result<Option<Vec<u8>>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(JOURNALS_TABLE)?;

        if let Some(data) = table.get(journal_id)? {
            Ok(Some(data.value().to_vec()))
        } else {
            Ok(None)
        }
    }

    /// Get the journal ID for a conversation, if one exists.
    pub fn journal_id_for_conversation(&self, conversation_id: &str) -> Result<Option<String>> {
        let read_txn = self.db.begin_read()?;
        let conv_index = read_txn.open_table(JOURNAL_CONVERSATION_INDEX)?;

        if let Some(value) = conv_index.get(conversation_id)? {
            Ok(Some(value.value().to_string()))
        } else {
            Ok(None)
        }
    }

    /// Get raw journal data for a conversation, if one exists.
    pub fn get_by_conversation_raw(&self, conversation_id: &str) -> Result<Option<Vec<u8>>> {
        match self.journal_id_for_conversation(conversation_id)? {
            Some(journal_id) => self.get_raw(&journal_id),
            None => Ok(None),
        }
    }

    /// List all journals for a user
    pub fn list_by_user_raw(&self, user_id: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let read_txn = self.db.begin_read()?;
        let user_index = read_txn.open_table(JOURNAL_USER_INDEX)?;
        let journal_table = read_txn.open_table(JOURNALS_TABLE)?;

        let prefix = format!("{}:", user_id);
        let mut journals = Vec::new();

        for item in user_index.iter()? {
            let (key, value) = item?;
            let key_str = key.value();

            if key_str.starts_with(&prefix) {
                let journal_id = value.value();
                if let Some(journal_data) = journal_table.get(journal_id)? {
                    journals.push((journal_id.to_string(), journal_data.value().to_vec()));
                }
            }
        }

        Ok(journals)
    }

    /// Count journals for a user
    pub fn count_by_user(&self, user_id: &str) -> Result<u32> {
        let read_txn = self.db.begin_read()?;
        let user_index = read_txn.open_table(JOURNAL_USER_INDEX)?;

        let prefix = format!("{}:", user_id);
        let mut count = 0u32;

        for item in user_index.iter()? {
            let (key, _) = item?;
            if key.value().starts_with(&prefix) {
                count += 1;
            }
        }

        Ok(count)
    }

    /// Check if a journal exists
    pub fn exists(&self, journal_id: &str) -> Result<bool> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(JOURNALS_TABLE)?;
        Ok(table.get(journal_id)?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn create_test_storage() -> JournalStorage {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Arc::new(Database::create(db_path).unwrap());
        JournalStorage::new(db).unwrap()
    }

    #[test]
    fn test_put_and_get_raw() {
        let storage = create_test_storage();

        let data = b"journal data";
        storage
            .put_raw("journal-001", "user-001", "conv-001", data)
            .unwrap();

        let retrieved = storage.get_raw("journal-001").unwrap();
        assert!(retrieved.is_some());
        assert_eq!(retrieved.unwrap(), data);
    }

    #[test]
    fn test_one_journal_per_conversation() {
        let storage = create_test_storage();

        storage
            .put_raw("journal-001", "user-001", "conv-001", b"first")
            .unwrap();

        let result = storage.put_raw("journal-002", "user-001", "conv-001", b"second");
        assert!(result.is_err());

        // First journal untouched
        assert_eq!(
            storage.get_raw("journal-001").unwrap().unwrap(),
            b"first"
        );
        assert!(storage.get_raw("journal-002").unwrap().is_none());
    }

    #[test]
    fn test_get_by_conversation() {
        let storage = create_test_storage();

        storage
            .put_raw("journal-001", "user-001", "conv-001", b"data")
            .unwrap();

        let by_conv = storage.get_by_conversation_raw("conv-001").unwrap();
        assert_eq!(by_conv.unwrap(), b"data");

        assert!(storage.get_by_conversation_raw("conv-other").unwrap().is_none());
    }

    #[test]
    fn test_list_by_user() {
        let storage = create_test_storage();

        storage
            .put_raw("journal-001", "user-001", "conv-001", b"data1")
            .unwrap();
        storage
            .put_raw("journal-002", "user-001", "conv-002", b"data2")
            .unwrap();
        storage
            .put_raw("journal-003", "user-002", "conv-003", b"data3")
            .unwrap();

        let user1 = storage.list_by_user_raw("user-001").unwrap();
        assert_eq!(user1.len(), 2);

        let user2 = storage.list_by_user_raw("user-002").unwrap();
        assert_eq!(user2.len(), 1);

        let user3 = storage.list_by_user_raw("user-003").unwrap();
        assert!(user3.is_empty());
    }

    #[test]
    fn test_count_by_user() {
        let storage = create_test_storage();

        storage
            .put_raw("journal-001", "user-001", "conv-001", b"data1")
            .unwrap();
        storage
            .put_raw("journal-002", "user-001", "conv-002", b"data2")
            .unwrap();

        assert_eq!(storage.count_by_user("user-001").unwrap(), 2);
        assert_eq!(storage.count_by_user("user-002").unwrap(), 0);
    }
}
