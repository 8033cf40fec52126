//! Memoir Storage - Low-level storage abstraction layer
//!
//! This crate provides the persistence layer for Memoir, using redb as the
//! embedded database. It exposes byte-level APIs to avoid circular
//! dependencies with the core crate's models; typed wrappers live in
//! memoir-core.
//!
//! # Tables
//!
//! - `conversations` - Transient conversation transcripts
//! - `journals` + indexes - Permanent journal records
//! - `journal_vectors` - Journal summary embeddings

pub mod conversation;
pub mod journal;
pub mod vector;

use anyhow::Result;
use redb::{Database, ReadableTable};
use std::sync::Arc;

pub use conversation::ConversationStorage;
pub use journal::JournalStorage;
pub use vector::{cosine_similarity, VectorConfig, VectorHit, VectorStorage};

/// Central storage manager that initializes all storage subsystems
pub struct Storage {
    db: Arc<Database>,
    pub conversations: ConversationStorage,
    pub journals: JournalStorage,
    pub vectors: VectorStorage,
}

impl Storage {
    /// Create a new storage instance at the given path.
    ///
    /// This will create the database file if it doesn't exist and
    /// initialize all required tables.
    pub fn new(path: &str, vector_config: VectorConfig) -> Result<Self> {
        let db = Arc::new(Database::create(path)?);
        Self::with_db(db, vector_config)
    }

    /// Create a storage instance over an already-open database.
    pub fn with_db(db: Arc<Database>, vector_config: VectorConfig) -> Result<Self> {
        let conversations = ConversationStorage::new(db.clone())?;
        let journals = JournalStorage::new(db.clone())?;
        let vectors = VectorStorage::new(db.clone(), vector_config)?;

        Ok(Self {
            db,
            conversations,
            journals,
            vectors,
        })
    }

    /// Get a reference to the underlying database
    pub fn get_db(&self) -> Arc<Database> {
        self.db.clone()
    }

    /// Atomically commit a journal record together with its embedding
    /// vector.
    ///
    /// The journal row, its secondary index entries, and the vector bytes
    /// are written in a single transaction: either all of them land or
    /// none do. A journal must never exist without an index entry and
    /// vice versa. Fails without writing anything if the conversation
    /// already has a journal.
    pub fn commit_journal(
        &self,
        journal_id: &str,
        user_id: &str,
        conversation_id: &str,
        journal_data: &[u8],
        embedding: &[f32],
    ) -> Result<()> {
        self.vectors.validate_dimension(embedding)?;

        let vector_key = vector::partition_key(user_id, journal_id);
        let vector_bytes =
            bincode::serde::encode_to_vec(embedding, bincode::config::standard())?;

        let write_txn = self.db.begin_write()?;
        {
            let mut conv_index = write_txn.open_table(journal::JOURNAL_CONVERSATION_INDEX)?;
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

            let mut journal_table = write_txn.open_table(journal::JOURNALS_TABLE)?;
            journal_table.insert(journal_id, journal_data)?;

            let mut user_index = write_txn.open_table(journal::JOURNAL_USER_INDEX)?;
            let user_key = format!("{}:{}", user_id, journal_id);
            user_index.insert(user_key.as_str(), journal_id)?;

            let mut vector_table = write_txn.open_table(vector::VECTOR_TABLE)?;
            vector_table.insert(vector_key.as_str(), vector_bytes.as_slice())?;
        }
        write_txn.commit()?;

        self.vectors.load_entry(user_id, journal_id, embedding.to_vec());
        tracing::debug!(journal_id, user_id, "Committed journal with embedding");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn create_test_storage(dim: usize) -> (Storage, tempfile::TempDir) {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Arc::new(Database::create(db_path).unwrap());
        let storage = Storage::with_db(db, VectorConfig { dimension: dim }).unwrap();
        (storage, temp_dir)
    }

    #[test]
    fn test_commit_journal_writes_both_sides() {
        let (storage, _tmp) = create_test_storage(4);

        storage
            .commit_journal("journal-1", "user-1", "conv-1", b"data", &[1.0, 0.0, 0.0, 0.0])
            .unwrap();

        assert!(storage.journals.exists("journal-1").unwrap());
        assert!(storage.vectors.has_vector("user-1", "journal-1"));
    }

    #[test]
    fn test_commit_journal_rejects_duplicate_conversation() {
        let (storage, _tmp) = create_test_storage(4);

        storage
            .commit_journal("journal-1", "user-1", "conv-1", b"first", &[1.0, 0.0, 0.0, 0.0])
            .unwrap();

        let result = storage.commit_journal(
            "journal-2",
            "user-1",
            "conv-1",
            b"second",
            &[0.0, 1.0, 0.0, 0.0],
        );
        assert!(result.is_err());

        // Neither side of the second commit landed.
        assert!(!storage.journals.exists("journal-2").unwrap());
        assert!(!storage.vectors.has_vector("user-1", "journal-2"));
    }

    #[test]
    fn test_commit_journal_rejects_bad_dimension() {
        let (storage, _tmp) = create_test_storage(4);

        let result =
            storage.commit_journal("journal-1", "user-1", "conv-1", b"data", &[1.0, 0.0]);
        assert!(result.is_err());
        assert!(!storage.journals.exists("journal-1").unwrap());
        assert!(!storage.vectors.has_vector("user-1", "journal-1"));
    }

    #[test]
    fn test_committed_vector_survives_reload() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");

        {
            let db = Arc::new(Database::create(&db_path).unwrap());
            let storage = Storage::with_db(db, VectorConfig { dimension: 4 }).unwrap();
            storage
                .commit_journal("journal-1", "user-1", "conv-1", b"data", &[1.0, 0.0, 0.0, 0.0])
                .unwrap();
        }

        let db = Arc::new(Database::create(&db_path).unwrap());
        let storage = Storage::with_db(db, VectorConfig { dimension: 4 }).unwrap();
        assert!(storage.journals.exists("journal-1").unwrap());
        assert!(storage.vectors.has_vector("user-1", "journal-1"));
    }
}
