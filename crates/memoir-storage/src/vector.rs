//! Vector storage for journal embeddings.
//!
//! Similarity metric is cosine. Search is an exact scan over a single
//! user's partition: per-user corpora are journal-sized, and an exact
//! scan gives a fully deterministic ranking. Vectors are persisted to
//! redb for durability; the in-memory partition maps are rebuilt on load.
//!
//! Partitioning by `user_id` is structural - a search can only ever see
//! vectors inserted under the same user.

use anyhow::Result;
use parking_lot::RwLock;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::collections::HashMap;
use std::sync::Arc;

/// key: user_id:journal_id -> bincode-encoded Vec<f32>
pub(crate) const VECTOR_TABLE: TableDefinition<&str, &[u8]> =
    TableDefinition::new("journal_vectors");

/// Configuration for vector storage.
#[derive(Debug, Clone)]
pub struct VectorConfig {
    /// Vector dimension (e.g., 1536 for OpenAI text-embedding-3-small)
    pub dimension: usize,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self { dimension: 1536 }
    }
}

/// A single similarity search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub journal_id: String,
    pub similarity: f32,
}

/// Per-user cosine vector index with redb persistence.
pub struct VectorStorage {
    db: Arc<Database>,
    config: VectorConfig,
    /// user_id -> (journal_id -> vector), rebuilt from the DB on load
    partitions: RwLock<HashMap<String, HashMap<String, Vec<f32>>>>,
}

impl VectorStorage {
    /// Create new vector storage, loading existing vectors from DB.
    pub fn new(db: Arc<Database>, config: VectorConfig) -> Result<Self> {
        let write_txn = db.begin_write()?;
        write_txn.open_table(VECTOR_TABLE)?;
        write_txn.commit()?;

        let storage = Self {
            db,
            config,
            partitions: RwLock::new(HashMap::new()),
        };

        storage.rebuild()?;
        Ok(storage)
    }

    /// Validate a vector against the configured dimension.
    pub fn validate_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.config.dimension {
            anyhow::bail!(
                "Vector dimension mismatch: expected {}, got {}",
                self.config.dimension,
                vector.len()
            );
        }
        Ok(())
    }

    /// Add a vector for a journal, persisting it to the database.
    pub fn insert(&self, user_id: &str, journal_id: &str, vector: &[f32]) -> Result<()> {
        self.validate_dimension(vector)?;

        let key = partition_key(user_id, journal_id);
        let bytes = bincode::serde::encode_to_vec(vector, bincode::config::standard())?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(VECTOR_TABLE)?;
            table.insert(key.as_str(), bytes.as_slice())?;
        }
        write_txn.commit()?;

        self.load_entry(user_id, journal_id, vector.to_vec());
        Ok(())
    }

    /// Register an already-persisted vector in the in-memory partition map.
    ///
    /// Used after a transaction that wrote the vector bytes externally
    /// (the atomic journal commit path).
    pub fn load_entry(&self, user_id: &str, journal_id: &str, vector: Vec<f32>) {
        let mut partitions = self.partitions.write();
        partitions
            .entry(user_id.to_string())
            .or_default()
            .insert(journal_id.to_string(), vector);
    }

    /// Delete a vector.
    pub fn delete(&self, user_id: &str, journal_id: &str) -> Result<bool> {
        let key = partition_key(user_id, journal_id);
        let write_txn = self.db.begin_write()?;
        let existed = {
            let mut table = write_txn.open_table(VECTOR_TABLE)?;
            let existed = table.remove(key.as_str())?.is_some();
            existed
        };
        write_txn.commit()?;

        let mut partitions = self.partitions.write();
        if let Some(partition) = partitions.get_mut(user_id) {
            partition.remove(journal_id);
        }

        Ok(existed)
    }

    /// Search the user's partition for the top-k most similar vectors.
    ///
    /// Results are ordered by cosine similarity descending; equal
    /// similarities are ordered by journal_id so identical queries always
    /// return identical rankings. Recency tie-breaking happens in the
    /// typed layer, which knows journal timestamps.
    pub fn search(&self, user_id: &str, query: &[f32], k: usize) -> Result<Vec<VectorHit>> {
        self.validate_dimension(query)?;

        let partitions = self.partitions.read();
        let Some(partition) = partitions.get(user_id) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<VectorHit> = partition
            .iter()
            .map(|(journal_id, vector)| VectorHit {
                journal_id: journal_id.clone(),
                similarity: cosine_similarity(query, vector),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.journal_id.cmp(&b.journal_id))
        });
        hits.truncate(k);
        Ok(hits)
    }

    /// Check if a journal has a vector.
    pub fn has_vector(&self, user_id: &str, journal_id: &str) -> bool {
        self.partitions
            .read()
            .get(user_id)
            .is_some_and(|partition| partition.contains_key(journal_id))
    }

    /// Get vector count for a user.
    pub fn count(&self, user_id: &str) -> usize {
        self.partitions
            .read()
            .get(user_id)
            .map_or(0, |partition| partition.len())
    }

    fn rebuild(&self) -> Result<()> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(VECTOR_TABLE)?;

        let mut partitions: HashMap<String, HashMap<String, Vec<f32>>> = HashMap::new();
        let mut loaded = 0usize;
        for item in table.iter()? {
            let (key, value) = item?;
            let Some((user_id, journal_id)) = key.value().split_once(':') else {
                continue;
            };
            let (vector, _): (Vec<f32>, usize) =
                bincode::serde::decode_from_slice(value.value(), bincode::config::standard())?;
            partitions
                .entry(user_id.to_string())
                .or_default()
                .insert(journal_id.to_string(), vector);
            loaded += 1;
        }
        drop(read_txn);

        *self.partitions.write() = partitions;
        tracing::info!("Rebuilt vector index with {} vectors", loaded);
        Ok(())
    }
}

pub(crate) fn partition_key(user_id: &str, journal_id: &str) -> String {
    format!("{}:{}", user_id, journal_id)
}

/// Cosine similarity between two equal-length vectors. Zero-norm inputs
/// yield 0.0 rather than NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
