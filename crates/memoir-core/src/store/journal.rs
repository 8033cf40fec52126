use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use memoir_storage::Storage;
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::models::Journal;

/// Mean classifier confidence for one emotion label across a user's
/// journals.
#[derive(Debug, Clone, PartialEq)]
pub struct EmotionAverage {
    pub label: String,
    pub mean_confidence: f32,
    pub samples: usize,
}

/// Typed access to the permanent journal records and their vectors.
#[derive(Clone)]
pub struct JournalStore {
    storage: Arc<Storage>,
}

impl JournalStore {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// Create a journal together with its embedding-index entry.
    ///
    /// Both writes happen in one storage transaction; afterwards the
    /// record and the vector are verified to exist together. A failed
    /// verification is a `CommitInconsistency` and is surfaced as such.
    pub fn create_with_vector(&self, journal: &Journal) -> Result<()> {
        let data = serde_json::to_vec(journal)?;
        let journal_id = journal.id.to_string();
        self.storage.commit_journal(
            &journal_id,
            &journal.user_id,
            &journal.conversation_id.to_string(),
            &data,
            &journal.embedding,
        )?;

        let stored = self.storage.journals.exists(&journal_id)?;
        let indexed = self.storage.vectors.has_vector(&journal.user_id, &journal_id);
        if !stored || !indexed {
            return Err(CoreError::CommitInconsistency(format!(
                "journal {} after commit: record={stored}, vector={indexed}",
                journal.id
            )));
        }
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Result<Option<Journal>> {
        self.get_by_key(&id.to_string())
    }

    fn get_by_key(&self, journal_id: &str) -> Result<Option<Journal>> {
        match self.storage.journals.get_raw(journal_id)? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    pub fn get_by_conversation(&self, conversation_id: Uuid) -> Result<Option<Journal>> {
        match self
            .storage
            .journals
            .get_by_conversation_raw(&conversation_id.to_string())?
        {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    pub fn exists_for_conversation(&self, conversation_id: Uuid) -> Result<bool> {
        Ok(self
            .storage
            .journals
            .journal_id_for_conversation(&conversation_id.to_string())?
            .is_some())
    }

    /// All journals for a user, most recent first.
    pub fn list_by_user(&self, user_id: &str) -> Result<Vec<Journal>> {
        let mut journals = Vec::new();
        for (_, data) in self.storage.journals.list_by_user_raw(user_id)? {
            journals.push(serde_json::from_slice::<Journal>(&data)?);
        }
        journals.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(journals)
    }

    /// Journals for a user tagged with the given topic, most recent first.
    pub fn filter_by_topic(&self, user_id: &str, topic: &str) -> Result<Vec<Journal>> {
        let mut journals = self.list_by_user(user_id)?;
        journals.retain(|journal| journal.has_topic(topic));
        Ok(journals)
    }

    /// Similarity search over a user's journals.
    ///
    /// Ranked by cosine similarity descending; ties broken by recency
    /// descending, then id, so identical queries return identical order.
    pub fn search(&self, user_id: &str, query: &[f32], k: usize) -> Result<Vec<(Journal, f32)>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let candidates = self.storage.vectors.count(user_id);
        if candidates == 0 {
            return Ok(Vec::new());
        }

        // Rank the whole partition so recency ties are broken over the
        // full candidate set, not within an id-ordered prefix.
        let hits = self.storage.vectors.search(user_id, query, candidates)?;
        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            let Some(journal) = self.get_by_key(&hit.journal_id)? else {
                return Err(CoreError::CommitInconsistency(format!(
                    "vector present for missing journal {}",
                    hit.journal_id
                )));
            };
            results.push((journal, hit.similarity));
        }

        results.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.0.created_at.cmp(&a.0.created_at))
                .then_with(|| a.0.id.cmp(&b.0.id))
        });
        results.truncate(k);
        Ok(results)
    }

    /// Per-label mean confidence across a user's journals, optionally
    /// restricted to journals created at or after `since`. Sorted by mean
    /// descending, label ascending on ties.
    pub fn emotion_averages(
        &self,
        user_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<EmotionAverage>> {
        let mut sums: HashMap<String, (f32, usize)> = HashMap::new();
        for journal in self.list_by_user(user_id)? {
            if let Some(since) = since {
                if journal.created_at < since {
                    continue;
                }
            }
            for emotion in &journal.emotions {
                let entry = sums.entry(emotion.label.clone()).or_insert((0.0, 0));
                entry.0 += emotion.confidence;
                entry.1 += 1;
            }
        }

        let mut averages: Vec<EmotionAverage> = sums
            .into_iter()
            .map(|(label, (sum, count))| EmotionAverage {
                label,
                mean_confidence: sum / count as f32,
                samples: count,
            })
            .collect();
        averages.sort_by(|a, b| {
            b.mean_confidence
                .partial_cmp(&a.mean_confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.label.cmp(&b.label))
        });
        Ok(averages)
    }
}
