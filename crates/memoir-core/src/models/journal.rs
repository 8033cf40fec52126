//! Journal model: the permanent artifact produced from a completed
//! conversation. Immutable after creation; validated at construction so
//! no half-formed record crosses a layer boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, Result};

/// One emotion detected in a conversation. Confidence is an opaque
/// classifier output clamped to [0, 1]; scores need not sum to 1.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmotionScore {
    pub label: String,
    pub confidence: f32,
}

impl EmotionScore {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            label: label.into(),
            confidence,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Journal {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub user_id: String,
    pub title: String,
    pub summary: String,
    /// Lowercased and deduplicated, first occurrence wins.
    pub topics: Vec<String>,
    /// Sorted by confidence descending.
    pub emotions: Vec<EmotionScore>,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

impl Journal {
    pub fn new(
        conversation_id: Uuid,
        user_id: impl Into<String>,
        title: impl Into<String>,
        summary: impl Into<String>,
        topics: Vec<String>,
        emotions: Vec<EmotionScore>,
        embedding: Vec<f32>,
    ) -> Result<Self> {
        let title = title.into();
        let summary = summary.into();
        if title.trim().is_empty() {
            return Err(CoreError::Validation("journal title is empty".to_string()));
        }
        if summary.trim().is_empty() {
            return Err(CoreError::Validation(
                "journal summary is empty".to_string(),
            ));
        }
        if embedding.is_empty() {
            return Err(CoreError::Validation(
                "journal embedding is empty".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        let topics: Vec<String> = topics
            .into_iter()
            .map(|topic| topic.trim().to_lowercase())
            .filter(|topic| !topic.is_empty() && seen.insert(topic.clone()))
            .collect();

        let mut emotions = emotions;
        emotions.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.label.cmp(&b.label))
        });

        Ok(Self {
            id: Uuid::new_v4(),
            conversation_id,
            user_id: user_id.into(),
            title,
            summary,
            topics,
            emotions,
            embedding,
            created_at: Utc::now(),
        })
    }

    pub fn has_topic(&self, topic: &str) -> bool {
        let needle = topic.trim().to_lowercase();
        self.topics.iter().any(|t| *t == needle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn journal_with(topics: Vec<String>, emotions: Vec<EmotionScore>) -> Journal {
        Journal::new(
            Uuid::new_v4(),
            "user-1",
            "A quiet day",
            "I spent the day reading.",
            topics,
            emotions,
            vec![0.1, 0.2],
        )
        .unwrap()
    }

    #[test]
    fn test_topics_deduplicated_case_insensitively() {
        let journal = journal_with(
            vec![
                "Work".to_string(),
                "work".to_string(),
                " WORK ".to_string(),
                "family".to_string(),
                "".to_string(),
            ],
            vec![],
        );
        assert_eq!(journal.topics, vec!["work", "family"]);
    }

    #[test]
    fn test_emotions_sorted_by_confidence_descending() {
        let journal = journal_with(
            vec![],
            vec![
                EmotionScore::new("calm", 0.3),
                EmotionScore::new("joyful", 0.9),
                EmotionScore::new("anxious", 0.5),
            ],
        );
        let labels: Vec<_> = journal.emotions.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["joyful", "anxious", "calm"]);
    }

    #[test]
    fn test_confidence_clamped() {
        assert_eq!(EmotionScore::new("joy", 1.7).confidence, 1.0);
        assert_eq!(EmotionScore::new("joy", -0.2).confidence, 0.0);
        assert_eq!(EmotionScore::new("joy", f32::NAN).confidence, 0.0);
    }

    #[test]
    fn test_empty_summary_rejected() {
        let result = Journal::new(
            Uuid::new_v4(),
            "user-1",
            "Title",
            "   ",
            vec![],
            vec![],
            vec![0.1],
        );
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    #[test]
    fn test_empty_embedding_rejected() {
        let result = Journal::new(
            Uuid::new_v4(),
            "user-1",
            "Title",
            "Summary",
            vec![],
            vec![],
            vec![],
        );
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    #[test]
    fn test_has_topic() {
        let journal = journal_with(vec!["Work".to_string()], vec![]);
        assert!(journal.has_topic("work"));
        assert!(journal.has_topic(" WORK "));
        assert!(!journal.has_topic("family"));
    }
}
