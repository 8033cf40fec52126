//! Journal generation: turns a finished transcript into the permanent
//! journal record.
//!
//! Summarize runs first; topic extraction, emotion scoring, and
//! embedding then run concurrently off the summary and transcript. The
//! commit is the single synchronization point: all results must be in
//! hand, and the record and its vector land in one transaction. Each
//! step carries its own bounded retry budget with exponential backoff.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use memoir_ai::{
    ChatMessage, CompletionRequest, EmbeddingProvider, LlmClient, ProviderError, RetryConfig,
};
use tracing::{error, info, warn};

use crate::config::MemoirConfig;
use crate::error::Result;
use crate::models::{Conversation, EmotionScore, Journal, MessageRole};
use crate::store::JournalStore;

const SUMMARIZE_PROMPT: &str = "Summarize the conversation below as a journal \
entry written in the user's voice. Respond with JSON only, in the form \
{\"title\": \"...\", \"summary\": \"...\"}. The title is at most eight words; \
the summary is a single first-person paragraph.";

const TOPICS_PROMPT: &str = "List between two and five short topic labels for \
the journal entry below. Respond with a JSON array of strings only.";

const EMOTIONS_PROMPT: &str = "Score the emotions the user expresses in the \
conversation below. Respond with a JSON object only, mapping emotion labels to \
confidence values between 0 and 1. Include only emotions actually present.";

#[derive(serde::Deserialize)]
struct SummaryDraft {
    title: String,
    summary: String,
}

pub struct JournalGenerator {
    llm: Arc<dyn LlmClient>,
    embedder: Arc<dyn EmbeddingProvider>,
    journals: JournalStore,
    config: Arc<MemoirConfig>,
    retry: RetryConfig,
}

impl JournalGenerator {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        embedder: Arc<dyn EmbeddingProvider>,
        journals: JournalStore,
        config: Arc<MemoirConfig>,
    ) -> Self {
        Self {
            llm,
            embedder,
            journals,
            config,
            retry: RetryConfig::default(),
        }
    }

    /// Generate and commit the journal for a finished conversation.
    pub async fn generate(&self, conversation: &Conversation) -> Result<Journal> {
        let transcript = render_transcript(conversation);
        info!(conversation_id = %conversation.id, "Generating journal");

        let draft = self
            .with_retries("summarize", || self.summarize(&transcript))
            .await?;
        let (topics, emotions, embedding) = tokio::try_join!(
            self.with_retries("topics", || self.topics(&draft.summary)),
            self.with_retries("emotions", || self.emotions(&transcript)),
            self.with_retries("embed", || self.embedder.embed(&draft.summary)),
        )?;

        let journal = Journal::new(
            conversation.id,
            conversation.user_id.clone(),
            draft.title,
            draft.summary,
            topics,
            emotions,
            embedding,
        )?;
        self.journals.create_with_vector(&journal)?;
        info!(
            journal_id = %journal.id,
            conversation_id = %conversation.id,
            topics = journal.topics.len(),
            emotions = journal.emotions.len(),
            "Journal committed"
        );
        Ok(journal)
    }

    async fn with_retries<T, F, Fut>(&self, step: &'static str, op: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = std::result::Result<T, ProviderError>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.config.generation_max_attempts => {
                    let delay = self.retry.delay_for(attempt, err.retry_after_secs());
                    warn!(
                        step,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Journal generation step failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    error!(step, attempt, error = %err, "Journal generation step exhausted retries");
                    return Err(err.into());
                }
            }
        }
    }

    async fn summarize(&self, transcript: &str) -> std::result::Result<SummaryDraft, ProviderError> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(SUMMARIZE_PROMPT),
            ChatMessage::user(transcript),
        ])
        .with_temperature(0.3);
        let response = self.llm.complete(request).await?;

        let draft: SummaryDraft = serde_json::from_str(strip_code_fences(&response.content))?;
        if draft.summary.trim().is_empty() || draft.title.trim().is_empty() {
            return Err(ProviderError::InvalidResponse(
                "summary response missing title or summary".to_string(),
            ));
        }
        Ok(draft)
    }

    async fn topics(&self, summary: &str) -> std::result::Result<Vec<String>, ProviderError> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(TOPICS_PROMPT),
            ChatMessage::user(summary),
        ])
        .with_temperature(0.3);
        let response = self.llm.complete(request).await?;

        let topics: Vec<String> = serde_json::from_str(strip_code_fences(&response.content))?;
        Ok(topics)
    }

    async fn emotions(
        &self,
        transcript: &str,
    ) -> std::result::Result<Vec<EmotionScore>, ProviderError> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(EMOTIONS_PROMPT),
            ChatMessage::user(transcript),
        ])
        .with_temperature(0.3);
        let response = self.llm.complete(request).await?;

        let scores: HashMap<String, f32> =
            serde_json::from_str(strip_code_fences(&response.content))?;
        let mut emotions: Vec<EmotionScore> = scores
            .into_iter()
            .map(|(label, confidence)| EmotionScore::new(label, confidence))
            .collect();
        emotions.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.label.cmp(&b.label))
        });
        emotions.truncate(self.config.emotion_top_k);
        Ok(emotions)
    }
}

fn render_transcript(conversation: &Conversation) -> String {
    conversation
        .messages
        .iter()
        .map(|message| {
            let speaker = match message.role {
                MessageRole::User => "User",
                MessageRole::Assistant => "Assistant",
            };
            format!("{speaker}: {}", message.text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Model responses often wrap JSON in markdown code fences; strip them.
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoir_ai::{MockEmbedding, MockLlmClient, MockStep};
    use memoir_storage::{Storage, VectorConfig};
    use tempfile::tempdir;

    fn create_generator(llm: MockLlmClient) -> (JournalGenerator, JournalStore, tempfile::TempDir) {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let storage = Arc::new(
            Storage::new(db_path.to_str().unwrap(), VectorConfig { dimension: 8 }).unwrap(),
        );
        let journals = JournalStore::new(storage);
        let config = Arc::new(MemoirConfig {
            embedding_dimension: 8,
            ..MemoirConfig::default()
        });
        let generator = JournalGenerator::new(
            Arc::new(llm),
            Arc::new(MockEmbedding::new(8)),
            journals.clone(),
            config,
        );
        (generator, journals, temp_dir)
    }

    fn finished_conversation() -> Conversation {
        let mut conversation = Conversation::new("user-1", chrono::Duration::days(14));
        conversation.push_message(MessageRole::User, "Big meeting today, very stressful.");
        conversation.push_message(MessageRole::Assistant, "What made it stressful?");
        conversation.push_message(MessageRole::User, "The stakes. But it went well.");
        conversation
    }

    fn generation_script() -> Vec<MockStep> {
        vec![
            MockStep::text(
                r#"{"title": "Big meeting day", "summary": "I had a stressful but successful meeting."}"#,
            ),
            MockStep::text(r#"["work", "stress"]"#),
            MockStep::text(r#"{"stressed": 0.8, "relieved": 0.6}"#),
        ]
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences(r#"{"a": 1}"#), r#"{"a": 1}"#);
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), r#"{"a": 1}"#);
        assert_eq!(strip_code_fences("```\n[1, 2]\n```"), "[1, 2]");
        assert_eq!(strip_code_fences("  {\"a\": 1}  "), r#"{"a": 1}"#);
    }

    #[test]
    fn test_render_transcript() {
        let transcript = render_transcript(&finished_conversation());
        assert!(transcript.starts_with("User: Big meeting today"));
        assert!(transcript.contains("\nAssistant: What made it stressful?"));
    }

    #[tokio::test]
    async fn test_generate_produces_committed_journal() {
        let llm = MockLlmClient::from_steps("mock", generation_script());
        let (generator, journals, _tmp) = create_generator(llm);

        let conversation = finished_conversation();
        let journal = generator.generate(&conversation).await.unwrap();

        assert_eq!(journal.title, "Big meeting day");
        assert_eq!(journal.topics, vec!["work", "stress"]);
        assert_eq!(journal.emotions[0].label, "stressed");
        assert_eq!(journal.embedding.len(), 8);

        // Committed on both sides.
        assert!(journals.get(journal.id).unwrap().is_some());
        let hits = journals
            .search("user-1", &journal.embedding, 1)
            .unwrap();
        assert_eq!(hits[0].0.id, journal.id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_retries_transient_failures() {
        let mut steps = vec![MockStep::unavailable(), MockStep::rate_limited()];
        steps.extend(generation_script());
        let llm = MockLlmClient::from_steps("mock", steps);
        let (generator, _journals, _tmp) = create_generator(llm);

        let journal = generator.generate(&finished_conversation()).await.unwrap();
        assert_eq!(journal.title, "Big meeting day");
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_fail_without_commit() {
        let llm = MockLlmClient::from_steps(
            "mock",
            vec![
                MockStep::unavailable(),
                MockStep::unavailable(),
                MockStep::unavailable(),
            ],
        );
        let (generator, journals, _tmp) = create_generator(llm);

        let conversation = finished_conversation();
        let result = generator.generate(&conversation).await;
        assert!(result.is_err());
        assert!(journals
            .get_by_conversation(conversation.id)
            .unwrap()
            .is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_json_is_rejected() {
        let llm = MockLlmClient::from_steps(
            "mock",
            vec![
                MockStep::text("not json"),
                MockStep::text("still not json"),
                MockStep::text("nope"),
            ],
        );
        let (generator, _journals, _tmp) = create_generator(llm);

        let result = generator.generate(&finished_conversation()).await;
        assert!(result.is_err());
    }
}
