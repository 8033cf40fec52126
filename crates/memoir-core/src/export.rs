//! Journal export collaborator.
//!
//! The core hands over structured journal data; the exporter owns the
//! rendering and file layout. `MarkdownExporter` writes one markdown
//! file per journal under a `YYYY/MM` date partition.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::Result;
use crate::models::Journal;

pub trait JournalExporter: Send + Sync {
    /// Persist a rendering of the journal, returning where it landed.
    fn export(&self, journal: &Journal) -> Result<PathBuf>;
}

pub struct MarkdownExporter {
    base_dir: PathBuf,
}

impl MarkdownExporter {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn render(journal: &Journal) -> String {
        let mut out = String::new();
        out.push_str(&format!("# {}\n\n", journal.title));
        out.push_str(&format!(
            "*{}*\n\n",
            journal.created_at.format("%Y-%m-%d %H:%M UTC")
        ));
        out.push_str(journal.summary.trim());
        out.push('\n');

        if !journal.topics.is_empty() {
            out.push_str("\n## Topics\n\n");
            for topic in &journal.topics {
                out.push_str(&format!("- {topic}\n"));
            }
        }
        if !journal.emotions.is_empty() {
            out.push_str("\n## Emotions\n\n");
            for emotion in &journal.emotions {
                out.push_str(&format!("- {} ({:.2})\n", emotion.label, emotion.confidence));
            }
        }
        out
    }

    fn file_name(journal: &Journal) -> String {
        let slug: String = journal
            .title
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '-' })
            .collect::<String>()
            .split('-')
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("-");
        format!("{}-{}.md", journal.created_at.format("%Y-%m-%d"), slug)
    }
}

impl JournalExporter for MarkdownExporter {
    fn export(&self, journal: &Journal) -> Result<PathBuf> {
        let partition: PathBuf = self
            .base_dir
            .join(journal.created_at.format("%Y").to_string())
            .join(journal.created_at.format("%m").to_string());
        fs::create_dir_all(&partition)?;

        let path = partition.join(Self::file_name(journal));
        fs::write(&path, Self::render(journal))?;
        info!(journal_id = %journal.id, path = %path.display(), "Exported journal");
        Ok(path)
    }
}

impl MarkdownExporter {
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EmotionScore;
    use tempfile::tempdir;
    use uuid::Uuid;

    fn make_journal() -> Journal {
        Journal::new(
            Uuid::new_v4(),
            "user-1",
            "A Walk in the Rain",
            "I walked home through the rain and felt lighter.",
            vec!["weather".to_string(), "walking".to_string()],
            vec![
                EmotionScore::new("calm", 0.8),
                EmotionScore::new("wistful", 0.3),
            ],
            vec![0.1, 0.2],
        )
        .unwrap()
    }

    #[test]
    fn test_export_writes_date_partitioned_file() {
        let temp_dir = tempdir().unwrap();
        let exporter = MarkdownExporter::new(temp_dir.path());

        let journal = make_journal();
        let path = exporter.export(&journal).unwrap();

        assert!(path.starts_with(temp_dir.path()));
        assert!(path
            .to_string_lossy()
            .contains(&journal.created_at.format("%Y").to_string()));
        assert!(path.extension().is_some_and(|ext| ext == "md"));
        assert!(path.exists());
    }

    #[test]
    fn test_rendering_includes_all_sections() {
        let journal = make_journal();
        let rendered = MarkdownExporter::render(&journal);

        assert!(rendered.starts_with("# A Walk in the Rain"));
        assert!(rendered.contains("felt lighter"));
        assert!(rendered.contains("## Topics"));
        assert!(rendered.contains("- weather"));
        assert!(rendered.contains("## Emotions"));
        assert!(rendered.contains("- calm (0.80)"));
    }

    #[test]
    fn test_file_name_is_slugged() {
        let journal = make_journal();
        let name = MarkdownExporter::file_name(&journal);
        assert!(name.ends_with("a-walk-in-the-rain.md"));
        assert!(!name.contains(' '));
    }
}
