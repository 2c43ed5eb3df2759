mod memory;

use async_trait::async_trait;
use log::info;
use std::error::Error;
use std::sync::Arc;

use crate::models::chat::{ HistoryEntry, Subject };

pub use memory::MemoryHistoryStore;

/// Number of characters of a stored answer carried into the context string.
const ANSWER_SNIPPET_LEN: usize = 200;

#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(
        &self,
        entry: HistoryEntry
    ) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// The `limit` most recent entries for a subject, oldest first.
    async fn recent(
        &self,
        subject: Subject,
        limit: usize
    ) -> Result<Vec<HistoryEntry>, Box<dyn Error + Send + Sync>>;
}

pub fn initialize_history_store(max_per_subject: usize) -> Arc<dyn HistoryStore> {
    info!("Chat history will be kept in process memory, {} entries per subject", max_per_subject);
    Arc::new(MemoryHistoryStore::new(max_per_subject))
}

/// Render recent exchanges into the continuity block embedded in prompts.
/// Answers are clipped to a short snippet; clipping counts characters so an
/// Arabic answer is never split inside a scalar value.
pub fn format_recent_context(entries: &[HistoryEntry]) -> String {
    let mut context = String::new();
    for entry in entries {
        let snippet: String = entry.answer.chars().take(ANSWER_SNIPPET_LEN).collect();
        context.push_str(&format!("Previous Q: {}\nPrevious A: {}...\n\n", entry.question, snippet));
    }
    context
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(question: &str, answer: &str) -> HistoryEntry {
        HistoryEntry {
            id: "00000000-0000-0000-0000-000000000000".to_string(),
            question: question.to_string(),
            answer: answer.to_string(),
            timestamp: "2024-01-01T00:00:00Z".to_string(),
            subject: "chemistry".to_string(),
        }
    }

    #[test]
    fn empty_history_formats_to_empty_context() {
        assert_eq!(format_recent_context(&[]), "");
    }

    #[test]
    fn context_lists_question_and_answer_snippet() {
        let context = format_recent_context(&[entry("What is H2O?", "Water!")]);
        assert_eq!(context, "Previous Q: What is H2O?\nPrevious A: Water!...\n\n");
    }

    #[test]
    fn long_answers_are_clipped_to_snippet_length() {
        let long = "x".repeat(500);
        let context = format_recent_context(&[entry("q", &long)]);
        assert!(context.contains(&"x".repeat(200)));
        assert!(!context.contains(&"x".repeat(201)));
    }

    #[test]
    fn clipping_respects_multibyte_answers() {
        let arabic = "الإجابة النحوية ".repeat(40);
        let context = format_recent_context(&[entry("أعرب الجملة", &arabic)]);
        assert!(context.starts_with("Previous Q: أعرب الجملة\nPrevious A: "));
        assert!(context.ends_with("...\n\n"));
    }
}
