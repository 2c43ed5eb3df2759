use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use std::error::Error;
use tokio::sync::Mutex;

use super::HistoryStore;
use crate::models::chat::{ HistoryEntry, Subject };

/// Process-memory history, one bounded bucket per subject. Nothing survives
/// a restart. The mutex serializes interleaved appends from concurrent
/// requests to the same subject.
pub struct MemoryHistoryStore {
    buckets: Mutex<HashMap<Subject, Vec<HistoryEntry>>>,
    max_per_subject: usize,
}

impl MemoryHistoryStore {
    pub fn new(max_per_subject: usize) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            max_per_subject,
        }
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn append(
        &self,
        entry: HistoryEntry
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let subject: Subject = entry.subject.parse()?;

        let mut buckets = self.buckets.lock().await;
        let bucket = buckets.entry(subject).or_default();
        bucket.push(entry);

        // Keep only the most recent entries per subject.
        if bucket.len() > self.max_per_subject {
            let excess = bucket.len() - self.max_per_subject;
            bucket.drain(..excess);
            debug!("Trimmed {} old entr(ies) from '{}' history", excess, subject);
        }

        Ok(())
    }

    async fn recent(
        &self,
        subject: Subject,
        limit: usize
    ) -> Result<Vec<HistoryEntry>, Box<dyn Error + Send + Sync>> {
        let buckets = self.buckets.lock().await;
        let entries = match buckets.get(&subject) {
            Some(bucket) => {
                let start = bucket.len().saturating_sub(limit);
                bucket[start..].to_vec()
            }
            None => Vec::new(),
        };
        Ok(entries)
    }
}
