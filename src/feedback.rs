//! User feedback sink.
//!
//! Write-only recorder of answer ratings, consumed asynchronously: requests
//! enqueue a record and move on, a drain task persists through a pluggable
//! [`FeedbackSink`]. Feedback never influences routing decisions in real
//! time. Submission sheds when the queue is full rather than blocking the
//! answer path.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::OrchestratorError;

/// One user rating of a served answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRecord {
    /// The question that was asked.
    pub question: String,
    /// The answer that was served.
    pub answer: String,
    /// Rating from 1 (poor) to 5 (excellent).
    pub rating: u8,
    /// Session the exchange belonged to, if any.
    pub session_id: Option<String>,
    /// Optional free-text comment.
    pub comment: Option<String>,
    /// When the feedback was submitted.
    pub timestamp: DateTime<Utc>,
}

/// Destination for drained feedback records.
///
/// Implementations persist to a database, a file, an analytics pipeline —
/// whatever the deployment uses. The default [`LogSink`] records rating
/// metadata through tracing (content lengths only, never text).
#[async_trait]
pub trait FeedbackSink: Send + Sync {
    /// Persist one record.
    ///
    /// # Errors
    ///
    /// Implementation-defined; errors are logged by the drain task and the
    /// record is dropped.
    async fn persist(&self, record: &FeedbackRecord) -> Result<(), OrchestratorError>;
}

/// Tracing-backed sink: logs rating metadata, never content.
pub struct LogSink;

#[async_trait]
impl FeedbackSink for LogSink {
    async fn persist(&self, record: &FeedbackRecord) -> Result<(), OrchestratorError> {
        info!(
            target: "lexroute::feedback",
            rating = record.rating,
            session_id = record.session_id.as_deref().unwrap_or("-"),
            question_len = record.question.len(),
            answer_len = record.answer.len(),
            has_comment = record.comment.is_some(),
            "feedback received"
        );
        Ok(())
    }
}

/// Bounded async feedback queue with a background drain task.
pub struct FeedbackStore {
    tx: mpsc::Sender<FeedbackRecord>,
    drain: JoinHandle<()>,
}

impl FeedbackStore {
    /// Spawn a store draining into `sink`, queueing at most `capacity`
    /// pending records.
    pub fn new(sink: Arc<dyn FeedbackSink>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<FeedbackRecord>(capacity.max(1));

        let drain = tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                if let Err(e) = sink.persist(&record).await {
                    warn!(target: "lexroute::feedback", error = %e, "feedback persist failed");
                }
            }
        });

        Self { tx, drain }
    }

    /// Enqueue a record without blocking the caller.
    ///
    /// Strategy: `try_send` — if the queue is full, log and drop the record
    /// so a slow sink can never delay the answer path.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Other`] for an out-of-range rating or a
    /// closed queue.
    pub fn submit(&self, record: FeedbackRecord) -> Result<(), OrchestratorError> {
        if !(1..=5).contains(&record.rating) {
            return Err(OrchestratorError::Other(format!(
                "rating must be 1-5, got {}",
                record.rating
            )));
        }

        match self.tx.try_send(record) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(target: "lexroute::feedback", "feedback queue full, shedding record");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(OrchestratorError::Other(
                "feedback queue closed".to_string(),
            )),
        }
    }

    /// Abort the drain task (shutdown use).
    pub fn shutdown(self) {
        drop(self.tx);
        self.drain.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink {
        persisted: AtomicUsize,
    }

    #[async_trait]
    impl FeedbackSink for CountingSink {
        async fn persist(&self, _record: &FeedbackRecord) -> Result<(), OrchestratorError> {
            self.persisted.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn record(rating: u8) -> FeedbackRecord {
        FeedbackRecord {
            question: "what is bail".to_string(),
            answer: "conditional release".to_string(),
            rating,
            session_id: Some("s1".to_string()),
            comment: None,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_submitted_records_reach_sink() {
        let sink = Arc::new(CountingSink {
            persisted: AtomicUsize::new(0),
        });
        let store = FeedbackStore::new(Arc::clone(&sink) as Arc<dyn FeedbackSink>, 16);

        for _ in 0..3 {
            store.submit(record(4)).unwrap();
        }

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(sink.persisted.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_out_of_range_rating_rejected() {
        let store = FeedbackStore::new(Arc::new(LogSink), 16);
        assert!(store.submit(record(0)).is_err());
        assert!(store.submit(record(6)).is_err());
        assert!(store.submit(record(1)).is_ok());
        assert!(store.submit(record(5)).is_ok());
    }

    #[tokio::test]
    async fn test_full_queue_sheds_instead_of_blocking() {
        struct StallingSink;

        #[async_trait]
        impl FeedbackSink for StallingSink {
            async fn persist(&self, _r: &FeedbackRecord) -> Result<(), OrchestratorError> {
                tokio::time::sleep(std::time::Duration::from_secs(60)).await;
                Ok(())
            }
        }

        let store = FeedbackStore::new(Arc::new(StallingSink), 1);
        // Flood far beyond capacity; every submit must return immediately.
        for _ in 0..20 {
            assert!(store.submit(record(3)).is_ok());
        }
    }

    #[tokio::test]
    async fn test_log_sink_accepts_record() {
        assert!(LogSink.persist(&record(5)).await.is_ok());
    }
}
