//! Outcome emission to an external persistence collaborator.
//!
//! The engine holds no database connection; after each competition it hands
//! a `CompetitionOutcome` to whatever sink was injected. Sink failures are
//! logged by the caller and never fail the competition.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::SinkError;
use crate::types::CompetitionOutcome;

/// Destination for completed competition records.
#[async_trait]
pub trait OutcomeSink: Send + Sync {
    async fn record(&self, outcome: &CompetitionOutcome) -> Result<(), SinkError>;
}

/// Sink that drops everything; the default when no persistence is wired.
pub struct NoOpSink;

#[async_trait]
impl OutcomeSink for NoOpSink {
    async fn record(&self, _outcome: &CompetitionOutcome) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Bounded in-memory sink, useful for tests and short-lived processes.
pub struct MemorySink {
    outcomes: Mutex<VecDeque<CompetitionOutcome>>,
    capacity: usize,
}

impl MemorySink {
    pub fn new(capacity: usize) -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            capacity,
        }
    }

    /// Copy of the retained outcomes, oldest first.
    pub fn snapshot(&self) -> Vec<CompetitionOutcome> {
        let guard = self.outcomes.lock().unwrap_or_else(|p| p.into_inner());
        guard.iter().cloned().collect()
    }
}

#[async_trait]
impl OutcomeSink for MemorySink {
    async fn record(&self, outcome: &CompetitionOutcome) -> Result<(), SinkError> {
        let mut guard = self.outcomes.lock().unwrap_or_else(|p| p.into_inner());
        guard.push_back(outcome.clone());
        while guard.len() > self.capacity {
            guard.pop_front();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn outcome() -> CompetitionOutcome {
        CompetitionOutcome {
            request_id: Uuid::new_v4(),
            score_vectors: Vec::new(),
            ab_test: None,
            winner: None,
            completed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_memory_sink_retains_records() {
        let sink = MemorySink::new(10);
        let first = outcome();
        sink.record(&first).await.unwrap();
        sink.record(&outcome()).await.unwrap();
        let stored = sink.snapshot();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].request_id, first.request_id);
    }

    #[tokio::test]
    async fn test_memory_sink_is_bounded() {
        let sink = MemorySink::new(3);
        for _ in 0..5 {
            sink.record(&outcome()).await.unwrap();
        }
        assert_eq!(sink.snapshot().len(), 3);
    }

    #[tokio::test]
    async fn test_noop_sink_accepts_everything() {
        assert!(NoOpSink.record(&outcome()).await.is_ok());
    }
}
