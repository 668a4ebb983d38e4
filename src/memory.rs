//! Session memory.
//!
//! Append-only (question, answer) history per session id, bounded to the
//! most recent K exchanges with the oldest evicted first. Consulted by the
//! orchestrator as optional conversational context; internally synchronized
//! so request tasks never coordinate around it.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::VecDeque;

/// One completed question/answer pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    /// The question as asked.
    pub question: String,
    /// The answer served.
    pub answer: String,
    /// When the exchange completed.
    pub at: DateTime<Utc>,
}

impl Exchange {
    /// Compact single-string rendering used as conversational context.
    pub fn as_context(&self) -> String {
        format!("Q: {}\nA: {}", self.question, self.answer)
    }
}

/// Bounded per-session conversation history.
pub struct SessionMemory {
    sessions: DashMap<String, VecDeque<Exchange>>,
    capacity: usize,
}

impl SessionMemory {
    /// Create a store keeping at most `capacity` exchanges per session.
    ///
    /// A capacity of zero disables recording entirely.
    pub fn new(capacity: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            capacity,
        }
    }

    /// Append an exchange, evicting the oldest when over capacity.
    pub fn append(&self, session: &str, question: impl Into<String>, answer: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        let mut history = self.sessions.entry(session.to_string()).or_default();
        history.push_back(Exchange {
            question: question.into(),
            answer: answer.into(),
            at: Utc::now(),
        });
        while history.len() > self.capacity {
            history.pop_front();
        }
    }

    /// The most recent exchange for a session, if any.
    pub fn recent(&self, session: &str) -> Option<Exchange> {
        self.sessions
            .get(session)
            .and_then(|h| h.back().cloned())
    }

    /// Full (bounded) history for a session, oldest first.
    pub fn history(&self, session: &str) -> Vec<Exchange> {
        self.sessions
            .get(session)
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of sessions currently tracked.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_recent() {
        let memory = SessionMemory::new(5);
        memory.append("s1", "what is bail", "conditional release");
        let recent = memory.recent("s1").unwrap();
        assert_eq!(recent.question, "what is bail");
        assert_eq!(recent.answer, "conditional release");
    }

    #[test]
    fn test_recent_of_unknown_session_is_none() {
        let memory = SessionMemory::new(5);
        assert!(memory.recent("nobody").is_none());
    }

    #[test]
    fn test_capacity_evicts_oldest_first() {
        let memory = SessionMemory::new(2);
        memory.append("s", "q1", "a1");
        memory.append("s", "q2", "a2");
        memory.append("s", "q3", "a3");

        let history = memory.history("s");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].question, "q2");
        assert_eq!(history[1].question, "q3");
    }

    #[test]
    fn test_sessions_are_isolated() {
        let memory = SessionMemory::new(5);
        memory.append("a", "qa", "aa");
        memory.append("b", "qb", "ab");
        assert_eq!(memory.recent("a").unwrap().answer, "aa");
        assert_eq!(memory.recent("b").unwrap().answer, "ab");
        assert_eq!(memory.session_count(), 2);
    }

    #[test]
    fn test_zero_capacity_records_nothing() {
        let memory = SessionMemory::new(0);
        memory.append("s", "q", "a");
        assert!(memory.recent("s").is_none());
        assert_eq!(memory.session_count(), 0);
    }

    #[test]
    fn test_exchange_context_rendering() {
        let memory = SessionMemory::new(5);
        memory.append("s", "what is a writ", "a formal court order");
        let rendered = memory.recent("s").unwrap().as_context();
        assert_eq!(rendered, "Q: what is a writ\nA: a formal court order");
    }
}
