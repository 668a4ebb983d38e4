//! Context selection.
//!
//! Turns a set of retrieved documents into a generation-ready context:
//! deduplicates by content fingerprint, filters on minimum relevance, and
//! trims total length to the character budget the orchestrator derived from
//! the remaining time. The selector guarantees a non-empty context whenever
//! at least one candidate document exists — if the relevance filter would
//! empty the set, the single highest-scoring candidate is force-included
//! (truncated to a bounded length) so the pipeline never reaches generation
//! with empty context when documents were available.

use std::collections::HashSet;

use crate::adapters::RetrievedDocument;

/// Separator placed between documents in the assembled context.
const DOC_SEPARATOR: &str = "\n\n---\n\n";

/// Header prepended to conversational context from session memory.
const MEMORY_HEADER: &str = "Previous exchange:\n";

/// A generation-ready context assembled from retrieved documents.
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    /// Assembled context text.
    pub text: String,
    /// How many documents made it into the context.
    pub documents_used: usize,
    /// Whether any included document had to be truncated.
    pub truncated: bool,
    /// Whether a session memory exchange was prepended.
    pub used_session_memory: bool,
}

impl Context {
    /// Whether the context carries no text at all.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Document deduplication, relevance filtering, and budget-aware trimming.
#[derive(Debug, Clone)]
pub struct ContextSelector {
    min_relevance: f64,
    fallback_chars: usize,
}

impl ContextSelector {
    /// Build a selector with an explicit relevance floor and safety
    /// fallback length.
    pub fn new(min_relevance: f64, fallback_chars: usize) -> Self {
        Self {
            min_relevance,
            fallback_chars,
        }
    }

    /// Re-sort documents by relevance blended with lexical overlap
    /// against the question.
    ///
    /// This is the optional rerank step; the orchestrator skips it when
    /// more than half the time budget is already spent.
    pub fn rerank(&self, query: &str, documents: &mut [RetrievedDocument]) {
        let query_words: HashSet<&str> = query.split_whitespace().collect();
        if query_words.is_empty() {
            return;
        }
        let overlap = |doc: &RetrievedDocument| -> f64 {
            let hits = doc
                .text
                .split_whitespace()
                .collect::<HashSet<_>>()
                .intersection(&query_words)
                .count();
            hits as f64 / query_words.len() as f64
        };
        documents.sort_by(|a, b| {
            let score_a = a.score + 0.1 * overlap(a);
            let score_b = b.score + 0.1 * overlap(b);
            score_b.total_cmp(&score_a)
        });
    }

    /// Assemble a context from candidate documents within `char_budget`.
    ///
    /// `session_context` is an optional conversational snippet from session
    /// memory; it is the first thing dropped when the budget is tight.
    pub fn select(
        &self,
        documents: Vec<RetrievedDocument>,
        char_budget: usize,
        session_context: Option<&str>,
    ) -> Context {
        let had_candidates = !documents.is_empty();

        // Dedup by full-text fingerprint, preserving ranking order. A short
        // prefix is not enough: statute extracts often share openings.
        let mut seen = HashSet::new();
        let mut unique: Vec<RetrievedDocument> = documents
            .into_iter()
            .filter(|doc| seen.insert(fingerprint(&doc.text)))
            .collect();

        unique.sort_by(|a, b| b.score.total_cmp(&a.score));

        let mut kept: Vec<&RetrievedDocument> = unique
            .iter()
            .filter(|doc| doc.score >= self.min_relevance)
            .collect();

        // Safety fallback: never hand generation an empty context while
        // candidates existed.
        let mut forced_fallback = false;
        if kept.is_empty() && had_candidates {
            if let Some(best) = unique.first() {
                kept.push(best);
                forced_fallback = true;
            }
        }

        let mut text = String::new();
        let mut documents_used = 0;
        let mut truncated = false;
        let effective_budget = char_budget.max(1);

        for doc in kept {
            let doc_text = if forced_fallback {
                truncate_chars(&doc.text, self.fallback_chars.min(effective_budget))
            } else {
                doc.text.clone()
            };
            if doc_text.len() < doc.text.len() {
                truncated = true;
            }

            let separator_len = if text.is_empty() { 0 } else { DOC_SEPARATOR.len() };
            let remaining = effective_budget.saturating_sub(text.len() + separator_len);

            if remaining == 0 {
                break;
            }

            let fitted = if doc_text.len() > remaining {
                // Always include at least one document, truncated to fit.
                if documents_used > 0 {
                    break;
                }
                truncated = true;
                truncate_chars(&doc_text, remaining)
            } else {
                doc_text
            };

            if !text.is_empty() {
                text.push_str(DOC_SEPARATOR);
            }
            text.push_str(&fitted);
            documents_used += 1;
        }

        // Session memory rides along only when space remains after the
        // documents.
        let mut used_session_memory = false;
        if let Some(memory) = session_context {
            let addition = MEMORY_HEADER.len() + memory.len() + DOC_SEPARATOR.len();
            if !memory.is_empty() && text.len() + addition <= effective_budget {
                let mut with_memory =
                    String::with_capacity(text.len() + addition);
                with_memory.push_str(MEMORY_HEADER);
                with_memory.push_str(memory);
                with_memory.push_str(DOC_SEPARATOR);
                with_memory.push_str(&text);
                text = with_memory;
                used_session_memory = true;
            }
        }

        Context {
            text,
            documents_used,
            truncated,
            used_session_memory,
        }
    }
}

impl Default for ContextSelector {
    fn default() -> Self {
        Self::new(0.25, 600)
    }
}

/// Content fingerprint over the full document text.
fn fingerprint(text: &str) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

/// Truncate to a character boundary at most `max_chars` in.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, text: &str, score: f64) -> RetrievedDocument {
        RetrievedDocument {
            id: id.to_string(),
            text: text.to_string(),
            score,
            domain: None,
        }
    }

    fn selector() -> ContextSelector {
        ContextSelector::new(0.25, 600)
    }

    #[test]
    fn test_select_includes_relevant_documents_in_score_order() {
        let ctx = selector().select(
            vec![
                doc("low", "low relevance body", 0.3),
                doc("high", "high relevance body", 0.9),
            ],
            10_000,
            None,
        );
        assert_eq!(ctx.documents_used, 2);
        let high_pos = ctx.text.find("high relevance").unwrap();
        let low_pos = ctx.text.find("low relevance").unwrap();
        assert!(high_pos < low_pos, "higher score must come first");
    }

    #[test]
    fn test_select_drops_below_relevance_floor() {
        let ctx = selector().select(
            vec![doc("keep", "kept body", 0.8), doc("drop", "dropped body", 0.1)],
            10_000,
            None,
        );
        assert_eq!(ctx.documents_used, 1);
        assert!(!ctx.text.contains("dropped body"));
    }

    #[test]
    fn test_safety_fallback_never_returns_empty_for_nonempty_input() {
        // Every candidate is below the floor; the best one must still be
        // force-included.
        let ctx = selector().select(
            vec![doc("a", "weak match a", 0.05), doc("b", "weak match b", 0.12)],
            10_000,
            None,
        );
        assert!(!ctx.is_empty(), "context must not be empty when candidates exist");
        assert_eq!(ctx.documents_used, 1);
        assert!(ctx.text.contains("weak match b"), "best candidate wins");
    }

    #[test]
    fn test_safety_fallback_bounds_length() {
        let long_text = "y".repeat(5_000);
        let ctx = ContextSelector::new(0.9, 100).select(
            vec![doc("long", &long_text, 0.1)],
            10_000,
            None,
        );
        assert!(ctx.text.len() <= 100);
        assert!(ctx.truncated);
    }

    #[test]
    fn test_empty_input_yields_empty_context() {
        let ctx = selector().select(Vec::new(), 10_000, None);
        assert!(ctx.is_empty());
        assert_eq!(ctx.documents_used, 0);
    }

    #[test]
    fn test_dedup_by_full_text_not_prefix() {
        let shared_prefix_a =
            format!("{}{}", "Section 154 of the CrPC provides that ", "an FIR shall be recorded.");
        let shared_prefix_b =
            format!("{}{}", "Section 154 of the CrPC provides that ", "a copy goes to the magistrate.");
        let ctx = selector().select(
            vec![
                doc("a", &shared_prefix_a, 0.9),
                doc("a-dup", &shared_prefix_a, 0.8),
                doc("b", &shared_prefix_b, 0.7),
            ],
            10_000,
            None,
        );
        // The exact duplicate goes; the same-prefix different document stays.
        assert_eq!(ctx.documents_used, 2);
    }

    #[test]
    fn test_char_budget_trims_document_count() {
        let body = "z".repeat(400);
        let ctx = selector().select(
            vec![doc("a", &body, 0.9), doc("b", &body, 0.8), doc("c", &body, 0.7)],
            500,
            None,
        );
        assert_eq!(ctx.documents_used, 1, "budget of 500 fits only one 400-char doc");
        assert!(ctx.text.len() <= 500);
    }

    #[test]
    fn test_first_document_truncated_to_tiny_budget() {
        let body = "w".repeat(400);
        let ctx = selector().select(vec![doc("a", &body, 0.9)], 50, None);
        assert_eq!(ctx.documents_used, 1);
        assert_eq!(ctx.text.len(), 50);
        assert!(ctx.truncated);
    }

    #[test]
    fn test_session_memory_prepended_when_budget_allows() {
        let ctx = selector().select(
            vec![doc("a", "document body", 0.9)],
            10_000,
            Some("Q: what is bail\nA: conditional release"),
        );
        assert!(ctx.used_session_memory);
        assert!(ctx.text.starts_with(MEMORY_HEADER));
        assert!(ctx.text.contains("document body"));
    }

    #[test]
    fn test_session_memory_dropped_when_budget_tight() {
        let body = "v".repeat(90);
        let ctx = selector().select(
            vec![doc("a", &body, 0.9)],
            100,
            Some("a fairly long previous exchange that will not fit"),
        );
        assert!(!ctx.used_session_memory, "memory must be dropped first");
        assert!(ctx.documents_used > 0);
    }

    #[test]
    fn test_rerank_prefers_lexical_overlap_on_close_scores() {
        let mut docs = vec![
            doc("other", "registration of vehicles and road permits", 0.50),
            doc("bail", "bail is the conditional release of an accused", 0.48),
        ];
        selector().rerank("what is bail conditional release", &mut docs);
        assert_eq!(docs[0].id, "bail", "overlap bonus must lift the on-topic doc");
    }

    #[test]
    fn test_rerank_empty_query_is_noop() {
        let mut docs = vec![doc("a", "text", 0.5), doc("b", "text b", 0.9)];
        selector().rerank("", &mut docs);
        assert_eq!(docs[0].id, "a", "order untouched for empty query");
    }

    #[test]
    fn test_fingerprint_distinguishes_similar_texts() {
        assert_ne!(
            fingerprint("Section 302 of the IPC prescribes punishment for murder"),
            fingerprint("Section 302 of the IPC prescribes punishment for murder.")
        );
    }
}
