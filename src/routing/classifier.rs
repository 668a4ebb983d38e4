//! Question complexity classification.
//!
//! Analyses a normalized question and produces a [`RoutingDecision`]: a
//! complexity tier, a query shape, and (when eligible) the fast-lookup key.
//! The score model is table-driven — every signal's contribution comes from
//! the [`SignalWeights`](super::SignalWeights) table and the resulting
//! scalar is thresholded by [`TierCutPoints`](super::TierCutPoints):
//!
//! | Signal | Fires on | Default weight |
//! |--------|----------|----------------|
//! | word count | each word, capped | +0.025/word |
//! | long question | > 12 words | +0.2 |
//! | definitional | "what is X", "full form of X" | −0.3 |
//! | multi-part | "and", "also", "as well as" | +0.2 |
//! | procedural | "file", "appeal", "register", … | +0.15 |
//! | comparison | "difference between", "versus", … | +0.2 |
//! | citation | "section 302", "article 21", "… act" | +0.1 |
//!
//! Tie-break rule: a definitional shape is only honoured (weight applied,
//! fast-lookup key emitted) when no competing complexity signal fired, so
//! "full form of IPC and how is it different from CrPC" classifies as a
//! comparison, not a fast lookup.

use crate::lookup;
use crate::{OrchestratorError, Query};

use super::config::{RoutingConfig, SignalWeights, TierCutPoints};
use super::tier::{ComplexityTier, QueryType};

/// Procedural verbs and nouns that signal a how-do-I question.
const PROCEDURAL_TERMS: [&str; 10] = [
    "file", "appeal", "register", "apply", "lodge", "submit", "draft", "procedure", "filing",
    "petition",
];

/// Comparison phrases.
const COMPARISON_TERMS: [&str; 6] = [
    "difference between",
    "different from",
    "compared to",
    "compare",
    "versus",
    " vs ",
];

/// Multi-part connectors checked as whole words.
const MULTI_PART_TERMS: [&str; 3] = ["and", "also", "alongwith"];

/// Citation head words; fire when followed by a number token.
const CITATION_HEADS: [&str; 6] = ["section", "sec", "article", "art", "chapter", "rule"];

/// The routing decision for a single question.
///
/// Produced once per request by [`ComplexityClassifier::classify`] and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingDecision {
    /// Selected complexity tier.
    pub tier: ComplexityTier,
    /// Lexical shape of the question.
    pub query_type: QueryType,
    /// Canonical fast-lookup key, present only when the question is a short
    /// definitional/acronym shape with no competing complexity signal and
    /// the score landed in the ultra_simple band.
    pub fast_lookup_key: Option<String>,
    /// Final clamped complexity score in `[0.0, 1.0]`.
    pub score: f64,
    /// How decisively the score sits inside its tier band, in `[0.0, 1.0]`.
    pub confidence: f64,
    /// Per-signal contributions, for logging and tests.
    pub breakdown: ScoreBreakdown,
}

/// Breakdown of individual signal contributions.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScoreBreakdown {
    /// Contribution from question length.
    pub word_count: f64,
    /// Contribution from the long-question bonus.
    pub long_question: f64,
    /// Contribution from the definitional/acronym shape (zero when a
    /// competing signal suppressed it).
    pub definitional: f64,
    /// Contribution from multi-part connectors.
    pub multi_part: f64,
    /// Contribution from procedural terms.
    pub procedural: f64,
    /// Contribution from comparison language.
    pub comparison: f64,
    /// Contribution from statute citations.
    pub citation: f64,
    /// Final clamped score.
    pub total: f64,
}

/// Table-driven question complexity classifier.
///
/// Stateless after construction and cheap to share. `classify` is pure,
/// deterministic, and total: the same normalized text always yields the
/// same [`RoutingDecision`], and unclassifiable input falls back to the
/// `simple` tier instead of failing.
#[derive(Debug, Clone)]
pub struct ComplexityClassifier {
    weights: SignalWeights,
    cut_points: TierCutPoints,
    fast_lookup_max_words: usize,
}

impl ComplexityClassifier {
    /// Build a classifier from routing configuration.
    pub fn new(config: &RoutingConfig) -> Self {
        Self {
            weights: config.weights.clone(),
            cut_points: config.cut_points,
            fast_lookup_max_words: config.fast_lookup_max_words,
        }
    }

    /// Classify a question, absorbing ambiguity.
    ///
    /// Empty or whitespace-only input resolves to `simple` / `unknown`
    /// rather than an error, per the never-crash contract.
    pub fn classify(&self, query: &Query) -> RoutingDecision {
        match self.try_classify(query) {
            Ok(decision) => decision,
            Err(_) => RoutingDecision {
                tier: ComplexityTier::Simple,
                query_type: QueryType::Unknown,
                fast_lookup_key: None,
                score: 0.0,
                confidence: 0.0,
                breakdown: ScoreBreakdown::default(),
            },
        }
    }

    /// Classify a question, surfacing ambiguity to the caller.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::ClassificationAmbiguous`] for empty or
    /// whitespace-only input. Callers that cannot handle the error should
    /// use [`ComplexityClassifier::classify`] instead.
    pub fn try_classify(&self, query: &Query) -> Result<RoutingDecision, OrchestratorError> {
        let text = query.normalized.as_str();
        if text.is_empty() {
            return Err(OrchestratorError::ClassificationAmbiguous(
                "empty question".to_string(),
            ));
        }

        let words = query.word_count();
        let w = &self.weights;

        let multi_part_fired = Self::multi_part_signal(text);
        let procedural_fired = Self::procedural_signal(text);
        let comparison_fired = Self::comparison_signal(text);
        let citation_fired = Self::citation_signal(text);
        let long_fired = words > w.long_question_words;

        let competing =
            multi_part_fired || procedural_fired || comparison_fired || citation_fired || long_fired;

        let definitional_key = lookup::definitional_key(text);
        let definitional_honoured = definitional_key.is_some() && !competing;

        let breakdown = {
            let word_count = words.min(w.word_cap) as f64 * w.per_word;
            let long_question = if long_fired { w.long_question } else { 0.0 };
            let definitional = if definitional_honoured { w.definitional } else { 0.0 };
            let multi_part = if multi_part_fired { w.multi_part } else { 0.0 };
            let procedural = if procedural_fired { w.procedural } else { 0.0 };
            let comparison = if comparison_fired { w.comparison } else { 0.0 };
            let citation = if citation_fired { w.citation } else { 0.0 };
            let total = (word_count
                + long_question
                + definitional
                + multi_part
                + procedural
                + comparison
                + citation)
                .clamp(0.0, 1.0);
            ScoreBreakdown {
                word_count,
                long_question,
                definitional,
                multi_part,
                procedural,
                comparison,
                citation,
                total,
            }
        };

        let score = breakdown.total;
        let tier = self.cut_points.tier_for(score);

        // Fast lookup is honoured only when the shape matched, nothing
        // competed, the question is short, and the score actually landed in
        // the ultra_simple band.
        let fast_lookup_key = if definitional_honoured
            && words <= self.fast_lookup_max_words
            && tier == ComplexityTier::UltraSimple
        {
            definitional_key.clone()
        } else {
            None
        };

        let query_type = if comparison_fired {
            QueryType::Comparison
        } else if multi_part_fired {
            QueryType::MultiPart
        } else if procedural_fired {
            QueryType::Procedural
        } else if let Some(ref key) = definitional_key {
            if lookup::is_acronym_shape(text, key) {
                QueryType::Acronym
            } else {
                QueryType::Definition
            }
        } else {
            QueryType::General
        };

        Ok(RoutingDecision {
            tier,
            query_type,
            fast_lookup_key,
            score,
            confidence: self.confidence_for(score),
            breakdown,
        })
    }

    /// Distance of the score from the nearest tier boundary, scaled so
    /// that 0.25 or more maps to full confidence.
    fn confidence_for(&self, score: f64) -> f64 {
        let c = self.cut_points;
        let cuts = [
            c.ultra_simple_max,
            c.simple_max,
            c.moderate_max,
            c.complex_max,
        ];
        let nearest = cuts
            .iter()
            .map(|cut| (score - cut).abs())
            .fold(f64::INFINITY, f64::min);
        (nearest * 4.0).clamp(0.0, 1.0)
    }

    // ── Individual signals ─────────────────────────────────────────────

    /// Multi-part connectors as whole words.
    fn multi_part_signal(text: &str) -> bool {
        text.split_whitespace()
            .any(|word| MULTI_PART_TERMS.contains(&word))
    }

    /// Procedural verbs/nouns as whole words.
    fn procedural_signal(text: &str) -> bool {
        text.split_whitespace()
            .any(|word| PROCEDURAL_TERMS.contains(&word))
    }

    /// Comparison phrasing anywhere in the text.
    fn comparison_signal(text: &str) -> bool {
        COMPARISON_TERMS.iter().any(|term| text.contains(term))
    }

    /// A citation head word immediately followed by a number token, or a
    /// named act ("dpdp act", "it act").
    fn citation_signal(text: &str) -> bool {
        let words: Vec<&str> = text.split_whitespace().collect();
        for pair in words.windows(2) {
            let head = pair[0].trim_end_matches('.');
            if CITATION_HEADS.contains(&head)
                && pair[1].chars().next().is_some_and(|c| c.is_ascii_digit())
            {
                return true;
            }
            if pair[1] == "act" {
                return true;
            }
        }
        false
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> ComplexityClassifier {
        ComplexityClassifier::new(&RoutingConfig::default())
    }

    fn ask(text: &str) -> RoutingDecision {
        classifier().classify(&Query::new(text, None, None))
    }

    // -- fast-path shapes -------------------------------------------------

    #[test]
    fn test_full_form_query_is_ultra_simple_with_key() {
        let d = ask("full form of IPC");
        assert_eq!(d.tier, ComplexityTier::UltraSimple);
        assert_eq!(d.fast_lookup_key.as_deref(), Some("ipc"));
        assert_eq!(d.query_type, QueryType::Acronym);
    }

    #[test]
    fn test_what_is_query_is_ultra_simple_definition() {
        let d = ask("what is FIR?");
        assert_eq!(d.tier, ComplexityTier::UltraSimple);
        assert_eq!(d.fast_lookup_key.as_deref(), Some("fir"));
    }

    #[test]
    fn test_stands_for_query_is_acronym() {
        let d = ask("what does PIL stand for");
        assert_eq!(d.query_type, QueryType::Acronym);
        assert!(d.fast_lookup_key.is_some());
    }

    // -- tie-break: competing signals win ---------------------------------

    #[test]
    fn test_competing_comparison_suppresses_fast_lookup() {
        let d = ask("what is the full form of IPC and how is it different from CrPC");
        assert_eq!(d.fast_lookup_key, None);
        assert!(d.tier > ComplexityTier::UltraSimple);
        assert_eq!(d.query_type, QueryType::Comparison);
        assert!(
            d.breakdown.definitional.abs() < f64::EPSILON,
            "definitional weight must be suppressed by a competing signal"
        );
    }

    #[test]
    fn test_citation_suppresses_fast_lookup() {
        let d = ask("What is IPC Section 302?");
        assert_eq!(d.fast_lookup_key, None);
        assert_eq!(d.tier, ComplexityTier::Simple);
    }

    // -- tier scenarios ---------------------------------------------------

    #[test]
    fn test_long_multi_part_question_is_complex_or_above() {
        let d = ask(
            "Explain DPDP Act consent requirements for data processing including \
             cross-border transfer obligations and penalties",
        );
        assert!(
            d.tier >= ComplexityTier::Complex,
            "expected complex or very_complex, got {} (score {})",
            d.tier,
            d.score
        );
    }

    #[test]
    fn test_procedural_question_scores_above_simple() {
        let d = ask("How do I file an FIR and what documents do I need");
        assert!(d.tier >= ComplexityTier::Moderate, "got {}", d.tier);
        assert!(d.breakdown.procedural > 0.0);
    }

    #[test]
    fn test_short_general_question_is_simple() {
        let d = ask("Is bail allowed here");
        assert_eq!(d.tier, ComplexityTier::Simple);
        assert_eq!(d.query_type, QueryType::General);
    }

    // -- determinism and totality -----------------------------------------

    #[test]
    fn test_classify_is_deterministic() {
        let q = Query::new("What are the penalties under the DPDP act?", None, None);
        let c = classifier();
        let a = c.classify(&q);
        let b = c.classify(&q);
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_query_defaults_to_simple_unknown() {
        let d = ask("   ");
        assert_eq!(d.tier, ComplexityTier::Simple);
        assert_eq!(d.query_type, QueryType::Unknown);
        assert_eq!(d.fast_lookup_key, None);
    }

    #[test]
    fn test_try_classify_empty_is_ambiguous() {
        let c = classifier();
        let result = c.try_classify(&Query::new("", None, None));
        assert!(matches!(
            result,
            Err(OrchestratorError::ClassificationAmbiguous(_))
        ));
    }

    // -- score properties -------------------------------------------------

    #[test]
    fn test_score_clamped_to_unit_interval() {
        let long: String = (0..200).map(|i| format!("word{i} ")).collect();
        let d = ask(&format!("{long} and also compare versus section 5"));
        assert!(d.score <= 1.0 && d.score >= 0.0);
    }

    #[test]
    fn test_breakdown_total_matches_score() {
        let d = ask("How do I appeal a conviction and reduce the sentence");
        assert!((d.breakdown.total - d.score).abs() < f64::EPSILON);
    }

    #[test]
    fn test_confidence_in_unit_interval() {
        for text in ["what is FIR", "Explain the DPDP act penalties and audits"] {
            let d = ask(text);
            assert!(d.confidence >= 0.0 && d.confidence <= 1.0);
        }
    }

    // -- individual signals -----------------------------------------------

    #[test]
    fn test_citation_signal_requires_number() {
        assert!(ComplexityClassifier::citation_signal("ipc section 302"));
        assert!(!ComplexityClassifier::citation_signal(
            "the section about bail"
        ));
    }

    #[test]
    fn test_citation_signal_named_act() {
        assert!(ComplexityClassifier::citation_signal(
            "penalties under the dpdp act"
        ));
    }

    #[test]
    fn test_multi_part_requires_whole_word() {
        assert!(ComplexityClassifier::multi_part_signal("bail and parole"));
        assert!(!ComplexityClassifier::multi_part_signal("remanded custody"));
    }

    #[test]
    fn test_procedural_whole_word_only() {
        assert!(ComplexityClassifier::procedural_signal("how to file an fir"));
        assert!(!ComplexityClassifier::procedural_signal("profile of a judge"));
    }
}
