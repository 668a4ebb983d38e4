//! Routing configuration types.
//!
//! Provides [`RoutingConfig`] for tuning the classifier's signal weight
//! table, the five tier cut points, and the per-tier time budget table. All
//! fields have compiled defaults and are (de)serialisable via serde for TOML
//! config files; the specific constants are deployment tuning knobs, not
//! invariants.

use super::tier::ComplexityTier;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ── Default value functions ────────────────────────────────────────────

/// Default score contribution per word of question length.
fn default_per_word() -> f64 {
    0.025
}

/// Default cap on the word-count contribution, in words.
fn default_word_cap() -> usize {
    40
}

/// Default word count above which the long-question bonus fires.
fn default_long_question_words() -> usize {
    12
}

/// Default long-question bonus.
fn default_long_question() -> f64 {
    0.2
}

/// Default definitional/acronym pattern weight (negative: pulls toward the
/// fast path).
fn default_definitional() -> f64 {
    -0.3
}

/// Default multi-part connector weight.
fn default_multi_part() -> f64 {
    0.2
}

/// Default procedural verb weight.
fn default_procedural() -> f64 {
    0.15
}

/// Default comparison language weight.
fn default_comparison() -> f64 {
    0.2
}

/// Default statute citation weight.
fn default_citation() -> f64 {
    0.1
}

/// Default maximum word count for fast-lookup eligibility.
fn default_fast_lookup_max_words() -> usize {
    6
}

// ── Signal weights ─────────────────────────────────────────────────────

/// Signed weight table for the classifier's lexical signals.
///
/// The classifier sums the weight of every signal that fires (plus a
/// per-word length contribution) into a scalar score thresholded by
/// [`TierCutPoints`]. Making the weights an explicit data structure keeps
/// the ruleset reviewable and unit-testable instead of scattering
/// conditional checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SignalWeights {
    /// Score added per word of the normalized question, up to `word_cap`.
    #[serde(default = "default_per_word")]
    pub per_word: f64,

    /// Word count beyond which length stops contributing.
    #[serde(default = "default_word_cap")]
    pub word_cap: usize,

    /// Word count above which `long_question` fires.
    #[serde(default = "default_long_question_words")]
    pub long_question_words: usize,

    /// Bonus for questions longer than `long_question_words`.
    #[serde(default = "default_long_question")]
    pub long_question: f64,

    /// Weight for definitional / acronym shapes ("what is X", "full form
    /// of X"). Negative by default: these shapes pull toward the
    /// fast-lookup tier when no competing signal fires.
    #[serde(default = "default_definitional")]
    pub definitional: f64,

    /// Weight for multi-part connectors ("and", "also", "as well as").
    #[serde(default = "default_multi_part")]
    pub multi_part: f64,

    /// Weight for procedural verbs ("file", "appeal", "register").
    #[serde(default = "default_procedural")]
    pub procedural: f64,

    /// Weight for comparison language ("difference between", "versus").
    #[serde(default = "default_comparison")]
    pub comparison: f64,

    /// Weight for statute citations ("section 302", "article 21").
    #[serde(default = "default_citation")]
    pub citation: f64,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            per_word: default_per_word(),
            word_cap: default_word_cap(),
            long_question_words: default_long_question_words(),
            long_question: default_long_question(),
            definitional: default_definitional(),
            multi_part: default_multi_part(),
            procedural: default_procedural(),
            comparison: default_comparison(),
            citation: default_citation(),
        }
    }
}

// ── Tier cut points ────────────────────────────────────────────────────

/// Score boundaries separating the five tiers.
///
/// A score `s` selects the first tier whose boundary it does not exceed:
/// `s <= ultra_simple_max` → ultra_simple, …, `s > complex_max` →
/// very_complex. Validation requires the boundaries to strictly increase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TierCutPoints {
    /// Upper bound (inclusive) for the ultra_simple tier.
    pub ultra_simple_max: f64,
    /// Upper bound (inclusive) for the simple tier.
    pub simple_max: f64,
    /// Upper bound (inclusive) for the moderate tier.
    pub moderate_max: f64,
    /// Upper bound (inclusive) for the complex tier.
    pub complex_max: f64,
}

impl Default for TierCutPoints {
    fn default() -> Self {
        Self {
            ultra_simple_max: 0.08,
            simple_max: 0.32,
            moderate_max: 0.55,
            complex_max: 0.85,
        }
    }
}

impl TierCutPoints {
    /// Map a clamped score to its tier.
    pub fn tier_for(&self, score: f64) -> ComplexityTier {
        if score <= self.ultra_simple_max {
            ComplexityTier::UltraSimple
        } else if score <= self.simple_max {
            ComplexityTier::Simple
        } else if score <= self.moderate_max {
            ComplexityTier::Moderate
        } else if score <= self.complex_max {
            ComplexityTier::Complex
        } else {
            ComplexityTier::VeryComplex
        }
    }
}

// ── Per-tier budgets ───────────────────────────────────────────────────

/// Time and resource allocation for one tier.
///
/// Stage fractions are shares of the total ceiling; their sum must stay at
/// or below 1.0, leaving headroom for fixed overhead (network,
/// serialization).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TierBudget {
    /// Total wall-clock ceiling for a request in this tier, in
    /// milliseconds.
    pub total_ms: u64,
    /// Share of the ceiling allocated to retrieval.
    pub retrieval_frac: f64,
    /// Share of the ceiling allocated to context selection.
    pub selection_frac: f64,
    /// Share of the ceiling allocated to generation.
    pub generation_frac: f64,
    /// How many documents to request from retrieval.
    pub document_count: usize,
    /// Generation token ceiling for this tier.
    pub max_tokens: u32,
    /// Default context character budget for this tier.
    pub context_chars: usize,
}

/// The tier → budget table consulted by the planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BudgetTable {
    /// Budget for `ultra_simple` questions.
    pub ultra_simple: TierBudget,
    /// Budget for `simple` questions.
    pub simple: TierBudget,
    /// Budget for `moderate` questions.
    pub moderate: TierBudget,
    /// Budget for `complex` questions.
    pub complex: TierBudget,
    /// Budget for `very_complex` questions.
    pub very_complex: TierBudget,
}

impl Default for BudgetTable {
    fn default() -> Self {
        Self {
            ultra_simple: TierBudget {
                total_ms: 1_500,
                retrieval_frac: 0.3,
                selection_frac: 0.1,
                generation_frac: 0.5,
                document_count: 1,
                max_tokens: 128,
                context_chars: 800,
            },
            simple: TierBudget {
                total_ms: 3_000,
                retrieval_frac: 0.3,
                selection_frac: 0.1,
                generation_frac: 0.5,
                document_count: 2,
                max_tokens: 256,
                context_chars: 1_600,
            },
            moderate: TierBudget {
                total_ms: 8_000,
                retrieval_frac: 0.35,
                selection_frac: 0.1,
                generation_frac: 0.45,
                document_count: 5,
                max_tokens: 512,
                context_chars: 3_200,
            },
            complex: TierBudget {
                total_ms: 15_000,
                retrieval_frac: 0.35,
                selection_frac: 0.1,
                generation_frac: 0.45,
                document_count: 8,
                max_tokens: 768,
                context_chars: 4_800,
            },
            very_complex: TierBudget {
                total_ms: 30_000,
                retrieval_frac: 0.4,
                selection_frac: 0.1,
                generation_frac: 0.45,
                document_count: 12,
                max_tokens: 1_024,
                context_chars: 6_400,
            },
        }
    }
}

impl BudgetTable {
    /// Budget entry for a tier.
    pub fn get(&self, tier: ComplexityTier) -> &TierBudget {
        match tier {
            ComplexityTier::UltraSimple => &self.ultra_simple,
            ComplexityTier::Simple => &self.simple,
            ComplexityTier::Moderate => &self.moderate,
            ComplexityTier::Complex => &self.complex,
            ComplexityTier::VeryComplex => &self.very_complex,
        }
    }
}

// ── RoutingConfig ──────────────────────────────────────────────────────

/// Configuration for the routing layer: classifier weights, tier cut
/// points, and per-tier budgets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RoutingConfig {
    /// Lexical signal weight table.
    #[serde(default)]
    pub weights: SignalWeights,

    /// Score boundaries between tiers. Must strictly increase.
    #[serde(default)]
    pub cut_points: TierCutPoints,

    /// Maximum word count for a question to remain fast-lookup eligible.
    #[serde(default = "default_fast_lookup_max_words")]
    pub fast_lookup_max_words: usize,

    /// Per-tier budget table. Ceilings must strictly increase across tiers.
    #[serde(default)]
    pub budgets: BudgetTable,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            weights: SignalWeights::default(),
            cut_points: TierCutPoints::default(),
            fast_lookup_max_words: default_fast_lookup_max_words(),
            budgets: BudgetTable::default(),
        }
    }
}
