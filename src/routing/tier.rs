//! Complexity tiers and query shapes.

use serde::{Deserialize, Serialize};

/// The five ordered complexity classes governing time budget and retrieval
/// depth.
///
/// Ordering is derived from declaration order: `UltraSimple` is the cheapest
/// tier and `VeryComplex` the most expensive. Configuration validation
/// enforces that total time ceilings strictly increase along this order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityTier {
    /// Definitional / acronym questions answerable from the fast lookup
    /// table without retrieval or generation.
    UltraSimple,
    /// Short factual questions needing shallow retrieval.
    Simple,
    /// Typical single-topic questions.
    Moderate,
    /// Multi-faceted questions needing deep retrieval.
    Complex,
    /// Long multi-part analyses at the maximum ceiling.
    VeryComplex,
}

impl ComplexityTier {
    /// All tiers in ascending complexity order.
    pub const ALL: [ComplexityTier; 5] = [
        ComplexityTier::UltraSimple,
        ComplexityTier::Simple,
        ComplexityTier::Moderate,
        ComplexityTier::Complex,
        ComplexityTier::VeryComplex,
    ];

    /// Stable snake_case label used in metrics, logs, and responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplexityTier::UltraSimple => "ultra_simple",
            ComplexityTier::Simple => "simple",
            ComplexityTier::Moderate => "moderate",
            ComplexityTier::Complex => "complex",
            ComplexityTier::VeryComplex => "very_complex",
        }
    }
}

impl std::fmt::Display for ComplexityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The lexical shape of a question, reported alongside the tier.
///
/// Purely informational for responses and metrics; routing policy keys off
/// the tier alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    /// "what is X" / "define X" shapes.
    Definition,
    /// "full form of X" / "X stands for" shapes.
    Acronym,
    /// "how do I file / appeal / register" shapes.
    Procedural,
    /// Questions joined by "and" / "also" connectors.
    MultiPart,
    /// "difference between" / "compared to" shapes.
    Comparison,
    /// Anything without a recognised shape.
    General,
    /// Empty or whitespace-only input.
    Unknown,
}

impl QueryType {
    /// Stable snake_case label used in responses and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Definition => "definition",
            QueryType::Acronym => "acronym",
            QueryType::Procedural => "procedural",
            QueryType::MultiPart => "multi_part",
            QueryType::Comparison => "comparison",
            QueryType::General => "general",
            QueryType::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for QueryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
