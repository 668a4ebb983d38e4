//! # lexroute
//!
//! A time-budgeted query routing orchestrator for legal question answering.
//!
//! ## Architecture
//!
//! Per-request state machine with a hard wall-clock ceiling on every stage:
//! ```text
//! Question → ROUTE ─┬─ FAST_PATH ───────────────────────────→ RESPOND
//!                   └─ CACHE_CHECK ─┬─ hit ─────────────────→ RESPOND
//!                                   └─ RETRIEVE → SELECT → GENERATE → RESPOND
//!                                        (DEGRADED / FAILED reachable anywhere)
//! ```
//!
//! Each question is classified into one of five complexity tiers; the tier
//! fixes the total time ceiling, the per-stage budget split, the retrieval
//! depth, and the generation token ceiling. Stages that overrun their share
//! of the budget trigger early-termination fallbacks instead of unbounded
//! latency: trivial questions answer in well under a second, complex ones
//! complete within a bounded ceiling.

// ── Lint policy (aerospace-grade) ─────────────────────────────────────────
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(missing_docs)]

use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub mod adapters;
pub mod cache;
pub mod config;
pub mod context;
pub mod feedback;
pub mod lookup;
pub mod memory;
pub mod metrics;
pub mod orchestrator;
pub mod routing;

#[cfg(feature = "web-api")]
pub mod web_api;

// Re-exports for convenience
pub use adapters::{AnswerGenerator, DocumentRetriever, RetrievedDocument};
pub use cache::CacheFacade;
pub use lookup::FastLookupTable;
pub use orchestrator::{AskRequest, AskResponse, Orchestrator, StageTimings};
pub use routing::{ComplexityClassifier, ComplexityTier, QueryType, RoutingDecision};

/// Initialise the global tracing subscriber.
///
/// Reads the `LOG_FORMAT` environment variable to choose output format:
/// - `"json"` — structured JSON output for production log aggregators
/// - anything else (including unset) — human-readable pretty output
///
/// Filter level is controlled by `RUST_LOG` (e.g. `RUST_LOG=info`).
///
/// # Errors
///
/// Returns [`OrchestratorError::Other`] if the global subscriber has already
/// been set (e.g. by a previous call or a test harness).
pub fn init_tracing() -> Result<(), OrchestratorError> {
    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let result = match format.as_str() {
        "json" => tracing_subscriber::fmt()
            .json()
            .with_env_filter(EnvFilter::from_default_env())
            .with_current_span(true)
            .with_span_list(true)
            .try_init(),
        _ => tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init(),
    };

    result.map_err(|e| OrchestratorError::Other(format!("tracing init failed: {e}")))
}

/// Top-level orchestrator errors.
///
/// Every error surface in the answer pipeline maps to a variant here. Stage-
/// local variants (`RetrievalTimeout`, `GenerationTimeout`, `EmptyContext`)
/// are absorbed inside the orchestrator and converted into degradation
/// decisions; only [`OrchestratorError::UpstreamUnavailable`] with no
/// remaining fallback surfaces to callers.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// The classifier could not derive a confident tier for the query.
    ///
    /// Never fatal: the caller defaults to the `simple` tier and proceeds.
    #[error("classification ambiguous: {0}")]
    ClassificationAmbiguous(String),

    /// Document retrieval exceeded its stage deadline.
    ///
    /// Stage-local: triggers the reduced-context / skip-rerank path.
    #[error("retrieval exceeded its {0:?} stage deadline")]
    RetrievalTimeout(std::time::Duration),

    /// Answer generation exceeded its stage deadline.
    ///
    /// Produces a truncated partial answer marked `degraded: true`.
    #[error("generation exceeded its {0:?} stage deadline")]
    GenerationTimeout(std::time::Duration),

    /// Context selection produced no usable context.
    ///
    /// Structurally prevented by the selector's safety fallback; treated as
    /// a generation-style degradation if it occurs anyway.
    #[error("no usable context after selection")]
    EmptyContext,

    /// A retrieval or generation backend is unreachable entirely.
    ///
    /// Retried once with a short backoff, then surfaced as a user-visible
    /// failure with a human-readable reason.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Both cache tiers are unavailable.
    ///
    /// Logged only; the pipeline proceeds as if every request were a miss.
    #[error("cache unavailable: {0}")]
    CacheUnavailable(String),

    /// A configuration value is missing or semantically invalid.
    ///
    /// Returned at construction time so that misconfiguration surfaces
    /// immediately rather than at the first request.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Catch-all for errors that do not fit a specific variant.
    #[error("{0}")]
    Other(String),
}

/// Unique session identifier used as the conversation memory key.
///
/// Sessions group related questions so that follow-ups can see recent
/// exchanges. Deliberately excluded from cache keys: identical questions
/// from different conversations share a cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(
    /// The raw string ID, typically a UUID or client-provided token.
    pub String,
);

impl SessionId {
    /// Create a new [`SessionId`] from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Return the session ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// An incoming legal question, immutable once created.
///
/// Carries both the raw text (echoed in responses, logged by length only)
/// and a normalized form used for classification and cache keying.
#[derive(Debug, Clone)]
pub struct Query {
    /// The question exactly as the client submitted it.
    pub raw: String,
    /// Lowercased, whitespace-collapsed form with trailing punctuation
    /// stripped; the canonical input for classification and cache keys.
    pub normalized: String,
    /// Conversation this question belongs to, if any.
    pub session: Option<SessionId>,
    /// Optional legal domain hint (e.g. `"criminal"`, `"privacy"`) used to
    /// filter retrieval.
    pub domain: Option<String>,
}

impl Query {
    /// Build a query, deriving the normalized form from the raw text.
    pub fn new(raw: impl Into<String>, session: Option<SessionId>, domain: Option<String>) -> Self {
        let raw = raw.into();
        let normalized = normalize(&raw);
        Self {
            raw,
            normalized,
            session,
            domain,
        }
    }

    /// Number of whitespace-delimited words in the normalized text.
    pub fn word_count(&self) -> usize {
        self.normalized.split_whitespace().count()
    }
}

/// Normalize question text for classification and cache keying.
///
/// Lowercases, collapses internal whitespace to single spaces, and strips
/// trailing sentence punctuation so that `"What is FIR?"` and
/// `"what is fir"` key identically.
pub fn normalize(raw: &str) -> String {
    let collapsed = raw
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    collapsed
        .trim_end_matches(['?', '.', '!'])
        .trim()
        .to_string()
}
