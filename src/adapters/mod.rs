//! External collaborator boundaries.
//!
//! Retrieval and generation are consumed as opaque services behind
//! object-safe async traits; their internal scoring and sampling algorithms
//! are not part of this crate's contract. Every call accepts an explicit
//! deadline derived from the request's remaining time budget — the
//! orchestrator additionally wraps each call in `tokio::time::timeout` so a
//! slow backend is cancelled, not merely ignored.
//!
//! HTTP implementations mirror the configured backends; the static/echo
//! implementations serve tests and the demo binary without network
//! dependencies.

pub mod generation;
pub mod retrieval;

use std::sync::Arc;

use crate::config::AdaptersConfig;

// Re-exports for convenience
pub use generation::{AnswerGenerator, EchoGenerator, HttpGenerator};
pub use retrieval::{DocumentRetriever, HttpRetriever, RetrievedDocument, StaticRetriever};

/// Build the HTTP adapter pair from configuration.
///
/// Configured URLs win; otherwise each adapter falls back to its
/// environment variable and compiled default.
pub fn http_adapters(
    config: &AdaptersConfig,
) -> (Arc<dyn DocumentRetriever>, Arc<dyn AnswerGenerator>) {
    let mut retriever = HttpRetriever::new();
    if let Some(url) = &config.retrieval_url {
        retriever = retriever.with_url(url);
    }

    let mut generator = HttpGenerator::new().with_temperature(config.temperature);
    if let Some(url) = &config.generation_url {
        generator = generator.with_url(url);
    }

    (Arc::new(retriever), Arc::new(generator))
}
