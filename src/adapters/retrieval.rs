//! Document retrieval boundary.
//!
//! The retrieval engine (vector similarity, keyword search, rerank models)
//! lives outside this crate; [`DocumentRetriever`] is the seam. The HTTP
//! implementation talks to a search service; [`StaticRetriever`] serves a
//! fixed corpus for tests and demos.
//!
//! ## Environment Variables
//!
//! - `RETRIEVAL_URL`: search service base URL (default: http://localhost:7700)

use crate::OrchestratorError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One retrieved document with its relevance score.
///
/// The set of documents is owned by the orchestrator for the duration of a
/// single request and discarded after response assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedDocument {
    /// Corpus identifier for the document.
    pub id: String,
    /// Document text.
    pub text: String,
    /// Relevance score assigned by the retrieval engine, higher is better.
    pub score: f64,
    /// Legal domain the document belongs to, if tagged.
    pub domain: Option<String>,
}

/// Trait for document retrieval backends.
///
/// Implementations must be thread-safe (Send + Sync) for use across tasks.
/// The trait is object-safe to allow dynamic dispatch via
/// `Arc<dyn DocumentRetriever>`.
#[async_trait]
pub trait DocumentRetriever: Send + Sync {
    /// Retrieve up to `count` documents relevant to `query`.
    ///
    /// `domain` optionally filters the corpus; `deadline` is the remaining
    /// retrieval-stage budget and must bound the backend call.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::RetrievalTimeout`] when the deadline elapses,
    /// [`OrchestratorError::UpstreamUnavailable`] when the backend is
    /// unreachable.
    async fn retrieve(
        &self,
        query: &str,
        count: usize,
        domain: Option<&str>,
        deadline: Duration,
    ) -> Result<Vec<RetrievedDocument>, OrchestratorError>;
}

// ============================================================================
// HTTP Retriever
// ============================================================================

/// Search service request payload.
#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    top_k: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    domain: Option<&'a str>,
}

/// Search service response.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    documents: Vec<RetrievedDocument>,
}

/// HTTP retrieval backend.
///
/// Posts `{query, top_k, domain}` to `{url}/search` and expects a ranked
/// `{documents: [...]}` response.
///
/// ## Example
///
/// ```no_run
/// use lexroute::adapters::HttpRetriever;
/// let retriever = HttpRetriever::new().with_url("http://search.internal:7700");
/// ```
pub struct HttpRetriever {
    client: reqwest::Client,
    url: String,
}

impl HttpRetriever {
    /// Create a retriever reading the service URL from `RETRIEVAL_URL`,
    /// defaulting to `http://localhost:7700`.
    pub fn new() -> Self {
        let url =
            std::env::var("RETRIEVAL_URL").unwrap_or_else(|_| "http://localhost:7700".to_string());
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }

    /// Set the service base URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

impl Default for HttpRetriever {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentRetriever for HttpRetriever {
    async fn retrieve(
        &self,
        query: &str,
        count: usize,
        domain: Option<&str>,
        deadline: Duration,
    ) -> Result<Vec<RetrievedDocument>, OrchestratorError> {
        let request = SearchRequest {
            query,
            top_k: count,
            domain,
        };

        let response = self
            .client
            .post(format!("{}/search", self.url))
            .timeout(deadline)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OrchestratorError::RetrievalTimeout(deadline)
                } else {
                    OrchestratorError::UpstreamUnavailable(format!("retrieval request failed: {e}"))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(OrchestratorError::UpstreamUnavailable(format!(
                "retrieval service error {status}: {error_text}"
            )));
        }

        let api_response: SearchResponse = response.json().await.map_err(|e| {
            OrchestratorError::UpstreamUnavailable(format!("failed to parse search response: {e}"))
        })?;

        Ok(api_response.documents)
    }
}

// ============================================================================
// Static Retriever (testing / demo)
// ============================================================================

/// Fixed-corpus retriever for tests and the demo binary.
///
/// Filters its documents by domain, sorts by score, and returns the top
/// `count`. An optional simulated delay exercises deadline handling.
pub struct StaticRetriever {
    documents: Vec<RetrievedDocument>,
    /// Simulated retrieval latency.
    pub delay_ms: u64,
}

impl StaticRetriever {
    /// Create a retriever over the given corpus with no simulated delay.
    pub fn new(documents: Vec<RetrievedDocument>) -> Self {
        Self {
            documents,
            delay_ms: 0,
        }
    }

    /// Set a simulated per-call delay.
    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }
}

#[async_trait]
impl DocumentRetriever for StaticRetriever {
    async fn retrieve(
        &self,
        _query: &str,
        count: usize,
        domain: Option<&str>,
        deadline: Duration,
    ) -> Result<Vec<RetrievedDocument>, OrchestratorError> {
        if self.delay_ms > 0 {
            let delay = Duration::from_millis(self.delay_ms);
            if delay > deadline {
                tokio::time::sleep(deadline).await;
                return Err(OrchestratorError::RetrievalTimeout(deadline));
            }
            tokio::time::sleep(delay).await;
        }

        let mut matched: Vec<RetrievedDocument> = self
            .documents
            .iter()
            .filter(|d| match (domain, &d.domain) {
                (Some(wanted), Some(have)) => wanted == have,
                (Some(_), None) => false,
                (None, _) => true,
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.score.total_cmp(&a.score));
        matched.truncate(count);
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, score: f64, domain: Option<&str>) -> RetrievedDocument {
        RetrievedDocument {
            id: id.to_string(),
            text: format!("text of {id}"),
            score,
            domain: domain.map(String::from),
        }
    }

    #[tokio::test]
    async fn test_static_retriever_returns_top_count_by_score() {
        let retriever = StaticRetriever::new(vec![
            doc("low", 0.2, None),
            doc("high", 0.9, None),
            doc("mid", 0.5, None),
        ]);
        let docs = retriever
            .retrieve("anything", 2, None, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, "high");
        assert_eq!(docs[1].id, "mid");
    }

    #[tokio::test]
    async fn test_static_retriever_domain_filter() {
        let retriever = StaticRetriever::new(vec![
            doc("criminal-1", 0.9, Some("criminal")),
            doc("privacy-1", 0.8, Some("privacy")),
            doc("untagged", 0.7, None),
        ]);
        let docs = retriever
            .retrieve("q", 10, Some("privacy"), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "privacy-1");
    }

    #[tokio::test]
    async fn test_static_retriever_times_out_past_deadline() {
        let retriever = StaticRetriever::new(vec![doc("d", 0.5, None)]).with_delay(200);
        let result = retriever
            .retrieve("q", 1, None, Duration::from_millis(20))
            .await;
        assert!(matches!(
            result,
            Err(OrchestratorError::RetrievalTimeout(_))
        ));
    }

    #[tokio::test]
    async fn test_static_retriever_empty_corpus() {
        let retriever = StaticRetriever::new(Vec::new());
        let docs = retriever
            .retrieve("q", 5, None, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(docs.is_empty());
    }
}
