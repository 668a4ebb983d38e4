//! Answer generation boundary.
//!
//! The text generator is an opaque completion service with a token ceiling
//! and a deadline; [`AnswerGenerator`] is the seam. The HTTP implementation
//! targets a llama.cpp-compatible completion endpoint; [`EchoGenerator`]
//! produces deterministic answers for tests and demos.
//!
//! ## Environment Variables
//!
//! - `GENERATION_URL`: completion server URL (default: http://localhost:8080)

use crate::OrchestratorError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Trait for answer generation backends.
///
/// Implementations must be thread-safe (Send + Sync) for use across tasks.
/// The trait is object-safe to allow dynamic dispatch via
/// `Arc<dyn AnswerGenerator>`.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Generate an answer to `question` grounded in `context`.
    ///
    /// `max_tokens` is the generation ceiling for this call; `deadline` is
    /// the remaining generation-stage budget and must bound the backend
    /// call.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::GenerationTimeout`] when the deadline elapses,
    /// [`OrchestratorError::UpstreamUnavailable`] when the backend is
    /// unreachable.
    async fn generate(
        &self,
        context: &str,
        question: &str,
        max_tokens: u32,
        deadline: Duration,
    ) -> Result<String, OrchestratorError>;
}

// ============================================================================
// HTTP Generator
// ============================================================================

/// Completion server request payload (llama.cpp-compatible).
#[derive(Debug, Serialize)]
struct CompletionRequest {
    prompt: String,
    n_predict: u32,
    temperature: f32,
    stop: Vec<String>,
}

/// Completion server response.
#[derive(Debug, Deserialize)]
struct CompletionResponse {
    content: String,
}

/// HTTP generation backend for llama.cpp-compatible completion servers.
///
/// ## Example
///
/// ```no_run
/// use lexroute::adapters::HttpGenerator;
/// let generator = HttpGenerator::new()
///     .with_url("http://localhost:8080")
///     .with_temperature(0.2);
/// ```
pub struct HttpGenerator {
    client: reqwest::Client,
    url: String,
    temperature: f32,
}

impl HttpGenerator {
    /// Create a generator reading the server URL from `GENERATION_URL`,
    /// defaulting to `http://localhost:8080`.
    pub fn new() -> Self {
        let url =
            std::env::var("GENERATION_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());
        Self {
            client: reqwest::Client::new(),
            url,
            temperature: 0.2,
        }
    }

    /// Set the server base URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Assemble the completion prompt.
    ///
    /// Answer content stays grounded in the supplied context; the template
    /// is deliberately minimal because authoring lives outside this crate.
    fn build_prompt(context: &str, question: &str) -> String {
        format!(
            "You are a legal information assistant. Answer using only the \
             reference material below.\n\n{context}\n\nQuestion: {question}\n\nAnswer:"
        )
    }
}

impl Default for HttpGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnswerGenerator for HttpGenerator {
    async fn generate(
        &self,
        context: &str,
        question: &str,
        max_tokens: u32,
        deadline: Duration,
    ) -> Result<String, OrchestratorError> {
        let request = CompletionRequest {
            prompt: Self::build_prompt(context, question),
            n_predict: max_tokens,
            temperature: self.temperature,
            stop: vec!["Question:".to_string()],
        };

        let response = self
            .client
            .post(format!("{}/completion", self.url))
            .timeout(deadline)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OrchestratorError::GenerationTimeout(deadline)
                } else {
                    OrchestratorError::UpstreamUnavailable(format!(
                        "generation request failed: {e}"
                    ))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(OrchestratorError::UpstreamUnavailable(format!(
                "generation service error {status}: {error_text}"
            )));
        }

        let api_response: CompletionResponse = response.json().await.map_err(|e| {
            OrchestratorError::UpstreamUnavailable(format!(
                "failed to parse completion response: {e}"
            ))
        })?;

        Ok(api_response.content.trim().to_string())
    }
}

// ============================================================================
// Echo Generator (testing / demo)
// ============================================================================

/// Deterministic generator for tests and demos.
///
/// Answers with the head of the supplied context, sized to the token
/// ceiling. An optional simulated delay exercises deadline handling.
pub struct EchoGenerator {
    /// Simulated generation latency.
    pub delay_ms: u64,
}

impl EchoGenerator {
    /// Create an echo generator with no simulated delay.
    pub fn new() -> Self {
        Self { delay_ms: 0 }
    }

    /// Create an echo generator with a simulated per-call delay.
    pub fn with_delay(delay_ms: u64) -> Self {
        Self { delay_ms }
    }
}

impl Default for EchoGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnswerGenerator for EchoGenerator {
    async fn generate(
        &self,
        context: &str,
        question: &str,
        max_tokens: u32,
        deadline: Duration,
    ) -> Result<String, OrchestratorError> {
        if self.delay_ms > 0 {
            let delay = Duration::from_millis(self.delay_ms);
            if delay > deadline {
                tokio::time::sleep(deadline).await;
                return Err(OrchestratorError::GenerationTimeout(deadline));
            }
            tokio::time::sleep(delay).await;
        }

        // Roughly four characters per token keeps the echo answer inside
        // the ceiling a real model would honour.
        let char_budget = (max_tokens as usize).saturating_mul(4);
        let head: String = context.chars().take(char_budget).collect();
        Ok(format!("Regarding \"{question}\": {head}"))
    }
}
