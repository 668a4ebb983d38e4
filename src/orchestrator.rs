//! # Stage: Request Orchestration
//!
//! ## Responsibility
//! Drive one question through the answer pipeline under a hard wall-clock
//! ceiling:
//! ```text
//! ROUTE ─┬─ FAST_PATH ─────────────────────────────→ RESPOND
//!        └─ CACHE_CHECK ─┬─ hit ───────────────────→ RESPOND
//!                        └─ RETRIEVE → SELECT → GENERATE → RESPOND
//!                             (DEGRADED / FAILED reachable anywhere)
//! ```
//!
//! ## Guarantees
//! - Budgeted: every adapter call is awaited under a deadline from the
//!   request's remaining budget and cancelled (future dropped) on overrun.
//! - Degradable: a stage that overruns produces a partial answer flagged
//!   `degraded: true`, never an unhandled error and never an empty answer.
//! - Failure-isolated: only total upstream unavailability after a retry
//!   surfaces to the caller, as a human-readable error in the response.
//! - Non-cacheable degradation: degraded and failed outcomes are never
//!   written to the cache; fast-path answers bypass the cache entirely.
//!
//! ## NOT Responsible For
//! - Classification and budget math (that belongs to `routing`)
//! - Cache tiering and single-flight (that belongs to `cache`)
//! - Retrieval and generation internals (behind the `adapters` traits)

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::adapters::{AnswerGenerator, DocumentRetriever, RetrievedDocument};
use crate::cache::{self, CacheFacade, Computation};
use crate::config::OrchestratorConfig;
use crate::context::ContextSelector;
use crate::lookup::FastLookupTable;
use crate::memory::SessionMemory;
use crate::metrics::{self, MetricSample};
use crate::routing::{
    BudgetPlanner, ComplexityClassifier, ComplexityTier, RoutingDecision, Stage, TimeBudget,
};
use crate::{OrchestratorError, Query, SessionId};

// ── Degradation policy ─────────────────────────────────────────────────────
// All thresholds are fractions of the total request ceiling, checked through
// the one `TimeBudget::over` query.

/// Skip the optional rerank once this much of the budget is spent.
const RERANK_SKIP_FRAC: f64 = 0.5;

/// Force a reduced context size once this much of the budget is spent.
const REDUCED_CONTEXT_FRAC: f64 = 0.7;

/// Shrink the generation token ceiling once this much of the budget is spent.
const TOKEN_SHRINK_FRAC: f64 = 0.8;

/// Context size never scales below this share of the tier default.
const CONTEXT_FLOOR_FRAC: f64 = 0.25;

/// Token ceiling floor after budget-pressure shrinking.
const MIN_TOKENS: u32 = 64;

/// Longest context extract served as a degraded answer.
const DEGRADED_EXTRACT_CHARS: usize = 600;

/// Marker appended to every degraded answer.
const PARTIAL_NOTE: &str =
    "\n\n[Partial answer: the full response could not be completed within the time budget.]";

/// Served when retrieval produced nothing usable and no stale entry exists.
const NO_SOURCES_NOTE: &str = "Reference material for this question could not be retrieved \
     within the time budget. Please try again, or rephrase the question more specifically.";

/// Served on the failure path so the response is never blank.
const FAILED_NOTE: &str =
    "The answer service is temporarily unavailable. Please try again shortly.";

// ── Request / response contract ────────────────────────────────────────────

/// An incoming question for the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    /// The question text.
    pub question: String,
    /// Conversation this question belongs to, if any.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Optional legal domain filter for retrieval (e.g. `"criminal"`).
    #[serde(default)]
    pub domain: Option<String>,
    /// Whether the client asked for a streamed response. Accepted for
    /// contract compatibility; answers are currently returned whole.
    #[serde(default)]
    pub streaming: bool,
}

impl AskRequest {
    /// Build a plain request with no session, domain, or streaming.
    pub fn question(text: impl Into<String>) -> Self {
        Self {
            question: text.into(),
            session_id: None,
            domain: None,
            streaming: false,
        }
    }
}

/// Wall-clock seconds spent per pipeline stage.
///
/// All three are zero for fast-path and cache-hit responses.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StageTimings {
    /// Seconds spent retrieving documents.
    pub retrieval: f64,
    /// Seconds spent selecting and assembling context.
    pub selection: f64,
    /// Seconds spent generating the answer.
    pub generation: f64,
}

/// The orchestrator's answer to one question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResponse {
    /// The answer text. Non-empty even for degraded and failed outcomes.
    pub answer: String,
    /// Complexity tier the question was routed to.
    pub tier: ComplexityTier,
    /// Lexical shape of the question.
    pub query_type: String,
    /// Whether the answer came from the cache (or a shared in-flight
    /// computation) rather than a fresh pipeline run.
    pub from_cache: bool,
    /// End-to-end latency in seconds.
    pub latency_seconds: f64,
    /// Per-stage wall-clock breakdown.
    pub stage_timings: StageTimings,
    /// Whether a stage overran its budget and the answer is partial.
    pub degraded: bool,
    /// Human-readable failure reason, present only for failed outcomes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Cache payload wrapper, versioned by shape rather than by field.
#[derive(Debug, Serialize, Deserialize)]
struct CachedAnswer {
    answer: String,
}

/// What a pipeline run produced besides the answer text.
#[derive(Debug, Clone, Copy, Default)]
struct PipelineMeta {
    degraded: bool,
    timings: StageTimings,
}

// ── Orchestrator ───────────────────────────────────────────────────────────

/// Per-request state machine tying routing, caching, retrieval, selection,
/// and generation together under one time budget.
///
/// Cheap to share behind an [`Arc`]; each call to [`Orchestrator::ask`] is an
/// independent task touching shared state only through the internally
/// synchronized cache and session memory.
pub struct Orchestrator {
    classifier: ComplexityClassifier,
    planner: BudgetPlanner,
    lookup: FastLookupTable,
    selector: ContextSelector,
    cache: Arc<CacheFacade>,
    memory: Arc<SessionMemory>,
    retriever: Arc<dyn DocumentRetriever>,
    generator: Arc<dyn AnswerGenerator>,
    cache_ttl: Duration,
    retry_backoff: Duration,
}

impl Orchestrator {
    /// Build an orchestrator with default configuration over the given
    /// adapters.
    pub fn new(retriever: Arc<dyn DocumentRetriever>, generator: Arc<dyn AnswerGenerator>) -> Self {
        Self::from_config(&OrchestratorConfig::default(), retriever, generator)
    }

    /// Build an orchestrator from a validated configuration.
    ///
    /// The cache backend is constructed per `config.cache`; a `redis`
    /// backend selection falls back to the in-process store here (the
    /// distributed tier is attached asynchronously via
    /// [`Orchestrator::with_cache`]).
    pub fn from_config(
        config: &OrchestratorConfig,
        retriever: Arc<dyn DocumentRetriever>,
        generator: Arc<dyn AnswerGenerator>,
    ) -> Self {
        let cache = match config.cache.backend {
            crate::config::CacheBackend::Disabled => CacheFacade::disabled(),
            crate::config::CacheBackend::Memory => {
                CacheFacade::new_memory(config.cache.max_entries)
            }
            crate::config::CacheBackend::Redis => {
                warn!("redis cache backend requires an async connect; starting on the in-process tier (attach via with_cache)");
                CacheFacade::new_memory(config.cache.max_entries)
            }
        }
        .with_flight_lease(Duration::from_secs(config.cache.flight_lease_s));

        Self {
            classifier: ComplexityClassifier::new(&config.routing),
            planner: BudgetPlanner::new(config.routing.budgets.clone()),
            lookup: FastLookupTable::with_defaults(),
            selector: ContextSelector::default(),
            cache: Arc::new(cache),
            memory: Arc::new(SessionMemory::new(config.memory.capacity)),
            retriever,
            generator,
            cache_ttl: Duration::from_secs(config.cache.ttl_s),
            retry_backoff: Duration::from_millis(config.adapters.retry_backoff_ms),
        }
    }

    /// Replace the cache facade (e.g. with a redis-backed one).
    pub fn with_cache(mut self, cache: Arc<CacheFacade>) -> Self {
        self.cache = cache;
        self
    }

    /// Replace the fast lookup table.
    pub fn with_lookup(mut self, lookup: FastLookupTable) -> Self {
        self.lookup = lookup;
        self
    }

    /// Replace the context selector.
    pub fn with_selector(mut self, selector: ContextSelector) -> Self {
        self.selector = selector;
        self
    }

    /// Override the answer cache TTL.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// The cache facade, for stats and admin surfaces.
    pub fn cache(&self) -> &CacheFacade {
        &self.cache
    }

    /// The session memory store, for inspection surfaces.
    pub fn memory(&self) -> &SessionMemory {
        &self.memory
    }

    /// Answer one question.
    ///
    /// Infallible by contract: degraded outcomes carry `degraded: true` and
    /// failed outcomes carry `error: Some(reason)`, but a response is always
    /// produced and the answer text is never empty.
    pub async fn ask(&self, request: AskRequest) -> AskResponse {
        let started = Instant::now();
        let request_id = Uuid::new_v4();

        let query = Query::new(
            request.question,
            request.session_id.map(SessionId::new),
            request.domain,
        );
        let decision = self.classifier.classify(&query);

        debug!(
            request_id = %request_id,
            tier = decision.tier.as_str(),
            query_type = decision.query_type.as_str(),
            score = decision.score,
            question_len = query.raw.len(),
            "routed question"
        );

        // FAST_PATH: a recognised definitional shape with a table entry
        // bypasses classification budgets, retrieval, generation, and the
        // cache entirely.
        if let Some(key) = &decision.fast_lookup_key {
            if let Some(answer) = self.lookup.lookup(key) {
                metrics::inc_fast_path();
                let response = self.respond(
                    &query,
                    &decision,
                    answer.to_string(),
                    false,
                    started,
                    PipelineMeta::default(),
                    None,
                );
                info!(
                    request_id = %request_id,
                    tier = decision.tier.as_str(),
                    latency_ms = (response.latency_seconds * 1000.0) as u64,
                    "fast path answer"
                );
                return response;
            }
        }

        // CACHE_CHECK → RETRIEVE → SELECT → GENERATE, all under the
        // single-flight guarantee so concurrent identical questions run the
        // pipeline once.
        let key = cache::cache_key(&query.normalized, query.domain.as_deref(), decision.tier);
        let meta_slot: Arc<Mutex<Option<PipelineMeta>>> = Arc::new(Mutex::new(None));

        let outcome = self
            .cache
            .get_or_compute(&key, self.cache_ttl, decision.tier, || {
                let meta_slot = Arc::clone(&meta_slot);
                let query = &query;
                let decision = &decision;
                let key = key.as_str();
                async move {
                    let (answer, meta) = self.run_pipeline(query, decision, key).await?;
                    let payload = serde_json::to_string(&CachedAnswer { answer })
                        .map_err(|e| OrchestratorError::Other(format!("payload encode: {e}")))?;
                    if let Ok(mut slot) = meta_slot.lock() {
                        *slot = Some(meta);
                    }
                    Ok(Computation {
                        payload,
                        cacheable: !meta.degraded,
                    })
                }
            })
            .await;

        match outcome {
            Ok((payload, from_cache)) => {
                let answer = match serde_json::from_str::<CachedAnswer>(&payload) {
                    Ok(cached) => cached.answer,
                    // Tolerate pre-wrapper payloads written by older builds.
                    Err(_) => payload,
                };
                let meta = meta_slot
                    .lock()
                    .ok()
                    .and_then(|mut slot| slot.take())
                    .unwrap_or_default();

                let response =
                    self.respond(&query, &decision, answer, from_cache, started, meta, None);
                info!(
                    request_id = %request_id,
                    tier = decision.tier.as_str(),
                    from_cache = from_cache,
                    degraded = response.degraded,
                    latency_ms = (response.latency_seconds * 1000.0) as u64,
                    "answer served"
                );
                response
            }
            Err(e) => {
                metrics::inc_error("pipeline", error_kind(&e));
                warn!(
                    request_id = %request_id,
                    tier = decision.tier.as_str(),
                    error = %e,
                    "request failed"
                );
                self.respond(
                    &query,
                    &decision,
                    FAILED_NOTE.to_string(),
                    false,
                    started,
                    PipelineMeta::default(),
                    Some(e.to_string()),
                )
            }
        }
    }

    // ── Pipeline stages ────────────────────────────────────────────────────

    /// RETRIEVE → SELECT → GENERATE under one started budget.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::UpstreamUnavailable`] only when an
    /// adapter stayed unreachable through the retry; every stage-local
    /// overrun is absorbed into a degraded answer instead.
    async fn run_pipeline(
        &self,
        query: &Query,
        decision: &RoutingDecision,
        cache_key: &str,
    ) -> Result<(String, PipelineMeta), OrchestratorError> {
        let budget = self.planner.plan(decision.tier);
        let mut timings = StageTimings::default();
        let mut degraded = false;

        // RETRIEVE
        let stage_start = Instant::now();
        let documents = match self.retrieve(query, &budget).await {
            Ok(docs) => docs,
            Err(OrchestratorError::RetrievalTimeout(deadline)) => {
                metrics::inc_error(Stage::Retrieval.as_str(), "timeout");
                warn!(
                    tier = decision.tier.as_str(),
                    deadline_ms = deadline.as_millis() as u64,
                    "retrieval overran its deadline, continuing without documents"
                );
                degraded = true;
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        timings.retrieval = stage_start.elapsed().as_secs_f64();

        // SELECT
        let stage_start = Instant::now();
        let context = self.select(query, documents, &budget);
        timings.selection = stage_start.elapsed().as_secs_f64();

        // GENERATE
        let stage_start = Instant::now();
        let (answer, generation_degraded) = if context.is_empty() {
            // Candidates either never arrived or never existed; serve the
            // best partial answer available rather than generating blind.
            (self.degraded_answer(cache_key, None), true)
        } else {
            match self.generate(query, &context.text, &budget).await {
                Ok(text) => (text, false),
                Err(OrchestratorError::GenerationTimeout(deadline)) => {
                    metrics::inc_error(Stage::Generation.as_str(), "timeout");
                    warn!(
                        tier = decision.tier.as_str(),
                        deadline_ms = deadline.as_millis() as u64,
                        "generation overran its deadline, serving partial answer"
                    );
                    (self.degraded_answer(cache_key, Some(&context.text)), true)
                }
                Err(e) => return Err(e),
            }
        };
        timings.generation = stage_start.elapsed().as_secs_f64();
        degraded = degraded || generation_degraded;

        Ok((answer, PipelineMeta { degraded, timings }))
    }

    /// Retrieval with deadline enforcement and a single backoff retry on
    /// upstream unavailability.
    async fn retrieve(
        &self,
        query: &Query,
        budget: &TimeBudget,
    ) -> Result<Vec<RetrievedDocument>, OrchestratorError> {
        let deadline = budget.remaining(Stage::Retrieval);
        if deadline.is_zero() {
            return Err(OrchestratorError::RetrievalTimeout(deadline));
        }

        let call = self.retriever.retrieve(
            &query.normalized,
            budget.document_count(),
            query.domain.as_deref(),
            deadline,
        );
        match tokio::time::timeout(deadline, call).await {
            Ok(Ok(docs)) => Ok(docs),
            Ok(Err(OrchestratorError::UpstreamUnavailable(reason))) => {
                metrics::inc_error(Stage::Retrieval.as_str(), "unavailable");
                warn!(error = %reason, "retrieval backend unreachable, retrying once");
                tokio::time::sleep(self.retry_backoff).await;

                let deadline = budget.remaining(Stage::Retrieval);
                if deadline.is_zero() {
                    return Err(OrchestratorError::RetrievalTimeout(deadline));
                }
                let retry = self.retriever.retrieve(
                    &query.normalized,
                    budget.document_count(),
                    query.domain.as_deref(),
                    deadline,
                );
                match tokio::time::timeout(deadline, retry).await {
                    Ok(result) => result,
                    Err(_) => Err(OrchestratorError::RetrievalTimeout(deadline)),
                }
            }
            Ok(Err(e)) => Err(e),
            // The outer timeout cancels the in-flight call by dropping it.
            Err(_) => Err(OrchestratorError::RetrievalTimeout(deadline)),
        }
    }

    /// Context selection with budget-pressure policy applied.
    fn select(
        &self,
        query: &Query,
        mut documents: Vec<RetrievedDocument>,
        budget: &TimeBudget,
    ) -> crate::context::Context {
        if documents.is_empty() {
            return self.selector.select(documents, 1, None);
        }

        if budget.over(RERANK_SKIP_FRAC) {
            debug!(
                elapsed_frac = budget.elapsed_frac(),
                "over half the budget spent, skipping rerank"
            );
        } else {
            self.selector.rerank(&query.normalized, &mut documents);
        }

        // Context shrinks as the budget drains: proportional scaling with a
        // floor, then a forced halving past the reduced-context threshold.
        let remaining_frac = (1.0 - budget.elapsed_frac()).clamp(CONTEXT_FLOOR_FRAC, 1.0);
        let mut char_budget = (budget.context_chars() as f64 * remaining_frac) as usize;
        if budget.over(REDUCED_CONTEXT_FRAC) {
            char_budget /= 2;
            debug!(
                char_budget = char_budget,
                "over 70% of the budget spent, forcing reduced context"
            );
        }

        let session_context = query
            .session
            .as_ref()
            .and_then(|s| self.memory.recent(s.as_str()))
            .map(|exchange| exchange.as_context());

        self.selector
            .select(documents, char_budget.max(1), session_context.as_deref())
    }

    /// Generation with deadline enforcement, token-ceiling shrinking, and a
    /// single backoff retry on upstream unavailability.
    async fn generate(
        &self,
        query: &Query,
        context: &str,
        budget: &TimeBudget,
    ) -> Result<String, OrchestratorError> {
        let mut max_tokens = budget.max_tokens();
        if budget.over(TOKEN_SHRINK_FRAC) {
            max_tokens = (max_tokens / 2).max(MIN_TOKENS);
            debug!(
                max_tokens = max_tokens,
                "over 80% of the budget spent, shrinking token ceiling"
            );
        }

        let deadline = budget.remaining(Stage::Generation);
        if deadline.is_zero() {
            return Err(OrchestratorError::GenerationTimeout(deadline));
        }

        let call = self
            .generator
            .generate(context, &query.raw, max_tokens, deadline);
        match tokio::time::timeout(deadline, call).await {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(OrchestratorError::UpstreamUnavailable(reason))) => {
                metrics::inc_error(Stage::Generation.as_str(), "unavailable");
                warn!(error = %reason, "generation backend unreachable, retrying once");
                tokio::time::sleep(self.retry_backoff).await;

                let deadline = budget.remaining(Stage::Generation);
                if deadline.is_zero() {
                    return Err(OrchestratorError::GenerationTimeout(deadline));
                }
                let retry = self
                    .generator
                    .generate(context, &query.raw, max_tokens, deadline);
                match tokio::time::timeout(deadline, retry).await {
                    Ok(result) => result,
                    Err(_) => Err(OrchestratorError::GenerationTimeout(deadline)),
                }
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(OrchestratorError::GenerationTimeout(deadline)),
        }
    }

    /// Best available partial answer for the degraded path.
    ///
    /// Preference order: a stale cache entry for the same key, then an
    /// extract of the already-selected context, then a no-sources notice.
    /// Always non-empty, always carrying the partial marker.
    fn degraded_answer(&self, cache_key: &str, context: Option<&str>) -> String {
        if let Some(stale) = self.cache.peek_stale(cache_key) {
            let answer = match serde_json::from_str::<CachedAnswer>(&stale) {
                Ok(cached) => cached.answer,
                Err(_) => stale,
            };
            return format!("{answer}{PARTIAL_NOTE}");
        }

        match context {
            Some(text) if !text.is_empty() => {
                let extract: String = text.chars().take(DEGRADED_EXTRACT_CHARS).collect();
                format!("From the retrieved reference material: {extract}{PARTIAL_NOTE}")
            }
            _ => format!("{NO_SOURCES_NOTE}{PARTIAL_NOTE}"),
        }
    }

    /// RESPOND: record the exchange and the metric sample, assemble the
    /// response.
    #[allow(clippy::too_many_arguments)]
    fn respond(
        &self,
        query: &Query,
        decision: &RoutingDecision,
        answer: String,
        from_cache: bool,
        started: Instant,
        meta: PipelineMeta,
        error: Option<String>,
    ) -> AskResponse {
        let total = started.elapsed();

        if error.is_none() {
            if let Some(session) = &query.session {
                self.memory.append(session.as_str(), &query.raw, &answer);
            }
        }

        metrics::record_sample(&MetricSample {
            tier: decision.tier,
            retrieval: Duration::from_secs_f64(meta.timings.retrieval),
            selection: Duration::from_secs_f64(meta.timings.selection),
            generation: Duration::from_secs_f64(meta.timings.generation),
            cache_hit: from_cache,
            degraded: meta.degraded,
            total,
        });

        AskResponse {
            answer,
            tier: decision.tier,
            query_type: decision.query_type.as_str().to_string(),
            from_cache,
            latency_seconds: total.as_secs_f64(),
            stage_timings: meta.timings,
            degraded: meta.degraded,
            error,
        }
    }
}

/// Stable error-kind label for the error counter.
fn error_kind(e: &OrchestratorError) -> &'static str {
    match e {
        OrchestratorError::ClassificationAmbiguous(_) => "ambiguous",
        OrchestratorError::RetrievalTimeout(_) => "retrieval_timeout",
        OrchestratorError::GenerationTimeout(_) => "generation_timeout",
        OrchestratorError::EmptyContext => "empty_context",
        OrchestratorError::UpstreamUnavailable(_) => "unavailable",
        OrchestratorError::CacheUnavailable(_) => "cache_unavailable",
        OrchestratorError::ConfigError(_) => "config",
        OrchestratorError::Other(_) => "other",
    }
}
