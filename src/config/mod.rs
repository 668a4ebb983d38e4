//! # Stage: Declarative Orchestrator Configuration
//!
//! ## Responsibility
//! Parse and validate TOML configuration for the answer pipeline: routing
//! weights and tier budgets, cache backend selection, adapter endpoints,
//! session memory depth, and the feedback queue.
//!
//! ## Guarantees
//! - Deterministic: the same TOML input always produces the same
//!   `OrchestratorConfig`
//! - Validated: all semantic constraints are checked before a config is
//!   accepted (ceilings strictly increasing, stage fractions within budget,
//!   cut points ordered)
//! - Total: an empty file is a valid config; every field has a compiled
//!   default
//! - Schema-exportable: JSON Schema output enables IDE autocomplete
//!
//! ## NOT Responsible For
//! - Building the runtime orchestrator from config (that belongs to
//!   `orchestrator`)
//! - Connecting to cache or adapter backends (construction happens where
//!   the async runtime is available)

pub mod loader;
pub mod validation;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::routing::RoutingConfig;

// ── Default value functions ──────────────────────────────────────────────

/// Default answer cache TTL: 3600 seconds (1 hour).
fn default_ttl_s() -> u64 {
    3_600
}

/// Default in-process cache capacity.
fn default_max_entries() -> usize {
    10_000
}

/// Default redis connection URL.
fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

/// Default single-flight lease: 30 seconds.
fn default_flight_lease_s() -> u64 {
    30
}

/// Default adapter retry backoff: 200ms.
fn default_retry_backoff_ms() -> u64 {
    200
}

/// Default generation sampling temperature.
fn default_temperature() -> f32 {
    0.2
}

/// Default session memory depth: 8 exchanges per conversation.
fn default_memory_capacity() -> usize {
    8
}

/// Default feedback queue depth.
fn default_feedback_capacity() -> usize {
    256
}

// ── Top-level config ─────────────────────────────────────────────────────

/// Root configuration for an orchestrator instance.
///
/// Deserialized from a TOML file and validated before use. Every section
/// and field has a compiled default, so an empty file is a complete
/// configuration.
///
/// # Example
///
/// ```toml
/// [routing]
/// fast_lookup_max_words = 6
///
/// [cache]
/// backend = "memory"
/// ttl_s = 1800
///
/// [adapters]
/// retrieval_url = "http://search.internal:7700"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct OrchestratorConfig {
    /// Classifier weights, tier cut points, and per-tier budgets.
    #[serde(default)]
    pub routing: RoutingConfig,
    /// Answer cache backend and lifetimes.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Retrieval and generation backend endpoints.
    #[serde(default)]
    pub adapters: AdaptersConfig,
    /// Session memory depth.
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Feedback queue sizing.
    #[serde(default)]
    pub feedback: FeedbackConfig,
}

// ── Cache ────────────────────────────────────────────────────────────────

/// Which cache arrangement backs the facade.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    /// In-process tier only.
    #[default]
    Memory,
    /// Distributed redis tier backed by the in-process tier (requires the
    /// `distributed-cache` feature).
    Redis,
    /// No caching: every request computes.
    Disabled,
}

/// Answer cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct CacheConfig {
    /// Backend arrangement.
    #[serde(default)]
    pub backend: CacheBackend,
    /// Entry time-to-live in seconds.
    #[serde(default = "default_ttl_s")]
    pub ttl_s: u64,
    /// Maximum entries held by the in-process tier.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// Redis connection URL, used only by the `redis` backend.
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    /// Seconds a single-flight leader holds its lease before followers
    /// compute for themselves.
    #[serde(default = "default_flight_lease_s")]
    pub flight_lease_s: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            ttl_s: default_ttl_s(),
            max_entries: default_max_entries(),
            redis_url: default_redis_url(),
            flight_lease_s: default_flight_lease_s(),
        }
    }
}

// ── Adapters ─────────────────────────────────────────────────────────────

/// Retrieval and generation backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct AdaptersConfig {
    /// Search service base URL. `None` falls back to the `RETRIEVAL_URL`
    /// environment variable, then the compiled default.
    pub retrieval_url: Option<String>,
    /// Completion server base URL. `None` falls back to the
    /// `GENERATION_URL` environment variable, then the compiled default.
    pub generation_url: Option<String>,
    /// Backoff before the single retry after an unreachable backend, in
    /// milliseconds.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Generation sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for AdaptersConfig {
    fn default() -> Self {
        Self {
            retrieval_url: None,
            generation_url: None,
            retry_backoff_ms: default_retry_backoff_ms(),
            temperature: default_temperature(),
        }
    }
}

// ── Memory ───────────────────────────────────────────────────────────────

/// Session memory configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct MemoryConfig {
    /// Exchanges kept per session; the oldest is evicted first.
    #[serde(default = "default_memory_capacity")]
    pub capacity: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            capacity: default_memory_capacity(),
        }
    }
}

// ── Feedback ─────────────────────────────────────────────────────────────

/// Feedback queue configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct FeedbackConfig {
    /// Pending records held before submissions shed.
    #[serde(default = "default_feedback_capacity")]
    pub queue_capacity: usize,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_feedback_capacity(),
        }
    }
}

/// Export the JSON Schema for [`OrchestratorConfig`].
///
/// Enables IDE autocomplete when editing TOML config files.
///
/// # Errors
///
/// Returns `serde_json::Error` if schema serialization fails.
pub fn export_schema() -> Result<String, serde_json::Error> {
    let schema = schemars::schema_for!(OrchestratorConfig);
    serde_json::to_string_pretty(&schema)
}
