//! Prometheus metrics and latency summaries for the answer pipeline.
//!
//! ## Usage
//!
//! Call [`init_metrics`] once at process startup. The helper functions
//! (`record_sample`, `inc_error`, …) are no-ops on the Prometheus side if
//! `init_metrics` was never called, so the pipeline is always safe to run —
//! observability simply degrades gracefully.
//!
//! ## Metrics Exposed
//!
//! | Name | Type | Labels |
//! |------|------|--------|
//! | `lexroute_requests_total` | Counter | `tier` |
//! | `lexroute_fast_path_total` | Counter | — |
//! | `lexroute_cache_outcome_total` | Counter | `outcome` |
//! | `lexroute_degraded_total` | Counter | `tier` |
//! | `lexroute_errors_total` | Counter | `stage`, `err_type` |
//! | `lexroute_stage_duration_seconds` | Histogram | `stage`, `tier` |
//! | `lexroute_request_duration_seconds` | Histogram | `tier` |
//!
//! Alongside Prometheus, a bounded in-process sample window feeds the
//! [`report`] read path: p50/p95/p99 latency per tier, cache hit rate, and
//! tier distribution for external reporting.

use crate::routing::{ComplexityTier, Stage};
use crate::OrchestratorError;
use prometheus::{
    Counter, CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

/// Samples kept per tier for the percentile window.
const SAMPLE_WINDOW: usize = 1024;

// ── Internal metrics bundle ────────────────────────────────────────────────

/// All Prometheus metrics for the pipeline, bundled so they can be stored
/// in a single [`OnceLock`] and initialised atomically.
pub struct Metrics {
    /// Prometheus registry that owns all metric descriptors.
    pub registry: Registry,
    /// Requests processed, labelled by tier.
    pub requests_total: CounterVec,
    /// Requests answered from the fast lookup table.
    pub fast_path_total: Counter,
    /// Cache lookups by outcome (`hit` / `miss`).
    pub cache_outcome_total: CounterVec,
    /// Degraded responses, labelled by tier.
    pub degraded_total: CounterVec,
    /// Errors by stage and error type.
    pub errors_total: CounterVec,
    /// Stage latency histogram by stage and tier.
    pub stage_duration: HistogramVec,
    /// End-to-end request latency histogram by tier.
    pub request_duration: HistogramVec,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

/// In-process sample window behind the percentile report.
struct SampleWindow {
    latencies_by_tier: HashMap<ComplexityTier, VecDeque<f64>>,
    requests_by_tier: HashMap<ComplexityTier, u64>,
    cache_hits: u64,
    cache_lookups: u64,
}

fn samples() -> &'static Mutex<SampleWindow> {
    static SAMPLES: OnceLock<Mutex<SampleWindow>> = OnceLock::new();
    SAMPLES.get_or_init(|| {
        Mutex::new(SampleWindow {
            latencies_by_tier: HashMap::new(),
            requests_by_tier: HashMap::new(),
            cache_hits: 0,
            cache_lookups: 0,
        })
    })
}

// ── Initialisation ─────────────────────────────────────────────────────────

/// Initialise all Prometheus metrics and register them with a private
/// registry.
///
/// Calling it a second time is a no-op (returns `Ok(())`).
///
/// # Errors
///
/// Returns [`OrchestratorError::Other`] if metric construction or registry
/// registration fails.
pub fn init_metrics() -> Result<(), OrchestratorError> {
    if METRICS.get().is_some() {
        return Ok(());
    }

    let registry = Registry::new();

    fn register<C: prometheus::core::Collector + Clone + 'static>(
        registry: &Registry,
        collector: C,
    ) -> Result<C, OrchestratorError> {
        registry
            .register(Box::new(collector.clone()))
            .map_err(|e| OrchestratorError::Other(format!("metrics registration failed: {e}")))?;
        Ok(collector)
    }

    let build = |e: prometheus::Error| OrchestratorError::Other(format!("metrics init failed: {e}"));

    let requests_total = register(
        &registry,
        CounterVec::new(
            Opts::new("lexroute_requests_total", "Requests processed"),
            &["tier"],
        )
        .map_err(build)?,
    )?;

    let fast_path_total = register(
        &registry,
        Counter::new(
            "lexroute_fast_path_total",
            "Requests answered from the fast lookup table",
        )
        .map_err(build)?,
    )?;

    let cache_outcome_total = register(
        &registry,
        CounterVec::new(
            Opts::new("lexroute_cache_outcome_total", "Cache lookups by outcome"),
            &["outcome"],
        )
        .map_err(build)?,
    )?;

    let degraded_total = register(
        &registry,
        CounterVec::new(
            Opts::new("lexroute_degraded_total", "Degraded responses"),
            &["tier"],
        )
        .map_err(build)?,
    )?;

    let errors_total = register(
        &registry,
        CounterVec::new(
            Opts::new("lexroute_errors_total", "Errors by stage and type"),
            &["stage", "err_type"],
        )
        .map_err(build)?,
    )?;

    let stage_duration = register(
        &registry,
        HistogramVec::new(
            HistogramOpts::new(
                "lexroute_stage_duration_seconds",
                "Stage processing duration",
            ),
            &["stage", "tier"],
        )
        .map_err(build)?,
    )?;

    let request_duration = register(
        &registry,
        HistogramVec::new(
            HistogramOpts::new(
                "lexroute_request_duration_seconds",
                "End-to-end request duration",
            ),
            &["tier"],
        )
        .map_err(build)?,
    )?;

    // If another thread raced us, the first one wins — both initializations
    // produce identical metric descriptors, so neither outcome is incorrect.
    let _ = METRICS.set(Metrics {
        registry,
        requests_total,
        fast_path_total,
        cache_outcome_total,
        degraded_total,
        errors_total,
        stage_duration,
        request_duration,
    });

    Ok(())
}

fn metrics() -> Option<&'static Metrics> {
    METRICS.get()
}

// ── Sample recording ───────────────────────────────────────────────────────

/// One completed request's measurements, write-once.
#[derive(Debug, Clone)]
pub struct MetricSample {
    /// Tier the request was routed to.
    pub tier: ComplexityTier,
    /// Wall-clock spent in retrieval.
    pub retrieval: Duration,
    /// Wall-clock spent in context selection.
    pub selection: Duration,
    /// Wall-clock spent in generation.
    pub generation: Duration,
    /// Whether the answer came from the cache.
    pub cache_hit: bool,
    /// Whether the response was degraded.
    pub degraded: bool,
    /// End-to-end latency.
    pub total: Duration,
}

/// Record a completed request into Prometheus and the percentile window.
pub fn record_sample(sample: &MetricSample) {
    let tier = sample.tier.as_str();

    if let Some(m) = metrics() {
        if let Ok(c) = m.requests_total.get_metric_with_label_values(&[tier]) {
            c.inc();
        }
        let outcome = if sample.cache_hit { "hit" } else { "miss" };
        if let Ok(c) = m.cache_outcome_total.get_metric_with_label_values(&[outcome]) {
            c.inc();
        }
        if sample.degraded {
            if let Ok(c) = m.degraded_total.get_metric_with_label_values(&[tier]) {
                c.inc();
            }
        }
        for (stage, duration) in [
            (Stage::Retrieval, sample.retrieval),
            (Stage::Selection, sample.selection),
            (Stage::Generation, sample.generation),
        ] {
            if let Ok(h) = m
                .stage_duration
                .get_metric_with_label_values(&[stage.as_str(), tier])
            {
                h.observe(duration.as_secs_f64());
            }
        }
        if let Ok(h) = m.request_duration.get_metric_with_label_values(&[tier]) {
            h.observe(sample.total.as_secs_f64());
        }
    }

    if let Ok(mut window) = samples().lock() {
        let ring = window.latencies_by_tier.entry(sample.tier).or_default();
        ring.push_back(sample.total.as_secs_f64());
        while ring.len() > SAMPLE_WINDOW {
            ring.pop_front();
        }
        *window.requests_by_tier.entry(sample.tier).or_insert(0) += 1;
        window.cache_lookups += 1;
        if sample.cache_hit {
            window.cache_hits += 1;
        }
    }
}

/// Increment the fast-path counter.
pub fn inc_fast_path() {
    if let Some(m) = metrics() {
        m.fast_path_total.inc();
    }
}

/// Increment the error counter for a stage and error type.
pub fn inc_error(stage: &str, err_type: &str) {
    if let Some(m) = metrics() {
        if let Ok(c) = m
            .errors_total
            .get_metric_with_label_values(&[stage, err_type])
        {
            c.inc();
        }
    }
}

// ── Exposition ─────────────────────────────────────────────────────────────

/// Gather and encode all metrics in the Prometheus text exposition format.
///
/// Returns an empty string if metrics have not been initialised or if
/// encoding fails.
pub fn gather_metrics() -> String {
    let Some(m) = metrics() else {
        return String::new();
    };
    let families = m.registry.gather();
    if families.is_empty() {
        return String::new();
    }
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if encoder.encode(&families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

// ── Percentile report ──────────────────────────────────────────────────────

/// Latency percentiles for one tier.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TierLatency {
    /// The tier summarised.
    pub tier: ComplexityTier,
    /// Requests observed for this tier (lifetime count).
    pub requests: u64,
    /// Median latency over the sample window, in seconds.
    pub p50: f64,
    /// 95th percentile latency over the sample window, in seconds.
    pub p95: f64,
    /// 99th percentile latency over the sample window, in seconds.
    pub p99: f64,
}

/// Aggregate report for the external metrics read path.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MetricsReport {
    /// Per-tier latency summaries, ascending tier order.
    pub tiers: Vec<TierLatency>,
    /// Fraction of cache lookups that hit, in `[0.0, 1.0]`.
    pub cache_hit_rate: f64,
    /// Total requests observed.
    pub total_requests: u64,
}

/// Build the aggregate latency/cache report from the sample window.
pub fn report() -> MetricsReport {
    let Ok(window) = samples().lock() else {
        return MetricsReport {
            tiers: Vec::new(),
            cache_hit_rate: 0.0,
            total_requests: 0,
        };
    };

    let mut tiers = Vec::new();
    for tier in ComplexityTier::ALL {
        let Some(ring) = window.latencies_by_tier.get(&tier) else {
            continue;
        };
        if ring.is_empty() {
            continue;
        }
        let mut sorted: Vec<f64> = ring.iter().copied().collect();
        sorted.sort_by(f64::total_cmp);
        tiers.push(TierLatency {
            tier,
            requests: window.requests_by_tier.get(&tier).copied().unwrap_or(0),
            p50: percentile(&sorted, 50.0),
            p95: percentile(&sorted, 95.0),
            p99: percentile(&sorted, 99.0),
        });
    }

    let cache_hit_rate = if window.cache_lookups == 0 {
        0.0
    } else {
        window.cache_hits as f64 / window.cache_lookups as f64
    };

    MetricsReport {
        tiers,
        cache_hit_rate,
        total_requests: window.requests_by_tier.values().sum(),
    }
}

/// Nearest-rank percentile over an ascending-sorted slice.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (p / 100.0 * (sorted.len() - 1) as f64).round() as usize;
    sorted[rank.min(sorted.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(tier: ComplexityTier, total_ms: u64, cache_hit: bool) -> MetricSample {
        MetricSample {
            tier,
            retrieval: Duration::from_millis(total_ms / 4),
            selection: Duration::from_millis(total_ms / 10),
            generation: Duration::from_millis(total_ms / 2),
            cache_hit,
            degraded: false,
            total: Duration::from_millis(total_ms),
        }
    }

    #[test]
    fn test_init_metrics_idempotent() {
        assert!(init_metrics().is_ok());
        assert!(init_metrics().is_ok(), "second call must be a no-op");
    }

    #[test]
    fn test_record_sample_before_init_does_not_panic() {
        record_sample(&sample(ComplexityTier::Simple, 100, false));
    }

    #[test]
    fn test_report_reflects_recorded_samples() {
        let _ = init_metrics();
        for ms in [100, 200, 300] {
            record_sample(&sample(ComplexityTier::Moderate, ms, false));
        }

        let report = report();
        let moderate = report
            .tiers
            .iter()
            .find(|t| t.tier == ComplexityTier::Moderate)
            .expect("moderate tier must appear after samples");
        assert!(moderate.requests >= 3);
        assert!(moderate.p50 > 0.0);
        assert!(moderate.p99 >= moderate.p50);
    }

    #[test]
    fn test_cache_hit_rate_bounded() {
        let _ = init_metrics();
        record_sample(&sample(ComplexityTier::Simple, 50, true));
        record_sample(&sample(ComplexityTier::Simple, 50, false));
        let r = report();
        assert!(r.cache_hit_rate >= 0.0 && r.cache_hit_rate <= 1.0);
    }

    #[test]
    fn test_percentile_nearest_rank() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert!((percentile(&sorted, 50.0) - 3.0).abs() < f64::EPSILON);
        assert!((percentile(&sorted, 100.0) - 5.0).abs() < f64::EPSILON);
        assert!((percentile(&sorted, 0.0) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_percentile_empty_is_zero() {
        assert!(percentile(&[], 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_gather_metrics_valid_utf8() {
        let _ = init_metrics();
        record_sample(&sample(ComplexityTier::Simple, 10, false));
        let output = gather_metrics();
        assert!(std::str::from_utf8(output.as_bytes()).is_ok());
    }

    #[test]
    fn test_inc_error_does_not_panic() {
        let _ = init_metrics();
        inc_error("retrieval", "timeout");
        inc_fast_path();
    }
}
