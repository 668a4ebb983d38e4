//! # Stage: Answer Caching
//!
//! ## Responsibility
//! Read/write-through caching of generated answers with an at-most-one
//! concurrent computation guarantee per key. Two tiers back the facade: a
//! distributed store shared across process instances (redis, feature
//! `distributed-cache`) checked first, falling back to an in-process store;
//! writes go to both when available.
//!
//! ## Guarantees
//! - Single-flight: N concurrent `get_or_compute` calls for one key run the
//!   computation exactly once; the rest share the result.
//! - Lease-bounded: a crashed or cancelled computation releases its slot;
//!   no key can be blocked permanently.
//! - Never fatal: if the distributed tier is unreachable the local tier
//!   serves alone; if caching is disabled entirely the facade degrades to
//!   always computing. Cache trouble is logged, never surfaced.
//! - Session-blind keys: the cache key hashes (normalized question, domain,
//!   tier) — identical questions from different conversations share an
//!   entry.
//!
//! ## NOT Responsible For
//! - Deciding what is cacheable (the orchestrator marks degraded results
//!   non-cacheable)
//! - Fast-lookup answers (never cached; they bypass this layer entirely)

mod flight;
mod store;

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;
#[cfg(feature = "distributed-cache")]
use tracing::warn;

use crate::routing::ComplexityTier;
use crate::OrchestratorError;

use flight::{FlightJoin, SingleFlight};
use store::MemoryStore;

#[cfg(feature = "distributed-cache")]
use store::RedisStore;

/// Default lease on an in-flight computation before followers give up and
/// compute for themselves.
const DEFAULT_FLIGHT_LEASE: Duration = Duration::from_secs(30);

/// The result of a cacheable computation.
///
/// `cacheable` is false for degraded answers: they are still returned to
/// the caller (and shared with single-flight followers) but never stored.
#[derive(Debug, Clone)]
pub struct Computation {
    /// Serialized answer payload.
    pub payload: String,
    /// Whether the payload may be written to the cache tiers.
    pub cacheable: bool,
}

/// Compute the cache key for a question.
///
/// Hashes the normalized question text, the selected domain, and the
/// complexity tier. The session id is deliberately excluded so identical
/// questions from different conversations share an entry.
pub fn cache_key(normalized: &str, domain: Option<&str>, tier: ComplexityTier) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    normalized.hash(&mut hasher);
    domain.unwrap_or("").hash(&mut hasher);
    tier.as_str().hash(&mut hasher);
    format!("answer:{:x}", hasher.finish())
}

/// Two-tier answer cache with single-flight computation.
pub struct CacheFacade {
    enabled: bool,
    local: MemoryStore,
    #[cfg(feature = "distributed-cache")]
    remote: Option<RedisStore>,
    flight: SingleFlight,
    hits: AtomicU64,
    misses: AtomicU64,
    shared: AtomicU64,
}

impl CacheFacade {
    /// Create a facade backed by the in-process tier only.
    pub fn new_memory(max_entries: usize) -> Self {
        Self {
            enabled: true,
            local: MemoryStore::new(max_entries),
            #[cfg(feature = "distributed-cache")]
            remote: None,
            flight: SingleFlight::new(DEFAULT_FLIGHT_LEASE),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            shared: AtomicU64::new(0),
        }
    }

    /// Create a facade with both tiers: redis distributed plus in-process.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::CacheUnavailable`] if the redis server
    /// does not answer a PING at startup. Callers typically log the error
    /// and fall back to [`CacheFacade::new_memory`].
    #[cfg(feature = "distributed-cache")]
    pub async fn with_redis(url: &str, max_entries: usize) -> Result<Self, OrchestratorError> {
        let remote = RedisStore::connect(url)
            .await
            .map_err(|e| OrchestratorError::CacheUnavailable(format!("redis connect: {e}")))?;
        let mut facade = Self::new_memory(max_entries);
        facade.remote = Some(remote);
        Ok(facade)
    }

    /// Create an inert facade: every `get_or_compute` call computes.
    pub fn disabled() -> Self {
        let mut facade = Self::new_memory(0);
        facade.enabled = false;
        facade
    }

    /// Override the single-flight lease duration.
    pub fn with_flight_lease(mut self, lease: Duration) -> Self {
        self.flight = SingleFlight::new(lease);
        self
    }

    /// Look up a live entry, distributed tier first.
    pub async fn get(&self, key: &str) -> Option<String> {
        if !self.enabled {
            return None;
        }

        #[cfg(feature = "distributed-cache")]
        if let Some(remote) = &self.remote {
            match remote.get(key).await {
                Ok(Some(payload)) => {
                    debug!(key = key, "cache hit (redis)");
                    return Some(payload);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(key = key, error = %e, "distributed cache read failed, trying local");
                }
            }
        }

        self.local.get(key)
    }

    /// Write an entry to every available tier.
    pub async fn store(&self, key: &str, payload: &str, ttl: Duration, tier: ComplexityTier) {
        if !self.enabled {
            return;
        }

        self.local.insert(key, payload, ttl, tier);

        #[cfg(feature = "distributed-cache")]
        if let Some(remote) = &self.remote {
            if let Err(e) = remote.set(key, payload, ttl).await {
                warn!(key = key, error = %e, "distributed cache write failed");
            }
        }
    }

    /// Read a local entry even if its TTL has lapsed.
    ///
    /// The degraded path prefers a stale answer over none. Only the local
    /// tier is consulted: the distributed tier's TTL has already evicted
    /// the entry by definition.
    pub fn peek_stale(&self, key: &str) -> Option<String> {
        if !self.enabled {
            return None;
        }
        self.local.peek_stale(key)
    }

    /// Get the cached answer for `key`, or run `compute` to produce it.
    ///
    /// Returns the payload plus a flag indicating whether it came from the
    /// cache (or from a concurrent computation) rather than from this
    /// caller's own `compute` invocation.
    ///
    /// Concurrency contract: at most one `compute` runs per key at a time.
    /// Followers wait out the leader's lease and then compute for
    /// themselves, so a stuck leader delays followers but never blocks
    /// them indefinitely.
    ///
    /// # Errors
    ///
    /// Propagates only errors returned by `compute` itself; cache-tier
    /// trouble is absorbed and logged.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        tier: ComplexityTier,
        compute: F,
    ) -> Result<(String, bool), OrchestratorError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Computation, OrchestratorError>>,
    {
        if !self.enabled {
            let computed = compute().await?;
            return Ok((computed.payload, false));
        }

        if let Some(payload) = self.get(key).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok((payload, true));
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        match self.flight.join(key) {
            FlightJoin::Leader(guard) => {
                let computed = compute().await?;
                if computed.cacheable {
                    self.store(key, &computed.payload, ttl, tier).await;
                }
                let payload = computed.payload;
                guard.complete(&payload);
                Ok((payload, false))
            }
            FlightJoin::Follower(mut rx, wait) => {
                self.shared.fetch_add(1, Ordering::Relaxed);
                match tokio::time::timeout(wait, rx.recv()).await {
                    Ok(Ok(payload)) => {
                        debug!(key = key, "shared in-flight computation result");
                        Ok((payload, true))
                    }
                    // Leader failed or the lease lapsed: compute ourselves.
                    Ok(Err(_)) | Err(_) => {
                        debug!(key = key, "in-flight leader lost, computing independently");
                        let computed = compute().await?;
                        if computed.cacheable {
                            self.store(key, &computed.payload, ttl, tier).await;
                        }
                        Ok((computed.payload, false))
                    }
                }
            }
        }
    }

    /// Snapshot of cache counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            local_entries: self.local.len(),
            in_flight: self.flight.in_flight(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            shared: self.shared.load(Ordering::Relaxed),
            backend: self.backend_name(),
        }
    }

    /// Remove every local entry (test and admin use).
    pub fn clear_local(&self) {
        self.local.clear();
    }

    fn backend_name(&self) -> &'static str {
        if !self.enabled {
            return "disabled";
        }
        #[cfg(feature = "distributed-cache")]
        if self.remote.is_some() {
            return "redis+memory";
        }
        "memory"
    }
}

/// Cache counter snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries currently held in the in-process tier.
    pub local_entries: usize,
    /// Computations currently in flight.
    pub in_flight: usize,
    /// Live-entry hits (either tier).
    pub hits: u64,
    /// Misses that led to a computation or a flight join.
    pub misses: u64,
    /// Calls that shared another caller's in-flight result.
    pub shared: u64,
    /// Name of the active backend arrangement.
    pub backend: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn computation(payload: &str) -> Computation {
        Computation {
            payload: payload.to_string(),
            cacheable: true,
        }
    }

    #[tokio::test]
    async fn test_round_trip_before_ttl() {
        let cache = CacheFacade::new_memory(100);
        cache
            .store("k", "answer", Duration::from_secs(60), ComplexityTier::Simple)
            .await;
        assert_eq!(cache.get("k").await, Some("answer".to_string()));
    }

    #[tokio::test]
    async fn test_miss_after_ttl_expiry() {
        let cache = CacheFacade::new_memory(100);
        cache
            .store("k", "answer", Duration::from_millis(20), ComplexityTier::Simple)
            .await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn test_get_or_compute_miss_then_hit() {
        let cache = CacheFacade::new_memory(100);
        let calls = Arc::new(AtomicUsize::new(0));

        for expected_from_cache in [false, true] {
            let calls = Arc::clone(&calls);
            let (payload, from_cache) = cache
                .get_or_compute("k", Duration::from_secs(60), ComplexityTier::Simple, || {
                    let calls = Arc::clone(&calls);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(computation("computed"))
                    }
                })
                .await
                .unwrap();
            assert_eq!(payload, "computed");
            assert_eq!(from_cache, expected_from_cache);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1, "second call must hit");
    }

    #[tokio::test]
    async fn test_single_flight_collapses_concurrent_computes() {
        let cache = Arc::new(CacheFacade::new_memory(100));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute("k", Duration::from_secs(60), ComplexityTier::Simple, || {
                        let calls = Arc::clone(&calls);
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            // Slow compute so the other seven arrive in flight.
                            tokio::time::sleep(Duration::from_millis(100)).await;
                            Ok(computation("slow answer"))
                        }
                    })
                    .await
                    .unwrap()
            }));
        }

        let mut shared_count = 0;
        for handle in handles {
            let (payload, from_cache) = handle.await.unwrap();
            assert_eq!(payload, "slow answer");
            if from_cache {
                shared_count += 1;
            }
        }

        assert_eq!(
            calls.load(Ordering::SeqCst),
            1,
            "exactly one computation must run for a single key"
        );
        assert_eq!(shared_count, 7, "the other callers must share the result");
    }

    #[tokio::test]
    async fn test_failed_leader_does_not_poison_key() {
        let cache = CacheFacade::new_memory(100);

        let result = cache
            .get_or_compute("k", Duration::from_secs(60), ComplexityTier::Simple, || async {
                Err(OrchestratorError::UpstreamUnavailable("backend down".into()))
            })
            .await;
        assert!(result.is_err());

        // The slot must have been released: a later caller leads again.
        let (payload, from_cache) = cache
            .get_or_compute("k", Duration::from_secs(60), ComplexityTier::Simple, || async {
                Ok(computation("recovered"))
            })
            .await
            .unwrap();
        assert_eq!(payload, "recovered");
        assert!(!from_cache);
    }

    #[tokio::test]
    async fn test_non_cacheable_computation_not_stored() {
        let cache = CacheFacade::new_memory(100);
        let (payload, _) = cache
            .get_or_compute("k", Duration::from_secs(60), ComplexityTier::Simple, || async {
                Ok(Computation {
                    payload: "degraded answer".to_string(),
                    cacheable: false,
                })
            })
            .await
            .unwrap();
        assert_eq!(payload, "degraded answer");
        assert_eq!(cache.get("k").await, None, "degraded results must not be cached");
        assert_eq!(cache.stats().local_entries, 0);
    }

    #[tokio::test]
    async fn test_disabled_facade_always_computes() {
        let cache = CacheFacade::disabled();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let calls = Arc::clone(&calls);
            let (_, from_cache) = cache
                .get_or_compute("k", Duration::from_secs(60), ComplexityTier::Simple, || {
                    let calls = Arc::clone(&calls);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(computation("fresh"))
                    }
                })
                .await
                .unwrap();
            assert!(!from_cache);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(cache.stats().backend, "disabled");
    }

    #[tokio::test]
    async fn test_stale_peek_after_expiry() {
        let cache = CacheFacade::new_memory(100);
        cache
            .store("k", "old answer", Duration::ZERO, ComplexityTier::Simple)
            .await;
        assert_eq!(cache.get("k").await, None);
        assert_eq!(cache.peek_stale("k"), Some("old answer".to_string()));
    }

    #[test]
    fn test_cache_key_excludes_session_but_not_domain_or_tier() {
        let base = cache_key("what is bail", None, ComplexityTier::Simple);
        assert_eq!(
            base,
            cache_key("what is bail", None, ComplexityTier::Simple),
            "key must be deterministic"
        );
        assert_ne!(
            base,
            cache_key("what is bail", Some("criminal"), ComplexityTier::Simple)
        );
        assert_ne!(
            base,
            cache_key("what is bail", None, ComplexityTier::Moderate)
        );
    }

    #[tokio::test]
    async fn test_stats_track_hits_and_misses() {
        let cache = CacheFacade::new_memory(100);
        let _ = cache
            .get_or_compute("k", Duration::from_secs(60), ComplexityTier::Simple, || async {
                Ok(computation("v"))
            })
            .await;
        let _ = cache
            .get_or_compute("k", Duration::from_secs(60), ComplexityTier::Simple, || async {
                Ok(computation("v"))
            })
            .await;

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.backend, "memory");
    }
}
