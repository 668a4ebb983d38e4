//! Cache backing stores.
//!
//! The in-process [`MemoryStore`] is always available; the optional
//! [`RedisStore`] (feature `distributed-cache`) is the distributed tier
//! shared across process instances. Entries are owned exclusively by the
//! store: callers never mutate one in place, they write a new entry under
//! the same key.

use dashmap::DashMap;
use std::time::{Duration, SystemTime};
use tracing::debug;

use crate::routing::ComplexityTier;

/// One cached answer with its expiry bookkeeping.
#[derive(Clone)]
pub(crate) struct StoredEntry {
    pub(crate) payload: String,
    pub(crate) created_at: SystemTime,
    pub(crate) expires_at: SystemTime,
    pub(crate) source_tier: ComplexityTier,
}

/// In-process cache tier backed by a concurrent map.
pub(crate) struct MemoryStore {
    entries: DashMap<String, StoredEntry>,
    max_entries: usize,
}

impl MemoryStore {
    pub(crate) fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries,
        }
    }

    /// Get a live entry, removing it if expired.
    pub(crate) fn get(&self, key: &str) -> Option<String> {
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > SystemTime::now() {
                debug!(key = key, "cache hit (memory)");
                return Some(entry.payload.clone());
            }
            drop(entry);
            self.entries.remove(key);
            debug!(key = key, "cache expired (memory)");
        }
        None
    }

    /// Get an entry even if its TTL has lapsed.
    ///
    /// Used by the degraded path, where a stale answer beats no answer.
    pub(crate) fn peek_stale(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|e| {
            let age_secs = e
                .created_at
                .elapsed()
                .map(|d| d.as_secs())
                .unwrap_or_default();
            debug!(
                key = key,
                tier = e.source_tier.as_str(),
                age_secs = age_secs,
                "stale cache read"
            );
            e.payload.clone()
        })
    }

    pub(crate) fn insert(
        &self,
        key: &str,
        payload: &str,
        ttl: Duration,
        source_tier: ComplexityTier,
    ) {
        // Evict if at capacity. Collect the key first to release the
        // DashMap read-guard before calling remove (avoids shard deadlock).
        if self.max_entries > 0 && self.entries.len() >= self.max_entries {
            let evict_key = self.entries.iter().next().map(|e| e.key().clone());
            if let Some(key_to_evict) = evict_key {
                self.entries.remove(&key_to_evict);
            }
        }

        let now = SystemTime::now();
        self.entries.insert(
            key.to_string(),
            StoredEntry {
                payload: payload.to_string(),
                created_at: now,
                expires_at: now + ttl,
                source_tier,
            },
        );
        debug!(key = key, ttl_secs = ttl.as_secs(), "cached (memory)");
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn clear(&self) {
        self.entries.clear();
    }
}

// ── Distributed tier ───────────────────────────────────────────────────

/// Redis-backed distributed cache tier.
#[cfg(feature = "distributed-cache")]
pub(crate) struct RedisStore {
    client: redis::Client,
}

#[cfg(feature = "distributed-cache")]
impl RedisStore {
    /// Connect and verify the server responds to PING.
    pub(crate) async fn connect(url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(url)?;
        let mut conn = client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<()>(&mut conn).await?;
        Ok(Self { client })
    }

    pub(crate) async fn get(&self, key: &str) -> Result<Option<String>, redis::RedisError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("GET").arg(key).query_async(&mut conn).await
    }

    pub(crate) async fn set(
        &self,
        key: &str,
        payload: &str,
        ttl: Duration,
    ) -> Result<(), redis::RedisError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("SETEX")
            .arg(key)
            .arg(ttl.as_secs().max(1))
            .arg(payload)
            .query_async(&mut conn)
            .await
    }
}
