//! Single-flight guard: at most one concurrent computation per key.
//!
//! The first caller for a key becomes the leader and runs the computation;
//! callers arriving while the leader is in flight become followers and wait
//! on a broadcast of the leader's result instead of recomputing. Leadership
//! is a lease, not a lock: every slot carries a deadline, a leader that
//! crashes or is cancelled releases its slot on drop, and followers whose
//! wait outlives the lease fall back to computing themselves. A dead leader
//! can therefore never block a key permanently.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::debug;

/// Monotonic token source distinguishing slot generations.
static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

struct Slot {
    token: u64,
    tx: broadcast::Sender<String>,
    leased_until: Instant,
}

/// Outcome of joining a flight for a key.
pub(crate) enum FlightJoin {
    /// This caller runs the computation and must call
    /// [`FlightGuard::complete`] (or drop the guard on failure).
    Leader(FlightGuard),
    /// Another caller is already computing; wait on the receiver for at
    /// most the given duration (the remaining lease).
    Follower(broadcast::Receiver<String>, Duration),
}

/// Registry of in-flight computations.
pub(crate) struct SingleFlight {
    inflight: Arc<DashMap<String, Slot>>,
    lease: Duration,
}

impl SingleFlight {
    pub(crate) fn new(lease: Duration) -> Self {
        Self {
            inflight: Arc::new(DashMap::new()),
            lease,
        }
    }

    /// Join the flight for `key`, becoming leader or follower.
    ///
    /// An existing slot whose lease has expired is taken over: the stale
    /// leader's waiters are released and the caller becomes the new leader.
    pub(crate) fn join(&self, key: &str) -> FlightJoin {
        let now = Instant::now();
        match self.inflight.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().leased_until <= now {
                    debug!(key = key, "single-flight lease expired, taking over");
                    let (guard, slot) = self.new_slot(key);
                    occupied.insert(slot);
                    FlightJoin::Leader(guard)
                } else {
                    let slot = occupied.get();
                    let wait = slot.leased_until.saturating_duration_since(now);
                    FlightJoin::Follower(slot.tx.subscribe(), wait)
                }
            }
            Entry::Vacant(vacant) => {
                let (guard, slot) = self.new_slot(key);
                vacant.insert(slot);
                FlightJoin::Leader(guard)
            }
        }
    }

    fn new_slot(&self, key: &str) -> (FlightGuard, Slot) {
        let token = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
        let (tx, _) = broadcast::channel(8);
        let slot = Slot {
            token,
            tx: tx.clone(),
            leased_until: Instant::now() + self.lease,
        };
        let guard = FlightGuard {
            key: key.to_string(),
            token,
            inflight: Arc::clone(&self.inflight),
            tx,
            done: false,
        };
        (guard, slot)
    }

    /// Number of in-flight computations (for stats).
    pub(crate) fn in_flight(&self) -> usize {
        self.inflight.len()
    }
}

/// Leadership handle for one in-flight computation.
///
/// Dropping the guard without completing releases the slot, so a failed or
/// cancelled leader never strands its followers; their receiver closes and
/// they compute for themselves.
pub(crate) struct FlightGuard {
    key: String,
    token: u64,
    inflight: Arc<DashMap<String, Slot>>,
    tx: broadcast::Sender<String>,
    done: bool,
}

impl FlightGuard {
    /// Broadcast the result to followers and release the slot.
    pub(crate) fn complete(mut self, value: &str) {
        let _ = self.tx.send(value.to_string());
        self.release();
        self.done = true;
    }

    /// Remove the slot, but only our own generation. A takeover leader may
    /// have replaced the slot while we were still running.
    fn release(&self) {
        self.inflight
            .remove_if(&self.key, |_, slot| slot.token == self.token);
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        if !self.done {
            debug!(key = %self.key, "single-flight leader dropped without result");
            self.release();
        }
    }
}
