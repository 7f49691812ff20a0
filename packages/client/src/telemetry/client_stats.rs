//! Client statistics tracked with cache-padded atomic counters
//!
//! Each counter sits on its own cache line, so request threads and the
//! engine's I/O workers never contend on a shared line when recording.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crossbeam_utils::CachePadded;
use serde::Serialize;

/// Thread-safe client statistics.
#[derive(Debug)]
pub struct ClientStats {
    /// Requests issued through the client
    pub requests: CachePadded<AtomicU64>,
    /// Requests that produced a response (any status)
    pub successes: CachePadded<AtomicU64>,
    /// Requests that ended in an error
    pub failures: CachePadded<AtomicU64>,
    /// Redirect hops followed
    pub redirects_followed: CachePadded<AtomicU64>,
    /// Connections opened by the client
    pub connections_opened: CachePadded<AtomicU64>,
    /// Leases served from the pool's idle set
    pub connections_reused: CachePadded<AtomicU64>,
    created_at: Instant,
}

impl Default for ClientStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientStats {
    #[must_use]
    pub fn new() -> Self {
        Self {
            requests: CachePadded::new(AtomicU64::new(0)),
            successes: CachePadded::new(AtomicU64::new(0)),
            failures: CachePadded::new(AtomicU64::new(0)),
            redirects_followed: CachePadded::new(AtomicU64::new(0)),
            connections_opened: CachePadded::new(AtomicU64::new(0)),
            connections_reused: CachePadded::new(AtomicU64::new(0)),
            created_at: Instant::now(),
        }
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_outcome<T, E>(&self, outcome: &Result<T, E>) {
        let counter = if outcome.is_ok() {
            &self.successes
        } else {
            &self.failures
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_redirect(&self) {
        self.redirects_followed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connection(&self, reused: bool) {
        let counter = if reused {
            &self.connections_reused
        } else {
            &self.connections_opened
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Share of finished requests that produced a response
    #[must_use]
    pub fn success_ratio(&self) -> f64 {
        let successes = self.successes.load(Ordering::Relaxed);
        let total = successes + self.failures.load(Ordering::Relaxed);
        if total == 0 {
            0.0
        } else {
            // Precision loss acceptable for success rate statistics
            #[allow(clippy::cast_precision_loss)]
            {
                successes as f64 / total as f64
            }
        }
    }

    #[must_use]
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Read every counter at once.
    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> ClientStatsSnapshot {
        ClientStatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            redirects_followed: self.redirects_followed.load(Ordering::Relaxed),
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            connections_reused: self.connections_reused.load(Ordering::Relaxed),
            success_ratio: self.success_ratio(),
            age: self.age(),
        }
    }
}

/// Immutable snapshot of client statistics at a point in time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientStatsSnapshot {
    pub requests: u64,
    pub successes: u64,
    pub failures: u64,
    pub redirects_followed: u64,
    pub connections_opened: u64,
    pub connections_reused: u64,
    pub success_ratio: f64,
    pub age: Duration,
}
