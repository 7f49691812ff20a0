//! Route-partitioned connection pool
//!
//! The pool caches reusable connections keyed by [`Route`] and enforces two
//! caps on every acquire: a total cap across all routes and a per-route cap.
//! Leased, idle and in-flight (reserved) connections all count against both.
//!
//! Acquirers, releases and the idle reaper all go through one mutex, held only
//! for bookkeeping. Opening and closing connections always happens outside it,
//! so a slow connect or close never stalls other callers or the reaper.
//!
//! Waiting for a slot is bounded: blocking callers park on a condition
//! variable, async callers on a [`tokio::sync::Notify`], and both give up with
//! [`PoolError::Exhausted`] once the configured wait elapses.

use std::fmt;
use std::future::Future;
use std::io;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{PoolError, Result};

mod lease;
pub mod route;
mod state;
pub mod stats;

pub use lease::{Checkout, Pooled, Reservation};
pub use route::{Route, Scheme};
pub use stats::{CloseReport, PoolStats, RouteStats};

use state::{IdleEntry, PoolState};

/// A transport connection the pool can cache.
pub trait Poolable: Send + 'static {
    /// Whether the connection can still carry a request. Half-closed or
    /// broken connections report `false` and are never handed out again.
    fn is_open(&self) -> bool;

    /// Close the connection.
    fn close(self) -> io::Result<()>;

    /// Handle that closes the connection while it is leased out. The pool
    /// fires it on shutdown; a connection closed this way is dropped, not
    /// closed again, when its lease ends.
    fn close_handle(&self) -> CloseHandle;
}

/// Closes a connection from outside the lease holding it.
#[derive(Clone)]
pub struct CloseHandle(Arc<dyn Fn() -> io::Result<()> + Send + Sync>);

impl CloseHandle {
    pub fn new<F>(close: F) -> Self
    where
        F: Fn() -> io::Result<()> + Send + Sync + 'static,
    {
        Self(Arc::new(close))
    }

    /// Close the connection behind this handle.
    ///
    /// # Errors
    ///
    /// Whatever the connection reports when it fails to close.
    pub fn close(&self) -> io::Result<()> {
        (self.0)()
    }
}

impl fmt::Debug for CloseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloseHandle").finish_non_exhaustive()
    }
}

/// Waits past this are treated as unbounded.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `start + wait`, clamped instead of overflowing for very long waits.
pub(crate) fn deadline_after(start: Instant, wait: Duration) -> Instant {
    start
        .checked_add(wait.min(FAR_FUTURE))
        .unwrap_or(start)
}

/// Sizing of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_total: usize,
    pub max_per_route: usize,
    /// Longest an acquire waits for a free slot
    pub acquire_timeout: Duration,
}

impl PoolSettings {
    #[must_use]
    pub fn new(max_total: usize, max_per_route: usize, acquire_timeout: Duration) -> Self {
        Self {
            max_total,
            max_per_route: max_per_route.min(max_total),
            acquire_timeout,
        }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.max_connections_total,
            config.max_connections_per_route,
            config.pool_wait_timeout(),
        )
    }
}

/// Bounded, route-keyed connection cache.
///
/// Shared as `Arc<ConnectionPool<C>>`; leases keep the pool alive until they
/// are released or dropped.
pub struct ConnectionPool<C: Poolable> {
    settings: PoolSettings,
    state: Mutex<PoolState<C>>,
    available: Condvar,
    notify: Notify,
}

impl<C: Poolable> ConnectionPool<C> {
    #[must_use]
    pub fn new(settings: PoolSettings) -> Self {
        debug!(
            max_total = settings.max_total,
            max_per_route = settings.max_per_route,
            "connection pool created"
        );
        Self {
            settings,
            state: Mutex::new(PoolState::new()),
            available: Condvar::new(),
            notify: Notify::new(),
        }
    }

    #[must_use]
    pub fn settings(&self) -> PoolSettings {
        self.settings
    }

    /// Lease a connection for `route`, opening one with `open` when no idle
    /// connection exists and both caps leave room.
    ///
    /// # Errors
    ///
    /// Fails with a pool-exhausted error when no slot frees up within the
    /// acquire timeout, a closed error after [`close_all`](Self::close_all),
    /// or whatever `open` returns.
    pub fn acquire<F>(self: &Arc<Self>, route: &Route, open: F) -> Result<Pooled<C>>
    where
        F: FnOnce(&Route) -> Result<C>,
    {
        match self.checkout(route)? {
            Checkout::Reused(lease) => Ok(lease),
            Checkout::Vacant(slot) => {
                let conn = open(route)?;
                Ok(slot.fill(conn)?)
            }
        }
    }

    /// Async form of [`acquire`](Self::acquire); waiting never blocks the executor.
    ///
    /// # Errors
    ///
    /// Same as [`acquire`](Self::acquire).
    pub async fn acquire_async<F, Fut>(self: &Arc<Self>, route: &Route, open: F) -> Result<Pooled<C>>
    where
        F: FnOnce(Route) -> Fut,
        Fut: Future<Output = Result<C>>,
    {
        match self.checkout_async(route).await? {
            Checkout::Reused(lease) => Ok(lease),
            Checkout::Vacant(slot) => {
                let conn = open(route.clone()).await?;
                Ok(slot.fill(conn)?)
            }
        }
    }

    /// Return a leased connection to the idle set of its route.
    pub fn release(&self, lease: Pooled<C>) {
        lease.release();
    }

    /// Reuse an idle connection or reserve a slot, blocking the calling thread
    /// up to the acquire timeout while both are impossible.
    ///
    /// # Errors
    ///
    /// `PoolError::Exhausted` when the wait elapses, `PoolError::Closed` once
    /// the pool is shut down (including while waiting).
    pub fn checkout(self: &Arc<Self>, route: &Route) -> std::result::Result<Checkout<C>, PoolError> {
        let started = Instant::now();
        let deadline = deadline_after(started, self.settings.acquire_timeout);
        let mut graveyard = Vec::new();
        let mut state = self.lock();
        let outcome = loop {
            match self.try_checkout(&mut state, route, &mut graveyard) {
                Ok(Some(checkout)) => break Ok(checkout),
                Ok(None) => {}
                Err(err) => break Err(err),
            }
            let now = Instant::now();
            if now >= deadline {
                break Err(self.exhausted(route, started));
            }
            state = match self.available.wait_timeout(state, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        };
        drop(state);
        self.bury(graveyard);
        outcome
    }

    /// Async form of [`checkout`](Self::checkout).
    ///
    /// # Errors
    ///
    /// Same as [`checkout`](Self::checkout).
    pub async fn checkout_async(
        self: &Arc<Self>,
        route: &Route,
    ) -> std::result::Result<Checkout<C>, PoolError> {
        let started = Instant::now();
        let deadline =
            tokio::time::Instant::from_std(deadline_after(started, self.settings.acquire_timeout));
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before looking at the state so a release in between is not missed.
            notified.as_mut().enable();

            let mut graveyard = Vec::new();
            let attempt = {
                let mut state = self.lock();
                self.try_checkout(&mut state, route, &mut graveyard)
            };
            self.bury(graveyard);
            if let Some(checkout) = attempt? {
                return Ok(checkout);
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Err(self.exhausted(route, started));
            }
        }
    }

    /// Close idle connections unused for longer than `ttl`, past their
    /// keep-alive deadline, or no longer open.
    pub fn close_expired(&self, ttl: Duration) -> CloseReport {
        let now = Instant::now();
        let doomed = self
            .lock()
            .drain_idle(|entry| entry.idle_for(now) > ttl || !entry.is_reusable(now));
        self.retire(doomed, "expired")
    }

    /// Close idle connections opened more than `max_age` ago.
    pub fn close_idle_older_than(&self, max_age: Duration) -> CloseReport {
        let now = Instant::now();
        let doomed = self.lock().drain_idle(|entry| entry.age(now) > max_age);
        self.retire(doomed, "aged out")
    }

    /// Shut the pool down. Idle connections are closed, leased ones are closed
    /// through their [`CloseHandle`] without waiting for the lease to end, and
    /// every pending or future acquire fails as closed. Calling it again has
    /// no effect.
    pub fn close_all(&self) {
        let (idle, leased) = {
            let mut state = self.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            (state.drain_idle(|_| true), state.revoke_leases())
        };
        self.signal();
        let idle = self.bury(idle);
        let mut revoked = CloseReport::default();
        for handle in leased {
            match handle.close() {
                Ok(()) => revoked.closed += 1,
                Err(err) => {
                    revoked.failed += 1;
                    warn!(error = %err, "failed to close leased connection");
                }
            }
        }
        let report = idle + revoked;
        info!(
            closed = report.closed,
            failed = report.failed,
            leased = revoked.total(),
            "connection pool closed"
        );
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let state = self.lock();
        PoolStats {
            leased: state.leased,
            idle: state.idle,
            pending: state.pending,
            available: self.settings.max_total.saturating_sub(state.allocated()),
            max_total: self.settings.max_total,
            max_per_route: self.settings.max_per_route,
            routes: state.routes.len(),
            created: state.created,
            reused: state.reused,
            discarded: state.discarded,
            closed: state.closed,
        }
    }

    #[must_use]
    pub fn route_stats(&self, route: &Route) -> RouteStats {
        let state = self.lock();
        let (leased, idle, pending) = state
            .routes
            .get(route)
            .map_or((0, 0, 0), |bucket| (bucket.leased, bucket.idle.len(), bucket.pending));
        RouteStats {
            leased,
            idle,
            pending,
            max: self.settings.max_per_route,
        }
    }

    fn try_checkout(
        self: &Arc<Self>,
        state: &mut PoolState<C>,
        route: &Route,
        graveyard: &mut Vec<C>,
    ) -> std::result::Result<Option<Checkout<C>>, PoolError> {
        if state.closed {
            return Err(PoolError::Closed);
        }

        if let Some(entry) = state.take_idle(route, Instant::now(), graveyard) {
            let lease = state.register_lease(entry.conn.close_handle());
            return Ok(Some(Checkout::Reused(Pooled::reused(
                Arc::clone(self),
                route.clone(),
                lease,
                entry,
            ))));
        }

        if state.allocated_for(route) >= self.settings.max_per_route {
            return Ok(None);
        }
        if state.allocated() >= self.settings.max_total {
            match state.evict_oldest_idle(route) {
                Some(victim) => graveyard.push(victim),
                None => return Ok(None),
            }
        }

        state.reserve(route);
        Ok(Some(Checkout::Vacant(Reservation::new(
            Arc::clone(self),
            route.clone(),
        ))))
    }

    /// Returns the lease id, or `None` when the pool closed while the slot
    /// was reserved.
    fn fill_reservation(&self, route: &Route, conn: &C) -> Option<u64> {
        let mut state = self.lock();
        if state.closed {
            state.cancel(route);
            drop(state);
            self.signal();
            return None;
        }
        state.fill(route);
        Some(state.register_lease(conn.close_handle()))
    }

    fn cancel_reservation(&self, route: &Route) {
        self.lock().cancel(route);
        self.signal();
    }

    fn give_back(&self, route: &Route, lease: u64, entry: IdleEntry<C>) {
        let doomed = {
            let mut state = self.lock();
            if !state.end_lease(route, lease) {
                // Revoked by close_all, which already closed it
                None
            } else if state.closed || !entry.is_reusable(Instant::now()) {
                state.discarded += 1;
                Some(entry.conn)
            } else {
                state.push_idle(route, entry);
                None
            }
        };
        self.signal();
        if let Some(conn) = doomed {
            self.bury(vec![conn]);
        }
    }

    fn discard(&self, route: &Route, lease: u64, conn: C) {
        let live = {
            let mut state = self.lock();
            let live = state.end_lease(route, lease);
            if live {
                state.discarded += 1;
            }
            live
        };
        self.signal();
        if live {
            self.bury(vec![conn]);
        }
    }

    fn retire(&self, doomed: Vec<C>, reason: &str) -> CloseReport {
        if doomed.is_empty() {
            return CloseReport::default();
        }
        self.signal();
        let report = self.bury(doomed);
        debug!(closed = report.closed, failed = report.failed, reason, "closed idle connections");
        report
    }

    /// Close connections already removed from the bookkeeping. A failure is
    /// logged and counted; it never stops the remaining closes.
    fn bury(&self, doomed: Vec<C>) -> CloseReport {
        let mut report = CloseReport::default();
        for conn in doomed {
            match conn.close() {
                Ok(()) => report.closed += 1,
                Err(err) => {
                    report.failed += 1;
                    warn!(error = %err, "failed to close pooled connection");
                }
            }
        }
        report
    }

    fn signal(&self) {
        self.available.notify_all();
        self.notify.notify_waiters();
    }

    fn exhausted(&self, route: &Route, started: Instant) -> PoolError {
        let waited = started.elapsed();
        debug!(%route, ?waited, "connection pool exhausted");
        PoolError::Exhausted {
            route: route.clone(),
            waited,
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolState<C>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: Poolable> std::fmt::Debug for ConnectionPool<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("settings", &self.settings)
            .field("stats", &self.stats())
            .finish()
    }
}
