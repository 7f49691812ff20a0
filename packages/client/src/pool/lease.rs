//! Leases and reservations handed out by the pool

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::route::Route;
use super::state::IdleEntry;
use super::{ConnectionPool, Poolable};
use crate::error::PoolError;

/// Result of a checkout: a reused connection, or a slot to open a new one in.
pub enum Checkout<C: Poolable> {
    Reused(Pooled<C>),
    Vacant(Reservation<C>),
}

/// A slot counted against both caps while its connection is being opened.
///
/// Dropping an unfilled reservation frees the slot.
pub struct Reservation<C: Poolable> {
    pool: Arc<ConnectionPool<C>>,
    route: Route,
    filled: bool,
}

impl<C: Poolable> Reservation<C> {
    pub(super) fn new(pool: Arc<ConnectionPool<C>>, route: Route) -> Self {
        Self {
            pool,
            route,
            filled: false,
        }
    }

    #[must_use]
    pub fn route(&self) -> &Route {
        &self.route
    }

    /// Turn the reservation into a lease on a freshly opened connection.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::Closed` if the pool shut down while the connection
    /// was being opened; the connection is closed in that case.
    pub fn fill(mut self, conn: C) -> Result<Pooled<C>, PoolError> {
        self.filled = true;
        let pool = Arc::clone(&self.pool);
        let route = self.route.clone();
        let Some(lease) = pool.fill_reservation(&route, &conn) else {
            pool.bury(vec![conn]);
            return Err(PoolError::Closed);
        };
        let now = Instant::now();
        Ok(Pooled {
            conn: Some(conn),
            pool,
            route,
            lease,
            created_at: now,
            expires_at: None,
            reused: false,
        })
    }
}

impl<C: Poolable> Drop for Reservation<C> {
    fn drop(&mut self) {
        if !self.filled {
            self.pool.cancel_reservation(&self.route);
        }
    }
}

impl<C: Poolable> fmt::Debug for Reservation<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reservation")
            .field("route", &self.route)
            .finish_non_exhaustive()
    }
}

/// A connection leased from the pool.
///
/// `release()` hands it back for reuse. Dropping the lease without releasing
/// discards the connection, since its protocol state is unknown.
pub struct Pooled<C: Poolable> {
    conn: Option<C>,
    pool: Arc<ConnectionPool<C>>,
    route: Route,
    lease: u64,
    created_at: Instant,
    expires_at: Option<Instant>,
    reused: bool,
}

impl<C: Poolable> Pooled<C> {
    pub(super) fn reused(
        pool: Arc<ConnectionPool<C>>,
        route: Route,
        lease: u64,
        entry: IdleEntry<C>,
    ) -> Self {
        Self {
            conn: Some(entry.conn),
            pool,
            route,
            lease,
            created_at: entry.created_at,
            expires_at: entry.expires_at,
            reused: true,
        }
    }

    #[must_use]
    pub fn route(&self) -> &Route {
        &self.route
    }

    /// Whether this lease was served from the idle set
    #[must_use]
    pub fn is_reused(&self) -> bool {
        self.reused
    }

    #[must_use]
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// The pool was shut down while this lease was out. Its connection has
    /// been closed through its [`CloseHandle`](super::CloseHandle) and will
    /// not be reused.
    #[must_use]
    pub fn is_revoked(&self) -> bool {
        self.pool.is_closed()
    }

    /// Do not reuse the connection after `keep_alive` from now. A keep-alive
    /// too long to represent leaves the connection without an expiry.
    pub fn keep_alive_for(&mut self, keep_alive: Duration) {
        self.expires_at = Instant::now().checked_add(keep_alive);
    }

    /// Return the connection to the idle set of its route.
    pub fn release(mut self) {
        if let Some(conn) = self.conn.take() {
            let entry = IdleEntry {
                conn,
                created_at: self.created_at,
                idle_since: Instant::now(),
                expires_at: self.expires_at,
            };
            self.pool.give_back(&self.route, self.lease, entry);
        }
    }
}

impl<C: Poolable> Deref for Pooled<C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.conn
            .as_ref()
            .expect("pooled connection is present until the lease ends")
    }
}

impl<C: Poolable> DerefMut for Pooled<C> {
    fn deref_mut(&mut self) -> &mut C {
        self.conn
            .as_mut()
            .expect("pooled connection is present until the lease ends")
    }
}

impl<C: Poolable> Drop for Pooled<C> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.discard(&self.route, self.lease, conn);
        }
    }
}

impl<C: Poolable> fmt::Debug for Pooled<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pooled")
            .field("route", &self.route)
            .field("reused", &self.reused)
            .field("age", &self.age())
            .finish_non_exhaustive()
    }
}
