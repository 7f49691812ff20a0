//! Lock-protected bookkeeping of the pool
//!
//! Every count here changes under the pool mutex, so caps are checked and
//! updated in one step and no observer ever sees them exceeded.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use super::route::Route;
use super::{CloseHandle, Poolable};

pub(super) struct IdleEntry<C> {
    pub(super) conn: C,
    pub(super) created_at: Instant,
    pub(super) idle_since: Instant,
    pub(super) expires_at: Option<Instant>,
}

impl<C: Poolable> IdleEntry<C> {
    pub(super) fn is_reusable(&self, now: Instant) -> bool {
        self.conn.is_open() && self.expires_at.is_none_or(|deadline| deadline > now)
    }

    pub(super) fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.idle_since)
    }

    pub(super) fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }
}

pub(super) struct RouteState<C> {
    pub(super) idle: VecDeque<IdleEntry<C>>,
    pub(super) leased: usize,
    pub(super) pending: usize,
}

impl<C> Default for RouteState<C> {
    fn default() -> Self {
        Self {
            idle: VecDeque::new(),
            leased: 0,
            pending: 0,
        }
    }
}

impl<C> RouteState<C> {
    pub(super) fn allocated(&self) -> usize {
        self.idle.len() + self.leased + self.pending
    }
}

pub(super) struct PoolState<C> {
    pub(super) routes: HashMap<Route, RouteState<C>>,
    pub(super) idle: usize,
    pub(super) leased: usize,
    pub(super) pending: usize,
    pub(super) closed: bool,
    pub(super) created: u64,
    pub(super) reused: u64,
    pub(super) discarded: u64,
    /// Close handles of connections currently leased out, by lease id
    leases: HashMap<u64, CloseHandle>,
    next_lease: u64,
}

impl<C: Poolable> PoolState<C> {
    pub(super) fn new() -> Self {
        Self {
            routes: HashMap::new(),
            idle: 0,
            leased: 0,
            pending: 0,
            closed: false,
            created: 0,
            reused: 0,
            discarded: 0,
            leases: HashMap::new(),
            next_lease: 0,
        }
    }

    pub(super) fn allocated(&self) -> usize {
        self.idle + self.leased + self.pending
    }

    pub(super) fn allocated_for(&self, route: &Route) -> usize {
        self.routes.get(route).map_or(0, RouteState::allocated)
    }

    /// Pop the most recently used idle connection of `route` that is still
    /// usable; stale ones met on the way go to `graveyard`.
    pub(super) fn take_idle(
        &mut self,
        route: &Route,
        now: Instant,
        graveyard: &mut Vec<C>,
    ) -> Option<IdleEntry<C>> {
        let bucket = self.routes.get_mut(route)?;
        let mut found = None;
        while let Some(entry) = bucket.idle.pop_back() {
            self.idle -= 1;
            if entry.is_reusable(now) {
                bucket.leased += 1;
                self.leased += 1;
                self.reused += 1;
                found = Some(entry);
                break;
            }
            self.discarded += 1;
            graveyard.push(entry.conn);
        }
        self.prune(route);
        found
    }

    pub(super) fn reserve(&mut self, route: &Route) {
        self.routes.entry(route.clone()).or_default().pending += 1;
        self.pending += 1;
    }

    pub(super) fn fill(&mut self, route: &Route) {
        let bucket = self.routes.entry(route.clone()).or_default();
        bucket.pending = bucket.pending.saturating_sub(1);
        bucket.leased += 1;
        self.pending = self.pending.saturating_sub(1);
        self.leased += 1;
        self.created += 1;
    }

    pub(super) fn cancel(&mut self, route: &Route) {
        if let Some(bucket) = self.routes.get_mut(route) {
            bucket.pending = bucket.pending.saturating_sub(1);
        }
        self.pending = self.pending.saturating_sub(1);
        self.prune(route);
    }

    /// Track a leased connection so a shutdown can close it before it comes back.
    pub(super) fn register_lease(&mut self, handle: CloseHandle) -> u64 {
        let id = self.next_lease;
        self.next_lease += 1;
        self.leases.insert(id, handle);
        id
    }

    /// Returns false when the lease was revoked, meaning its connection is
    /// already closed.
    pub(super) fn end_lease(&mut self, route: &Route, lease: u64) -> bool {
        if let Some(bucket) = self.routes.get_mut(route) {
            bucket.leased = bucket.leased.saturating_sub(1);
        }
        self.leased = self.leased.saturating_sub(1);
        self.prune(route);
        self.leases.remove(&lease).is_some()
    }

    /// Take the close handles of every outstanding lease.
    pub(super) fn revoke_leases(&mut self) -> Vec<CloseHandle> {
        let handles: Vec<CloseHandle> = self.leases.drain().map(|(_, handle)| handle).collect();
        self.discarded += handles.len() as u64;
        handles
    }

    pub(super) fn push_idle(&mut self, route: &Route, entry: IdleEntry<C>) {
        self.routes.entry(route.clone()).or_default().idle.push_back(entry);
        self.idle += 1;
    }

    /// Evict the longest-idle connection of any route other than `except`.
    pub(super) fn evict_oldest_idle(&mut self, except: &Route) -> Option<C> {
        let victim = self
            .routes
            .iter()
            .filter(|(route, bucket)| *route != except && !bucket.idle.is_empty())
            .min_by_key(|(_, bucket)| bucket.idle.front().map(|entry| entry.idle_since))
            .map(|(route, _)| route.clone())?;
        let entry = self.routes.get_mut(&victim)?.idle.pop_front()?;
        self.idle -= 1;
        self.discarded += 1;
        self.prune(&victim);
        Some(entry.conn)
    }

    /// Remove every idle connection matching `doomed`.
    pub(super) fn drain_idle<F>(&mut self, mut doomed: F) -> Vec<C>
    where
        F: FnMut(&IdleEntry<C>) -> bool,
    {
        let mut removed = Vec::new();
        for bucket in self.routes.values_mut() {
            let entries = std::mem::take(&mut bucket.idle);
            for entry in entries {
                if doomed(&entry) {
                    removed.push(entry.conn);
                } else {
                    bucket.idle.push_back(entry);
                }
            }
        }
        self.idle -= removed.len();
        self.discarded += removed.len() as u64;
        self.routes.retain(|_, bucket| bucket.allocated() > 0);
        removed
    }

    fn prune(&mut self, route: &Route) {
        if self.routes.get(route).is_some_and(|bucket| bucket.allocated() == 0) {
            self.routes.remove(route);
        }
    }
}
