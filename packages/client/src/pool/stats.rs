//! Pool statistics snapshots

use serde::Serialize;

/// Point-in-time view of the whole pool
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Connections handed out to callers
    pub leased: usize,
    /// Connections waiting for reuse
    pub idle: usize,
    /// Slots reserved for connections being opened
    pub pending: usize,
    /// Slots still free under the total cap
    pub available: usize,
    pub max_total: usize,
    pub max_per_route: usize,
    /// Routes currently holding any connection or reservation
    pub routes: usize,
    /// Connections opened over the pool's lifetime
    pub created: u64,
    /// Leases served from the idle set
    pub reused: u64,
    /// Connections closed by the pool (expired, stale, evicted or shut down)
    pub discarded: u64,
    pub closed: bool,
}

impl PoolStats {
    /// Leased, idle and pending connections together
    #[must_use]
    pub fn allocated(&self) -> usize {
        self.leased + self.idle + self.pending
    }
}

/// Point-in-time view of one route
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RouteStats {
    pub leased: usize,
    pub idle: usize,
    pub pending: usize,
    pub max: usize,
}

impl RouteStats {
    #[must_use]
    pub fn allocated(&self) -> usize {
        self.leased + self.idle + self.pending
    }
}

/// Outcome of closing a batch of connections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CloseReport {
    pub closed: usize,
    pub failed: usize,
}

impl CloseReport {
    #[must_use]
    pub fn total(&self) -> usize {
        self.closed + self.failed
    }
}

impl std::ops::Add for CloseReport {
    type Output = CloseReport;

    fn add(self, other: CloseReport) -> CloseReport {
        CloseReport {
            closed: self.closed + other.closed,
            failed: self.failed + other.failed,
        }
    }
}
