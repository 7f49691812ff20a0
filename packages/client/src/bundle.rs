//! The owning unit returned by the builder
//!
//! A [`ClientBundle`] owns one client handle, one pool and one reaper. Its
//! shutdown always runs in the same order: stop the reaper, close the pool,
//! close the client. Dropping the bundle shuts it down.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use tracing::info;

use crate::client::{AsyncClient, BlockingClient, ClientHandle};
use crate::connect::HttpConnection;
use crate::pool::{ConnectionPool, PoolStats};
use crate::reaper::{IdleReaper, ReaperStats};
use crate::telemetry::ClientStatsSnapshot;

/// Bundle of a blocking client
pub type SyncBundle = ClientBundle<BlockingClient>;

/// Bundle of an async client
pub type AsyncBundle = ClientBundle<AsyncClient>;

/// Client handle, pool and reaper with one lifecycle.
pub struct ClientBundle<H: ClientHandle> {
    client: H,
    pool: Arc<ConnectionPool<HttpConnection>>,
    reaper: IdleReaper,
    shut_down: AtomicBool,
}

/// Combined statistics of a bundle's parts
#[derive(Debug, Clone, Serialize)]
pub struct BundleStats {
    pub client: ClientStatsSnapshot,
    pub pool: PoolStats,
    pub reaper: ReaperStats,
}

impl<H: ClientHandle> ClientBundle<H> {
    pub(crate) fn new(client: H, pool: Arc<ConnectionPool<HttpConnection>>, reaper: IdleReaper) -> Self {
        Self {
            client,
            pool,
            reaper,
            shut_down: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn client(&self) -> &H {
        &self.client
    }

    #[must_use]
    pub fn pool(&self) -> &Arc<ConnectionPool<HttpConnection>> {
        &self.pool
    }

    #[must_use]
    pub fn reaper(&self) -> &IdleReaper {
        &self.reaper
    }

    #[must_use]
    pub fn stats(&self) -> BundleStats {
        BundleStats {
            client: self.client.stats(),
            pool: self.pool.stats(),
            reaper: self.reaper.stats(),
        }
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Stop the reaper, close the pool, then close the client.
    ///
    /// Only the first call does anything. Never fails: close errors on
    /// individual connections are logged by the pool.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.reaper.stop();
        self.pool.close_all();
        self.client.close();
        info!("client bundle shut down");
    }

    /// [`shutdown`](Self::shutdown), then wait up to `timeout` for the
    /// reaper's sweep loop to exit. Returns whether it did.
    pub fn shutdown_and_wait(&self, timeout: Duration) -> bool {
        self.shutdown();
        self.reaper.stop_and_wait(timeout)
    }
}

impl<H: ClientHandle> Drop for ClientBundle<H> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<H: ClientHandle + std::fmt::Debug> std::fmt::Debug for ClientBundle<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBundle")
            .field("client", &self.client)
            .field("pool", &self.pool.stats())
            .field("reaper", &self.reaper.state())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
