//! State shared by both client handles

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use http::{Response, Uri};
use tracing::{debug, info};

use super::engine::Engine;
use super::pipeline::Pipeline;
use crate::connect::{Connector, HttpConnection, KeepAlive};
use crate::error::{self, Result};
use crate::pool::{ConnectionPool, Pooled};
use crate::telemetry::{ClientStats, ClientStatsSnapshot};

pub(crate) struct ClientCore {
    pub(crate) pool: Arc<ConnectionPool<HttpConnection>>,
    pub(crate) connector: Connector,
    pub(crate) pipeline: Pipeline,
    pub(crate) engine: Engine,
    pub(crate) stats: ClientStats,
    closed: AtomicBool,
}

impl ClientCore {
    pub(crate) fn new(
        pool: Arc<ConnectionPool<HttpConnection>>,
        connector: Connector,
        pipeline: Pipeline,
        engine: Engine,
    ) -> Self {
        Self {
            pool,
            connector,
            pipeline,
            engine,
            stats: ClientStats::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(error::closed())
        } else {
            Ok(())
        }
    }

    pub(crate) fn record_lease(&self, lease: &Pooled<HttpConnection>) {
        self.stats.record_connection(lease.is_reused());
    }

    /// Bound `exchange` by the socket timeout.
    pub(crate) async fn timed<F>(&self, exchange: F, uri: &Uri) -> Result<Response<Bytes>>
    where
        F: Future<Output = Result<Response<Bytes>>>,
    {
        match self.pipeline.socket_timeout() {
            Some(limit) => tokio::time::timeout(limit, exchange).await.map_err(|_| {
                error::timeout(format!("no complete response within {limit:?}")).with_uri(uri.clone())
            })?,
            None => exchange.await,
        }
    }

    /// Return the connection for reuse unless the response ruled it out.
    pub(crate) fn finish_lease(&self, mut lease: Pooled<HttpConnection>, response: &Response<Bytes>) {
        match KeepAlive::from_headers(response.headers()) {
            KeepAlive::Close => {
                debug!(route = %lease.route(), "server closed the connection");
                drop(lease);
            }
            KeepAlive::For(keep_alive) => {
                lease.keep_alive_for(keep_alive);
                lease.release();
            }
            KeepAlive::Default => lease.release(),
        }
    }

    pub(crate) fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.engine.shutdown();
        info!(model = ?self.engine.model(), "client closed");
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn stats(&self) -> ClientStatsSnapshot {
        self.stats.snapshot()
    }
}
