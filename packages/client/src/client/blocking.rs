//! Blocking client

use std::sync::Arc;

use bytes::Bytes;
use http::{Request, Response};
use tokio::runtime::Handle;

use super::ClientHandle;
use super::core::ClientCore;
use super::pipeline::{Step, copy_request};
use crate::connect::HttpConnection;
use crate::error::{self, Result};
use crate::pool::{ConnectionPool, Route};
use crate::telemetry::ClientStatsSnapshot;

/// Client whose calls block the calling thread until the response is read.
///
/// Safe to share between threads; concurrent callers contend only on the
/// pool. Waiting for a pool slot parks the calling thread, bounded by the
/// connection timeout.
#[derive(Clone)]
pub struct BlockingClient {
    core: Arc<ClientCore>,
}

impl BlockingClient {
    pub(crate) fn new(core: Arc<ClientCore>) -> Self {
        Self { core }
    }

    /// Send `request` and read the whole response, following redirects as
    /// configured.
    ///
    /// # Errors
    ///
    /// - closed error after the bundle shut down
    /// - pool error when no connection slot frees up in time
    /// - request error when called from inside an async runtime
    /// - connect, timeout, redirect or interceptor errors from the exchange
    pub fn execute(&self, request: Request<Bytes>) -> Result<Response<Bytes>> {
        if Handle::try_current().is_ok() {
            return Err(error::request(
                "blocking client called from inside an async runtime; use the async client",
            ));
        }
        self.core.ensure_open()?;
        self.core.stats.record_request();
        let outcome = self.run(request);
        self.core.stats.record_outcome(&outcome);
        outcome
    }

    /// `GET` the given URI.
    ///
    /// # Errors
    ///
    /// As [`execute`](Self::execute), plus an error for an unparsable URI.
    pub fn get(&self, uri: &str) -> Result<Response<Bytes>> {
        let request = Request::get(uri)
            .body(Bytes::new())
            .map_err(error::invalid)?;
        self.execute(request)
    }

    #[must_use]
    pub fn pool(&self) -> &Arc<ConnectionPool<HttpConnection>> {
        &self.core.pool
    }

    fn run(&self, mut request: Request<Bytes>) -> Result<Response<Bytes>> {
        let core = &self.core;
        let mut chain = Vec::new();
        loop {
            let route = core.pipeline.prepare(&mut request)?;
            let response = self.exchange(&route, copy_request(&request))?;
            match core.pipeline.complete(&request, response, &mut chain)? {
                Step::Done(response) => return Ok(response),
                Step::Follow(next) => {
                    core.stats.record_redirect();
                    request = next;
                }
            }
        }
    }

    fn exchange(&self, route: &Route, request: Request<Bytes>) -> Result<Response<Bytes>> {
        let core = &self.core;
        let handle = core.engine.handle();
        let mut lease = core
            .pool
            .acquire(route, |route| handle.block_on(core.connector.connect(route)))?;
        core.record_lease(&lease);

        let uri = request.uri().clone();
        let response = handle.block_on(core.timed(lease.send(request), &uri))?;
        core.finish_lease(lease, &response);
        Ok(response)
    }
}

impl ClientHandle for BlockingClient {
    fn close(&self) {
        self.core.close();
    }

    fn is_closed(&self) -> bool {
        self.core.is_closed()
    }

    fn stats(&self) -> ClientStatsSnapshot {
        self.core.stats()
    }
}

impl std::fmt::Debug for BlockingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingClient")
            .field("closed", &self.core.is_closed())
            .field("redirects", self.core.pipeline.redirect_policy())
            .finish_non_exhaustive()
    }
}
