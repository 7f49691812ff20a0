//! Async client

use std::sync::Arc;

use bytes::Bytes;
use http::{Request, Response};

use super::ClientHandle;
use super::core::ClientCore;
use super::pipeline::{Step, copy_request};
use crate::connect::HttpConnection;
use crate::error::{self, Result};
use crate::pool::{ConnectionPool, Route};
use crate::telemetry::ClientStatsSnapshot;

/// Client whose requests run on the bundle's own I/O runtime.
///
/// `execute` can be awaited from any executor: the request is spawned onto
/// the engine's workers and only its result crosses back.
#[derive(Clone)]
pub struct AsyncClient {
    core: Arc<ClientCore>,
}

impl AsyncClient {
    pub(crate) fn new(core: Arc<ClientCore>) -> Self {
        Self { core }
    }

    /// Send `request` and read the whole response, following redirects as
    /// configured.
    ///
    /// # Errors
    ///
    /// Same as [`BlockingClient::execute`](super::BlockingClient::execute),
    /// except that it can be called from async code. A request cut short by
    /// shutdown fails as closed.
    pub async fn execute(&self, request: Request<Bytes>) -> Result<Response<Bytes>> {
        self.core.ensure_open()?;
        let core = Arc::clone(&self.core);
        let task = self.core.engine.handle().spawn(async move {
            core.stats.record_request();
            let outcome = run(&core, request).await;
            core.stats.record_outcome(&outcome);
            outcome
        });
        match task.await {
            Ok(outcome) => outcome,
            Err(err) if err.is_cancelled() => Err(error::closed()),
            Err(err) => Err(error::request(err)),
        }
    }

    /// `GET` the given URI.
    ///
    /// # Errors
    ///
    /// As [`execute`](Self::execute), plus an error for an unparsable URI.
    pub async fn get(&self, uri: &str) -> Result<Response<Bytes>> {
        let request = Request::get(uri)
            .body(Bytes::new())
            .map_err(error::invalid)?;
        self.execute(request).await
    }

    #[must_use]
    pub fn pool(&self) -> &Arc<ConnectionPool<HttpConnection>> {
        &self.core.pool
    }
}

async fn run(core: &ClientCore, mut request: Request<Bytes>) -> Result<Response<Bytes>> {
    let mut chain = Vec::new();
    loop {
        let route = core.pipeline.prepare(&mut request)?;
        let response = exchange(core, &route, copy_request(&request)).await?;
        match core.pipeline.complete(&request, response, &mut chain)? {
            Step::Done(response) => return Ok(response),
            Step::Follow(next) => {
                core.stats.record_redirect();
                request = next;
            }
        }
    }
}

async fn exchange(core: &ClientCore, route: &Route, request: Request<Bytes>) -> Result<Response<Bytes>> {
    let connector = &core.connector;
    let mut lease = core
        .pool
        .acquire_async(route, |route| async move { connector.connect(&route).await })
        .await?;
    core.record_lease(&lease);

    let uri = request.uri().clone();
    let response = core.timed(lease.send(request), &uri).await?;
    core.finish_lease(lease, &response);
    Ok(response)
}

impl ClientHandle for AsyncClient {
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

impl std::fmt::Debug for AsyncClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncClient")
            .field("closed", &self.core.is_closed())
            .field("redirects", self.core.pipeline.redirect_policy())
            .finish_non_exhaustive()
    }
}
