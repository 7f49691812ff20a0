//! Assembly of client bundles from a [`Config`]
//!
//! Both execution models go through one path: validate the configuration,
//! build the request pipeline and TLS settings, start the I/O engine, size
//! the pool, wire the client, and only then start the idle reaper. A failure
//! at any step drops everything built so far, so no runtime, pool or reaper
//! thread outlives a failed build.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use crate::bundle::{AsyncBundle, ClientBundle, SyncBundle};
use crate::client::core::ClientCore;
use crate::client::pipeline::Pipeline;
use crate::client::{AsyncClient, BlockingClient, Engine};
use crate::config::Config;
use crate::connect::{Connector, HttpConnection, tls};
use crate::error::ConfigError;
use crate::pool::{ConnectionPool, PoolSettings};
use crate::reaper::IdleReaper;

/// Who drives network I/O for a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ExecutionModel {
    /// Calls block the calling thread until the response is read
    Sync,
    /// Calls are futures; I/O runs on the bundle's worker threads
    Async,
}

/// Builds [`ClientBundle`]s from a configuration.
///
/// # Examples
///
/// ```no_run
/// use transit_client::{ClientBuilder, Config};
///
/// let bundle = ClientBuilder::new(Config::default().with_max_connections(50)).build_sync()?;
/// let response = bundle.client().get("http://example.com/")?;
/// println!("{}", response.status());
/// bundle.shutdown();
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[must_use = "builders do nothing unless you call a build method"]
pub struct ClientBuilder {
    config: Config,
    tls: Option<Arc<rustls::ClientConfig>>,
}

impl ClientBuilder {
    pub fn new(config: Config) -> Self {
        Self { config, tls: None }
    }

    /// Use `tls` instead of the bundled webpki roots.
    pub fn with_tls_config(mut self, tls: Arc<rustls::ClientConfig>) -> Self {
        self.tls = Some(tls);
        self
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Build a bundle whose client blocks the calling thread.
    ///
    /// # Errors
    ///
    /// `ConfigError` for an invalid configuration, a TLS setup failure, an
    /// I/O runtime that cannot start, or a reaper thread that cannot spawn.
    pub fn build_sync(self) -> Result<SyncBundle, ConfigError> {
        let (core, pool, reaper) = self.assemble(ExecutionModel::Sync)?;
        Ok(ClientBundle::new(BlockingClient::new(core), pool, reaper))
    }

    /// Build a bundle whose client runs requests on its own I/O workers.
    ///
    /// # Errors
    ///
    /// Same as [`build_sync`](Self::build_sync).
    pub fn build_async(self) -> Result<AsyncBundle, ConfigError> {
        let (core, pool, reaper) = self.assemble(ExecutionModel::Async)?;
        Ok(ClientBundle::new(AsyncClient::new(core), pool, reaper))
    }

    fn assemble(
        self,
        model: ExecutionModel,
    ) -> Result<(Arc<ClientCore>, Arc<ConnectionPool<HttpConnection>>, IdleReaper), ConfigError> {
        let config = self.config;
        config.validate()?;

        let pipeline = Pipeline::from_config(&config)?;
        let tls = match self.tls {
            Some(tls) => tls,
            None => tls::default_client_config()?,
        };
        let engine = Engine::start(model, config.io_threads)?;

        let pool = Arc::new(ConnectionPool::new(PoolSettings::from_config(&config)));
        let connector = Connector::new(tls, config.connection_timeout, engine.handle().clone());
        let core = Arc::new(ClientCore::new(Arc::clone(&pool), connector, pipeline, engine));

        let reaper = IdleReaper::for_pool(&pool, config.reaper.clone());
        match model {
            ExecutionModel::Sync => {
                if let Err(err) = reaper.start() {
                    error!(error = %err, "idle reaper failed to start, tearing down");
                    pool.close_all();
                    core.close();
                    return Err(ConfigError::Reaper(err));
                }
            }
            ExecutionModel::Async => reaper.start_on(core.engine.handle()),
        }

        info!(
            ?model,
            max_total = config.max_connections_total,
            max_per_route = config.max_connections_per_route,
            follow_redirects = config.follow_redirects,
            cookies = config.cookie_management,
            interceptors = config.interceptors.len(),
            "client bundle built"
        );
        Ok((core, pool, reaper))
    }
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("config", &self.config)
            .field("custom_tls", &self.tls.is_some())
            .finish()
    }
}

/// Build a blocking bundle from `config`.
///
/// # Errors
///
/// See [`ClientBuilder::build_sync`].
pub fn build_sync(config: Config) -> Result<SyncBundle, ConfigError> {
    ClientBuilder::new(config).build_sync()
}

/// Build an async bundle from `config`.
///
/// # Errors
///
/// See [`ClientBuilder::build_async`].
pub fn build_async(config: Config) -> Result<AsyncBundle, ConfigError> {
    ClientBuilder::new(config).build_async()
}
