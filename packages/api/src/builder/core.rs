//! Core `TransportBuilder` structure and terminal methods

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use transit_client::connect::tls::TlsClientConfig;
use transit_client::{AsyncBundle, ClientBuilder, Config, ConfigError, SyncBundle};

use super::state_types::{Blocking, Model, NonBlocking};

/// Fluent builder for a pooled transport bundle.
///
/// Type parameter `M` tracks the execution model:
/// - `Blocking`: `build()` returns a [`SyncBundle`]
/// - `NonBlocking`: `build()` returns an [`AsyncBundle`]
#[derive(Clone)]
#[must_use = "builders do nothing unless you call build()"]
pub struct TransportBuilder<M = Blocking> {
    /// Settings handed to the client builder
    pub(crate) config: Config,

    /// TLS settings overriding the bundled webpki roots
    pub(crate) tls: Option<Arc<TlsClientConfig>>,

    /// Execution model marker
    pub(crate) model: PhantomData<M>,
}

impl<M: Model> TransportBuilder<M> {
    /// Start from default settings
    pub fn new() -> Self {
        Self::from_config(Config::default())
    }

    /// Start from an existing configuration
    pub fn from_config(config: Config) -> Self {
        Self {
            config,
            tls: None,
            model: PhantomData,
        }
    }

    /// Replace every setting at once; interceptors already added are dropped
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Use custom rustls settings instead of the bundled Mozilla roots
    pub fn tls_config(mut self, tls: Arc<TlsClientConfig>) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Settings accumulated so far
    #[must_use]
    pub fn settings(&self) -> &Config {
        &self.config
    }

    fn client_builder(self) -> ClientBuilder {
        tracing::debug!(
            target: "transit::builder",
            model = ?M::MODEL,
            max_total = self.config.max_connections_total,
            max_per_route = self.config.max_connections_per_route,
            interceptors = self.config.interceptors.len(),
            "building transport bundle"
        );
        let builder = ClientBuilder::new(self.config);
        match self.tls {
            Some(tls) => builder.with_tls_config(tls),
            None => builder,
        }
    }
}

impl<M: Model> Default for TransportBuilder<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportBuilder<Blocking> {
    /// Build a bundle whose client blocks the calling thread.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the settings are inconsistent or the I/O
    /// runtime or reaper thread cannot be started.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use transit::Transit;
    ///
    /// let bundle = Transit::blocking().max_connections(4).build()?;
    /// let response = bundle.client().get("http://localhost:8080/")?;
    /// println!("{}", response.status());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn build(self) -> Result<SyncBundle, ConfigError> {
        self.client_builder().build_sync()
    }

    /// Switch to the non-blocking model, keeping every setting
    pub fn non_blocking(self) -> TransportBuilder<NonBlocking> {
        TransportBuilder {
            config: self.config,
            tls: self.tls,
            model: PhantomData,
        }
    }
}

impl TransportBuilder<NonBlocking> {
    /// Build a bundle whose client runs requests on its own I/O runtime.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the settings are inconsistent or the I/O
    /// runtime cannot be started.
    pub fn build(self) -> Result<AsyncBundle, ConfigError> {
        self.client_builder().build_async()
    }

    /// Switch to the blocking model, keeping every setting
    pub fn blocking(self) -> TransportBuilder<Blocking> {
        TransportBuilder {
            config: self.config,
            tls: self.tls,
            model: PhantomData,
        }
    }
}

impl<M: Model> fmt::Debug for TransportBuilder<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportBuilder")
            .field("model", &M::MODEL)
            .field("config", &self.config)
            .field("custom_tls", &self.tls.is_some())
            .finish()
    }
}
