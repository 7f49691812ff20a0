//! Transit public API
//!
//! Fluent entry point for pooled HTTP/1.1 transports. A transport is a
//! bundle of one client, its connection pool and the reaper that closes
//! idle connections, all sharing one lifecycle.
//!
//! ```no_run
//! use std::time::Duration;
//! use transit::Transit;
//!
//! let bundle = Transit::blocking()
//!     .max_connections(8)
//!     .max_connections_per_route(2)
//!     .connection_timeout(Duration::from_secs(2))
//!     .follow_redirects(false)
//!     .build()?;
//!
//! let response = bundle.client().get("http://localhost:8080/health")?;
//! assert!(response.status().is_success());
//! bundle.shutdown();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]

pub mod builder;

pub use builder::core::TransportBuilder;
pub use builder::state_types::{Blocking, NonBlocking};

pub use transit_client::redirect;
pub use transit_client::{
    AsyncBundle, AsyncClient, BlockingClient, BundleStats, ClientHandle, Config, ConfigError,
    Error, ExecutionModel, HeaderName, HeaderValue, Kind, Method, PoolError, ReaperConfig,
    ReaperState, Request, RequestInterceptor, Response, Result, SetHeader, StatusCode,
    SyncBundle, Uri,
};

/// Main Transit entry point providing static builder methods
#[derive(Debug, Clone, Copy)]
pub struct Transit;

impl Transit {
    /// Builder for a transport whose client blocks the calling thread
    pub fn blocking() -> TransportBuilder<Blocking> {
        TransportBuilder::new()
    }

    /// Builder for a transport whose client returns futures
    ///
    /// ```no_run
    /// use transit::Transit;
    ///
    /// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
    /// let bundle = Transit::non_blocking().io_threads(2).build()?;
    /// let response = bundle.client().get("http://localhost:8080/").await?;
    /// println!("{}", response.status());
    /// # Ok(())
    /// # }
    /// ```
    pub fn non_blocking() -> TransportBuilder<NonBlocking> {
        TransportBuilder::new()
    }

    /// Builder seeded with an existing configuration
    pub fn with_config(config: Config) -> TransportBuilder<Blocking> {
        TransportBuilder::from_config(config)
    }
}
