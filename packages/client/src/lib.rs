//! # Transit client
//!
//! Pooled HTTP/1.1 transport assembly for blocking and async clients.
//!
//! A [`Config`] goes in, a [`ClientBundle`] comes out: a client handle, the
//! route-partitioned [`ConnectionPool`] it leases connections from, and the
//! [`IdleReaper`] that sweeps stale connections out of that pool, all owned
//! and shut down together.
//!
//! ## Features
//!
//! - **Bounded pooling** with a total and a per-route cap, bounded waits and
//!   eviction of idle connections on other routes
//! - **Supervised idle reaping** on a dedicated thread or a runtime task
//! - **Blocking and async clients** sharing one request pipeline
//! - **Redirects, cookies and request interceptors** applied per hop
//! - **Rustls TLS** with the webpki root store and forward proxy support
//!
//! ## Usage
//!
//! ```no_run
//! use transit_client::{Config, build_async};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let bundle = build_async(Config::default().with_follow_redirects(false))?;
//! let response = bundle.client().get("http://example.com/").await?;
//! println!("{} ({} bytes)", response.status(), response.body().len());
//! bundle.shutdown();
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod builder;
pub mod bundle;
pub mod client;
pub mod config;
pub mod connect;
pub mod cookie;
pub mod error;
pub mod interceptor;
pub mod pool;
pub mod reaper;
pub mod redirect;
pub mod telemetry;

pub mod prelude;

pub use crate::prelude::*;
