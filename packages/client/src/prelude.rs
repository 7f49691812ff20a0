//! Transit client prelude
//!
//! The types most callers need to build and use a bundle.

pub use crate::builder::{ClientBuilder, ExecutionModel, build_async, build_sync};
pub use crate::bundle::{AsyncBundle, BundleStats, ClientBundle, SyncBundle};
pub use crate::client::{AsyncClient, BlockingClient, ClientHandle};
pub use crate::config::{Config, ConfigDefaults, ProxyConfig, ReaperConfig};
pub use crate::connect::HttpConnection;
pub use crate::error::{ConfigError, Error, Kind, PoolError, Result};
pub use crate::interceptor::{RequestInterceptor, SetHeader, interceptor_fn};
pub use crate::pool::{
    Checkout, CloseHandle, CloseReport, ConnectionPool, PoolSettings, PoolStats, Poolable, Pooled,
    Reservation, Route, RouteStats, Scheme,
};
pub use crate::reaper::{IdleReaper, IdleSweep, ReaperState, ReaperStats, SweepReport};
pub use crate::telemetry::{ClientStats, ClientStatsSnapshot};

pub use ::http::{HeaderMap, HeaderName, HeaderValue, Method, Request, Response, StatusCode, Uri};
pub use bytes::Bytes;
