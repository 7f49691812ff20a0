//! Transport configuration
//!
//! `Config` is the single input to the client builder. It is read-only once
//! handed over: every bundle copies what it needs at build time, so rebuilding
//! with new settings never touches bundles that already exist.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::interceptor::RequestInterceptor;
use crate::redirect::Policy;

pub mod defaults;
pub mod proxy;
pub mod reaper;
pub mod validation;

pub use defaults::ConfigDefaults;
pub use proxy::ProxyConfig;
pub use reaper::ReaperConfig;

/// Settings for one pooled transport.
///
/// Timeouts use `None` as the "unbounded" sentinel.
#[derive(Clone)]
pub struct Config {
    /// Upper bound on leased + idle + connecting connections across all routes
    pub max_connections_total: usize,

    /// Upper bound on leased + idle + connecting connections for a single route
    pub max_connections_per_route: usize,

    /// Bounds both establishing a connection and waiting for a pool slot
    pub connection_timeout: Option<Duration>,

    /// Bounds the wait for a complete response once a request is written
    pub socket_timeout: Option<Duration>,

    /// Forward proxy every request is sent through
    pub proxy: Option<ProxyConfig>,

    /// Follow 3xx responses carrying a `Location`
    pub follow_redirects: bool,

    /// Maximum redirect hops when redirects are followed
    pub max_redirects: usize,

    /// Consulted for every followed hop within `max_redirects`
    pub redirect_policy: Option<Policy>,

    /// Keep a cookie store on the bundle
    pub cookie_management: bool,

    /// Request interceptors, run in order ahead of the built-in ones
    pub interceptors: Vec<Arc<dyn RequestInterceptor>>,

    /// Value of the default `User-Agent` header
    pub user_agent: String,

    /// Worker threads of the non-blocking I/O runtime
    pub io_threads: usize,

    /// Pool wait bound used when `connection_timeout` is unbounded
    pub pool_wait_cap: Duration,

    /// Idle connection reaper settings
    pub reaper: ReaperConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_connections_total: ConfigDefaults::MAX_CONNECTIONS_TOTAL,
            max_connections_per_route: ConfigDefaults::MAX_CONNECTIONS_PER_ROUTE,
            connection_timeout: Some(ConfigDefaults::CONNECTION_TIMEOUT),
            socket_timeout: Some(ConfigDefaults::SOCKET_TIMEOUT),
            proxy: None,
            follow_redirects: true,
            max_redirects: ConfigDefaults::MAX_REDIRECTS,
            redirect_policy: None,
            cookie_management: true,
            interceptors: Vec::new(),
            user_agent: ConfigDefaults::USER_AGENT.to_string(),
            io_threads: ConfigDefaults::IO_THREADS,
            pool_wait_cap: ConfigDefaults::POOL_WAIT_CAP,
            reaper: ReaperConfig::default(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let interceptors: Vec<&str> = self.interceptors.iter().map(|i| i.name()).collect();
        f.debug_struct("Config")
            .field("max_connections_total", &self.max_connections_total)
            .field("max_connections_per_route", &self.max_connections_per_route)
            .field("connection_timeout", &self.connection_timeout)
            .field("socket_timeout", &self.socket_timeout)
            .field("proxy", &self.proxy)
            .field("follow_redirects", &self.follow_redirects)
            .field("max_redirects", &self.max_redirects)
            .field("redirect_policy", &self.redirect_policy)
            .field("cookie_management", &self.cookie_management)
            .field("interceptors", &interceptors)
            .field("user_agent", &self.user_agent)
            .field("io_threads", &self.io_threads)
            .field("pool_wait_cap", &self.pool_wait_cap)
            .field("reaper", &self.reaper)
            .finish()
    }
}

/// Convert a millisecond setting into a timeout; negative values mean unbounded.
#[must_use]
pub fn timeout_from_millis(millis: i64) -> Option<Duration> {
    u64::try_from(millis).ok().map(Duration::from_millis)
}

impl Config {
    /// Set the total connection cap shared by every route
    #[must_use]
    pub fn with_max_connections(mut self, total: usize) -> Self {
        self.max_connections_total = total;
        self
    }

    /// Set the connection cap for each individual route
    #[must_use]
    pub fn with_max_connections_per_route(mut self, per_route: usize) -> Self {
        self.max_connections_per_route = per_route;
        self
    }

    /// Set the connect / pool-wait timeout
    ///
    /// # Examples
    /// ```
    /// use std::time::Duration;
    /// use transit_client::config::Config;
    ///
    /// let config = Config::default().with_connection_timeout(Some(Duration::from_millis(250)));
    /// assert_eq!(config.connection_timeout, Some(Duration::from_millis(250)));
    /// ```
    #[must_use]
    pub fn with_connection_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Millisecond form of [`Config::with_connection_timeout`]; negative means unbounded
    #[must_use]
    pub fn with_connection_timeout_ms(self, millis: i64) -> Self {
        self.with_connection_timeout(timeout_from_millis(millis))
    }

    /// Set the response timeout
    #[must_use]
    pub fn with_socket_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.socket_timeout = timeout;
        self
    }

    /// Millisecond form of [`Config::with_socket_timeout`]; negative means unbounded
    #[must_use]
    pub fn with_socket_timeout_ms(self, millis: i64) -> Self {
        self.with_socket_timeout(timeout_from_millis(millis))
    }

    /// Route every request through a forward proxy
    #[must_use]
    pub fn with_proxy(mut self, host: impl Into<String>, port: u16) -> Self {
        self.proxy = Some(ProxyConfig::new(host, port));
        self
    }

    /// Enable or disable following redirects
    #[must_use]
    pub fn with_follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = follow;
        self
    }

    /// Set the maximum redirect chain length
    #[must_use]
    pub fn with_max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }

    /// Decide per hop whether a redirect is followed, stopped or failed.
    /// Only used while `follow_redirects` is on; `max_redirects` still caps
    /// the chain.
    #[must_use]
    pub fn with_redirect_policy(mut self, policy: Policy) -> Self {
        self.redirect_policy = Some(policy);
        self
    }

    /// Enable or disable the per-bundle cookie store
    #[must_use]
    pub fn with_cookie_management(mut self, enabled: bool) -> Self {
        self.cookie_management = enabled;
        self
    }

    /// Append a request interceptor; interceptors run in the order they were added
    #[must_use]
    pub fn with_interceptor<I>(mut self, interceptor: I) -> Self
    where
        I: RequestInterceptor + 'static,
    {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Append an already shared request interceptor
    #[must_use]
    pub fn with_shared_interceptor(mut self, interceptor: Arc<dyn RequestInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Set the default `User-Agent`
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the number of non-blocking I/O worker threads
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads;
        self
    }

    /// Set the pool wait bound applied when the connection timeout is unbounded
    #[must_use]
    pub fn with_pool_wait_cap(mut self, cap: Duration) -> Self {
        self.pool_wait_cap = cap;
        self
    }

    /// Replace the reaper settings
    #[must_use]
    pub fn with_reaper(mut self, reaper: ReaperConfig) -> Self {
        self.reaper = reaper;
        self
    }

    /// How long `acquire` may wait for a free slot before reporting exhaustion
    #[must_use]
    pub fn pool_wait_timeout(&self) -> Duration {
        self.connection_timeout.unwrap_or(self.pool_wait_cap)
    }
}
