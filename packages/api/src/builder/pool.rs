//! Pool, timeout and reaper settings

use std::time::Duration;

use transit_client::ReaperConfig;

use super::core::TransportBuilder;
use super::state_types::Model;

impl<M: Model> TransportBuilder<M> {
    /// Cap on connections across every route
    pub fn max_connections(mut self, total: usize) -> Self {
        self.config = self.config.with_max_connections(total);
        self
    }

    /// Cap on connections to a single route
    pub fn max_connections_per_route(mut self, per_route: usize) -> Self {
        self.config = self.config.with_max_connections_per_route(per_route);
        self
    }

    /// Bound connection establishment and the wait for a pool slot
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use transit::Transit;
    ///
    /// let builder = Transit::blocking().connection_timeout(Duration::from_millis(100));
    /// assert_eq!(builder.settings().connection_timeout, Some(Duration::from_millis(100)));
    /// ```
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_connection_timeout(Some(timeout));
        self
    }

    /// Millisecond form of [`connection_timeout`](Self::connection_timeout); negative means unbounded
    pub fn connection_timeout_ms(mut self, millis: i64) -> Self {
        self.config = self.config.with_connection_timeout_ms(millis);
        self
    }

    /// Remove the connection timeout; pool waits fall back to the wait cap
    pub fn no_connection_timeout(mut self) -> Self {
        self.config = self.config.with_connection_timeout(None);
        self
    }

    /// Bound the wait for a response once the request is written
    pub fn socket_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_socket_timeout(Some(timeout));
        self
    }

    /// Millisecond form of [`socket_timeout`](Self::socket_timeout); negative means unbounded
    pub fn socket_timeout_ms(mut self, millis: i64) -> Self {
        self.config = self.config.with_socket_timeout_ms(millis);
        self
    }

    /// Remove the response timeout
    pub fn no_socket_timeout(mut self) -> Self {
        self.config = self.config.with_socket_timeout(None);
        self
    }

    /// Longest pool wait when the connection timeout is unbounded
    pub fn pool_wait_cap(mut self, cap: Duration) -> Self {
        self.config = self.config.with_pool_wait_cap(cap);
        self
    }

    /// Worker threads of the non-blocking I/O runtime
    pub fn io_threads(mut self, threads: usize) -> Self {
        self.config = self.config.with_io_threads(threads);
        self
    }

    /// Replace the idle reaper settings
    pub fn reaper(mut self, reaper: ReaperConfig) -> Self {
        self.config = self.config.with_reaper(reaper);
        self
    }

    /// How often the reaper sweeps the pool
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        let reaper = self.config.reaper.clone().with_sweep_interval(interval);
        self.config = self.config.with_reaper(reaper);
        self
    }

    /// Idle time after which a pooled connection is closed
    pub fn idle_ttl(mut self, ttl: Duration) -> Self {
        let reaper = self.config.reaper.clone().with_idle_ttl(ttl);
        self.config = self.config.with_reaper(reaper);
        self
    }

    /// Age after which an idle connection is closed regardless of use; `None` disables it
    pub fn max_connection_age(mut self, age: Option<Duration>) -> Self {
        let reaper = self.config.reaper.clone().with_max_connection_age(age);
        self.config = self.config.with_reaper(reaper);
        self
    }
}
