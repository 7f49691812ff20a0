//! Request handling settings: proxy, redirects, cookies and interceptors

use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderName, HeaderValue, Request};
use transit_client::redirect::Policy;
use transit_client::{RequestInterceptor, Result, SetHeader, interceptor_fn};

use super::core::TransportBuilder;
use super::state_types::Model;

impl<M: Model> TransportBuilder<M> {
    /// Send every request through an HTTP forward proxy
    pub fn proxy(mut self, host: impl Into<String>, port: u16) -> Self {
        self.config = self.config.with_proxy(host, port);
        self
    }

    /// Follow 3xx responses that carry a `Location`
    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.config = self.config.with_follow_redirects(follow);
        self
    }

    /// Longest redirect chain followed before failing
    pub fn max_redirects(mut self, max: usize) -> Self {
        self.config = self.config.with_max_redirects(max);
        self
    }

    /// Per-hop redirect decision, still bounded by `max_redirects`
    pub fn redirect_policy(mut self, policy: Policy) -> Self {
        self.config = self.config.with_redirect_policy(policy);
        self
    }

    /// Keep a cookie store on the bundle
    pub fn cookie_management(mut self, enabled: bool) -> Self {
        self.config = self.config.with_cookie_management(enabled);
        self
    }

    /// Default `User-Agent`, only set when a request has none
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config = self.config.with_user_agent(user_agent);
        self
    }

    /// Append an interceptor; interceptors run in the order added, before the built-in ones
    pub fn interceptor<I>(mut self, interceptor: I) -> Self
    where
        I: RequestInterceptor + 'static,
    {
        self.config = self.config.with_interceptor(interceptor);
        self
    }

    /// Append an interceptor that is already shared
    pub fn shared_interceptor(mut self, interceptor: Arc<dyn RequestInterceptor>) -> Self {
        self.config = self.config.with_shared_interceptor(interceptor);
        self
    }

    /// Append a closure as a named interceptor
    ///
    /// # Examples
    ///
    /// ```
    /// use transit::{HeaderValue, Transit};
    ///
    /// let builder = Transit::blocking().interceptor_fn("trace", |req| {
    ///     req.headers_mut().insert("x-trace", HeaderValue::from_static("on"));
    ///     Ok(())
    /// });
    /// assert_eq!(builder.settings().interceptors.len(), 1);
    /// ```
    pub fn interceptor_fn<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Request<Bytes>) -> Result<()> + Send + Sync + 'static,
    {
        self.interceptor(interceptor_fn(name, f))
    }

    /// Set a header on every request, overwriting any existing value
    pub fn header(self, name: HeaderName, value: HeaderValue) -> Self {
        self.interceptor(SetHeader::new(name, value))
    }

    /// Set a header on every request that does not already carry it
    pub fn default_header(self, name: HeaderName, value: HeaderValue) -> Self {
        self.interceptor(SetHeader::if_absent(name, value))
    }
}
