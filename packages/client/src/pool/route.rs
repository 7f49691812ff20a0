//! Route keys partitioning the connection pool

use std::fmt;

use http::Uri;
use http::uri::Scheme as UriScheme;

use crate::config::ProxyConfig;
use crate::error::{self, Result};

/// Transport scheme of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    #[must_use]
    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

/// Destination partition key: scheme, host and port, plus the proxy in use.
///
/// Proxied and direct connections to the same origin never share a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route {
    scheme: Scheme,
    host: String,
    port: u16,
    proxy: Option<ProxyConfig>,
}

impl Route {
    #[must_use]
    pub fn new(scheme: Scheme, host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme,
            host: host.into().to_ascii_lowercase(),
            port,
            proxy: None,
        }
    }

    #[must_use]
    pub fn http(host: impl Into<String>, port: u16) -> Self {
        Self::new(Scheme::Http, host, port)
    }

    #[must_use]
    pub fn https(host: impl Into<String>, port: u16) -> Self {
        Self::new(Scheme::Https, host, port)
    }

    /// Derive the route for an absolute request URI.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the URI has no host or uses a
    /// scheme other than `http` / `https`.
    pub fn from_uri(uri: &Uri) -> Result<Self> {
        let scheme = match uri.scheme() {
            Some(s) if *s == UriScheme::HTTP => Scheme::Http,
            Some(s) if *s == UriScheme::HTTPS => Scheme::Https,
            Some(other) => {
                return Err(
                    error::invalid(format!("unsupported scheme {other:?}")).with_uri(uri.clone())
                );
            }
            None => {
                return Err(error::invalid("request URI must be absolute").with_uri(uri.clone()));
            }
        };
        let host = uri
            .host()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| error::invalid("request URI has no host").with_uri(uri.clone()))?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        let port = uri.port_u16().unwrap_or_else(|| scheme.default_port());
        Ok(Self::new(scheme, host, port))
    }

    /// The same route reached through `proxy`
    #[must_use]
    pub fn via(mut self, proxy: Option<ProxyConfig>) -> Self {
        self.proxy = proxy;
        self
    }

    #[must_use]
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn proxy(&self) -> Option<&ProxyConfig> {
        self.proxy.as_ref()
    }

    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.scheme == Scheme::Https
    }

    /// `host:port` the TCP connection is opened to
    #[must_use]
    pub fn connect_target(&self) -> (&str, u16) {
        match &self.proxy {
            Some(proxy) => (proxy.host.as_str(), proxy.port),
            None => (self.host.as_str(), self.port),
        }
    }

    /// `host:port` of the origin, as used in `CONNECT` and `Host`
    #[must_use]
    pub fn authority(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme.as_str(), self.authority())?;
        if let Some(proxy) = &self.proxy {
            write!(f, " via {proxy}")?;
        }
        Ok(())
    }
}
