//! Forward proxy settings

use std::fmt;

use serde::{Deserialize, Serialize};

/// Host and port of a forward HTTP proxy.
///
/// Plain `http` requests are sent to the proxy in absolute form; `https`
/// requests are tunnelled with `CONNECT`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
}

impl ProxyConfig {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
