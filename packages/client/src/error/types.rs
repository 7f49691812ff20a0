use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use http::Uri;

use crate::pool::Route;

/// A Result alias where the Err case is `transit_client::Error`.
pub type Result<T> = std::result::Result<T, Error>;

/// Construction-time failure of a client bundle.
///
/// Fatal and non-retryable; the root cause is kept as the error source.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("configuration conflict: {0}")]
    Conflict(String),

    #[error("failed to start the I/O subsystem")]
    IoSubsystem(#[source] std::io::Error),

    #[error("failed to initialize TLS: {0}")]
    Tls(String),

    #[error("failed to start the idle connection reaper")]
    Reaper(#[source] std::io::Error),
}

/// Failure to obtain a pooled connection.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PoolError {
    /// Both caps stayed saturated for the whole wait; transient, callers may back off and retry
    #[error("connection pool exhausted for {route} after waiting {waited:?}")]
    Exhausted { route: Route, waited: Duration },

    /// The pool has been shut down
    #[error("connection pool is closed")]
    Closed,
}

/// Represents errors raised while issuing requests through a bundle.
pub struct Error {
    pub inner: Box<Inner>,
}

pub struct Inner {
    pub kind: Kind,
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub uri: Option<Uri>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Invalid configuration or failed construction
    Config,
    /// No pool slot became available in time
    Pool,
    /// Connection establishment failed
    Connect,
    /// Writing the request or reading the response failed
    Request,
    /// Redirect policy rejected the chain
    Redirect,
    /// Connect or response timeout elapsed
    Timeout,
    /// Response body could not be read
    Body,
    /// A request interceptor failed
    Interceptor,
    /// The bundle, client or pool was already shut down
    Closed,
}

impl Error {
    pub fn new(kind: Kind) -> Error {
        Error {
            inner: Box::new(Inner {
                kind,
                source: None,
                uri: None,
            }),
        }
    }

    #[must_use = "Error builder methods return a new Error and should be used"]
    pub fn with<E: Into<Box<dyn StdError + Send + Sync>>>(mut self, source: E) -> Error {
        self.inner.source = Some(source.into());
        self
    }

    #[must_use]
    pub fn with_uri(mut self, uri: Uri) -> Self {
        self.inner.uri = Some(uri);
        self
    }

    #[must_use]
    pub fn kind(&self) -> Kind {
        self.inner.kind
    }

    /// Get the URI associated with this error, if any
    #[must_use]
    pub fn uri(&self) -> Option<&Uri> {
        self.inner.uri.as_ref()
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut f = f.debug_struct("transit_client::Error");

        f.field("kind", &self.inner.kind);

        if let Some(ref source) = self.inner.source {
            f.field("source", source);
        }

        if let Some(ref uri) = self.inner.uri {
            f.field("uri", uri);
        }

        f.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.inner.kind {
            Kind::Config => "configuration error",
            Kind::Pool => "connection pool error",
            Kind::Connect => "error connecting",
            Kind::Request => "error sending request",
            Kind::Redirect => "error following redirect",
            Kind::Timeout => "operation timed out",
            Kind::Body => "error reading response body",
            Kind::Interceptor => "request interceptor failed",
            Kind::Closed => "transport is shut down",
        };
        f.write_str(prefix)?;
        if let Some(ref uri) = self.inner.uri {
            write!(f, " for {uri}")?;
        }
        if let Some(ref source) = self.inner.source {
            write!(f, ": {source}")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner
            .source
            .as_ref()
            .map(|err| &**err as &(dyn StdError + 'static))
    }
}

impl From<PoolError> for Error {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Closed => Error::new(Kind::Closed).with(err),
            PoolError::Exhausted { .. } => Error::new(Kind::Pool).with(err),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::new(Kind::Config).with(err)
    }
}
