//! Error classification helpers

use super::types::{Error, Kind, PoolError};

impl Error {
    /// Returns true if no pool slot became available within the wait bound
    #[must_use]
    pub fn is_pool_exhausted(&self) -> bool {
        self.inner.kind == Kind::Pool
    }

    /// Returns true if the transport was already shut down
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.kind == Kind::Closed
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.inner.kind == Kind::Timeout
    }

    #[must_use]
    pub fn is_connect(&self) -> bool {
        self.inner.kind == Kind::Connect
    }

    #[must_use]
    pub fn is_redirect(&self) -> bool {
        self.inner.kind == Kind::Redirect
    }

    #[must_use]
    pub fn is_interceptor(&self) -> bool {
        self.inner.kind == Kind::Interceptor
    }

    #[must_use]
    pub fn is_config(&self) -> bool {
        self.inner.kind == Kind::Config
    }

    /// Transient failures a caller may back off from and retry
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self.inner.kind, Kind::Pool | Kind::Timeout | Kind::Connect)
    }

    /// The pool failure behind this error, if any
    #[must_use]
    pub fn pool_error(&self) -> Option<&PoolError> {
        self.inner
            .source
            .as_ref()
            .and_then(|source| source.downcast_ref::<PoolError>())
    }
}
