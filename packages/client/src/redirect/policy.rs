//! Redirect policies

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use http::StatusCode;
use url::Url;

use super::attempt::{Action, ActionKind, Attempt};

type Decide = dyn Fn(Attempt<'_>) -> Action + Send + Sync + 'static;

/// Decides whether a redirect is followed.
#[derive(Clone)]
pub struct Policy {
    inner: PolicyKind,
}

#[derive(Clone)]
enum PolicyKind {
    Custom {
        decide: Arc<Decide>,
        max: Option<usize>,
    },
    Limit(usize),
    None,
}

/// The redirect chain grew past the configured maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TooManyRedirects {
    pub max: usize,
}

impl fmt::Display for TooManyRedirects {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "too many redirects (limit {})", self.max)
    }
}

impl StdError for TooManyRedirects {}

impl Policy {
    /// Follow at most `max` redirects; the next one fails the request.
    #[must_use]
    pub fn limited(max: usize) -> Self {
        Self {
            inner: PolicyKind::Limit(max),
        }
    }

    /// Never follow; 3xx responses are returned as they are.
    #[must_use]
    pub fn none() -> Self {
        Self {
            inner: PolicyKind::None,
        }
    }

    /// Decide with a closure. Installed on a client through
    /// [`Config::with_redirect_policy`](crate::Config::with_redirect_policy),
    /// the closure is only asked about hops within `max_redirects`.
    pub fn custom<T>(policy: T) -> Self
    where
        T: Fn(Attempt<'_>) -> Action + Send + Sync + 'static,
    {
        Self {
            inner: PolicyKind::Custom {
                decide: Arc::new(policy),
                max: None,
            },
        }
    }

    /// The same policy, but never following more than `max` redirects.
    #[must_use]
    pub(crate) fn capped(self, max: usize) -> Self {
        let inner = match self.inner {
            PolicyKind::Custom { decide, max: own } => PolicyKind::Custom {
                decide,
                max: Some(own.map_or(max, |own| own.min(max))),
            },
            PolicyKind::Limit(own) => PolicyKind::Limit(own.min(max)),
            PolicyKind::None => PolicyKind::None,
        };
        Self { inner }
    }

    #[must_use]
    pub fn follows(&self) -> bool {
        !matches!(self.inner, PolicyKind::None | PolicyKind::Limit(0))
    }

    /// Apply the policy to an attempt.
    #[must_use]
    pub fn redirect(&self, attempt: Attempt<'_>) -> Action {
        match self.inner {
            PolicyKind::Custom { ref decide, max } => match max {
                Some(max) if attempt.hops() > max => attempt.error(TooManyRedirects { max }),
                _ => decide(attempt),
            },
            PolicyKind::Limit(max) => {
                if attempt.hops() > max {
                    attempt.error(TooManyRedirects { max })
                } else {
                    attempt.follow()
                }
            }
            PolicyKind::None => attempt.stop(),
        }
    }

    pub(crate) fn check(&self, status: StatusCode, next: &Url, previous: &[Url]) -> ActionKind {
        self.redirect(Attempt {
            status,
            next,
            previous,
        })
        .0
    }
}

impl Default for Policy {
    fn default() -> Self {
        Policy::limited(crate::config::ConfigDefaults::MAX_REDIRECTS)
    }
}

impl fmt::Debug for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner {
            PolicyKind::Custom { max, .. } => {
                f.debug_struct("Policy::custom").field("max", &max).finish_non_exhaustive()
            }
            PolicyKind::Limit(max) => f.debug_tuple("Policy::limited").field(&max).finish(),
            PolicyKind::None => f.pad("Policy::none"),
        }
    }
}
