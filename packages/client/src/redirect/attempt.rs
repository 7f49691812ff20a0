//! The question a redirect policy answers, and its answer

use std::error::Error as StdError;

use http::StatusCode;
use url::Url;

type BoxError = Box<dyn StdError + Send + Sync>;

/// A 3xx response about to be followed to `url()`.
///
/// Consumed by one of [`follow`](Self::follow), [`stop`](Self::stop) or
/// [`error`](Self::error), so a policy always produces exactly one verdict.
#[derive(Debug)]
pub struct Attempt<'a> {
    pub(crate) status: StatusCode,
    pub(crate) next: &'a Url,
    pub(crate) previous: &'a [Url],
}

impl<'a> Attempt<'a> {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Resolved target of the `Location` header
    #[must_use]
    pub fn url(&self) -> &'a Url {
        self.next
    }

    /// URLs already requested in this chain, oldest first
    #[must_use]
    pub fn previous(&self) -> &'a [Url] {
        self.previous
    }

    /// Redirects taken so far, counting this one.
    #[must_use]
    pub fn hops(&self) -> usize {
        self.previous.len()
    }

    /// Whether the target differs in scheme, host or port from the URL that
    /// answered with this redirect.
    #[must_use]
    pub fn leaves_origin(&self) -> bool {
        self.previous
            .last()
            .is_none_or(|last| last.origin() != self.next.origin())
    }

    #[must_use]
    pub fn follow(self) -> Action {
        Action(ActionKind::Follow)
    }

    /// Hand the 3xx response back to the caller as a successful result.
    #[must_use]
    pub fn stop(self) -> Action {
        Action(ActionKind::Stop)
    }

    /// Fail the whole request with `error`.
    pub fn error(self, error: impl Into<BoxError>) -> Action {
        Action(ActionKind::Error(error.into()))
    }
}

/// Verdict of a redirect policy, built from an [`Attempt`].
#[derive(Debug)]
pub struct Action(pub(crate) ActionKind);

#[derive(Debug)]
pub(crate) enum ActionKind {
    Follow,
    Stop,
    Error(BoxError),
}
