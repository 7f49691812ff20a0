//! Redirect handling
//!
//! With `follow_redirects` enabled, a client follows up to `max_redirects`
//! hops using [`Policy::limited`]; otherwise [`Policy::none`] hands every 3xx
//! response back to the caller untouched.

mod attempt;
mod headers;
mod policy;

use http::{Method, StatusCode};

pub(crate) use attempt::ActionKind;
pub use attempt::{Action, Attempt};
pub(crate) use headers::{make_referer, remove_sensitive_headers};
pub use policy::{Policy, TooManyRedirects};

/// Method and body handling for the next hop of a redirect.
///
/// 301, 302 and 303 switch to `GET` without a body (a `HEAD` stays `HEAD`);
/// 307 and 308 repeat the method and body. `None` for any other status.
#[must_use]
pub(crate) fn next_method(status: StatusCode, method: &Method) -> Option<(Method, bool)> {
    match status {
        StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND | StatusCode::SEE_OTHER => {
            if *method == Method::HEAD {
                Some((Method::HEAD, false))
            } else {
                Some((Method::GET, false))
            }
        }
        StatusCode::TEMPORARY_REDIRECT | StatusCode::PERMANENT_REDIRECT => {
            Some((method.clone(), true))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn see_other_turns_post_into_bodyless_get() {
        assert_eq!(
            next_method(StatusCode::SEE_OTHER, &Method::POST),
            Some((Method::GET, false))
        );
        assert_eq!(
            next_method(StatusCode::FOUND, &Method::HEAD),
            Some((Method::HEAD, false))
        );
    }

    #[test]
    fn temporary_redirect_keeps_method_and_body() {
        assert_eq!(
            next_method(StatusCode::TEMPORARY_REDIRECT, &Method::PUT),
            Some((Method::PUT, true))
        );
        assert_eq!(next_method(StatusCode::NOT_MODIFIED, &Method::GET), None);
    }
}
