//! HTTP cookies
//!
//! A client built with cookie management enabled keeps a [`Jar`]: `Set-Cookie`
//! response headers are stored per URL and matching cookies are sent back on
//! later requests. With cookie management disabled no store exists at all.

use std::fmt;
use std::sync::{PoisonError, RwLock};

use bytes::Bytes;
use http::header::{COOKIE, SET_COOKIE};
use http::{HeaderMap, HeaderValue};

/// Actions for a persistent cookie store providing session support.
pub trait CookieStore: Send + Sync {
    /// Store a set of Set-Cookie header values received from `url`
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &url::Url);
    /// Get any Cookie values in the store for `url`
    fn cookies(&self, url: &url::Url) -> Option<HeaderValue>;
}

/// The default `CookieStore`, backed by the `cookie_store` crate.
#[derive(Default)]
pub struct Jar(RwLock<cookie_store::CookieStore>);

impl Jar {
    /// Add a cookie to this jar as if `url` had sent it.
    ///
    /// # Example
    ///
    /// ```
    /// use transit_client::cookie::{CookieStore, Jar};
    ///
    /// let url = "https://yolo.local".parse::<url::Url>().unwrap();
    /// let jar = Jar::default();
    /// jar.add_cookie_str("foo=bar; Domain=yolo.local", &url);
    /// assert!(jar.cookies(&url).is_some());
    /// ```
    pub fn add_cookie_str(&self, cookie: &str, url: &url::Url) {
        let cookies = cookie::Cookie::parse(cookie)
            .ok()
            .map(cookie::Cookie::into_owned)
            .into_iter();
        self.0
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .store_response_cookies(cookies, url);
    }

    /// Number of unexpired cookies held
    #[must_use]
    pub fn len(&self) -> usize {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter_unexpired()
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.0.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl CookieStore for Jar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &url::Url) {
        let cookies: Vec<_> = cookie_headers
            .filter_map(|val| val.to_str().ok())
            .filter_map(|val| cookie::Cookie::parse(val).map(cookie::Cookie::into_owned).ok())
            .collect();

        self.0
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .store_response_cookies(cookies.into_iter(), url);
    }

    fn cookies(&self, url: &url::Url) -> Option<HeaderValue> {
        let s = self
            .0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get_request_values(url)
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");

        if s.is_empty() {
            return None;
        }

        HeaderValue::from_maybe_shared(Bytes::from(s)).ok()
    }
}

impl fmt::Debug for Jar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Jar").field("cookies", &self.len()).finish()
    }
}

pub(crate) fn add_cookie_header(
    headers: &mut HeaderMap,
    cookie_store: &dyn CookieStore,
    url: &url::Url,
) {
    if let Some(header) = cookie_store.cookies(url) {
        headers.insert(COOKIE, header);
    }
}

pub(crate) fn store_response_cookies(
    headers: &HeaderMap,
    cookie_store: &dyn CookieStore,
    url: &url::Url,
) {
    let mut set_cookies = headers.get_all(SET_COOKIE).iter().peekable();
    if set_cookies.peek().is_some() {
        cookie_store.set_cookies(&mut set_cookies, url);
    }
}
