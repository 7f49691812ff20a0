//! Built-in interceptors appended after the configured ones

use std::sync::Arc;

use bytes::Bytes;
use http::header::{ACCEPT, HOST, USER_AGENT};
use http::{HeaderValue, Request};

use super::RequestInterceptor;
use crate::cookie::{self, CookieStore};
use crate::error::{self, Result};

/// Sets `Host` from the request URI's authority, replacing any stale value
/// carried over from a previous redirect hop.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostHeader;

impl RequestInterceptor for HostHeader {
    fn intercept(&self, request: &mut Request<Bytes>) -> Result<()> {
        let authority = request
            .uri()
            .authority()
            .ok_or_else(|| error::invalid("request URI has no authority"))?;
        let value = HeaderValue::from_str(authority.as_str()).map_err(error::invalid)?;
        request.headers_mut().insert(HOST, value);
        Ok(())
    }

    fn name(&self) -> &str {
        "host"
    }
}

/// Fills in `User-Agent` and `Accept` unless the request already has them.
#[derive(Debug, Clone)]
pub struct DefaultHeaders {
    user_agent: HeaderValue,
}

impl DefaultHeaders {
    #[must_use]
    pub fn new(user_agent: HeaderValue) -> Self {
        Self { user_agent }
    }
}

impl RequestInterceptor for DefaultHeaders {
    fn intercept(&self, request: &mut Request<Bytes>) -> Result<()> {
        let headers = request.headers_mut();
        if !headers.contains_key(USER_AGENT) {
            headers.insert(USER_AGENT, self.user_agent.clone());
        }
        if !headers.contains_key(ACCEPT) {
            headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "default-headers"
    }
}

/// Adds the `Cookie` header from the client's cookie store.
pub struct AddCookies {
    store: Arc<dyn CookieStore>,
}

impl AddCookies {
    #[must_use]
    pub fn new(store: Arc<dyn CookieStore>) -> Self {
        Self { store }
    }
}

impl RequestInterceptor for AddCookies {
    fn intercept(&self, request: &mut Request<Bytes>) -> Result<()> {
        let url = url::Url::parse(&request.uri().to_string()).map_err(error::invalid)?;
        cookie::add_cookie_header(request.headers_mut(), self.store.as_ref(), &url);
        Ok(())
    }

    fn name(&self) -> &str {
        "cookies"
    }
}

impl std::fmt::Debug for AddCookies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddCookies").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use http::header::COOKIE;

    use super::*;
    use crate::cookie::Jar;

    fn request(uri: &str) -> Request<Bytes> {
        Request::get(uri).body(Bytes::new()).expect("request")
    }

    #[test]
    fn host_follows_the_uri() {
        let mut req = request("http://a.test:8080/x");
        req.headers_mut()
            .insert(HOST, HeaderValue::from_static("stale.test"));
        HostHeader.intercept(&mut req).expect("host");
        assert_eq!(req.headers()[HOST], "a.test:8080");
    }

    #[test]
    fn default_headers_do_not_override_the_caller() {
        let mut req = request("http://a.test/");
        req.headers_mut()
            .insert(USER_AGENT, HeaderValue::from_static("custom/1"));
        DefaultHeaders::new(HeaderValue::from_static("transit/test"))
            .intercept(&mut req)
            .expect("defaults");
        assert_eq!(req.headers()[USER_AGENT], "custom/1");
        assert_eq!(req.headers()[ACCEPT], "*/*");
    }

    #[test]
    fn cookies_come_from_the_store() {
        let jar = Arc::new(Jar::default());
        jar.add_cookie_str("sid=1", &"http://a.test/".parse().expect("url"));
        let mut req = request("http://a.test/page");
        AddCookies::new(jar).intercept(&mut req).expect("cookies");
        assert_eq!(req.headers()[COOKIE], "sid=1");
    }
}
