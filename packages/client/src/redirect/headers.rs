//! Header manipulation utilities for redirects

use http::header::{AUTHORIZATION, COOKIE, PROXY_AUTHORIZATION, WWW_AUTHENTICATE};
use http::{HeaderMap, HeaderValue};
use url::Url;

/// Remove credentials when the next hop leaves the previous host or port.
pub(crate) fn remove_sensitive_headers(headers: &mut HeaderMap, next: &Url, previous: &[Url]) {
    if let Some(previous) = previous.last() {
        let cross_host = next.host_str() != previous.host_str()
            || next.port_or_known_default() != previous.port_or_known_default();
        if cross_host {
            headers.remove(AUTHORIZATION);
            headers.remove(COOKIE);
            headers.remove("cookie2");
            headers.remove(PROXY_AUTHORIZATION);
            headers.remove(WWW_AUTHENTICATE);
        }
    }
}

/// Referer for the next hop; none on an https to http downgrade.
pub(crate) fn make_referer(next: &Url, previous: &Url) -> Option<HeaderValue> {
    if next.scheme() == "http" && previous.scheme() == "https" {
        return None;
    }

    let mut referer = previous.clone();
    let _ = referer.set_username("");
    let _ = referer.set_password(None);
    referer.set_fragment(None);
    referer.as_str().parse().ok()
}

#[cfg(test)]
mod tests {
    use http::header::REFERER;

    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).expect("valid url")
    }

    #[test]
    fn credentials_dropped_across_hosts() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer secret"));
        headers.insert(COOKIE, HeaderValue::from_static("session=1"));
        headers.insert(REFERER, HeaderValue::from_static("http://a.test/"));

        let previous = [url("http://a.test/start")];
        remove_sensitive_headers(&mut headers, &url("http://a.test/next"), &previous);
        assert!(headers.contains_key(AUTHORIZATION));

        remove_sensitive_headers(&mut headers, &url("http://b.test/next"), &previous);
        assert!(!headers.contains_key(AUTHORIZATION));
        assert!(!headers.contains_key(COOKIE));
        assert!(headers.contains_key(REFERER));
    }

    #[test]
    fn referer_strips_userinfo_and_skips_downgrade() {
        let previous = url("https://user:pw@a.test/page#frag");
        assert_eq!(make_referer(&url("http://b.test/"), &previous), None);
        assert_eq!(
            make_referer(&url("https://b.test/"), &previous),
            Some(HeaderValue::from_static("https://a.test/page"))
        );
    }
}
