//! Request pipeline shared by both client handles
//!
//! One hop is: interceptors, exchange, store `Set-Cookie`, redirect decision.
//! The handles drive the exchange; everything around it lives here.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::{
    CONTENT_LENGTH, CONTENT_TYPE, COOKIE, LOCATION, REFERER, TRANSFER_ENCODING,
};
use http::{HeaderValue, Request, Response, Uri};
use tracing::debug;
use url::Url;

use crate::config::{Config, ProxyConfig};
use crate::cookie::{self, CookieStore, Jar};
use crate::error::{self, ConfigError, Result};
use crate::interceptor::InterceptorChain;
use crate::interceptor::defaults::{AddCookies, DefaultHeaders, HostHeader};
use crate::pool::Route;
use crate::redirect::{self, ActionKind, Policy};

/// Outcome of one hop.
pub(crate) enum Step {
    Done(Response<Bytes>),
    Follow(Request<Bytes>),
}

pub(crate) struct Pipeline {
    interceptors: InterceptorChain,
    redirect: Policy,
    cookies: Option<Arc<Jar>>,
    proxy: Option<ProxyConfig>,
    socket_timeout: Option<Duration>,
}

impl Pipeline {
    /// Assemble the pipeline a client built from `config` runs.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` for a user agent that is not a valid
    /// header value.
    pub(crate) fn from_config(config: &Config) -> std::result::Result<Self, ConfigError> {
        let user_agent = HeaderValue::from_str(&config.user_agent)
            .map_err(|e| ConfigError::Invalid(format!("user agent: {e}")))?;
        let cookies = config.cookie_management.then(|| Arc::new(Jar::default()));

        let mut interceptors = InterceptorChain::new();
        for interceptor in &config.interceptors {
            interceptors.push(Arc::clone(interceptor));
        }
        interceptors.push(Arc::new(HostHeader));
        interceptors.push(Arc::new(DefaultHeaders::new(user_agent)));
        if let Some(jar) = &cookies {
            let store: Arc<dyn CookieStore> = jar.clone();
            interceptors.push(Arc::new(AddCookies::new(store)));
        }

        let redirect = match (&config.redirect_policy, config.follow_redirects) {
            (_, false) => Policy::none(),
            (Some(policy), true) => policy.clone().capped(config.max_redirects),
            (None, true) => Policy::limited(config.max_redirects),
        };

        Ok(Self {
            interceptors,
            redirect,
            cookies,
            proxy: config.proxy.clone(),
            socket_timeout: config.socket_timeout,
        })
    }

    pub(crate) fn cookie_jar(&self) -> Option<&Arc<Jar>> {
        self.cookies.as_ref()
    }

    pub(crate) fn socket_timeout(&self) -> Option<Duration> {
        self.socket_timeout
    }

    pub(crate) fn redirect_policy(&self) -> &Policy {
        &self.redirect
    }

    /// Run the interceptors and resolve the route of `request`.
    pub(crate) fn prepare(&self, request: &mut Request<Bytes>) -> Result<Route> {
        let route = Route::from_uri(request.uri())?.via(self.proxy.clone());
        self.interceptors.apply(request)?;
        Ok(route)
    }

    /// Handle the response to `request`: store its cookies and decide
    /// whether to follow a redirect. `chain` collects the URLs requested so far.
    pub(crate) fn complete(
        &self,
        request: &Request<Bytes>,
        response: Response<Bytes>,
        chain: &mut Vec<Url>,
    ) -> Result<Step> {
        let current = to_url(request.uri())?;
        if let Some(jar) = &self.cookies {
            cookie::store_response_cookies(response.headers(), jar.as_ref(), &current);
        }

        let status = response.status();
        if !status.is_redirection() || !self.redirect.follows() {
            return Ok(Step::Done(response));
        }
        let Some((method, keep_body)) = redirect::next_method(status, request.method()) else {
            return Ok(Step::Done(response));
        };
        let Some(next) = response
            .headers()
            .get(LOCATION)
            .and_then(|loc| loc.to_str().ok())
            .and_then(|loc| current.join(loc).ok())
        else {
            debug!(%status, "redirect without a usable Location, returning it");
            return Ok(Step::Done(response));
        };

        chain.push(current);
        match self.redirect.check(status, &next, chain) {
            ActionKind::Follow => {}
            ActionKind::Stop => return Ok(Step::Done(response)),
            ActionKind::Error(err) => {
                return Err(error::redirect(err, request.uri().clone()));
            }
        }

        let uri: Uri = next
            .as_str()
            .parse()
            .map_err(|e| error::redirect(e, request.uri().clone()))?;
        let mut headers = request.headers().clone();
        if !keep_body {
            headers.remove(CONTENT_LENGTH);
            headers.remove(CONTENT_TYPE);
            headers.remove(TRANSFER_ENCODING);
        }
        // Rebuilt from the jar for the new URL when the interceptors rerun
        headers.remove(COOKIE);
        redirect::remove_sensitive_headers(&mut headers, &next, chain);
        if let Some(previous) = chain.last() {
            match redirect::make_referer(&next, previous) {
                Some(referer) => {
                    headers.insert(REFERER, referer);
                }
                None => {
                    headers.remove(REFERER);
                }
            }
        }

        let body = if keep_body {
            request.body().clone()
        } else {
            Bytes::new()
        };
        let mut follow = Request::new(body);
        *follow.method_mut() = method;
        *follow.uri_mut() = uri;
        *follow.headers_mut() = headers;
        debug!(%status, from = %request.uri(), to = %follow.uri(), "following redirect");
        Ok(Step::Follow(follow))
    }
}

/// Copy of `request` for the wire; the original stays around for redirects.
pub(crate) fn copy_request(request: &Request<Bytes>) -> Request<Bytes> {
    let mut copy = Request::new(request.body().clone());
    *copy.method_mut() = request.method().clone();
    *copy.uri_mut() = request.uri().clone();
    *copy.version_mut() = request.version();
    *copy.headers_mut() = request.headers().clone();
    copy
}

fn to_url(uri: &Uri) -> Result<Url> {
    Url::parse(&uri.to_string()).map_err(|e| error::invalid(e).with_uri(uri.clone()))
}

#[cfg(test)]
mod tests {
    use http::header::{AUTHORIZATION, HOST, SET_COOKIE, USER_AGENT};
    use http::{Method, StatusCode};

    use super::*;
    use crate::interceptor::interceptor_fn;

    fn redirect_response(status: StatusCode, location: &str) -> Response<Bytes> {
        Response::builder()
            .status(status)
            .header(LOCATION, location)
            .body(Bytes::new())
            .expect("response")
    }

    fn post(uri: &str) -> Request<Bytes> {
        Request::post(uri)
            .header(CONTENT_TYPE, "text/plain")
            .header(AUTHORIZATION, "Bearer t")
            .body(Bytes::from_static(b"payload"))
            .expect("request")
    }

    #[test]
    fn user_interceptors_run_before_built_ins() {
        let config = Config::default().with_interceptor(interceptor_fn("inspect", |req| {
            assert!(req.headers().get(HOST).is_none());
            assert!(req.headers().get(USER_AGENT).is_none());
            Ok(())
        }));
        let pipeline = Pipeline::from_config(&config).expect("pipeline");
        let mut request = Request::get("http://a.test/").body(Bytes::new()).expect("request");
        let route = pipeline.prepare(&mut request).expect("prepare");
        assert_eq!(route, Route::http("a.test", 80));
        assert_eq!(request.headers()[HOST], "a.test");
        assert!(request.headers().contains_key(USER_AGENT));
    }

    #[test]
    fn see_other_becomes_a_get_to_the_joined_location() {
        let pipeline = Pipeline::from_config(&Config::default()).expect("pipeline");
        let request = post("http://a.test/form");
        let mut chain = Vec::new();
        let step = pipeline
            .complete(&request, redirect_response(StatusCode::SEE_OTHER, "/done"), &mut chain)
            .expect("complete");
        let Step::Follow(next) = step else {
            panic!("expected a redirect to be followed");
        };
        assert_eq!(next.method(), Method::GET);
        assert_eq!(next.uri(), "http://a.test/done");
        assert!(next.body().is_empty());
        assert!(next.headers().get(CONTENT_TYPE).is_none());
        assert!(next.headers().contains_key(AUTHORIZATION));
        assert_eq!(next.headers()[REFERER], "http://a.test/form");
    }

    #[test]
    fn permanent_redirect_keeps_body_and_drops_credentials_across_hosts() {
        let pipeline = Pipeline::from_config(&Config::default()).expect("pipeline");
        let request = post("http://a.test/upload");
        let mut chain = Vec::new();
        let step = pipeline
            .complete(
                &request,
                redirect_response(StatusCode::PERMANENT_REDIRECT, "http://b.test/upload"),
                &mut chain,
            )
            .expect("complete");
        let Step::Follow(next) = step else {
            panic!("expected a redirect to be followed");
        };
        assert_eq!(next.method(), Method::POST);
        assert_eq!(next.body().as_ref(), b"payload");
        assert!(next.headers().get(AUTHORIZATION).is_none());
    }

    #[test]
    fn redirects_are_returned_when_not_followed() {
        let config = Config::default().with_follow_redirects(false);
        let pipeline = Pipeline::from_config(&config).expect("pipeline");
        let request = Request::get("http://a.test/").body(Bytes::new()).expect("request");
        let step = pipeline
            .complete(&request, redirect_response(StatusCode::FOUND, "/elsewhere"), &mut Vec::new())
            .expect("complete");
        assert!(matches!(step, Step::Done(resp) if resp.status() == StatusCode::FOUND));
    }

    #[test]
    fn configured_policy_decides_each_hop() {
        let config = Config::default().with_redirect_policy(Policy::custom(|attempt| {
            if attempt.leaves_origin() {
                attempt.stop()
            } else {
                attempt.follow()
            }
        }));
        let pipeline = Pipeline::from_config(&config).expect("pipeline");
        let request = Request::get("http://a.test/").body(Bytes::new()).expect("request");

        let local = pipeline
            .complete(&request, redirect_response(StatusCode::FOUND, "/home"), &mut Vec::new())
            .expect("complete");
        assert!(matches!(local, Step::Follow(_)));

        let away = pipeline
            .complete(
                &request,
                redirect_response(StatusCode::FOUND, "http://b.test/"),
                &mut Vec::new(),
            )
            .expect("complete");
        assert!(matches!(away, Step::Done(resp) if resp.status() == StatusCode::FOUND));

        let off = Config::default()
            .with_follow_redirects(false)
            .with_redirect_policy(Policy::custom(|attempt| attempt.follow()));
        let pipeline = Pipeline::from_config(&off).expect("pipeline");
        let step = pipeline
            .complete(&request, redirect_response(StatusCode::FOUND, "/home"), &mut Vec::new())
            .expect("complete");
        assert!(matches!(step, Step::Done(_)));
    }

    #[test]
    fn redirect_limit_is_enforced() {
        let config = Config::default().with_max_redirects(1);
        let pipeline = Pipeline::from_config(&config).expect("pipeline");
        let request = Request::get("http://a.test/loop").body(Bytes::new()).expect("request");
        let mut chain = Vec::new();
        let first = pipeline.complete(&request, redirect_response(StatusCode::FOUND, "/loop"), &mut chain);
        assert!(matches!(first, Ok(Step::Follow(_))));
        let second = pipeline.complete(&request, redirect_response(StatusCode::FOUND, "/loop"), &mut chain);
        let err = second.err().expect("limit exceeded");
        assert!(err.is_redirect());
    }

    #[test]
    fn cookies_are_stored_only_when_managed() {
        let response = || {
            Response::builder()
                .header(SET_COOKIE, "sid=9")
                .body(Bytes::new())
                .expect("response")
        };
        let request = Request::get("http://a.test/").body(Bytes::new()).expect("request");

        let managed = Pipeline::from_config(&Config::default()).expect("pipeline");
        let _ = managed.complete(&request, response(), &mut Vec::new()).expect("complete");
        let mut next = Request::get("http://a.test/again").body(Bytes::new()).expect("request");
        managed.prepare(&mut next).expect("prepare");
        assert_eq!(next.headers()[COOKIE], "sid=9");

        let unmanaged =
            Pipeline::from_config(&Config::default().with_cookie_management(false)).expect("pipeline");
        assert!(unmanaged.cookie_jar().is_none());
        let _ = unmanaged.complete(&request, response(), &mut Vec::new()).expect("complete");
        let mut next = Request::get("http://a.test/again").body(Bytes::new()).expect("request");
        unmanaged.prepare(&mut next).expect("prepare");
        assert!(next.headers().get(COOKIE).is_none());
    }

    #[test]
    fn redirect_hop_rebuilds_cookie_header_from_the_jar() {
        let pipeline = Pipeline::from_config(&Config::default()).expect("pipeline");
        let request = Request::get("http://a.test/login")
            .header(COOKIE, "sid=stale")
            .body(Bytes::new())
            .expect("request");
        let response = Response::builder()
            .status(StatusCode::FOUND)
            .header(LOCATION, "/home")
            .header(SET_COOKIE, "sid=fresh")
            .body(Bytes::new())
            .expect("response");

        let Step::Follow(mut next) = pipeline
            .complete(&request, response, &mut Vec::new())
            .expect("complete")
        else {
            panic!("expected a redirect to be followed");
        };
        assert!(next.headers().get(COOKIE).is_none());

        pipeline.prepare(&mut next).expect("prepare");
        assert_eq!(next.headers().get_all(COOKIE).iter().count(), 1);
        assert_eq!(next.headers()[COOKIE], "sid=fresh");
    }

    #[test]
    fn redirect_hop_drops_cookie_header_without_a_jar() {
        let config = Config::default().with_cookie_management(false);
        let pipeline = Pipeline::from_config(&config).expect("pipeline");
        let request = Request::get("http://a.test/login")
            .header(COOKIE, "sid=stale")
            .body(Bytes::new())
            .expect("request");

        let Step::Follow(mut next) = pipeline
            .complete(&request, redirect_response(StatusCode::FOUND, "/home"), &mut Vec::new())
            .expect("complete")
        else {
            panic!("expected a redirect to be followed");
        };
        pipeline.prepare(&mut next).expect("prepare");
        assert!(next.headers().get(COOKIE).is_none());
    }

    #[test]
    fn copies_keep_everything_needed_on_the_wire() {
        let request = post("http://a.test/x");
        let copy = copy_request(&request);
        assert_eq!(copy.method(), request.method());
        assert_eq!(copy.uri(), request.uri());
        assert_eq!(copy.headers(), request.headers());
        assert_eq!(copy.body(), request.body());
    }
}
