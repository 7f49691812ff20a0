//! Request interceptors
//!
//! Interceptors see and may rewrite every outgoing request, including each
//! hop of a followed redirect. A client runs the configured interceptors in
//! the order they were configured, then the built-in ones from [`defaults`].
//! The first interceptor error aborts the request.

pub mod defaults;

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::Request;
use tracing::debug;

use crate::error::{self, Result};

/// Hook invoked on each outgoing request before it is written.
pub trait RequestInterceptor: Send + Sync {
    /// Inspect or modify `request`.
    ///
    /// # Errors
    ///
    /// Any error aborts the request; it reaches the caller as an
    /// interceptor error.
    fn intercept(&self, request: &mut Request<Bytes>) -> Result<()>;

    /// Name used in logs and `Debug` output
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Interceptor built from a closure, see [`interceptor_fn`].
pub struct FnInterceptor<F> {
    name: String,
    f: F,
}

/// Wrap a closure as a named interceptor.
///
/// # Examples
///
/// ```
/// use transit_client::interceptor::{RequestInterceptor, interceptor_fn};
///
/// let stamp = interceptor_fn("stamp", |req| {
///     req.headers_mut().insert("x-stamp", http::HeaderValue::from_static("1"));
///     Ok(())
/// });
/// assert_eq!(stamp.name(), "stamp");
/// ```
pub fn interceptor_fn<F>(name: impl Into<String>, f: F) -> FnInterceptor<F>
where
    F: Fn(&mut Request<Bytes>) -> Result<()> + Send + Sync,
{
    FnInterceptor {
        name: name.into(),
        f,
    }
}

impl<F> RequestInterceptor for FnInterceptor<F>
where
    F: Fn(&mut Request<Bytes>) -> Result<()> + Send + Sync,
{
    fn intercept(&self, request: &mut Request<Bytes>) -> Result<()> {
        (self.f)(request)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Sets one header on every request.
#[derive(Debug, Clone)]
pub struct SetHeader {
    name: HeaderName,
    value: HeaderValue,
    overwrite: bool,
}

impl SetHeader {
    /// Replace any existing value.
    #[must_use]
    pub fn new(name: HeaderName, value: HeaderValue) -> Self {
        Self {
            name,
            value,
            overwrite: true,
        }
    }

    /// Only set the header when the request does not carry it yet.
    #[must_use]
    pub fn if_absent(name: HeaderName, value: HeaderValue) -> Self {
        Self {
            name,
            value,
            overwrite: false,
        }
    }
}

impl RequestInterceptor for SetHeader {
    fn intercept(&self, request: &mut Request<Bytes>) -> Result<()> {
        let headers = request.headers_mut();
        if self.overwrite || !headers.contains_key(&self.name) {
            headers.insert(self.name.clone(), self.value.clone());
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "set-header"
    }
}

/// Ordered interceptors applied as one step.
#[derive(Clone, Default)]
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn RequestInterceptor>>,
}

impl InterceptorChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, interceptor: Arc<dyn RequestInterceptor>) {
        self.interceptors.push(interceptor);
    }

    #[must_use]
    pub fn with(mut self, interceptor: Arc<dyn RequestInterceptor>) -> Self {
        self.push(interceptor);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.interceptors.iter().map(|i| i.name())
    }

    /// Run every interceptor in order, stopping at the first error.
    ///
    /// # Errors
    ///
    /// The failing interceptor's error, classified as an interceptor error.
    pub fn apply(&self, request: &mut Request<Bytes>) -> Result<()> {
        for interceptor in &self.interceptors {
            if let Err(err) = interceptor.intercept(request) {
                debug!(interceptor = interceptor.name(), error = %err, "request interceptor failed");
                return Err(if err.is_interceptor() {
                    err
                } else {
                    error::interceptor(err).with_uri(request.uri().clone())
                });
            }
        }
        Ok(())
    }
}

impl fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn request() -> Request<Bytes> {
        Request::get("http://a.test/").body(Bytes::new()).expect("request")
    }

    #[test]
    fn interceptors_run_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut chain = InterceptorChain::new();
        for name in ["a", "b"] {
            let seen = Arc::clone(&seen);
            chain.push(Arc::new(interceptor_fn(name, move |req| {
                seen.lock().expect("lock").push(name);
                req.headers_mut()
                    .append("x-order", HeaderValue::from_static(name));
                Ok(())
            })));
        }

        let mut req = request();
        chain.apply(&mut req).expect("chain");
        assert_eq!(*seen.lock().expect("lock"), vec!["a", "b"]);
        let order: Vec<_> = req.headers().get_all("x-order").iter().collect();
        assert_eq!(order, vec!["a", "b"]);
        assert_eq!(chain.names().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn first_error_stops_the_chain() {
        let reached = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&reached);
        let chain = InterceptorChain::new()
            .with(Arc::new(interceptor_fn("deny", |_| {
                Err(error::request("denied by policy"))
            })))
            .with(Arc::new(interceptor_fn("after", move |_| {
                *flag.lock().expect("lock") = true;
                Ok(())
            })));

        let err = chain.apply(&mut request()).expect_err("must fail");
        assert!(err.is_interceptor());
        assert!(!*reached.lock().expect("lock"));
    }

    #[test]
    fn set_header_if_absent_keeps_existing_value() {
        let mut req = request();
        req.headers_mut()
            .insert("x-client", HeaderValue::from_static("caller"));
        SetHeader::if_absent(
            HeaderName::from_static("x-client"),
            HeaderValue::from_static("default"),
        )
        .intercept(&mut req)
        .expect("intercept");
        assert_eq!(req.headers()["x-client"], "caller");

        SetHeader::new(
            HeaderName::from_static("x-client"),
            HeaderValue::from_static("forced"),
        )
        .intercept(&mut req)
        .expect("intercept");
        assert_eq!(req.headers()["x-client"], "forced");
    }
}
