//! Pooled HTTP/1.1 connections

use std::fmt;
use std::io;
use std::time::Duration;

use bytes::Bytes;
use http::header::{CONNECTION, HeaderMap};
use http::uri::PathAndQuery;
use http::{Request, Response, Uri};
use http_body_util::{BodyExt, Full};
use hyper::client::conn::http1::{self, SendRequest};
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::debug;

use crate::error::{self, Result};
use crate::pool::{CloseHandle, Poolable};

/// An HTTP/1.1 client connection.
///
/// hyper's connection future runs as a task on the engine runtime; closing
/// the connection aborts that task, which drops the socket.
pub struct HttpConnection {
    sender: SendRequest<Full<Bytes>>,
    driver: AbortHandle,
    absolute_form: bool,
}

impl HttpConnection {
    /// Run the HTTP/1.1 handshake over an established stream.
    ///
    /// `absolute_form` is set for plain-http connections to a forward proxy,
    /// which expect the full URI in the request line.
    pub(crate) async fn handshake<T>(io: T, absolute_form: bool, runtime: &Handle) -> Result<Self>
    where
        T: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (sender, conn) = http1::handshake::<_, Full<Bytes>>(TokioIo::new(io))
            .await
            .map_err(error::connect)?;
        let driver = runtime
            .spawn(async move {
                if let Err(err) = conn.await {
                    debug!(error = %err, "connection closed with error");
                }
            })
            .abort_handle();
        Ok(Self {
            sender,
            driver,
            absolute_form,
        })
    }

    /// Write `request` and read the complete response.
    ///
    /// # Errors
    ///
    /// Fails with a request error if the connection is unusable or the
    /// exchange breaks off, and a body error if the body cannot be read.
    pub async fn send(&mut self, mut request: Request<Bytes>) -> Result<Response<Bytes>> {
        let uri = request.uri().clone();
        if !self.absolute_form {
            *request.uri_mut() = origin_form(&uri);
        }
        self.sender
            .ready()
            .await
            .map_err(|e| error::request(e).with_uri(uri.clone()))?;
        let response = self
            .sender
            .send_request(request.map(Full::new))
            .await
            .map_err(|e| error::request(e).with_uri(uri.clone()))?;
        let (parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| error::body(e).with_uri(uri))?
            .to_bytes();
        Ok(Response::from_parts(parts, body))
    }

    #[must_use]
    pub fn uses_absolute_form(&self) -> bool {
        self.absolute_form
    }
}

impl Poolable for HttpConnection {
    fn is_open(&self) -> bool {
        !self.driver.is_finished() && !self.sender.is_closed()
    }

    fn close(self) -> io::Result<()> {
        self.driver.abort();
        Ok(())
    }

    fn close_handle(&self) -> CloseHandle {
        let driver = self.driver.clone();
        CloseHandle::new(move || {
            driver.abort();
            Ok(())
        })
    }
}

impl fmt::Debug for HttpConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpConnection")
            .field("open", &self.is_open())
            .field("absolute_form", &self.absolute_form)
            .finish()
    }
}

fn origin_form(uri: &Uri) -> Uri {
    let path = uri
        .path_and_query()
        .cloned()
        .unwrap_or_else(|| PathAndQuery::from_static("/"));
    Uri::from(path)
}

/// What a response says about reusing its connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepAlive {
    /// `Connection: close`
    Close,
    /// `Keep-Alive: timeout=N`
    For(Duration),
    /// No hint; the pool's idle TTL applies
    Default,
}

impl KeepAlive {
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let close = headers
            .get_all(CONNECTION)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .any(|token| token.trim().eq_ignore_ascii_case("close"));
        if close {
            return KeepAlive::Close;
        }
        headers
            .get("keep-alive")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| {
                v.split(',').find_map(|param| {
                    let (key, value) = param.split_once('=')?;
                    if key.trim().eq_ignore_ascii_case("timeout") {
                        value.trim().parse::<u64>().ok()
                    } else {
                        None
                    }
                })
            })
            .map_or(KeepAlive::Default, |secs| KeepAlive::For(Duration::from_secs(secs)))
    }
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;

    use super::*;

    #[test]
    fn connection_close_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(CONNECTION, HeaderValue::from_static("Upgrade, Close"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        assert_eq!(KeepAlive::from_headers(&headers), KeepAlive::Close);
    }

    #[test]
    fn keep_alive_timeout_is_parsed() {
        let mut headers = HeaderMap::new();
        headers.insert("keep-alive", HeaderValue::from_static("max=100, timeout=5"));
        assert_eq!(
            KeepAlive::from_headers(&headers),
            KeepAlive::For(Duration::from_secs(5))
        );
        assert_eq!(KeepAlive::from_headers(&HeaderMap::new()), KeepAlive::Default);
    }

    #[test]
    fn origin_form_keeps_path_and_query() {
        let uri: Uri = "http://example.com/a/b?c=d".parse().expect("uri");
        assert_eq!(origin_form(&uri), "/a/b?c=d");
        let bare: Uri = "http://example.com".parse().expect("uri");
        assert_eq!(origin_form(&bare), "/");
    }
}
