use super::BoxError;
use super::types::{Error, Kind};

/// Creates an `Error` for a connection failure.
pub fn connect<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Connect).with(e.into())
}

/// Creates an `Error` for a request error.
pub fn request<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Request).with(e.into())
}

/// Creates an `Error` for a redirect error.
pub fn redirect<E: Into<BoxError>>(e: E, uri: http::Uri) -> Error {
    Error::new(Kind::Redirect).with(e.into()).with_uri(uri)
}

/// Creates an `Error` for an elapsed timeout.
pub fn timeout<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Timeout).with(e.into())
}

/// Creates an `Error` for a body error.
pub fn body<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Body).with(e.into())
}

/// Creates an `Error` for a failed interceptor.
pub fn interceptor<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Interceptor).with(e.into())
}

/// Creates an `Error` for a request issued after shutdown.
pub fn closed() -> Error {
    Error::new(Kind::Closed)
}

/// Creates an `Error` for an invalid request target or setting.
pub fn invalid<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Config).with(e.into())
}
