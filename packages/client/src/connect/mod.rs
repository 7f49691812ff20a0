//! Connection establishment
//!
//! Opens the TCP, TLS and proxy-tunnel layers for a [`Route`](crate::pool::Route)
//! and performs the HTTP/1.1 handshake, producing poolable [`HttpConnection`]s.

mod connection;
mod connector;
pub mod tls;
mod tunnel;

pub use connection::{HttpConnection, KeepAlive};
pub use connector::Connector;
