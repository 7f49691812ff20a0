//! HTTP CONNECT tunnels through a forward proxy

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{self, Result};
use crate::pool::Route;

const MAX_RESPONSE_HEAD: usize = 8 * 1024;

/// Ask the proxy on `stream` to open a tunnel to the origin of `route`.
///
/// The response head is read one byte at a time so nothing the origin sends
/// after the tunnel opens is consumed here.
pub(super) async fn establish(mut stream: TcpStream, route: &Route) -> Result<TcpStream> {
    let authority = route.authority();
    let request = format!("CONNECT {authority} HTTP/1.1\r\nHost: {authority}\r\n\r\n");
    stream
        .write_all(request.as_bytes())
        .await
        .map_err(error::connect)?;

    let mut head = Vec::with_capacity(256);
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        if head.len() >= MAX_RESPONSE_HEAD {
            return Err(error::connect("proxy CONNECT response head too large"));
        }
        let read = stream.read(&mut byte).await.map_err(error::connect)?;
        if read == 0 {
            return Err(error::connect("proxy closed the connection during CONNECT"));
        }
        head.push(byte[0]);
    }

    match status_code(&head) {
        Some(200) => {
            tracing::debug!(%route, "proxy tunnel established");
            Ok(stream)
        }
        Some(status) => Err(error::connect(format!(
            "proxy refused CONNECT to {authority} with status {status}"
        ))),
        None => Err(error::connect("malformed proxy CONNECT response")),
    }
}

fn status_code(head: &[u8]) -> Option<u16> {
    let line = head.split(|&b| b == b'\n').next()?;
    let line = std::str::from_utf8(line).ok()?;
    let mut parts = line.split_whitespace();
    if !parts.next()?.starts_with("HTTP/1.") {
        return None;
    }
    parts.next()?.parse().ok()
}
