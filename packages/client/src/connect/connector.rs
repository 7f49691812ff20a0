//! Opens new connections for the pool

use std::sync::Arc;
use std::time::Duration;

use rustls::ClientConfig;
use rustls::pki_types::ServerName;
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio_rustls::TlsConnector;
use tracing::debug;

use super::connection::HttpConnection;
use super::tunnel;
use crate::error::{self, Result};
use crate::pool::Route;

/// Establishes [`HttpConnection`]s for routes.
///
/// The connect timeout covers the whole establishment: TCP connect, proxy
/// tunnel, TLS handshake and HTTP handshake.
#[derive(Clone)]
pub struct Connector {
    tls: TlsConnector,
    connect_timeout: Option<Duration>,
    runtime: Handle,
}

impl Connector {
    #[must_use]
    pub fn new(tls: Arc<ClientConfig>, connect_timeout: Option<Duration>, runtime: Handle) -> Self {
        Self {
            tls: TlsConnector::from(tls),
            connect_timeout,
            runtime,
        }
    }

    /// Open a connection for `route`.
    ///
    /// # Errors
    ///
    /// A timeout error when the connect timeout elapses, a connect error for
    /// any other failure along the way.
    pub async fn connect(&self, route: &Route) -> Result<HttpConnection> {
        let establish = self.establish(route);
        let conn = match self.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, establish).await.map_err(|_| {
                error::timeout(format!("connecting to {route} took longer than {limit:?}"))
            })??,
            None => establish.await?,
        };
        debug!(%route, "connection established");
        Ok(conn)
    }

    async fn establish(&self, route: &Route) -> Result<HttpConnection> {
        let (host, port) = route.connect_target();
        let tcp = TcpStream::connect((host, port))
            .await
            .map_err(error::connect)?;
        tcp.set_nodelay(true).map_err(error::connect)?;

        let proxied = route.proxy().is_some();
        if !route.is_secure() {
            return HttpConnection::handshake(tcp, proxied, &self.runtime).await;
        }

        let tcp = if proxied {
            tunnel::establish(tcp, route).await?
        } else {
            tcp
        };
        let server_name = ServerName::try_from(route.host().to_string()).map_err(error::connect)?;
        let tls = self
            .tls
            .connect(server_name, tcp)
            .await
            .map_err(error::connect)?;
        HttpConnection::handshake(tls, false, &self.runtime).await
    }
}

impl std::fmt::Debug for Connector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connector")
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}
