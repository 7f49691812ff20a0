//! Local HTTP server shared by the integration tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use axum::Router;
use axum::extract::Path;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use tokio::sync::oneshot;

/// Axum server on its own thread and runtime, bound to an ephemeral port.
///
/// Runs outside the test's runtime so blocking clients can call it from a
/// plain test thread.
pub struct TestServer {
    addr: SocketAddr,
    stop: Option<oneshot::Sender<()>>,
}

impl TestServer {
    pub fn start() -> Self {
        let (addr_tx, addr_rx) = mpsc::channel();
        let (stop, stopped) = oneshot::channel::<()>();

        thread::Builder::new()
            .name("test-server".into())
            .spawn(move || {
                let runtime = tokio::runtime::Builder::new_multi_thread()
                    .worker_threads(2)
                    .enable_all()
                    .build()
                    .expect("server runtime");
                runtime.block_on(async move {
                    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                        .await
                        .expect("bind test server");
                    addr_tx
                        .send(listener.local_addr().expect("local addr"))
                        .expect("report address");
                    axum::serve(listener, routes())
                        .with_graceful_shutdown(async {
                            let _ = stopped.await;
                        })
                        .await
                        .expect("serve");
                });
            })
            .expect("spawn server thread");

        let addr = addr_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("server address");
        Self {
            addr,
            stop: Some(stop),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

fn routes() -> Router {
    Router::new()
        .route("/ok", get(|| async { "ok" }))
        .route("/target", get(|| async { "target" }))
        .route(
            "/redirect",
            get(|| async { (StatusCode::FOUND, [(header::LOCATION, "/target")]) }),
        )
        .route(
            "/loop",
            get(|| async { (StatusCode::FOUND, [(header::LOCATION, "/loop")]) }),
        )
        .route(
            "/set-cookie",
            get(|| async { ([(header::SET_COOKIE, "session=abc123; Path=/")], "cookie set") }),
        )
        .route("/echo/:name", get(echo_header))
        .route("/request-target", get(|uri: axum::http::Uri| async move { uri.to_string() }))
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_millis(400)).await;
                "slow"
            }),
        )
}

/// Body is the value of the named request header, empty when absent.
async fn echo_header(Path(name): Path<String>, headers: HeaderMap) -> impl IntoResponse {
    headers
        .get(name.as_str())
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
