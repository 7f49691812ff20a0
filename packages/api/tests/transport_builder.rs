//! Fluent builder settings and the bundles it produces

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use transit::{
    ClientHandle, ConfigError, ExecutionModel, HeaderName, HeaderValue, ReaperState, Transit,
    redirect,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn serve() -> SocketAddr {
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("server runtime");
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                .await
                .expect("bind");
            tx.send(listener.local_addr().expect("addr")).expect("send addr");
            let app = Router::new().route(
                "/tag",
                get(|headers: axum::http::HeaderMap| async move {
                    headers
                        .get("x-tag")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string()
                }),
            );
            axum::serve(listener, app).await.expect("serve");
        });
    });
    rx.recv_timeout(Duration::from_secs(5)).expect("server address")
}

#[test]
fn setters_map_onto_config() {
    init_logging();
    let builder = Transit::blocking()
        .max_connections(16)
        .max_connections_per_route(4)
        .connection_timeout_ms(-1)
        .socket_timeout(Duration::from_millis(750))
        .pool_wait_cap(Duration::from_secs(3))
        .follow_redirects(false)
        .max_redirects(2)
        .redirect_policy(redirect::Policy::custom(|attempt| attempt.stop()))
        .cookie_management(false)
        .user_agent("builder-test/0.1")
        .io_threads(3)
        .sweep_interval(Duration::from_millis(250))
        .idle_ttl(Duration::from_secs(7))
        .max_connection_age(None)
        .proxy("proxy.internal", 3128);

    let config = builder.settings();
    assert_eq!(config.max_connections_total, 16);
    assert_eq!(config.max_connections_per_route, 4);
    assert_eq!(config.connection_timeout, None);
    assert_eq!(config.pool_wait_timeout(), Duration::from_secs(3));
    assert_eq!(config.socket_timeout, Some(Duration::from_millis(750)));
    assert!(!config.follow_redirects);
    assert_eq!(config.max_redirects, 2);
    assert!(config.redirect_policy.is_some());
    assert!(!config.cookie_management);
    assert_eq!(config.user_agent, "builder-test/0.1");
    assert_eq!(config.io_threads, 3);
    assert_eq!(config.reaper.sweep_interval, Duration::from_millis(250));
    assert_eq!(config.reaper.idle_ttl, Duration::from_secs(7));
    assert_eq!(config.reaper.max_connection_age, None);
    assert_eq!(config.proxy.as_ref().map(|p| p.port), Some(3128));
}

#[test]
fn conflicting_caps_fail_to_build() {
    init_logging();
    let err = Transit::blocking()
        .max_connections(2)
        .max_connections_per_route(5)
        .build()
        .expect_err("per-route cap above total");
    assert!(matches!(err, ConfigError::Conflict(_)));
}

#[test]
fn blocking_bundle_sends_configured_headers() {
    init_logging();
    let addr = serve();
    let bundle = Transit::blocking()
        .header(HeaderName::from_static("x-tag"), HeaderValue::from_static("fixed"))
        .build()
        .expect("bundle");

    let response = bundle
        .client()
        .get(&format!("http://{addr}/tag"))
        .expect("response");
    assert_eq!(&response.body()[..], b"fixed");
    assert_eq!(bundle.reaper().state(), ReaperState::Running);

    bundle.shutdown();
    assert!(bundle.client().is_closed());
}

#[test]
fn default_header_yields_to_earlier_interceptors() {
    init_logging();
    let addr = serve();
    let bundle = Transit::blocking()
        .interceptor_fn("tag", |req| {
            req.headers_mut()
                .insert("x-tag", HeaderValue::from_static("explicit"));
            Ok(())
        })
        .default_header(HeaderName::from_static("x-tag"), HeaderValue::from_static("fallback"))
        .build()
        .expect("bundle");

    let response = bundle
        .client()
        .get(&format!("http://{addr}/tag"))
        .expect("response");
    assert_eq!(&response.body()[..], b"explicit");
}

#[tokio::test]
async fn non_blocking_bundle_runs_on_its_own_runtime() {
    init_logging();
    let addr = serve();
    let builder = Transit::blocking().io_threads(2).non_blocking();
    assert!(format!("{builder:?}").contains(&format!("{:?}", ExecutionModel::Async)));

    let bundle = builder
        .header(HeaderName::from_static("x-tag"), HeaderValue::from_static("async"))
        .build()
        .expect("bundle");
    let response = bundle
        .client()
        .get(&format!("http://{addr}/tag"))
        .await
        .expect("response");
    assert_eq!(&response.body()[..], b"async");

    assert!(bundle.shutdown_and_wait(Duration::from_secs(2)));
    assert_eq!(bundle.reaper().state(), ReaperState::Stopped);
}
