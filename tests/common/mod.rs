//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{Request, Response};
use axum::Router;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tower::ServiceExt;

use route_dispatch::config::DispatchConfig;
use route_dispatch::http::{Context, HandlerError, HttpServer, Reply};
use route_dispatch::lifecycle::Shutdown;
use route_dispatch::security::{Principal, StaticTokens};

pub const CLIENT_ADDR: ([u8; 4], u16) = ([127, 0, 0, 1], 40_000);
pub const TOKEN: &str = "t0ken";

/// Router for in-process requests; every request appears to come from
/// `CLIENT_ADDR`.
pub fn app(server: &HttpServer) -> Router {
    server.router().layer(MockConnectInfo(SocketAddr::from(CLIENT_ADDR)))
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

pub fn tokens() -> StaticTokens {
    StaticTokens::new().with(
        TOKEN,
        Principal {
            id: "alice".to_string(),
            claims: json!({"sub": "alice"}),
        },
    )
}

pub async fn ok(_ctx: Context) -> Result<Reply, HandlerError> {
    Ok(Reply::json(json!({"ok": true})))
}

pub async fn echo_params(ctx: Context) -> Result<Reply, HandlerError> {
    Ok(Reply::json(ctx.params))
}

pub fn config() -> DispatchConfig {
    let mut config = DispatchConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config
}

/// A server running on a real socket.
pub struct Running {
    pub addr: SocketAddr,
    pub shutdown: Arc<Shutdown>,
    pub updates: mpsc::UnboundedSender<DispatchConfig>,
    pub handle: JoinHandle<Result<(), std::io::Error>>,
}

pub async fn spawn_server(server: HttpServer) -> Running {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Arc::new(Shutdown::new());
    let (updates, config_updates) = mpsc::unbounded_channel();
    let server_shutdown = shutdown.subscribe();

    let handle = tokio::spawn(async move { server.run(listener, config_updates, server_shutdown).await });

    Running {
        addr,
        shutdown,
        updates,
        handle,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
