//! Route dispatcher demo service.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server (request id, trace, timeout, concurrency)
//!                         │
//!                         ▼
//!                     http::dispatch
//!                         │  routing::matcher   → 404 / 405 / OPTIONS
//!                         │  security::throttle → 429
//!                         │  security::auth     → 401
//!                         │  cache::store       → hit + Expires
//!                         │  routing::schema    → 400
//!                         ▼
//!                     handler → Reply → cache insert (2xx)
//!
//!     Cross-cutting: config (TOML + env + hot reload), observability
//!     (tracing, Prometheus), lifecycle (signals, graceful shutdown), admin API
//! ```
//!
//! Demo endpoints:
//! - `GET /user/:id`
//! - `GET /cache` (4s route ttl; needs `cache.limit > 0`)
//! - `GET /throttle` (4 hits per 8s)
//! - `GET /private/profile` (bearer token required)
//! - `POST /echo` (JSON object body)

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::Parser;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use route_dispatch::admin::{run_admin, AdminState};
use route_dispatch::config::{load_config, load_from_env, ConfigWatcher, DispatchConfig};
use route_dispatch::http::{Context, HandlerError, HttpServer, Reply};
use route_dispatch::lifecycle::{signals, Shutdown};
use route_dispatch::observability::{logging, metrics};
use route_dispatch::routing::{Endpoint, RouteTable, Scope, ValidationError};
use route_dispatch::security::{Principal, StaticTokens};

#[derive(Parser)]
#[command(name = "route-dispatch")]
#[command(about = "HTTP route dispatcher with response cache and throttle", long_about = None)]
struct Args {
    /// TOML config file; watched for changes. Defaults plus DISPATCH_* env otherwise.
    #[arg(short, long, env = "DISPATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Bearer token accepted by the demo authenticator.
    #[arg(long, env = "DISPATCH_DEMO_TOKEN", default_value = "demo-token")]
    demo_token: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => load_from_env()?,
    };

    logging::init_logging(&config.observability.log_level);
    tracing::info!("route-dispatch v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        prefix = %config.routing.prefix,
        version = ?config.routing.version,
        cache_ttl_secs = config.cache.ttl_secs,
        cache_limit = config.cache.limit,
        throttle_ttl_secs = config.throttle.ttl_secs,
        throttle_limit = config.throttle.limit,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Arc::new(Shutdown::new());
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = signals::listen(signal_shutdown).await {
            tracing::error!(error = %e, "Failed to install signal handlers");
        }
    });

    // The watcher handle must outlive the server.
    let (config_updates, _watcher) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path, config.clone());
            match watcher.run() {
                Ok(handle) => (updates, Some(handle)),
                Err(e) => {
                    tracing::error!(error = %e, "Config watcher failed to start; hot reload disabled");
                    (updates, None)
                }
            }
        }
        None => (mpsc::unbounded_channel().1, None),
    };

    let tokens = StaticTokens::new().with(
        args.demo_token.clone(),
        Principal {
            id: "demo-user".to_string(),
            claims: json!({"sub": "demo-user", "role": "reader"}),
        },
    );
    let server = HttpServer::new(config.clone(), demo_routes(&config)).with_authenticator(tokens);

    if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        let state = AdminState::new(server.state(), &config.admin.api_key);
        let admin_shutdown = shutdown.subscribe();
        tokio::spawn(async move {
            if let Err(e) = run_admin(listener, state, admin_shutdown).await {
                tracing::error!(error = %e, "Admin API stopped");
            }
        });
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn demo_routes(config: &DispatchConfig) -> RouteTable {
    let mut table = RouteTable::new(config.routing.clone());

    table
        .register(Endpoint::get("/user/:id", get_user))
        .register(Endpoint::get("/cache", cached_clock).cache_ttl(Duration::from_secs(4)))
        .register(Endpoint::get("/throttle", throttled).throttle(Duration::from_secs(8), 4))
        .register(Endpoint::post("/echo", echo).body_schema(json_object));

    table
        .scope(Scope::new("/private"))
        .register(Endpoint::get("/profile", profile).auth());

    table
}

async fn get_user(ctx: Context) -> Result<Reply, HandlerError> {
    let id = ctx
        .param("id")
        .ok_or_else(|| HandlerError::BadRequest("missing id".into()))?;
    Ok(Reply::json(json!({ "id": id })))
}

async fn cached_clock(_ctx: Context) -> Result<Reply, HandlerError> {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| HandlerError::Internal(e.to_string()))?
        .as_millis() as u64;
    Ok(Reply::json(json!({ "generated_at": millis })))
}

async fn throttled(_ctx: Context) -> Result<Reply, HandlerError> {
    Ok(Reply::json(json!({ "ok": true })))
}

async fn profile(ctx: Context) -> Result<Reply, HandlerError> {
    let principal = ctx
        .principal
        .ok_or_else(|| HandlerError::Unauthorized("no principal".into()))?;
    Ok(Reply::json(json!({ "id": principal.id, "claims": ctx.jwt })))
}

async fn echo(ctx: Context) -> Result<Reply, HandlerError> {
    Ok(Reply::json(ctx.body))
}

fn json_object(value: &Value) -> Result<Value, ValidationError> {
    match value {
        Value::Object(_) => Ok(value.clone()),
        _ => Err(ValidationError::new("expected a JSON object")),
    }
}
