//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router around the dispatcher
//! - Wire up middleware (tracing, timeout, concurrency limit, request ID)
//! - Bind server to listener
//! - Apply hot-reloaded cache / throttle defaults
//! - Stop accepting and drain on shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::DispatchConfig;
use crate::http::dispatch::{dispatch, DispatchState, Policy};
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::routing::RouteTable;
use crate::security::Authenticator;

/// HTTP server for the dispatcher.
pub struct HttpServer {
    config: DispatchConfig,
    state: DispatchState,
}

impl HttpServer {
    /// Create a server serving `routes`. The table is frozen from here on.
    pub fn new(config: DispatchConfig, routes: RouteTable) -> Self {
        tracing::info!(
            routes = routes.len(),
            conflicts = routes.conflicts().len(),
            "Route table frozen"
        );
        let state = DispatchState::new(routes, &config);
        Self { config, state }
    }

    /// Verify bearer tokens with `authenticator`. Without one, every
    /// `auth` route answers 401.
    pub fn with_authenticator(mut self, authenticator: impl Authenticator + 'static) -> Self {
        self.state.authenticator = Some(Arc::new(authenticator));
        self
    }

    /// Shared dispatcher state, e.g. for the admin API.
    pub fn state(&self) -> DispatchState {
        self.state.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Every path goes through the dispatcher fallback; the route table,
    /// not Axum, decides what matches.
    pub fn router(&self) -> Router {
        Router::new()
            .fallback(dispatch)
            .with_state(self.state.clone())
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                Duration::from_secs(self.config.timeouts.request_secs),
            ))
            .layer(ConcurrencyLimitLayer::new(self.config.listener.max_in_flight))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// `config_updates` carries reloaded configs; `shutdown` stops the
    /// accept loop and waits for in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<DispatchConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let policy = self.state.policy.clone();
        let routing = self.config.routing.clone();
        tokio::spawn(async move {
            while let Some(new_config) = config_updates.recv().await {
                if new_config.routing != routing {
                    tracing::warn!("Routing prefix/version changed; restart to apply");
                }
                let next = Policy::from(&new_config);
                policy.store(Arc::new(next));
                tracing::info!(
                    cache_ttl_secs = next.cache.ttl_secs,
                    cache_limit = next.cache.limit,
                    throttle_ttl_secs = next.throttle.ttl_secs,
                    throttle_limit = next.throttle.limit,
                    "Dispatch policy reloaded"
                );
            }
        });

        let app = self.router().into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
