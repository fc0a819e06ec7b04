//! Admin inspection API.
//!
//! # Responsibilities
//! - Report process status and the frozen route table
//! - Expose cache and throttle statistics; allow clearing the cache
//!
//! # Design Decisions
//! - Served on its own listener, never through the dispatcher
//! - Every endpoint requires `Authorization: Bearer <admin.api_key>`

pub mod auth;
pub mod handlers;

use std::sync::Arc;
use std::time::Instant;

use axum::{middleware, routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::http::DispatchState;
use self::auth::admin_auth_middleware;
use self::handlers::*;

/// State shared by admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub dispatch: DispatchState,
    pub api_key: Arc<str>,
    pub started: Instant,
}

impl AdminState {
    pub fn new(dispatch: DispatchState, api_key: &str) -> Self {
        Self {
            dispatch,
            api_key: Arc::from(api_key),
            started: Instant::now(),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/routes", get(get_routes))
        .route("/admin/cache", get(get_cache).delete(clear_cache))
        .route("/admin/throttle", get(get_throttle))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}

/// Serve the admin API until shutdown.
pub async fn run_admin(
    listener: TcpListener,
    state: AdminState,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    tracing::info!(address = %listener.local_addr()?, "Admin API listening");
    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
}
