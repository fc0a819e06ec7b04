use std::time::Instant;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::admin::AdminState;
use crate::cache::CacheSnapshot;
use crate::http::Policy;
use crate::routing::{RouteConflict, RouteMethod};
use crate::security::throttle::ThrottleSnapshot;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub routes: usize,
    pub conflicts: usize,
}

#[derive(Serialize)]
pub struct RouteInfo {
    pub method: RouteMethod,
    pub pattern: String,
    pub params: Vec<String>,
    pub auth: bool,
    pub cache_ttl_secs: Option<u64>,
    pub throttle_ttl_secs: Option<u64>,
    pub throttle_limit: Option<u64>,
}

#[derive(Serialize)]
pub struct RouteListing {
    pub routes: Vec<RouteInfo>,
    /// Registrations dropped because an earlier route already owned them.
    pub conflicts: Vec<RouteConflict>,
}

#[derive(Serialize)]
pub struct ThrottleStatus {
    pub ttl_secs: u64,
    pub limit: u64,
    pub regrow: bool,
    #[serde(flatten)]
    pub counters: ThrottleSnapshot,
}

#[derive(Deserialize)]
pub struct ClearParams {
    /// Evict one url instead of everything.
    pub url: Option<String>,
}

#[derive(Serialize)]
pub struct ClearResult {
    pub removed: usize,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: state.started.elapsed().as_secs(),
        routes: state.dispatch.routes.len(),
        conflicts: state.dispatch.routes.conflicts().len(),
    })
}

pub async fn get_routes(State(state): State<AdminState>) -> Json<RouteListing> {
    let table = &state.dispatch.routes;
    let routes = table
        .routes()
        .iter()
        .map(|r| RouteInfo {
            method: r.method,
            pattern: r.pattern.clone(),
            params: r.param_names().into_iter().map(str::to_string).collect(),
            auth: r.auth,
            cache_ttl_secs: r.cache_ttl.map(|d| d.as_secs()),
            throttle_ttl_secs: r.throttle.ttl.map(|d| d.as_secs()),
            throttle_limit: r.throttle.limit,
        })
        .collect();

    Json(RouteListing {
        routes,
        conflicts: table.conflicts().to_vec(),
    })
}

pub async fn get_cache(State(state): State<AdminState>) -> Json<CacheSnapshot> {
    Json(state.dispatch.cache.snapshot())
}

pub async fn clear_cache(
    State(state): State<AdminState>,
    Query(params): Query<ClearParams>,
) -> Json<ClearResult> {
    let cache = &state.dispatch.cache;
    let removed = match params.url {
        Some(url) => cache.evict(&url),
        None => cache.clear(),
    };
    tracing::info!(removed, "Cache cleared via admin API");
    Json(ClearResult { removed })
}

pub async fn get_throttle(State(state): State<AdminState>) -> Json<ThrottleStatus> {
    let Policy { throttle, .. } = **state.dispatch.policy.load();
    Json(ThrottleStatus {
        ttl_secs: throttle.ttl_secs,
        limit: throttle.limit,
        regrow: throttle.regrow,
        counters: state.dispatch.throttle.snapshot(Instant::now()),
    })
}
