//! The request pipeline.
//!
//! # Data Flow
//! ```text
//! Request
//!     → OPTIONS? answer Allow / access-control headers from the route table
//!     → match route (404 / 405)
//!     → throttle (429)
//!     → authenticate (401 on `auth` routes)
//!     → cache lookup (hit → reply + Expires)
//!     → parse query/body, run route schemas (400 / 413)
//!     → handler
//!     → cache insert (2xx only)
//! ```
//!
//! # Design Decisions
//! - Every early exit is a `DispatchError` value rendered as a response
//! - Policy defaults are read once per request from an `ArcSwap`, so a
//!   reload never changes settings mid-request
//! - Throttle criteria is the remote IP, endpoint the matched pattern;
//!   cache identity is the principal

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use arc_swap::ArcSwap;
use axum::body::{Body, Bytes};
use axum::extract::{ConnectInfo, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use serde_json::{Map, Value};

use crate::cache::{cache_options, CacheHit, CacheKey, CacheStore};
use crate::config::{CacheConfig, DispatchConfig, ThrottleConfig};
use crate::http::error::DispatchError;
use crate::http::handler::Context;
use crate::http::request::request_id;
use crate::observability::metrics;
use crate::routing::schema::apply;
use crate::routing::{allow_header, Route, RouteLookup, RouteMethod, RouteTable, ValidationError};
use crate::security::auth::{bearer_token, AuthError, Authenticator, Principal};
use crate::security::throttle::{throttle_options, ThrottleKey, ThrottleStore};

/// Process defaults that may change at runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Policy {
    pub cache: CacheConfig,
    pub throttle: ThrottleConfig,
}

impl From<&DispatchConfig> for Policy {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            cache: config.cache,
            throttle: config.throttle,
        }
    }
}

/// Shared state behind the dispatcher. Cheap to clone.
#[derive(Clone)]
pub struct DispatchState {
    pub routes: Arc<RouteTable>,
    pub cache: Arc<CacheStore>,
    pub throttle: Arc<ThrottleStore>,
    pub policy: Arc<ArcSwap<Policy>>,
    pub authenticator: Option<Arc<dyn Authenticator>>,
    pub max_body_size: usize,
}

impl DispatchState {
    pub fn new(routes: RouteTable, config: &DispatchConfig) -> Self {
        Self {
            routes: Arc::new(routes),
            cache: Arc::new(CacheStore::new()),
            throttle: Arc::new(ThrottleStore::new()),
            policy: Arc::new(ArcSwap::from_pointee(Policy::from(config))),
            authenticator: None,
            max_body_size: config.security.max_body_size,
        }
    }
}

/// Fallback handler serving every request through the route table.
pub async fn dispatch(
    State(state): State<DispatchState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let request_id = request_id(&request).to_string();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let mut route_label = String::from("none");
    let response = match handle(&state, addr, request, &mut route_label).await {
        Ok(response) => response,
        Err(e) => {
            match e.status() {
                s if s.is_server_error() => {
                    tracing::error!(request_id = %request_id, route = %route_label, error = %e, "Request failed")
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    tracing::warn!(request_id = %request_id, client = %addr.ip(), path = %path, "Request throttled")
                }
                _ => tracing::debug!(request_id = %request_id, path = %path, error = %e, "Request rejected"),
            }
            e.into_response()
        }
    };

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        route = %route_label,
        status = response.status().as_u16(),
        "Request dispatched"
    );
    metrics::record_request(method.as_str(), response.status().as_u16(), &route_label, start);
    response
}

async fn handle(
    state: &DispatchState,
    addr: SocketAddr,
    request: Request<Body>,
    route_label: &mut String,
) -> Result<Response, DispatchError> {
    let now = Instant::now();

    if request.method() == Method::OPTIONS {
        return options_response(&state.routes, request.uri().path());
    }

    let matched = match state.routes.lookup(request.method(), request.uri().path()) {
        RouteLookup::Found(matched) => matched,
        RouteLookup::MethodNotAllowed { allowed } => {
            return Err(DispatchError::MethodNotAllowed {
                allow: allow_header(allowed),
            })
        }
        RouteLookup::NotFound => return Err(DispatchError::NotFound),
    };
    let route = matched.route.clone();
    route_label.clone_from(&route.pattern);
    let policy = **state.policy.load();

    let throttle = throttle_options(&route, &policy.throttle);
    if throttle.enabled {
        // Keyed by the matched pattern: every spelling of a path and every
        // placeholder value share one window.
        let key = ThrottleKey::new(
            addr.ip().to_string(),
            route.pattern.as_str(),
            request.method().as_str(),
        );
        let entry = state.throttle.lookup(key, throttle.ttl, now);
        if !throttle.admits(&entry) {
            metrics::record_throttled(&route.pattern);
            return Err(DispatchError::TooManyRequests {
                retry_after_secs: entry.retry_after_secs(now),
            });
        }
    }

    let principal = authenticate(state.authenticator.as_deref(), &route, request.headers())?;

    let cache = cache_options(request.method(), request.headers(), &route, &policy.cache);
    let cache_key = cache
        .enabled
        .then(|| CacheKey::from_request(request.uri(), request.headers(), principal.as_ref()));
    if let Some(key) = &cache_key {
        if let Some(hit) = state.cache.lookup(key, now) {
            return Ok(cached_response(hit, now));
        }
    }

    let (parts, body) = request.into_parts();
    let query = parse_query(&parts.uri)?;
    let body = read_body(body, &parts.headers, state.max_body_size).await?;

    let schemas = &route.schemas;
    let params = apply(schemas.param.as_ref(), matched.params_value())
        .map_err(|e| DispatchError::validation("param", e))?;
    let query = apply(schemas.query.as_ref(), query).map_err(|e| DispatchError::validation("query", e))?;
    let body = apply(schemas.body.as_ref(), body).map_err(|e| DispatchError::validation("body", e))?;
    let jwt = principal
        .as_ref()
        .map(|p| apply(schemas.jwt.as_ref(), p.claims.clone()))
        .transpose()
        .map_err(|e| DispatchError::validation("jwt", e))?;

    let ctx = Context {
        method: parts.method,
        uri: parts.uri,
        headers: parts.headers,
        params,
        query,
        body,
        jwt,
        principal,
    };
    let reply = route.handler.call(ctx).await?;

    if let Some(key) = cache_key {
        if reply.status.is_success() {
            state
                .cache
                .insert(key, reply.clone(), cache.ttl, cache.limit, Instant::now());
        }
    }

    Ok(reply.into_response())
}

/// Synthetic OPTIONS answer.
///
/// Plain path groups get an `Allow` header; groups containing
/// authenticated routes get access-control headers restricted to the
/// authenticated methods instead.
fn options_response(routes: &RouteTable, path: &str) -> Result<Response, DispatchError> {
    let matched = routes.routes_for_path(path);
    if matched.is_empty() {
        return Err(DispatchError::NotFound);
    }

    let authenticated: Vec<RouteMethod> = matched.iter().filter(|r| r.auth).map(|r| r.method).collect();
    let mut response = StatusCode::NO_CONTENT.into_response();
    let headers = response.headers_mut();

    if authenticated.is_empty() {
        if let Ok(allow) = HeaderValue::from_str(&allow_header(matched.iter().map(|r| r.method))) {
            headers.insert(header::ALLOW, allow);
        }
    } else {
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("authorization"),
        );
        if let Ok(methods) = HeaderValue::from_str(&allow_header(authenticated)) {
            headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, methods);
        }
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
    }
    Ok(response)
}

fn authenticate(
    authenticator: Option<&dyn Authenticator>,
    route: &Route,
    headers: &HeaderMap,
) -> Result<Option<Principal>, DispatchError> {
    let outcome = match (authenticator, bearer_token(headers)) {
        (_, None) => Err(AuthError::Missing),
        (None, Some(_)) => Err(AuthError::Invalid),
        (Some(auth), Some(token)) => auth.authenticate(token),
    };

    match outcome {
        Ok(principal) => Ok(Some(principal)),
        Err(e) if route.auth => Err(e.into()),
        // Public routes ignore bad or absent credentials.
        Err(_) => Ok(None),
    }
}

fn cached_response(hit: CacheHit, now: Instant) -> Response {
    let expires = SystemTime::now() + hit.expires_at.saturating_duration_since(now);
    let mut response = hit.reply.into_response();
    if let Ok(value) = HeaderValue::from_str(&httpdate::fmt_http_date(expires)) {
        response.headers_mut().insert(header::EXPIRES, value);
    }
    response
}

fn parse_query(uri: &Uri) -> Result<Value, DispatchError> {
    let Query(pairs) = Query::<HashMap<String, String>>::try_from_uri(uri)
        .map_err(|e| DispatchError::validation("query", ValidationError::new(e.body_text())))?;
    let map: Map<String, Value> = pairs.into_iter().map(|(k, v)| (k, Value::String(v))).collect();
    Ok(Value::Object(map))
}

async fn read_body(body: Body, headers: &HeaderMap, limit: usize) -> Result<Value, DispatchError> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > limit) {
        return Err(DispatchError::PayloadTooLarge);
    }

    let bytes = axum::body::to_bytes(body, limit)
        .await
        .map_err(|_| DispatchError::PayloadTooLarge)?;
    decode_body(&bytes, headers)
}

fn decode_body(bytes: &Bytes, headers: &HeaderMap) -> Result<Value, DispatchError> {
    if bytes.is_empty() {
        return Ok(Value::Null);
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/json");

    if content_type.starts_with("application/json") {
        serde_json::from_slice(bytes).map_err(|e| DispatchError::MalformedBody(e.to_string()))
    } else {
        std::str::from_utf8(bytes)
            .map(|text| Value::String(text.to_string()))
            .map_err(|_| DispatchError::MalformedBody(format!("unsupported body for {}", content_type)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_body() {
        let mut headers = HeaderMap::new();
        assert_eq!(decode_body(&Bytes::new(), &headers).unwrap(), Value::Null);
        assert_eq!(
            decode_body(&Bytes::from(r#"{"a":1}"#), &headers).unwrap(),
            json!({"a": 1})
        );
        assert!(matches!(
            decode_body(&Bytes::from("{nope"), &headers),
            Err(DispatchError::MalformedBody(_))
        ));

        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        assert_eq!(decode_body(&Bytes::from("hi"), &headers).unwrap(), json!("hi"));
    }

    #[test]
    fn test_parse_query() {
        let uri: Uri = "/search?q=rust&page=2".parse().unwrap();
        assert_eq!(parse_query(&uri).unwrap(), json!({"q": "rust", "page": "2"}));

        let uri: Uri = "/search".parse().unwrap();
        assert_eq!(parse_query(&uri).unwrap(), json!({}));
    }
}
