//! Cache eligibility and key derivation.

use std::time::Duration;

use axum::http::{header, HeaderMap, Method, Uri};
use serde::Serialize;

use crate::config::CacheConfig;
use crate::routing::Route;
use crate::security::auth::Principal;

/// Identity used when the caller is not authenticated.
pub const PUBLIC_IDENTITY: &str = "public";

/// Language used when the request has no `accept-language`.
pub const GLOBAL_LANGUAGE: &str = "global";

/// Effective cache settings for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOptions {
    pub enabled: bool,
    pub ttl: Duration,
    pub limit: usize,
}

/// Decide whether a request may be served from / written to the cache.
///
/// The route's ttl wins over the default; an override of zero switches
/// caching off for that route. Only `GET` requests without
/// `cache-control: no-cache` are eligible.
pub fn cache_options(
    method: &Method,
    headers: &HeaderMap,
    route: &Route,
    defaults: &CacheConfig,
) -> CacheOptions {
    let ttl = route.cache_ttl.unwrap_or_else(|| defaults.ttl());
    let limit = defaults.limit;
    let enabled = !ttl.is_zero() && limit > 0 && *method == Method::GET && !no_cache(headers);

    CacheOptions { enabled, ttl, limit }
}

fn no_cache(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::CACHE_CONTROL)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|directive| directive.trim().eq_ignore_ascii_case("no-cache"))
}

/// Location of one cached response: url × identity × language.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CacheKey {
    /// Path plus query string.
    pub url: String,
    pub identity: String,
    pub language: String,
}

impl CacheKey {
    pub fn new(url: impl Into<String>, identity: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            identity: identity.into(),
            language: language.into(),
        }
    }

    pub fn from_request(uri: &Uri, headers: &HeaderMap, principal: Option<&Principal>) -> Self {
        let url = uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| uri.path().to_string());
        Self {
            url,
            identity: identity(principal),
            language: language(headers),
        }
    }
}

/// Authenticated principal id, or `"public"`.
pub fn identity(principal: Option<&Principal>) -> String {
    principal
        .map(|p| p.id.clone())
        .unwrap_or_else(|| PUBLIC_IDENTITY.to_string())
}

/// Lowercased `accept-language`, or `"global"`.
pub fn language(headers: &HeaderMap) -> String {
    headers
        .get(header::ACCEPT_LANGUAGE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_lowercase)
        .unwrap_or_else(|| GLOBAL_LANGUAGE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoutingConfig;
    use crate::http::handler::{Context, HandlerError, Reply};
    use crate::routing::{Endpoint, RouteTable};
    use axum::http::HeaderValue;
    use serde_json::json;
    use std::sync::Arc;

    async fn ok(_ctx: Context) -> Result<Reply, HandlerError> {
        Ok(Reply::empty())
    }

    fn route(endpoint: Endpoint) -> Arc<Route> {
        let mut table = RouteTable::new(RoutingConfig::default());
        table.register(endpoint);
        table.routes()[0].clone()
    }

    const DEFAULTS: CacheConfig = CacheConfig { ttl_secs: 4, limit: 8 };

    #[test]
    fn test_defaults_enable_get() {
        let route = route(Endpoint::get("/cache", ok));
        let opts = cache_options(&Method::GET, &HeaderMap::new(), &route, &DEFAULTS);
        assert_eq!(
            opts,
            CacheOptions {
                enabled: true,
                ttl: Duration::from_secs(4),
                limit: 8
            }
        );

        let opts = cache_options(&Method::POST, &HeaderMap::new(), &route, &DEFAULTS);
        assert!(!opts.enabled);
    }

    #[test]
    fn test_route_override() {
        let disabled = route(Endpoint::get("/live", ok).cache_ttl(Duration::ZERO));
        assert!(!cache_options(&Method::GET, &HeaderMap::new(), &disabled, &DEFAULTS).enabled);

        let longer = route(Endpoint::get("/slow", ok).cache_ttl(Duration::from_secs(60)));
        let no_default = CacheConfig { ttl_secs: 0, limit: 8 };
        let opts = cache_options(&Method::GET, &HeaderMap::new(), &longer, &no_default);
        assert!(opts.enabled);
        assert_eq!(opts.ttl, Duration::from_secs(60));

        let no_limit = CacheConfig { ttl_secs: 4, limit: 0 };
        assert!(!cache_options(&Method::GET, &HeaderMap::new(), &longer, &no_limit).enabled);
    }

    #[test]
    fn test_no_cache_header_bypasses() {
        let route = route(Endpoint::get("/cache", ok));
        let mut headers = HeaderMap::new();
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("max-age=0, No-Cache"));
        assert!(!cache_options(&Method::GET, &headers, &route, &DEFAULTS).enabled);

        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("max-age=60"));
        assert!(cache_options(&Method::GET, &headers, &route, &DEFAULTS).enabled);
    }

    #[test]
    fn test_key_derivation() {
        let uri: Uri = "/search?q=rust".parse().unwrap();
        let mut headers = HeaderMap::new();

        let key = CacheKey::from_request(&uri, &headers, None);
        assert_eq!(key, CacheKey::new("/search?q=rust", "public", "global"));

        headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static("EN-us"));
        let principal = Principal {
            id: "u-7".into(),
            claims: json!({}),
        };
        let key = CacheKey::from_request(&uri, &headers, Some(&principal));
        assert_eq!(key, CacheKey::new("/search?q=rust", "u-7", "en-us"));
    }
}
