//! Route declarations.
//!
//! An `Endpoint` is what application code writes; a `Route` is what the
//! table stores once the endpoint's path has been fused with its scope and
//! the router defaults.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::http::handler::Handler;
use crate::routing::method::RouteMethod;
use crate::routing::path::Segment;
use crate::routing::schema::{RouteSchemas, Schema};

/// Per-route throttle settings. Unset fields fall back to process defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ThrottleOverride {
    pub ttl: Option<Duration>,
    pub limit: Option<u64>,
    pub regrow: Option<bool>,
}

/// A registered, immutable route.
pub struct Route {
    /// Registration order; lower numbers were declared first.
    pub seq: usize,
    pub method: RouteMethod,
    /// Canonical fused pattern, e.g. `/api/v1/user/:id`.
    pub pattern: String,
    pub segments: Vec<Segment>,
    pub handler: Arc<dyn Handler>,
    pub schemas: RouteSchemas,
    /// Requests must carry a valid bearer token.
    pub auth: bool,
    /// `Some(ZERO)` disables caching for this route.
    pub cache_ttl: Option<Duration>,
    pub throttle: ThrottleOverride,
}

impl Route {
    /// Placeholder names in path order, e.g. `["org", "id"]` for
    /// `/org/:org/user/:id`.
    pub fn param_names(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Param(name) => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("seq", &self.seq)
            .field("method", &self.method)
            .field("pattern", &self.pattern)
            .field("auth", &self.auth)
            .field("cache_ttl", &self.cache_ttl)
            .field("throttle", &self.throttle)
            .field("schemas", &self.schemas)
            .finish_non_exhaustive()
    }
}

/// Sub-router configuration: a base path plus optional version/prefix
/// overriding the router defaults.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub base: String,
    pub version: Option<u32>,
    pub prefix: Option<String>,
}

impl Scope {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            ..Self::default()
        }
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }
}

/// Builder for a single route declaration.
pub struct Endpoint {
    pub(crate) method: RouteMethod,
    pub(crate) path: String,
    pub(crate) handler: Arc<dyn Handler>,
    pub(crate) version: Option<u32>,
    pub(crate) prefix: Option<String>,
    pub(crate) auth: bool,
    pub(crate) cache_ttl: Option<Duration>,
    pub(crate) throttle: ThrottleOverride,
    pub(crate) schemas: RouteSchemas,
}

impl Endpoint {
    pub fn new(method: RouteMethod, path: impl Into<String>, handler: impl Handler) -> Self {
        Self {
            method,
            path: path.into(),
            handler: Arc::new(handler),
            version: None,
            prefix: None,
            auth: false,
            cache_ttl: None,
            throttle: ThrottleOverride::default(),
            schemas: RouteSchemas::default(),
        }
    }

    pub fn get(path: impl Into<String>, handler: impl Handler) -> Self {
        Self::new(RouteMethod::Get, path, handler)
    }

    pub fn post(path: impl Into<String>, handler: impl Handler) -> Self {
        Self::new(RouteMethod::Post, path, handler)
    }

    pub fn put(path: impl Into<String>, handler: impl Handler) -> Self {
        Self::new(RouteMethod::Put, path, handler)
    }

    pub fn patch(path: impl Into<String>, handler: impl Handler) -> Self {
        Self::new(RouteMethod::Patch, path, handler)
    }

    pub fn delete(path: impl Into<String>, handler: impl Handler) -> Self {
        Self::new(RouteMethod::Delete, path, handler)
    }

    pub fn all(path: impl Into<String>, handler: impl Handler) -> Self {
        Self::new(RouteMethod::All, path, handler)
    }

    /// Overrides the scope/router API version for this endpoint only.
    pub fn version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }

    /// Overrides the scope/router global prefix for this endpoint only.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn auth(mut self) -> Self {
        self.auth = true;
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    pub fn throttle(mut self, ttl: Duration, limit: u64) -> Self {
        self.throttle.ttl = Some(ttl);
        self.throttle.limit = Some(limit);
        self
    }

    pub fn throttle_regrow(mut self, regrow: bool) -> Self {
        self.throttle.regrow = Some(regrow);
        self
    }

    pub fn param_schema(mut self, schema: impl Schema + 'static) -> Self {
        self.schemas.param = Some(Arc::new(schema));
        self
    }

    pub fn query_schema(mut self, schema: impl Schema + 'static) -> Self {
        self.schemas.query = Some(Arc::new(schema));
        self
    }

    pub fn body_schema(mut self, schema: impl Schema + 'static) -> Self {
        self.schemas.body = Some(Arc::new(schema));
        self
    }

    pub fn jwt_schema(mut self, schema: impl Schema + 'static) -> Self {
        self.schemas.jwt = Some(Arc::new(schema));
        self
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("version", &self.version)
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}
