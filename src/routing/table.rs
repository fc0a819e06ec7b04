//! Route table: a segment tree built once at startup.
//!
//! # Responsibilities
//! - Fuse endpoint paths with scope and router defaults
//! - Store routes in a tree keyed by path segment
//! - Reject a second route for the same (pattern, method)
//!
//! # Design Decisions
//! - Built through `&mut self`, then frozen behind `Arc` (no locks on lookup)
//! - Conflicts are logged and recorded, never fatal: the earlier route wins
//! - Placeholder children keep the order in which they were first created,
//!   which is the order of the lowest route sequence number using them

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;

use crate::config::RoutingConfig;
use crate::routing::method::RouteMethod;
use crate::routing::path::{fuse, parse_pattern, render_pattern, Segment};
use crate::routing::route::{Endpoint, Route, Scope};

/// A placeholder edge in the tree.
#[derive(Debug)]
pub(crate) struct ParamChild {
    pub(crate) name: String,
    /// Sequence number of the route that created this edge.
    pub(crate) first_seq: usize,
    pub(crate) node: Node,
}

#[derive(Debug, Default)]
pub(crate) struct Node {
    pub(crate) literals: HashMap<String, Node>,
    /// Ordered by `first_seq`.
    pub(crate) params: Vec<ParamChild>,
    pub(crate) methods: BTreeMap<RouteMethod, Arc<Route>>,
}

impl Node {
    fn child_mut(&mut self, segment: &Segment, seq: usize) -> &mut Node {
        match segment {
            Segment::Literal(lit) => self.literals.entry(lit.clone()).or_default(),
            Segment::Param(name) => {
                let idx = match self.params.iter().position(|p| &p.name == name) {
                    Some(idx) => idx,
                    None => {
                        let idx = self.params.partition_point(|p| p.first_seq <= seq);
                        self.params.insert(
                            idx,
                            ParamChild {
                                name: name.clone(),
                                first_seq: seq,
                                node: Node::default(),
                            },
                        );
                        idx
                    }
                };
                &mut self.params[idx].node
            }
        }
    }
}

/// A rejected registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteConflict {
    pub method: RouteMethod,
    pub pattern: String,
}

/// The frozen set of routes a dispatcher serves.
#[derive(Debug)]
pub struct RouteTable {
    pub(crate) root: Node,
    routes: Vec<Arc<Route>>,
    conflicts: Vec<RouteConflict>,
    defaults: RoutingConfig,
    next_seq: usize,
}

impl RouteTable {
    /// Create an empty table with router-construction defaults.
    pub fn new(defaults: RoutingConfig) -> Self {
        Self {
            root: Node::default(),
            routes: Vec::new(),
            conflicts: Vec::new(),
            defaults,
            next_seq: 0,
        }
    }

    /// Register an endpoint at the root scope.
    pub fn register(&mut self, endpoint: Endpoint) -> &mut Self {
        self.insert(&Scope::default(), endpoint);
        self
    }

    /// Open a sub-router. Endpoints registered through it get the scope's
    /// base path, and its version/prefix unless they override them.
    pub fn scope(&mut self, scope: Scope) -> ScopedTable<'_> {
        ScopedTable { table: self, scope }
    }

    /// All accepted routes, in registration order.
    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    /// Registrations rejected as ambiguous.
    pub fn conflicts(&self) -> &[RouteConflict] {
        &self.conflicts
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    fn insert(&mut self, scope: &Scope, endpoint: Endpoint) {
        let version = endpoint.version.or(scope.version).or(self.defaults.version);
        let prefix = endpoint
            .prefix
            .as_deref()
            .or(scope.prefix.as_deref())
            .unwrap_or(&self.defaults.prefix);
        let fused = fuse(prefix, version, &scope.base, &endpoint.path);
        let segments = parse_pattern(&fused);
        let pattern = render_pattern(&segments);
        let seq = self.next_seq;

        let mut node = &mut self.root;
        for segment in &segments {
            node = node.child_mut(segment, seq);
        }

        if node.methods.contains_key(&endpoint.method) {
            tracing::warn!(
                method = %endpoint.method,
                pattern = %pattern,
                "Ambiguous route ignored; keeping earlier registration"
            );
            self.conflicts.push(RouteConflict {
                method: endpoint.method,
                pattern,
            });
            return;
        }

        let route = Arc::new(Route {
            seq,
            method: endpoint.method,
            pattern,
            segments,
            handler: endpoint.handler,
            schemas: endpoint.schemas,
            auth: endpoint.auth,
            cache_ttl: endpoint.cache_ttl,
            throttle: endpoint.throttle,
        });

        tracing::debug!(method = %route.method, pattern = %route.pattern, "Route registered");
        node.methods.insert(route.method, route.clone());
        self.routes.push(route);
        self.next_seq += 1;
    }
}

/// Registration handle bound to a `Scope`.
pub struct ScopedTable<'a> {
    table: &'a mut RouteTable,
    scope: Scope,
}

impl ScopedTable<'_> {
    pub fn register(&mut self, endpoint: Endpoint) -> &mut Self {
        self.table.insert(&self.scope, endpoint);
        self
    }
}
