//! Route matching logic.
//!
//! # Responsibilities
//! - Walk the segment tree for a request path
//! - Resolve the method at the matched node (exact, HEAD→GET, ALL)
//! - Tell "no such path" apart from "path exists, method doesn't"
//! - Collect every route on a path for synthetic OPTIONS answers
//!
//! # Design Decisions
//! - Literal children are tried before placeholders at every depth
//! - Placeholders are tried in creation order; first full match wins
//! - A path match is decided before the method is looked at, so a method
//!   miss never backtracks into another branch
//! - Bound values stay strings; coercion belongs to route schemas

use std::sync::Arc;

use axum::http::Method;
use serde_json::{Map, Value};

use crate::routing::method::RouteMethod;
use crate::routing::path::split_path;
use crate::routing::route::Route;
use crate::routing::table::{Node, RouteTable};

/// A successful match: the route and its bound placeholders, in path order.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub route: Arc<Route>,
    pub params: Vec<(String, String)>,
}

impl RouteMatch {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Placeholders as a JSON object, the shape route schemas receive.
    pub fn params_value(&self) -> Value {
        let map: Map<String, Value> = self
            .params
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        Value::Object(map)
    }
}

/// Outcome of matching a (method, path) pair.
#[derive(Debug, Clone)]
pub enum RouteLookup {
    Found(RouteMatch),
    /// The path exists but has no route for this method.
    MethodNotAllowed { allowed: Vec<RouteMethod> },
    NotFound,
}

impl RouteTable {
    /// Match a request against the table.
    pub fn lookup(&self, method: &Method, path: &str) -> RouteLookup {
        let segments = split_path(path);
        let mut params = Vec::new();

        let Some(node) = walk(&self.root, &segments, &mut params) else {
            return RouteLookup::NotFound;
        };

        match resolve(node, method) {
            Some(route) => RouteLookup::Found(RouteMatch { route, params }),
            None => RouteLookup::MethodNotAllowed {
                allowed: node.methods.keys().copied().collect(),
            },
        }
    }

    /// Every route whose pattern matches `path`, across all methods and all
    /// matching branches, in registration order.
    pub fn routes_for_path(&self, path: &str) -> Vec<Arc<Route>> {
        let segments = split_path(path);
        let mut found = Vec::new();
        walk_all(&self.root, &segments, &mut found);
        found.sort_by_key(|route| route.seq);
        found.dedup_by_key(|route| route.seq);
        found
    }
}

fn walk<'a>(node: &'a Node, segments: &[&str], params: &mut Vec<(String, String)>) -> Option<&'a Node> {
    let Some((head, rest)) = segments.split_first() else {
        return (!node.methods.is_empty()).then_some(node);
    };

    if let Some(child) = node.literals.get(*head) {
        if let Some(found) = walk(child, rest, params) {
            return Some(found);
        }
    }

    for param in &node.params {
        params.push((param.name.clone(), (*head).to_string()));
        if let Some(found) = walk(&param.node, rest, params) {
            return Some(found);
        }
        params.pop();
    }

    None
}

fn walk_all(node: &Node, segments: &[&str], found: &mut Vec<Arc<Route>>) {
    let Some((head, rest)) = segments.split_first() else {
        found.extend(node.methods.values().cloned());
        return;
    };

    if let Some(child) = node.literals.get(*head) {
        walk_all(child, rest, found);
    }
    for param in &node.params {
        walk_all(&param.node, rest, found);
    }
}

fn resolve(node: &Node, method: &Method) -> Option<Arc<Route>> {
    let exact = RouteMethod::from_http(method).and_then(|m| node.methods.get(&m));
    let head = if *method == Method::HEAD {
        node.methods.get(&RouteMethod::Get)
    } else {
        None
    };

    exact
        .or(head)
        .or_else(|| node.methods.get(&RouteMethod::All))
        .cloned()
}

/// Renders an `Allow` header value: uppercase, comma-joined, no duplicates.
/// `ALL` expands to the concrete methods it stands in for.
pub fn allow_header<I>(methods: I) -> String
where
    I: IntoIterator<Item = RouteMethod>,
{
    let mut names: Vec<&'static str> = Vec::new();
    for method in methods {
        let expanded: &[RouteMethod] = if method == RouteMethod::All {
            &RouteMethod::CONCRETE
        } else {
            std::slice::from_ref(&method)
        };
        for m in expanded {
            if !names.contains(&m.as_str()) {
                names.push(m.as_str());
            }
        }
    }
    names.join(",")
}
