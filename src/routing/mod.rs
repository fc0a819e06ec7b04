//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Registration (at startup):
//!     Endpoint (method, path, handler, overrides)
//!     → path.rs (fuse prefix / version / scope base / path)
//!     → table.rs (insert into segment tree, reject duplicates)
//!     → Freeze as Arc<RouteTable>
//!
//! Incoming Request (method, path):
//!     → matcher.rs (walk tree: literal first, then placeholders)
//!     → Return: Found(route, params) | MethodNotAllowed | NotFound
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (segment tree only)
//! - Deterministic: same input always matches same route
//! - First match wins (ordered by registration)

pub mod matcher;
pub mod method;
pub mod path;
pub mod route;
pub mod schema;
pub mod table;

pub use matcher::{allow_header, RouteLookup, RouteMatch};
pub use method::RouteMethod;
pub use route::{Endpoint, Route, Scope, ThrottleOverride};
pub use schema::{RouteSchemas, Schema, ValidationError};
pub use table::{RouteConflict, RouteTable};
