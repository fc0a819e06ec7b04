//! HTTP method vocabulary for route registration.
//!
//! Routes are declared against a closed set of methods plus the `ALL`
//! catch-all. `HEAD` and `OPTIONS` are never registered directly: the
//! matcher answers `HEAD` from the `GET` entry and the dispatcher
//! synthesizes `OPTIONS`.

use std::fmt;
use std::str::FromStr;

use axum::http::Method;
use serde::{Deserialize, Serialize};

/// Method a route is registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RouteMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    /// Matches any method not registered explicitly on the same path.
    All,
}

impl RouteMethod {
    /// Concrete methods an `ALL` route stands in for.
    pub const CONCRETE: [RouteMethod; 5] = [
        RouteMethod::Get,
        RouteMethod::Post,
        RouteMethod::Put,
        RouteMethod::Patch,
        RouteMethod::Delete,
    ];

    /// Uppercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteMethod::Get => "GET",
            RouteMethod::Post => "POST",
            RouteMethod::Put => "PUT",
            RouteMethod::Patch => "PATCH",
            RouteMethod::Delete => "DELETE",
            RouteMethod::All => "ALL",
        }
    }

    /// Maps a request method onto a registrable one.
    /// Returns `None` for methods no route can be declared under (HEAD, OPTIONS, ...).
    pub fn from_http(method: &Method) -> Option<Self> {
        match *method {
            Method::GET => Some(RouteMethod::Get),
            Method::POST => Some(RouteMethod::Post),
            Method::PUT => Some(RouteMethod::Put),
            Method::PATCH => Some(RouteMethod::Patch),
            Method::DELETE => Some(RouteMethod::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown method name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported route method: {0}")]
pub struct UnknownMethod(pub String);

impl FromStr for RouteMethod {
    type Err = UnknownMethod;

    /// Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(RouteMethod::Get),
            "POST" => Ok(RouteMethod::Post),
            "PUT" => Ok(RouteMethod::Put),
            "PATCH" => Ok(RouteMethod::Patch),
            "DELETE" => Ok(RouteMethod::Delete),
            "ALL" => Ok(RouteMethod::All),
            _ => Err(UnknownMethod(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("get".parse::<RouteMethod>(), Ok(RouteMethod::Get));
        assert_eq!("Patch".parse::<RouteMethod>(), Ok(RouteMethod::Patch));
        assert_eq!("ALL".parse::<RouteMethod>(), Ok(RouteMethod::All));
        assert!("TRACE".parse::<RouteMethod>().is_err());
    }

    #[test]
    fn test_from_http() {
        assert_eq!(RouteMethod::from_http(&Method::DELETE), Some(RouteMethod::Delete));
        assert_eq!(RouteMethod::from_http(&Method::HEAD), None);
        assert_eq!(RouteMethod::from_http(&Method::OPTIONS), None);
    }
}
