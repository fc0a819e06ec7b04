//! Path helpers shared by registration and matching.

use std::fmt;

/// One slash-delimited piece of a route pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Must equal the request segment exactly (case-sensitive).
    Literal(String),
    /// `:name` placeholder, binds whatever segment sits at its position.
    Param(String),
}

impl Segment {
    fn parse(raw: &str) -> Self {
        match raw.strip_prefix(':') {
            Some(name) => Segment::Param(name.to_string()),
            None => Segment::Literal(raw.to_string()),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Literal(s) => f.write_str(s),
            Segment::Param(name) => write!(f, ":{}", name),
        }
    }
}

/// Splits a request path into its non-empty segments.
///
/// `/user//42/` yields `["user", "42"]`.
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Parses a declared pattern such as `/user/:id` into segments.
pub fn parse_pattern(pattern: &str) -> Vec<Segment> {
    split_path(pattern).into_iter().map(Segment::parse).collect()
}

/// Renders segments back into a canonical `/a/:b` pattern.
pub fn render_pattern(segments: &[Segment]) -> String {
    if segments.is_empty() {
        return "/".to_string();
    }
    segments.iter().fold(String::new(), |mut acc, seg| {
        acc.push('/');
        acc.push_str(&seg.to_string());
        acc
    })
}

/// Joins the global prefix, the `vN` version segment, the scope base and
/// the declared path into one pattern.
///
/// Each component loses its own leading/trailing slashes, empty
/// components are skipped, and the result always starts with `/`.
pub fn fuse(prefix: &str, version: Option<u32>, base: &str, path: &str) -> String {
    let version = version.map(|v| format!("v{}", v));
    let parts: Vec<&str> = [Some(prefix), version.as_deref(), Some(base), Some(path)]
        .into_iter()
        .flatten()
        .map(|p| p.trim_matches('/'))
        .filter(|p| !p.is_empty())
        .collect();

    format!("/{}", parts.join("/"))
}
