//! Per-route validation seam.
//!
//! The dispatcher hands each request part to the route's schema before the
//! handler runs. Schemas are opaque: anything that can turn a JSON value into
//! a validated JSON value (or refuse it) qualifies.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

/// Raised by a schema that rejects its input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Validates and optionally coerces one request part.
pub trait Schema: Send + Sync {
    fn parse(&self, value: &Value) -> Result<Value, ValidationError>;
}

impl<F> Schema for F
where
    F: Fn(&Value) -> Result<Value, ValidationError> + Send + Sync,
{
    fn parse(&self, value: &Value) -> Result<Value, ValidationError> {
        (self)(value)
    }
}

/// Optional schemas for each request part.
#[derive(Clone, Default)]
pub struct RouteSchemas {
    pub param: Option<Arc<dyn Schema>>,
    pub query: Option<Arc<dyn Schema>>,
    pub body: Option<Arc<dyn Schema>>,
    pub jwt: Option<Arc<dyn Schema>>,
}

impl fmt::Debug for RouteSchemas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteSchemas")
            .field("param", &self.param.is_some())
            .field("query", &self.query.is_some())
            .field("body", &self.body.is_some())
            .field("jwt", &self.jwt.is_some())
            .finish()
    }
}

/// Runs `schema` over `value` when present, passing the value through otherwise.
pub fn apply(schema: Option<&Arc<dyn Schema>>, value: Value) -> Result<Value, ValidationError> {
    match schema {
        Some(schema) => schema.parse(&value),
        None => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn numeric_id(value: &Value) -> Result<Value, ValidationError> {
        let id = value
            .get("id")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| ValidationError::new("id must be numeric"))?;
        Ok(json!({ "id": id }))
    }

    #[test]
    fn test_closure_schema_coerces() {
        let schema: Arc<dyn Schema> = Arc::new(numeric_id);
        let parsed = apply(Some(&schema), json!({"id": "42"})).unwrap();
        assert_eq!(parsed, json!({"id": 42}));

        let err = apply(Some(&schema), json!({"id": "abc"})).unwrap_err();
        assert_eq!(err.to_string(), "id must be numeric");
    }

    #[test]
    fn test_missing_schema_passes_through() {
        let value = json!({"anything": true});
        assert_eq!(apply(None, value.clone()).unwrap(), value);
    }
}
