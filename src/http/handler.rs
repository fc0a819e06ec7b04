//! Handler contract between the dispatcher and application code.
//!
//! # Responsibilities
//! - Define what a handler receives (`Context`) and returns (`Reply`)
//! - Map application failures (`HandlerError`) to status codes
//!
//! # Design Decisions
//! - Handlers are type-erased behind `Arc<dyn Handler>` so a route table
//!   can hold heterogeneous closures
//! - Replies are fully buffered; the cache stores exactly what was sent

use std::future::Future;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use futures_util::future::BoxFuture;
use serde_json::Value;
use thiserror::Error;

use crate::security::auth::Principal;

/// Future returned by a type-erased handler.
pub type HandlerFuture = BoxFuture<'static, Result<Reply, HandlerError>>;

/// Application code bound to a route.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, ctx: Context) -> HandlerFuture;
}

impl<F, Fut> Handler for F
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Reply, HandlerError>> + Send + 'static,
{
    fn call(&self, ctx: Context) -> HandlerFuture {
        Box::pin((self)(ctx))
    }
}

/// Everything a handler gets to see about the request.
///
/// `params`, `query`, `body` and `jwt` hold the values *after* the route's
/// schemas ran, so a handler can rely on their shape.
#[derive(Debug, Clone)]
pub struct Context {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    /// Path placeholders, always a JSON object of strings before validation.
    pub params: Value,
    /// Query string pairs as a JSON object.
    pub query: Value,
    /// Parsed JSON body, `Null` when the request had none.
    pub body: Value,
    /// Claims of the authenticated principal.
    pub jwt: Option<Value>,
    pub principal: Option<Principal>,
}

impl Context {
    /// Raw string value of a path placeholder.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(Value::as_str)
    }

    /// Raw string value of a query pair.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).and_then(Value::as_str)
    }
}

/// A buffered response produced by a handler or served from the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

impl Reply {
    /// `200 OK` with a JSON body.
    pub fn json(value: Value) -> Self {
        Self {
            status: StatusCode::OK,
            content_type: Some(HeaderValue::from_static("application/json")),
            body: Bytes::from(value.to_string()),
        }
    }

    /// `200 OK` with a plain-text body.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            content_type: Some(HeaderValue::from_static("text/plain; charset=utf-8")),
            body: Bytes::from(text.into()),
        }
    }

    /// `204 No Content`.
    pub fn empty() -> Self {
        Self {
            status: StatusCode::NO_CONTENT,
            content_type: None,
            body: Bytes::new(),
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        if let Some(content_type) = self.content_type {
            response.headers_mut().insert(header::CONTENT_TYPE, content_type);
        }
        response
    }
}

/// Failures a handler may report.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("gone: {0}")]
    Gone(String),

    #[error("locked: {0}")]
    Locked(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    pub fn status(&self) -> StatusCode {
        match self {
            HandlerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            HandlerError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            HandlerError::Forbidden(_) => StatusCode::FORBIDDEN,
            HandlerError::NotFound(_) => StatusCode::NOT_FOUND,
            HandlerError::Conflict(_) => StatusCode::CONFLICT,
            HandlerError::Gone(_) => StatusCode::GONE,
            HandlerError::Locked(_) => StatusCode::LOCKED,
            HandlerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Internal details stay in the logs.
        let body = match &self {
            HandlerError::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        };
        (status, body).into_response()
    }
}
