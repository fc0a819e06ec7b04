//! Per-request failure outcomes and their HTTP rendering.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::http::handler::HandlerError;
use crate::routing::ValidationError;
use crate::security::AuthError;

/// Why a request did not reach (or did not survive) its handler.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("not found")]
    NotFound,

    /// Path matched; `allow` lists the methods it does accept.
    #[error("method not allowed")]
    MethodNotAllowed { allow: String },

    #[error("too many requests")]
    TooManyRequests { retry_after_secs: u64 },

    #[error("unauthorized: {0}")]
    Unauthorized(#[from] AuthError),

    #[error("invalid {part}: {source}")]
    Validation {
        part: &'static str,
        source: ValidationError,
    },

    #[error("payload too large")]
    PayloadTooLarge,

    #[error("malformed body: {0}")]
    MalformedBody(String),

    #[error(transparent)]
    Handler(#[from] HandlerError),
}

impl DispatchError {
    pub fn validation(part: &'static str, source: ValidationError) -> Self {
        DispatchError::Validation { part, source }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::NotFound => StatusCode::NOT_FOUND,
            DispatchError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            DispatchError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            DispatchError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            DispatchError::Validation { .. } => StatusCode::BAD_REQUEST,
            DispatchError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            DispatchError::MalformedBody(_) => StatusCode::BAD_REQUEST,
            DispatchError::Handler(e) => e.status(),
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        if let DispatchError::Handler(e) = self {
            return e.into_response();
        }
        let mut response = (self.status(), self.to_string()).into_response();

        let headers = response.headers_mut();
        match &self {
            DispatchError::MethodNotAllowed { allow } => {
                if let Ok(value) = HeaderValue::from_str(allow) {
                    headers.insert(header::ALLOW, value);
                }
            }
            DispatchError::TooManyRequests { retry_after_secs } => {
                headers.insert(header::RETRY_AFTER, HeaderValue::from(*retry_after_secs));
            }
            DispatchError::Unauthorized(_) => {
                headers.insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
            }
            _ => {}
        }
        response
    }
}
