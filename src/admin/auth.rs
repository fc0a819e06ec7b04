use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::admin::AdminState;
use crate::security::auth::bearer_token;

pub async fn admin_auth_middleware(
    State(state): State<AdminState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    match bearer_token(request.headers()) {
        Some(key) if key == &*state.api_key => Ok(next.run(request).await),
        _ => {
            tracing::warn!(
                has_credentials = request.headers().contains_key(header::AUTHORIZATION),
                path = %request.uri().path(),
                "Rejected admin request"
            );
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}
