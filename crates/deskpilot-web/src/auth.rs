//! Token authentication.
//!
//! When a token is configured, protected routes require `?token=<token>`.
//! The comparison is constant-time.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;

use crate::error::ApiError;
use crate::state::AppState;

/// Constant-time equality comparison for secret strings.
fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// The `token` query parameter of a request, if present.
pub fn query_token(query: Option<&str>) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(k, _)| k == "token")
        .map(|(_, v)| v.into_owned())
}

/// Whether `supplied` satisfies the configured token.
pub fn token_matches(expected: Option<&str>, supplied: Option<&str>) -> bool {
    match expected {
        None => true,
        Some(expected) => supplied.is_some_and(|s| constant_time_eq(expected, s)),
    }
}

/// Middleware rejecting requests without the configured token.
pub async fn require_token(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let supplied = query_token(request.uri().query());
    if token_matches(state.token(), supplied.as_deref()) {
        next.run(request).await
    } else {
        tracing::warn!(path = %request.uri().path(), "rejected request with a bad token");
        ApiError::Unauthorized.into_response()
    }
}
