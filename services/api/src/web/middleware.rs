//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::warn;

use crate::error::ApiError;
use crate::web::state::{AppState, Session};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "token";

/// Middleware that validates the session cookie.
///
/// If valid, inserts the `Session` into request extensions for handlers to use.
/// A missing cookie is 401; a cookie that fails the signature or expiry check is 403.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // 1. Extract the token from the cookie header
    let token = session_token(req.headers()).ok_or(ApiError::Unauthorized)?;

    // 2. Check signature and expiry
    let claims = state.tokens.verify(&token, Utc::now()).map_err(|e| {
        warn!("Rejected session token: {}", e);
        ApiError::Forbidden
    })?;

    // 3. Insert the session into request extensions
    req.extensions_mut().insert(Session { claims, token });

    // 4. Continue to the handler
    Ok(next.run(req).await)
}

/// Finds the session token among the request's cookies.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|c| {
            let (name, value) = c.trim().split_once('=')?;
            (name == SESSION_COOKIE && !value.is_empty()).then(|| value.to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn finds_the_token_among_other_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; token=abc.def.ghi; lang=cs"),
        );
        assert_eq!(session_token(&headers).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn empty_or_missing_token_is_none() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_token(&headers), None);
        headers.insert(header::COOKIE, HeaderValue::from_static("token=; x=1"));
        assert_eq!(session_token(&headers), None);
        headers.insert(header::COOKIE, HeaderValue::from_static("tokenish=abc"));
        assert_eq!(session_token(&headers), None);
    }
}
