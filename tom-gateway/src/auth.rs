//! Cookie-based session auth. No cookie-jar crate is pulled in: the wire
//! shape is one opaque token in one cookie, so a manual `Cookie`/
//! `Set-Cookie` header is simpler than a dependency.

use crate::state::GatewayState;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

pub const SESSION_COOKIE: &str = "tom_session";

/// The authenticated user for the current request, inserted into request
/// extensions by [`require_auth`].
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub username: String,
}

pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    cookie_header.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        if name == SESSION_COOKIE {
            Some(value.to_string())
        } else {
            None
        }
    })
}

/// Render a `Set-Cookie` header for a freshly created session. `Secure` is
/// always set: the gateway never serves plaintext HTTP.
pub fn set_cookie_header(token: &str) -> HeaderValue {
    let max_age = tom_core::model::Session::TTL_DAYS * 24 * 3600;
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; Secure; SameSite=Lax; Max-Age={max_age}"
    ))
    .expect("cookie header is always valid ASCII")
}

pub fn clear_cookie_header() -> HeaderValue {
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE}=; Path=/; HttpOnly; Secure; SameSite=Lax; Max-Age=0"
    ))
    .expect("cookie header is always valid ASCII")
}

/// Middleware guarding every protected route: resolves the session cookie
/// to a live user via [`crate::session::SessionStore`] and rejects with
/// 401 otherwise.
pub async fn require_auth(
    State(state): State<Arc<GatewayState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = match session_token(request.headers()) {
        Some(t) => t,
        None => return (StatusCode::UNAUTHORIZED, "authentication required").into_response(),
    };
    match state.sessions.resolve(&token) {
        Some(username) => {
            request.extensions_mut().insert(AuthenticatedUser { username });
            next.run(request).await
        }
        None => (StatusCode::UNAUTHORIZED, "authentication required").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;

    #[test]
    fn session_token_extracts_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, "other=1; tom_session=abc123; foo=bar".parse().unwrap());
        assert_eq!(session_token(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn session_token_absent_without_cookie_header() {
        let headers = HeaderMap::new();
        assert!(session_token(&headers).is_none());
    }
}
