//! Gateway route handlers: auth/session endpoints, local static/config
//! endpoints, and the reverse-proxy endpoints.

use crate::auth::{clear_cookie_header, set_cookie_header, AuthenticatedUser};
use crate::proxy::{self, backend_base_url, memory_base_url, memory_subpath};
use crate::state::GatewayState;
use axum::body::Body;
use axum::extract::{Extension, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    username: String,
    password: String,
}

/// `POST /login`: validates credentials against the in-memory user table
/// and, on success, issues a fresh session cookie and redirects to
/// `/index`.
pub async fn login(State(state): State<Arc<GatewayState>>, Form(form): Form<LoginForm>) -> Response {
    let user = match state.user(&form.username) {
        Some(u) => u,
        None => {
            log::warn!("auth login failed for unknown user '{}'", form.username);
            return (StatusCode::UNAUTHORIZED, "invalid credentials").into_response();
        }
    };

    if !tom_core::config::verify_password(&form.password, &user.password_hash) {
        log::warn!("auth login failed for '{}'", form.username);
        return (StatusCode::UNAUTHORIZED, "invalid credentials").into_response();
    }

    let session = state.sessions.create(&user.username);
    log::info!("auth login: {}", user.username);

    let mut response = Response::builder()
        .status(StatusCode::FOUND)
        .header(header::LOCATION, "/index")
        .body(Body::empty())
        .expect("static redirect response always builds");
    response
        .headers_mut()
        .insert(header::SET_COOKIE, set_cookie_header(&session.token));
    response
}

/// `POST /logout`: destroys the session and clears the cookie.
pub async fn logout(State(state): State<Arc<GatewayState>>, headers: axum::http::HeaderMap) -> Response {
    if let Some(token) = crate::auth::session_token(&headers) {
        state.sessions.destroy(&token);
    }
    let mut response = Response::builder()
        .status(StatusCode::FOUND)
        .header(header::LOCATION, "/auth")
        .body(Body::empty())
        .expect("static redirect response always builds");
    response
        .headers_mut()
        .insert(header::SET_COOKIE, clear_cookie_header());
    response
}

async fn static_file(state: &GatewayState, filename: &str) -> Response {
    let path = std::path::Path::new(&state.static_dir).join(filename);
    match tokio::fs::read(&path).await {
        Ok(bytes) => Response::new(Body::from(bytes)),
        Err(_) => (StatusCode::NOT_FOUND, format!("file not found: {filename}")).into_response(),
    }
}

pub async fn auth_page(State(state): State<Arc<GatewayState>>) -> Response {
    static_file(&state, "auth.html").await
}

pub async fn index_page(State(state): State<Arc<GatewayState>>) -> Response {
    static_file(&state, "index.html").await
}

#[derive(Debug, Serialize)]
struct FirebaseConfigResponse {
    #[serde(rename = "firebaseConfig")]
    firebase_config: serde_json::Value,
    #[serde(rename = "vapidKey")]
    vapid_key: String,
}

/// `GET /notificationconfig`: the Firebase web-SDK config block handed to
/// the browser so it can register for push.
pub async fn notification_config(State(state): State<Arc<GatewayState>>) -> Response {
    let firebase = match &state.config.global.firebase {
        Some(f) => f,
        None => return (StatusCode::NOT_FOUND, "firebase is not configured").into_response(),
    };
    Json(FirebaseConfigResponse {
        firebase_config: serde_json::json!({
            "apiKey": firebase.api_key,
            "authDomain": firebase.auth_domain,
            "projectId": firebase.project_id,
            "storageBucket": firebase.storage_bucket,
            "messagingSenderId": firebase.messaging_sender_id,
            "appId": firebase.app_id,
        }),
        vapid_key: firebase.vapidkey.clone(),
    })
    .into_response()
}

/// `GET /firebase_messaging_sw_js`: the service-worker script, with the
/// Firebase config spliced into a placeholder in the static file rather
/// than templating it server-side from scratch.
pub async fn firebase_messaging_sw(State(state): State<Arc<GatewayState>>) -> Response {
    let firebase = match &state.config.global.firebase {
        Some(f) => f,
        None => return (StatusCode::NOT_FOUND, "firebase is not configured").into_response(),
    };
    let path = std::path::Path::new(&state.static_dir).join("firebase-messaging-sw.js");
    let template = match tokio::fs::read_to_string(&path).await {
        Ok(t) => t,
        Err(_) => return (StatusCode::NOT_FOUND, "service worker file not found").into_response(),
    };
    let config_js = format!(
        "firebaseConfig = {};",
        serde_json::json!({
            "apiKey": firebase.api_key,
            "authDomain": firebase.auth_domain,
            "projectId": firebase.project_id,
            "storageBucket": firebase.storage_bucket,
            "messagingSenderId": firebase.messaging_sender_id,
            "appId": firebase.app_id,
        })
    );
    let rendered = template.replace("firebaseConfig = {};", &config_js);
    ([(header::CONTENT_TYPE, "application/javascript")], rendered).into_response()
}

#[derive(Debug, Deserialize)]
pub struct FcmTokenRequest {
    token: String,
    #[serde(default = "default_platform")]
    platform: String,
}

fn default_platform() -> String {
    "web".to_string()
}

#[derive(Debug, Serialize)]
pub struct FcmTokenResponse {
    status: &'static str,
}

/// `POST /fcmtoken`: idempotent upsert keyed by token.
pub async fn fcm_token(
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(body): Json<FcmTokenRequest>,
) -> Response {
    if body.token.is_empty() {
        return (StatusCode::BAD_REQUEST, "token is required").into_response();
    }
    match state.fcm.register(&body.token, &user.username, &body.platform) {
        Ok(()) => Json(FcmTokenResponse { status: "success" }).into_response(),
        Err(e) => {
            log::error!("failed to store FCM token for '{}': {e}", user.username);
            (StatusCode::INTERNAL_SERVER_ERROR, "error storing FCM token").into_response()
        }
    }
}

/// `POST /health`: arbitrary Android Health Connect payload, logged only.
pub async fn health(Extension(user): Extension<AuthenticatedUser>, Json(body): Json<serde_json::Value>) -> Response {
    log::info!("health data received from {}: {body}", user.username);
    Json(serde_json::json!({ "status": "success", "message": "Health data received" })).into_response()
}

/// Proxies `/process`, `/reset`, `/tasks`, `/status`, `/notifications` to
/// `http://<user>:8080<path>`.
pub async fn proxy_to_backend(
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<AuthenticatedUser>,
    request: Request,
) -> Response {
    let base_url = backend_base_url(&user.username);
    proxy_request(&state, &base_url, request).await
}

/// Proxies `/memory[/*]` to `http://memory-<user>:8080<subpath>`,
/// stripping the `/memory` prefix first.
pub async fn proxy_to_memory(
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<AuthenticatedUser>,
    request: Request,
) -> Response {
    let base_url = memory_base_url(&user.username);
    let subpath = memory_subpath(request.uri());
    let query = request.uri().query().map(str::to_string);
    let (parts, body) = request.into_parts();
    proxy::forward(&state.client, &base_url, &subpath, parts.method, parts.headers, query.as_deref(), body).await
}

async fn proxy_request(state: &GatewayState, base_url: &str, request: Request) -> Response {
    let path = request.uri().path().to_string();
    let query = request.uri().query().map(str::to_string);
    let (parts, body) = request.into_parts();
    proxy::forward(&state.client, base_url, &path, parts.method, parts.headers, query.as_deref(), body).await
}
