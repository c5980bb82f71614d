mod auth;
mod fcm;
mod proxy;
mod routes;
mod session;
mod state;
mod tls;

use auth::require_auth;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use clap::Parser;
use fcm::FcmStore;
use session::SessionStore;
use state::GatewayState;
use std::collections::HashMap;
use std::sync::Arc;
use tom_core::config::TomConfig;

/// Cluster-wide Tom gateway: TLS termination, session auth, reverse proxy
/// to per-user backends and memory services.
#[derive(Parser, Debug)]
#[command(name = "tom-gateway")]
struct Args {
    /// Path to the shared global config.yml.
    #[arg(long, default_value = "/data/config.yml")]
    config: String,

    /// Directory holding cert.pem, key.pem and optionally chain.pem.
    #[arg(long, default_value = "/data/tls")]
    tls_dir: String,

    /// Directory of static front-end assets (index.html, auth.html, ...).
    #[arg(long, default_value = "static")]
    static_dir: String,

    /// Listen port. Spec §4.2.3 mandates 443 in production; overridable
    /// for local development and tests.
    #[arg(long, default_value_t = 443)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let tom_config = TomConfig::load(&args.config)?;
    tom_core::logging::init(&tom_config.global.log_level);

    log::info!("found {} user(s) in configuration", tom_config.users.len());
    for user in &tom_config.users {
        log::info!("user configured: {}", user.username);
    }

    let users: HashMap<String, tom_core::model::User> = tom_config
        .users()?
        .into_iter()
        .map(|u| (u.username.clone(), u))
        .collect();

    let sessions = SessionStore::load(&tom_config.global.sessions)?;

    let fcm_path = format!("{}/mcp/notifications/notifications.sqlite", tom_config.global.all_datadir);
    let fcm = FcmStore::open(&fcm_path)?;

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()?;

    let state = Arc::new(GatewayState {
        users,
        sessions,
        fcm,
        client,
        config: tom_config,
        static_dir: args.static_dir.clone(),
    });

    let public_routes = Router::new()
        .route("/auth", get(routes::auth_page))
        .route("/login", post(routes::login))
        .route("/logout", post(routes::logout));

    let protected_routes = Router::new()
        .route("/index", get(routes::index_page))
        .route("/notificationconfig", get(routes::notification_config))
        .route("/firebase_messaging_sw_js", get(routes::firebase_messaging_sw))
        .route("/fcmtoken", post(routes::fcm_token))
        .route("/health", post(routes::health))
        .route("/process", axum::routing::any(routes::proxy_to_backend))
        .route("/reset", axum::routing::any(routes::proxy_to_backend))
        .route("/tasks", axum::routing::any(routes::proxy_to_backend))
        .route("/status", axum::routing::any(routes::proxy_to_backend))
        .route("/notifications", axum::routing::any(routes::proxy_to_backend))
        .route("/memory", get(routes::proxy_to_memory).post(routes::proxy_to_memory).put(routes::proxy_to_memory).delete(routes::proxy_to_memory))
        .route("/memory/*rest", get(routes::proxy_to_memory).post(routes::proxy_to_memory).put(routes::proxy_to_memory).delete(routes::proxy_to_memory))
        .nest_service("/static", tower_http::services::ServeDir::new(&args.static_dir))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state);

    let server_config = tls::load_server_config(&args.tls_dir)?;
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], args.port));
    log::info!("Tom gateway listening on {addr} (HTTPS)");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tls::serve(listener, server_config, app).await?;
    Ok(())
}
