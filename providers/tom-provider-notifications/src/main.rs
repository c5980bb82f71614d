use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tom_provider_notifications::push::LoggingPushSender;
use tom_provider_notifications::store::NotificationStore;
use tom_provider_notifications::{worker, NotificationsProvider};

/// Instant-message and reminder tool provider.
#[derive(Parser, Debug)]
#[command(name = "tom-provider-notifications")]
struct Args {
    /// Port to listen on.
    #[arg(long, default_value_t = 8083)]
    port: u16,

    /// Path to the reminders/message-history/FCM-token database. Shared
    /// with the gateway's `/fcmtoken` endpoint.
    #[arg(long, default_value = "/data/mcp/notifications/notifications.sqlite")]
    db_path: String,

    /// Reminder worker tick interval, in seconds.
    #[arg(long, default_value_t = 60)]
    refresh_secs: u64,

    /// Log level.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();
    tom_core::logging::init(&args.log_level);

    let store = Arc::new(
        NotificationStore::open(&args.db_path).unwrap_or_else(|e| panic!("failed to open notification store at {}: {e}", args.db_path)),
    );
    let push = Arc::new(LoggingPushSender);

    worker::start(store.clone(), push.clone(), Duration::from_secs(args.refresh_secs));

    let provider = Arc::new(NotificationsProvider::new(store, push));
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    tom_provider::http::serve(provider, addr).await
}
