use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tom_provider_kwyk::store::KwykStore;
use tom_provider_kwyk::upstream::InMemoryKwykUpstream;
use tom_provider_kwyk::KwykProvider;

/// Kwyk tool provider.
#[derive(Parser, Debug)]
#[command(name = "tom-provider-kwyk")]
struct Args {
    /// Port to listen on.
    #[arg(long, default_value_t = 8088)]
    port: u16,

    /// Path to the daily-counters cache database.
    #[arg(long, default_value = "/data/kwyk.sqlite")]
    db_path: String,

    /// Log level.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();
    tom_core::logging::init(&args.log_level);

    let store = KwykStore::open(&args.db_path).unwrap_or_else(|e| panic!("failed to open kwyk cache at {}: {e}", args.db_path));
    let provider = Arc::new(KwykProvider::new(store, Box::new(InMemoryKwykUpstream::default())));

    // The background scrape every 3-10 hours (`random.randint(3, 10) *
    // 3600`) collapses to a fixed 6-hour interval here; `kwyk_get` updates
    // again on every call regardless, so freshness at query time doesn't
    // depend on this loop's cadence.
    {
        let provider = provider.clone();
        tom_provider::cache::spawn_refresh_loop(Duration::from_secs(6 * 3600), move || {
            let provider = provider.clone();
            async move { provider.update().await }
        });
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    tom_provider::http::serve(provider, addr).await
}
