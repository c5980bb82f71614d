use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tom_provider_gpodder::store::GpodderStore;
use tom_provider_gpodder::upstream::InMemoryGpodderUpstream;
use tom_provider_gpodder::GpodderProvider;

/// Podcast-subscription tool provider.
#[derive(Parser, Debug)]
#[command(name = "tom-provider-gpodder")]
struct Args {
    /// Port to listen on.
    #[arg(long, default_value_t = 8086)]
    port: u16,

    /// Path to the subscription/episode cache database.
    #[arg(long, default_value = "/data/gpodder.sqlite")]
    db_path: String,

    /// Log level.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();
    tom_core::logging::init(&args.log_level);

    let store = GpodderStore::open(&args.db_path).unwrap_or_else(|e| panic!("failed to open gpodder cache at {}: {e}", args.db_path));
    let provider = Arc::new(GpodderProvider::new(store, Box::new(InMemoryGpodderUpstream::default())));

    // Sequential subscriptions -> episodes -> episode-status -> cleanup
    // sweep every 15 minutes, matching `_background_sync`'s own cadence
    // and ordering.
    {
        let provider = provider.clone();
        tom_provider::cache::spawn_refresh_loop(Duration::from_secs(900), move || {
            let provider = provider.clone();
            async move {
                provider.sync_subscriptions().await?;
                provider.sync_episodes().await?;
                provider.sync_episode_status().await?;
                provider.cleanup_old_episodes()?;
                Ok(())
            }
        });
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    tom_provider::http::serve(provider, addr).await
}
