use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tom_provider_news::rss::InMemoryRssUpstream;
use tom_provider_news::scraper::ScraperRegistry;
use tom_provider_news::scrapers::{KyutaiScraper, MistralScraper, StaticFetch};
use tom_provider_news::store::NewsStore;
use tom_provider_news::NewsProvider;

/// News tool provider.
#[derive(Parser, Debug)]
#[command(name = "tom-provider-news")]
struct Args {
    /// Port to listen on.
    #[arg(long, default_value_t = 8084)]
    port: u16,

    /// Path to the news cache database.
    #[arg(long, default_value = "/data/news.sqlite")]
    db_path: String,

    /// Log level.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();
    tom_core::logging::init(&args.log_level);

    let store = NewsStore::open(&args.db_path)
        .unwrap_or_else(|e| panic!("failed to open news cache at {}: {e}", args.db_path));
    let provider = Arc::new(NewsProvider::new(store, Box::new(InMemoryRssUpstream::default())));

    let mut registry = ScraperRegistry::new();
    registry.register(Box::new(KyutaiScraper::new(Box::new(StaticFetch::new(String::new())))));
    registry.register(Box::new(MistralScraper::new(Box::new(StaticFetch::new("{\"data\":[]}")))));
    let registry = Arc::new(registry);

    // RSS refresh every 5 minutes (spec §4.3.3).
    {
        let provider = provider.clone();
        tom_provider::cache::spawn_refresh_loop(Duration::from_secs(300), move || {
            let provider = provider.clone();
            async move { provider.refresh_rss().await }
        });
    }

    // Scraper sweep every 15 minutes; each scraper still enforces its own
    // 6-hour minimum interval inside the registry (spec §4.3.5).
    {
        let provider = provider.clone();
        let registry = registry.clone();
        tom_provider::cache::spawn_refresh_loop(Duration::from_secs(900), move || {
            let provider = provider.clone();
            let registry = registry.clone();
            async move { provider.refresh_scrapers(&registry).await }
        });
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    tom_provider::http::serve(provider, addr).await
}
