use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tom_provider_calendar::cache::CalendarCache;
use tom_provider_calendar::upstream::{CalendarUpstream, InMemoryCalendarUpstream};
use tom_provider_calendar::CalendarProvider;

/// Calendar tool provider.
#[derive(Parser, Debug)]
#[command(name = "tom-provider-calendar")]
struct Args {
    /// Port to listen on.
    #[arg(long, default_value_t = 8082)]
    port: u16,

    /// Path to the materialized event-list cache database.
    #[arg(long, default_value = "/data/calendar/cache.sqlite")]
    db_path: String,

    /// Log level.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();
    tom_core::logging::init(&args.log_level);

    let upstream: Arc<dyn CalendarUpstream> = Arc::new(InMemoryCalendarUpstream::default());
    let cache = CalendarCache::open(&args.db_path, upstream)
        .unwrap_or_else(|e| panic!("failed to open calendar cache at {}: {e}", args.db_path));
    let provider = Arc::new(CalendarProvider::new(cache));

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    tom_provider::http::serve(provider, addr).await
}
