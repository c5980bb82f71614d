use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tom_provider_weather::store::WeatherStore;
use tom_provider_weather::upstream::InMemoryWeatherUpstream;
use tom_provider_weather::WeatherProvider;

/// Weather tool provider.
#[derive(Parser, Debug)]
#[command(name = "tom-provider-weather")]
struct Args {
    /// Port to listen on.
    #[arg(long, default_value_t = 8087)]
    port: u16,

    /// Path to the geocoding cache database.
    #[arg(long, default_value = "/data/weather_gps_cache.sqlite")]
    db_path: String,

    /// Log level.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();
    tom_core::logging::init(&args.log_level);

    let store = WeatherStore::open(&args.db_path).unwrap_or_else(|e| panic!("failed to open weather cache at {}: {e}", args.db_path));
    let provider = Arc::new(WeatherProvider::new(store, Box::new(InMemoryWeatherUpstream::default())));

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    tom_provider::http::serve(provider, addr).await
}
