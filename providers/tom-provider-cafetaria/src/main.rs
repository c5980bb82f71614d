use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tom_provider_cafetaria::store::CafetariaStore;
use tom_provider_cafetaria::upstream::InMemoryCafetariaUpstream;
use tom_provider_cafetaria::CafetariaProvider;

/// Cafetaria tool provider.
#[derive(Parser, Debug)]
#[command(name = "tom-provider-cafetaria")]
struct Args {
    /// Port to listen on.
    #[arg(long, default_value_t = 8089)]
    port: u16,

    /// Path to the credit/reservation cache database.
    #[arg(long, default_value = "/data/cafetaria.sqlite")]
    db_path: String,

    /// Log level.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();
    tom_core::logging::init(&args.log_level);

    let store = CafetariaStore::open(&args.db_path).unwrap_or_else(|e| panic!("failed to open cafetaria cache at {}: {e}", args.db_path));
    let provider = Arc::new(CafetariaProvider::new(store, Box::new(InMemoryCafetariaUpstream::default())));

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    tom_provider::http::serve(provider, addr).await
}
