use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tom_provider_todo::upstream::InMemoryTodoUpstream;
use tom_provider_todo::TodoProvider;

/// Todo/list-management tool provider.
#[derive(Parser, Debug)]
#[command(name = "tom-provider-todo")]
struct Args {
    /// Port to listen on.
    #[arg(long, default_value_t = 8081)]
    port: u16,

    /// Log level, matching the other Tom processes' `--log-level` flag.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();
    tom_core::logging::init(&args.log_level);

    // No local cache: every call round-trips to the upstream list store,
    // so there is no `--db-path`/`--refresh-secs` pair here.
    let upstream = Arc::new(InMemoryTodoUpstream::default());
    let provider = Arc::new(TodoProvider::new(upstream));

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    tom_provider::http::serve(provider, addr).await
}
