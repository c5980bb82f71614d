use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tom_provider_idfm::store::{IdfmStore, ReferenceStation};
use tom_provider_idfm::upstream::InMemoryTransitUpstream;
use tom_provider_idfm::IdfmProvider;

/// IDFM (Île-de-France public transport) tool provider.
#[derive(Parser, Debug)]
#[command(name = "tom-provider-idfm")]
struct Args {
    /// Port to listen on.
    #[arg(long, default_value_t = 8085)]
    port: u16,

    /// Path to the station/line reference cache database.
    #[arg(long, default_value = "/data/idfm.sqlite")]
    db_path: String,

    /// Log level.
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// A minimal offline seed of the public station/line open-data export
/// (spec §4.3.3: fetching the full dataset from Île-de-France Mobilités'
/// open-data API is out of scope for this core; this is the representative
/// subset loaded once into a fresh cache, the same way `_update_database`
/// only ever runs its fetch-and-populate pass a single time per database).
fn reference_seed() -> Vec<ReferenceStation> {
    vec![
        ReferenceStation {
            id: "71264".into(),
            name: "Châtelet".into(),
            latitude: 48.8583,
            longitude: 2.3470,
            city: "Paris".into(),
            line_id: "C01371".into(),
            line_name: "1".into(),
            line_type: "METRO".into(),
        },
        ReferenceStation {
            id: "71517".into(),
            name: "Gare de Lyon".into(),
            latitude: 48.8443,
            longitude: 2.3744,
            city: "Paris".into(),
            line_id: "C01384".into(),
            line_name: "14".into(),
            line_type: "METRO".into(),
        },
        ReferenceStation {
            id: "72073".into(),
            name: "Nation".into(),
            latitude: 48.8484,
            longitude: 2.3957,
            city: "Paris".into(),
            line_id: "C01371".into(),
            line_name: "1".into(),
            line_type: "METRO".into(),
        },
    ]
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();
    tom_core::logging::init(&args.log_level);

    let store = IdfmStore::open(&args.db_path).unwrap_or_else(|e| panic!("failed to open idfm cache at {}: {e}", args.db_path));
    if !store.has_reference_data().unwrap_or(false) {
        log::info!("idfm reference cache empty, loading seed station/line data");
        if let Err(e) = store.load_reference_data(&reference_seed()) {
            log::error!("failed to load idfm reference data: {e}");
        }
    }

    let provider = Arc::new(IdfmProvider::new(store, Box::new(InMemoryTransitUpstream::default())));

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    tom_provider::http::serve(provider, addr).await
}
