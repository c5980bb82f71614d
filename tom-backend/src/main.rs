mod aggregator;
mod calllog;
mod config;
mod dispatch;
mod orchestrator;
mod prompt;
mod server;

use aggregator::NotificationAggregator;
use calllog::CallLogWriter;
use clap::Parser;
use dispatch::DispatchTable;
use server::BackendState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tom_core::config::TomConfig;
use tom_core::model::{Conversation, Module, Tool};

/// Per-user Tom assistant backend process.
#[derive(Parser, Debug)]
#[command(name = "tom-backend")]
struct Args {
    /// Path to the shared global config.yml.
    #[arg(long, default_value = "/data/config.yml")]
    config: String,

    /// Path to this backend's own module table: a static registry of
    /// `(name, description, base_url)` entries, loaded once at startup
    /// rather than watched on disk.
    #[arg(long, default_value = "/data/backend-modules.yml")]
    modules: String,

    /// Username this backend instance serves.
    #[arg(long)]
    username: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let tom_config = TomConfig::load(&args.config)?;
    tom_core::logging::init(&tom_config.global.log_level);

    let user = config::find_user(&tom_config.users, &args.username)
        .unwrap_or_else(|| panic!("user '{}' not found in config", args.username));

    let llm = config::build_llm_registry(&tom_config.global)?;

    let modules = load_modules(&args.modules).await?;
    let modules_catalogue: Vec<(String, String)> = modules
        .iter()
        .map(|m| (m.name.clone(), m.description.clone()))
        .collect();
    let aggregator_sources: Vec<(String, String)> = modules
        .iter()
        .map(|m| (m.name.clone(), m.base_url.clone()))
        .collect();

    let dispatch = DispatchTable::build(modules);
    let aggregator = NotificationAggregator::new(aggregator_sources);
    aggregator.clone().spawn_polling_loop();

    let call_log = CallLogWriter::new(&tom_config.global.all_datadir)?;

    let timezone: Option<chrono_tz::Tz> = user
        .timezone
        .as_deref()
        .and_then(|tz| tz.parse().ok());

    let state = Arc::new(BackendState {
        username: user.username.clone(),
        personal_context: user.personal_context.clone(),
        timezone,
        conversation: Mutex::new(Conversation::new()),
        dispatch,
        llm,
        modules_catalogue,
        aggregator,
        call_log,
    });

    let router = server::build_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    log::info!("backend for '{}' listening on {addr}", args.username);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

/// Load the static module table and fetch each module's live tool list
/// from its provider (`/tools/list`), so the execute phase has up-to-date
/// JSON schemas without hardcoding them in YAML.
async fn load_modules(path: &str) -> Result<Vec<Module>, Box<dyn std::error::Error>> {
    #[derive(serde::Deserialize)]
    struct ModuleEntry {
        name: String,
        base_url: String,
        complexity: u8,
        is_personal: bool,
    }

    let raw = std::fs::read_to_string(path)?;
    let entries: Vec<ModuleEntry> = serde_yaml::from_str(&raw)?;

    let client = reqwest::Client::new();
    let mut modules = Vec::with_capacity(entries.len());
    for entry in entries {
        let description = fetch_description(&client, &entry.base_url).await.unwrap_or_default();
        let tools = fetch_tools(&client, &entry.base_url).await.unwrap_or_default();
        let system_context = fetch_prompt_consign(&client, &entry.base_url)
            .await
            .map(|v| v.to_string())
            .unwrap_or_default();

        modules.push(Module {
            name: entry.name,
            description,
            complexity: entry.complexity,
            tools,
            system_context,
            is_personal: entry.is_personal,
            base_url: entry.base_url,
        });
    }
    Ok(modules)
}

async fn fetch_description(client: &reqwest::Client, base_url: &str) -> Option<String> {
    let value: serde_json::Value = client
        .get(format!("{base_url}/description/module"))
        .send()
        .await
        .ok()?
        .json()
        .await
        .ok()?;
    value.get("description").and_then(|v| v.as_str()).map(str::to_string)
}

async fn fetch_tools(client: &reqwest::Client, base_url: &str) -> Option<Vec<Tool>> {
    let value: serde_json::Value = client
        .get(format!("{base_url}/tools/list"))
        .send()
        .await
        .ok()?
        .json()
        .await
        .ok()?;
    serde_json::from_value(value.get("tools")?.clone()).ok()
}

async fn fetch_prompt_consign(client: &reqwest::Client, base_url: &str) -> Option<serde_json::Value> {
    client
        .get(format!("{base_url}/description/prompt_consign"))
        .send()
        .await
        .ok()?
        .json()
        .await
        .ok()
}
