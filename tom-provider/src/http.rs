//! The HTTP surface every provider exposes (spec §4.3.1, §4.3.2),
//! generalizing the teacher's `AxumHttpAdapter` router shape.

use crate::protocol::ToolProvider;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;

#[derive(Clone)]
struct ProviderState {
    provider: Arc<dyn ToolProvider>,
}

/// Build the router for one provider: discovery endpoints under
/// `description://*` (served as `/description/*` since real URI schemes
/// aren't valid HTTP paths) and the tool endpoints under `/tools/*`.
pub fn build_router(provider: Arc<dyn ToolProvider>) -> Router {
    let state = ProviderState { provider };
    Router::new()
        .route("/description/module", get(describe_module))
        .route("/description/tom_notification", get(describe_notification))
        .route("/description/prompt_consign", get(describe_prompt_consign))
        .route("/tools/list", get(list_tools))
        .route("/tools/execute/:tool_name", post(execute_tool))
        .with_state(state)
}

/// Bind and serve `provider` at `addr` until the process exits. Mirrors the
/// teacher's `TcpListener::bind` + `axum::serve` startup sequence.
pub async fn serve(provider: Arc<dyn ToolProvider>, addr: SocketAddr) -> std::io::Result<()> {
    let router = build_router(provider.clone());
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("provider '{}' listening on {addr}", provider.name());
    axum::serve(listener, router).await
}

async fn describe_module(State(state): State<ProviderState>) -> Json<Value> {
    Json(json!({
        "module": state.provider.name(),
        "description": state.provider.description(),
    }))
}

async fn describe_notification(State(state): State<ProviderState>) -> Json<Value> {
    let status = state.provider.notification_status().await;
    Json(json!({ "status": status }))
}

async fn describe_prompt_consign(State(state): State<ProviderState>) -> Json<Value> {
    Json(state.provider.prompt_consign().unwrap_or(Value::Null))
}

async fn list_tools(State(state): State<ProviderState>) -> Json<Value> {
    Json(json!({ "tools": state.provider.tools() }))
}

#[derive(Debug, Deserialize)]
struct ExecuteRequest {
    #[serde(default)]
    arguments: Value,
}

async fn execute_tool(
    State(state): State<ProviderState>,
    Path(tool_name): Path<String>,
    body: Option<Json<ExecuteRequest>>,
) -> (StatusCode, Json<Value>) {
    let arguments = body.map(|Json(b)| b.arguments).unwrap_or(Value::Null);
    let outcome = state.provider.invoke(&tool_name, arguments).await;
    (StatusCode::OK, Json(outcome.into_json()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ToolOutcome;
    use async_trait::async_trait;
    use tom_core::model::Tool;

    struct EchoProvider;

    #[async_trait]
    impl ToolProvider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> String {
            "echoes its input".into()
        }
        fn tools(&self) -> Vec<Tool> {
            vec![]
        }
        async fn invoke(&self, _tool_name: &str, arguments: Value) -> ToolOutcome {
            ToolOutcome::ok(arguments)
        }
    }

    #[tokio::test]
    async fn router_builds_without_panicking() {
        let _router = build_router(Arc::new(EchoProvider));
    }
}
