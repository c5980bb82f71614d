//! Backend HTTP surface: `/process`, `/reset`, `/tasks`, `/status`.
//! Reached only from the gateway's reverse proxy, never directly from a
//! browser.

use crate::aggregator::NotificationAggregator;
use crate::calllog::CallLogWriter;
use crate::dispatch::DispatchTable;
use crate::orchestrator::{self, ProcessRequest};
use crate::prompt::ClientKind;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tom_core::llm::LlmRegistry;
use tom_core::model::Conversation;

pub struct BackendState {
    pub username: String,
    pub personal_context: String,
    pub timezone: Option<chrono_tz::Tz>,
    pub conversation: Mutex<Conversation>,
    pub dispatch: DispatchTable,
    pub llm: LlmRegistry,
    pub modules_catalogue: Vec<(String, String)>,
    pub aggregator: Arc<NotificationAggregator>,
    pub call_log: CallLogWriter,
}

pub fn build_router(state: Arc<BackendState>) -> Router {
    Router::new()
        .route("/process", post(process))
        .route("/reset", post(reset))
        .route("/tasks", get(tasks))
        .route("/status", get(status))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct ProcessBody {
    input: String,
    #[serde(default = "default_lang")]
    lang: String,
    position: Option<PositionBody>,
    #[serde(default = "default_client_type")]
    client_type: String,
}

fn default_lang() -> String {
    "en".to_string()
}
fn default_client_type() -> String {
    "web".to_string()
}

#[derive(Debug, Deserialize)]
struct PositionBody {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Serialize)]
struct ProcessResponse {
    response: String,
}

/// spec §4.1.6: if a `behavior` module is loaded, its `get_behavior_content`
/// tool is re-invoked before every turn and its output appended to the base
/// system prompt — independent of triage, since the user never asks for it
/// by name. `None` if no such module is configured or the call fails.
async fn fetch_behavior_addendum(dispatch: &DispatchTable) -> Option<String> {
    dispatch.module("behavior")?;
    match dispatch.dispatch("get_behavior_content", Value::Null).await {
        Ok(outcome) if outcome.get("status").and_then(Value::as_str) == Some("ok") => {
            outcome.get("result").map(|result| match result {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
        }
        Ok(_) => None,
        Err(e) => {
            log::warn!("behavior module content fetch failed: {e}");
            None
        }
    }
}

async fn process(
    State(state): State<Arc<BackendState>>,
    Json(body): Json<ProcessBody>,
) -> (StatusCode, Json<ProcessResponse>) {
    if body.input.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ProcessResponse {
                response: "input must not be empty".to_string(),
            }),
        );
    }

    let started = std::time::Instant::now();
    let behavior_addendum = fetch_behavior_addendum(&state.dispatch).await;
    let mut conversation = state.conversation.lock().await;

    let outcome = orchestrator::process(
        &mut conversation,
        &state.personal_context,
        behavior_addendum.as_deref(),
        state.timezone,
        &state.dispatch,
        &state.llm,
        &state.modules_catalogue,
        ProcessRequest {
            text: &body.input,
            lang: &body.lang,
            position: body.position.map(|p| (p.latitude, p.longitude)),
            client_kind: ClientKind::parse(&body.client_type),
        },
    )
    .await;

    let entry = orchestrator::build_call_log_entry(
        &state.username,
        &body.input,
        outcome.functions_called,
        started.elapsed().as_millis() as u64,
    );
    if let Err(e) = state.call_log.append(&entry) {
        log::warn!("failed to append call log: {e}");
    }

    (
        StatusCode::OK,
        Json(ProcessResponse {
            response: outcome.response,
        }),
    )
}

#[derive(Debug, Serialize)]
struct OkResponse {
    ok: bool,
}

async fn reset(State(state): State<Arc<BackendState>>) -> Json<OkResponse> {
    let mut conversation = state.conversation.lock().await;
    conversation.reset();
    Json(OkResponse { ok: true })
}

async fn tasks(State(state): State<Arc<BackendState>>) -> Json<tom_core::model::TasksSnapshot> {
    Json(state.aggregator.snapshot().await)
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    healthy: bool,
    providers: Vec<tom_core::model::ProviderStatus>,
}

async fn status(State(state): State<Arc<BackendState>>) -> Json<StatusResponse> {
    let providers = state.aggregator.provider_statuses().await;
    let healthy = providers.iter().all(|p| p.up);
    Json(StatusResponse { healthy, providers })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_lang_is_english() {
        assert_eq!(default_lang(), "en");
    }

    #[tokio::test]
    async fn fetch_behavior_addendum_is_none_when_no_behavior_module_is_loaded() {
        let dispatch = DispatchTable::build(vec![]);
        assert!(fetch_behavior_addendum(&dispatch).await.is_none());
    }
}
