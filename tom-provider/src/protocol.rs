//! The `ToolProvider` trait — Tom's generalization of the teacher's
//! `ToolProtocol` trait for a process that owns one or more capability
//! modules (spec §4.3).

use async_trait::async_trait;
use serde_json::Value;
use tom_core::model::Tool;

/// Outcome of a tool invocation. Invalid arguments or a failed upstream
/// call are represented as `Error`, never as a panic or a bare `Err` that
/// would abort the execute loop — the model needs to see the failure as a
/// tool result so it can self-correct (spec §4.1.7, §4.3.2).
#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ToolOutcome {
    Ok { result: Value },
    Error { message: String },
}

impl ToolOutcome {
    pub fn ok(result: Value) -> Self {
        ToolOutcome::Ok { result }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ToolOutcome::Error {
            message: message.into(),
        }
    }

    pub fn into_json(self) -> Value {
        serde_json::to_value(self).expect("ToolOutcome always serializes")
    }
}

/// A single capability module implemented by a provider process.
///
/// One provider binary may host more than one module (e.g. a combined
/// "calendar" process could also serve "contacts"), but in this workspace
/// each provider binary hosts exactly one, matching the one-module-per-tool
/// naming spec §3.4 describes.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Module name, as it appears in the backend's triage catalogue.
    fn name(&self) -> &str;

    /// Short natural-language description (`description://<module>`).
    fn description(&self) -> String;

    /// All tools this module advertises.
    fn tools(&self) -> Vec<Tool>;

    /// System context appended to the execute-phase conversation while
    /// this module is active.
    fn system_context(&self) -> String {
        String::new()
    }

    /// `description://prompt_consign` — optional JSON snippet appended to
    /// the execute-phase system prompt (e.g. todo's live list-name enum).
    fn prompt_consign(&self) -> Option<Value> {
        None
    }

    /// `description://tom_notification` — current notification status.
    /// `None` means "nothing worth surfacing."
    async fn notification_status(&self) -> Option<String> {
        None
    }

    /// Dispatch a tool call by name with pre-parsed JSON arguments.
    async fn invoke(&self, tool_name: &str, arguments: Value) -> ToolOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_outcome_serializes_with_status_tag() {
        let ok = ToolOutcome::ok(serde_json::json!({"value": 4})).into_json();
        assert_eq!(ok["status"], "ok");
        let err = ToolOutcome::error("bad arg").into_json();
        assert_eq!(err["status"], "error");
        assert_eq!(err["message"], "bad arg");
    }
}
