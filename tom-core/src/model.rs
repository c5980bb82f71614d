//! Shared data model: `User`, `Session`, `Conversation`, the
//! `Tool`/`Module`/`Service` triple, provider cache rows, notification
//! status, FCM tokens, reminders and call-log entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Immutable identity, loaded once from the YAML user table at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub password_hash: String,
    pub personal_context: String,
    pub timezone: Option<String>,
}

/// Server-side session record. TTL is 30 days sliding: every successful
/// lookup bumps `last_seen`, and expiry is computed from that field, not
/// from `created_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl Session {
    pub const TTL_DAYS: i64 = 30;

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.last_seen > chrono::Duration::days(Self::TTL_DAYS)
    }
}

/// A single message in a conversation. Mirrors the OpenAI-compatible
/// chat-completions wire shape so conversation state can be handed to the
/// LLM adapter without translation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: MessageRole,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRequest>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub function_name: String,
    pub arguments_json: String,
}

/// Per-user, in-memory, append-only (except slot 0) message log.
///
/// Slot 0 is always the clock preamble, rewritten in place on every turn.
/// Slot 1 is the base assistant charter + personal context + behavior
/// addendum, appended once when the conversation is (re)created.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<ConversationMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    /// Replace slot 0 with a fresh clock preamble, or insert it if this is
    /// the conversation's first turn.
    pub fn set_clock_preamble(&mut self, content: String) {
        let msg = ConversationMessage {
            role: MessageRole::System,
            content,
            tool_call_id: None,
            tool_calls: None,
        };
        if self.messages.is_empty() {
            self.messages.push(msg);
        } else {
            self.messages[0] = msg;
        }
    }

    /// Append the base system prompt. Only meaningful immediately after
    /// `set_clock_preamble` on a freshly created conversation (slot 1).
    pub fn push_base_context(&mut self, content: String) {
        self.messages.push(ConversationMessage {
            role: MessageRole::System,
            content,
            tool_call_id: None,
            tool_calls: None,
        });
    }

    pub fn push_user(&mut self, content: String) {
        self.messages.push(ConversationMessage {
            role: MessageRole::User,
            content,
            tool_call_id: None,
            tool_calls: None,
        });
    }

    pub fn push_assistant(&mut self, content: String, tool_calls: Option<Vec<ToolCallRequest>>) {
        self.messages.push(ConversationMessage {
            role: MessageRole::Assistant,
            content,
            tool_call_id: None,
            tool_calls,
        });
    }

    pub fn push_tool_result(&mut self, tool_call_id: String, content: String) {
        self.messages.push(ConversationMessage {
            role: MessageRole::Tool,
            content,
            tool_call_id: Some(tool_call_id),
            tool_calls: None,
        });
    }

    /// Clear everything. Used by `/reset` and greeting-triggered resets.
    pub fn reset(&mut self) {
        self.messages.clear();
    }
}

/// A single callable function advertised by a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub parameters_schema: serde_json::Value,
    pub strict: bool,
}

/// A capability grouping of tools, as advertised by one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    pub description: String,
    pub complexity: u8,
    pub tools: Vec<Tool>,
    pub system_context: String,
    pub is_personal: bool,
    pub base_url: String,
}

/// A live handle to a provider process plus its advertised module.
#[derive(Debug, Clone)]
pub struct ServiceInstance {
    pub module: Module,
}

/// Generic shape shared across every provider's SQLite cache table: a
/// monotonic id, a freshness timestamp, and a JSON payload specific to the
/// provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRow {
    pub id: i64,
    pub updated_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

/// Per-provider notification status, as read by the aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationStatus {
    pub timestamp: DateTime<Utc>,
    pub status: Option<String>,
}

/// `/tasks` response shape: one aggregate id plus the per-module snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasksSnapshot {
    pub status_id: i64,
    pub tasks: Vec<ModuleTaskStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleTaskStatus {
    pub module: String,
    pub status: Option<String>,
}

/// `/status` response entry for a single provider, per spec §6.1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderStatus {
    pub name: String,
    pub up: bool,
    pub last_refresh: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FcmToken {
    pub token: String,
    pub username: String,
    pub platform: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recurrence {
    None,
    Daily,
    Weekly,
    Monthly,
}

impl Recurrence {
    /// Advance `from` by this recurrence's interval. Monthly is approximated
    /// as a fixed 30-day span rather than calendar-month arithmetic.
    pub fn advance(self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Recurrence::None => None,
            Recurrence::Daily => Some(from + chrono::Duration::days(1)),
            Recurrence::Weekly => Some(from + chrono::Duration::weeks(1)),
            Recurrence::Monthly => Some(from + chrono::Duration::days(30)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    pub id: String,
    pub due_at: DateTime<Utc>,
    pub recipient: String,
    pub sender: String,
    pub message: String,
    pub sent: bool,
    pub recurrence: Recurrence,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallLogEntry {
    pub timestamp: DateTime<Utc>,
    pub username: String,
    pub user_input: String,
    pub functions_called: Vec<FunctionCallRecord>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCallRecord {
    pub function: String,
    pub parameters: HashMap<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_expires_after_ttl() {
        let now = Utc::now();
        let session = Session {
            token: "t".into(),
            username: "alice".into(),
            created_at: now - chrono::Duration::days(40),
            last_seen: now - chrono::Duration::days(31),
        };
        assert!(session.is_expired(now));
    }

    #[test]
    fn session_sliding_window_refreshes_on_last_seen() {
        let now = Utc::now();
        let session = Session {
            token: "t".into(),
            username: "alice".into(),
            created_at: now - chrono::Duration::days(40),
            last_seen: now - chrono::Duration::days(1),
        };
        assert!(!session.is_expired(now));
    }

    #[test]
    fn conversation_slot_zero_is_rewritable() {
        let mut conv = Conversation::new();
        conv.set_clock_preamble("Monday 20 January 2025".into());
        conv.push_base_context("charter".into());
        conv.push_user("hi".into());
        assert_eq!(conv.messages().len(), 3);

        conv.set_clock_preamble("Tuesday 21 January 2025".into());
        assert_eq!(conv.messages().len(), 3);
        assert_eq!(conv.messages()[0].content, "Tuesday 21 January 2025");
    }

    #[test]
    fn recurrence_monthly_is_thirty_days() {
        let start = Utc::now();
        let next = Recurrence::Monthly.advance(start).unwrap();
        assert_eq!((next - start).num_days(), 30);
    }

    #[test]
    fn recurrence_none_has_no_next_occurrence() {
        assert!(Recurrence::None.advance(Utc::now()).is_none());
    }
}
