//! The notifications provider: instant messages, reminders, and the
//! once-a-minute reminder-firing worker.

pub mod push;
pub mod store;
pub mod worker;

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use push::{fan_out, PushSender};
use serde_json::{json, Value};
use std::sync::Arc;
use store::NotificationStore;
use tom_core::model::{Recurrence, Tool};
use tom_provider::{ToolOutcome, ToolProvider};

const SERVER_DESCRIPTION: &str = "This module is used to send instant messages to family members via Firebase \
notifications and manage reminders. Use this when the user wants to send a message, notification, or alert to \
another family member immediately, or when they want to be reminded about something at a specific time. For \
example: 'Send a message to mom saying I'll be late', 'Tell Jennifer that dinner is ready', 'Remind me in 2 hours \
to take out the laundry', or 'Remind me tomorrow morning at 9 a.m. to buy bread'.";

pub struct NotificationsProvider {
    store: Arc<NotificationStore>,
    push: Arc<dyn PushSender>,
}

impl NotificationsProvider {
    pub fn new(store: Arc<NotificationStore>, push: Arc<dyn PushSender>) -> Self {
        Self { store, push }
    }

    fn parse_recurrence(value: Option<&str>) -> Result<Recurrence, String> {
        match value {
            None => Ok(Recurrence::None),
            Some("daily") => Ok(Recurrence::Daily),
            Some("weekly") => Ok(Recurrence::Weekly),
            Some("monthly") => Ok(Recurrence::Monthly),
            Some(other) => Err(format!("unknown recurrence '{other}', expected daily/weekly/monthly")),
        }
    }
}

#[async_trait]
impl ToolProvider for NotificationsProvider {
    fn name(&self) -> &str {
        "notifications"
    }

    fn description(&self) -> String {
        SERVER_DESCRIPTION.to_string()
    }

    fn tools(&self) -> Vec<Tool> {
        vec![
            Tool {
                name: "send_instant_message".into(),
                description: "Send an instant message to a family member via mobile notification. This sends the \
                    message immediately, not at a scheduled time. For example: 'Send a message to mom saying I'll be \
                    late', 'Tell Jennifer that dinner is ready', or 'Notify dad that I arrived safely'.".into(),
                parameters_schema: json!({
                    "type": "object",
                    "properties": {
                        "message_text": {"type": "string", "description": "The text of the message to send"},
                        "message_recipient": {"type": "string", "description": "Recipient of the message, must be one of the family members"},
                    },
                    "required": ["message_text", "message_recipient"],
                    "additionalProperties": false,
                }),
                strict: true,
            },
            Tool {
                name: "add_reminder".into(),
                description: "Create a reminder: a time-specific notification prompting the user to perform an \
                    action at a given time. For example: 'Remind me to call my mom tomorrow.', 'Remind Jennifer to go \
                    to school tomorrow at 9am' or 'Remind me at 8 PM to go to sports.' Also handles recurring \
                    reminders like 'Remind me to take my medicine every day at 8am'.".into(),
                parameters_schema: json!({
                    "type": "object",
                    "properties": {
                        "reminder_text": {"type": "string", "description": "The text of the reminder"},
                        "reminder_datetime": {"type": "string", "description": "When to remind, '%Y-%m-%d %H:%M:%S'"},
                        "reminder_recipient": {"type": "string", "description": "Recipient of the reminder"},
                        "recurrence": {"type": ["string", "null"], "description": "Optional: 'daily', 'weekly' or 'monthly'"},
                    },
                    "required": ["reminder_text", "reminder_datetime", "reminder_recipient"],
                    "additionalProperties": false,
                }),
                strict: true,
            },
            Tool {
                name: "list_reminders".into(),
                description: "Retrieve all active or pending reminders previously set for a user. For example: \
                    'List all my reminders.' or 'What reminders do I have?'".into(),
                parameters_schema: json!({
                    "type": "object",
                    "properties": {"username": {"type": "string", "description": "Username to list reminders for"}},
                    "required": ["username"],
                    "additionalProperties": false,
                }),
                strict: true,
            },
            Tool {
                name: "delete_reminder".into(),
                description: "Delete a specific reminder by ID. For example: 'Delete reminder 123', 'Remove the \
                    reminder with ID 456'.".into(),
                parameters_schema: json!({
                    "type": "object",
                    "properties": {"reminder_id": {"type": "string", "description": "ID of the reminder to delete"}},
                    "required": ["reminder_id"],
                    "additionalProperties": false,
                }),
                strict: true,
            },
        ]
    }

    async fn notification_status(&self) -> Option<String> {
        match self.store.pending_count() {
            Ok(0) => None,
            Ok(n) => Some(format!("{n} pending reminder(s)")),
            Err(e) => {
                log::warn!("failed to read pending reminder count: {e}");
                None
            }
        }
    }

    async fn invoke(&self, tool_name: &str, arguments: Value) -> ToolOutcome {
        match tool_name {
            "send_instant_message" => {
                let Some(message_text) = arguments.get("message_text").and_then(|v| v.as_str()) else {
                    return ToolOutcome::error("message_text is required");
                };
                let Some(recipient) = arguments.get("message_recipient").and_then(|v| v.as_str()) else {
                    return ToolOutcome::error("message_recipient is required");
                };
                let sender = arguments.get("sender").and_then(|v| v.as_str()).unwrap_or("system");

                let tokens = match self.store.android_tokens_for(recipient) {
                    Ok(tokens) => tokens,
                    Err(e) => return ToolOutcome::error(e.to_string()),
                };
                let title = format!("Message from {sender}");
                let outcome = fan_out(&*self.push, &tokens, &title, message_text).await;
                let status = if outcome.is_ok() { "success" } else { "failure" };
                if let Err(e) = self.store.log_message(sender, recipient, message_text, status) {
                    log::warn!("failed to record message history: {e}");
                }
                match outcome {
                    Ok(()) => ToolOutcome::ok(json!({ "message": format!("Message sent to {recipient}") })),
                    Err(e) => ToolOutcome::ok(json!({ "failure": true, "message": format!("Failed to send message to {recipient}: {e}") })),
                }
            }
            "add_reminder" => {
                let Some(text) = arguments.get("reminder_text").and_then(|v| v.as_str()) else {
                    return ToolOutcome::error("reminder_text is required");
                };
                let Some(datetime) = arguments.get("reminder_datetime").and_then(|v| v.as_str()) else {
                    return ToolOutcome::error("reminder_datetime is required");
                };
                let Some(recipient) = arguments.get("reminder_recipient").and_then(|v| v.as_str()) else {
                    return ToolOutcome::error("reminder_recipient is required");
                };
                let sender = arguments.get("sender").and_then(|v| v.as_str()).unwrap_or("system");
                let recurrence = match Self::parse_recurrence(arguments.get("recurrence").and_then(|v| v.as_str())) {
                    Ok(r) => r,
                    Err(e) => return ToolOutcome::error(e),
                };
                let Ok(naive) = NaiveDateTime::parse_from_str(datetime, "%Y-%m-%d %H:%M:%S") else {
                    return ToolOutcome::error("reminder_datetime must be in the form 'YYYY-MM-DD HH:MM:SS'");
                };
                let due_at = naive.and_utc();
                match self.store.add_reminder(due_at, sender, recipient, text, recurrence) {
                    Ok(_id) => ToolOutcome::ok(json!({ "message": "Reminder added" })),
                    Err(e) => ToolOutcome::error(e.to_string()),
                }
            }
            "list_reminders" => {
                let Some(username) = arguments.get("username").and_then(|v| v.as_str()) else {
                    return ToolOutcome::error("username is required");
                };
                match self.store.list_pending(username) {
                    Ok(reminders) => {
                        let payload: Vec<Value> = reminders
                            .into_iter()
                            .map(|r| {
                                let mut obj = json!({
                                    "id": r.id,
                                    "reminder_datetime": r.due_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                                    "reminder_message": r.message,
                                });
                                if r.recurrence != Recurrence::None {
                                    obj["recurrence"] = json!(match r.recurrence {
                                        Recurrence::Daily => "daily",
                                        Recurrence::Weekly => "weekly",
                                        Recurrence::Monthly => "monthly",
                                        Recurrence::None => unreachable!(),
                                    });
                                }
                                obj
                            })
                            .collect();
                        ToolOutcome::ok(json!(payload))
                    }
                    Err(e) => ToolOutcome::error(e.to_string()),
                }
            }
            "delete_reminder" => {
                let Some(id_str) = arguments.get("reminder_id").and_then(|v| v.as_str()) else {
                    return ToolOutcome::error("reminder_id is required");
                };
                let Ok(id) = id_str.parse::<i64>() else {
                    return ToolOutcome::error("reminder_id must be numeric");
                };
                match self.store.delete(id) {
                    Ok(true) => ToolOutcome::ok(json!({ "message": "Reminder deleted" })),
                    Ok(false) => ToolOutcome::ok(json!({ "failure": true, "message": "Reminder not found" })),
                    Err(e) => ToolOutcome::error(e.to_string()),
                }
            }
            other => ToolOutcome::error(format!("unknown tool '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use push::LoggingPushSender;

    fn provider() -> NotificationsProvider {
        NotificationsProvider::new(Arc::new(NotificationStore::open_in_memory().unwrap()), Arc::new(LoggingPushSender))
    }

    #[tokio::test]
    async fn add_then_list_reminders_round_trips() {
        let provider = provider();
        let add = provider
            .invoke(
                "add_reminder",
                json!({"reminder_text": "take out the laundry", "reminder_datetime": "2025-01-21 20:00:00", "reminder_recipient": "dad"}),
            )
            .await
            .into_json();
        assert_eq!(add["status"], "ok");

        let listed = provider.invoke("list_reminders", json!({"username": "dad"})).await.into_json();
        let reminders = listed["result"].as_array().unwrap();
        assert_eq!(reminders.len(), 1);
        assert_eq!(reminders[0]["reminder_message"], "take out the laundry");
        assert!(reminders[0].get("recurrence").is_none());
    }

    #[tokio::test]
    async fn add_reminder_rejects_malformed_datetime() {
        let provider = provider();
        let outcome = provider
            .invoke("add_reminder", json!({"reminder_text": "x", "reminder_datetime": "tomorrow", "reminder_recipient": "dad"}))
            .await
            .into_json();
        assert_eq!(outcome["status"], "error");
    }

    #[tokio::test]
    async fn add_reminder_rejects_unknown_recurrence() {
        let provider = provider();
        let outcome = provider
            .invoke(
                "add_reminder",
                json!({"reminder_text": "x", "reminder_datetime": "2025-01-21 20:00:00", "reminder_recipient": "dad", "recurrence": "yearly"}),
            )
            .await
            .into_json();
        assert_eq!(outcome["status"], "error");
    }

    #[tokio::test]
    async fn send_instant_message_without_tokens_reports_failure_not_error() {
        let provider = provider();
        let outcome = provider
            .invoke("send_instant_message", json!({"message_text": "dinner is ready", "message_recipient": "jennifer"}))
            .await
            .into_json();
        assert_eq!(outcome["status"], "ok");
        assert_eq!(outcome["result"]["failure"], true);
    }

    #[tokio::test]
    async fn delete_unknown_reminder_reports_failure_not_error() {
        let provider = provider();
        let outcome = provider.invoke("delete_reminder", json!({"reminder_id": "999"})).await.into_json();
        assert_eq!(outcome["status"], "ok");
        assert_eq!(outcome["result"]["failure"], true);
    }
}
