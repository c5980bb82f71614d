//! The calendar provider: search, add, delete and update tools over a
//! materialized event cache.

pub mod cache;
pub mod upstream;

use async_trait::async_trait;
use cache::CalendarCache;
use serde_json::{json, Value};
use tom_core::model::Tool;
use tom_provider::{ToolOutcome, ToolProvider};
use upstream::{EventPatch, NewEvent};

const SERVER_DESCRIPTION: &str =
    "This module is used to manage my personal and familial calendar events, meetings and appointments.";

/// Accepts either `'%Y-%m-%d %H:%M:%S'` or `'%Y-%m-%d %H:%M'` and
/// normalizes to the former, which is what the cache stores and searches
/// on.
fn normalize_datetime(value: &str) -> Option<String> {
    chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M"))
        .ok()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
}

pub struct CalendarProvider {
    cache: CalendarCache,
}

impl CalendarProvider {
    pub fn new(cache: CalendarCache) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl ToolProvider for CalendarProvider {
    fn name(&self) -> &str {
        "calendar"
    }

    fn description(&self) -> String {
        SERVER_DESCRIPTION.to_string()
    }

    fn tools(&self) -> Vec<Tool> {
        vec![
            Tool {
                name: "calendar_search_event".into(),
                description: "Search for events, appointments or meetings in calendars. For example when a user asks \
                    'Do I have an appointment?', 'When is my next', 'When was my last', 'What is planned for'. \
                    This function does not add, remove or update any event in the calendar.".into(),
                parameters_schema: json!({
                    "type": "object",
                    "properties": {
                        "period_from": {"type": "string", "description": "Start of the search window, '%Y-%m-%d'. Oldest usable date is '2020-01-01'."},
                        "period_to": {"type": "string", "description": "End of the search window, '%Y-%m-%d'. Furthest usable date is today plus 5 years."},
                    },
                    "required": ["period_from", "period_to"],
                    "additionalProperties": false,
                }),
                strict: true,
            },
            Tool {
                name: "calendar_add_event".into(),
                description: "Add an appointment, meeting or event to my calendar. For example when a user asks \
                    'Add this to my calendar', 'Add this appointment', 'Add this meeting', 'create this appointment'.".into(),
                parameters_schema: json!({
                    "type": "object",
                    "properties": {
                        "title": {"type": "string", "description": "The title of the event, appointment or meeting"},
                        "start": {"type": "string", "description": "Start date and time, '%Y-%m-%d %H:%M' or '%Y-%m-%d %H:%M:%S'"},
                        "end": {"type": "string", "description": "End date and time, '%Y-%m-%d %H:%M' or '%Y-%m-%d %H:%M:%S'"},
                        "description": {"type": ["string", "null"], "description": "Optional description of the event"},
                    },
                    "required": ["title", "start", "end"],
                    "additionalProperties": false,
                }),
                strict: true,
            },
            Tool {
                name: "calendar_delete_event".into(),
                description: "Delete an event, appointment or meeting from my calendar. For example 'Delete this \
                    appointment', 'Remove this meeting', 'Cancel this event'.".into(),
                parameters_schema: json!({
                    "type": "object",
                    "properties": {
                        "event_id": {"type": "string", "description": "The unique identifier of the event to delete, obtained from a prior search"},
                    },
                    "required": ["event_id"],
                    "additionalProperties": false,
                }),
                strict: true,
            },
            Tool {
                name: "calendar_update_event".into(),
                description: "Update an existing event, appointment or meeting in my calendar. For example 'Change \
                    this appointment time', 'Update this meeting', 'Modify this event'.".into(),
                parameters_schema: json!({
                    "type": "object",
                    "properties": {
                        "event_id": {"type": "string", "description": "The unique identifier of the event to update, obtained from a prior search"},
                        "title": {"type": ["string", "null"], "description": "New title. Unset keeps the current title."},
                        "start": {"type": ["string", "null"], "description": "New start, '%Y-%m-%d %H:%M' or '%Y-%m-%d %H:%M:%S'. Unset keeps the current start."},
                        "end": {"type": ["string", "null"], "description": "New end, '%Y-%m-%d %H:%M' or '%Y-%m-%d %H:%M:%S'. Unset keeps the current end."},
                        "description": {"type": ["string", "null"], "description": "New description. Unset keeps the current description."},
                    },
                    "required": ["event_id"],
                    "additionalProperties": false,
                }),
                strict: true,
            },
        ]
    }

    async fn invoke(&self, tool_name: &str, arguments: Value) -> ToolOutcome {
        match tool_name {
            "calendar_search_event" => {
                let (Some(from), Some(to)) = (
                    arguments.get("period_from").and_then(|v| v.as_str()),
                    arguments.get("period_to").and_then(|v| v.as_str()),
                ) else {
                    return ToolOutcome::error("period_from and period_to are required");
                };
                let (Ok(from_day), Ok(to_day)) = (
                    chrono::NaiveDate::parse_from_str(from, "%Y-%m-%d"),
                    chrono::NaiveDate::parse_from_str(to, "%Y-%m-%d"),
                ) else {
                    return ToolOutcome::error("period_from and period_to must be '%Y-%m-%d'");
                };
                let from_ts = from_day.and_hms_opt(0, 0, 0).unwrap().format("%Y-%m-%d %H:%M:%S").to_string();
                let to_ts = to_day.and_hms_opt(23, 59, 59).unwrap().format("%Y-%m-%d %H:%M:%S").to_string();
                match self.cache.search(&from_ts, &to_ts).await {
                    Ok(events) => ToolOutcome::ok(json!(events)),
                    Err(e) => ToolOutcome::error(e.to_string()),
                }
            }
            "calendar_add_event" => {
                let Some(title) = arguments.get("title").and_then(|v| v.as_str()) else {
                    return ToolOutcome::error("title is required");
                };
                let Some(start) = arguments.get("start").and_then(|v| v.as_str()) else {
                    return ToolOutcome::error("start is required");
                };
                let Some(end) = arguments.get("end").and_then(|v| v.as_str()) else {
                    return ToolOutcome::error("end is required");
                };
                let Some(start) = normalize_datetime(start) else {
                    return ToolOutcome::error("Invalid date format. Expected '%Y-%m-%d %H:%M:%S' or '%Y-%m-%d %H:%M'");
                };
                let Some(end) = normalize_datetime(end) else {
                    return ToolOutcome::error("Invalid date format. Expected '%Y-%m-%d %H:%M:%S' or '%Y-%m-%d %H:%M'");
                };
                let description = arguments.get("description").and_then(|v| v.as_str()).map(str::to_string);
                match self
                    .cache
                    .upstream()
                    .add_event(NewEvent { title: title.to_string(), start, end, description })
                    .await
                {
                    Ok(()) => match self.cache.refresh().await {
                        Ok(()) => ToolOutcome::ok(json!({ "message": "Event added" })),
                        Err(e) => ToolOutcome::error(e.to_string()),
                    },
                    Err(e) => ToolOutcome::error(e),
                }
            }
            "calendar_delete_event" => {
                let Some(event_id) = arguments.get("event_id").and_then(|v| v.as_str()) else {
                    return ToolOutcome::error("event_id is required");
                };
                match self.cache.upstream().delete_event(event_id).await {
                    Ok(()) => match self.cache.refresh().await {
                        Ok(()) => ToolOutcome::ok(json!({ "message": "Event deleted" })),
                        Err(e) => ToolOutcome::error(e.to_string()),
                    },
                    Err(e) => ToolOutcome::error(e),
                }
            }
            "calendar_update_event" => {
                let Some(event_id) = arguments.get("event_id").and_then(|v| v.as_str()) else {
                    return ToolOutcome::error("event_id is required");
                };
                let start = match arguments.get("start").and_then(|v| v.as_str()) {
                    Some(s) => match normalize_datetime(s) {
                        Some(s) => Some(s),
                        None => return ToolOutcome::error("Invalid start date format. Expected '%Y-%m-%d %H:%M:%S' or '%Y-%m-%d %H:%M'"),
                    },
                    None => None,
                };
                let end = match arguments.get("end").and_then(|v| v.as_str()) {
                    Some(s) => match normalize_datetime(s) {
                        Some(s) => Some(s),
                        None => return ToolOutcome::error("Invalid end date format. Expected '%Y-%m-%d %H:%M:%S' or '%Y-%m-%d %H:%M'"),
                    },
                    None => None,
                };
                let patch = EventPatch {
                    title: arguments.get("title").and_then(|v| v.as_str()).map(str::to_string),
                    start,
                    end,
                    description: arguments.get("description").and_then(|v| v.as_str()).map(str::to_string),
                };
                match self.cache.upstream().update_event(event_id, patch).await {
                    Ok(()) => match self.cache.refresh().await {
                        Ok(()) => ToolOutcome::ok(json!({ "message": "Event updated" })),
                        Err(e) => ToolOutcome::error(e.to_string()),
                    },
                    Err(e) => ToolOutcome::error(e),
                }
            }
            other => ToolOutcome::error(format!("unknown tool '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use upstream::InMemoryCalendarUpstream;

    fn provider() -> CalendarProvider {
        let upstream: Arc<dyn upstream::CalendarUpstream> = Arc::new(InMemoryCalendarUpstream::default());
        CalendarProvider::new(CalendarCache::open_in_memory(upstream).unwrap())
    }

    #[tokio::test]
    async fn add_then_search_finds_event_scenario_three() {
        let provider = provider();
        let tomorrow = (chrono::Local::now() + chrono::Duration::days(1)).format("%Y-%m-%d").to_string();
        let add = provider
            .invoke(
                "calendar_add_event",
                json!({"title": "Dentist", "start": format!("{tomorrow} 09:00:00"), "end": format!("{tomorrow} 10:00:00")}),
            )
            .await
            .into_json();
        assert_eq!(add["status"], "ok");

        let search = provider
            .invoke("calendar_search_event", json!({"period_from": tomorrow, "period_to": tomorrow}))
            .await
            .into_json();
        let events = search["result"].as_array().unwrap();
        assert!(events.iter().any(|e| e["title"] == "Dentist"));
    }

    #[tokio::test]
    async fn add_event_rejects_end_before_start() {
        let provider = provider();
        let outcome = provider
            .invoke("calendar_add_event", json!({"title": "Backwards", "start": "2025-01-21 10:00:00", "end": "2025-01-21 09:00:00"}))
            .await
            .into_json();
        assert_eq!(outcome["status"], "error");
    }

    #[tokio::test]
    async fn search_rejects_malformed_dates() {
        let provider = provider();
        let outcome = provider
            .invoke("calendar_search_event", json!({"period_from": "21/01/2025", "period_to": "2025-01-31"}))
            .await
            .into_json();
        assert_eq!(outcome["status"], "error");
    }
}
