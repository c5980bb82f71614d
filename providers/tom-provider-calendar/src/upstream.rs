//! The CalDAV-shaped upstream the calendar cache refreshes against.
//! CalDAV itself is an external collaborator out of scope for this core;
//! this trait is the seam a real `caldav`-backed client would plug into,
//! with method shapes (`listEvent`, `addEvent`, `deleteEvent`,
//! `updateEvent`) matching what a CalDAV calendar needs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Stored as `"%Y-%m-%d %H:%M:%S"`.
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub alarms: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub title: String,
    pub start: String,
    pub end: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct EventPatch {
    pub title: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub description: Option<String>,
}

#[async_trait]
pub trait CalendarUpstream: Send + Sync {
    /// List every event whose start falls within `[start, end]`
    /// (`"%Y-%m-%d %H:%M:%S"`). The cache calls this with a one-year-back /
    /// one-year-forward window on every refresh.
    async fn list_events(&self, start: &str, end: &str) -> Result<Vec<Event>, String>;
    async fn add_event(&self, event: NewEvent) -> Result<(), String>;
    async fn delete_event(&self, event_id: &str) -> Result<(), String>;
    async fn update_event(&self, event_id: &str, patch: EventPatch) -> Result<(), String>;
}

/// In-memory stand-in for the real CalDAV connection. Good enough to
/// exercise the cache-refresh and tool contract; a production deployment
/// swaps this for a `caldav`-backed implementation without touching
/// `CalendarProvider` or `CalendarCache`.
pub struct InMemoryCalendarUpstream {
    events: Mutex<Vec<Event>>,
    next_id: Mutex<u64>,
}

impl Default for InMemoryCalendarUpstream {
    fn default() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            next_id: Mutex::new(1),
        }
    }
}

impl InMemoryCalendarUpstream {
    async fn fresh_id(&self) -> String {
        let mut next = self.next_id.lock().await;
        let id = *next;
        *next += 1;
        id.to_string()
    }
}

#[async_trait]
impl CalendarUpstream for InMemoryCalendarUpstream {
    async fn list_events(&self, start: &str, end: &str) -> Result<Vec<Event>, String> {
        let events = self.events.lock().await;
        Ok(events
            .iter()
            .filter(|e| e.start.as_str() >= start && e.start.as_str() <= end)
            .cloned()
            .collect())
    }

    async fn add_event(&self, event: NewEvent) -> Result<(), String> {
        if event.end <= event.start {
            return Err("End time must be after start time".to_string());
        }
        let id = self.fresh_id().await;
        self.events.lock().await.push(Event {
            id,
            title: event.title,
            description: event.description.unwrap_or_default(),
            start: event.start,
            end: event.end,
            alarms: Vec::new(),
        });
        Ok(())
    }

    async fn delete_event(&self, event_id: &str) -> Result<(), String> {
        let mut events = self.events.lock().await;
        let before = events.len();
        events.retain(|e| e.id != event_id);
        if events.len() == before {
            return Err("Event not found".to_string());
        }
        Ok(())
    }

    async fn update_event(&self, event_id: &str, patch: EventPatch) -> Result<(), String> {
        let mut events = self.events.lock().await;
        let event = events
            .iter_mut()
            .find(|e| e.id == event_id)
            .ok_or_else(|| "Event not found".to_string())?;
        if let Some(title) = patch.title {
            event.title = title;
        }
        if let Some(start) = patch.start {
            event.start = start;
        }
        if let Some(end) = patch.end {
            event.end = end;
        }
        if let Some(description) = patch.description {
            event.description = description;
        }
        if event.end <= event.start {
            return Err("End time must be after start time".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(title: &str, start: &str, end: &str) -> NewEvent {
        NewEvent { title: title.into(), start: start.into(), end: end.into(), description: None }
    }

    #[tokio::test]
    async fn add_then_list_round_trips() {
        let upstream = InMemoryCalendarUpstream::default();
        upstream.add_event(event("Dentist", "2025-01-21 09:00:00", "2025-01-21 10:00:00")).await.unwrap();
        let events = upstream.list_events("2025-01-01 00:00:00", "2025-01-31 23:59:59").await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Dentist");
    }

    #[tokio::test]
    async fn list_events_excludes_out_of_range() {
        let upstream = InMemoryCalendarUpstream::default();
        upstream.add_event(event("Dentist", "2025-01-21 09:00:00", "2025-01-21 10:00:00")).await.unwrap();
        let events = upstream.list_events("2025-02-01 00:00:00", "2025-02-28 23:59:59").await.unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn add_event_rejects_end_before_start() {
        let upstream = InMemoryCalendarUpstream::default();
        let err = upstream
            .add_event(event("Backwards", "2025-01-21 10:00:00", "2025-01-21 09:00:00"))
            .await
            .unwrap_err();
        assert!(err.contains("End time"));
    }

    #[tokio::test]
    async fn delete_then_list_omits_event() {
        let upstream = InMemoryCalendarUpstream::default();
        upstream.add_event(event("Dentist", "2025-01-21 09:00:00", "2025-01-21 10:00:00")).await.unwrap();
        let id = upstream.list_events("2025-01-01 00:00:00", "2025-01-31 23:59:59").await.unwrap()[0].id.clone();
        upstream.delete_event(&id).await.unwrap();
        assert!(upstream.list_events("2025-01-01 00:00:00", "2025-01-31 23:59:59").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_event_changes_title_only() {
        let upstream = InMemoryCalendarUpstream::default();
        upstream.add_event(event("Dentist", "2025-01-21 09:00:00", "2025-01-21 10:00:00")).await.unwrap();
        let id = upstream.list_events("2025-01-01 00:00:00", "2025-01-31 23:59:59").await.unwrap()[0].id.clone();
        upstream
            .update_event(&id, EventPatch { title: Some("Orthodontist".into()), ..Default::default() })
            .await
            .unwrap();
        let events = upstream.list_events("2025-01-01 00:00:00", "2025-01-31 23:59:59").await.unwrap();
        assert_eq!(events[0].title, "Orthodontist");
        assert_eq!(events[0].start, "2025-01-21 09:00:00");
    }
}
