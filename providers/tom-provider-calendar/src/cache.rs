//! One-year-back/one-year-forward materialized event list, refreshed on
//! every mutation and on any search call. Built on the shared
//! [`tom_provider::cache::ProviderCache`] single-connection pattern.

use crate::upstream::{CalendarUpstream, Event};
use chrono::{Duration, Local};
use rusqlite::params;
use std::sync::Arc;
use tom_core::error::{Result, TomError};
use tom_provider::cache::ProviderCache;

const INIT_SQL: &str = "
CREATE TABLE IF NOT EXISTS events (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    start TEXT NOT NULL,
    end_time TEXT NOT NULL,
    alarms TEXT NOT NULL
);
";

pub struct CalendarCache {
    db: ProviderCache,
    upstream: Arc<dyn CalendarUpstream>,
}

impl CalendarCache {
    pub fn upstream(&self) -> &Arc<dyn CalendarUpstream> {
        &self.upstream
    }

    pub fn open(path: impl AsRef<std::path::Path>, upstream: Arc<dyn CalendarUpstream>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let db = ProviderCache::open(path)?;
        db.init_schema(INIT_SQL)?;
        Ok(Self { db, upstream })
    }

    pub fn open_in_memory(upstream: Arc<dyn CalendarUpstream>) -> Result<Self> {
        let db = ProviderCache::open_in_memory()?;
        db.init_schema(INIT_SQL)?;
        Ok(Self { db, upstream })
    }

    /// `(one year ago, one year from now)` as `"%Y-%m-%d %H:%M:%S"` strings.
    fn materialized_window() -> (String, String) {
        let now = Local::now().naive_local();
        let start = now - Duration::days(365);
        let end = now + Duration::days(365);
        (start.format("%Y-%m-%d %H:%M:%S").to_string(), end.format("%Y-%m-%d %H:%M:%S").to_string())
    }

    /// Pull the one-year-back/one-year-forward window from the upstream and
    /// replace the materialized table wholesale. Called after every mutating
    /// tool call and before every search.
    pub async fn refresh(&self) -> Result<()> {
        let (start, end) = Self::materialized_window();
        let events = self
            .upstream
            .list_events(&start, &end)
            .await
            .map_err(TomError::ToolUpstreamError)?;
        self.db.with_connection(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute("DELETE FROM events", [])?;
            for event in &events {
                let alarms = serde_json::to_string(&event.alarms).unwrap_or_else(|_| "[]".to_string());
                tx.execute(
                    "INSERT INTO events (id, title, description, start, end_time, alarms) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![event.id, event.title, event.description, event.start, event.end, alarms],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    /// Search the materialized cache for events whose start falls within
    /// `[period_from, period_to]` (inclusive), refreshing first.
    pub async fn search(&self, period_from: &str, period_to: &str) -> Result<Vec<Event>> {
        self.refresh().await?;
        self.db.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, description, start, end_time, alarms FROM events \
                 WHERE start >= ?1 AND start <= ?2 ORDER BY start ASC",
            )?;
            let rows = stmt.query_map(params![period_from, period_to], |row| {
                let alarms_json: String = row.get(5)?;
                let alarms: Vec<String> = serde_json::from_str(&alarms_json).unwrap_or_default();
                Ok(Event {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    description: row.get(2)?,
                    start: row.get(3)?,
                    end: row.get(4)?,
                    alarms,
                })
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::{InMemoryCalendarUpstream, NewEvent};

    #[tokio::test]
    async fn search_refreshes_then_filters_by_window() {
        let upstream = Arc::new(InMemoryCalendarUpstream::default());
        upstream
            .add_event(NewEvent {
                title: "Dentist".into(),
                start: "2025-01-21 09:00:00".into(),
                end: "2025-01-21 10:00:00".into(),
                description: None,
            })
            .await
            .unwrap();
        let cache = CalendarCache::open_in_memory(upstream).unwrap();
        let events = cache.search("2025-01-01 00:00:00", "2025-01-31 23:59:59").await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Dentist");
    }

    #[tokio::test]
    async fn search_outside_materialized_range_is_empty() {
        let upstream = Arc::new(InMemoryCalendarUpstream::default());
        let cache = CalendarCache::open_in_memory(upstream).unwrap();
        let events = cache.search("2025-01-01 00:00:00", "2025-01-31 23:59:59").await.unwrap();
        assert!(events.is_empty());
    }
}
