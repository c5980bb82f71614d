//! Reminders, message history and FCM tokens, all in the one SQLite file
//! this provider owns. The `fcm_tokens` table is shared with
//! `tom-gateway`'s `fcmtoken` endpoint, which writes into the same file
//! directly rather than proxying through this process.

use chrono::{DateTime, Utc};
use rusqlite::params;
use tom_core::error::Result;
use tom_core::model::Recurrence;
use tom_provider::cache::ProviderCache;

const INIT_SQL: &str = "
CREATE TABLE IF NOT EXISTS reminders (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    due_at TEXT NOT NULL,
    sender TEXT NOT NULL,
    recipient TEXT NOT NULL,
    sent INTEGER NOT NULL DEFAULT 0,
    message TEXT NOT NULL,
    recurrence TEXT NOT NULL DEFAULT 'none'
);
CREATE TABLE IF NOT EXISTS message_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at TEXT NOT NULL,
    sender TEXT NOT NULL,
    recipient TEXT NOT NULL,
    message TEXT NOT NULL,
    status TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS fcm_tokens (
    token TEXT PRIMARY KEY,
    username TEXT NOT NULL,
    platform TEXT NOT NULL,
    created_at TEXT NOT NULL
);
";

/// A reminder row as read back from SQLite, carrying its primary key.
#[derive(Debug, Clone)]
pub struct StoredReminder {
    pub id: i64,
    pub due_at: DateTime<Utc>,
    pub sender: String,
    pub recipient: String,
    pub message: String,
    pub recurrence: Recurrence,
}

fn recurrence_from_str(s: &str) -> Recurrence {
    match s {
        "daily" => Recurrence::Daily,
        "weekly" => Recurrence::Weekly,
        "monthly" => Recurrence::Monthly,
        _ => Recurrence::None,
    }
}

fn recurrence_to_str(r: Recurrence) -> &'static str {
    match r {
        Recurrence::None => "none",
        Recurrence::Daily => "daily",
        Recurrence::Weekly => "weekly",
        Recurrence::Monthly => "monthly",
    }
}

pub struct NotificationStore {
    db: ProviderCache,
}

impl NotificationStore {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let db = ProviderCache::open(path)?;
        db.init_schema(INIT_SQL)?;
        Ok(Self { db })
    }

    pub fn open_in_memory() -> Result<Self> {
        let db = ProviderCache::open_in_memory()?;
        db.init_schema(INIT_SQL)?;
        Ok(Self { db })
    }

    pub fn add_reminder(
        &self,
        due_at: DateTime<Utc>,
        sender: &str,
        recipient: &str,
        message: &str,
        recurrence: Recurrence,
    ) -> Result<i64> {
        self.db.with_connection(|conn| {
            conn.execute(
                "INSERT INTO reminders (due_at, sender, recipient, message, recurrence) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![due_at.to_rfc3339(), sender, recipient, message, recurrence_to_str(recurrence)],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Pending reminders for `recipient`, oldest due first — matches
    /// `list_reminders`' `WHERE sent = 0 ... ORDER BY notification`.
    pub fn list_pending(&self, recipient: &str) -> Result<Vec<StoredReminder>> {
        self.db.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, due_at, sender, recipient, message, recurrence FROM reminders \
                 WHERE sent = 0 AND recipient = ?1 ORDER BY due_at ASC",
            )?;
            let rows = stmt.query_map(params![recipient], row_to_reminder)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
    }

    /// Every unsent reminder whose `due_at` has passed `now` — the worker
    /// tick's selection query.
    pub fn due_reminders(&self, now: DateTime<Utc>) -> Result<Vec<StoredReminder>> {
        self.db.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, due_at, sender, recipient, message, recurrence FROM reminders \
                 WHERE sent = 0 AND due_at < ?1",
            )?;
            let rows = stmt.query_map(params![now.to_rfc3339()], row_to_reminder)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
    }

    pub fn mark_sent(&self, id: i64) -> Result<()> {
        self.db.with_connection(|conn| conn.execute("UPDATE reminders SET sent = 1 WHERE id = ?1", params![id]).map(|_| ()))
    }

    pub fn reschedule(&self, id: i64, next_due: DateTime<Utc>) -> Result<()> {
        self.db.with_connection(|conn| {
            conn.execute(
                "UPDATE reminders SET due_at = ?1, sent = 0 WHERE id = ?2",
                params![next_due.to_rfc3339(), id],
            )
            .map(|_| ())
        })
    }

    /// Returns `true` if a row was actually removed.
    pub fn delete(&self, id: i64) -> Result<bool> {
        self.db.with_connection(|conn| Ok(conn.execute("DELETE FROM reminders WHERE id = ?1", params![id])? > 0))
    }

    pub fn log_message(&self, sender: &str, recipient: &str, message: &str, status: &str) -> Result<()> {
        self.db.with_connection(|conn| {
            conn.execute(
                "INSERT INTO message_history (created_at, sender, recipient, message, status) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![Utc::now().to_rfc3339(), sender, recipient, message, status],
            )
            .map(|_| ())
        })
    }

    /// Android FCM tokens registered for `username` (the gateway's
    /// `fcmtoken` endpoint populates this table directly).
    pub fn android_tokens_for(&self, username: &str) -> Result<Vec<String>> {
        self.db.with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT token FROM fcm_tokens WHERE username = ?1 AND platform LIKE 'android%'")?;
            let rows = stmt.query_map(params![username], |row| row.get::<_, String>(0))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
    }

    /// Count of pending reminders across every recipient, used for the
    /// `tom_notification` status surface.
    pub fn pending_count(&self) -> Result<i64> {
        self.db.with_connection(|conn| conn.query_row("SELECT COUNT(*) FROM reminders WHERE sent = 0", [], |row| row.get(0)))
    }

    #[cfg(test)]
    pub fn insert_fcm_token_for_test(&self, token: &str, username: &str, platform: &str) {
        self.db
            .with_connection(|conn| {
                conn.execute(
                    "INSERT INTO fcm_tokens (token, username, platform, created_at) VALUES (?1, ?2, ?3, ?4)",
                    params![token, username, platform, Utc::now().to_rfc3339()],
                )
            })
            .unwrap();
    }
}

fn row_to_reminder(row: &rusqlite::Row) -> rusqlite::Result<StoredReminder> {
    let due_at: String = row.get(1)?;
    let recurrence: String = row.get(5)?;
    Ok(StoredReminder {
        id: row.get(0)?,
        due_at: DateTime::parse_from_rfc3339(&due_at).map(|dt| dt.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now()),
        sender: row.get(2)?,
        recipient: row.get(3)?,
        message: row.get(4)?,
        recurrence: recurrence_from_str(&recurrence),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn add_then_list_pending_round_trips() {
        let store = NotificationStore::open_in_memory().unwrap();
        let due = Utc::now() + Duration::hours(2);
        store.add_reminder(due, "dad", "jennifer", "go to school", Recurrence::None).unwrap();
        let pending = store.list_pending("jennifer").unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].message, "go to school");
    }

    #[test]
    fn due_reminders_excludes_future_ones() {
        let store = NotificationStore::open_in_memory().unwrap();
        store.add_reminder(Utc::now() + Duration::hours(2), "dad", "jennifer", "future", Recurrence::None).unwrap();
        store.add_reminder(Utc::now() - Duration::minutes(1), "dad", "jennifer", "past due", Recurrence::None).unwrap();
        let due = store.due_reminders(Utc::now()).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].message, "past due");
    }

    #[test]
    fn mark_sent_removes_from_pending() {
        let store = NotificationStore::open_in_memory().unwrap();
        let id = store.add_reminder(Utc::now() - Duration::minutes(1), "dad", "jennifer", "past due", Recurrence::None).unwrap();
        store.mark_sent(id).unwrap();
        assert!(store.list_pending("jennifer").unwrap().is_empty());
    }

    #[test]
    fn reschedule_advances_due_at_and_clears_sent() {
        let store = NotificationStore::open_in_memory().unwrap();
        let id = store.add_reminder(Utc::now() - Duration::minutes(1), "dad", "jennifer", "medicine", Recurrence::Daily).unwrap();
        store.mark_sent(id).unwrap();
        let next = Utc::now() + Duration::days(1);
        store.reschedule(id, next).unwrap();
        let pending = store.list_pending("jennifer").unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].due_at.date_naive(), next.date_naive());
    }

    #[test]
    fn delete_reports_whether_a_row_was_removed() {
        let store = NotificationStore::open_in_memory().unwrap();
        let id = store.add_reminder(Utc::now(), "dad", "jennifer", "x", Recurrence::None).unwrap();
        assert!(store.delete(id).unwrap());
        assert!(!store.delete(id).unwrap());
    }

    #[test]
    fn android_tokens_ignore_ios_platform() {
        let store = NotificationStore::open_in_memory().unwrap();
        store.insert_fcm_token_for_test("t1", "jennifer", "android-phone");
        store.insert_fcm_token_for_test("t2", "jennifer", "ios");
        let tokens = store.android_tokens_for("jennifer").unwrap();
        assert_eq!(tokens, vec!["t1".to_string()]);
    }
}
