//! The subscription/episode cache (spec §4.3.3), schema matching
//! `gpodder_server.py::_init_database` column-for-column.

use rusqlite::{params, OptionalExtension};
use tom_core::error::Result;
use tom_provider::cache::ProviderCache;

const INIT_SQL: &str = "
CREATE TABLE IF NOT EXISTS subscriptions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    url TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS episodes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    subscription_id INTEGER NOT NULL,
    title TEXT NOT NULL,
    publication_date TEXT,
    url TEXT NOT NULL,
    description TEXT,
    status TEXT NOT NULL DEFAULT 'unplayed'
);
";

#[derive(Debug, Clone)]
pub struct Subscription {
    pub id: i64,
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct SubscriptionSummary {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub total_episodes: i64,
    pub unheard_episodes: i64,
}

#[derive(Debug, Clone)]
pub struct Episode {
    pub id: i64,
    pub podcast_title: String,
    pub podcast_url: String,
    pub title: String,
    pub publication_date: Option<String>,
    pub url: String,
    pub description: Option<String>,
    pub status: String,
}

pub struct GpodderStore {
    db: ProviderCache,
}

impl GpodderStore {
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

    pub fn subscription_urls(&self) -> Result<Vec<String>> {
        self.db.with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT url FROM subscriptions")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
    }

    pub fn insert_subscription(&self, title: &str, url: &str) -> Result<()> {
        self.db.with_connection(|conn| {
            conn.execute("INSERT INTO subscriptions (title, url) VALUES (?1, ?2)", params![title, url]).map(|_| ())
        })
    }

    pub fn delete_subscription_by_url(&self, url: &str) -> Result<()> {
        self.db.with_connection(|conn| conn.execute("DELETE FROM subscriptions WHERE url = ?1", params![url]).map(|_| ()))
    }

    pub fn subscriptions(&self) -> Result<Vec<Subscription>> {
        self.db.with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT id, title, url FROM subscriptions")?;
            let rows = stmt.query_map([], |row| Ok(Subscription { id: row.get(0)?, title: row.get(1)?, url: row.get(2)? }))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
    }

    /// `list_podcast_subscriptions`: every subscription with its total and
    /// unheard episode counts, ordered by title.
    pub fn subscription_summaries(&self) -> Result<Vec<SubscriptionSummary>> {
        self.db.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT s.id, s.title, s.url, COUNT(e.id), \
                 COUNT(CASE WHEN e.status = 'unplayed' THEN 1 END) \
                 FROM subscriptions s LEFT JOIN episodes e ON s.id = e.subscription_id \
                 GROUP BY s.id, s.title, s.url ORDER BY s.title",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(SubscriptionSummary {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    url: row.get(2)?,
                    total_episodes: row.get(3)?,
                    unheard_episodes: row.get(4)?,
                })
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
    }

    pub fn episode_exists(&self, subscription_id: i64, url: &str) -> Result<bool> {
        self.db.with_connection(|conn| {
            conn.query_row(
                "SELECT 1 FROM episodes WHERE subscription_id = ?1 AND url = ?2",
                params![subscription_id, url],
                |_| Ok(()),
            )
            .optional()
            .map(|r| r.is_some())
        })
    }

    pub fn insert_episode(
        &self,
        subscription_id: i64,
        title: &str,
        publication_date: Option<&str>,
        url: &str,
        description: &str,
    ) -> Result<()> {
        self.db.with_connection(|conn| {
            conn.execute(
                "INSERT INTO episodes (subscription_id, title, publication_date, url, description) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![subscription_id, title, publication_date, url, description],
            )
            .map(|_| ())
        })
    }

    pub fn mark_episode_status_by_url(&self, url: &str, status: &str) -> Result<()> {
        self.db.with_connection(|conn| {
            conn.execute("UPDATE episodes SET status = ?1 WHERE url = ?2 AND status != ?1", params![status, url]).map(|_| ())
        })
    }

    /// `_cleanup_old_episodes`: drop played episodes older than 6 months.
    pub fn delete_old_played_episodes(&self) -> Result<usize> {
        self.db.with_connection(|conn| {
            conn.execute(
                "DELETE FROM episodes WHERE status = 'played' AND publication_date < datetime('now', '-6 months')",
                [],
            )
        })
    }

    /// `list_unheard_episodes`: unplayed episodes newest-first, joined to
    /// their podcast, capped at `limit` (caller is responsible for clamping
    /// to the 1..=200 range `list_unheard_episodes` enforces).
    pub fn unheard_episodes(&self, limit: i64) -> Result<Vec<Episode>> {
        self.db.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT s.title, s.url, e.id, e.title, e.publication_date, e.url, e.description, e.status \
                 FROM episodes e JOIN subscriptions s ON e.subscription_id = s.id \
                 WHERE e.status = 'unplayed' ORDER BY e.publication_date DESC, e.id DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], |row| {
                Ok(Episode {
                    podcast_title: row.get(0)?,
                    podcast_url: row.get(1)?,
                    id: row.get(2)?,
                    title: row.get(3)?,
                    publication_date: row.get(4)?,
                    url: row.get(5)?,
                    description: row.get(6)?,
                    status: row.get(7)?,
                })
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
    }

    pub fn unheard_count(&self) -> Result<i64> {
        self.db.with_connection(|conn| conn.query_row("SELECT COUNT(*) FROM episodes WHERE status = 'unplayed'", [], |row| row.get(0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_subscription_then_summaries_report_zero_episodes() {
        let store = GpodderStore::open_in_memory().unwrap();
        store.insert_subscription("Example Cast", "https://example.com/feed").unwrap();
        let summaries = store.subscription_summaries().unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].total_episodes, 0);
        assert_eq!(summaries[0].unheard_episodes, 0);
    }

    #[test]
    fn insert_episode_then_summary_counts_it_unheard() {
        let store = GpodderStore::open_in_memory().unwrap();
        store.insert_subscription("Example Cast", "https://example.com/feed").unwrap();
        let sub = &store.subscriptions().unwrap()[0];
        store.insert_episode(sub.id, "Episode 1", Some("2025-01-01T00:00:00"), "https://example.com/e1", "").unwrap();
        let summaries = store.subscription_summaries().unwrap();
        assert_eq!(summaries[0].total_episodes, 1);
        assert_eq!(summaries[0].unheard_episodes, 1);
    }

    #[test]
    fn episode_exists_is_scoped_to_subscription() {
        let store = GpodderStore::open_in_memory().unwrap();
        store.insert_subscription("A", "https://a").unwrap();
        store.insert_subscription("B", "https://b").unwrap();
        let subs = store.subscriptions().unwrap();
        store.insert_episode(subs[0].id, "E", None, "https://e1", "").unwrap();
        assert!(store.episode_exists(subs[0].id, "https://e1").unwrap());
        assert!(!store.episode_exists(subs[1].id, "https://e1").unwrap());
    }

    #[test]
    fn mark_episode_status_by_url_then_unheard_count_drops() {
        let store = GpodderStore::open_in_memory().unwrap();
        store.insert_subscription("A", "https://a").unwrap();
        let sub = &store.subscriptions().unwrap()[0];
        store.insert_episode(sub.id, "E", None, "https://e1", "").unwrap();
        assert_eq!(store.unheard_count().unwrap(), 1);
        store.mark_episode_status_by_url("https://e1", "played").unwrap();
        assert_eq!(store.unheard_count().unwrap(), 0);
    }

    #[test]
    fn unheard_episodes_orders_newest_first() {
        let store = GpodderStore::open_in_memory().unwrap();
        store.insert_subscription("A", "https://a").unwrap();
        let sub = &store.subscriptions().unwrap()[0];
        store.insert_episode(sub.id, "Old", Some("2024-01-01"), "https://old", "").unwrap();
        store.insert_episode(sub.id, "New", Some("2025-01-01"), "https://new", "").unwrap();
        let episodes = store.unheard_episodes(50).unwrap();
        assert_eq!(episodes[0].title, "New");
    }

    #[test]
    fn delete_subscription_by_url_removes_it() {
        let store = GpodderStore::open_in_memory().unwrap();
        store.insert_subscription("A", "https://a").unwrap();
        store.delete_subscription_by_url("https://a").unwrap();
        assert!(store.subscriptions().unwrap().is_empty());
    }
}
