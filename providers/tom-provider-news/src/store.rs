//! The `news` cache (spec §4.3.3): one row per article, whatever the
//! source — RSS feed item or scraped HTML post. Schema matches
//! `news_server.py::_init_database` column-for-column.

use rusqlite::{params, OptionalExtension};
use tom_core::error::Result;
use tom_provider::cache::ProviderCache;

const INIT_SQL: &str = "
CREATE TABLE IF NOT EXISTS news (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    datetime TEXT NOT NULL DEFAULT (datetime('now')),
    source TEXT NOT NULL,
    category TEXT NOT NULL,
    news_id TEXT NOT NULL,
    author TEXT NOT NULL,
    read INTEGER NOT NULL DEFAULT 0,
    to_read INTEGER NOT NULL DEFAULT 0,
    title TEXT NOT NULL,
    summary TEXT,
    url TEXT NOT NULL
);
";

#[derive(Debug, Clone)]
pub struct NewsRow {
    pub id: i64,
    pub category: String,
    pub author: String,
    pub title: String,
    pub summary: Option<String>,
    pub url: String,
}

/// One incoming article, as handed over by an RSS fetch or a scraper's
/// `scrape()` result, before it's known whether it's already cached.
pub struct NewArticle<'a> {
    pub source: &'a str,
    pub category: &'a str,
    pub news_id: &'a str,
    pub author: &'a str,
    pub title: &'a str,
    pub summary: Option<&'a str>,
    pub url: &'a str,
    pub datetime: Option<&'a str>,
}

pub struct NewsStore {
    db: ProviderCache,
}

impl NewsStore {
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

    /// `news_id`s already known for `source`, used by both the RSS updater
    /// and every scraper to skip articles it has already inserted —
    /// mirrors `BaseScraper.get_existing_ids`.
    pub fn existing_ids_for_source(&self, source: &str) -> Result<Vec<String>> {
        self.db.with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT news_id FROM news WHERE source = ?1")?;
            let rows = stmt.query_map(params![source], |row| row.get::<_, String>(0))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
    }

    /// Insert one new article. Caller is responsible for having already
    /// checked `existing_ids_for_source` — matches the original's
    /// check-then-insert, not an atomic upsert, since `news_id` uniqueness
    /// is only enforced per-source by convention, not a DB constraint.
    pub fn insert(&self, article: NewArticle<'_>) -> Result<i64> {
        self.db.with_connection(|conn| {
            if let Some(dt) = article.datetime {
                conn.execute(
                    "INSERT INTO news (source, category, news_id, author, title, summary, url, datetime) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![article.source, article.category, article.news_id, article.author, article.title, article.summary, article.url, dt],
                )?;
            } else {
                conn.execute(
                    "INSERT INTO news (source, category, news_id, author, title, summary, url) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![article.source, article.category, article.news_id, article.author, article.title, article.summary, article.url],
                )?;
            }
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn set_read(&self, source: &str, news_id: &str, read: bool) -> Result<()> {
        self.db.with_connection(|conn| {
            conn.execute(
                "UPDATE news SET read = ?1 WHERE source = ?2 AND news_id = ?3",
                params![read as i64, source, news_id],
            )
            .map(|_| ())
        })
    }

    /// All unread articles, grouped by category — `get_all_news`'s shape.
    pub fn unread_by_category(&self) -> Result<std::collections::BTreeMap<String, Vec<NewsRow>>> {
        self.db.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, category, author, title, summary, url FROM news WHERE read = 0 ORDER BY datetime DESC",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(NewsRow {
                    id: row.get(0)?,
                    category: row.get(1)?,
                    author: row.get(2)?,
                    title: row.get(3)?,
                    summary: row.get(4)?,
                    url: row.get(5)?,
                })
            })?;
            let mut grouped: std::collections::BTreeMap<String, Vec<NewsRow>> = std::collections::BTreeMap::new();
            for row in rows {
                let row = row?;
                grouped.entry(row.category.clone()).or_default().push(row);
            }
            Ok(grouped)
        })
    }

    pub fn find_by_id(&self, id: i64) -> Result<Option<NewsRow>> {
        self.db.with_connection(|conn| {
            conn.query_row(
                "SELECT id, category, author, title, summary, url FROM news WHERE id = ?1",
                params![id],
                |row| {
                    Ok(NewsRow {
                        id: row.get(0)?,
                        category: row.get(1)?,
                        author: row.get(2)?,
                        title: row.get(3)?,
                        summary: row.get(4)?,
                        url: row.get(5)?,
                    })
                },
            )
            .optional()
        })
    }

    pub fn set_summary(&self, id: i64, summary: &str) -> Result<()> {
        self.db.with_connection(|conn| conn.execute("UPDATE news SET summary = ?1 WHERE id = ?2", params![summary, id]).map(|_| ()))
    }

    pub fn mark_read_by_id(&self, id: i64) -> Result<bool> {
        self.db.with_connection(|conn| Ok(conn.execute("UPDATE news SET read = 1 WHERE id = ?1", params![id])? > 0))
    }

    pub fn mark_to_read_by_id(&self, id: i64) -> Result<bool> {
        self.db.with_connection(|conn| Ok(conn.execute("UPDATE news SET to_read = 1 WHERE id = ?1", params![id])? > 0))
    }

    pub fn unread_count(&self) -> Result<i64> {
        self.db.with_connection(|conn| conn.query_row("SELECT COUNT(*) FROM news WHERE read = 0", [], |row| row.get(0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article<'a>(source: &'a str, news_id: &'a str, title: &'a str) -> NewArticle<'a> {
        NewArticle {
            source,
            category: "AI",
            news_id,
            author: source,
            title,
            summary: Some("a summary"),
            url: "https://example.com",
            datetime: None,
        }
    }

    #[test]
    fn insert_then_unread_by_category_groups_correctly() {
        let store = NewsStore::open_in_memory().unwrap();
        store.insert(article("kyutai", "p1", "Moshi update")).unwrap();
        store.insert(article("mistral", "p2", "Le Chat release")).unwrap();
        let grouped = store.unread_by_category().unwrap();
        assert_eq!(grouped.get("AI").unwrap().len(), 2);
    }

    #[test]
    fn existing_ids_scoped_per_source() {
        let store = NewsStore::open_in_memory().unwrap();
        store.insert(article("kyutai", "p1", "t")).unwrap();
        store.insert(article("mistral", "p1", "t")).unwrap();
        assert_eq!(store.existing_ids_for_source("kyutai").unwrap(), vec!["p1".to_string()]);
    }

    #[test]
    fn mark_read_by_id_removes_from_unread() {
        let store = NewsStore::open_in_memory().unwrap();
        let id = store.insert(article("kyutai", "p1", "t")).unwrap();
        assert!(store.mark_read_by_id(id).unwrap());
        assert!(store.unread_by_category().unwrap().is_empty());
    }

    #[test]
    fn mark_read_by_id_reports_missing_row() {
        let store = NewsStore::open_in_memory().unwrap();
        assert!(!store.mark_read_by_id(999).unwrap());
    }

    #[test]
    fn set_summary_then_find_by_id_round_trips() {
        let store = NewsStore::open_in_memory().unwrap();
        let id = store.insert(article("kyutai", "p1", "t")).unwrap();
        store.set_summary(id, "generated summary").unwrap();
        let row = store.find_by_id(id).unwrap().unwrap();
        assert_eq!(row.summary.as_deref(), Some("generated summary"));
    }
}
