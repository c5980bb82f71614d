//! Read-through + periodic-refresh cache scaffolding (spec §4.3.3, §4.3.4).
//!
//! Every provider wraps a single SQLite connection in a `Mutex`, following
//! the enrichment source's `SessionManager`/`SchedulerEngine` convention —
//! one writer per process, WAL mode so readers never block on a writer.

use rusqlite::Connection;
use std::sync::Mutex;
use std::time::Duration;
use tom_core::error::{Result, TomError};

/// Thread-safe handle around a provider's single SQLite connection.
pub struct ProviderCache {
    conn: Mutex<Connection>,
}

impl ProviderCache {
    /// Open (or create) the database file at `path` in WAL mode.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| TomError::CacheCorruption(format!("cannot open cache: {e}")))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| TomError::CacheCorruption(format!("cannot enable WAL: {e}")))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database, for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| TomError::CacheCorruption(format!("cannot open in-memory cache: {e}")))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run `init_sql` (idempotent `CREATE TABLE IF NOT EXISTS ...`) against
    /// the connection. Called once at provider startup.
    pub fn init_schema(&self, init_sql: &str) -> Result<()> {
        let conn = self.conn.lock().expect("cache mutex poisoned");
        conn.execute_batch(init_sql)
            .map_err(|e| TomError::CacheCorruption(format!("schema init failed: {e}")))
    }

    /// Run a closure with exclusive access to the connection. Kept short —
    /// never hold this lock across an `.await` of an upstream call.
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> Result<T> {
        let conn = self.conn.lock().expect("cache mutex poisoned");
        f(&conn).map_err(|e| TomError::CacheCorruption(e.to_string()))
    }
}

/// Drives a provider's periodic background refresh without ever blocking a
/// foreground tool call: the refresh future runs on its own spawned task and
/// only touches the cache through [`ProviderCache::with_connection`], which
/// holds the mutex only for the duration of the SQL statement itself.
pub fn spawn_refresh_loop<F, Fut>(interval: Duration, mut refresh: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = Result<()>> + Send,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Err(e) = refresh().await {
                log::warn!("background refresh failed: {e}");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_schema_is_idempotent() {
        let cache = ProviderCache::open_in_memory().unwrap();
        let sql = "CREATE TABLE IF NOT EXISTS items (id INTEGER PRIMARY KEY, name TEXT);";
        cache.init_schema(sql).unwrap();
        cache.init_schema(sql).unwrap();
    }

    #[test]
    fn with_connection_round_trips() {
        let cache = ProviderCache::open_in_memory().unwrap();
        cache
            .init_schema("CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT NOT NULL);")
            .unwrap();
        cache
            .with_connection(|conn| conn.execute("INSERT INTO items (name) VALUES (?1)", ["milk"]))
            .unwrap();
        let name: String = cache
            .with_connection(|conn| {
                conn.query_row("SELECT name FROM items WHERE id = 1", [], |row| row.get(0))
            })
            .unwrap();
        assert_eq!(name, "milk");
    }
}
