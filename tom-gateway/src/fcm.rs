//! FCM token store, shared with the notifications provider via the same
//! SQLite file (`/data/mcp/notifications/notifications.sqlite`): this
//! store writes registrations straight into that provider's database
//! rather than proxying through it.

use tom_core::error::Result;
use tom_provider::ProviderCache;

const INIT_SQL: &str = "
CREATE TABLE IF NOT EXISTS fcm_tokens (
    token TEXT PRIMARY KEY,
    username TEXT NOT NULL,
    platform TEXT NOT NULL,
    created_at TEXT NOT NULL
);
";

pub struct FcmStore {
    cache: ProviderCache,
}

impl FcmStore {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let cache = ProviderCache::open(path)?;
        cache.init_schema(INIT_SQL)?;
        Ok(Self { cache })
    }

    /// Idempotent upsert keyed by token: registering the same token twice
    /// leaves exactly one row.
    pub fn register(&self, token: &str, username: &str, platform: &str) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        self.cache.with_connection(|conn| {
            conn.execute(
                "INSERT INTO fcm_tokens (token, username, platform, created_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(token) DO UPDATE SET username = excluded.username, platform = excluded.platform",
                rusqlite::params![token, username, platform, now],
            )
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registering_same_token_twice_leaves_one_row() {
        let dir = tempfile::tempdir().unwrap();
        let store = FcmStore::open(dir.path().join("notifications.sqlite")).unwrap();
        store.register("tok1", "alice", "android").unwrap();
        store.register("tok1", "alice", "ios").unwrap();

        let count: i64 = store
            .cache
            .with_connection(|conn| conn.query_row("SELECT COUNT(*) FROM fcm_tokens", [], |r| r.get(0)))
            .unwrap();
        assert_eq!(count, 1);

        let platform: String = store
            .cache
            .with_connection(|conn| {
                conn.query_row("SELECT platform FROM fcm_tokens WHERE token = 'tok1'", [], |r| r.get(0))
            })
            .unwrap();
        assert_eq!(platform, "ios");
    }
}
