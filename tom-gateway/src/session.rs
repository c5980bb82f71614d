//! Server-side session store: an opaque token mapping to a username,
//! 30-day sliding TTL, persisted one file per session so a gateway
//! restart doesn't log every user out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tom_core::model::Session;

pub struct SessionStore {
    dir: PathBuf,
    sessions: RwLock<HashMap<String, Session>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionFile {
    username: String,
    created_at: DateTime<Utc>,
    last_seen: DateTime<Utc>,
}

impl SessionStore {
    /// Load every `*.json` file under `dir` as a session, skipping any that
    /// fail to parse (a corrupt session file shouldn't take the gateway
    /// down, it just means that one user has to log in again).
    pub fn load(dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        let mut sessions = HashMap::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let token = match path.file_stem().and_then(|s| s.to_str()) {
                Some(t) => t.to_string(),
                None => continue,
            };
            let raw = match std::fs::read_to_string(&path) {
                Ok(r) => r,
                Err(_) => continue,
            };
            if let Ok(file) = serde_json::from_str::<SessionFile>(&raw) {
                sessions.insert(
                    token.clone(),
                    Session {
                        token,
                        username: file.username,
                        created_at: file.created_at,
                        last_seen: file.last_seen,
                    },
                );
            }
        }
        Ok(Self {
            dir,
            sessions: RwLock::new(sessions),
        })
    }

    fn path_for(&self, token: &str) -> PathBuf {
        self.dir.join(format!("{token}.json"))
    }

    fn persist(&self, session: &Session) {
        let file = SessionFile {
            username: session.username.clone(),
            created_at: session.created_at,
            last_seen: session.last_seen,
        };
        if let Ok(json) = serde_json::to_string(&file) {
            if let Err(e) = std::fs::write(self.path_for(&session.token), json) {
                log::warn!("failed to persist session {}: {e}", session.token);
            }
        }
    }

    /// Create a fresh session for `username` and persist it. Never reuses
    /// a token: login → logout → login always yields a fresh id.
    pub fn create(&self, username: &str) -> Session {
        let now = Utc::now();
        let session = Session {
            token: uuid::Uuid::new_v4().to_string(),
            username: username.to_string(),
            created_at: now,
            last_seen: now,
        };
        self.persist(&session);
        self.sessions
            .write()
            .expect("session store poisoned")
            .insert(session.token.clone(), session.clone());
        session
    }

    /// Resolve `token` to a live username, bumping `last_seen` (sliding
    /// TTL) on success. Returns `None` if the token is unknown or expired.
    pub fn resolve(&self, token: &str) -> Option<String> {
        let mut sessions = self.sessions.write().expect("session store poisoned");
        let session = sessions.get_mut(token)?;
        let now = Utc::now();
        if session.is_expired(now) {
            sessions.remove(token);
            return None;
        }
        session.last_seen = now;
        let username = session.username.clone();
        let persisted = session.clone();
        drop(sessions);
        self.persist(&persisted);
        Some(username)
    }

    /// Destroy a session, removing both the in-memory entry and its file.
    pub fn destroy(&self, token: &str) {
        self.sessions.write().expect("session store poisoned").remove(token);
        let _ = std::fs::remove_file(self.path_for(token));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_resolve_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::load(dir.path()).unwrap();
        let session = store.create("alice");
        assert_eq!(store.resolve(&session.token).as_deref(), Some("alice"));
    }

    #[test]
    fn login_logout_login_yields_fresh_token() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::load(dir.path()).unwrap();
        let first = store.create("alice");
        store.destroy(&first.token);
        let second = store.create("alice");
        assert_ne!(first.token, second.token);
        assert!(store.resolve(&first.token).is_none());
    }

    #[test]
    fn sessions_survive_reload_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let token = {
            let store = SessionStore::load(dir.path()).unwrap();
            store.create("bob").token
        };
        let reloaded = SessionStore::load(dir.path()).unwrap();
        assert_eq!(reloaded.resolve(&token).as_deref(), Some("bob"));
    }

    #[test]
    fn unknown_token_does_not_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::load(dir.path()).unwrap();
        assert!(store.resolve("does-not-exist").is_none());
    }
}
