//! The `cafetaria`/`solde` cache (spec §4.3.3), schema matching
//! `cafetaria_server.py::_init_database` column-for-column.

use rusqlite::{params, OptionalExtension};
use tom_core::error::Result;
use tom_provider::cache::ProviderCache;

const INIT_SQL: &str = "
CREATE TABLE IF NOT EXISTS cafetaria (
    date TEXT PRIMARY KEY,
    id TEXT NOT NULL,
    is_reserved INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS solde (
    solde TEXT NOT NULL
);
";

#[derive(Debug, Clone, PartialEq)]
pub struct ReservationRow {
    pub date: String,
    pub id: String,
    pub is_reserved: bool,
}

pub struct CafetariaStore {
    db: ProviderCache,
}

impl CafetariaStore {
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

    /// `INSERT OR REPLACE`, matching the original's own upsert-by-date.
    pub fn upsert_reservation(&self, date: &str, id: &str, is_reserved: bool) -> Result<()> {
        self.db.with_connection(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO cafetaria (date, id, is_reserved) VALUES (?1, ?2, ?3)",
                params![date, id, is_reserved],
            )
            .map(|_| ())
        })
    }

    pub fn find_date(&self, date: &str) -> Result<Option<(String, bool)>> {
        self.db.with_connection(|conn| {
            conn.query_row(
                "SELECT id, is_reserved FROM cafetaria WHERE date = ?1",
                params![date],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
        })
    }

    /// Every reservation row from `today` onward, matching the original's
    /// `WHERE date >= ?` (`today`) selection.
    pub fn list_from(&self, today: &str) -> Result<Vec<ReservationRow>> {
        self.db.with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT date, id, is_reserved FROM cafetaria WHERE date >= ?1 ORDER BY date ASC")?;
            let rows = stmt.query_map(params![today], |row| {
                Ok(ReservationRow { date: row.get(0)?, id: row.get(1)?, is_reserved: row.get(2)? })
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
    }

    /// `DELETE FROM solde` then `INSERT`, matching the original's
    /// delete-then-insert single-row replace.
    pub fn replace_solde(&self, solde: &str) -> Result<()> {
        self.db.with_connection(|conn| {
            conn.execute("DELETE FROM solde", [])?;
            conn.execute("INSERT INTO solde (solde) VALUES (?1)", params![solde])?;
            Ok(())
        })
    }

    pub fn get_solde(&self) -> Result<Option<String>> {
        self.db.with_connection(|conn| conn.query_row("SELECT solde FROM solde", [], |row| row.get(0)).optional())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_solde_keeps_a_single_row() {
        let store = CafetariaStore::open_in_memory().unwrap();
        store.replace_solde("12,34 €").unwrap();
        store.replace_solde("9,80 €").unwrap();
        assert_eq!(store.get_solde().unwrap().as_deref(), Some("9,80 €"));
    }

    #[test]
    fn get_solde_none_when_empty() {
        let store = CafetariaStore::open_in_memory().unwrap();
        assert!(store.get_solde().unwrap().is_none());
    }

    #[test]
    fn upsert_reservation_then_find_date() {
        let store = CafetariaStore::open_in_memory().unwrap();
        store.upsert_reservation("2025-01-21", "abc123", false).unwrap();
        let (id, is_reserved) = store.find_date("2025-01-21").unwrap().unwrap();
        assert_eq!(id, "abc123");
        assert!(!is_reserved);
    }

    #[test]
    fn upsert_reservation_replaces_existing_row() {
        let store = CafetariaStore::open_in_memory().unwrap();
        store.upsert_reservation("2025-01-21", "abc123", false).unwrap();
        store.upsert_reservation("2025-01-21", "abc123", true).unwrap();
        let (_, is_reserved) = store.find_date("2025-01-21").unwrap().unwrap();
        assert!(is_reserved);
    }

    #[test]
    fn find_date_none_when_missing() {
        let store = CafetariaStore::open_in_memory().unwrap();
        assert!(store.find_date("2025-01-21").unwrap().is_none());
    }

    #[test]
    fn list_from_only_returns_rows_on_or_after_the_cutoff() {
        let store = CafetariaStore::open_in_memory().unwrap();
        store.upsert_reservation("2025-01-10", "past", true).unwrap();
        store.upsert_reservation("2025-01-21", "today", false).unwrap();
        store.upsert_reservation("2025-02-01", "future", true).unwrap();
        let rows = store.list_from("2025-01-21").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, "today");
        assert_eq!(rows[1].id, "future");
    }
}
