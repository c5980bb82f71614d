//! The geocoding cache (spec §4.3.3): one row per city name ever looked
//! up, so a repeat lookup never needs a geocoding call. The original
//! keeps this in a flat JSON file (`weather_gps_cache.json`); every other
//! provider in this workspace persists its cache in SQLite through
//! [`ProviderCache`], so this one follows suit instead of introducing a
//! second on-disk format.

use rusqlite::{params, OptionalExtension};
use tom_core::error::Result;
use tom_provider::cache::ProviderCache;

const INIT_SQL: &str = "
CREATE TABLE IF NOT EXISTS gps_cache (
    city_name TEXT PRIMARY KEY,
    country TEXT NOT NULL,
    gps_latitude REAL NOT NULL,
    gps_longitude REAL NOT NULL
);
";

#[derive(Debug, Clone, serde::Serialize)]
pub struct CachedCity {
    pub name: String,
    pub country: String,
    pub gps_latitude: f64,
    pub gps_longitude: f64,
}

pub struct WeatherStore {
    db: ProviderCache,
}

impl WeatherStore {
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

    /// Case-insensitive lookup by city name, matching `get_city_gps`'s own
    /// `.lower()`-normalized cache key.
    pub fn find_by_name(&self, city_name: &str) -> Result<Option<CachedCity>> {
        self.db.with_connection(|conn| {
            conn.query_row(
                "SELECT city_name, country, gps_latitude, gps_longitude FROM gps_cache WHERE LOWER(city_name) = LOWER(?1)",
                params![city_name],
                |row| Ok(CachedCity { name: row.get(0)?, country: row.get(1)?, gps_latitude: row.get(2)?, gps_longitude: row.get(3)? }),
            )
            .optional()
        })
    }

    pub fn insert(&self, city: &CachedCity) -> Result<()> {
        self.db.with_connection(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO gps_cache (city_name, country, gps_latitude, gps_longitude) VALUES (?1, ?2, ?3, ?4)",
                params![city.name, city.country, city.gps_latitude, city.gps_longitude],
            )
            .map(|_| ())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_find_by_name_is_case_insensitive() {
        let store = WeatherStore::open_in_memory().unwrap();
        store.insert(&CachedCity { name: "Paris".into(), country: "France".into(), gps_latitude: 48.85, gps_longitude: 2.35 }).unwrap();
        let found = store.find_by_name("paris").unwrap().unwrap();
        assert_eq!(found.country, "France");
    }

    #[test]
    fn find_by_name_none_when_not_cached() {
        let store = WeatherStore::open_in_memory().unwrap();
        assert!(store.find_by_name("Atlantis").unwrap().is_none());
    }

    #[test]
    fn insert_replaces_existing_entry_for_same_city() {
        let store = WeatherStore::open_in_memory().unwrap();
        store.insert(&CachedCity { name: "Paris".into(), country: "France".into(), gps_latitude: 1.0, gps_longitude: 1.0 }).unwrap();
        store.insert(&CachedCity { name: "Paris".into(), country: "France".into(), gps_latitude: 48.85, gps_longitude: 2.35 }).unwrap();
        let found = store.find_by_name("Paris").unwrap().unwrap();
        assert_eq!(found.gps_latitude, 48.85);
    }
}
