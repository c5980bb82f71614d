//! The `autonomous` daily-counters cache (spec §4.3.3), schema matching
//! `kwyk_server.py::_init_database` column-for-column.

use rusqlite::{params, OptionalExtension};
use tom_core::error::Result;
use tom_provider::cache::ProviderCache;

const INIT_SQL: &str = "
CREATE TABLE IF NOT EXISTS autonomous (
    date TEXT NOT NULL DEFAULT (date('now')),
    daycorrect INTEGER NOT NULL,
    daymcq INTEGER NOT NULL,
    dayincorrect INTEGER NOT NULL,
    daytotal INTEGER NOT NULL,
    fullcorrect INTEGER NOT NULL,
    fullmcq INTEGER NOT NULL,
    fullincorrect INTEGER NOT NULL,
    fulltotal INTEGER NOT NULL
);
";

#[derive(Debug, Clone, Copy)]
pub struct CumulativeTotals {
    pub correct: i64,
    pub mcq: i64,
    pub incorrect: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct DailyDelta {
    pub correct: i64,
    pub mcq: i64,
    pub incorrect: i64,
    pub total: i64,
}

pub struct KwykStore {
    db: ProviderCache,
}

impl KwykStore {
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

    /// Most recent row strictly before today, used to derive the day's
    /// delta from the platform's cumulative totals.
    fn last_totals_before_today(&self) -> Result<Option<CumulativeTotals>> {
        self.db.with_connection(|conn| {
            conn.query_row(
                "SELECT fullcorrect, fullmcq, fullincorrect, fulltotal FROM autonomous \
                 WHERE date < date('now') ORDER BY date DESC LIMIT 1",
                [],
                |row| Ok(CumulativeTotals { correct: row.get(0)?, mcq: row.get(1)?, incorrect: row.get(2)?, total: row.get(3)? }),
            )
            .optional()
        })
    }

    /// `update`: replace today's row with freshly derived totals. Deleting
    /// then inserting matches the original's own `DELETE ... WHERE date =
    /// ?` followed by a fresh `INSERT`, so repeated updates within the
    /// same day never double-count.
    pub fn record_today(&self, totals: CumulativeTotals) -> Result<DailyDelta> {
        let baseline = self.last_totals_before_today()?;
        let delta = match baseline {
            Some(b) => DailyDelta {
                correct: totals.correct - b.correct,
                mcq: totals.mcq - b.mcq,
                incorrect: totals.incorrect - b.incorrect,
                total: totals.total - b.total,
            },
            None => DailyDelta { correct: totals.correct, mcq: totals.mcq, incorrect: totals.incorrect, total: totals.total },
        };

        self.db.with_connection(|conn| {
            conn.execute("DELETE FROM autonomous WHERE date = date('now')", [])?;
            conn.execute(
                "INSERT INTO autonomous (date, daycorrect, daymcq, dayincorrect, daytotal, fullcorrect, fullmcq, fullincorrect, fulltotal) \
                 VALUES (date('now'), ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![delta.correct, delta.mcq, delta.incorrect, delta.total, totals.correct, totals.mcq, totals.incorrect, totals.total],
            )?;
            Ok(())
        })?;
        Ok(delta)
    }

    /// `get`: sum of daily deltas across `[period_from, period_to]`.
    pub fn sum_daily_deltas(&self, period_from: &str, period_to: &str) -> Result<DailyDelta> {
        self.db.with_connection(|conn| {
            conn.query_row(
                "SELECT COALESCE(SUM(daycorrect), 0), COALESCE(SUM(daymcq), 0), \
                 COALESCE(SUM(dayincorrect), 0), COALESCE(SUM(daytotal), 0) \
                 FROM autonomous WHERE date BETWEEN ?1 AND ?2",
                params![period_from, period_to],
                |row| Ok(DailyDelta { correct: row.get(0)?, mcq: row.get(1)?, incorrect: row.get(2)?, total: row.get(3)? }),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_today_with_no_prior_row_uses_totals_as_the_delta() {
        let store = KwykStore::open_in_memory().unwrap();
        let delta = store.record_today(CumulativeTotals { correct: 10, mcq: 2, incorrect: 1, total: 13 }).unwrap();
        assert_eq!(delta.total, 13);
    }

    #[test]
    fn record_today_is_idempotent_within_the_same_day() {
        let store = KwykStore::open_in_memory().unwrap();
        store.record_today(CumulativeTotals { correct: 10, mcq: 2, incorrect: 1, total: 13 }).unwrap();
        let delta = store.record_today(CumulativeTotals { correct: 15, mcq: 3, incorrect: 2, total: 20 }).unwrap();
        assert_eq!(delta.total, 20);
    }

    #[test]
    fn sum_daily_deltas_covers_todays_row() {
        let store = KwykStore::open_in_memory().unwrap();
        store.record_today(CumulativeTotals { correct: 10, mcq: 2, incorrect: 1, total: 13 }).unwrap();
        let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
        let sum = store.sum_daily_deltas("2020-01-01", &today).unwrap();
        assert_eq!(sum.total, 13);
    }

    #[test]
    fn sum_daily_deltas_is_zero_for_empty_range() {
        let store = KwykStore::open_in_memory().unwrap();
        let sum = store.sum_daily_deltas("2020-01-01", "2020-01-02").unwrap();
        assert_eq!(sum.total, 0);
    }
}
