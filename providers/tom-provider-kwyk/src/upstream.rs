//! The kwyk.fr session login and autonomous-work report scrape (spec §1:
//! third-party platform scraping is out of scope for this core).
//! `InMemoryKwykUpstream` is a deterministic stand-in good enough to
//! exercise the daily-delta derivation and tool contract.

use crate::store::CumulativeTotals;
use async_trait::async_trait;
use tokio::sync::Mutex;

#[async_trait]
pub trait KwykUpstream: Send + Sync {
    /// Log in and scrape `/bilan/<id>/onglets/autonomie/student/`'s
    /// cumulative `instances_done_autonomous` counters.
    async fn fetch_autonomous_totals(&self) -> Result<CumulativeTotals, String>;
}

pub struct InMemoryKwykUpstream {
    totals: Mutex<CumulativeTotals>,
}

impl Default for InMemoryKwykUpstream {
    fn default() -> Self {
        Self { totals: Mutex::new(CumulativeTotals { correct: 0, mcq: 0, incorrect: 0, total: 0 }) }
    }
}

impl InMemoryKwykUpstream {
    pub async fn set_totals(&self, totals: CumulativeTotals) {
        *self.totals.lock().await = totals;
    }
}

#[async_trait]
impl KwykUpstream for InMemoryKwykUpstream {
    async fn fetch_autonomous_totals(&self) -> Result<CumulativeTotals, String> {
        Ok(*self.totals.lock().await)
    }
}
