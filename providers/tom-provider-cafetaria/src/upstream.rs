//! The `webparent.paiementdp.com` login-and-scrape (spec §1: the school
//! payment portal is an out-of-scope external collaborator). `CafetariaUpstream`
//! is the seam a real scraper plugs into; `InMemoryCafetariaUpstream` is a
//! deterministic stand-in good enough to exercise the refresh/reservation
//! contract.

use async_trait::async_trait;
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub struct ReservationRow {
    pub date: String,
    pub id: String,
    pub is_reserved: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CafetariaSnapshot {
    pub solde: Option<String>,
    pub reservations: Vec<ReservationRow>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationAction {
    Add,
    Cancel,
}

#[async_trait]
pub trait CafetariaUpstream: Send + Sync {
    /// Log in, scrape the credit balance and the reservation calendar.
    /// Mirrors `CafetariaService.update()`'s single combined round-trip.
    async fn fetch_snapshot(&self) -> Result<CafetariaSnapshot, String>;

    /// `aliReservationCancel.php` / `aliReservationDetail.php` form post,
    /// returning whether the site accepted the change.
    async fn change_reservation(&self, action: ReservationAction, id: &str) -> Result<bool, String>;
}

pub struct InMemoryCafetariaUpstream {
    state: Mutex<CafetariaSnapshot>,
}

impl InMemoryCafetariaUpstream {
    pub fn new(snapshot: CafetariaSnapshot) -> Self {
        Self { state: Mutex::new(snapshot) }
    }

    pub async fn set_snapshot(&self, snapshot: CafetariaSnapshot) {
        *self.state.lock().await = snapshot;
    }
}

impl Default for InMemoryCafetariaUpstream {
    fn default() -> Self {
        Self::new(CafetariaSnapshot::default())
    }
}

#[async_trait]
impl CafetariaUpstream for InMemoryCafetariaUpstream {
    async fn fetch_snapshot(&self) -> Result<CafetariaSnapshot, String> {
        Ok(self.state.lock().await.clone())
    }

    async fn change_reservation(&self, action: ReservationAction, id: &str) -> Result<bool, String> {
        let mut state = self.state.lock().await;
        match state.reservations.iter_mut().find(|r| r.id == id) {
            Some(row) => {
                row.is_reserved = action == ReservationAction::Add;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn change_reservation_flips_the_matching_row() {
        let upstream = InMemoryCafetariaUpstream::new(CafetariaSnapshot {
            solde: Some("42,00 €".into()),
            reservations: vec![ReservationRow { date: "2025-01-21".into(), id: "abc".into(), is_reserved: false }],
        });
        let ok = upstream.change_reservation(ReservationAction::Add, "abc").await.unwrap();
        assert!(ok);
        let snapshot = upstream.fetch_snapshot().await.unwrap();
        assert!(snapshot.reservations[0].is_reserved);
    }

    #[tokio::test]
    async fn change_reservation_unknown_id_reports_failure() {
        let upstream = InMemoryCafetariaUpstream::default();
        let ok = upstream.change_reservation(ReservationAction::Cancel, "missing").await.unwrap();
        assert!(!ok);
    }
}
