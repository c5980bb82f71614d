//! The Cafetaria provider: a school cafeteria account's credit balance and
//! meal reservations (spec §4.3.3). Unlike every other cached provider in
//! this workspace, the cache is refreshed on tool call with two distinct
//! freshness bounds — credit reads tolerate up to 12h of staleness,
//! reservation reads up to 48h — rather than a single background interval,
//! matching the split thresholds spec.md §4.3.3 names explicitly.

pub mod store;
pub mod upstream;

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use store::CafetariaStore;
use tokio::sync::Mutex;
use tom_core::error::TomError;
use tom_core::model::Tool;
use tom_provider::{ToolOutcome, ToolProvider};
use upstream::{CafetariaUpstream, ReservationAction};

const SERVER_DESCRIPTION: &str =
    "This module is used to manage the use of the school cafeteria, such as reserving or canceling a cafeteria meal or checking the remaining credit.";

pub struct CafetariaProvider {
    store: CafetariaStore,
    upstream: Box<dyn CafetariaUpstream>,
    last_refresh: Mutex<Option<Instant>>,
}

impl CafetariaProvider {
    /// Credit reads tolerate up to 12h of staleness before a synchronous
    /// refresh precedes the read (spec §4.3.3).
    pub const CREDIT_FRESHNESS: Duration = Duration::from_secs(12 * 3600);
    /// Reservation reads tolerate up to 48h (spec §4.3.3).
    pub const RESERVATION_FRESHNESS: Duration = Duration::from_secs(48 * 3600);

    pub fn new(store: CafetariaStore, upstream: Box<dyn CafetariaUpstream>) -> Self {
        Self { store, upstream, last_refresh: Mutex::new(None) }
    }

    /// Unconditional refresh: login, scrape credit and reservations, persist
    /// both. Mirrors `CafetariaService.update()`.
    pub async fn refresh(&self) -> tom_core::error::Result<()> {
        let snapshot = self.upstream.fetch_snapshot().await.map_err(TomError::ToolUpstreamError)?;
        if let Some(solde) = &snapshot.solde {
            self.store.replace_solde(solde)?;
        }
        for row in &snapshot.reservations {
            self.store.upsert_reservation(&row.date, &row.id, row.is_reserved)?;
        }
        *self.last_refresh.lock().await = Some(Instant::now());
        Ok(())
    }

    /// Refresh only if the last successful refresh is older than
    /// `threshold`, or if there has never been one (spec §4.3.4:
    /// read-through + periodic refresh).
    async fn refresh_if_stale(&self, threshold: Duration) {
        let stale = match *self.last_refresh.lock().await {
            Some(t) => t.elapsed() > threshold,
            None => true,
        };
        if stale {
            if let Err(e) = self.refresh().await {
                log::warn!("cafetaria refresh failed: {e}");
            }
        }
    }

    async fn get_credit(&self) -> Value {
        self.refresh_if_stale(Self::CREDIT_FRESHNESS).await;
        match self.store.get_solde() {
            Ok(Some(solde)) => Value::String(solde),
            Ok(None) => Value::String("Could not retrieve cafetaria credit".to_string()),
            Err(e) => json!({ "error": format!("failed to read cafetaria credit: {e}") }),
        }
    }

    async fn list_reservations(&self) -> Value {
        self.refresh_if_stale(Self::RESERVATION_FRESHNESS).await;
        let today = chrono::Local::now().format("%Y-%m-%d").to_string();
        match self.store.list_from(&today) {
            Ok(rows) => json!(rows
                .iter()
                .map(|r| json!({ "date": r.date, "id": r.id, "is_reserved": r.is_reserved }))
                .collect::<Vec<_>>()),
            Err(e) => json!({ "error": format!("failed to list cafetaria reservations: {e}") }),
        }
    }

    /// `add_reservation`: always refreshes first (matching the original's
    /// unconditional `self.update()` at the top of the method, independent
    /// of the 12h/48h read-path thresholds above), then looks up the date.
    async fn add_reservation(&self, date: &str) -> Value {
        if let Err(e) = self.refresh().await {
            log::warn!("cafetaria refresh before reservation failed: {e}");
        }
        match self.store.find_date(date) {
            Ok(Some((_, true))) => json!({ "status": "success", "message": "Reservation was already done" }),
            Ok(Some((id, false))) => match self.upstream.change_reservation(ReservationAction::Add, &id).await {
                Ok(true) => {
                    if let Err(e) = self.refresh().await {
                        log::warn!("cafetaria refresh after reservation failed: {e}");
                    }
                    json!({ "status": "success", "message": "Reservation done" })
                }
                Ok(false) | Err(_) => json!({ "status": "failure", "message": "Could not make the reservation" }),
            },
            Ok(None) => json!({ "status": "failure", "message": "Date not available for reservation" }),
            Err(e) => json!({ "status": "failure", "message": format!("failed to look up date: {e}") }),
        }
    }

    async fn cancel_reservation(&self, date: &str) -> Value {
        if let Err(e) = self.refresh().await {
            log::warn!("cafetaria refresh before cancellation failed: {e}");
        }
        match self.store.find_date(date) {
            Ok(Some((id, true))) => match self.upstream.change_reservation(ReservationAction::Cancel, &id).await {
                Ok(true) => {
                    if let Err(e) = self.refresh().await {
                        log::warn!("cafetaria refresh after cancellation failed: {e}");
                    }
                    json!({ "status": "success", "message": "Reservation canceled" })
                }
                Ok(false) | Err(_) => json!({ "status": "failure", "message": "Could not cancel the reservation" }),
            },
            Ok(Some((_, false))) => json!({ "status": "success", "message": "Reservation was already canceled" }),
            Ok(None) => json!({ "status": "failure", "message": "Date not found" }),
            Err(e) => json!({ "status": "failure", "message": format!("failed to look up date: {e}") }),
        }
    }
}

/// Extracts the first `\d+,\d+`-shaped amount from a credit string like
/// `"12,34 €"`, matching `CafetariaService.get_notification_status`'s own
/// `re.search(r"(\d+,\d+)", solde)`.
fn parse_credit_amount(solde: &str) -> Option<f64> {
    let chars: Vec<char> = solde.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i].is_ascii_digit() {
            let int_start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            if i < chars.len() && chars[i] == ',' {
                let frac_start = i + 1;
                let mut j = frac_start;
                while j < chars.len() && chars[j].is_ascii_digit() {
                    j += 1;
                }
                if j > frac_start {
                    let whole: String = chars[int_start..i].iter().collect();
                    let frac: String = chars[frac_start..j].iter().collect();
                    return format!("{whole}.{frac}").parse().ok();
                }
            }
        } else {
            i += 1;
        }
    }
    None
}

#[async_trait]
impl ToolProvider for CafetariaProvider {
    fn name(&self) -> &str {
        "cafetaria"
    }

    fn description(&self) -> String {
        SERVER_DESCRIPTION.to_string()
    }

    fn tools(&self) -> Vec<Tool> {
        vec![
            Tool {
                name: "get_cafetaria_credit".into(),
                description: "Get the high school cafetaria credit. For example when a user asks 'How much cafeteria credit do I have?'".into(),
                parameters_schema: json!({
                    "type": "object",
                    "properties": {},
                    "required": [],
                    "additionalProperties": false,
                }),
                strict: true,
            },
            Tool {
                name: "list_cafetaria_reservations".into(),
                description: "List the high school cafetaria reservations. For example when a user asks 'Is the cafetaria reserved for this day?'. This function provides high school cafetaria reservations information.".into(),
                parameters_schema: json!({
                    "type": "object",
                    "properties": {},
                    "required": [],
                    "additionalProperties": false,
                }),
                strict: true,
            },
            Tool {
                name: "make_a_cafetaria_reservation".into(),
                description: "Make a reservation for high school cafetaria. For example when a user asks 'Book the high school cafetaria for tomorrow'. This function does not provide any reservation information. Must only be used when the user explicitly asks for making a new reservation.".into(),
                parameters_schema: json!({
                    "type": "object",
                    "properties": {
                        "date": {"type": "string", "description": "Day you want to make a cafetaria reservation. Must be in the form of 'YYYY-MM-DD'. Date is always in the future."},
                    },
                    "required": ["date"],
                    "additionalProperties": false,
                }),
                strict: true,
            },
            Tool {
                name: "cancel_a_cafetaria_reservation".into(),
                description: "Cancel a reservation for high school cafetaria. For example when a user asks 'Cancel the high school cafetaria reservation for tomorrow'. This function does not provide any reservation information.".into(),
                parameters_schema: json!({
                    "type": "object",
                    "properties": {
                        "date": {"type": "string", "description": "Day you want to cancel the cafetaria reservation. Must be in the form of 'YYYY-MM-DD'. Date is always in the future."},
                    },
                    "required": ["date"],
                    "additionalProperties": false,
                }),
                strict: true,
            },
        ]
    }

    /// Low-credit warning, matching `get_notification_status`: non-empty
    /// only when the parsed balance drops below 10 euros.
    async fn notification_status(&self) -> Option<String> {
        let solde = self.store.get_solde().ok().flatten()?;
        let amount = parse_credit_amount(&solde)?;
        if amount < 10.0 {
            Some(format!("Only {amount} euros left on cafetaria credit"))
        } else {
            None
        }
    }

    async fn invoke(&self, tool_name: &str, arguments: Value) -> ToolOutcome {
        match tool_name {
            "get_cafetaria_credit" => ToolOutcome::ok(self.get_credit().await),
            "list_cafetaria_reservations" => ToolOutcome::ok(self.list_reservations().await),
            "make_a_cafetaria_reservation" => {
                let Some(date) = arguments.get("date").and_then(|v| v.as_str()) else {
                    return ToolOutcome::error("date is required");
                };
                ToolOutcome::ok(self.add_reservation(date).await)
            }
            "cancel_a_cafetaria_reservation" => {
                let Some(date) = arguments.get("date").and_then(|v| v.as_str()) else {
                    return ToolOutcome::error("date is required");
                };
                ToolOutcome::ok(self.cancel_reservation(date).await)
            }
            other => ToolOutcome::error(format!("unknown tool '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use upstream::{CafetariaSnapshot, InMemoryCafetariaUpstream, ReservationRow};

    fn seeded_provider(snapshot: CafetariaSnapshot) -> CafetariaProvider {
        CafetariaProvider::new(CafetariaStore::open_in_memory().unwrap(), Box::new(InMemoryCafetariaUpstream::new(snapshot)))
    }

    #[test]
    fn parse_credit_amount_reads_comma_decimal() {
        assert_eq!(parse_credit_amount("Solde: 9,80 €"), Some(9.80));
        assert_eq!(parse_credit_amount("Solde: 42,00 €"), Some(42.0));
        assert_eq!(parse_credit_amount("no amount here"), None);
    }

    #[tokio::test]
    async fn get_credit_refreshes_on_first_call_and_returns_solde() {
        let provider = seeded_provider(CafetariaSnapshot { solde: Some("15,50 €".into()), reservations: vec![] });
        let outcome = provider.invoke("get_cafetaria_credit", json!({})).await.into_json();
        assert_eq!(outcome["result"], "15,50 €");
    }

    #[tokio::test]
    async fn notification_status_warns_below_ten_euros() {
        let provider = seeded_provider(CafetariaSnapshot { solde: Some("8,00 €".into()), reservations: vec![] });
        provider.refresh().await.unwrap();
        let status = provider.notification_status().await;
        assert!(status.unwrap().contains("8"));
    }

    #[tokio::test]
    async fn notification_status_silent_above_ten_euros() {
        let provider = seeded_provider(CafetariaSnapshot { solde: Some("42,00 €".into()), reservations: vec![] });
        provider.refresh().await.unwrap();
        assert!(provider.notification_status().await.is_none());
    }

    #[tokio::test]
    async fn make_reservation_on_free_day_succeeds() {
        // `list_cafetaria_reservations` filters on the live clock (`date >=
        // today`), so the seeded row must be today's date, not a fixed one.
        let today = chrono::Local::now().format("%Y-%m-%d").to_string();
        let provider = seeded_provider(CafetariaSnapshot {
            solde: Some("20,00 €".into()),
            reservations: vec![ReservationRow { date: today.clone(), id: "abc".into(), is_reserved: false }],
        });
        let outcome = provider.invoke("make_a_cafetaria_reservation", json!({"date": today})).await.into_json();
        assert_eq!(outcome["result"]["status"], "success");
        assert_eq!(outcome["result"]["message"], "Reservation done");

        let list = provider.invoke("list_cafetaria_reservations", json!({})).await.into_json();
        assert_eq!(list["result"][0]["is_reserved"], true);
    }

    #[tokio::test]
    async fn make_reservation_already_done_is_a_no_op_success() {
        let provider = seeded_provider(CafetariaSnapshot {
            solde: None,
            reservations: vec![ReservationRow { date: "2025-01-21".into(), id: "abc".into(), is_reserved: true }],
        });
        let outcome = provider.invoke("make_a_cafetaria_reservation", json!({"date": "2025-01-21"})).await.into_json();
        assert_eq!(outcome["result"]["message"], "Reservation was already done");
    }

    #[tokio::test]
    async fn make_reservation_unknown_date_fails() {
        let provider = seeded_provider(CafetariaSnapshot::default());
        let outcome = provider.invoke("make_a_cafetaria_reservation", json!({"date": "2099-01-01"})).await.into_json();
        assert_eq!(outcome["result"]["status"], "failure");
        assert_eq!(outcome["result"]["message"], "Date not available for reservation");
    }

    #[tokio::test]
    async fn cancel_reservation_on_reserved_day_succeeds() {
        let provider = seeded_provider(CafetariaSnapshot {
            solde: None,
            reservations: vec![ReservationRow { date: "2025-01-21".into(), id: "abc".into(), is_reserved: true }],
        });
        let outcome = provider.invoke("cancel_a_cafetaria_reservation", json!({"date": "2025-01-21"})).await.into_json();
        assert_eq!(outcome["result"]["message"], "Reservation canceled");
    }

    #[tokio::test]
    async fn cancel_reservation_already_canceled_is_a_no_op_success() {
        let provider = seeded_provider(CafetariaSnapshot {
            solde: None,
            reservations: vec![ReservationRow { date: "2025-01-21".into(), id: "abc".into(), is_reserved: false }],
        });
        let outcome = provider.invoke("cancel_a_cafetaria_reservation", json!({"date": "2025-01-21"})).await.into_json();
        assert_eq!(outcome["result"]["message"], "Reservation was already canceled");
    }

    #[tokio::test]
    async fn cancel_reservation_unknown_date_fails() {
        let provider = seeded_provider(CafetariaSnapshot::default());
        let outcome = provider.invoke("cancel_a_cafetaria_reservation", json!({"date": "2099-01-01"})).await.into_json();
        assert_eq!(outcome["result"]["message"], "Date not found");
    }

    #[tokio::test]
    async fn make_reservation_requires_date_argument() {
        let provider = seeded_provider(CafetariaSnapshot::default());
        let outcome = provider.invoke("make_a_cafetaria_reservation", json!({})).await.into_json();
        assert_eq!(outcome["status"], "error");
    }
}
