//! The Kwyk provider: a background login-and-scrape loop turns the
//! platform's cumulative exercise counters into daily deltas, and
//! `kwyk_get` sums those deltas over a requested period (spec §4.3.3).

pub mod store;
pub mod upstream;

use async_trait::async_trait;
use serde_json::{json, Value};
use store::KwykStore;
use tom_core::model::Tool;
use tom_provider::{ToolOutcome, ToolProvider};
use upstream::KwykUpstream;

const SERVER_DESCRIPTION: &str = "This module is used to get information from Kwyk. Kwyk is an online platform for math and French exercises. Note: Kwyk may sometimes be misspelled as 'Quick' or similar variations in user queries.";

pub struct KwykProvider {
    store: KwykStore,
    upstream: Box<dyn KwykUpstream>,
}

impl KwykProvider {
    pub fn new(store: KwykStore, upstream: Box<dyn KwykUpstream>) -> Self {
        KwykProvider { store, upstream }
    }

    /// `update`: fetch the platform's cumulative totals and record today's
    /// derived delta. `kwyk_get` calls this itself before every query, on
    /// top of whatever the background loop already did, matching the
    /// original's own "update data before querying" step.
    pub async fn update(&self) -> tom_core::error::Result<()> {
        let totals = self.upstream.fetch_autonomous_totals().await.map_err(tom_core::error::TomError::ToolUpstreamError)?;
        self.store.record_today(totals)?;
        Ok(())
    }

    async fn get(&self, period_from: &str, period_to: &str) -> Value {
        if let Err(e) = self.update().await {
            log::warn!("kwyk update before query failed: {e}");
        }
        match self.store.sum_daily_deltas(period_from, period_to) {
            Ok(sum) => json!({
                "period": {"start_date": period_from, "end_date": period_to},
                "math": {
                    "correct_exercises": sum.correct,
                    "mcq_exercises": sum.mcq,
                    "incorrect_exercises": sum.incorrect,
                    "total_exercises": sum.total,
                },
            }),
            Err(e) => json!({"error": format!("Failed to get Kwyk data: {e}")}),
        }
    }
}

#[async_trait]
impl ToolProvider for KwykProvider {
    fn name(&self) -> &str {
        "kwyk"
    }

    fn description(&self) -> String {
        SERVER_DESCRIPTION.to_string()
    }

    fn tools(&self) -> Vec<Tool> {
        vec![Tool {
            name: "kwyk_get".into(),
            description: "Get the Kwyk status. For example when a user asks 'How many kwyk exercises has been done today', 'What is the kwyk status', 'How many math exercise has been done today'".into(),
            parameters_schema: json!({
                "type": "object",
                "properties": {
                    "period_from": {"type": "string", "description": "Must be in the form of 'YYYY-MM-DD'. Starting date to search for. Oldest starting date is '2020-01-01'."},
                    "period_to": {"type": "string", "description": "Must be in the form of 'YYYY-MM-DD'. Ending date to search for. Maximum ending date is today."},
                },
                "required": ["period_from", "period_to"],
                "additionalProperties": false,
            }),
            strict: true,
        }]
    }

    async fn invoke(&self, tool_name: &str, arguments: Value) -> ToolOutcome {
        match tool_name {
            "kwyk_get" => {
                let (Some(period_from), Some(period_to)) =
                    (arguments.get("period_from").and_then(|v| v.as_str()), arguments.get("period_to").and_then(|v| v.as_str()))
                else {
                    return ToolOutcome::error("period_from and period_to are required");
                };
                ToolOutcome::ok(self.get(period_from, period_to).await)
            }
            other => ToolOutcome::error(format!("unknown tool '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::CumulativeTotals;
    use upstream::InMemoryKwykUpstream;

    fn provider_with_upstream() -> (KwykProvider, std::sync::Arc<InMemoryKwykUpstream>) {
        let upstream = std::sync::Arc::new(InMemoryKwykUpstream::default());
        (KwykProvider::new(KwykStore::open_in_memory().unwrap(), Box::new(ForwardingUpstream(upstream.clone()))), upstream)
    }

    struct ForwardingUpstream(std::sync::Arc<InMemoryKwykUpstream>);

    #[async_trait]
    impl KwykUpstream for ForwardingUpstream {
        async fn fetch_autonomous_totals(&self) -> Result<CumulativeTotals, String> {
            self.0.fetch_autonomous_totals().await
        }
    }

    #[tokio::test]
    async fn kwyk_get_reports_todays_totals_on_first_call() {
        let (provider, upstream) = provider_with_upstream();
        upstream.set_totals(CumulativeTotals { correct: 8, mcq: 2, incorrect: 1, total: 11 }).await;
        let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
        let outcome = provider.invoke("kwyk_get", json!({"period_from": "2020-01-01", "period_to": today})).await.into_json();
        assert_eq!(outcome["result"]["math"]["total_exercises"], 11);
    }

    #[tokio::test]
    async fn kwyk_get_out_of_range_period_reports_zero() {
        let (provider, upstream) = provider_with_upstream();
        upstream.set_totals(CumulativeTotals { correct: 8, mcq: 2, incorrect: 1, total: 11 }).await;
        let outcome = provider.invoke("kwyk_get", json!({"period_from": "2019-01-01", "period_to": "2019-01-02"})).await.into_json();
        assert_eq!(outcome["result"]["math"]["total_exercises"], 0);
    }

    #[tokio::test]
    async fn kwyk_get_requires_both_period_bounds() {
        let (provider, _upstream) = provider_with_upstream();
        let outcome = provider.invoke("kwyk_get", json!({"period_from": "2020-01-01"})).await.into_json();
        assert_eq!(outcome["status"], "error");
    }
}
