//! Notification status aggregation: poll every loaded provider's
//! `description://tom_notification` endpoint every 10s and bump an
//! aggregate `status_id` whenever anything changed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tom_core::model::{ModuleTaskStatus, ProviderStatus, TasksSnapshot};

struct ProviderHealth {
    status: Option<String>,
    up: bool,
    last_refresh: Option<chrono::DateTime<chrono::Utc>>,
}

pub struct NotificationAggregator {
    status_id: AtomicI64,
    last_status: RwLock<HashMap<String, ProviderHealth>>,
    providers: Vec<(String, String)>,
    client: reqwest::Client,
}

impl NotificationAggregator {
    pub fn new(providers: Vec<(String, String)>) -> Arc<Self> {
        Arc::new(Self {
            status_id: AtomicI64::new(0),
            last_status: RwLock::new(HashMap::new()),
            providers,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .expect("failed to build aggregator http client"),
        })
    }

    pub fn spawn_polling_loop(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(10));
            loop {
                ticker.tick().await;
                self.poll_once().await;
            }
        });
    }

    async fn poll_once(&self) {
        for (module, base_url) in &self.providers {
            let url = format!("{base_url}/description/tom_notification");
            let now = chrono::Utc::now();
            let (status, up) = match self.client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => (
                    resp.json::<serde_json::Value>()
                        .await
                        .ok()
                        .and_then(|v| v.get("status").and_then(|s| s.as_str()).map(str::to_string)),
                    true,
                ),
                Ok(resp) => {
                    log::debug!("notification poll for '{module}' returned {}", resp.status());
                    (None, false)
                }
                Err(e) => {
                    log::debug!("notification poll for '{module}' failed: {e}");
                    (None, false)
                }
            };

            let mut last = self.last_status.write().await;
            let changed = last.get(module).map(|prev| prev.status != status).unwrap_or(true);
            if changed {
                self.status_id.store(chrono::Utc::now().timestamp(), Ordering::SeqCst);
            }
            last.insert(
                module.clone(),
                ProviderHealth {
                    status,
                    up,
                    last_refresh: if up { Some(now) } else { last.get(module).and_then(|p| p.last_refresh) },
                },
            );
        }
    }

    pub async fn snapshot(&self) -> TasksSnapshot {
        let last = self.last_status.read().await;
        TasksSnapshot {
            status_id: self.status_id.load(Ordering::SeqCst),
            tasks: last
                .iter()
                .map(|(module, health)| ModuleTaskStatus {
                    module: module.clone(),
                    status: health.status.clone(),
                })
                .collect(),
        }
    }

    /// `/status`: per-provider liveness, used by the gateway's health view.
    pub async fn provider_statuses(&self) -> Vec<ProviderStatus> {
        let last = self.last_status.read().await;
        self.providers
            .iter()
            .map(|(name, _)| {
                let health = last.get(name);
                ProviderStatus {
                    name: name.clone(),
                    up: health.map(|h| h.up).unwrap_or(false),
                    last_refresh: health.and_then(|h| h.last_refresh),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn snapshot_starts_at_zero_with_no_tasks() {
        let agg = NotificationAggregator::new(vec![]);
        let snap = agg.snapshot().await;
        assert_eq!(snap.status_id, 0);
        assert!(snap.tasks.is_empty());
    }
}
