//! The podcast-subscription provider: gpodder.net subscription and
//! episode-status sync materialized into a local cache, plus unheard-
//! episode listing (spec §4.3.3).

pub mod store;
pub mod upstream;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use store::GpodderStore;
use tom_core::model::Tool;
use tom_provider::{ToolOutcome, ToolProvider};
use upstream::{EpisodeActionKind, GpodderUpstream};

const SERVER_DESCRIPTION: &str = "This module is used for managing podcast subscriptions using gpodder.net service. It provides access to podcast subscriptions, unheard episodes, and synchronization with gpodder.net. Note: This service only handles podcasts (audio content), not music streaming or music files.";

const OLD_EPISODE_CUTOFF_DAYS: i64 = 150;

pub struct GpodderProvider {
    store: GpodderStore,
    upstream: Box<dyn GpodderUpstream>,
}

impl GpodderProvider {
    pub fn new(store: GpodderStore, upstream: Box<dyn GpodderUpstream>) -> Self {
        GpodderProvider { store, upstream }
    }

    /// `_sync_subscriptions`: reconcile the local subscription table
    /// against gpodder.net's current set, adding new ones (titled from
    /// the feed itself) and dropping ones no longer subscribed to.
    pub async fn sync_subscriptions(&self) -> tom_core::error::Result<()> {
        let remote: std::collections::HashSet<String> =
            self.upstream.subscriptions().await.map_err(tom_core::error::TomError::ToolUpstreamError)?.into_iter().collect();
        let local: std::collections::HashSet<String> = self.store.subscription_urls()?.into_iter().collect();

        for url in remote.difference(&local) {
            let title = match self.upstream.fetch_feed(url).await {
                Ok(feed) if !feed.title.is_empty() => feed.title,
                _ => url.rsplit('/').next().unwrap_or(url).to_string(),
            };
            self.store.insert_subscription(&title, url)?;
        }
        for url in local.difference(&remote) {
            self.store.delete_subscription_by_url(url)?;
        }
        Ok(())
    }

    /// `_sync_episodes`: pull each subscription's RSS feed and save any
    /// episode the cache doesn't already have, skipping ones published
    /// more than 150 days ago.
    pub async fn sync_episodes(&self) -> tom_core::error::Result<()> {
        let now = Utc::now();
        for sub in self.store.subscriptions()? {
            let feed = match self.upstream.fetch_feed(&sub.url).await {
                Ok(feed) => feed,
                Err(e) => {
                    log::warn!("failed to fetch feed for '{}': {e}", sub.title);
                    continue;
                }
            };
            for item in feed.items {
                if self.store.episode_exists(sub.id, &item.url)? {
                    continue;
                }
                if let Some(pub_date) = item.publication_date.as_deref() {
                    if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(pub_date) {
                        if (now - parsed.with_timezone(&Utc)).num_days() > OLD_EPISODE_CUTOFF_DAYS {
                            continue;
                        }
                    }
                }
                self.store.insert_episode(sub.id, &item.title, item.publication_date.as_deref(), &item.url, &item.description)?;
            }
        }
        Ok(())
    }

    /// `_sync_episode_status`: apply play/download actions from the last
    /// 24 hours of gpodder.net history to the local episode rows.
    pub async fn sync_episode_status(&self) -> tom_core::error::Result<()> {
        let since = Utc::now().timestamp() - 24 * 60 * 60;
        let actions = self.upstream.episode_actions_since(since).await.map_err(tom_core::error::TomError::ToolUpstreamError)?;
        for action in actions {
            let status = match action.action {
                EpisodeActionKind::Play => "played",
                EpisodeActionKind::Download => "downloaded",
            };
            self.store.mark_episode_status_by_url(&action.episode_url, status)?;
        }
        Ok(())
    }

    /// `_cleanup_old_episodes`: drop played episodes older than 6 months.
    pub fn cleanup_old_episodes(&self) -> tom_core::error::Result<usize> {
        self.store.delete_old_played_episodes()
    }
}

#[async_trait]
impl ToolProvider for GpodderProvider {
    fn name(&self) -> &str {
        "gpodder"
    }

    fn description(&self) -> String {
        SERVER_DESCRIPTION.to_string()
    }

    fn tools(&self) -> Vec<Tool> {
        vec![
            Tool {
                name: "list_podcast_subscriptions".into(),
                description: "List all podcast subscriptions with their information including unheard episode count.".into(),
                parameters_schema: json!({"type": "object", "properties": {}, "required": [], "additionalProperties": false}),
                strict: true,
            },
            Tool {
                name: "list_unheard_episodes".into(),
                description: "List all unheard/unplayed podcast episodes, organized by podcast subscription.".into(),
                parameters_schema: json!({
                    "type": "object",
                    "properties": {"limit": {"type": "integer", "description": "Maximum number of episodes to return (default: 50, max: 200)"}},
                    "required": [],
                    "additionalProperties": false,
                }),
                strict: true,
            },
        ]
    }

    async fn notification_status(&self) -> Option<String> {
        match self.store.unheard_count() {
            Ok(n) if n > 0 => Some(format!("{n} unheard episodes")),
            _ => None,
        }
    }

    async fn invoke(&self, tool_name: &str, arguments: Value) -> ToolOutcome {
        match tool_name {
            "list_podcast_subscriptions" => match self.store.subscription_summaries() {
                Ok(summaries) => {
                    let subscriptions: Vec<Value> = summaries
                        .into_iter()
                        .map(|s| json!({"id": s.id, "title": s.title, "url": s.url, "total_episodes": s.total_episodes, "unheard_episodes": s.unheard_episodes}))
                        .collect();
                    ToolOutcome::ok(json!({"status": "success", "total_subscriptions": subscriptions.len(), "subscriptions": subscriptions}))
                }
                Err(e) => ToolOutcome::error(format!("Failed to list subscriptions: {e}")),
            },
            "list_unheard_episodes" => {
                let limit = arguments.get("limit").and_then(|v| v.as_i64()).unwrap_or(50).clamp(1, 200);
                match self.store.unheard_episodes(limit) {
                    Ok(episodes) => {
                        let mut by_podcast: std::collections::BTreeMap<String, (String, Vec<Value>)> = std::collections::BTreeMap::new();
                        for ep in episodes {
                            let description = ep.description.map(|d| {
                                if d.chars().count() > 300 {
                                    format!("{}...", d.chars().take(300).collect::<String>())
                                } else {
                                    d
                                }
                            });
                            let entry = by_podcast.entry(ep.podcast_title.clone()).or_insert_with(|| (ep.podcast_url.clone(), Vec::new()));
                            entry.1.push(json!({
                                "id": ep.id,
                                "title": ep.title,
                                "publication_date": ep.publication_date,
                                "url": ep.url,
                                "description": description,
                                "status": ep.status,
                            }));
                        }
                        let total: usize = by_podcast.values().map(|(_, eps)| eps.len()).sum();
                        let podcasts: Vec<Value> = by_podcast
                            .into_iter()
                            .map(|(title, (url, episodes))| json!({"podcast_title": title, "podcast_url": url, "episodes": episodes}))
                            .collect();
                        ToolOutcome::ok(json!({"status": "success", "podcasts": podcasts, "total_unheard_episodes": total, "limit_applied": limit}))
                    }
                    Err(e) => ToolOutcome::error(format!("Failed to list unheard episodes: {e}")),
                }
            }
            other => ToolOutcome::error(format!("unknown tool '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use upstream::{EpisodeAction, Feed, FeedItem, InMemoryGpodderUpstream};

    fn provider_with_upstream() -> (GpodderProvider, std::sync::Arc<InMemoryGpodderUpstream>) {
        let upstream = std::sync::Arc::new(InMemoryGpodderUpstream::default());
        (GpodderProvider::new(GpodderStore::open_in_memory().unwrap(), Box::new(ForwardingUpstream(upstream.clone()))), upstream)
    }

    struct ForwardingUpstream(std::sync::Arc<InMemoryGpodderUpstream>);

    #[async_trait]
    impl GpodderUpstream for ForwardingUpstream {
        async fn subscriptions(&self) -> Result<Vec<String>, String> {
            self.0.subscriptions().await
        }
        async fn fetch_feed(&self, url: &str) -> Result<Feed, String> {
            self.0.fetch_feed(url).await
        }
        async fn episode_actions_since(&self, since_unix: i64) -> Result<Vec<EpisodeAction>, String> {
            self.0.episode_actions_since(since_unix).await
        }
    }

    #[tokio::test]
    async fn list_podcast_subscriptions_reports_empty_when_none() {
        let (provider, _upstream) = provider_with_upstream();
        let outcome = provider.invoke("list_podcast_subscriptions", json!({})).await.into_json();
        assert_eq!(outcome["result"]["total_subscriptions"], 0);
    }

    #[tokio::test]
    async fn sync_subscriptions_adds_new_feed_with_its_title() {
        let (provider, upstream) = provider_with_upstream();
        upstream
            .seed_subscription(
                "https://example.com/feed",
                Feed {
                    title: "Example Cast".into(),
                    items: vec![FeedItem { title: "E1".into(), url: "https://example.com/e1".into(), description: "".into(), publication_date: None }],
                },
            )
            .await;
        provider.sync_subscriptions().await.unwrap();
        provider.sync_episodes().await.unwrap();

        let outcome = provider.invoke("list_podcast_subscriptions", json!({})).await.into_json();
        assert_eq!(outcome["result"]["subscriptions"][0]["title"], "Example Cast");
        assert_eq!(outcome["result"]["subscriptions"][0]["unheard_episodes"], 1);
    }

    #[tokio::test]
    async fn sync_subscriptions_removes_unsubscribed_feed() {
        let (provider, upstream) = provider_with_upstream();
        upstream.seed_subscription("https://example.com/feed", Feed { title: "Example Cast".into(), items: vec![] }).await;
        provider.sync_subscriptions().await.unwrap();
        upstream.remove_subscription("https://example.com/feed").await;
        provider.sync_subscriptions().await.unwrap();

        let outcome = provider.invoke("list_podcast_subscriptions", json!({})).await.into_json();
        assert_eq!(outcome["result"]["total_subscriptions"], 0);
    }

    #[tokio::test]
    async fn list_unheard_episodes_clamps_limit_and_groups_by_podcast() {
        let (provider, upstream) = provider_with_upstream();
        upstream
            .seed_subscription(
                "https://example.com/feed",
                Feed {
                    title: "Example Cast".into(),
                    items: vec![FeedItem { title: "E1".into(), url: "https://example.com/e1".into(), description: "desc".into(), publication_date: None }],
                },
            )
            .await;
        provider.sync_subscriptions().await.unwrap();
        provider.sync_episodes().await.unwrap();

        let outcome = provider.invoke("list_unheard_episodes", json!({"limit": 0})).await.into_json();
        assert_eq!(outcome["result"]["limit_applied"], 1);
        assert_eq!(outcome["result"]["podcasts"][0]["podcast_title"], "Example Cast");
    }

    #[tokio::test]
    async fn sync_episode_status_marks_played_and_drops_from_unheard() {
        let (provider, upstream) = provider_with_upstream();
        upstream
            .seed_subscription(
                "https://example.com/feed",
                Feed {
                    title: "Example Cast".into(),
                    items: vec![FeedItem { title: "E1".into(), url: "https://example.com/e1".into(), description: "".into(), publication_date: None }],
                },
            )
            .await;
        provider.sync_subscriptions().await.unwrap();
        provider.sync_episodes().await.unwrap();
        upstream.seed_action(EpisodeAction { episode_url: "https://example.com/e1".into(), action: EpisodeActionKind::Play }).await;
        provider.sync_episode_status().await.unwrap();

        assert_eq!(provider.notification_status().await, None);
    }
}
