//! The gpodder.net account plus each subscription's RSS feed (spec §1:
//! third-party sync services and RSS feeds are out of scope for this
//! core). `InMemoryGpodderUpstream` is a deterministic stand-in good
//! enough to exercise the sync pipeline and tool contract.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub struct FeedItem {
    pub title: String,
    pub url: String,
    pub description: String,
    /// RFC 2822 `pubDate`, already normalized to ISO 8601 by the caller's
    /// parse step, matching `_sync_episodes`'s `parsedate_to_datetime`.
    pub publication_date: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Feed {
    pub title: String,
    pub items: Vec<FeedItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeActionKind {
    Play,
    Download,
}

#[derive(Debug, Clone)]
pub struct EpisodeAction {
    pub episode_url: String,
    pub action: EpisodeActionKind,
}

#[async_trait]
pub trait GpodderUpstream: Send + Sync {
    /// Subscription URLs currently registered for the device on
    /// gpodder.net (`client.get_subscriptions`).
    async fn subscriptions(&self) -> Result<Vec<String>, String>;

    /// Fetch and parse one subscription's RSS feed.
    async fn fetch_feed(&self, url: &str) -> Result<Feed, String>;

    /// Episode actions recorded since `since_unix`.
    async fn episode_actions_since(&self, since_unix: i64) -> Result<Vec<EpisodeAction>, String>;
}

pub struct InMemoryGpodderUpstream {
    subs: Mutex<Vec<String>>,
    feeds: Mutex<HashMap<String, Feed>>,
    actions: Mutex<Vec<EpisodeAction>>,
}

impl Default for InMemoryGpodderUpstream {
    fn default() -> Self {
        Self { subs: Mutex::new(Vec::new()), feeds: Mutex::new(HashMap::new()), actions: Mutex::new(Vec::new()) }
    }
}

impl InMemoryGpodderUpstream {
    pub async fn seed_subscription(&self, url: &str, feed: Feed) {
        self.subs.lock().await.push(url.to_string());
        self.feeds.lock().await.insert(url.to_string(), feed);
    }

    pub async fn seed_action(&self, action: EpisodeAction) {
        self.actions.lock().await.push(action);
    }

    pub async fn remove_subscription(&self, url: &str) {
        self.subs.lock().await.retain(|u| u != url);
    }
}

#[async_trait]
impl GpodderUpstream for InMemoryGpodderUpstream {
    async fn subscriptions(&self) -> Result<Vec<String>, String> {
        Ok(self.subs.lock().await.clone())
    }

    async fn fetch_feed(&self, url: &str) -> Result<Feed, String> {
        self.feeds.lock().await.get(url).cloned().ok_or_else(|| format!("no feed seeded for {url}"))
    }

    async fn episode_actions_since(&self, _since_unix: i64) -> Result<Vec<EpisodeAction>, String> {
        Ok(self.actions.lock().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seed_subscription_then_subscriptions_lists_url() {
        let upstream = InMemoryGpodderUpstream::default();
        upstream.seed_subscription("https://a", Feed { title: "A".into(), items: vec![] }).await;
        assert_eq!(upstream.subscriptions().await.unwrap(), vec!["https://a".to_string()]);
    }

    #[tokio::test]
    async fn remove_subscription_drops_it() {
        let upstream = InMemoryGpodderUpstream::default();
        upstream.seed_subscription("https://a", Feed { title: "A".into(), items: vec![] }).await;
        upstream.remove_subscription("https://a").await;
        assert!(upstream.subscriptions().await.unwrap().is_empty());
    }
}
