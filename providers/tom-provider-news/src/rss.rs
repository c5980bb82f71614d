//! The RSS upstream (`news_server.py`'s Nextcloud News/FreshRSS-shaped
//! `/folders` + `/feeds` + `/items` API). The real HTTP client lives
//! outside this core (spec §1's external-collaborators boundary); this
//! trait is the seam it plugs into.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub struct RssItem {
    pub id: String,
    pub feed_source: String,
    pub category: String,
    pub title: String,
    pub url: String,
    pub unread: bool,
}

#[async_trait]
pub trait NewsRssUpstream: Send + Sync {
    /// All unread items, folder/feed metadata already resolved into
    /// `feed_source`/`category` — mirrors `_update_rss_news`'s three
    /// sequential calls collapsed into one.
    async fn fetch_unread(&self) -> Result<Vec<RssItem>, String>;

    /// Mark an item read on the upstream RSS server, best-effort (the
    /// original logs a warning on failure but does not fail the whole
    /// `mark_news_as_read` call).
    async fn mark_read(&self, item_id: &str) -> Result<(), String>;

    /// Fetch the body of a single item by a 1-indexed offset, used to
    /// generate a summary for an RSS article that doesn't have one yet.
    async fn fetch_body(&self, item_id: &str) -> Result<String, String>;
}

pub struct InMemoryRssUpstream {
    items: Mutex<HashMap<String, RssItem>>,
    bodies: Mutex<HashMap<String, String>>,
}

impl Default for InMemoryRssUpstream {
    fn default() -> Self {
        Self {
            items: Mutex::new(HashMap::new()),
            bodies: Mutex::new(HashMap::new()),
        }
    }
}

impl InMemoryRssUpstream {
    #[cfg(test)]
    pub async fn seed(&self, item: RssItem, body: Option<&str>) {
        if let Some(body) = body {
            self.bodies.lock().await.insert(item.id.clone(), body.to_string());
        }
        self.items.lock().await.insert(item.id.clone(), item);
    }
}

#[async_trait]
impl NewsRssUpstream for InMemoryRssUpstream {
    async fn fetch_unread(&self) -> Result<Vec<RssItem>, String> {
        Ok(self.items.lock().await.values().filter(|i| i.unread).cloned().collect())
    }

    async fn mark_read(&self, item_id: &str) -> Result<(), String> {
        let mut items = self.items.lock().await;
        match items.get_mut(item_id) {
            Some(item) => {
                item.unread = false;
                Ok(())
            }
            None => Err(format!("unknown RSS item '{item_id}'")),
        }
    }

    async fn fetch_body(&self, item_id: &str) -> Result<String, String> {
        self.bodies
            .lock()
            .await
            .get(item_id)
            .cloned()
            .ok_or_else(|| format!("no body cached for '{item_id}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fetch_unread_filters_read_items() {
        let upstream = InMemoryRssUpstream::default();
        upstream
            .seed(
                RssItem { id: "1".into(), feed_source: "Le Monde".into(), category: "News".into(), title: "A".into(), url: "https://a".into(), unread: true },
                None,
            )
            .await;
        upstream
            .seed(
                RssItem { id: "2".into(), feed_source: "Le Monde".into(), category: "News".into(), title: "B".into(), url: "https://b".into(), unread: false },
                None,
            )
            .await;
        let unread = upstream.fetch_unread().await.unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].id, "1");
    }

    #[tokio::test]
    async fn mark_read_updates_item_state() {
        let upstream = InMemoryRssUpstream::default();
        upstream
            .seed(
                RssItem { id: "1".into(), feed_source: "Le Monde".into(), category: "News".into(), title: "A".into(), url: "https://a".into(), unread: true },
                None,
            )
            .await;
        upstream.mark_read("1").await.unwrap();
        assert!(upstream.fetch_unread().await.unwrap().is_empty());
    }
}
