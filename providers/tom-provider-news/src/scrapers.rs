//! The two named scrapers from `news_scrape/kyutai_scraper.py` and
//! `mistral_scraper.py`, reimplemented as [`NewsScraper`] plug-ins.
//!
//! Both parse a raw payload fetched from an external site — genuinely out
//! of scope for this core (spec §1) — so each takes a `RawFetch` trait
//! object as its fetch seam, and an in-memory stand-in is provided for
//! tests and for wiring a default provider binary without a live network
//! call.

use crate::scraper::{NewsScraper, ScrapeResult, ScrapedArticle};
use async_trait::async_trait;
use std::sync::Mutex;

/// Fetches the raw body a scraper needs to parse (HTML page, JSON API
/// response, ...). Out-of-scope external collaborator; this is the seam.
#[async_trait]
pub trait RawFetch: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, String>;
}

/// Returns a fixed payload regardless of URL — good enough to exercise
/// the scraper contract without a real HTTP client.
pub struct StaticFetch {
    body: Mutex<String>,
}

impl StaticFetch {
    pub fn new(body: impl Into<String>) -> Self {
        StaticFetch { body: Mutex::new(body.into()) }
    }

    #[cfg(test)]
    pub fn set(&self, body: impl Into<String>) {
        *self.body.lock().unwrap() = body.into();
    }
}

#[async_trait]
impl RawFetch for StaticFetch {
    async fn fetch(&self, _url: &str) -> Result<String, String> {
        Ok(self.body.lock().unwrap().clone())
    }
}

const KYUTAI_URL: &str = "https://kyutai.org/blog.html";

/// Scrapes `<h1><a href=...>title</a></h1>` blog entries, matching
/// `kyutai_scraper.py`'s `BeautifulSoup` `h1`/`a` walk. Parsing here is
/// deliberately naive (no HTML parser dependency, since this core doesn't
/// otherwise need one) — it expects one `<h1><a href="URL">TITLE</a></h1>`
/// per line, which is what a pre-rendered fetch seam would hand over.
pub struct KyutaiScraper {
    fetch: Box<dyn RawFetch>,
}

impl KyutaiScraper {
    pub fn new(fetch: Box<dyn RawFetch>) -> Self {
        KyutaiScraper { fetch }
    }

    fn parse(body: &str) -> Vec<ScrapedArticle> {
        let mut articles = Vec::new();
        for line in body.lines() {
            let line = line.trim();
            let Some(href_start) = line.find("href=\"") else { continue };
            let rest = &line[href_start + 6..];
            let Some(href_end) = rest.find('"') else { continue };
            let href = &rest[..href_end];
            let Some(title_start) = rest[href_end..].find('>') else { continue };
            let title_rest = &rest[href_end + title_start + 1..];
            let Some(title_end) = title_rest.find("</a>") else { continue };
            let title = title_rest[..title_end].trim();
            if title.is_empty() || href.is_empty() {
                continue;
            }
            articles.push(ScrapedArticle {
                id: href.to_string(),
                title: title.to_string(),
                summary: String::new(),
                url: format!("https://kyutai.org/{href}"),
                date: None,
                author: "kyutai".to_string(),
            });
        }
        articles
    }
}

#[async_trait]
impl NewsScraper for KyutaiScraper {
    fn name(&self) -> &str {
        "kyutai"
    }

    fn category(&self) -> &str {
        "AI"
    }

    fn update_interval_hours(&self) -> u64 {
        6
    }

    async fn scrape(&self) -> ScrapeResult {
        match self.fetch.fetch(KYUTAI_URL).await {
            Ok(body) => ScrapeResult::ok(Self::parse(&body)),
            Err(e) => ScrapeResult::failed(e),
        }
    }
}

const MISTRAL_API: &str = "https://cms.mistral.ai/items/posts?fields=*,translations.*,category.*,parent.id&sort=-date&limit=10&page=1";

#[derive(Debug, serde::Deserialize)]
struct MistralFeed {
    data: Vec<MistralPost>,
}

#[derive(Debug, serde::Deserialize)]
struct MistralPost {
    id: serde_json::Value,
    date: String,
    slug: String,
    translations: Vec<MistralTranslation>,
}

#[derive(Debug, serde::Deserialize)]
struct MistralTranslation {
    languages_code: String,
    title: String,
    description: String,
}

/// Scrapes Mistral's Directus-backed news API, matching
/// `mistral_scraper.py`'s JSON walk (english translation only).
pub struct MistralScraper {
    fetch: Box<dyn RawFetch>,
}

impl MistralScraper {
    pub fn new(fetch: Box<dyn RawFetch>) -> Self {
        MistralScraper { fetch }
    }

    fn parse(body: &str) -> Vec<ScrapedArticle> {
        let feed: MistralFeed = match serde_json::from_str(body) {
            Ok(f) => f,
            Err(_) => return Vec::new(),
        };
        feed.data
            .into_iter()
            .filter_map(|post| {
                let en = post.translations.into_iter().find(|t| t.languages_code == "en")?;
                let date = post.date.split('T').next().unwrap_or("").to_string();
                Some(ScrapedArticle {
                    id: post.id.to_string(),
                    title: en.title,
                    summary: en.description,
                    url: format!("https://mistral.ai/en/news/{}", post.slug),
                    date: Some(date),
                    author: "mistral".to_string(),
                })
            })
            .collect()
    }
}

#[async_trait]
impl NewsScraper for MistralScraper {
    fn name(&self) -> &str {
        "mistral"
    }

    fn category(&self) -> &str {
        "AI"
    }

    fn update_interval_hours(&self) -> u64 {
        6
    }

    async fn scrape(&self) -> ScrapeResult {
        match self.fetch.fetch(MISTRAL_API).await {
            Ok(body) => ScrapeResult::ok(Self::parse(&body)),
            Err(e) => ScrapeResult::failed(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn kyutai_parses_one_entry_per_h1() {
        let body = "<h1><a href=\"moshi-launch\">Moshi launch</a></h1>\n<h1><a href=\"sts-release\">STS release</a></h1>";
        let scraper = KyutaiScraper::new(Box::new(StaticFetch::new(body)));
        let result = scraper.scrape().await;
        assert!(result.success);
        assert_eq!(result.articles.len(), 2);
        assert_eq!(result.articles[0].id, "moshi-launch");
        assert_eq!(result.articles[0].url, "https://kyutai.org/moshi-launch");
    }

    #[tokio::test]
    async fn kyutai_scrape_failure_propagates() {
        struct Failing;
        #[async_trait]
        impl RawFetch for Failing {
            async fn fetch(&self, _url: &str) -> Result<String, String> {
                Err("timeout".into())
            }
        }
        let scraper = KyutaiScraper::new(Box::new(Failing));
        let result = scraper.scrape().await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("timeout"));
    }

    #[tokio::test]
    async fn mistral_keeps_only_english_translation() {
        let body = serde_json::json!({
            "data": [{
                "id": 42,
                "date": "2025-01-10T08:00:00Z",
                "slug": "le-chat-update",
                "translations": [
                    {"languages_code": "fr", "title": "Mise a jour", "description": "..."},
                    {"languages_code": "en", "title": "Le Chat update", "description": "New features"},
                ]
            }]
        })
        .to_string();
        let scraper = MistralScraper::new(Box::new(StaticFetch::new(body)));
        let result = scraper.scrape().await;
        assert!(result.success);
        assert_eq!(result.articles.len(), 1);
        assert_eq!(result.articles[0].title, "Le Chat update");
        assert_eq!(result.articles[0].date.as_deref(), Some("2025-01-10"));
    }
}
