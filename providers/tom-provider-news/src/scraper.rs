//! The plug-in scraper mechanism (spec §4.3.5).
//!
//! The original Python discovers scrapers by scanning a directory of
//! modules at runtime and `inspect`-ing them for `BaseScraper` subclasses
//! (`news_scrape/__init__.py::discover_scrapers`). Rust has no runtime
//! module loading of that kind, so per the "reflection-driven dispatch"
//! redesign flag this becomes a static registry: every scraper is a
//! `NewsScraper` trait object, registered once at startup into a
//! `ScraperRegistry`, each independently enforcing its own minimum update
//! interval regardless of how often the provider is polled. A failing
//! scraper never blocks the others — `ScraperRegistry::run_due` collects
//! each scraper's own error rather than short-circuiting the loop.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct ScrapedArticle {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub url: String,
    pub date: Option<String>,
    pub author: String,
}

#[derive(Debug)]
pub struct ScrapeResult {
    pub success: bool,
    pub articles: Vec<ScrapedArticle>,
    pub error: Option<String>,
}

impl ScrapeResult {
    pub fn ok(articles: Vec<ScrapedArticle>) -> Self {
        ScrapeResult { success: true, articles, error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        ScrapeResult { success: false, articles: vec![], error: Some(error.into()) }
    }
}

/// One plug-in scraper. Mirrors `BaseScraper`'s abstract interface
/// (`name`, `category`, `update_interval_hours`, `scrape`).
#[async_trait]
pub trait NewsScraper: Send + Sync {
    fn name(&self) -> &str;
    fn category(&self) -> &str;
    fn update_interval_hours(&self) -> u64;
    async fn scrape(&self) -> ScrapeResult;
}

/// Wraps a [`NewsScraper`] with its own last-update clock, so the registry
/// enforces the per-scraper minimum interval "regardless of call
/// frequency" (spec §4.3.5) without the scraper itself needing to track
/// time.
struct RegisteredScraper {
    scraper: Box<dyn NewsScraper>,
    last_update: Mutex<Option<Instant>>,
}

impl RegisteredScraper {
    fn due(&self) -> bool {
        let guard = self.last_update.lock().expect("scraper clock mutex poisoned");
        match *guard {
            None => true,
            Some(last) => last.elapsed() >= Duration::from_secs(self.scraper.update_interval_hours() * 3600),
        }
    }

    fn mark_updated(&self) {
        *self.last_update.lock().expect("scraper clock mutex poisoned") = Some(Instant::now());
    }
}

pub struct ScraperOutcome {
    pub scraper: String,
    pub result: ScrapeResult,
}

/// The static registry every scraper plugs into at provider startup.
pub struct ScraperRegistry {
    scrapers: Vec<RegisteredScraper>,
}

impl ScraperRegistry {
    pub fn new() -> Self {
        ScraperRegistry { scrapers: Vec::new() }
    }

    pub fn register(&mut self, scraper: Box<dyn NewsScraper>) {
        self.scrapers.push(RegisteredScraper { scraper, last_update: Mutex::new(None) });
    }

    /// Run every scraper whose own minimum interval has elapsed. One
    /// scraper's failure is reported in its own `ScraperOutcome` and never
    /// prevents the others from running (spec §4.3.5: "Scrapers are
    /// independent").
    pub async fn run_due(&self) -> Vec<ScraperOutcome> {
        let mut outcomes = Vec::new();
        for registered in &self.scrapers {
            if !registered.due() {
                continue;
            }
            let result = registered.scraper.scrape().await;
            registered.mark_updated();
            outcomes.push(ScraperOutcome {
                scraper: registered.scraper.name().to_string(),
                result,
            });
        }
        outcomes
    }
}

impl Default for ScraperRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingScraper {
        calls: std::sync::Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl NewsScraper for CountingScraper {
        fn name(&self) -> &str {
            "counting"
        }
        fn category(&self) -> &str {
            "Test"
        }
        fn update_interval_hours(&self) -> u64 {
            1000 // effectively "never again" within a test's lifetime
        }
        async fn scrape(&self) -> ScrapeResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                ScrapeResult::failed("boom")
            } else {
                ScrapeResult::ok(vec![])
            }
        }
    }

    #[tokio::test]
    async fn run_due_runs_each_scraper_once_until_interval_elapses() {
        let calls = std::sync::Arc::new(AtomicUsize::new(0));
        let mut registry = ScraperRegistry::new();
        registry.register(Box::new(CountingScraper { calls: calls.clone(), fail: false }));

        registry.run_due().await;
        registry.run_due().await; // second call: not due yet, skipped

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn one_scraper_failing_does_not_stop_the_others() {
        let calls_a = std::sync::Arc::new(AtomicUsize::new(0));
        let calls_b = std::sync::Arc::new(AtomicUsize::new(0));
        let mut registry = ScraperRegistry::new();
        registry.register(Box::new(CountingScraper { calls: calls_a.clone(), fail: true }));
        registry.register(Box::new(CountingScraper { calls: calls_b.clone(), fail: false }));

        let outcomes = registry.run_due().await;
        assert_eq!(outcomes.len(), 2);
        assert!(!outcomes[0].result.success);
        assert!(outcomes[1].result.success);
    }
}
