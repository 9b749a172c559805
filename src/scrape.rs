//! The review feed: a capability trait and its Google Maps implementation.

pub mod parse;
pub mod puppeteer;

use core::time::Duration;
use std::sync::Arc;

use headless_chrome::{Browser, Tab};

use crate::review::{Business, RawReview};

pub const GM_WEBPAGE: &str = "https://www.google.com/maps/";

/// A session over a review feed, newest first once sorted.
pub trait ReviewSource {
    /// Opens `business` and switches its review list to newest first.
    fn sort_by_recency(&mut self, business: &Business) -> impl Future<Output = anyhow::Result<()>>;

    /// Reviews at index `offset` and beyond, in feed order. Empty means exhausted.
    fn fetch_review_page(&mut self, offset: usize) -> impl Future<Output = anyhow::Result<Vec<RawReview>>>;

    /// Releases the session. Called once, also after failures.
    fn close(&mut self) -> impl Future<Output = anyhow::Result<()>>;
}

#[derive(Clone, Debug)]
pub struct BrowserOptions {
    pub headless: bool,
    pub proxy: Option<String>,
    /// Upper bound for every element wait.
    pub wait: Duration,
    pub max_scrolls: usize,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: true,
            proxy: None,
            wait: Duration::from_secs(5),
            max_scrolls: 20,
        }
    }
}

/// [`ReviewSource`] driving a Chrome instance over Google Maps.
pub struct GoogleMaps {
    browser: Option<Browser>,
    tab: Arc<Tab>,
    options: BrowserOptions,
}

impl GoogleMaps {
    const SORT_BUTTON: &'static str = r#"button[data-value="Sort"]"#;
    const SORT_ITEMS: &'static str = r#"div[role="menuitemradio"]"#;
    /// Index of "Newest" in the sort menu.
    const SORT_NEWEST: usize = 1;
    const REVIEW_PANE: &'static str = "div.m6QErb.DxyBCb.kA9KIf.dS8AEf";
    const EXPAND_CAPTIONS: &'static str =
        "document.querySelectorAll('button.w8nwRe.kyuRq').forEach(b => b.click())";

    pub async fn launch(options: BrowserOptions) -> anyhow::Result<Self> {
        let browser = puppeteer::puppeteer(options.headless, options.proxy.as_deref())?;
        let tab = puppeteer::review_tab(&browser, options.wait)?;
        puppeteer::navigate_to(&tab, GM_WEBPAGE.to_owned()).await?;
        tracing::info!(target: "scrape", "browser ready (headless = {})", options.headless);

        Ok(Self {
            browser: Some(browser),
            tab,
            options,
        })
    }

    pub fn url_of(business: &Business) -> String {
        if business.is_url() {
            business.ident.to_string()
        } else {
            format!("{GM_WEBPAGE}search/{}", business.ident.trim().replace(' ', "+"))
        }
    }
}

impl ReviewSource for GoogleMaps {
    async fn sort_by_recency(&mut self, business: &Business) -> anyhow::Result<()> {
        let url = Self::url_of(business);
        tracing::info!(target: "scrape", "\x1b[33mopening\x1b[0m {url} ...");
        puppeteer::navigate_to(&self.tab, url).await?;

        puppeteer::wait_for_async(&self.tab, Self::SORT_BUTTON, self.options.wait).await?;
        puppeteer::click_nth_async(&self.tab, Self::SORT_BUTTON, 0).await?;
        puppeteer::wait_for_async(&self.tab, Self::SORT_ITEMS, self.options.wait).await?;
        puppeteer::click_nth_async(&self.tab, Self::SORT_ITEMS, Self::SORT_NEWEST).await?;

        // the list re-renders after sorting
        tokio::time::sleep(Duration::from_secs(1)).await;
        Ok(())
    }

    async fn fetch_review_page(&mut self, offset: usize) -> anyhow::Result<Vec<RawReview>> {
        puppeteer::wait_for_async(&self.tab, Self::REVIEW_PANE, self.options.wait).await?;
        puppeteer::scroll_to_end(&self.tab, Self::REVIEW_PANE, self.options.max_scrolls).await?;
        puppeteer::evaluate_async(&self.tab, Self::EXPAND_CAPTIONS.to_owned()).await?;

        let html = puppeteer::content_async(&self.tab).await?;
        let page = parse::parse_reviews(&html, offset);
        tracing::debug!(target: "scrape", "offset {offset}: {} reviews", page.len());
        Ok(page)
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        let Some(browser) = self.browser.take() else {
            return Ok(());
        };
        let closed = self.tab.close(true);
        drop(browser);
        tracing::info!(target: "scrape", "browser closed");
        closed.map(|_| ())
    }
}
