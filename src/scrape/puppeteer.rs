use std::{
    ffi::OsStr,
    sync::{Arc, PoisonError},
    time::Duration,
};

use headless_chrome::{Browser, LaunchOptions, Tab, browser::tab::NoElementFound};
use serde_json::Value;
use tokio::{task::spawn_blocking, time::sleep};

pub fn puppeteer(headless: bool, proxy: Option<&str>) -> anyhow::Result<Browser> {
    Browser::new(LaunchOptions {
        args: vec![
            OsStr::new("--disable-blink-features=AutomationControlled"),
            OsStr::new("--lang=en-GB"),
            OsStr::new("--disable-notifications"),
        ],
        headless,
        window_size: Some((1366, 768)),
        proxy_server: proxy,
        idle_browser_timeout: Duration::from_secs(600),
        ..LaunchOptions::default()
    })
}

/// Opens the single tab the scraper works in, with `wait` as its element
/// timeout. Any other tab (the blank start page) is closed.
pub fn review_tab(browser: &Browser, wait: Duration) -> anyhow::Result<Arc<Tab>> {
    let tab = browser.new_tab()?;
    tab.set_default_timeout(wait);

    let stray = browser
        .get_tabs()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .filter(|t| !Arc::ptr_eq(t, &tab))
        .cloned()
        .collect::<Vec<_>>();
    for t in &stray {
        t.close(true)?;
    }
    tracing::debug!(target: "puppeteer", "review tab ready, {} stray tabs closed", stray.len());

    Ok(tab)
}

pub async fn navigate_to(tab: &Arc<Tab>, url: String) -> anyhow::Result<()> {
    let tab = Arc::clone(tab);

    spawn_blocking(move || -> anyhow::Result<()> {
        tab.navigate_to(&url)?.wait_until_navigated()?;
        Ok(())
    })
    .await?
}

/// Polls for `selector` until it shows up, giving up after `timeout`.
pub async fn wait_for_async(tab: &Arc<Tab>, selector: &'static str, timeout: Duration) -> anyhow::Result<()> {
    const PERIOD: Duration = Duration::from_millis(1832 / 4);

    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let arc_tab = Arc::clone(tab);
        let found = spawn_blocking(move || arc_tab.find_element(selector).map(|_| ())).await?;
        match found {
            Ok(()) => break Ok(()),
            Err(err) => {
                if !err.is::<NoElementFound>() {
                    break Err(err);
                }
            }
        }

        if tokio::time::Instant::now() >= deadline {
            anyhow::bail!("timed out after {timeout:?} waiting for {selector:?}");
        }
        sleep(PERIOD).await;
    }
}

/// Clicks the `nth` element matching `selector`.
pub async fn click_nth_async(tab: &Arc<Tab>, selector: &'static str, nth: usize) -> anyhow::Result<()> {
    let tab = Arc::clone(tab);

    spawn_blocking(move || -> anyhow::Result<()> {
        let elements = tab.find_elements(selector)?;
        let Some(element) = elements.get(nth) else {
            anyhow::bail!("only {} elements match {selector:?}, wanted #{nth}", elements.len());
        };
        element.click()?;
        Ok(())
    })
    .await?
}

pub async fn evaluate_async(tab: &Arc<Tab>, expression: String) -> anyhow::Result<Option<Value>> {
    let tab = Arc::clone(tab);

    spawn_blocking(move || tab.evaluate(&expression, false).map(|ret| ret.value)).await?
}

/// Scrolls the element matching `selector` to its bottom until its height
/// stops growing, or `max_rounds` scrolls have been made.
pub async fn scroll_to_end(tab: &Arc<Tab>, selector: &str, max_rounds: usize) -> anyhow::Result<()> {
    const SETTLE: Duration = Duration::from_millis(500);

    let expression = format!(
        "(() => {{ const e = document.querySelector({selector:?}); if (!e) return -1; e.scrollTop = e.scrollHeight; return e.scrollHeight; }})()"
    );

    let mut last = None;
    for _ in 0..max_rounds {
        let height = evaluate_async(tab, expression.clone()).await?.and_then(|v| v.as_i64());
        if height == Some(-1) {
            anyhow::bail!("scroll container {selector:?} not found");
        }
        if height == last {
            break;
        }
        last = height;
        sleep(SETTLE).await;
    }
    Ok(())
}

pub async fn content_async(tab: &Arc<Tab>) -> anyhow::Result<String> {
    let tab = Arc::clone(tab);

    spawn_blocking(move || tab.get_content()).await?
}
