// src/browser/session.rs
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;

use crate::browser::{PageRenderer, RenderedPage};
use crate::utils::error::BrowserError;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
// How long to wait for document.readyState to reach "complete".
const READY_TIMEOUT: Duration = Duration::from_secs(30);
const READY_POLL: Duration = Duration::from_millis(250);

/// One Chrome instance with a single tab, reused for every page of a run.
pub struct ChromeSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromeSession {
    /// Launches Chrome/Chromium. A visible window is used unless `headless`.
    pub async fn launch(headless: bool) -> Result<Self, BrowserError> {
        tracing::info!("Launching Chrome (headless: {})...", headless);

        let mut builder = BrowserConfig::builder()
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-blink-features=AutomationControlled")
            .arg(format!("--user-agent={}", USER_AGENT));
        if !headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(BrowserError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        // The CDP connection only makes progress while its handler is polled.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("CDP handler error: {}", e);
                }
            }
        });

        let page = browser.new_page("about:blank").await?;
        tracing::info!("Browser session ready");

        Ok(Self { browser, page, handler })
    }

    /// Closes the browser. Errors are logged, never returned: this runs on
    /// the shutdown path.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            tracing::warn!("Failed to close browser cleanly: {}", e);
        }
        self.browser.wait().await.ok();
        self.handler.abort();
        tracing::info!("Browser closed");
    }

    /// Polls `document.readyState` until it is "complete". A timeout is only
    /// a warning: whatever rendered so far is still captured.
    async fn wait_for_ready(&self) {
        let start = Instant::now();
        loop {
            let state = self
                .page
                .evaluate("document.readyState")
                .await
                .ok()
                .and_then(|v| v.into_value::<String>().ok());
            if state.as_deref() == Some("complete") {
                tracing::debug!("Document ready after {}ms", start.elapsed().as_millis());
                return;
            }
            if start.elapsed() >= READY_TIMEOUT {
                tracing::warn!("Page load timeout");
                return;
            }
            tokio::time::sleep(READY_POLL).await;
        }
    }
}

#[async_trait(?Send)]
impl PageRenderer for ChromeSession {
    async fn render(&self, url: &str, settle: Duration) -> Result<RenderedPage, BrowserError> {
        tracing::info!("Navigating to: {}", url);
        self.page
            .goto(url)
            .await
            .map_err(|e| BrowserError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        self.wait_for_ready().await;
        // Client-side rendering keeps going after the load event.
        tokio::time::sleep(settle).await;

        let html = self.page.content().await?;
        tracing::debug!("Captured {} bytes from {}", html.len(), url);
        Ok(RenderedPage::new(url, html))
    }
}
