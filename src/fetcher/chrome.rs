use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromeConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use tracing::{debug, warn};

use crate::app::{BookrateError, Result};
use crate::fetcher::{BrowserConfig, Fetcher};

/// Fetches fully rendered pages through headless Chrome
pub struct ChromeFetcher {
    browser: Browser,
    config: BrowserConfig,
}

impl ChromeFetcher {
    pub async fn new(config: BrowserConfig) -> Result<Self> {
        let mut builder = ChromeConfig::builder()
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--lang=zh-TW");

        if !config.headless {
            builder = builder.with_head();
        }

        let chrome_config = builder
            .build()
            .map_err(|e| BookrateError::Browser(format!("Failed to build browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(chrome_config).await.map_err(|e| {
            BookrateError::Browser(format!(
                "Failed to launch browser: {}. Is Chrome or Chromium installed and in PATH?",
                e
            ))
        })?;

        tokio::spawn(async move { while handler.next().await.is_some() {} });

        Ok(Self { browser, config })
    }

    /// Load `url` in a fresh tab; the tab is closed whether or not loading succeeds
    async fn render(&self, url: &str) -> Result<String> {
        let page = bounded(self.config.timeout(), url, async {
            self.browser
                .new_page(url)
                .await
                .map_err(|e| BookrateError::Browser(format!("Failed to create page: {}", e)))
        })
        .await?;

        let html = bounded(self.config.timeout(), url, self.snapshot(&page)).await;

        if let Err(e) = page.close().await {
            warn!("Failed to close page {}: {}", url, e);
        }

        html
    }

    async fn snapshot(&self, page: &Page) -> Result<String> {
        if let Some(ref ua) = self.config.user_agent {
            page.set_user_agent(ua)
                .await
                .map_err(|e| BookrateError::Browser(format!("Failed to set user agent: {}", e)))?;
        }

        page.wait_for_navigation()
            .await
            .map_err(|e| BookrateError::Browser(format!("Navigation failed: {}", e)))?;

        // listings are injected after load on every supported retailer
        tokio::time::sleep(self.config.wait_after_load()).await;

        page.content()
            .await
            .map_err(|e| BookrateError::Browser(format!("Failed to read page content: {}", e)))
    }

    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("Failed to close browser: {}", e);
        }
    }
}

#[async_trait]
impl Fetcher for ChromeFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        debug!("Rendering {} in Chrome", url);
        self.render(url).await
    }
}

/// Run a browser step under `limit`, turning expiry into a browser error
async fn bounded<T, F>(limit: Duration, url: &str, step: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(limit, step)
        .await
        .map_err(|_| BookrateError::Browser(format!("Timed out loading {}", url)))?
}
