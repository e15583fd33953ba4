//! Chromium-backed page controller.

use crate::error::{CoreError, Result};
use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::ScreenshotParams;
use futures::StreamExt;
use jshunter_scanner::ScanError;
use jshunter_scanner::page::{PageController, PageHandle};
use std::path::Path;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default)]
pub struct BrowserOptions {
    /// Display the window instead of running headless
    pub show_window: bool,
    pub proxy: Option<String>,
}

pub struct ChromeController {
    browser: RwLock<Browser>,
    handler: JoinHandle<()>,
}

impl ChromeController {
    pub async fn launch(options: &BrowserOptions) -> Result<Self> {
        info!("Launching Chromium (window: {})", options.show_window);

        let mut builder = BrowserConfig::builder().no_sandbox().args(vec![
            "--disable-infobars",
            "--disable-extensions",
            "--disable-web-security",
            "--allow-running-insecure-content",
            "--reduce-security-for-testing",
            "--ignore-certificate-errors",
        ]);
        if options.show_window {
            builder = builder.with_head();
        }
        if let Some(ref proxy) = options.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }
        let config = builder
            .build()
            .map_err(|e| CoreError::Browser(format!("Browser config error: {}", e)))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| CoreError::Browser(format!("Failed to launch browser: {}", e)))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler error: {}", e);
                }
            }
        });

        Ok(Self {
            browser: RwLock::new(browser),
            handler,
        })
    }

    pub async fn close(&self) {
        let mut browser = self.browser.write().await;
        if let Err(e) = browser.close().await {
            warn!("Failed to close browser: {}", e);
        }
        if let Err(e) = browser.wait().await {
            debug!("Browser process wait failed: {}", e);
        }
        self.handler.abort();
    }
}

#[async_trait]
impl PageController for ChromeController {
    async fn open(&self, url: &str) -> jshunter_scanner::error::Result<Box<dyn PageHandle>> {
        let page = self
            .browser
            .read()
            .await
            .new_page(url)
            .await
            .map_err(|e| ScanError::BrowserError(format!("Can not open tab on {}: {}", url, e)))?;
        Ok(Box::new(ChromePage { page }))
    }
}

pub struct ChromePage {
    page: Page,
}

#[async_trait]
impl PageHandle for ChromePage {
    async fn navigate(&self, url: &str, timeout: Duration) -> jshunter_scanner::error::Result<()> {
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(ScanError::BrowserError(format!("Navigation to {} failed: {}", url, e))),
            Err(_) => Err(ScanError::Timeout(timeout.as_secs(), url.to_string())),
        }
    }

    async fn eval(&self, script: &str) -> jshunter_scanner::error::Result<serde_json::Value> {
        let result = self
            .page
            .evaluate_function(script)
            .await
            .map_err(|e| ScanError::BrowserError(format!("Evaluation failed: {}", e)))?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn screenshot(&self, path: &Path) -> jshunter_scanner::error::Result<()> {
        self.page
            .save_screenshot(ScreenshotParams::builder().full_page(true).build(), path)
            .await
            .map_err(|e| ScanError::BrowserError(format!("Screenshot to {} failed: {}", path.display(), e)))?;
        Ok(())
    }

    async fn close(self: Box<Self>) {
        if let Err(e) = self.page.close().await {
            debug!("Failed to close tab: {}", e);
        }
    }
}
