//! Shared context threaded through every pipeline worker.

use crate::error::Result;
use crate::extractor::ExtractorRegistry;
use crate::generator::Generator;
use crate::http::HttpSettings;
use crate::page::PageHandle;
use crate::result::{BrokenRouteResult, ScanResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, watch};
use tracing::debug;
use url::Url;

#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub http: HttpSettings,
    /// Endpoint pipeline pool size
    pub threads: usize,
    /// Browser tab pool size
    pub tabs: usize,
    pub report_dir: PathBuf,
    pub ai_timeout: Duration,
    /// Outer bound for one route check
    pub route_timeout: Duration,
    pub navigate_timeout: Duration,
    /// Pause after load before reading the href
    pub settle_delay: Duration,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            http: HttpSettings::default(),
            threads: 30,
            tabs: 10,
            report_dir: PathBuf::from("reports"),
            ai_timeout: Duration::from_secs(120),
            route_timeout: Duration::from_secs(20),
            navigate_timeout: Duration::from_secs(15),
            settle_delay: Duration::from_secs(1),
        }
    }
}

pub struct ScanSession {
    pub registry: ExtractorRegistry,
    pub generator: Option<Arc<dyn Generator>>,
    pub settings: ScanSettings,
    results: mpsc::Sender<ScanResult>,
    /// Next screenshot number; the lock also serializes capture + emit
    screenshot_counter: Mutex<u32>,
    shutdown: watch::Receiver<bool>,
}

impl ScanSession {
    pub fn new(
        registry: ExtractorRegistry,
        generator: Option<Arc<dyn Generator>>,
        settings: ScanSettings,
        results: mpsc::Sender<ScanResult>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            registry,
            generator,
            settings,
            results,
            screenshot_counter: Mutex::new(1),
            shutdown,
        }
    }

    pub async fn emit(&self, result: ScanResult) {
        if self.results.send(result).await.is_err() {
            debug!("Result receiver closed, dropping result");
        }
    }

    /// True once an interrupt has been received; no new work should start.
    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// `<report_dir>/vue_reports/<host>/resources`
    pub fn screenshot_dir(&self, target_url: &str) -> PathBuf {
        self.settings
            .report_dir
            .join("vue_reports")
            .join(host_folder(target_url))
            .join("resources")
    }

    /// Screenshot the tab and emit the finding as one critical section, so
    /// file numbers never collide and results follow file order.
    pub async fn record_broken_route(
        &self,
        page: &dyn PageHandle,
        dir: &Path,
        parent_url: &str,
        route_url: &str,
        observed_href: &str,
    ) -> Result<PathBuf> {
        let mut counter = self.screenshot_counter.lock().await;
        let screenshot = dir.join(format!("{}.png", *counter));

        page.screenshot(&screenshot).await?;
        *counter += 1;

        self.emit(ScanResult::BrokenRoute(BrokenRouteResult {
            parent_url: parent_url.to_string(),
            route_url: route_url.to_string(),
            observed_href: observed_href.to_string(),
            screenshot: screenshot.clone(),
        }))
        .await;

        Ok(screenshot)
    }
}

/// Filesystem-safe folder name for a target: its host, `:` replaced by `_`.
pub fn host_folder(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|u| match u.port() {
            Some(port) => format!("{}_{}", u.host_str().unwrap_or_default(), port),
            None => u.host_str().unwrap_or_default().to_string(),
        })
        .unwrap_or_else(|| url.replace([':', '/'], "_"))
}
