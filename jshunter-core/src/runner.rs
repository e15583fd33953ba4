//! Run orchestration.
//!
//! The runner builds the scan session, starts the endpoint and route
//! pipelines side by side, and funnels every result through one channel to a
//! single writer task. Both pipelines join before the channel closes, so the
//! writer sees every result before it flushes its reports.

use crate::browser::{BrowserOptions, ChromeController};
use crate::error::{CoreError, Result};
use crate::gemini::{GeminiConfig, GeminiGenerator};
use crate::options::{AiSource, ScanOptions};
use crate::report::{ReportWriter, ResultWriter};
use indicatif::{ProgressBar, ProgressStyle};
use jshunter_scanner::{
    EndpointScanner, ExtractorRegistry, Generator, PageController, RouterScanner, ScanResult, ScanSession,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};

const RESULT_BUFFER: usize = 1024;

/// Counts of what a run produced.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunSummary {
    pub endpoints: usize,
    pub secrets: usize,
    pub broken_routes: usize,
    pub reports: Vec<PathBuf>,
}

impl RunSummary {
    fn record(&mut self, result: &ScanResult) {
        match result {
            ScanResult::EndpointProbe(_) => self.endpoints += 1,
            ScanResult::SensitiveFinding(_) => self.secrets += 1,
            ScanResult::BrokenRoute(_) => self.broken_routes += 1,
        }
    }
}

/// Collaborators a run is wired with.
pub struct Components {
    pub registry: ExtractorRegistry,
    pub generator: Option<Arc<dyn Generator>>,
    pub pages: Option<Arc<dyn PageController>>,
    pub writer: Box<dyn ResultWriter>,
}

pub struct Runner {
    options: ScanOptions,
}

impl Runner {
    pub fn new(options: ScanOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Build the concrete collaborators, scan, then close the browser.
    ///
    /// Fails only on startup problems: no extractors, generator
    /// authentication, browser launch, or an unwritable output file.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<RunSummary> {
        let registry = ExtractorRegistry::with_defaults();

        let generator: Option<Arc<dyn Generator>> = match self.options.ai {
            Some(AiSource::Gemini) => {
                let config = GeminiConfig {
                    timeout_secs: self.options.ai_timeout_secs,
                    ..GeminiConfig::from_env_file(self.options.env_file.as_deref())?
                };
                let gemini = GeminiGenerator::new(config)?;
                info!("Authenticating {}", gemini.name());
                gemini
                    .authenticate()
                    .await
                    .map_err(|e| CoreError::Generator(e.to_string()))?;
                Some(Arc::new(gemini))
            }
            None => None,
        };

        let progress = self.options.show_progress.then(|| {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.cyan} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb.enable_steady_tick(Duration::from_millis(100));
            pb.set_message("Starting scan...");
            pb
        });

        let mut writer = ReportWriter::new(&self.options.report_dir, self.options.output.as_deref())?;
        if let Some(ref pb) = progress {
            writer = writer.with_progress_bar(pb.clone());
        }

        let browser = if self.options.scan_type.includes_routes() {
            let browser = ChromeController::launch(&BrowserOptions {
                show_window: self.options.headless,
                proxy: self.options.proxy.clone(),
            })
            .await?;
            Some(Arc::new(browser))
        } else {
            None
        };

        let components = Components {
            registry,
            generator,
            pages: browser.clone().map(|b| b as Arc<dyn PageController>),
            writer: Box::new(writer),
        };
        let summary = self.run_with(components, shutdown, progress.clone()).await;

        if let Some(browser) = browser {
            browser.close().await;
        }
        if let Some(pb) = progress {
            pb.finish_and_clear();
        }
        summary
    }

    /// Scan with the given collaborators.
    pub async fn run_with(
        self,
        components: Components,
        shutdown: watch::Receiver<bool>,
        progress: Option<ProgressBar>,
    ) -> Result<RunSummary> {
        let Components {
            registry,
            generator,
            pages,
            mut writer,
        } = components;

        if registry.is_empty() {
            return Err(CoreError::NoExtractors);
        }
        let scan_type = self.options.scan_type;
        let pages = match (scan_type.includes_routes(), pages) {
            (true, None) => {
                return Err(CoreError::Browser("route scan requested without a browser".to_string()));
            }
            (_, pages) => pages,
        };

        info!(
            "Scanning {} targets ({:?}), extractors: {}",
            self.options.targets.len(),
            scan_type,
            registry.names().join(", ")
        );

        let (tx, mut rx) = mpsc::channel::<ScanResult>(RESULT_BUFFER);
        let session = Arc::new(ScanSession::new(
            registry,
            generator,
            self.options.scan_settings(),
            tx,
            shutdown,
        ));

        let writer_task = tokio::spawn(async move {
            let mut summary = RunSummary::default();
            while let Some(result) = rx.recv().await {
                summary.record(&result);
                if let Err(e) = writer.write(&result) {
                    error!("Failed to write result: {}", e);
                }
            }
            match writer.close() {
                Ok(reports) => summary.reports = reports,
                Err(e) => error!("Failed to write reports: {}", e),
            }
            summary
        });

        let endpoint_scan = if scan_type.includes_endpoints() {
            let mut scanner = EndpointScanner::new(session.clone())?;
            if let Some(ref pb) = progress {
                let pb = pb.clone();
                scanner = scanner.with_progress_callback(Arc::new(move |url: &str| {
                    pb.set_message(format!("Endpoint scan: {}", url));
                }));
            }
            Some(scanner)
        } else {
            None
        };

        let route_scan = pages.filter(|_| scan_type.includes_routes()).map(|pages| {
            let mut scanner = RouterScanner::new(session.clone(), pages);
            if let Some(ref pb) = progress {
                let pb = pb.clone();
                scanner = scanner.with_progress_callback(Arc::new(move |url: &str| {
                    pb.set_message(format!("Route scan: {}", url));
                }));
            }
            scanner
        });

        // The session holds the only sender; the writer ends when all scanners drop it
        drop(session);

        let targets = self.options.targets.clone();
        let endpoints = async {
            if let Some(scanner) = endpoint_scan {
                scanner.run(targets.clone()).await;
            }
        };
        let routes = async {
            if let Some(scanner) = route_scan {
                scanner.run(targets.clone()).await;
            }
        };
        tokio::join!(endpoints, routes);

        let summary = writer_task.await.map_err(jshunter_scanner::ScanError::from)?;
        info!(
            "Scan complete: {} endpoints probed, {} secrets, {} broken routes",
            summary.endpoints, summary.secrets, summary.broken_routes
        );
        Ok(summary)
    }
}
