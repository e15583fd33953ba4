//! Endpoint exposure pipeline.
//!
//! Per target: fetch the page, locate its JS assets, resolve the deployment
//! base, run every extractor over every body, then probe each distinct
//! candidate exactly once.

use crate::assets::{extract_js_assets, is_absolute, unique_in_order};
use crate::base_url::resolve_base_url;
use crate::endpoint::{
    EndpointCandidate, candidates_from_snippets, join_base, unique_candidates,
};
use crate::error::{Result, ScanError};
use crate::generator::batches;
use crate::http::HttpClient;
use crate::result::{EndpointProbeResult, ScanResult, SensitiveFindingResult};
use crate::session::ScanSession;
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

pub type ProgressCallback = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Clone)]
pub struct EndpointScanner {
    session: Arc<ScanSession>,
    /// Request-limited to `threads` across all targets
    client: HttpClient,
    progress_callback: Option<ProgressCallback>,
}

/// Per-target extraction state.
#[derive(Default)]
struct Extracted {
    /// Path snippets in first-seen order
    snippets: Vec<String>,
    seen_snippets: HashSet<String>,
    seen_secrets: HashSet<String>,
}

/// What one target produced, for logging.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TargetSummary {
    pub base_url: String,
    pub bodies: usize,
    pub snippets: usize,
    pub secrets: usize,
    pub probed: usize,
}

impl EndpointScanner {
    pub fn new(session: Arc<ScanSession>) -> Result<Self> {
        let client = HttpClient::new(&session.settings.http)?.with_request_limit(session.settings.threads);

        Ok(Self {
            session,
            client,
            progress_callback: None,
        })
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Scan every target. Per-target failures are logged, never returned.
    pub async fn run(&self, targets: Vec<String>) {
        info!("Endpoint scan of {} targets with {} threads", targets.len(), self.session.settings.threads);

        let target_slots = Arc::new(Semaphore::new(self.session.settings.threads.max(1)));
        let mut workers = JoinSet::new();

        for target in targets {
            if self.session.is_shutting_down() {
                info!("Shutdown requested, no new endpoint targets");
                break;
            }
            let Ok(permit) = target_slots.clone().acquire_owned().await else {
                break;
            };
            let scanner = self.clone();
            workers.spawn(async move {
                let _permit = permit;
                match scanner.scan_target(&target).await {
                    Ok(summary) => info!(
                        "Endpoint scan of {} done: base {}, {} bodies, {} snippets, {} secrets, {} probed",
                        target, summary.base_url, summary.bodies, summary.snippets, summary.secrets, summary.probed
                    ),
                    Err(e) => warn!("Endpoint scan of {} skipped: {}", target, e),
                }
            });
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                warn!("Endpoint worker failed: {}", e);
            }
        }
    }

    pub async fn scan_target(&self, target: &str) -> Result<TargetSummary> {
        if let Some(ref callback) = self.progress_callback {
            callback(target);
        }

        let page = self.client.get(target).await?;
        if page.status_code == 404 {
            return Err(ScanError::Other(format!("{} returned 404", target)));
        }

        let mut summary = TargetSummary::default();
        let mut extracted = Extracted::default();

        // Page secrets go out before any base url or asset fetch
        summary.bodies += 1;
        self.extract(target, &page.body, &mut extracted, &mut summary).await;

        let assets = extract_js_assets(target, &page.body);
        debug!("{} references {} JS assets", target, assets.paths.len());

        let base_url = resolve_base_url(&self.client, target, &assets)
            .await
            .ok_or_else(|| ScanError::InvalidUrl(format!("Can not resolve base url of {}", target)))?;
        debug!("Base url of {} is {}", target, base_url);
        summary.base_url = base_url.clone();

        let asset_urls: Vec<String> = unique_in_order(
            assets
                .paths
                .iter()
                .map(|p| if is_absolute(p) { p.clone() } else { join_base(&base_url, p) }),
        )
        .into_iter()
        .filter(|url| url != target)
        .collect();

        let mut bodies = stream::iter(asset_urls)
            .map(|url| async move {
                let body = self.fetch_body(&url).await;
                (url, body)
            })
            .buffer_unordered(self.session.settings.threads.max(1));

        while let Some((url, body)) = bodies.next().await {
            let Some(body) = body else { continue };
            summary.bodies += 1;
            self.extract(&url, &body, &mut extracted, &mut summary).await;
        }
        summary.snippets = extracted.snippets.len();

        let mut candidates = candidates_from_snippets(&extracted.snippets);
        candidates.extend(self.generate(&extracted.snippets).await);
        let candidates = unique_candidates(candidates);

        let probes = join_all(candidates.iter().map(|c| self.probe(&base_url, c))).await;
        for result in probes.into_iter().flatten() {
            summary.probed += 1;
            self.session.emit(ScanResult::EndpointProbe(result)).await;
        }

        Ok(summary)
    }

    /// Run every extractor over one body. Secrets are emitted on the spot.
    async fn extract(&self, url: &str, body: &str, extracted: &mut Extracted, summary: &mut TargetSummary) {
        let extraction = self.session.registry.run(body);
        for path in extraction.paths {
            if extracted.seen_snippets.insert(path.clone()) {
                extracted.snippets.push(path);
            }
        }
        for secret in extraction.secrets {
            if extracted.seen_secrets.insert(secret.clone()) {
                summary.secrets += 1;
                self.session
                    .emit(ScanResult::SensitiveFinding(SensitiveFindingResult {
                        url: url.to_string(),
                        message: secret,
                    }))
                    .await;
            }
        }
    }

    async fn fetch_body(&self, url: &str) -> Option<String> {
        match self.client.get(url).await {
            Ok(page) if page.status_code == 404 => {
                warn!("Asset {} returned 404", url);
                None
            }
            Ok(page) => Some(page.body),
            Err(e) => {
                warn!("Can not fetch asset {}: {}", url, e);
                None
            }
        }
    }

    /// Generated candidates for every batch. Failed batches contribute nothing.
    async fn generate(&self, snippets: &[String]) -> Vec<EndpointCandidate> {
        let Some(ref generator) = self.session.generator else {
            return Vec::new();
        };
        if snippets.is_empty() {
            return Vec::new();
        }

        let ai_timeout = self.session.settings.ai_timeout;
        let calls = batches(snippets).into_iter().map(|batch| {
            let generator = generator.clone();
            async move {
                match tokio::time::timeout(ai_timeout, generator.generate(&batch)).await {
                    Ok(Ok(candidates)) => candidates,
                    Ok(Err(e)) => {
                        warn!("{} batch failed: {}", generator.name(), e);
                        Vec::new()
                    }
                    Err(_) => {
                        warn!(
                            "{}",
                            ScanError::Timeout(ai_timeout.as_secs(), format!("{} batch", generator.name()))
                        );
                        Vec::new()
                    }
                }
            }
        });

        join_all(calls).await.into_iter().flatten().collect()
    }

    async fn probe(&self, base_url: &str, candidate: &EndpointCandidate) -> Option<EndpointProbeResult> {
        match self.client.probe(base_url, candidate).await {
            Ok(result) => Some(result),
            Err(e) => {
                warn!("Probe [{}] {} failed: {}", candidate.method, candidate.path, e);
                None
            }
        }
    }
}
