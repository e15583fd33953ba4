//! SPA route access checks.
//!
//! Each target moves through `Load -> HarvestRoutes -> PrepareChecks ->
//! FanOutChecks`. A target that fails to load, or exposes no routes, stops
//! early. Every harvested route is then opened in its own tab; routes that
//! render somewhere other than the target's own landing page, without a
//! `redirect` parameter, are reported with a screenshot.

use crate::assets::unique_in_order;
use crate::error::{Result, ScanError};
use crate::page::{PageController, PageHandle};
use crate::session::ScanSession;
use crate::token::{BLANK_PAGE, NO_REDIRECT, is_broken_access, route_base_url, tokenize};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Walks the Vue 2/3 router tables of the rendered app and returns `[{path}]`.
pub const ROUTES_SCRIPT: &str = include_str!("scripts/routes.js");

pub type ProgressCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// A target after its first render.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Target {
    pub url: String,
    /// Location after the first load
    pub index_url: String,
    pub base_uri: String,
    pub base_token: String,
    /// Absolute route URLs, deduplicated in harvest order
    pub subs: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteCheckItem {
    pub route_url: String,
    pub parent_url: String,
    pub expected_first_visit_href: String,
    pub observed_href: String,
    pub observed_base: String,
    pub observed_token: String,
    pub screenshot: Option<PathBuf>,
}

impl RouteCheckItem {
    pub fn new(route_url: &str, parent: &Target) -> Self {
        Self {
            route_url: route_url.to_string(),
            parent_url: parent.url.clone(),
            expected_first_visit_href: parent.index_url.clone(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Unreachable,
    Broken,
    NotBroken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetOutcome {
    Unreachable,
    NoRoutes,
    Checked { routes: usize, broken: usize },
}

#[derive(Debug, Deserialize)]
struct HarvestedRoute {
    #[serde(default)]
    path: Option<String>,
}

/// Absolute, probe-able route URLs from the route script's output.
///
/// Dynamic (`:id`) and wildcard (`*`) routes are dropped since they cannot be
/// visited deterministically.
pub fn harvest_routes(base_url: &str, value: serde_json::Value) -> Vec<String> {
    let routes: Vec<HarvestedRoute> = match serde_json::from_value(value) {
        Ok(routes) => routes,
        Err(e) => {
            warn!("Unexpected route table shape: {}", e);
            return Vec::new();
        }
    };

    unique_in_order(
        routes
            .into_iter()
            .filter_map(|r| r.path)
            .filter(|p| !p.contains('*') && !p.contains(':'))
            .map(|p| format!("{}{}", base_url, p.strip_prefix('/').unwrap_or(&p))),
    )
}

#[derive(Clone)]
pub struct RouterScanner {
    session: Arc<ScanSession>,
    pages: Arc<dyn PageController>,
    /// Shared by target loads and route checks
    tabs: Arc<Semaphore>,
    progress_callback: Option<ProgressCallback>,
}

impl RouterScanner {
    pub fn new(session: Arc<ScanSession>, pages: Arc<dyn PageController>) -> Self {
        let tabs = session.settings.tabs.max(1);
        Self {
            session,
            pages,
            tabs: Arc::new(Semaphore::new(tabs)),
            progress_callback: None,
        }
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub async fn run(&self, targets: Vec<String>) {
        info!("Route scan of {} targets with {} tabs", targets.len(), self.session.settings.tabs);

        let target_slots = Arc::new(Semaphore::new(self.session.settings.tabs.max(1)));
        let mut workers = JoinSet::new();

        for target in targets {
            if self.session.is_shutting_down() {
                info!("Shutdown requested, no new route targets");
                break;
            }
            let Ok(permit) = target_slots.clone().acquire_owned().await else {
                break;
            };
            let scanner = self.clone();
            workers.spawn(async move {
                let _permit = permit;
                let outcome = scanner.scan_target(&target).await;
                info!("Route scan of {} finished: {:?}", target, outcome);
            });
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                warn!("Route worker failed: {}", e);
            }
        }
    }

    pub async fn scan_target(&self, url: &str) -> TargetOutcome {
        if let Some(ref callback) = self.progress_callback {
            callback(url);
        }

        // Load + HarvestRoutes
        let target = match self.load(url).await {
            Ok(target) => target,
            Err(e) => {
                warn!("Can not load {}: {}", url, e);
                return TargetOutcome::Unreachable;
            }
        };
        if target.subs.is_empty() {
            debug!("No routes found on {}", url);
            return TargetOutcome::NoRoutes;
        }

        // PrepareChecks
        let screenshot_dir = self.session.screenshot_dir(url);
        if let Err(e) = tokio::fs::create_dir_all(&screenshot_dir).await {
            warn!("Can not create {}: {}", screenshot_dir.display(), e);
            return TargetOutcome::Unreachable;
        }
        let items: Vec<RouteCheckItem> = target
            .subs
            .iter()
            .map(|sub| RouteCheckItem::new(sub, &target))
            .collect();
        info!("Checking {} routes of {}", items.len(), url);

        // FanOutChecks
        let screenshot_dir = Arc::new(screenshot_dir);
        let mut checks = JoinSet::new();
        for mut item in items {
            if self.session.is_shutting_down() {
                info!("Shutdown requested, no new route checks for {}", url);
                break;
            }
            let Ok(permit) = self.tabs.clone().acquire_owned().await else {
                break;
            };
            let scanner = self.clone();
            let dir = screenshot_dir.clone();
            checks.spawn(async move {
                let _permit = permit;
                scanner.check_route(&mut item, &dir).await
            });
        }

        let (mut routes, mut broken) = (0, 0);
        while let Some(joined) = checks.join_next().await {
            match joined {
                Ok(RouteOutcome::Broken) => {
                    routes += 1;
                    broken += 1;
                }
                Ok(RouteOutcome::NotBroken) => routes += 1,
                Ok(RouteOutcome::Unreachable) => {}
                Err(e) => warn!("Route check of {} failed: {}", url, e),
            }
        }

        TargetOutcome::Checked { routes, broken }
    }

    /// Render the target once, record where it lands and harvest its routes.
    pub async fn load(&self, url: &str) -> Result<Target> {
        let _permit = self
            .tabs
            .acquire()
            .await
            .map_err(|e| ScanError::Other(e.to_string()))?;

        let page = self.pages.open(BLANK_PAGE).await?;
        let loaded = tokio::time::timeout(self.session.settings.route_timeout, self.render(page.as_ref(), url)).await;
        page.close().await;

        let (index_url, routes) = match loaded {
            Ok(result) => result?,
            Err(_) => {
                return Err(ScanError::Timeout(self.session.settings.route_timeout.as_secs(), url.to_string()));
            }
        };

        let base_url = route_base_url(&index_url);
        let (base_uri, token) = tokenize(&index_url);
        let base_token = if token == NO_REDIRECT { base_url.clone() } else { token };

        Ok(Target {
            url: url.to_string(),
            subs: harvest_routes(&base_url, routes),
            index_url,
            base_uri,
            base_token,
        })
    }

    async fn render(&self, page: &dyn PageHandle, url: &str) -> Result<(String, serde_json::Value)> {
        page.navigate(url, self.session.settings.navigate_timeout).await?;
        tokio::time::sleep(self.session.settings.settle_delay).await;

        let href = page.current_href().await?;
        let routes = page.eval(ROUTES_SCRIPT).await?;
        Ok((href, routes))
    }

    /// One route in its own tab. The tab is closed whatever the outcome.
    pub async fn check_route(&self, item: &mut RouteCheckItem, screenshot_dir: &Path) -> RouteOutcome {
        let page = match self.pages.open(BLANK_PAGE).await {
            Ok(page) => page,
            Err(e) => {
                warn!("Can not open tab for {}: {}", item.route_url, e);
                return RouteOutcome::Unreachable;
            }
        };

        // Only reaching the route is raced; a confirmed finding is always recorded
        let route_timeout = self.session.settings.route_timeout;
        let outcome = match tokio::time::timeout(route_timeout, self.land(page.as_ref(), item)).await {
            Ok(Ok(())) => self.classify(page.as_ref(), item, screenshot_dir).await,
            Ok(Err(e)) => {
                warn!("Connection to {} failed: {}", item.route_url, e);
                RouteOutcome::Unreachable
            }
            Err(_) => {
                warn!("{}", ScanError::Timeout(route_timeout.as_secs(), item.route_url.clone()));
                RouteOutcome::Unreachable
            }
        };

        page.close().await;
        outcome
    }

    /// Navigate and record where the route ends up.
    async fn land(&self, page: &dyn PageHandle, item: &mut RouteCheckItem) -> Result<()> {
        page.navigate(&item.route_url, self.session.settings.navigate_timeout).await?;
        tokio::time::sleep(self.session.settings.settle_delay).await;

        let href = page.current_href().await?;
        let (base, token) = tokenize(&href);
        item.observed_href = href;
        item.observed_base = base;
        item.observed_token = token;
        Ok(())
    }

    async fn classify(&self, page: &dyn PageHandle, item: &mut RouteCheckItem, screenshot_dir: &Path) -> RouteOutcome {
        if !is_broken_access(
            &item.observed_token,
            &item.observed_base,
            &item.observed_href,
            &item.expected_first_visit_href,
        ) {
            debug!("{} landed on {}", item.route_url, item.observed_href);
            return RouteOutcome::NotBroken;
        }

        match self
            .session
            .record_broken_route(page, screenshot_dir, &item.parent_url, &item.route_url, &item.observed_href)
            .await
        {
            Ok(screenshot) => {
                item.screenshot = Some(screenshot);
                RouteOutcome::Broken
            }
            Err(e) => {
                warn!("Can not capture {}: {}", item.route_url, e);
                RouteOutcome::Unreachable
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::ExtractorRegistry;
    use crate::page::HREF_SCRIPT;
    use crate::result::ScanResult;
    use crate::session::ScanSettings;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::{mpsc, watch};

    /// In-memory browser. Navigating to the target lands on `first_href`;
    /// navigating to a route lands wherever `landings` says, or on itself.
    #[derive(Default)]
    struct FakeBrowser {
        target: String,
        first_href: String,
        routes: serde_json::Value,
        landings: HashMap<String, String>,
        failing: HashSet<String>,
        hanging: HashSet<String>,
        nav_delay: Duration,
        shot_delay: Duration,
        open_tabs: AtomicUsize,
        max_open_tabs: AtomicUsize,
        navigations: AtomicUsize,
    }

    struct FakePage {
        browser: Arc<FakeBrowser>,
        href: Mutex<String>,
    }

    struct FakeController(Arc<FakeBrowser>);

    #[async_trait]
    impl PageController for FakeController {
        async fn open(&self, url: &str) -> Result<Box<dyn PageHandle>> {
            let open = self.0.open_tabs.fetch_add(1, Ordering::SeqCst) + 1;
            self.0.max_open_tabs.fetch_max(open, Ordering::SeqCst);
            Ok(Box::new(FakePage {
                browser: self.0.clone(),
                href: Mutex::new(url.to_string()),
            }))
        }
    }

    #[async_trait]
    impl PageHandle for FakePage {
        async fn navigate(&self, url: &str, _timeout: Duration) -> Result<()> {
            self.browser.navigations.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.browser.nav_delay).await;
            if self.browser.hanging.contains(url) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if self.browser.failing.contains(url) {
                return Err(ScanError::BrowserError("net::ERR_NAME_NOT_RESOLVED".to_string()));
            }
            let landing = if url == self.browser.target {
                self.browser.first_href.clone()
            } else {
                self.browser.landings.get(url).cloned().unwrap_or_else(|| url.to_string())
            };
            *self.href.lock().unwrap() = landing;
            Ok(())
        }

        async fn eval(&self, script: &str) -> Result<serde_json::Value> {
            if script == HREF_SCRIPT {
                Ok(json!(self.href.lock().unwrap().clone()))
            } else {
                Ok(self.browser.routes.clone())
            }
        }

        async fn screenshot(&self, path: &Path) -> Result<()> {
            tokio::time::sleep(self.browser.shot_delay).await;
            std::fs::write(path, b"png")?;
            Ok(())
        }

        async fn close(self: Box<Self>) {
            self.browser.open_tabs.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn settings(report_dir: &Path, tabs: usize) -> ScanSettings {
        ScanSettings {
            tabs,
            report_dir: report_dir.to_path_buf(),
            route_timeout: Duration::from_millis(500),
            navigate_timeout: Duration::from_millis(200),
            settle_delay: Duration::ZERO,
            ..ScanSettings::default()
        }
    }

    fn scanner(
        browser: Arc<FakeBrowser>,
        settings: ScanSettings,
    ) -> (RouterScanner, mpsc::Receiver<ScanResult>, watch::Sender<bool>) {
        let (tx, rx) = mpsc::channel(256);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let session = ScanSession::new(ExtractorRegistry::new(), None, settings, tx, shutdown_rx);
        let scanner = RouterScanner::new(Arc::new(session), Arc::new(FakeController(browser)));
        (scanner, rx, shutdown_tx)
    }

    async fn collect(mut rx: mpsc::Receiver<ScanResult>) -> Vec<ScanResult> {
        let mut results = Vec::new();
        while let Some(result) = rx.recv().await {
            results.push(result);
        }
        results
    }

    fn spa(routes: serde_json::Value) -> FakeBrowser {
        FakeBrowser {
            target: "https://x.com/".to_string(),
            first_href: "https://x.com/#/home".to_string(),
            routes,
            ..FakeBrowser::default()
        }
    }

    #[test]
    fn test_harvest_routes_filters_and_joins() {
        let routes = json!([
            {"path": "/admin"},
            {"path": "/user/:id"},
            {"path": "*"},
            {"path": "settings/profile"},
            {"path": "/admin"},
            {"name": "no-path"}
        ]);
        assert_eq!(
            harvest_routes("https://x.com/#/", routes),
            vec![
                "https://x.com/#/admin".to_string(),
                "https://x.com/#/settings/profile".to_string()
            ]
        );
    }

    #[test]
    fn test_harvest_routes_unexpected_shape() {
        assert!(harvest_routes("https://x.com/#/", json!({"path": "/a"})).is_empty());
        assert!(harvest_routes("https://x.com/#/", json!(null)).is_empty());
    }

    #[tokio::test]
    async fn test_load_records_first_visit() {
        let dir = TempDir::new().unwrap();
        let browser = Arc::new(spa(json!([{"path": "/admin"}, {"path": "/home"}])));
        let (scanner, _rx, _shutdown) = scanner(browser.clone(), settings(dir.path(), 2));

        let target = scanner.load("https://x.com/").await.unwrap();
        assert_eq!(target.index_url, "https://x.com/#/home");
        assert_eq!(target.base_uri, "https://x.com/#/home");
        assert_eq!(target.base_token, "https://x.com/#/");
        assert_eq!(
            target.subs,
            vec!["https://x.com/#/admin".to_string(), "https://x.com/#/home".to_string()]
        );
        assert_eq!(browser.open_tabs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_route_scenario_reports_only_unguarded_route() {
        let dir = TempDir::new().unwrap();
        let mut browser = spa(json!([{"path": "/admin"}, {"path": "/home"}]));
        browser
            .landings
            .insert("https://x.com/#/admin".to_string(), "https://x.com/#/login".to_string());
        let browser = Arc::new(browser);
        let (scanner, rx, _shutdown) = scanner(browser.clone(), settings(dir.path(), 2));

        let outcome = scanner.scan_target("https://x.com/").await;
        assert_eq!(outcome, TargetOutcome::Checked { routes: 2, broken: 1 });
        drop(scanner);

        let results = collect(rx).await;
        assert_eq!(results.len(), 1);
        let ScanResult::BrokenRoute(ref broken) = results[0] else {
            panic!("expected a broken route, got {:?}", results[0]);
        };
        assert_eq!(broken.parent_url, "https://x.com/");
        assert_eq!(broken.route_url, "https://x.com/#/admin");
        assert_eq!(broken.observed_href, "https://x.com/#/login");

        let expected = dir.path().join("vue_reports").join("x.com").join("resources").join("1.png");
        assert_eq!(broken.screenshot, expected);
        assert!(expected.exists());
        assert_eq!(browser.open_tabs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_redirected_route_not_reported() {
        let dir = TempDir::new().unwrap();
        let mut browser = spa(json!([{"path": "/admin"}]));
        browser.landings.insert(
            "https://x.com/#/admin".to_string(),
            "https://x.com/#/login?redirect=%2Fadmin".to_string(),
        );
        let (scanner, rx, _shutdown) = scanner(Arc::new(browser), settings(dir.path(), 2));

        let outcome = scanner.scan_target("https://x.com/").await;
        assert_eq!(outcome, TargetOutcome::Checked { routes: 1, broken: 0 });
        drop(scanner);
        assert!(collect(rx).await.is_empty());
    }

    #[tokio::test]
    async fn test_blank_landing_not_reported() {
        let dir = TempDir::new().unwrap();
        let mut browser = spa(json!([{"path": "/admin"}]));
        browser
            .landings
            .insert("https://x.com/#/admin".to_string(), BLANK_PAGE.to_string());
        let (scanner, rx, _shutdown) = scanner(Arc::new(browser), settings(dir.path(), 2));

        scanner.scan_target("https://x.com/").await;
        drop(scanner);
        assert!(collect(rx).await.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_target() {
        let dir = TempDir::new().unwrap();
        let mut browser = spa(json!([{"path": "/admin"}]));
        browser.failing.insert("https://x.com/".to_string());
        let browser = Arc::new(browser);
        let (scanner, _rx, _shutdown) = scanner(browser.clone(), settings(dir.path(), 2));

        assert_eq!(scanner.scan_target("https://x.com/").await, TargetOutcome::Unreachable);
        assert_eq!(browser.open_tabs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_no_routes() {
        let dir = TempDir::new().unwrap();
        let browser = Arc::new(spa(json!([{"path": "*"}])));
        let (scanner, _rx, _shutdown) = scanner(browser, settings(dir.path(), 2));

        assert_eq!(scanner.scan_target("https://x.com/").await, TargetOutcome::NoRoutes);
        assert!(!dir.path().join("vue_reports").exists());
    }

    #[tokio::test]
    async fn test_failing_and_hanging_routes_are_isolated() {
        let dir = TempDir::new().unwrap();
        let mut browser = spa(json!([{"path": "/a"}, {"path": "/b"}, {"path": "/c"}]));
        browser.failing.insert("https://x.com/#/a".to_string());
        browser.hanging.insert("https://x.com/#/b".to_string());
        let browser = Arc::new(browser);
        let (scanner, rx, _shutdown) = scanner(browser.clone(), settings(dir.path(), 3));

        let outcome = scanner.scan_target("https://x.com/").await;
        assert_eq!(outcome, TargetOutcome::Checked { routes: 1, broken: 1 });
        assert_eq!(browser.open_tabs.load(Ordering::SeqCst), 0);
        drop(scanner);

        let results = collect(rx).await;
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_open_tabs_never_exceed_pool() {
        let dir = TempDir::new().unwrap();
        let routes: Vec<_> = (0..12).map(|i| json!({"path": format!("/page{}", i)})).collect();
        let mut browser = spa(json!(routes));
        browser.nav_delay = Duration::from_millis(20);
        let browser = Arc::new(browser);
        let (scanner, rx, _shutdown) = scanner(browser.clone(), settings(dir.path(), 3));

        scanner
            .run(vec!["https://x.com/".to_string(), "https://x.com/".to_string()])
            .await;

        assert!(browser.max_open_tabs.load(Ordering::SeqCst) <= 3);
        // Two loads plus twelve routes per target
        assert_eq!(browser.navigations.load(Ordering::SeqCst), 26);
        assert_eq!(browser.open_tabs.load(Ordering::SeqCst), 0);
        drop(scanner);

        let results = collect(rx).await;
        assert_eq!(results.len(), 24);
        let mut shots: Vec<_> = results
            .iter()
            .filter_map(|r| match r {
                ScanResult::BrokenRoute(b) => Some(b.screenshot.clone()),
                _ => None,
            })
            .collect();
        shots.sort();
        shots.dedup();
        assert_eq!(shots.len(), 24);
    }

    #[tokio::test]
    async fn test_shutdown_stops_intake() {
        let dir = TempDir::new().unwrap();
        let browser = Arc::new(spa(json!([{"path": "/admin"}])));
        let (scanner, _rx, shutdown) = scanner(browser.clone(), settings(dir.path(), 2));
        shutdown.send(true).unwrap();

        scanner.run(vec!["https://x.com/".to_string()]).await;
        assert_eq!(browser.navigations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_queued_screenshots_not_lost_to_route_timeout() {
        let dir = TempDir::new().unwrap();
        let routes: Vec<_> = (0..4).map(|i| json!({"path": format!("/open{}", i)})).collect();
        let mut browser = spa(json!(routes));
        browser.shot_delay = Duration::from_millis(300);
        let settings = ScanSettings {
            route_timeout: Duration::from_millis(700),
            ..settings(dir.path(), 4)
        };
        let (scanner, rx, _shutdown) = scanner(Arc::new(browser), settings);

        let outcome = scanner.scan_target("https://x.com/").await;
        assert_eq!(outcome, TargetOutcome::Checked { routes: 4, broken: 4 });
        drop(scanner);
        assert_eq!(collect(rx).await.len(), 4);
    }
}
