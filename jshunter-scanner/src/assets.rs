use scraper::{Html, Selector};
use std::collections::HashSet;
use tracing::debug;
use url::Url;

/// Third-party hosts never treated as the target's own asset location.
const BLOCKED_ASSET_DOMAINS: &[&str] = &[
    "googleapis.com",
    "gstatic.com",
    "cdnjs.cloudflare.com",
    "jsdelivr.net",
    "unpkg.com",
    "bootcdn.net",
    "baidu.com",
    "google-analytics.com",
    "googletagmanager.com",
];

/// JS references found on a page.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct JsAssets {
    /// `<script src>` and `<link href>` values ending in `.js`, first-seen order
    pub paths: Vec<String>,
    /// First absolute JS URL on the same host as the page
    pub complete_url: Option<String>,
}

impl JsAssets {
    pub fn first_relative(&self) -> Option<&str> {
        self.paths
            .iter()
            .map(String::as_str)
            .find(|p| !is_absolute(p))
    }
}

pub fn is_absolute(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://")
}

pub fn extract_js_assets(page_url: &str, html: &str) -> JsAssets {
    // Commented-out tags still point at deployed assets
    let html = html.replace("<!--", "").replace("-->", "");
    let document = Html::parse_document(&html);
    let page_host = Url::parse(page_url).ok().and_then(|u| u.host_str().map(str::to_string));

    let script_selector = Selector::parse("script[src]").unwrap();
    let link_selector = Selector::parse("link[href]").unwrap();

    let mut assets = JsAssets::default();
    let mut seen = HashSet::new();

    for element in document.select(&script_selector) {
        let Some(src) = element.value().attr("src") else {
            continue;
        };
        debug!("Script src={}", src);
        if !src.ends_with(".js") {
            continue;
        }
        if assets.complete_url.is_none() && is_same_host_asset(src, page_host.as_deref()) {
            assets.complete_url = Some(src.to_string());
        }
        if seen.insert(src.to_string()) {
            assets.paths.push(src.to_string());
        }
    }

    for element in document.select(&link_selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        debug!("Link href={}", href);
        if href.ends_with(".js") && seen.insert(href.to_string()) {
            assets.paths.push(href.to_string());
        }
    }

    assets
}

fn is_same_host_asset(src: &str, page_host: Option<&str>) -> bool {
    if !is_absolute(src) || BLOCKED_ASSET_DOMAINS.iter().any(|d| src.contains(d)) {
        return false;
    }
    match (Url::parse(src).ok(), page_host) {
        (Some(asset), Some(host)) => asset.host_str() == Some(host),
        _ => false,
    }
}

/// Deduplicate by exact string, keeping first-seen order.
pub fn unique_in_order<I>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
