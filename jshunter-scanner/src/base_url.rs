//! Deployment base URL inference.
//!
//! Two strategies, tried in order:
//!
//! 1. A same-host absolute JS URL exists on the page: the longest common
//!    substring of the target URL and that asset URL is the base.
//!    `http://example.com/login` + `http://example.com/js/app.main.js`
//!    gives `http://example.com/`.
//! 2. Otherwise the first relative JS path is requested under the origin
//!    and then under each cumulative prefix of the target path; the first
//!    location serving it wins. For `http://example.com/index/login` and
//!    `./src/js/app.js`, `http://example.com/src/js/app.js` is tried before
//!    `http://example.com/index/src/js/app.js`.

use crate::assets::JsAssets;
use crate::endpoint::join_base;
use crate::http::HttpClient;
use tracing::{debug, warn};
use url::Url;

/// Classic dynamic-programming longest common substring.
///
/// Returns the length in characters and the first maximal match scanning `a`
/// left to right.
pub fn longest_common_substring(a: &str, b: &str) -> (usize, String) {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    let mut max_len = 0;
    let mut end_index = 0;

    for i in 1..=a.len() {
        for j in 1..=b.len() {
            if a[i - 1] == b[j - 1] {
                curr[j] = prev[j - 1] + 1;
                if curr[j] > max_len {
                    max_len = curr[j];
                    end_index = i;
                }
            } else {
                curr[j] = 0;
            }
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    let matched: String = a[end_index - max_len..end_index].iter().collect();
    (max_len, matched)
}

/// Cumulative prefixes of a URL path: `/a/b/c` gives `a`, `a/b`, `a/b/c`.
pub fn path_prefixes(path: &str) -> Vec<String> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    (1..=segments.len())
        .map(|i| segments[..i].join("/"))
        .collect()
}

/// Strategy 1 only; no I/O.
pub fn base_from_complete_url(target: &str, complete_url: &str) -> Option<String> {
    let (len, common) = longest_common_substring(target, complete_url);
    if len == 0 {
        debug!("No common substring between {} and {}", target, complete_url);
        return None;
    }
    Some(common)
}

/// Resolve the base URL for a target, probing with `client` when needed.
///
/// `None` means the target cannot be resolved and should be skipped.
pub async fn resolve_base_url(client: &HttpClient, target: &str, assets: &JsAssets) -> Option<String> {
    if let Some(ref complete_url) = assets.complete_url
        && let Some(base) = base_from_complete_url(target, complete_url)
    {
        return Some(base);
    }

    // Nothing to anchor on; the page itself is still worth scanning
    if assets.paths.is_empty() {
        return Some(target.to_string());
    }

    let first_js = assets.first_relative()?;
    let parsed = match Url::parse(target) {
        Ok(u) => u,
        Err(e) => {
            warn!("Can not parse url {}: {}", target, e);
            return None;
        }
    };
    let origin = parsed.origin().ascii_serialization();

    let root_candidate = join_base(&origin, first_js);
    match client.get(&root_candidate).await {
        Ok(page) if page.status_code == 200 => return Some(origin),
        Ok(page) => debug!("{} returned {}", root_candidate, page.status_code),
        Err(e) => debug!("{} failed: {}", root_candidate, e),
    }

    for prefix in path_prefixes(parsed.path()) {
        let base = format!("{}/{}/", origin, prefix);
        let candidate = join_base(&base, first_js);
        match client.get(&candidate).await {
            Ok(page) if page.status_code == 200 && !page.body.is_empty() && page.is_javascript() => {
                return Some(base);
            }
            Ok(page) => debug!("{} returned {}", candidate, page.status_code),
            Err(e) => debug!("{} failed: {}", candidate, e),
        }
    }

    None
}
