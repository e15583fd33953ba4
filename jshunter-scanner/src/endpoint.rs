use crate::error::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::LazyLock;

static REQUEST_CALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\.(get|post|put|delete|patch)\(\s*["'`]([^"'`]+)["'`]"#).unwrap()
});

/// A hypothesized API call to be probed once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointCandidate {
    pub path: String,
    pub method: String,
    pub query: String,
    pub data: String,
    /// Dedup key over (path, method, query, data)
    pub hash: String,
}

impl EndpointCandidate {
    pub fn new(path: &str, method: &str, query: &str, data: &str) -> Self {
        let method = match method.trim() {
            "" => "GET".to_string(),
            m => m.to_uppercase(),
        };
        let path = path.trim().to_string();
        let query = query.trim().to_string();
        let data = data.trim().to_string();
        let hash = candidate_hash(&path, &method, &query, &data);

        Self {
            path,
            method,
            query,
            data,
            hash,
        }
    }

    pub fn get(path: &str, query: &str) -> Self {
        Self::new(path, "GET", query, "")
    }

    pub fn post(path: &str, data: &str) -> Self {
        Self::new(path, "POST", "", data)
    }
}

/// Stable digest used only for dedup.
pub fn candidate_hash(path: &str, method: &str, query: &str, data: &str) -> String {
    let mut hasher = Sha256::new();
    for field in [path, method, query, data] {
        hasher.update(field.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

/// Generated endpoints arrive as `{path, method, query, data}` objects.
#[derive(Debug, Deserialize)]
struct GeneratedEndpoint {
    #[serde(default)]
    path: String,
    #[serde(default)]
    method: String,
    #[serde(default, alias = "parameter")]
    query: String,
    #[serde(default)]
    data: String,
}

/// Parse a JSON array of generated endpoints, tolerating markdown fences.
pub fn parse_generated(text: &str) -> Result<Vec<EndpointCandidate>> {
    let trimmed = text.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix("```").unwrap_or(trimmed).trim();

    let raw: Vec<GeneratedEndpoint> = serde_json::from_str(trimmed)?;
    Ok(raw
        .into_iter()
        .filter(|e| !e.path.trim().is_empty())
        .map(|e| EndpointCandidate::new(&e.path, &e.method, &e.query, &e.data))
        .collect())
}

/// Derive candidates from extracted request snippets without a generator.
///
/// `a.post("/api/save",{..})` yields a POST, `a.get("/api/x")` a GET, and a
/// bare `/path` snippet a GET.
pub fn candidates_from_snippets(snippets: &[String]) -> Vec<EndpointCandidate> {
    let mut candidates = Vec::new();

    for snippet in snippets {
        let mut matched = false;
        for cap in REQUEST_CALL_RE.captures_iter(snippet) {
            matched = true;
            let method = cap.get(1).map(|m| m.as_str()).unwrap_or("GET");
            if let Some(path) = cap.get(2) {
                let (path, query) = split_query(path.as_str());
                candidates.push(EndpointCandidate::new(path, method, query, ""));
            }
        }

        let trimmed = snippet.trim();
        if !matched && trimmed.starts_with('/') && !trimmed.starts_with("//") {
            let (path, query) = split_query(trimmed);
            candidates.push(EndpointCandidate::get(path, query));
        }
    }

    candidates
}

/// Keep the first candidate per hash.
pub fn unique_candidates(candidates: Vec<EndpointCandidate>) -> Vec<EndpointCandidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| seen.insert(c.hash.clone()))
        .collect()
}

/// Join a base URL and a relative path with exactly one slash between them.
pub fn join_base(base: &str, path: &str) -> String {
    let path = path.strip_prefix("./").unwrap_or(path);
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base, &path[1..]),
        (false, false) if !path.is_empty() => format!("{}/{}", base, path),
        _ => format!("{}{}", base, path),
    }
}

fn split_query(path: &str) -> (&str, &str) {
    match path.split_once('?') {
        Some((p, q)) => (p, q),
        None => (path, ""),
    }
}
