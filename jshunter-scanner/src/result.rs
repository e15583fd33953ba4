use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Upper bound on the response body kept with a probe result.
pub const BODY_EXCERPT_CHARS: usize = 2048;

/// Response summary for one probed endpoint candidate. Severity is left to
/// whoever reads the results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointProbeResult {
    pub url: String,
    pub path: String,
    pub method: String,
    pub status_code: u16,
    pub content_length: usize,
    #[serde(default)]
    pub response_headers: Vec<(String, String)>,
    /// Leading part of the body, see [`BODY_EXCERPT_CHARS`]
    #[serde(default)]
    pub body_excerpt: String,
}

/// A secret-looking string found in a fetched body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitiveFindingResult {
    pub url: String,
    pub message: String,
}

/// A client-side route that rendered without being sent to a guard page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokenRouteResult {
    /// Target the route was harvested from
    pub parent_url: String,
    pub route_url: String,
    pub observed_href: String,
    pub screenshot: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScanResult {
    EndpointProbe(EndpointProbeResult),
    SensitiveFinding(SensitiveFindingResult),
    BrokenRoute(BrokenRouteResult),
}

impl ScanResult {
    pub fn label(&self) -> &'static str {
        match self {
            ScanResult::EndpointProbe(_) => "ENDPOINT",
            ScanResult::SensitiveFinding(_) => "SENSITIVE",
            ScanResult::BrokenRoute(_) => "ROUTE",
        }
    }
}
