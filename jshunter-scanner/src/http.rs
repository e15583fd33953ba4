use crate::endpoint::{EndpointCandidate, join_base};
use crate::error::{Result, ScanError};
use crate::result::{BODY_EXCERPT_CHARS, EndpointProbeResult};
use reqwest::{Client, Method};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::debug;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Settings applied to every outbound request.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub proxy: Option<String>,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            proxy: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// A fetched response with its body already read.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub status_code: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl FetchedPage {
    pub fn is_javascript(&self) -> bool {
        self.content_type
            .as_ref()
            .map(|ct| {
                let ct = ct.to_lowercase();
                ct.contains("javascript") || ct.contains("ecmascript")
            })
            .unwrap_or(false)
    }
}

#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    /// Shared by every clone; `None` means unbounded
    in_flight: Option<Arc<Semaphore>>,
}

impl HttpClient {
    pub fn new(settings: &HttpSettings) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(Duration::from_secs(settings.timeout_secs))
            .connect_timeout(Duration::from_secs(settings.timeout_secs.div_ceil(2)))
            .pool_idle_timeout(Duration::from_secs(90))
            .danger_accept_invalid_certs(true)
            .redirect(reqwest::redirect::Policy::limited(3));

        if let Some(ref proxy) = settings.proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| ScanError::InvalidUrl(format!("Invalid proxy '{}': {}", proxy, e)))?;
            builder = builder.proxy(proxy);
        }

        Ok(Self {
            client: builder.build()?,
            in_flight: None,
        })
    }

    /// Bound concurrent requests across this client and all of its clones.
    pub fn with_request_limit(mut self, permits: usize) -> Self {
        self.in_flight = Some(Arc::new(Semaphore::new(permits.max(1))));
        self
    }

    async fn permit(&self) -> Result<Option<SemaphorePermit<'_>>> {
        match self.in_flight {
            Some(ref limit) => limit
                .acquire()
                .await
                .map(Some)
                .map_err(|e| ScanError::Other(e.to_string())),
            None => Ok(None),
        }
    }

    pub async fn get(&self, url: &str) -> Result<FetchedPage> {
        let _permit = self.permit().await?;
        debug!("Fetching {}", url);

        let response = self
            .client
            .get(url)
            .header("Accept-Charset", "utf-8")
            .send()
            .await?;

        let status_code = response.status().as_u16();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = response.text().await?;

        Ok(FetchedPage {
            url: url.to_string(),
            status_code,
            content_type,
            body,
        })
    }

    /// Issue the single request a candidate describes against `base`.
    pub async fn probe(&self, base: &str, candidate: &EndpointCandidate) -> Result<EndpointProbeResult> {
        let url = candidate_url(base, candidate);
        let method = Method::from_bytes(candidate.method.as_bytes())
            .map_err(|e| ScanError::ParseError(format!("Invalid method '{}': {}", candidate.method, e)))?;

        let _permit = self.permit().await?;
        debug!("Probing [{}] {}", method, url);

        let mut request = self.client.request(method.clone(), &url);
        if !candidate.data.is_empty() {
            request = request
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(candidate.data.clone());
        }

        let response = request.send().await?;
        let status_code = response.status().as_u16();
        let response_headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.bytes().await?;

        Ok(EndpointProbeResult {
            url,
            path: candidate.path.clone(),
            method: method.to_string(),
            status_code,
            content_length: body.len(),
            response_headers,
            body_excerpt: excerpt(&String::from_utf8_lossy(&body), BODY_EXCERPT_CHARS),
        })
    }
}

/// First `max_chars` characters of `text`, marked when cut.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}\n... [truncated]", &text[..end]),
        None => text.to_string(),
    }
}

/// Absolute request URL for a candidate, query string included.
pub fn candidate_url(base: &str, candidate: &EndpointCandidate) -> String {
    let mut url = if candidate.path.starts_with("http://") || candidate.path.starts_with("https://") {
        candidate.path.clone()
    } else {
        join_base(base, &candidate.path)
    };

    let query = candidate.query.trim_start_matches('?');
    if !query.is_empty() {
        url.push(if url.contains('?') { '&' } else { '?' });
        url.push_str(query);
    }
    url
}
