//! Gemini-backed endpoint generator.
//!
//! Talks to the `generateContent` REST endpoint. Long answers are collected
//! over several turns: the model is asked to finish with [`GENERATE_TAG`] and
//! is told to continue until it does.

use crate::error::{CoreError, Result};
use async_trait::async_trait;
use jshunter_scanner::endpoint::{EndpointCandidate, parse_generated};
use jshunter_scanner::{Generator, ScanError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

pub const GENERATE_TAG: &str = "---END_OF_GENERATE---";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Upper bound on "continue" turns for one batch.
const MAX_TURNS: usize = 8;

const PROMPT_TEMPLATE: &str = r#"As a bug bounty hunter, analyze the JavaScript snippets below, taken from a web application's front-end, and extract every API endpoint together with its parameters.

Examples:
<input>i.get("/api/stripe/save").</input>
<output>{"path":"/api/stripe/save","method":"GET","query":"","data":""}</output>
<input>i.get("/api/public/trainingcard/type/get",{ids:C.product_id}).</input>
<output>{"path":"/api/public/trainingcard/type/get","method":"GET","query":"ids=11234","data":""}</output>
<input>i.get("/api/homepage/revision/get",{homepage_id:this.$root.homepage_id,id:t}).</input>
<output>{"path":"/api/homepage/revision/get","method":"GET","query":"homepage_id=1&id=123123","data":""}</output>

Parameters given as variables (like "id:t") must be replaced with plausible concrete values. Skip snippets that are not requests. When the same endpoint appears more than once keep the item that carries query or data.

Answer with a JSON array only, each item shaped as {"path":"","method":"","query":"","data":""}, with no other commentary. Output '---END_OF_GENERATE---' as the end signal.

<input>
{SNIPPETS}
</input>
"#;

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub proxy: Option<String>,
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl GeminiConfig {
    /// Process environment first, then the dotenv file at `env_file` when it exists.
    pub fn from_env_file(env_file: Option<&Path>) -> Result<Self> {
        let file_vars = match env_file {
            Some(path) => read_env_file(path)?,
            None => HashMap::new(),
        };
        Ok(Self::from_lookup(|key| {
            std::env::var(key)
                .ok()
                .filter(|v| !v.is_empty())
                .or_else(|| file_vars.get(key).cloned())
        }))
    }

    /// `GEMINI_API_KEY` is required; `GEMINI_MODEL` and `GEMINI_PROXY` are optional.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str, alias: &str| lookup(key).or_else(|| lookup(alias)).filter(|v| !v.is_empty());

        Self {
            api_key: var("GEMINI_API_KEY", "Gemini_API_KEY").unwrap_or_default(),
            model: var("GEMINI_MODEL", "Gemini_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            proxy: var("GEMINI_PROXY", "Gemini_PROXY"),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: 120,
        }
    }
}

/// Variables of a dotenv file. A missing file reads as empty.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let parse_error = |e: dotenvy::Error| CoreError::Generator(format!("{}: {}", path.display(), e));

    let lines = match dotenvy::from_path_iter(path) {
        Ok(lines) => lines,
        Err(e) if e.not_found() => {
            debug!("No env file at {}", path.display());
            return Ok(HashMap::new());
        }
        Err(e) => return Err(parse_error(e)),
    };
    lines.map(|line| line.map_err(parse_error)).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: &'a [Content],
    safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

impl Content {
    fn user(text: &str) -> Self {
        Self {
            role: "user".to_string(),
            parts: vec![Part { text: text.to_string() }],
        }
    }

    fn model(text: &str) -> Self {
        Self {
            role: "model".to_string(),
            parts: vec![Part { text: text.to_string() }],
        }
    }
}

pub struct GeminiGenerator {
    client: Client,
    config: GeminiConfig,
}

impl GeminiGenerator {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(true);
        if let Some(ref proxy) = config.proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| CoreError::Generator(format!("Invalid proxy '{}': {}", proxy, e)))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| CoreError::Generator(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// One `generateContent` round trip; returns the first candidate's text.
    async fn send(&self, contents: &[Content]) -> jshunter_scanner::error::Result<String> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model
        );
        let request = GenerateRequest {
            contents,
            safety_settings: [
                "HARM_CATEGORY_HARASSMENT",
                "HARM_CATEGORY_HATE_SPEECH",
                "HARM_CATEGORY_DANGEROUS_CONTENT",
                "HARM_CATEGORY_SEXUALLY_EXPLICIT",
            ]
            .into_iter()
            .map(|category| SafetySetting {
                category,
                threshold: "BLOCK_NONE",
            })
            .collect(),
        };

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScanError::GeneratorError(format!("Gemini returned {}: {}", status, body)));
        }

        let parsed: GenerateResponse = response.json().await?;
        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| ScanError::GeneratorError("Gemini generated no content".to_string()))
    }
}

/// Strip the end tag and markdown fences from one turn. Returns the cleaned
/// text and whether the end tag was present.
fn clean_turn(text: &str) -> (String, bool) {
    let finished = text.contains(GENERATE_TAG);
    let text = text.replace(GENERATE_TAG, "");
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    let text = text.strip_suffix("```").unwrap_or(text);
    (text.to_string(), finished)
}

#[async_trait]
impl Generator for GeminiGenerator {
    fn name(&self) -> &str {
        "Gemini"
    }

    async fn authenticate(&self) -> jshunter_scanner::error::Result<()> {
        if self.config.api_key.is_empty() {
            return Err(ScanError::GeneratorError("gemini api key can not be empty".to_string()));
        }
        self.send(&[Content::user("This is a api connection test.")])
            .await
            .map_err(|e| {
                ScanError::GeneratorError(format!(
                    "gemini api key can't work, please make sure the key is still alive: {}",
                    e
                ))
            })?;
        Ok(())
    }

    async fn generate(&self, batch: &str) -> jshunter_scanner::error::Result<Vec<EndpointCandidate>> {
        let prompt = PROMPT_TEMPLATE.replace("{SNIPPETS}", batch);
        let mut history = vec![Content::user(&prompt)];
        let mut generated = String::new();

        for turn in 0..MAX_TURNS {
            let text = self.send(&history).await?;
            let (cleaned, finished) = clean_turn(&text);
            generated.push_str(&cleaned);
            if finished {
                break;
            }
            if turn + 1 == MAX_TURNS {
                warn!("Gemini did not finish after {} turns", MAX_TURNS);
                break;
            }
            history.push(Content::model(&text));
            history.push(Content::user("Continue generate"));
        }

        debug!("Gemini generated: {}", generated);
        parse_generated(&generated)
    }
}
