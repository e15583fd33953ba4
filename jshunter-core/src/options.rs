use crate::error::{CoreError, Result};
use jshunter_scanner::ScanSettings;
use jshunter_scanner::http::HttpSettings;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Which pipelines a run starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanType {
    Endpoints,
    Routes,
    Both,
}

impl ScanType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "endpoints" | "endpoint" | "ed" => Some(ScanType::Endpoints),
            "routes" | "route" | "vue" => Some(ScanType::Routes),
            "both" | "all" => Some(ScanType::Both),
            _ => None,
        }
    }

    pub fn includes_endpoints(&self) -> bool {
        matches!(self, ScanType::Endpoints | ScanType::Both)
    }

    pub fn includes_routes(&self) -> bool {
        matches!(self, ScanType::Routes | ScanType::Both)
    }
}

/// Generator backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AiSource {
    Gemini,
}

impl AiSource {
    /// `none` parses as `Some(None)`; unknown names as `None`.
    pub fn from_str(s: &str) -> Option<Option<Self>> {
        match s.to_lowercase().as_str() {
            "gemini" => Some(Some(AiSource::Gemini)),
            "none" | "" => Some(None),
            _ => None,
        }
    }
}

/// Everything a run needs, as parsed from the command line.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub targets: Vec<String>,
    pub scan_type: ScanType,
    pub threads: usize,
    pub tabs: usize,
    pub timeout_secs: u64,
    pub proxy: Option<String>,
    /// Display the browser window while scanning
    pub headless: bool,
    pub ai: Option<AiSource>,
    pub ai_timeout_secs: u64,
    /// Dotenv file read for generator credentials
    pub env_file: Option<PathBuf>,
    pub report_dir: PathBuf,
    /// JSON-lines results file
    pub output: Option<PathBuf>,
    pub debug: bool,
    pub show_progress: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            scan_type: ScanType::Both,
            threads: 30,
            tabs: 10,
            timeout_secs: 10,
            proxy: None,
            headless: false,
            ai: None,
            ai_timeout_secs: 120,
            env_file: Some(PathBuf::from(".env")),
            report_dir: PathBuf::from("reports"),
            output: None,
            debug: false,
            show_progress: false,
        }
    }
}

impl ScanOptions {
    pub fn validate(&self) -> Result<()> {
        if self.targets.is_empty() {
            return Err(CoreError::InvalidOptions("at least one target is required".to_string()));
        }
        if self.threads == 0 {
            return Err(CoreError::InvalidOptions("threads must be at least 1".to_string()));
        }
        if self.tabs == 0 {
            return Err(CoreError::InvalidOptions("tabs must be at least 1".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(CoreError::InvalidOptions("timeout must be at least 1 second".to_string()));
        }
        Ok(())
    }

    /// Pipeline settings derived from these options.
    pub fn scan_settings(&self) -> ScanSettings {
        ScanSettings {
            http: HttpSettings {
                timeout_secs: self.timeout_secs,
                proxy: self.proxy.clone(),
                ..HttpSettings::default()
            },
            threads: self.threads,
            tabs: self.tabs,
            report_dir: self.report_dir.clone(),
            ai_timeout: Duration::from_secs(self.ai_timeout_secs),
            ..ScanSettings::default()
        }
    }
}
