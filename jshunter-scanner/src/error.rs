use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Task join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),

    #[error("Browser error: {0}")]
    BrowserError(String),

    #[error("Generator error: {0}")]
    GeneratorError(String),

    #[error("Timed out after {0}s: {1}")]
    Timeout(u64, String),

    #[error("Other error: {0}")]
    Other(String),
}

impl From<serde_json::Error> for ScanError {
    fn from(e: serde_json::Error) -> Self {
        ScanError::ParseError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
