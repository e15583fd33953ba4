use jshunter_scanner::ScanError;
use thiserror::Error;

/// Failures that stop a run before any target is scanned.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error("No extractors registered")]
    NoExtractors,

    #[error("Generator unavailable: {0}")]
    Generator(String),

    #[error("Browser unavailable: {0}")]
    Browser(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Scan(#[from] ScanError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
