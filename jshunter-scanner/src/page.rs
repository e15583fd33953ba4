//! Browser capability consumed by the route pipeline.
//!
//! The scanner never talks to a browser directly. `jshunter-core` provides a
//! Chromium implementation; tests use in-memory fakes.

use crate::error::{Result, ScanError};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

/// Script returning the tab's current location.
pub const HREF_SCRIPT: &str = "() => window.location.href";

#[async_trait]
pub trait PageController: Send + Sync {
    /// Open a new tab on `url` and wait for it to load.
    async fn open(&self, url: &str) -> Result<Box<dyn PageHandle>>;
}

/// One open tab.
#[async_trait]
pub trait PageHandle: Send + Sync {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()>;

    /// Evaluate a function expression and return its JSON value.
    async fn eval(&self, script: &str) -> Result<serde_json::Value>;

    async fn screenshot(&self, path: &Path) -> Result<()>;

    async fn close(self: Box<Self>);

    async fn current_href(&self) -> Result<String> {
        match self.eval(HREF_SCRIPT).await? {
            serde_json::Value::String(href) => Ok(href),
            other => Err(ScanError::ParseError(format!("Unexpected href value: {}", other))),
        }
    }
}
