//! Generative endpoint inference.

use crate::endpoint::EndpointCandidate;
use crate::error::Result;
use async_trait::async_trait;

/// Snippets sent per generation call.
pub const BATCH_SIZE: usize = 20;

/// Turns JS request snippets into endpoint candidates.
#[async_trait]
pub trait Generator: Send + Sync {
    fn name(&self) -> &str;

    /// Verify credentials. Called once before any scan starts.
    async fn authenticate(&self) -> Result<()>;

    /// `batch` holds at most [`BATCH_SIZE`] newline-joined snippets.
    async fn generate(&self, batch: &str) -> Result<Vec<EndpointCandidate>>;
}

/// Split snippets into newline-joined batches of at most [`BATCH_SIZE`].
pub fn batches(snippets: &[String]) -> Vec<String> {
    snippets
        .chunks(BATCH_SIZE)
        .map(|chunk| chunk.join("\n"))
        .collect()
}
