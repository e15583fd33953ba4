//! Pluggable body extractors.
//!
//! An [`ExtractorRegistry`] is built once at startup and handed to the
//! endpoint pipeline; every fetched body runs through every registered
//! extractor.

use crate::patterns::{RequestCallExtractor, SecretKeyExtractor};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractorKind {
    /// Endpoint path snippets, collected and deduplicated per target
    Path,
    /// Secrets, streamed out as findings
    Sensitive,
}

pub trait Extractor: Send + Sync {
    fn name(&self) -> &str;
    fn kind(&self) -> ExtractorKind;
    fn extract(&self, body: &str) -> Vec<String>;
}

/// Matches from one body, split by extractor kind.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Extraction {
    pub paths: Vec<String>,
    pub secrets: Vec<String>,
}

#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    extractors: Vec<Arc<dyn Extractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in secret and request-call extractors.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(SecretKeyExtractor));
        registry.register(Arc::new(RequestCallExtractor::post()));
        registry.register(Arc::new(RequestCallExtractor::get()));
        registry
    }

    pub fn register(&mut self, extractor: Arc<dyn Extractor>) {
        self.extractors.push(extractor);
    }

    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    pub fn names(&self) -> Vec<String> {
        self.extractors.iter().map(|e| e.name().to_string()).collect()
    }

    pub fn run(&self, body: &str) -> Extraction {
        let mut extraction = Extraction::default();
        for extractor in &self.extractors {
            let matches = extractor.extract(body);
            match extractor.kind() {
                ExtractorKind::Path => extraction.paths.extend(matches),
                ExtractorKind::Sensitive => extraction.secrets.extend(matches),
            }
        }
        extraction
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(ExtractorKind, &'static str);

    impl Extractor for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn kind(&self) -> ExtractorKind {
            self.0
        }

        fn extract(&self, body: &str) -> Vec<String> {
            if body.contains(self.1) {
                vec![self.1.to_string()]
            } else {
                Vec::new()
            }
        }
    }

    #[test]
    fn test_empty_registry() {
        let registry = ExtractorRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.run("anything"), Extraction::default());
    }

    #[test]
    fn test_run_splits_by_kind() {
        let mut registry = ExtractorRegistry::new();
        registry.register(Arc::new(Fixed(ExtractorKind::Path, "/api/a")));
        registry.register(Arc::new(Fixed(ExtractorKind::Sensitive, "secret")));

        let extraction = registry.run("fetch('/api/a'); var secret = 1;");
        assert_eq!(extraction.paths, vec!["/api/a".to_string()]);
        assert_eq!(extraction.secrets, vec!["secret".to_string()]);
    }

    #[test]
    fn test_defaults_registered() {
        let registry = ExtractorRegistry::with_defaults();
        assert_eq!(registry.len(), 3);
        assert!(registry.names().contains(&"secret-keys".to_string()));
    }
}
