use serde::{Deserialize, Serialize};
use std::time::Duration;
use crate::{Error, Result};

pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.85;
pub const DEFAULT_MAX_CONCURRENT: usize = 10;
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Settings for one deduplication run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Pairs scoring strictly above this are merged.
    pub similarity_threshold: f32,
    /// Embeddings of any other length are rejected per item.
    pub expected_dimensions: Option<usize>,
    pub max_concurrent: usize,
    /// Deadline for the whole embedding fetch phase.
    pub fetch_timeout: Duration,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            expected_dimensions: None,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

impl DedupConfig {
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn with_expected_dimensions(mut self, dimensions: usize) -> Self {
        self.expected_dimensions = Some(dimensions);
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(Error::Config(format!(
                "similarity threshold must be within [0, 1], got {}",
                self.similarity_threshold
            )));
        }
        if self.max_concurrent == 0 {
            return Err(Error::Config("max_concurrent must be at least 1".to_string()));
        }
        if self.expected_dimensions == Some(0) {
            return Err(Error::Config("expected_dimensions must be non-zero".to_string()));
        }
        Ok(())
    }
}
