use crate::error::{Result, SyllabusError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What to do when the semantic tier errors or times out.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SemanticFailurePolicy {
    /// Treat the record as new. Favors coverage.
    #[default]
    FailOpen,
    /// Reject the record with the failure reason. Favors purity.
    FailClosed,
}

/// Configuration for the deduplication service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Run the semantic tier at all. Default: true.
    pub semantic_enabled: bool,

    /// Similarity at or above which two records are near-duplicates.
    /// Default: 0.95.
    pub semantic_threshold: f64,

    /// Candidates requested from the similarity search. Default: 5.
    pub semantic_candidates: usize,

    /// Concurrent semantic lookups allowed. Default: 8.
    pub max_concurrent_lookups: usize,

    /// Deadline for one semantic lookup, including the wait for a permit.
    /// Default: 2000 ms.
    pub lookup_timeout_ms: u64,

    pub failure_policy: SemanticFailurePolicy,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            semantic_enabled: true,
            semantic_threshold: 0.95,
            semantic_candidates: 5,
            max_concurrent_lookups: 8,
            lookup_timeout_ms: 2000,
            failure_policy: SemanticFailurePolicy::FailOpen,
        }
    }
}

impl DedupConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_semantic_threshold(mut self, threshold: f64) -> Self {
        self.semantic_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn with_semantic_enabled(mut self, enabled: bool) -> Self {
        self.semantic_enabled = enabled;
        self
    }

    pub fn with_max_concurrent_lookups(mut self, max: usize) -> Self {
        self.max_concurrent_lookups = max;
        self
    }

    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_failure_policy(mut self, policy: SemanticFailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.semantic_threshold) {
            return Err(SyllabusError::Validation(
                "semantic_threshold must be between 0.0 and 1.0".into(),
            ));
        }

        if self.max_concurrent_lookups == 0 {
            return Err(SyllabusError::Validation(
                "max_concurrent_lookups must be > 0".into(),
            ));
        }

        if self.semantic_candidates == 0 {
            return Err(SyllabusError::Validation(
                "semantic_candidates must be > 0".into(),
            ));
        }

        if self.lookup_timeout_ms == 0 {
            return Err(SyllabusError::Validation(
                "lookup_timeout_ms must be > 0".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DedupConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.semantic_threshold, 0.95);
        assert_eq!(config.failure_policy, SemanticFailurePolicy::FailOpen);
        assert_eq!(config.lookup_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn test_zero_permits_rejected() {
        let config = DedupConfig::default().with_max_concurrent_lookups(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_policy_serde_names() {
        let json = serde_json::to_string(&SemanticFailurePolicy::FailClosed).unwrap();
        assert_eq!(json, "\"fail_closed\"");
    }
}
