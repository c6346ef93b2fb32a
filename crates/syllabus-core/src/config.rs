use crate::dedup::DedupConfig;
use crate::error::Result;
use crate::graph::{GraphConfig, PathConfig};
use crate::scoring::ScoringConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration, one section per component.
///
/// ```toml
/// [scoring]
/// gate_threshold = 0.65
///
/// [scoring.half_life_days]
/// CODING_SOFTWARE = 365.0
///
/// [dedup]
/// lookup_timeout_ms = 1500
/// failure_policy = "fail_closed"
///
/// [paths]
/// max_difficulty_jump = 0.3
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyllabusConfig {
    pub scoring: ScoringConfig,
    pub dedup: DedupConfig,
    pub graph: GraphConfig,
    pub paths: PathConfig,
}

impl SyllabusConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scoring(mut self, scoring: ScoringConfig) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn with_dedup(mut self, dedup: DedupConfig) -> Self {
        self.dedup = dedup;
        self
    }

    pub fn with_graph(mut self, graph: GraphConfig) -> Self {
        self.graph = graph;
        self
    }

    pub fn with_paths(mut self, paths: PathConfig) -> Self {
        self.paths = paths;
        self
    }

    /// Parse and validate. Missing sections and keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: SyllabusConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&raw)?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.scoring.validate()?;
        self.dedup.validate()?;
        self.graph.validate()?;
        self.paths.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::SemanticFailurePolicy;
    use crate::error::SyllabusError;
    use std::time::Duration;

    #[test]
    fn test_empty_toml_is_default() {
        let config = SyllabusConfig::from_toml_str("").unwrap();
        assert_eq!(config.scoring.gate_threshold, 0.6);
        assert_eq!(config.dedup.semantic_threshold, 0.95);
        assert_eq!(config.dedup.failure_policy, SemanticFailurePolicy::FailOpen);
        assert_eq!(config.paths.max_difficulty_jump, 0.4);
        assert_eq!(config.graph.max_resources_per_node, 3);
    }

    #[test]
    fn test_partial_sections_override() {
        let config = SyllabusConfig::from_toml_str(
            r#"
            [scoring]
            gate_threshold = 0.65

            [scoring.half_life_days]
            COOKING = 5000.0

            [dedup]
            lookup_timeout_ms = 1500
            failure_policy = "fail_closed"

            [paths]
            max_difficulty_jump = 0.3
            "#,
        )
        .unwrap();

        assert_eq!(config.scoring.gate_threshold, 0.65);
        assert_eq!(config.scoring.half_life_for("COOKING"), 5000.0);
        assert_eq!(config.dedup.lookup_timeout(), Duration::from_millis(1500));
        assert_eq!(config.dedup.failure_policy, SemanticFailurePolicy::FailClosed);
        assert_eq!(config.dedup.max_concurrent_lookups, 8);
        assert_eq!(config.paths.max_difficulty_jump, 0.3);
    }

    #[test]
    fn test_bad_weights_rejected() {
        let err = SyllabusConfig::from_toml_str(
            r#"
            [scoring.weights]
            relevance = 0.9
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, SyllabusError::Validation(_)));
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let err = SyllabusConfig::from_toml_str("[dedup\nfoo").unwrap_err();
        assert!(matches!(err, SyllabusError::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("syllabus.toml");
        std::fs::write(&path, "[graph]\nmax_resources_per_node = 5\n").unwrap();

        let config = SyllabusConfig::load(&path).unwrap();
        assert_eq!(config.graph.max_resources_per_node, 5);
        assert!(SyllabusConfig::load(dir.path().join("missing.toml")).is_err());
    }
}
