use crate::error::{Result, SyllabusError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for concept graph builds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Strength of inferred difficulty-progression edges. Default: 0.8.
    pub default_edge_strength: f64,

    /// Representative resources kept per concept node. Default: 3.
    pub max_resources_per_node: usize,

    /// Where the latest snapshot is persisted. `None` keeps graphs in memory.
    pub snapshot_path: Option<PathBuf>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            default_edge_strength: 0.8,
            max_resources_per_node: 3,
            snapshot_path: None,
        }
    }
}

impl GraphConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_edge_strength(mut self, strength: f64) -> Self {
        self.default_edge_strength = strength.clamp(0.0, 1.0);
        self
    }

    pub fn with_max_resources_per_node(mut self, max: usize) -> Self {
        self.max_resources_per_node = max;
        self
    }

    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.default_edge_strength) {
            return Err(SyllabusError::Validation(
                "default_edge_strength must be between 0.0 and 1.0".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration for learning-path resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Largest difficulty increase allowed between consecutive concepts.
    /// Default: 0.4.
    pub max_difficulty_jump: f64,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            max_difficulty_jump: 0.4,
        }
    }
}

impl PathConfig {
    pub fn with_max_difficulty_jump(mut self, jump: f64) -> Self {
        self.max_difficulty_jump = jump;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.max_difficulty_jump.is_finite() || self.max_difficulty_jump < 0.0 {
            return Err(SyllabusError::Validation(
                "max_difficulty_jump must be a non-negative number".into(),
            ));
        }
        Ok(())
    }
}
