use crate::error::{Result, SyllabusError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Relative weight of each sub-score in the total. Must sum to 1.0.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringWeights {
    pub relevance: f64,
    pub authority: f64,
    pub engagement: f64,
    pub freshness: f64,
    pub completeness: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            relevance: 0.30,
            authority: 0.25,
            engagement: 0.20,
            freshness: 0.15,
            completeness: 0.10,
        }
    }
}

impl ScoringWeights {
    pub fn sum(&self) -> f64 {
        self.relevance + self.authority + self.engagement + self.freshness + self.completeness
    }

    pub fn validate(&self) -> Result<()> {
        let all = [
            ("relevance", self.relevance),
            ("authority", self.authority),
            ("engagement", self.engagement),
            ("freshness", self.freshness),
            ("completeness", self.completeness),
        ];
        for (name, w) in all {
            if !w.is_finite() || !(0.0..=1.0).contains(&w) {
                return Err(SyllabusError::Validation(format!(
                    "weight '{}' must be between 0.0 and 1.0",
                    name
                )));
            }
        }
        if (self.sum() - 1.0).abs() > 1e-6 {
            return Err(SyllabusError::Validation(format!(
                "scoring weights must sum to 1.0 (got {:.4})",
                self.sum()
            )));
        }
        Ok(())
    }
}

/// Configuration for the quality scorer and acceptance gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: ScoringWeights,

    /// Minimum total for acceptance. Default: 0.6.
    pub gate_threshold: f64,

    /// Audience size that earns full authority. Default: 10^6.5 (~3.16M).
    pub authority_ceiling: f64,

    /// Added to authority for verified sources, capped at 1.0. Default: 0.15.
    pub verified_bonus: f64,

    /// Multiplier on likes/views. 5% like ratio saturates at the default 20.
    pub like_ratio_scale: f64,

    /// Comment count that saturates comment density. Default: 10^3.5 (~3162).
    pub comment_ceiling: f64,

    /// Word count at which length adequacy reaches 1.0. Default: 500.
    pub completeness_word_target: usize,

    /// Fallback freshness half-life in days. Default: 730.
    pub default_half_life_days: f64,

    /// Per-domain half-life overrides (key = domain id).
    /// Technical material ages fast; evergreen skills barely age.
    pub half_life_days: HashMap<String, f64>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let mut half_life_days = HashMap::new();
        half_life_days.insert("CODING_SOFTWARE".to_string(), 365.0);
        half_life_days.insert("DATA_SCIENCE".to_string(), 365.0);
        half_life_days.insert("TECHNOLOGY".to_string(), 365.0);
        half_life_days.insert("MUSIC".to_string(), 3650.0);
        half_life_days.insert("MARTIAL_ARTS".to_string(), 3650.0);
        half_life_days.insert("COOKING".to_string(), 3650.0);
        half_life_days.insert("MATHEMATICS".to_string(), 3650.0);
        Self {
            weights: ScoringWeights::default(),
            gate_threshold: 0.6,
            authority_ceiling: 10f64.powf(6.5),
            verified_bonus: 0.15,
            like_ratio_scale: 20.0,
            comment_ceiling: 10f64.powf(3.5),
            completeness_word_target: 500,
            default_half_life_days: 730.0,
            half_life_days,
        }
    }
}

impl ScoringConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weights(mut self, weights: ScoringWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_gate_threshold(mut self, threshold: f64) -> Self {
        self.gate_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn with_half_life(mut self, domain: impl Into<String>, days: f64) -> Self {
        self.half_life_days.insert(domain.into(), days);
        self
    }

    pub fn with_default_half_life(mut self, days: f64) -> Self {
        self.default_half_life_days = days;
        self
    }

    pub fn with_completeness_word_target(mut self, words: usize) -> Self {
        self.completeness_word_target = words;
        self
    }

    /// Half-life for a domain, falling back to the default.
    pub fn half_life_for(&self, domain: &str) -> f64 {
        self.half_life_days
            .get(domain)
            .copied()
            .unwrap_or(self.default_half_life_days)
    }

    pub fn validate(&self) -> Result<()> {
        self.weights.validate()?;

        if !(0.0..=1.0).contains(&self.gate_threshold) {
            return Err(SyllabusError::Validation(
                "gate_threshold must be between 0.0 and 1.0".into(),
            ));
        }

        if !(self.authority_ceiling > 1.0) || !(self.comment_ceiling > 1.0) {
            return Err(SyllabusError::Validation(
                "authority_ceiling and comment_ceiling must be > 1".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.verified_bonus) {
            return Err(SyllabusError::Validation(
                "verified_bonus must be between 0.0 and 1.0".into(),
            ));
        }

        if !(self.like_ratio_scale > 0.0) {
            return Err(SyllabusError::Validation(
                "like_ratio_scale must be > 0".into(),
            ));
        }

        if self.completeness_word_target == 0 {
            return Err(SyllabusError::Validation(
                "completeness_word_target must be > 0".into(),
            ));
        }

        let half_lives = std::iter::once(("default", self.default_half_life_days))
            .chain(self.half_life_days.iter().map(|(k, v)| (k.as_str(), *v)));
        for (domain, days) in half_lives {
            if !(days > 0.0) || !days.is_finite() {
                return Err(SyllabusError::Validation(format!(
                    "half-life for '{}' must be a positive number of days",
                    domain
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ScoringConfig::default();
        assert!(config.validate().is_ok());
        assert!((config.weights.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let weights = ScoringWeights {
            relevance: 0.5,
            ..Default::default()
        };
        let config = ScoringConfig::default().with_weights(weights);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_half_life_lookup() {
        let config = ScoringConfig::default().with_half_life("KNITTING", 5000.0);
        assert_eq!(config.half_life_for("CODING_SOFTWARE"), 365.0);
        assert_eq!(config.half_life_for("MUSIC"), 3650.0);
        assert_eq!(config.half_life_for("KNITTING"), 5000.0);
        assert_eq!(config.half_life_for("UNLISTED"), 730.0);
    }

    #[test]
    fn test_non_positive_half_life_rejected() {
        let config = ScoringConfig::default().with_half_life("MUSIC", 0.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_gate_threshold_clamped() {
        let config = ScoringConfig::default().with_gate_threshold(1.7);
        assert_eq!(config.gate_threshold, 1.0);
    }
}
