//! Multi-factor quality scoring and the acceptance gate.
//!
//! ```text
//! total = 0.30 × relevance + 0.25 × authority + 0.20 × engagement
//!       + 0.15 × freshness + 0.10 × completeness
//! ```
//!
//! Weights, ceilings, the per-domain freshness half-lives and the gate
//! threshold all live in [`ScoringConfig`].

pub mod config;
pub mod relevance;
pub mod scorer;

pub use config::{ScoringConfig, ScoringWeights};
pub use relevance::{keyword_relevance, keywords, tokens};
pub use scorer::{Assessment, GateDecision, QualityScore, QualityScorer};
