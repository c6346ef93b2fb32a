//! Three-tier deduplication: exact URL, exact content, semantic.

pub mod config;
pub mod service;
pub mod similarity;

pub use config::{DedupConfig, SemanticFailurePolicy};
pub use service::{DedupService, DedupStats};
pub use similarity::{
    similarity_text, SimilarMatch, SimilarityQuery, SimilaritySearch, TermVectorIndex,
};

use crate::fingerprint::FingerprintKind;
use crate::types::RecordId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which tier identified a duplicate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DedupTier {
    Url,
    Content,
    Semantic,
}

impl fmt::Display for DedupTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DedupTier::Url => write!(f, "url"),
            DedupTier::Content => write!(f, "content"),
            DedupTier::Semantic => write!(f, "semantic"),
        }
    }
}

impl From<FingerprintKind> for DedupTier {
    fn from(kind: FingerprintKind) -> Self {
        match kind {
            FingerprintKind::Url => DedupTier::Url,
            FingerprintKind::Content => DedupTier::Content,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DuplicateMatch {
    pub canonical: RecordId,
    pub tier: DedupTier,
    /// 1.0 for the exact tiers.
    pub similarity: f64,
}

/// Outcome of a duplicate check.
#[derive(Debug, Clone, PartialEq)]
pub enum DedupVerdict {
    /// Not seen before; its exact keys are now claimed.
    New,
    Duplicate(DuplicateMatch),
    /// Semantic tier failed under the fail-closed policy.
    Rejected { reason: String },
}
