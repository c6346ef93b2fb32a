//! Ingest outcomes and the counters kept across an ingest run.

pub mod metrics;

pub use metrics::IngestMetrics;

use crate::dedup::DedupTier;
use crate::scoring::QualityScore;
use crate::types::{RecordId, RecordStatus};
use serde::{Deserialize, Serialize};

/// Why a record did not make it into the corpus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectReason {
    /// Total score below the gate threshold.
    LowQuality { total: f64, threshold: f64 },
    /// Duplicate detection was degraded and the policy is fail-closed.
    DedupUnavailable { detail: String },
}

/// What happened to one ingested record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IngestOutcome {
    /// Stored as a new canonical corpus entry.
    Accepted { id: RecordId, score: QualityScore },
    Rejected {
        id: RecordId,
        score: QualityScore,
        reason: RejectReason,
    },
    /// Folded into an existing canonical record.
    Duplicate {
        id: RecordId,
        canonical: RecordId,
        tier: DedupTier,
        similarity: f64,
        /// The canonical's metrics were replaced by this newer observation.
        metrics_refreshed: bool,
    },
    /// Storage failed; the record was not ingested.
    Failed { id: RecordId, error: String },
}

impl IngestOutcome {
    pub fn id(&self) -> RecordId {
        match self {
            IngestOutcome::Accepted { id, .. }
            | IngestOutcome::Rejected { id, .. }
            | IngestOutcome::Duplicate { id, .. }
            | IngestOutcome::Failed { id, .. } => *id,
        }
    }

    /// Where the record ended up in its lifecycle. A failed ingest leaves
    /// it pending.
    pub fn status(&self) -> RecordStatus {
        match self {
            IngestOutcome::Accepted { .. } => RecordStatus::Accepted,
            IngestOutcome::Rejected { .. } => RecordStatus::Rejected,
            IngestOutcome::Duplicate { canonical, .. } => RecordStatus::Linked {
                canonical: *canonical,
            },
            IngestOutcome::Failed { .. } => RecordStatus::Pending,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, IngestOutcome::Accepted { .. })
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, IngestOutcome::Duplicate { .. })
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, IngestOutcome::Rejected { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::ScoringWeights;
    use uuid::Uuid;

    #[test]
    fn test_status_follows_outcome() {
        let id = Uuid::now_v7();
        let canonical = Uuid::now_v7();
        let score = QualityScore::weighted(&ScoringWeights::default(), 0.3, 0.3, 0.3, 0.3, 0.3);

        let rejected = IngestOutcome::Rejected {
            id,
            score,
            reason: RejectReason::LowQuality {
                total: 0.3,
                threshold: 0.6,
            },
        };
        assert_eq!(rejected.status(), RecordStatus::Rejected);

        let linked = IngestOutcome::Duplicate {
            id,
            canonical,
            tier: DedupTier::Content,
            similarity: 1.0,
            metrics_refreshed: false,
        };
        assert_eq!(linked.status(), RecordStatus::Linked { canonical });

        let failed = IngestOutcome::Failed {
            id,
            error: "disk full".into(),
        };
        assert_eq!(failed.status(), RecordStatus::Pending);
    }
}
