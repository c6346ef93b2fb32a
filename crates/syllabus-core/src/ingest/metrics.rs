use super::{IngestOutcome, RejectReason};
use crate::dedup::{DedupStats, DedupTier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Counters for ingest observability
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IngestMetrics {
    /// Records that went through the quality gate.
    pub scored: u64,

    /// Stored as new canonical records.
    pub accepted: u64,

    /// Below the gate threshold.
    pub rejected: u64,

    /// Rejected because duplicate detection failed closed.
    pub dedup_rejected: u64,

    pub url_duplicates: u64,
    pub content_duplicates: u64,
    pub semantic_duplicates: u64,

    /// Duplicates whose newer metrics replaced the canonical's.
    pub metrics_refreshed: u64,

    /// Semantic-tier errors and timeouts.
    pub semantic_failures: u64,

    /// Storage failures during ingest.
    pub failed: u64,

    /// Running mean of the total score over everything scored.
    pub average_score: f64,

    /// Build id of the currently published concept graph, 0 before the first.
    pub last_graph_build_id: u64,

    pub last_ingest_at: Option<DateTime<Utc>>,
}

impl IngestMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one gate result into the counters and the running average.
    pub fn record_score(&mut self, total: f64) {
        self.scored += 1;
        if total.is_finite() {
            self.average_score += (total - self.average_score) / self.scored as f64;
        }
    }

    pub fn record_outcome(&mut self, outcome: &IngestOutcome) {
        match outcome {
            IngestOutcome::Accepted { .. } => self.accepted += 1,
            IngestOutcome::Rejected { reason, .. } => match reason {
                RejectReason::LowQuality { .. } => self.rejected += 1,
                RejectReason::DedupUnavailable { .. } => self.dedup_rejected += 1,
            },
            IngestOutcome::Duplicate {
                tier,
                metrics_refreshed,
                ..
            } => {
                match tier {
                    DedupTier::Url => self.url_duplicates += 1,
                    DedupTier::Content => self.content_duplicates += 1,
                    DedupTier::Semantic => self.semantic_duplicates += 1,
                }
                if *metrics_refreshed {
                    self.metrics_refreshed += 1;
                }
            }
            IngestOutcome::Failed { .. } => self.failed += 1,
        }
        self.last_ingest_at = Some(Utc::now());
    }

    /// Pull the semantic failure count from the dedup service.
    pub fn merge_dedup_stats(&mut self, stats: &DedupStats) {
        self.semantic_failures = stats.semantic_failures + stats.semantic_timeouts;
    }

    pub fn set_last_graph_build_id(&mut self, build_id: u64) {
        self.last_graph_build_id = build_id;
    }

    pub fn duplicates(&self) -> u64 {
        self.url_duplicates + self.content_duplicates + self.semantic_duplicates
    }

    /// Fraction of scored records that passed the gate.
    pub fn acceptance_rate(&self) -> f64 {
        if self.scored == 0 {
            return 0.0;
        }
        (self.scored - self.rejected) as f64 / self.scored as f64
    }

    /// Get a summary string for logging
    pub fn summary(&self) -> String {
        format!(
            "Ingest: scored {} (avg {:.3}), accepted {}, rejected {} (+{} dedup), \
             duplicates {} (url {}, content {}, semantic {}), refreshed {}, \
             semantic failures {}, failed {} | Graph build #{}",
            self.scored,
            self.average_score,
            self.accepted,
            self.rejected,
            self.dedup_rejected,
            self.duplicates(),
            self.url_duplicates,
            self.content_duplicates,
            self.semantic_duplicates,
            self.metrics_refreshed,
            self.semantic_failures,
            self.failed,
            self.last_graph_build_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::QualityScore;
    use uuid::Uuid;

    fn score(total: f64) -> QualityScore {
        QualityScore {
            relevance: total,
            authority: total,
            engagement: total,
            freshness: total,
            completeness: total,
            total,
        }
    }

    #[test]
    fn test_running_average() {
        let mut metrics = IngestMetrics::new();
        metrics.record_score(0.2);
        metrics.record_score(0.8);
        metrics.record_score(0.5);
        assert_eq!(metrics.scored, 3);
        assert!((metrics.average_score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_outcomes_counted_by_kind() {
        let mut metrics = IngestMetrics::new();
        let id = Uuid::now_v7();
        metrics.record_outcome(&IngestOutcome::Accepted { id, score: score(0.8) });
        metrics.record_outcome(&IngestOutcome::Rejected {
            id,
            score: score(0.3),
            reason: RejectReason::LowQuality {
                total: 0.3,
                threshold: 0.6,
            },
        });
        metrics.record_outcome(&IngestOutcome::Duplicate {
            id,
            canonical: Uuid::now_v7(),
            tier: DedupTier::Semantic,
            similarity: 0.97,
            metrics_refreshed: true,
        });
        metrics.record_outcome(&IngestOutcome::Failed {
            id,
            error: "disk full".into(),
        });

        assert_eq!(metrics.accepted, 1);
        assert_eq!(metrics.rejected, 1);
        assert_eq!(metrics.semantic_duplicates, 1);
        assert_eq!(metrics.duplicates(), 1);
        assert_eq!(metrics.metrics_refreshed, 1);
        assert_eq!(metrics.failed, 1);
        assert!(metrics.last_ingest_at.is_some());
    }

    #[test]
    fn test_summary_mentions_counts() {
        let mut metrics = IngestMetrics::new();
        metrics.record_score(0.9);
        metrics.set_last_graph_build_id(7);
        let summary = metrics.summary();
        assert!(summary.contains("scored 1"));
        assert!(summary.contains("Graph build #7"));
    }

    #[test]
    fn test_serializes_to_json() {
        let metrics = IngestMetrics::new();
        let json = serde_json::to_string(&metrics).unwrap();
        let back: IngestMetrics = serde_json::from_str(&json).unwrap();
        assert_eq!(back, metrics);
    }
}
