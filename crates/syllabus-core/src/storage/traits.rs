use crate::dedup::DedupTier;
use crate::error::Result;
use crate::scoring::QualityScore;
use crate::storage::filters::{CorpusStats, RecordFilter};
use crate::types::{ContentRecord, EngagementMetrics, RecordId, RecordStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An accepted canonical record with its score breakdown.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredRecord {
    pub record: ContentRecord,
    pub score: QualityScore,
    pub accepted_at: DateTime<Utc>,
    /// When the metrics snapshot was last replaced by a newer observation.
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl StoredRecord {
    pub fn new(mut record: ContentRecord, score: QualityScore) -> Self {
        record.status = RecordStatus::Accepted;
        Self {
            record,
            score,
            accepted_at: Utc::now(),
            refreshed_at: None,
        }
    }

    pub fn id(&self) -> RecordId {
        self.record.id
    }

    /// Timestamp of the observation the current metrics came from.
    pub fn observed_at(&self) -> DateTime<Utc> {
        self.refreshed_at.unwrap_or(self.record.retrieved_at)
    }

    /// Merge a duplicate's metrics when they are newer than ours.
    /// Returns whether anything changed.
    pub fn refresh_metrics(
        &mut self,
        metrics: &EngagementMetrics,
        observed_at: DateTime<Utc>,
    ) -> bool {
        if observed_at <= self.observed_at() || metrics.is_empty() {
            return false;
        }
        self.record.metrics = self.record.metrics.refreshed_with(metrics);
        self.refreshed_at = Some(observed_at);
        true
    }
}

/// A duplicate folded into a canonical record. Never a corpus entry itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DuplicateLink {
    pub duplicate_id: RecordId,
    pub canonical: RecordId,
    pub url: String,
    pub tier: DedupTier,
    /// Similarity reported by the semantic tier; 1.0 for exact tiers.
    pub similarity: f64,
    /// Metrics observed on the duplicate.
    pub metrics: EngagementMetrics,
    pub observed_at: DateTime<Utc>,
}

/// Storage for the accepted corpus
pub trait CorpusStore: Send + Sync {
    /// Store an accepted record (insert or replace)
    fn put_record(&self, stored: &StoredRecord) -> Result<()>;

    fn get_record(&self, id: RecordId) -> Result<Option<StoredRecord>>;

    /// Records matching the filter, ordered by id (oldest first)
    fn list_records(&self, filter: &RecordFilter) -> Result<Vec<StoredRecord>>;

    /// Record a duplicate link and refresh the canonical's metrics if the
    /// duplicate was observed later. Returns whether metrics were refreshed.
    fn link_duplicate(&self, link: &DuplicateLink) -> Result<bool>;

    /// All links folded into a canonical record
    fn duplicates_of(&self, canonical: RecordId) -> Result<Vec<DuplicateLink>>;

    fn stats(&self) -> Result<CorpusStats>;
}
