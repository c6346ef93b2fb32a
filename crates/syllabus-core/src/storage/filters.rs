use super::traits::StoredRecord;
use crate::types::Difficulty;
use std::collections::HashMap;

/// Filter criteria for querying the corpus
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub min_quality: Option<f64>,
    pub domain: Option<String>,
    /// Only honoured together with `domain`.
    pub subdomain: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only records whose total quality is at least `min`
    pub fn with_min_quality(mut self, min: f64) -> Self {
        self.min_quality = Some(min);
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_subdomain(mut self, subdomain: impl Into<String>) -> Self {
        self.subdomain = Some(subdomain.into());
        self
    }

    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = Some(difficulty);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Check a stored record against everything except limit/offset.
    pub fn matches(&self, stored: &StoredRecord) -> bool {
        let record = &stored.record;

        if let Some(min) = self.min_quality {
            if stored.score.total < min {
                return false;
            }
        }

        if let Some(ref domain) = self.domain {
            if record.domain != *domain {
                return false;
            }
            if let Some(ref sub) = self.subdomain {
                if record.subdomain.as_deref() != Some(sub.as_str()) {
                    return false;
                }
            }
        }

        if let Some(difficulty) = self.difficulty {
            if record.difficulty != difficulty {
                return false;
            }
        }

        true
    }

    /// Apply offset and limit to an already filtered, ordered list.
    pub fn paginate<T>(&self, items: Vec<T>) -> Vec<T> {
        let start = self.offset.unwrap_or(0);
        let take = self.limit.unwrap_or(usize::MAX);
        items.into_iter().skip(start).take(take).collect()
    }
}

/// Corpus statistics
#[derive(Debug, Clone, Default)]
pub struct CorpusStats {
    pub record_count: u64,
    pub link_count: u64,
    pub counts_by_domain: HashMap<String, u64>,
    pub average_quality: f64,
    /// Zero for in-memory stores.
    pub db_size_bytes: u64,
}

impl CorpusStats {
    pub(crate) fn from_records<'a>(
        records: impl Iterator<Item = &'a StoredRecord>,
        link_count: u64,
    ) -> Self {
        let mut stats = CorpusStats {
            link_count,
            ..Default::default()
        };
        let mut quality_sum = 0.0;
        for stored in records {
            stats.record_count += 1;
            quality_sum += stored.score.total;
            *stats
                .counts_by_domain
                .entry(stored.record.domain.clone())
                .or_insert(0) += 1;
        }
        if stats.record_count > 0 {
            stats.average_quality = quality_sum / stats.record_count as f64;
        }
        stats
    }
}
