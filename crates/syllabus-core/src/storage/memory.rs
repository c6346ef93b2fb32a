use crate::error::{Result, SyllabusError};
use crate::storage::filters::{CorpusStats, RecordFilter};
use crate::storage::traits::{CorpusStore, DuplicateLink, StoredRecord};
use crate::types::RecordId;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

#[derive(Default)]
struct Inner {
    // BTreeMap keeps UUIDv7 ids in insertion-time order.
    records: BTreeMap<RecordId, StoredRecord>,
    links: HashMap<RecordId, Vec<DuplicateLink>>,
}

/// Corpus held entirely in memory. Used by tests and offline runs.
#[derive(Default)]
pub struct MemoryCorpus {
    inner: RwLock<Inner>,
}

impl MemoryCorpus {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CorpusStore for MemoryCorpus {
    fn put_record(&self, stored: &StoredRecord) -> Result<()> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.records.insert(stored.id(), stored.clone());
        Ok(())
    }

    fn get_record(&self, id: RecordId) -> Result<Option<StoredRecord>> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        Ok(inner.records.get(&id).cloned())
    }

    fn list_records(&self, filter: &RecordFilter) -> Result<Vec<StoredRecord>> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let matching = inner
            .records
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        Ok(filter.paginate(matching))
    }

    fn link_duplicate(&self, link: &DuplicateLink) -> Result<bool> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let canonical = inner
            .records
            .get_mut(&link.canonical)
            .ok_or(SyllabusError::RecordNotFound(link.canonical))?;
        let refreshed = canonical.refresh_metrics(&link.metrics, link.observed_at);
        inner
            .links
            .entry(link.canonical)
            .or_default()
            .push(link.clone());
        Ok(refreshed)
    }

    fn duplicates_of(&self, canonical: RecordId) -> Result<Vec<DuplicateLink>> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        Ok(inner.links.get(&canonical).cloned().unwrap_or_default())
    }

    fn stats(&self) -> Result<CorpusStats> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let link_count = inner.links.values().map(|l| l.len() as u64).sum();
        Ok(CorpusStats::from_records(inner.records.values(), link_count))
    }
}
