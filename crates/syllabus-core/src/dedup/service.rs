use super::config::{DedupConfig, SemanticFailurePolicy};
use super::similarity::{SimilarMatch, SimilarityQuery, SimilaritySearch};
use super::{DedupTier, DedupVerdict, DuplicateMatch};
use crate::error::{Result, SyllabusError};
use crate::fingerprint::{ClaimOutcome, Fingerprint, FingerprintKind, FingerprintStore};
use crate::types::{ContentRecord, RecordId};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Counters kept by the service across checks.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DedupStats {
    pub checks: u64,
    pub url_duplicates: u64,
    pub content_duplicates: u64,
    pub semantic_duplicates: u64,
    pub semantic_failures: u64,
    pub semantic_timeouts: u64,
    /// Checks that lost the claim race to a concurrent twin.
    pub claim_races_lost: u64,
    pub registration_failures: u64,
}

#[derive(Default)]
struct Counters {
    checks: AtomicU64,
    url_duplicates: AtomicU64,
    content_duplicates: AtomicU64,
    semantic_duplicates: AtomicU64,
    semantic_failures: AtomicU64,
    semantic_timeouts: AtomicU64,
    claim_races_lost: AtomicU64,
    registration_failures: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn duplicate(&self, tier: DedupTier) {
        match tier {
            DedupTier::Url => Self::bump(&self.url_duplicates),
            DedupTier::Content => Self::bump(&self.content_duplicates),
            DedupTier::Semantic => Self::bump(&self.semantic_duplicates),
        }
    }

    fn snapshot(&self) -> DedupStats {
        DedupStats {
            checks: self.checks.load(Ordering::Relaxed),
            url_duplicates: self.url_duplicates.load(Ordering::Relaxed),
            content_duplicates: self.content_duplicates.load(Ordering::Relaxed),
            semantic_duplicates: self.semantic_duplicates.load(Ordering::Relaxed),
            semantic_failures: self.semantic_failures.load(Ordering::Relaxed),
            semantic_timeouts: self.semantic_timeouts.load(Ordering::Relaxed),
            claim_races_lost: self.claim_races_lost.load(Ordering::Relaxed),
            registration_failures: self.registration_failures.load(Ordering::Relaxed),
        }
    }
}

/// Three-tier duplicate detection for records that passed the quality gate.
///
/// Tiers run cheapest first and short-circuit:
/// 1. exact normalized URL
/// 2. exact normalized body
/// 3. semantic similarity within the same (domain, subdomain)
///
/// A `New` verdict is only returned after the record's exact keys were
/// claimed atomically in the fingerprint store.
pub struct DedupService {
    config: DedupConfig,
    fingerprints: Arc<dyn FingerprintStore>,
    similarity: Option<Arc<dyn SimilaritySearch>>,
    permits: Arc<Semaphore>,
    counters: Counters,
}

impl DedupService {
    pub fn new(
        config: DedupConfig,
        fingerprints: Arc<dyn FingerprintStore>,
        similarity: Option<Arc<dyn SimilaritySearch>>,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_lookups.max(1)));
        Self {
            config,
            fingerprints,
            similarity,
            permits,
            counters: Counters::default(),
        }
    }

    pub fn config(&self) -> &DedupConfig {
        &self.config
    }

    pub fn stats(&self) -> DedupStats {
        self.counters.snapshot()
    }

    /// Classify a record. Never fails: lookup errors count as misses and
    /// semantic failures follow the configured policy.
    pub async fn check(&self, record: &ContentRecord) -> DedupVerdict {
        Counters::bump(&self.counters.checks);
        let fingerprint = Fingerprint::of(record);

        if let Some(existing) = self.lookup(FingerprintKind::Url, &fingerprint.url_key) {
            return self.duplicate(record, existing, DedupTier::Url, 1.0);
        }

        if let Some(key) = &fingerprint.content_key {
            if let Some(existing) = self.lookup(FingerprintKind::Content, key) {
                return self.duplicate(record, existing, DedupTier::Content, 1.0);
            }
        }

        match self.semantic_tier(record).await {
            Ok(Some(found)) => {
                return self.duplicate(record, found.id, DedupTier::Semantic, found.similarity)
            }
            Ok(None) => {}
            Err(e) => {
                if let Some(rejection) = self.on_failure(record, &e) {
                    return rejection;
                }
            }
        }

        match self.fingerprints.claim(&fingerprint, record.id) {
            Ok(ClaimOutcome::Claimed) => DedupVerdict::New,
            Ok(ClaimOutcome::Taken { kind, existing }) => {
                Counters::bump(&self.counters.claim_races_lost);
                log::debug!(
                    "Record {} lost {} claim to {}",
                    record.id,
                    kind,
                    existing
                );
                self.duplicate(record, existing, kind.into(), 1.0)
            }
            Err(e) => {
                log::warn!("Fingerprint claim failed for {}: {}", record.id, e);
                self.on_failure(record, &e).unwrap_or(DedupVerdict::New)
            }
        }
    }

    /// Register an accepted record with the similarity search.
    /// Failures are logged and counted, never returned.
    pub async fn register(&self, record: &ContentRecord) {
        let Some(search) = &self.similarity else {
            return;
        };
        if let Err(e) = search.upsert(record).await {
            Counters::bump(&self.counters.registration_failures);
            log::warn!(
                "Failed to register {} with similarity search: {}",
                record.id,
                e
            );
        }
    }

    fn lookup(&self, kind: FingerprintKind, key: &str) -> Option<RecordId> {
        match self.fingerprints.lookup(kind, key) {
            Ok(found) => found,
            Err(e) => {
                log::warn!("Fingerprint {} lookup failed, treating as miss: {}", kind, e);
                None
            }
        }
    }

    fn duplicate(
        &self,
        record: &ContentRecord,
        canonical: RecordId,
        tier: DedupTier,
        similarity: f64,
    ) -> DedupVerdict {
        self.counters.duplicate(tier);
        log::debug!(
            "Record {} ({}) is a {} duplicate of {}",
            record.id,
            record.url,
            tier,
            canonical
        );
        DedupVerdict::Duplicate(DuplicateMatch {
            canonical,
            tier,
            similarity,
        })
    }

    /// Apply the failure policy. `Some` means the record is rejected.
    fn on_failure(&self, record: &ContentRecord, error: &SyllabusError) -> Option<DedupVerdict> {
        match self.config.failure_policy {
            SemanticFailurePolicy::FailOpen => {
                log::warn!("Dedup degraded for {}, failing open: {}", record.id, error);
                None
            }
            SemanticFailurePolicy::FailClosed => {
                log::warn!("Dedup degraded for {}, failing closed: {}", record.id, error);
                Some(DedupVerdict::Rejected {
                    reason: error.to_string(),
                })
            }
        }
    }

    async fn semantic_tier(&self, record: &ContentRecord) -> Result<Option<SimilarMatch>> {
        if !self.config.semantic_enabled {
            return Ok(None);
        }
        let Some(search) = &self.similarity else {
            return Ok(None);
        };

        let query = SimilarityQuery::for_record(record, self.config.semantic_candidates);
        let timeout = self.config.lookup_timeout();

        let lookup = async {
            let _permit = self
                .permits
                .acquire()
                .await
                .map_err(|e| SyllabusError::SemanticSearch(e.to_string()))?;
            search.find_similar(&query).await
        };

        let matches = match tokio::time::timeout(timeout, lookup).await {
            Ok(Ok(matches)) => matches,
            Ok(Err(e)) => {
                Counters::bump(&self.counters.semantic_failures);
                return Err(e);
            }
            Err(_) => {
                Counters::bump(&self.counters.semantic_timeouts);
                return Err(SyllabusError::SemanticTimeout(timeout));
            }
        };

        let scope = record.scope();
        Ok(matches
            .into_iter()
            .filter(|m| m.id != record.id && m.scope == scope)
            .filter(|m| m.similarity.is_finite() && m.similarity >= self.config.semantic_threshold)
            .max_by(|a, b| {
                a.similarity
                    .partial_cmp(&b.similarity)
                    .unwrap_or(std::cmp::Ordering::Equal)
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::similarity::TermVectorIndex;
    use crate::fingerprint::MemoryFingerprintStore;
    use crate::types::{Difficulty, Platform};
    use async_trait::async_trait;
    use std::time::Duration;

    fn record(url: &str, body: &str) -> ContentRecord {
        ContentRecord::new(
            url,
            Platform::Blog,
            "CODING_SOFTWARE",
            Difficulty::Intermediate,
            "Rust ownership explained",
            body,
        )
        .with_subdomain("RUST")
    }

    fn service(config: DedupConfig) -> (DedupService, Arc<TermVectorIndex>) {
        let index = Arc::new(TermVectorIndex::new());
        let service = DedupService::new(
            config,
            Arc::new(MemoryFingerprintStore::new()),
            Some(index.clone()),
        );
        (service, index)
    }

    struct FailingSearch;

    #[async_trait]
    impl SimilaritySearch for FailingSearch {
        async fn find_similar(&self, _query: &SimilarityQuery) -> Result<Vec<SimilarMatch>> {
            Err(SyllabusError::SemanticSearch("vector store unavailable".into()))
        }

        async fn upsert(&self, _record: &ContentRecord) -> Result<()> {
            Err(SyllabusError::SemanticSearch("vector store unavailable".into()))
        }
    }

    struct SlowSearch;

    #[async_trait]
    impl SimilaritySearch for SlowSearch {
        async fn find_similar(&self, _query: &SimilarityQuery) -> Result<Vec<SimilarMatch>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Vec::new())
        }

        async fn upsert(&self, _record: &ContentRecord) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_url_duplicate_modulo_normalization() {
        let (service, _) = service(DedupConfig::default());
        let first = record("https://blog.example.com/rust/ownership/", "Borrowing rules and moves.");
        assert_eq!(service.check(&first).await, DedupVerdict::New);

        let second = record(
            "https://BLOG.example.com/rust/ownership?utm_source=newsletter#intro",
            "Completely different text.",
        );
        match service.check(&second).await {
            DedupVerdict::Duplicate(m) => {
                assert_eq!(m.canonical, first.id);
                assert_eq!(m.tier, DedupTier::Url);
            }
            other => panic!("expected url duplicate, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_content_duplicate_across_urls() {
        let (service, _) = service(DedupConfig::default());
        let first = record("https://a.example.com/post", "Ownership  means one OWNER.");
        assert_eq!(service.check(&first).await, DedupVerdict::New);

        let mirror = record("https://b.example.com/copy", "ownership means one owner.");
        assert!(matches!(
            service.check(&mirror).await,
            DedupVerdict::Duplicate(DuplicateMatch { tier: DedupTier::Content, .. })
        ));
        assert_eq!(service.stats().content_duplicates, 1);
    }

    #[tokio::test]
    async fn test_semantic_duplicate_across_urls() {
        let (service, _) = service(DedupConfig::default());
        let body = "Every value in Rust has a single owner and the value is dropped when \
                    the owner goes out of scope; borrowing lends access without moving";
        let first = record("https://a.example.com/ownership", body);
        assert_eq!(service.check(&first).await, DedupVerdict::New);
        service.register(&first).await;

        // Same words, different punctuation and casing than the content key sees
        let near = record(
            "https://c.example.com/rust-owners",
            &format!("{}!!", body.replace(';', ",")),
        );
        match service.check(&near).await {
            DedupVerdict::Duplicate(m) => {
                assert_eq!(m.canonical, first.id);
                assert_eq!(m.tier, DedupTier::Semantic);
                assert!(m.similarity >= 0.95);
            }
            other => panic!("expected semantic duplicate, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_semantic_failure_fail_open() {
        let service = DedupService::new(
            DedupConfig::default(),
            Arc::new(MemoryFingerprintStore::new()),
            Some(Arc::new(FailingSearch)),
        );
        let rec = record("https://a.example.com/x", "Lifetimes annotate borrows.");
        assert_eq!(service.check(&rec).await, DedupVerdict::New);
        service.register(&rec).await;

        let stats = service.stats();
        assert_eq!(stats.semantic_failures, 1);
        assert_eq!(stats.registration_failures, 1);
    }

    #[tokio::test]
    async fn test_semantic_failure_fail_closed() {
        let service = DedupService::new(
            DedupConfig::default().with_failure_policy(SemanticFailurePolicy::FailClosed),
            Arc::new(MemoryFingerprintStore::new()),
            Some(Arc::new(FailingSearch)),
        );
        let rec = record("https://a.example.com/x", "Lifetimes annotate borrows.");
        match service.check(&rec).await {
            DedupVerdict::Rejected { reason } => assert!(reason.contains("unavailable")),
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_semantic_timeout_is_soft() {
        let service = DedupService::new(
            DedupConfig::default().with_lookup_timeout(Duration::from_millis(50)),
            Arc::new(MemoryFingerprintStore::new()),
            Some(Arc::new(SlowSearch)),
        );
        let rec = record("https://a.example.com/slow", "Traits define shared behavior.");
        assert_eq!(service.check(&rec).await, DedupVerdict::New);
        assert_eq!(service.stats().semantic_timeouts, 1);
    }

    #[tokio::test]
    async fn test_other_scope_not_semantic_duplicate() {
        let (service, _) = service(DedupConfig::default());
        let body = "Pattern matching destructures enums and structs exhaustively";
        let first = record("https://a.example.com/match", body);
        assert_eq!(service.check(&first).await, DedupVerdict::New);
        service.register(&first).await;

        let other = record("https://b.example.com/match", &format!("{} .", body))
            .with_subdomain("PYTHON");
        assert_eq!(service.check(&other).await, DedupVerdict::New);
    }

    #[tokio::test]
    async fn test_concurrent_twins_single_new() {
        let (service, _) = service(DedupConfig::default().with_semantic_enabled(false));
        let service = Arc::new(service);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move {
                    let twin = record("https://a.example.com/race", "Same body for everyone");
                    service.check(&twin).await
                })
            })
            .collect();

        let mut new_count = 0;
        for handle in handles {
            if handle.await.unwrap() == DedupVerdict::New {
                new_count += 1;
            }
        }
        assert_eq!(new_count, 1);
    }
}
