use crate::config::SyllabusConfig;
use crate::dedup::{DedupService, DedupStats, DedupVerdict, DuplicateMatch, SimilaritySearch, TermVectorIndex};
use crate::error::{Result, SyllabusError};
use crate::fingerprint::{ClaimOutcome, Fingerprint, FingerprintStore, MemoryFingerprintStore};
use crate::graph::{
    BuildReport, ConceptGraph, ConceptGraphBuilder, ConceptId, GraphSnapshots, LearningPlan,
    PathRequest, PathResolver, ResolvedPath,
};
use crate::ingest::{IngestMetrics, IngestOutcome, RejectReason};
use crate::scoring::{Assessment, GateDecision, QualityScore, QualityScorer};
use crate::storage::{CorpusStats, CorpusStore, DuplicateLink, MemoryCorpus, RecordFilter, RedbStorage, StoredRecord};
use crate::types::{ContentRecord, RecordId};
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Attempts at linking to a canonical whose claim is won but whose record is
/// not stored yet.
const LINK_ATTEMPTS: usize = 5;

/// High-level, embedded knowledge base. No server required.
///
/// Raw records go through the quality gate and three-tier deduplication;
/// accepted records form the corpus the concept graph is rebuilt from.
///
/// # Example
/// ```rust,no_run
/// use syllabus_core::{ContentRecord, Difficulty, KnowledgeBase, Platform, SyllabusConfig};
///
/// # async fn run() -> syllabus_core::Result<()> {
/// let kb = KnowledgeBase::open("./corpus.redb", SyllabusConfig::default())?;
/// let record = ContentRecord::new(
///     "https://example.com/scales",
///     Platform::Blog,
///     "MUSIC",
///     Difficulty::Beginner,
///     "Major scales",
///     "Practice major scales slowly with both hands...",
/// );
/// kb.ingest(record).await?;
/// kb.rebuild_graph()?;
/// let path = kb.find_path("MUSIC_general_advanced", &[]);
/// # Ok(())
/// # }
/// ```
pub struct KnowledgeBase {
    config: SyllabusConfig,
    corpus: Arc<dyn CorpusStore>,
    fingerprints: Arc<dyn FingerprintStore>,
    scorer: QualityScorer,
    dedup: DedupService,
    builder: ConceptGraphBuilder,
    snapshots: GraphSnapshots,
    metrics: Mutex<IngestMetrics>,
}

impl KnowledgeBase {
    /// Open (or create) a knowledge base at the given path.
    ///
    /// The redb file holds both the corpus and the fingerprint index.
    /// Semantic deduplication uses an in-process term-vector index warmed
    /// from the stored corpus.
    pub fn open(path: impl AsRef<Path>, config: SyllabusConfig) -> Result<Self> {
        let storage = Arc::new(RedbStorage::open(path.as_ref())?);
        let index = Arc::new(TermVectorIndex::new());
        let similarity: Arc<dyn SimilaritySearch> = index.clone();
        let kb = Self::with_stores(config, storage.clone(), storage, Some(similarity))?;
        kb.warm_index(&index)?;
        Ok(kb)
    }

    /// Open with an external similarity search (e.g. a vector store client).
    /// `None` disables the semantic tier.
    pub fn open_with_similarity(
        path: impl AsRef<Path>,
        config: SyllabusConfig,
        similarity: Option<Arc<dyn SimilaritySearch>>,
    ) -> Result<Self> {
        let storage = Arc::new(RedbStorage::open(path.as_ref())?);
        Self::with_stores(config, storage.clone(), storage, similarity)
    }

    /// Purely in-memory knowledge base, for tests and one-off runs.
    pub fn in_memory(config: SyllabusConfig) -> Result<Self> {
        let index: Arc<dyn SimilaritySearch> = Arc::new(TermVectorIndex::new());
        Self::with_stores(
            config,
            Arc::new(MemoryCorpus::new()),
            Arc::new(MemoryFingerprintStore::new()),
            Some(index),
        )
    }

    /// Assemble from explicit stores.
    pub fn with_stores(
        config: SyllabusConfig,
        corpus: Arc<dyn CorpusStore>,
        fingerprints: Arc<dyn FingerprintStore>,
        similarity: Option<Arc<dyn SimilaritySearch>>,
    ) -> Result<Self> {
        config.validate()?;

        let kb = Self {
            scorer: QualityScorer::new(config.scoring.clone()),
            dedup: DedupService::new(config.dedup.clone(), fingerprints.clone(), similarity),
            builder: ConceptGraphBuilder::new(config.graph.clone()),
            snapshots: GraphSnapshots::new(),
            metrics: Mutex::new(IngestMetrics::new()),
            config,
            corpus,
            fingerprints,
        };

        kb.init_fingerprints()?;
        kb.restore_graph()?;
        Ok(kb)
    }

    pub fn config(&self) -> &SyllabusConfig {
        &self.config
    }

    pub fn scorer(&self) -> &QualityScorer {
        &self.scorer
    }

    /// Score, gate, deduplicate and store one record.
    ///
    /// Rejections and duplicates are outcomes, not errors. Only storage
    /// failures are returned as `Err`.
    pub async fn ingest(&self, record: ContentRecord) -> Result<IngestOutcome> {
        let assessment = self.scorer.assess(&record);
        self.lock_metrics().record_score(assessment.score.total);

        let result = self.process(record, assessment).await;
        match &result {
            Ok(outcome) => self.lock_metrics().record_outcome(outcome),
            Err(_) => self.lock_metrics().failed += 1,
        }
        result
    }

    /// Ingest many records. Scoring runs on the rayon pool, duplicate
    /// checks run concurrently. Outcomes come back in input order; storage
    /// errors become `IngestOutcome::Failed`.
    pub async fn ingest_batch(&self, records: Vec<ContentRecord>) -> Vec<IngestOutcome> {
        let assessments = self.scorer.assess_batch(&records);
        {
            let mut metrics = self.lock_metrics();
            for assessment in &assessments {
                metrics.record_score(assessment.score.total);
            }
        }

        let concurrency = self.config.dedup.max_concurrent_lookups.max(1);
        let outcomes: Vec<IngestOutcome> = stream::iter(records.into_iter().zip(assessments))
            .map(|(record, assessment)| async move {
                let id = record.id;
                let outcome = self.process(record, assessment).await.unwrap_or_else(|e| {
                    log::warn!("Ingest of {} failed: {}", id, e);
                    IngestOutcome::Failed {
                        id,
                        error: e.to_string(),
                    }
                });
                self.lock_metrics().record_outcome(&outcome);
                outcome
            })
            .buffered(concurrency)
            .collect()
            .await;

        log::info!("{}", self.metrics().summary());
        outcomes
    }

    async fn process(&self, record: ContentRecord, assessment: Assessment) -> Result<IngestOutcome> {
        let Assessment { score, decision } = assessment;

        if let GateDecision::Reject { total, threshold } = decision {
            log::debug!(
                "Rejected {} ({}): score {:.3} below {:.3}",
                record.id,
                record.url,
                total,
                threshold
            );
            return Ok(IngestOutcome::Rejected {
                id: record.id,
                score,
                reason: RejectReason::LowQuality { total, threshold },
            });
        }

        let mut orphan_released = false;
        loop {
            match self.dedup.check(&record).await {
                DedupVerdict::New => return self.store(record, score).await,
                DedupVerdict::Duplicate(found) => {
                    if let Some(outcome) = self.link(&record, &found).await? {
                        return Ok(outcome);
                    }
                    if orphan_released {
                        return Err(SyllabusError::RecordNotFound(found.canonical));
                    }
                    // The canonical was claimed but never stored. Free its keys
                    // and check this record again.
                    log::warn!(
                        "Canonical {} of {} is missing, releasing its fingerprint keys",
                        found.canonical,
                        record.id
                    );
                    self.release_claim(&Fingerprint::of(&record), found.canonical);
                    orphan_released = true;
                }
                DedupVerdict::Rejected { reason } => {
                    return Ok(IngestOutcome::Rejected {
                        id: record.id,
                        score,
                        reason: RejectReason::DedupUnavailable { detail: reason },
                    })
                }
            }
        }
    }

    /// Store a record whose keys were just claimed. A failed write releases
    /// the claim so the content can be ingested again later.
    async fn store(&self, record: ContentRecord, score: QualityScore) -> Result<IngestOutcome> {
        let stored = StoredRecord::new(record, score);
        if let Err(e) = self.corpus.put_record(&stored) {
            self.release_claim(&Fingerprint::of(&stored.record), stored.id());
            return Err(e);
        }
        self.dedup.register(&stored.record).await;
        log::debug!("Accepted {} with score {:.3}", stored.id(), score.total);
        Ok(IngestOutcome::Accepted {
            id: stored.id(),
            score,
        })
    }

    fn release_claim(&self, fingerprint: &Fingerprint, holder: RecordId) {
        if let Err(e) = self.fingerprints.release(fingerprint, holder) {
            log::warn!("Failed to release fingerprint keys of {}: {}", holder, e);
        }
    }

    /// Link a duplicate to its canonical. `None` when the canonical is still
    /// missing after all attempts.
    async fn link(
        &self,
        record: &ContentRecord,
        found: &DuplicateMatch,
    ) -> Result<Option<IngestOutcome>> {
        let link = DuplicateLink {
            duplicate_id: record.id,
            canonical: found.canonical,
            url: record.url.clone(),
            tier: found.tier,
            similarity: found.similarity,
            metrics: record.metrics.clone(),
            observed_at: record.retrieved_at,
        };

        let mut attempt = 1;
        let metrics_refreshed = loop {
            match self.corpus.link_duplicate(&link) {
                Ok(refreshed) => break refreshed,
                // The canonical won its claim but may still be being stored.
                Err(SyllabusError::RecordNotFound(_)) if attempt < LINK_ATTEMPTS => {
                    attempt += 1;
                    tokio::task::yield_now().await;
                }
                Err(SyllabusError::RecordNotFound(_)) => return Ok(None),
                Err(e) => return Err(e),
            }
        };

        if metrics_refreshed {
            log::debug!("Refreshed metrics of {} from {}", found.canonical, record.url);
        }
        Ok(Some(IngestOutcome::Duplicate {
            id: record.id,
            canonical: found.canonical,
            tier: found.tier,
            similarity: found.similarity,
            metrics_refreshed,
        }))
    }

    /// Rebuild the concept graph from the accepted corpus and publish it.
    pub fn rebuild_graph(&self) -> Result<BuildReport> {
        let records = self.corpus.list_records(&RecordFilter::new())?;
        let (graph, report) = self.builder.build(&records);

        let graph = Arc::new(graph);
        if self.snapshots.publish_shared(graph.clone()) {
            if let Some(path) = &self.config.graph.snapshot_path {
                // The corpus can always rebuild the graph, a lost snapshot is not fatal.
                if let Err(e) = GraphSnapshots::save(&graph, path) {
                    log::warn!("Failed to persist graph snapshot to {}: {}", path.display(), e);
                }
            }
        }
        self.lock_metrics()
            .set_last_graph_build_id(self.snapshots.build_id());
        log::info!("{}", report.summary());
        Ok(report)
    }

    /// The currently published graph. Stays valid across later rebuilds.
    pub fn graph(&self) -> Arc<ConceptGraph> {
        self.snapshots.current()
    }

    /// Learning path to `target` using the configured difficulty jump.
    pub fn find_path(&self, target: impl Into<ConceptId>, known: &[ConceptId]) -> ResolvedPath {
        let request = PathRequest::new(target, self.config.paths.max_difficulty_jump)
            .with_known(known.to_vec());
        self.find_path_with(&request)
    }

    pub fn find_path_with(&self, request: &PathRequest) -> ResolvedPath {
        PathResolver::new(self.graph()).find_path(request)
    }

    /// Path plus representative resources per step.
    pub fn plan(&self, target: impl Into<ConceptId>, known: &[ConceptId]) -> LearningPlan {
        let request = PathRequest::new(target, self.config.paths.max_difficulty_jump)
            .with_known(known.to_vec());
        PathResolver::new(self.graph()).plan(&request)
    }

    pub fn get_record(&self, id: RecordId) -> Result<Option<StoredRecord>> {
        self.corpus.get_record(id)
    }

    pub fn list_records(&self, filter: &RecordFilter) -> Result<Vec<StoredRecord>> {
        self.corpus.list_records(filter)
    }

    pub fn duplicates_of(&self, canonical: RecordId) -> Result<Vec<DuplicateLink>> {
        self.corpus.duplicates_of(canonical)
    }

    pub fn corpus_stats(&self) -> Result<CorpusStats> {
        self.corpus.stats()
    }

    pub fn dedup_stats(&self) -> DedupStats {
        self.dedup.stats()
    }

    /// Snapshot of the ingest counters.
    pub fn metrics(&self) -> IngestMetrics {
        let mut metrics = self.lock_metrics().clone();
        metrics.merge_dedup_stats(&self.dedup.stats());
        metrics.set_last_graph_build_id(self.snapshots.build_id());
        metrics
    }

    /// Persist any buffered fingerprint state.
    pub fn flush(&self) -> Result<()> {
        self.fingerprints.flush()
    }

    fn lock_metrics(&self) -> std::sync::MutexGuard<'_, IngestMetrics> {
        self.metrics.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// A fingerprint index that fails to load is cleared and re-seeded from
    /// the corpus, which is the source of truth.
    fn init_fingerprints(&self) -> Result<()> {
        let reseed = match self.fingerprints.init() {
            Ok(()) => self.fingerprints.is_empty().unwrap_or(true),
            Err(e) => {
                log::warn!("Fingerprint index failed to load, starting empty: {}", e);
                if let Err(e) = self.fingerprints.clear() {
                    log::warn!("Failed to clear fingerprint index: {}", e);
                }
                true
            }
        };
        if !reseed {
            return Ok(());
        }

        let records = self.corpus.list_records(&RecordFilter::new())?;
        if records.is_empty() {
            return Ok(());
        }
        let mut claimed = 0usize;
        for stored in &records {
            let fingerprint = Fingerprint::of(&stored.record);
            match self.fingerprints.claim(&fingerprint, stored.id()) {
                Ok(ClaimOutcome::Claimed) => claimed += 1,
                Ok(ClaimOutcome::Taken { kind, existing }) => log::debug!(
                    "Record {} shares a {} key with {} while reseeding",
                    stored.id(),
                    kind,
                    existing
                ),
                Err(e) => log::warn!("Failed to reseed fingerprint of {}: {}", stored.id(), e),
            }
        }
        log::info!("Reseeded fingerprint index from {} stored records", claimed);
        Ok(())
    }

    /// Load the persisted graph snapshot, or rebuild from the corpus when it
    /// is missing or unreadable.
    fn restore_graph(&self) -> Result<()> {
        let Some(path) = &self.config.graph.snapshot_path else {
            return Ok(());
        };
        match GraphSnapshots::load(path) {
            Ok(graph) => {
                self.builder.resume_from(graph.build_id);
                self.snapshots.publish(graph);
            }
            Err(e) => {
                log::warn!(
                    "Graph snapshot at {} unavailable, rebuilding from corpus: {}",
                    path.display(),
                    e
                );
                self.rebuild_graph()?;
            }
        }
        Ok(())
    }

    fn warm_index(&self, index: &TermVectorIndex) -> Result<()> {
        for stored in self.corpus.list_records(&RecordFilter::new())? {
            index.insert(&stored.record);
        }
        if !index.is_empty() {
            log::debug!("Warmed similarity index with {} records", index.len());
        }
        Ok(())
    }
}
