pub mod types;
pub mod platform;
pub mod error;
pub mod scoring;
pub mod fingerprint;
pub mod dedup;
pub mod storage;
pub mod graph;
pub mod ingest;
pub mod config;
pub mod api;

pub use error::{SyllabusError, Result};
pub use types::*;
pub use platform::{metrics_from_json, ArticleMetrics, DiscussionMetrics, PlatformMetrics, VideoMetrics};
pub use scoring::{
    Assessment, GateDecision, QualityScore, QualityScorer, ScoringConfig, ScoringWeights,
};
pub use fingerprint::{
    ClaimOutcome, Fingerprint, FingerprintKind, FingerprintStore, MemoryFingerprintStore,
};
pub use dedup::{
    DedupConfig, DedupService, DedupStats, DedupTier, DedupVerdict, DuplicateMatch,
    SemanticFailurePolicy, SimilarMatch, SimilarityQuery, SimilaritySearch, TermVectorIndex,
};
pub use storage::{
    CorpusStats, CorpusStore, DuplicateLink, MemoryCorpus, RecordFilter, RedbStorage,
    StoredRecord, CURRENT_SCHEMA_VERSION,
};
pub use graph::{
    BuildReport, ConceptGraph, ConceptGraphBuilder, ConceptId, ConceptNode, EdgeKind,
    GraphConfig, GraphSnapshots, LearningPlan, PathConfig, PathOutcome, PathRequest,
    PathResolver, PlanStep, PrerequisiteEdge, PrerequisiteStrategy, ResolvedPath, ResourceRef,
};
pub use ingest::{IngestMetrics, IngestOutcome, RejectReason};
pub use config::SyllabusConfig;
pub use api::KnowledgeBase;
