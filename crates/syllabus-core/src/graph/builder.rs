use super::config::GraphConfig;
use super::types::{ConceptGraph, ConceptId, ConceptNode, EdgeKind, PrerequisiteEdge, ResourceRef};
use crate::storage::StoredRecord;
use crate::types::{Difficulty, RecordStatus, Scope};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Domain/subdomain placeholder crawlers emit when classification failed.
const UNKNOWN_LABEL: &str = "UNKNOWN";

/// Minimum length for technique words to become tags.
const MIN_TECHNIQUE_TAG_LEN: usize = 4;

/// Infers prerequisite edges between aggregated concept nodes.
///
/// Whatever a strategy returns is validated by the builder; edges that
/// cross scopes or do not go strictly up in difficulty are dropped.
pub trait PrerequisiteStrategy: Send + Sync {
    fn name(&self) -> &str;

    fn infer(
        &self,
        nodes: &BTreeMap<ConceptId, ConceptNode>,
        config: &GraphConfig,
    ) -> Vec<PrerequisiteEdge>;
}

/// Connect adjacent present difficulty levels within each
/// (domain, subdomain), lower to higher.
#[derive(Debug, Clone, Copy, Default)]
pub struct DifficultyProgression;

impl PrerequisiteStrategy for DifficultyProgression {
    fn name(&self) -> &str {
        "difficulty_progression"
    }

    fn infer(
        &self,
        nodes: &BTreeMap<ConceptId, ConceptNode>,
        config: &GraphConfig,
    ) -> Vec<PrerequisiteEdge> {
        let mut by_scope: BTreeMap<Scope, Vec<&ConceptNode>> = BTreeMap::new();
        for node in nodes.values() {
            by_scope.entry(node.scope()).or_default().push(node);
        }

        let mut edges = Vec::new();
        for group in by_scope.values_mut() {
            group.sort_by_key(|n| n.difficulty);
            for pair in group.windows(2) {
                edges.push(PrerequisiteEdge {
                    from: pair[0].id.clone(),
                    to: pair[1].id.clone(),
                    strength: config.default_edge_strength,
                    kind: EdgeKind::DifficultyProgression,
                    evidence: 1,
                });
            }
        }
        edges
    }
}

/// Summary of one graph build
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildReport {
    pub build_id: u64,
    pub records_used: usize,
    pub records_skipped: usize,
    pub nodes: usize,
    pub edges: usize,
    pub edges_dropped: usize,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

impl BuildReport {
    pub fn summary(&self) -> String {
        format!(
            "Graph build #{}: {} records ({} skipped) -> {} nodes, {} edges ({} dropped) in {:?}",
            self.build_id,
            self.records_used,
            self.records_skipped,
            self.nodes,
            self.edges,
            self.edges_dropped,
            self.duration
        )
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

/// Batch builder: corpus snapshot in, immutable graph out.
pub struct ConceptGraphBuilder {
    config: GraphConfig,
    strategy: Box<dyn PrerequisiteStrategy>,
    last_build_id: AtomicU64,
}

impl ConceptGraphBuilder {
    pub fn new(config: GraphConfig) -> Self {
        Self {
            config,
            strategy: Box::new(DifficultyProgression),
            last_build_id: AtomicU64::new(0),
        }
    }

    pub fn with_strategy(mut self, strategy: Box<dyn PrerequisiteStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Continue numbering after a previously persisted build.
    pub fn resume_from(&self, build_id: u64) {
        self.last_build_id.fetch_max(build_id, Ordering::SeqCst);
    }

    pub fn build(&self, records: &[StoredRecord]) -> (ConceptGraph, BuildReport) {
        let started = Instant::now();
        let mut report = BuildReport::default();

        let mut groups: BTreeMap<(Scope, Difficulty), Vec<&StoredRecord>> = BTreeMap::new();
        for stored in records {
            if let Some(reason) = malformed(stored) {
                log::warn!("Skipping record {} in graph build: {}", stored.id(), reason);
                report.records_skipped += 1;
                continue;
            }
            groups
                .entry((stored.record.scope(), stored.record.difficulty))
                .or_default()
                .push(stored);
            report.records_used += 1;
        }

        let nodes: BTreeMap<ConceptId, ConceptNode> = groups
            .into_iter()
            .map(|((scope, difficulty), members)| {
                let node = self.aggregate(scope, difficulty, &members);
                (node.id.clone(), node)
            })
            .collect();

        let mut seen = HashSet::new();
        let mut edges = Vec::new();
        for edge in self.strategy.infer(&nodes, &self.config) {
            match validate_edge(&edge, &nodes) {
                Ok(()) if seen.insert((edge.from.clone(), edge.to.clone())) => edges.push(edge),
                Ok(()) => {}
                Err(reason) => {
                    log::warn!(
                        "Dropping {} edge {} -> {}: {}",
                        self.strategy.name(),
                        edge.from,
                        edge.to,
                        reason
                    );
                    report.edges_dropped += 1;
                }
            }
        }

        let build_id = self.last_build_id.fetch_add(1, Ordering::SeqCst) + 1;
        report.build_id = build_id;
        report.nodes = nodes.len();
        report.edges = edges.len();
        report.duration = started.elapsed();

        (ConceptGraph::new(build_id, nodes, edges), report)
    }

    fn aggregate(
        &self,
        scope: Scope,
        difficulty: Difficulty,
        members: &[&StoredRecord],
    ) -> ConceptNode {
        let quality_sum: f64 = members.iter().map(|m| m.score.total).sum();

        let mut tags = BTreeSet::new();
        for m in members {
            for tag in &m.record.tags {
                let tag = tag.trim().to_lowercase();
                if !tag.is_empty() {
                    tags.insert(tag);
                }
            }
            if let Some(technique) = &m.record.technique {
                for word in technique.split(|c: char| !c.is_alphanumeric()) {
                    if word.chars().count() >= MIN_TECHNIQUE_TAG_LEN {
                        tags.insert(word.to_lowercase());
                    }
                }
            }
        }

        let mut ranked: Vec<&StoredRecord> = members.to_vec();
        ranked.sort_by(|a, b| {
            b.score
                .total
                .partial_cmp(&a.score.total)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.id().cmp(&b.id()))
        });
        let resources = ranked
            .into_iter()
            .take(self.config.max_resources_per_node)
            .map(|m| ResourceRef {
                record_id: m.id(),
                url: m.record.url.clone(),
                title: m.record.title.clone(),
                platform: m.record.platform.clone(),
                quality: m.score.total,
            })
            .collect();

        ConceptNode {
            id: ConceptId::for_scope(&scope, difficulty),
            domain: scope.domain,
            subdomain: scope.subdomain,
            difficulty,
            level: difficulty.level(),
            average_quality: quality_sum / members.len() as f64,
            resource_count: members.len(),
            tags,
            resources,
        }
    }
}

impl Default for ConceptGraphBuilder {
    fn default() -> Self {
        Self::new(GraphConfig::default())
    }
}

fn malformed(stored: &StoredRecord) -> Option<&'static str> {
    let r = &stored.record;
    if r.domain.trim().is_empty() || r.domain.eq_ignore_ascii_case(UNKNOWN_LABEL) {
        return Some("missing domain");
    }
    if let Some(sub) = &r.subdomain {
        if sub.trim().is_empty() || sub.eq_ignore_ascii_case(UNKNOWN_LABEL) {
            return Some("unknown subdomain");
        }
    }
    if !stored.score.total.is_finite() {
        return Some("non-finite quality");
    }
    if r.status != RecordStatus::Accepted {
        return Some("not an accepted record");
    }
    None
}

fn validate_edge(
    edge: &PrerequisiteEdge,
    nodes: &BTreeMap<ConceptId, ConceptNode>,
) -> std::result::Result<(), &'static str> {
    let (Some(from), Some(to)) = (nodes.get(&edge.from), nodes.get(&edge.to)) else {
        return Err("unknown endpoint");
    };
    if from.scope() != to.scope() {
        return Err("crosses (domain, subdomain)");
    }
    if from.difficulty >= to.difficulty {
        return Err("difficulty does not increase");
    }
    if !edge.strength.is_finite() || !(0.0..=1.0).contains(&edge.strength) {
        return Err("strength out of range");
    }
    Ok(())
}
