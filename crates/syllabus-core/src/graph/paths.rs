use super::types::{ConceptGraph, ConceptId, PrerequisiteEdge, ResourceRef};
use crate::types::Difficulty;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Slack for float noise in difficulty deltas (0.8 - 0.5 > 0.3).
const JUMP_EPSILON: f64 = 1e-9;

/// Learning-path request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathRequest {
    pub target: ConceptId,
    /// Concepts the learner already knows. Empty means "start from the
    /// entry points of the target's domain".
    pub known: Vec<ConceptId>,
    pub max_difficulty_jump: f64,
}

impl PathRequest {
    pub fn new(target: impl Into<ConceptId>, max_difficulty_jump: f64) -> Self {
        Self {
            target: target.into(),
            known: Vec::new(),
            max_difficulty_jump,
        }
    }

    pub fn with_known(mut self, known: Vec<ConceptId>) -> Self {
        self.known = known;
        self
    }
}

/// Why a path looks the way it does.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PathOutcome {
    /// A valid multi-step path was found.
    Resolved,
    /// The learner already knows the target.
    AlreadyKnown,
    /// The target is not in the graph. Singleton fallback.
    UnknownTarget,
    /// No start reaches the target within the jump limit. Singleton fallback.
    NoValidPath,
}

/// Ordered concept ids, start first and target last.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolvedPath {
    pub concepts: Vec<ConceptId>,
    pub outcome: PathOutcome,
}

impl ResolvedPath {
    fn singleton(target: &ConceptId, outcome: PathOutcome) -> Self {
        Self {
            concepts: vec![target.clone()],
            outcome,
        }
    }

    /// The graph could not help; callers fall back to unstructured retrieval.
    pub fn is_fallback(&self) -> bool {
        matches!(
            self.outcome,
            PathOutcome::UnknownTarget | PathOutcome::NoValidPath
        )
    }
}

/// One step of a learning plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanStep {
    pub concept: ConceptId,
    /// `None` only for an unknown target.
    pub difficulty: Option<Difficulty>,
    pub resources: Vec<ResourceRef>,
}

/// Resolved path plus representative resources per step: the hand-off to
/// the curriculum generator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LearningPlan {
    pub build_id: u64,
    pub steps: Vec<PlanStep>,
    pub outcome: PathOutcome,
}

struct Candidate {
    path: Vec<ConceptId>,
    quality: f64,
}

impl Candidate {
    fn average_quality(&self) -> f64 {
        self.quality / self.path.len() as f64
    }

    fn beats(&self, other: &Candidate) -> bool {
        match self.path.len().cmp(&other.path.len()) {
            std::cmp::Ordering::Less => true,
            std::cmp::Ordering::Greater => false,
            std::cmp::Ordering::Equal => {
                let (a, b) = (self.average_quality(), other.average_quality());
                a > b || (a == b && self.path < other.path)
            }
        }
    }
}

/// Prerequisite-constrained path search over one graph snapshot.
///
/// Holds its own `Arc` so a rebuild published mid-request cannot change the
/// answer.
pub struct PathResolver {
    graph: Arc<ConceptGraph>,
    adjacency: HashMap<ConceptId, Vec<PrerequisiteEdge>>,
}

impl PathResolver {
    pub fn new(graph: Arc<ConceptGraph>) -> Self {
        let mut adjacency: HashMap<ConceptId, Vec<PrerequisiteEdge>> = HashMap::new();
        for edge in graph.edges() {
            adjacency
                .entry(edge.from.clone())
                .or_default()
                .push(edge.clone());
        }
        Self { graph, adjacency }
    }

    pub fn graph(&self) -> &ConceptGraph {
        &self.graph
    }

    /// Shortest valid path from any known concept to the target, or the
    /// singleton `[target]` when the graph cannot help.
    pub fn find_path(&self, request: &PathRequest) -> ResolvedPath {
        let target = &request.target;
        let Some(target_node) = self.graph.node(target) else {
            log::debug!("Path target {} not in graph", target);
            return ResolvedPath::singleton(target, PathOutcome::UnknownTarget);
        };

        if request.known.contains(target) {
            return ResolvedPath::singleton(target, PathOutcome::AlreadyKnown);
        }

        let starts: Vec<ConceptId> = if request.known.is_empty() {
            self.graph.entry_points(&target_node.domain)
        } else {
            let mut known: Vec<ConceptId> = request
                .known
                .iter()
                .filter(|k| self.graph.contains(k))
                .cloned()
                .collect();
            known.sort();
            known.dedup();
            known
        };

        let mut best: Option<Candidate> = None;
        for start in &starts {
            if let Some(candidate) = self.search(start, target, request.max_difficulty_jump) {
                if best.as_ref().map_or(true, |b| candidate.beats(b)) {
                    best = Some(candidate);
                }
            }
        }

        match best {
            Some(candidate) => ResolvedPath {
                concepts: candidate.path,
                outcome: PathOutcome::Resolved,
            },
            None => {
                log::debug!(
                    "No path to {} within jump {} from {} start(s)",
                    target,
                    request.max_difficulty_jump,
                    starts.len()
                );
                ResolvedPath::singleton(target, PathOutcome::NoValidPath)
            }
        }
    }

    /// Resolve a path and attach representative resources to every step.
    pub fn plan(&self, request: &PathRequest) -> LearningPlan {
        let path = self.find_path(request);
        let steps = path
            .concepts
            .iter()
            .map(|id| {
                let node = self.graph.node(id);
                PlanStep {
                    concept: id.clone(),
                    difficulty: node.map(|n| n.difficulty),
                    resources: node.map(|n| n.resources.clone()).unwrap_or_default(),
                }
            })
            .collect();
        LearningPlan {
            build_id: self.graph.build_id,
            steps,
            outcome: path.outcome,
        }
    }

    fn quality(&self, id: &ConceptId) -> f64 {
        self.graph.node(id).map_or(0.0, |n| n.average_quality)
    }

    fn allowed(&self, edge: &PrerequisiteEdge, max_jump: f64) -> bool {
        match (self.graph.node(&edge.from), self.graph.node(&edge.to)) {
            (Some(from), Some(to)) => to.level - from.level <= max_jump + JUMP_EPSILON,
            _ => false,
        }
    }

    /// Layered BFS by hop count. Among equal-length routes to a node the one
    /// with the higher quality sum wins.
    fn search(&self, start: &ConceptId, target: &ConceptId, max_jump: f64) -> Option<Candidate> {
        let mut parent: HashMap<ConceptId, ConceptId> = HashMap::new();
        let mut score: HashMap<ConceptId, f64> = HashMap::new();
        let mut visited: HashSet<ConceptId> = HashSet::new();

        score.insert(start.clone(), self.quality(start));
        visited.insert(start.clone());
        let mut frontier = vec![start.clone()];

        while !frontier.is_empty() && !visited.contains(target) {
            let mut next: Vec<ConceptId> = Vec::new();
            let mut layer: HashSet<ConceptId> = HashSet::new();

            for current in &frontier {
                let base = score.get(current).copied().unwrap_or(0.0);
                let Some(edges) = self.adjacency.get(current) else {
                    continue;
                };
                for edge in edges.iter().filter(|e| self.allowed(e, max_jump)) {
                    let candidate = base + self.quality(&edge.to);
                    if !visited.contains(&edge.to) {
                        visited.insert(edge.to.clone());
                        layer.insert(edge.to.clone());
                        parent.insert(edge.to.clone(), current.clone());
                        score.insert(edge.to.clone(), candidate);
                        next.push(edge.to.clone());
                    } else if layer.contains(&edge.to)
                        && candidate > score.get(&edge.to).copied().unwrap_or(f64::MIN)
                    {
                        parent.insert(edge.to.clone(), current.clone());
                        score.insert(edge.to.clone(), candidate);
                    }
                }
            }
            frontier = next;
        }

        if !visited.contains(target) {
            return None;
        }

        let mut path = vec![target.clone()];
        let mut current = target;
        while let Some(prev) = parent.get(current) {
            path.push(prev.clone());
            current = prev;
        }
        path.reverse();

        Some(Candidate {
            quality: score.get(target).copied().unwrap_or(0.0),
            path,
        })
    }
}
