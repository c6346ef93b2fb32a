use crate::types::{Difficulty, Platform, RecordId, Scope};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Subdomain label used in concept ids when a record has none.
pub const GENERAL_SUBDOMAIN: &str = "general";

/// Concept identifier: `{DOMAIN}_{SUBDOMAIN}_{difficulty}`.
///
/// Labels are percent-escaped so that distinct (domain, subdomain) pairs
/// never share an id: `%` and `_` inside a label become `%25` and `%5F`,
/// and an explicit subdomain spelled like the `general` placeholder has its
/// first byte escaped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ConceptId(String);

impl ConceptId {
    pub fn new(domain: &str, subdomain: Option<&str>, difficulty: Difficulty) -> Self {
        let subdomain = match subdomain {
            None => GENERAL_SUBDOMAIN.to_string(),
            Some(sub) => {
                let escaped = escape_label(sub);
                if escaped == GENERAL_SUBDOMAIN {
                    format!("%{:02X}{}", escaped.as_bytes()[0], &escaped[1..])
                } else {
                    escaped
                }
            }
        };
        Self(format!("{}_{}_{}", escape_label(domain), subdomain, difficulty))
    }

    pub fn for_scope(scope: &Scope, difficulty: Difficulty) -> Self {
        Self::new(&scope.domain, scope.subdomain.as_deref(), difficulty)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn escape_label(label: &str) -> String {
    label.replace('%', "%25").replace('_', "%5F")
}

impl fmt::Display for ConceptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConceptId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ConceptId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Pointer to a corpus record, handed to the curriculum generator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceRef {
    pub record_id: RecordId,
    pub url: String,
    pub title: String,
    pub platform: Platform,
    pub quality: f64,
}

/// Aggregation bucket for all accepted records sharing
/// (domain, subdomain, difficulty).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConceptNode {
    pub id: ConceptId,
    pub domain: String,
    pub subdomain: Option<String>,
    pub difficulty: Difficulty,
    /// Numeric difficulty used for jump validation.
    pub level: f64,
    pub average_quality: f64,
    pub resource_count: usize,
    pub tags: BTreeSet<String>,
    /// Highest-quality resources first.
    pub resources: Vec<ResourceRef>,
}

impl ConceptNode {
    pub fn scope(&self) -> Scope {
        Scope::new(self.domain.clone(), self.subdomain.clone())
    }
}

/// How a prerequisite edge was inferred.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    DifficultyProgression,
    /// Produced by a pluggable strategy.
    Inferred(String),
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeKind::DifficultyProgression => write!(f, "difficulty_progression"),
            EdgeKind::Inferred(name) => write!(f, "inferred:{}", name),
        }
    }
}

/// Directed "learn `from` before `to`" relation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrerequisiteEdge {
    pub from: ConceptId,
    pub to: ConceptId,
    pub strength: f64,
    pub kind: EdgeKind,
    pub evidence: u32,
}

/// Immutable concept graph snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConceptGraph {
    pub build_id: u64,
    pub built_at: DateTime<Utc>,
    nodes: BTreeMap<ConceptId, ConceptNode>,
    edges: Vec<PrerequisiteEdge>,
}

impl ConceptGraph {
    pub fn new(
        build_id: u64,
        nodes: BTreeMap<ConceptId, ConceptNode>,
        edges: Vec<PrerequisiteEdge>,
    ) -> Self {
        Self {
            build_id,
            built_at: Utc::now(),
            nodes,
            edges,
        }
    }

    /// The graph published before any build has run.
    pub fn empty() -> Self {
        Self::new(0, BTreeMap::new(), Vec::new())
    }

    pub fn node(&self, id: &ConceptId) -> Option<&ConceptNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &ConceptId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ConceptNode> {
        self.nodes.values()
    }

    pub fn edges(&self) -> &[PrerequisiteEdge] {
        &self.edges
    }

    pub fn edges_from<'a>(
        &'a self,
        id: &'a ConceptId,
    ) -> impl Iterator<Item = &'a PrerequisiteEdge> + 'a {
        self.edges.iter().filter(move |e| &e.from == id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Lowest-difficulty node of every (domain, subdomain) group in a domain.
    pub fn entry_points(&self, domain: &str) -> Vec<ConceptId> {
        let mut lowest: BTreeMap<Scope, &ConceptNode> = BTreeMap::new();
        for node in self.nodes.values().filter(|n| n.domain == domain) {
            lowest
                .entry(node.scope())
                .and_modify(|current| {
                    if node.difficulty < current.difficulty {
                        *current = node;
                    }
                })
                .or_insert(node);
        }
        lowest.into_values().map(|n| n.id.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concept_id_format() {
        assert_eq!(
            ConceptId::new("MUSIC", Some("PIANO"), Difficulty::Beginner).as_str(),
            "MUSIC_PIANO_beginner"
        );
        assert_eq!(
            ConceptId::new("COOKING", None, Difficulty::Expert).to_string(),
            "COOKING_general_expert"
        );
    }

    #[test]
    fn test_concept_id_unique_per_scope() {
        let a = ConceptId::new("CODING_SOFTWARE", Some("PYTHON"), Difficulty::Beginner);
        let b = ConceptId::new("CODING", Some("SOFTWARE_PYTHON"), Difficulty::Beginner);
        assert_ne!(a, b);
        assert_eq!(a.as_str(), "CODING%5FSOFTWARE_PYTHON_beginner");

        let none = ConceptId::new("MUSIC", None, Difficulty::Beginner);
        let general = ConceptId::new("MUSIC", Some("general"), Difficulty::Beginner);
        assert_ne!(none, general);
        assert_eq!(general.as_str(), "MUSIC_%67eneral_beginner");

        let percent = ConceptId::new("A%5F", None, Difficulty::Expert);
        let underscore = ConceptId::new("A_", None, Difficulty::Expert);
        assert_ne!(percent, underscore);
    }

    #[test]
    fn test_edge_kind_display() {
        assert_eq!(EdgeKind::DifficultyProgression.to_string(), "difficulty_progression");
        assert_eq!(
            EdgeKind::Inferred("similarity".into()).to_string(),
            "inferred:similarity"
        );
    }
}
