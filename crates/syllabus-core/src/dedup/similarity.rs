use crate::error::Result;
use crate::scoring::tokens;
use crate::types::{ContentRecord, RecordId, Scope};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// Request for near-duplicates of a piece of content.
#[derive(Debug, Clone)]
pub struct SimilarityQuery {
    pub id: RecordId,
    pub text: String,
    /// Only candidates in this (domain, subdomain) are eligible.
    pub scope: Scope,
    pub top_k: usize,
}

impl SimilarityQuery {
    pub fn for_record(record: &ContentRecord, top_k: usize) -> Self {
        Self {
            id: record.id,
            text: similarity_text(record),
            scope: record.scope(),
            top_k,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimilarMatch {
    pub id: RecordId,
    pub scope: Scope,
    pub similarity: f64,
}

/// Text a record is embedded from.
pub fn similarity_text(record: &ContentRecord) -> String {
    format!("{}\n{}", record.title, record.body)
}

/// Semantic similarity capability, usually backed by an external vector
/// store.
#[async_trait]
pub trait SimilaritySearch: Send + Sync {
    /// Best matches in the query scope, highest similarity first.
    async fn find_similar(&self, query: &SimilarityQuery) -> Result<Vec<SimilarMatch>>;

    /// Register an accepted record so later near-duplicates can find it.
    async fn upsert(&self, record: &ContentRecord) -> Result<()>;
}

struct TermVector {
    scope: Scope,
    weights: HashMap<String, f64>,
    norm: f64,
}

impl TermVector {
    fn from_text(text: &str, scope: Scope) -> Self {
        let mut weights: HashMap<String, f64> = HashMap::new();
        for token in tokens(text) {
            *weights.entry(token).or_insert(0.0) += 1.0;
        }
        let norm = weights.values().map(|w| w * w).sum::<f64>().sqrt();
        Self {
            scope,
            weights,
            norm,
        }
    }

    fn cosine(&self, other: &TermVector) -> f64 {
        if self.norm == 0.0 || other.norm == 0.0 {
            return 0.0;
        }
        let (small, large) = if self.weights.len() <= other.weights.len() {
            (&self.weights, &other.weights)
        } else {
            (&other.weights, &self.weights)
        };
        let dot: f64 = small
            .iter()
            .filter_map(|(term, w)| large.get(term).map(|v| w * v))
            .sum();
        (dot / (self.norm * other.norm)).clamp(0.0, 1.0)
    }
}

/// In-process bag-of-words cosine index.
///
/// Stands in for a vector store in tests and offline runs. Similarity is
/// computed over term frequencies of the title and body.
#[derive(Default)]
pub struct TermVectorIndex {
    entries: RwLock<HashMap<RecordId, TermVector>>,
}

impl TermVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index a record synchronously. Used to warm the index from a stored
    /// corpus at startup.
    pub fn insert(&self, record: &ContentRecord) {
        let vector = TermVector::from_text(&similarity_text(record), record.scope());
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(record.id, vector);
    }

    fn search(&self, query: &SimilarityQuery) -> Vec<SimilarMatch> {
        let query_vector = TermVector::from_text(&query.text, query.scope.clone());
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());

        let mut matches: Vec<SimilarMatch> = entries
            .iter()
            .filter(|(id, entry)| **id != query.id && entry.scope == query.scope)
            .map(|(id, entry)| SimilarMatch {
                id: *id,
                scope: entry.scope.clone(),
                similarity: query_vector.cosine(entry),
            })
            .filter(|m| m.similarity > 0.0)
            .collect();

        matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.id.cmp(&b.id))
        });
        matches.truncate(query.top_k);
        matches
    }
}

#[async_trait]
impl SimilaritySearch for TermVectorIndex {
    async fn find_similar(&self, query: &SimilarityQuery) -> Result<Vec<SimilarMatch>> {
        Ok(self.search(query))
    }

    async fn upsert(&self, record: &ContentRecord) -> Result<()> {
        self.insert(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Difficulty, Platform};

    fn record(sub: &str, title: &str, body: &str) -> ContentRecord {
        ContentRecord::new(
            format!("https://example.com/{}", uuid::Uuid::now_v7()),
            Platform::Youtube,
            "MUSIC",
            Difficulty::Beginner,
            title,
            body,
        )
        .with_subdomain(sub)
    }

    #[tokio::test]
    async fn test_identical_text_is_fully_similar() {
        let index = TermVectorIndex::new();
        let original = record("PIANO", "Major scales", "Practice major scales slowly with both hands");
        index.upsert(&original).await.unwrap();

        let copy = record("PIANO", "Major scales", "Practice major scales slowly with both hands");
        let matches = index
            .find_similar(&SimilarityQuery::for_record(&copy, 3))
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, original.id);
        assert!(matches[0].similarity > 0.999);
    }

    #[tokio::test]
    async fn test_other_scope_is_invisible() {
        let index = TermVectorIndex::new();
        index
            .upsert(&record("GUITAR", "Major scales", "Practice major scales slowly"))
            .await
            .unwrap();

        let lookup = record("PIANO", "Major scales", "Practice major scales slowly");
        let matches = index
            .find_similar(&SimilarityQuery::for_record(&lookup, 3))
            .await
            .unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn test_ranking_and_top_k() {
        let index = TermVectorIndex::new();
        let close = record("PIANO", "Chord voicings", "Jazz chord voicings for piano players");
        let far = record("PIANO", "Posture", "Sit upright and relax shoulders while playing chord");
        index.upsert(&close).await.unwrap();
        index.upsert(&far).await.unwrap();
        assert_eq!(index.len(), 2);

        let lookup = record("PIANO", "Chord voicings", "Jazz chord voicings for piano");
        let matches = index
            .find_similar(&SimilarityQuery::for_record(&lookup, 1))
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, close.id);
    }

    #[test]
    fn test_empty_text_has_zero_similarity() {
        let scope = Scope::new("MUSIC", None);
        let a = TermVector::from_text("", scope.clone());
        let b = TermVector::from_text("piano", scope);
        assert_eq!(a.cosine(&b), 0.0);
    }
}
