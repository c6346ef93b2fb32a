use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Type alias for content record identifiers
pub type RecordId = Uuid;

/// One discovered piece of educational content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentRecord {
    /// Unique identifier. UUIDv7 for time-sortability.
    pub id: RecordId,

    /// Where the content lives. Normalized only for fingerprinting,
    /// the original string is kept as observed.
    pub url: String,

    /// Which platform the crawler found this on.
    pub platform: Platform,

    /// Top-level learning domain, e.g. "MUSIC" or "CODING_SOFTWARE".
    pub domain: String,

    /// Optional subdomain, e.g. "PIANO" or "PYTHON".
    pub subdomain: Option<String>,

    pub difficulty: Difficulty,

    pub title: String,

    /// Raw text body (article text, transcript, post + top comments).
    pub body: String,

    /// Freeform tags supplied by the crawler.
    pub tags: Vec<String>,

    /// Specific technique or concept taught, if the crawler knows it.
    pub technique: Option<String>,

    /// The search query that surfaced this record.
    pub query: Option<String>,

    /// Precomputed query/content similarity in [0, 1], if any.
    pub relevance: Option<f64>,

    /// Captions or a transcript are available for this content.
    pub has_captions: bool,

    /// Platform-normalized engagement snapshot. The only field refreshed
    /// after acceptance.
    pub metrics: EngagementMetrics,

    /// Original publication time, when the platform exposes it.
    pub published_at: Option<DateTime<Utc>>,

    /// When the crawler fetched it. Freshness is measured against this.
    pub retrieved_at: DateTime<Utc>,

    pub status: RecordStatus,
}

impl ContentRecord {
    /// Create a pending record retrieved now.
    pub fn new(
        url: impl Into<String>,
        platform: Platform,
        domain: impl Into<String>,
        difficulty: Difficulty,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        ContentRecord {
            id: Uuid::now_v7(),
            url: url.into(),
            platform,
            domain: domain.into(),
            subdomain: None,
            difficulty,
            title: title.into(),
            body: body.into(),
            tags: Vec::new(),
            technique: None,
            query: None,
            relevance: None,
            has_captions: false,
            metrics: EngagementMetrics::default(),
            published_at: None,
            retrieved_at: Utc::now(),
            status: RecordStatus::Pending,
        }
    }

    pub fn with_subdomain(mut self, subdomain: impl Into<String>) -> Self {
        self.subdomain = Some(subdomain.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_technique(mut self, technique: impl Into<String>) -> Self {
        self.technique = Some(technique.into());
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_relevance(mut self, relevance: f64) -> Self {
        self.relevance = Some(relevance);
        self
    }

    pub fn with_captions(mut self, has_captions: bool) -> Self {
        self.has_captions = has_captions;
        self
    }

    pub fn with_metrics(mut self, metrics: EngagementMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_published_at(mut self, published_at: DateTime<Utc>) -> Self {
        self.published_at = Some(published_at);
        self
    }

    pub fn with_retrieved_at(mut self, retrieved_at: DateTime<Utc>) -> Self {
        self.retrieved_at = retrieved_at;
        self
    }

    /// The (domain, subdomain) pair this record belongs to.
    pub fn scope(&self) -> Scope {
        Scope::new(self.domain.clone(), self.subdomain.clone())
    }
}

/// Content platforms. Extensible through `Other`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Youtube,
    Reddit,
    Quora,
    Blog,
    /// User-uploaded content.
    Manual,
    Other(String),
}

impl Platform {
    pub fn as_str(&self) -> &str {
        match self {
            Platform::Youtube => "youtube",
            Platform::Reddit => "reddit",
            Platform::Quora => "quora",
            Platform::Blog => "blog",
            Platform::Manual => "manual",
            Platform::Other(name) => name.as_str(),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for Platform {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "youtube" => Platform::Youtube,
            "reddit" => Platform::Reddit,
            "quora" => Platform::Quora,
            "blog" => Platform::Blog,
            "manual" => Platform::Manual,
            other => Platform::Other(other.to_string()),
        }
    }
}

/// Ordered learning difficulty.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl Difficulty {
    pub const ALL: [Difficulty; 4] = [
        Difficulty::Beginner,
        Difficulty::Intermediate,
        Difficulty::Advanced,
        Difficulty::Expert,
    ];

    /// Numeric level used to measure difficulty jumps between concepts.
    pub fn level(self) -> f64 {
        match self {
            Difficulty::Beginner => 0.2,
            Difficulty::Intermediate => 0.5,
            Difficulty::Advanced => 0.8,
            Difficulty::Expert => 0.95,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
            Difficulty::Expert => "expert",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = crate::error::SyllabusError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(Difficulty::Beginner),
            "intermediate" => Ok(Difficulty::Intermediate),
            "advanced" => Ok(Difficulty::Advanced),
            "expert" => Ok(Difficulty::Expert),
            other => Err(crate::error::SyllabusError::Validation(format!(
                "unknown difficulty '{}'",
                other
            ))),
        }
    }
}

/// Platform-normalized engagement bag. Every field is optional; the scorer
/// substitutes a neutral contribution for anything missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EngagementMetrics {
    pub views: Option<u64>,
    /// Net score (upvotes minus downvotes) on voting platforms.
    pub score: Option<i64>,
    pub likes: Option<u64>,
    pub comments: Option<u64>,
    /// Subscribers, followers, karma or domain reputation.
    pub followers: Option<u64>,
    pub verified: Option<bool>,
}

impl EngagementMetrics {
    /// Overlay a newer observation: any value the newer snapshot knows wins,
    /// anything it lacks keeps the current value.
    pub fn refreshed_with(&self, newer: &EngagementMetrics) -> EngagementMetrics {
        EngagementMetrics {
            views: newer.views.or(self.views),
            score: newer.score.or(self.score),
            likes: newer.likes.or(self.likes),
            comments: newer.comments.or(self.comments),
            followers: newer.followers.or(self.followers),
            verified: newer.verified.or(self.verified),
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &EngagementMetrics::default()
    }
}

/// Lifecycle of a record through the gate and deduplication. Stored records
/// are always `Accepted`; the other states are reported through
/// `IngestOutcome::status`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RecordStatus {
    /// Fresh from a crawler, not yet scored.
    Pending,
    /// Scored below the gate threshold. Never stored.
    Rejected,
    /// Stored as a canonical corpus entry.
    Accepted,
    /// Duplicate of a canonical entry; kept only as a link.
    Linked { canonical: RecordId },
}

/// (domain, subdomain) pair. Prerequisite edges never cross scopes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Scope {
    pub domain: String,
    pub subdomain: Option<String>,
}

impl Scope {
    pub fn new(domain: impl Into<String>, subdomain: Option<String>) -> Self {
        Self {
            domain: domain.into(),
            subdomain,
        }
    }

    /// Key used by storage indexes, e.g. "MUSIC/PIANO" or "MUSIC/".
    pub fn key(&self) -> String {
        format!("{}/{}", self.domain, self.subdomain.as_deref().unwrap_or(""))
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.subdomain {
            Some(sub) => write!(f, "{}/{}", self.domain, sub),
            None => write!(f, "{}", self.domain),
        }
    }
}
