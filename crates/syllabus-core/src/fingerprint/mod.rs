//! Exact-duplicate fingerprints and the index that maps them to canonical
//! records.

pub mod normalize;
pub mod store;

pub use normalize::{content_key, normalize_body, normalize_url, url_key};
pub use store::{ClaimOutcome, FingerprintStore, MemoryFingerprintStore};

use crate::types::{ContentRecord, RecordId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which exact key matched.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FingerprintKind {
    Url,
    Content,
}

impl fmt::Display for FingerprintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FingerprintKind::Url => write!(f, "url"),
            FingerprintKind::Content => write!(f, "content"),
        }
    }
}

/// Exact keys of a record plus a reference to its semantic embedding.
///
/// The embedding itself is owned by the similarity search; only the id it is
/// registered under is held here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Fingerprint {
    pub url_key: String,
    /// `None` for an empty body.
    pub content_key: Option<String>,
    pub embedding_ref: RecordId,
}

impl Fingerprint {
    pub fn new(url: &str, body: &str, embedding_ref: RecordId) -> Self {
        Self {
            url_key: url_key(url),
            content_key: content_key(body),
            embedding_ref,
        }
    }

    pub fn of(record: &ContentRecord) -> Self {
        Self::new(&record.url, &record.body, record.id)
    }
}
