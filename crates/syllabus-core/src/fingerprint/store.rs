use super::{Fingerprint, FingerprintKind};
use crate::error::Result;
use crate::types::RecordId;
use std::collections::HashMap;
use std::sync::RwLock;

/// Result of an atomic check-and-insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// Both keys were free and now point at the claiming record.
    Claimed,
    /// A key was already held. Nothing was written.
    Taken {
        kind: FingerprintKind,
        existing: RecordId,
    },
}

/// Maps exact URL and content keys to canonical record ids.
///
/// `claim` is the only write path and must be atomic: two concurrent claims
/// for the same key cannot both see `Claimed`.
pub trait FingerprintStore: Send + Sync {
    /// Load or prepare persisted state. Called once at startup.
    fn init(&self) -> Result<()> {
        Ok(())
    }

    fn lookup(&self, kind: FingerprintKind, key: &str) -> Result<Option<RecordId>>;

    /// Check both exact keys and insert them for `id` if neither is held.
    fn claim(&self, fingerprint: &Fingerprint, id: RecordId) -> Result<ClaimOutcome>;

    /// Drop the keys of `fingerprint` that are still held by `id`. Keys held
    /// by another record are left alone.
    fn release(&self, fingerprint: &Fingerprint, id: RecordId) -> Result<()>;

    /// Persist buffered state, if any.
    fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Number of distinct keys held.
    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn clear(&self) -> Result<()>;
}

#[derive(Default)]
struct Keys {
    urls: HashMap<String, RecordId>,
    contents: HashMap<String, RecordId>,
}

/// In-process fingerprint index. The whole check-and-insert runs under one
/// write lock.
#[derive(Default)]
pub struct MemoryFingerprintStore {
    keys: RwLock<Keys>,
}

impl MemoryFingerprintStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FingerprintStore for MemoryFingerprintStore {
    fn lookup(&self, kind: FingerprintKind, key: &str) -> Result<Option<RecordId>> {
        let keys = self.keys.read().unwrap_or_else(|e| e.into_inner());
        let map = match kind {
            FingerprintKind::Url => &keys.urls,
            FingerprintKind::Content => &keys.contents,
        };
        Ok(map.get(key).copied())
    }

    fn claim(&self, fingerprint: &Fingerprint, id: RecordId) -> Result<ClaimOutcome> {
        let mut keys = self.keys.write().unwrap_or_else(|e| e.into_inner());

        if let Some(existing) = keys.urls.get(&fingerprint.url_key) {
            return Ok(ClaimOutcome::Taken {
                kind: FingerprintKind::Url,
                existing: *existing,
            });
        }
        if let Some(content_key) = &fingerprint.content_key {
            if let Some(existing) = keys.contents.get(content_key) {
                return Ok(ClaimOutcome::Taken {
                    kind: FingerprintKind::Content,
                    existing: *existing,
                });
            }
        }

        keys.urls.insert(fingerprint.url_key.clone(), id);
        if let Some(content_key) = &fingerprint.content_key {
            keys.contents.insert(content_key.clone(), id);
        }
        Ok(ClaimOutcome::Claimed)
    }

    fn release(&self, fingerprint: &Fingerprint, id: RecordId) -> Result<()> {
        let mut keys = self.keys.write().unwrap_or_else(|e| e.into_inner());
        if keys.urls.get(&fingerprint.url_key) == Some(&id) {
            keys.urls.remove(&fingerprint.url_key);
        }
        if let Some(content_key) = &fingerprint.content_key {
            if keys.contents.get(content_key) == Some(&id) {
                keys.contents.remove(content_key);
            }
        }
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        let keys = self.keys.read().unwrap_or_else(|e| e.into_inner());
        Ok(keys.urls.len() + keys.contents.len())
    }

    fn clear(&self) -> Result<()> {
        let mut keys = self.keys.write().unwrap_or_else(|e| e.into_inner());
        keys.urls.clear();
        keys.contents.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use uuid::Uuid;

    fn fp(url: &str, body: &str) -> Fingerprint {
        Fingerprint::new(url, body, Uuid::now_v7())
    }

    #[test]
    fn test_claim_then_lookup() {
        let store = MemoryFingerprintStore::new();
        let id = Uuid::now_v7();
        let f = fp("https://example.com/a", "some body");

        assert_eq!(store.claim(&f, id).unwrap(), ClaimOutcome::Claimed);
        assert_eq!(
            store.lookup(FingerprintKind::Url, &f.url_key).unwrap(),
            Some(id)
        );
        assert_eq!(
            store
                .lookup(FingerprintKind::Content, f.content_key.as_ref().unwrap())
                .unwrap(),
            Some(id)
        );
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn test_second_claim_reports_holder() {
        let store = MemoryFingerprintStore::new();
        let first = Uuid::now_v7();
        store.claim(&fp("https://example.com/a", "body one"), first).unwrap();

        let outcome = store
            .claim(&fp("https://example.com/b", "BODY   one"), Uuid::now_v7())
            .unwrap();
        assert_eq!(
            outcome,
            ClaimOutcome::Taken {
                kind: FingerprintKind::Content,
                existing: first
            }
        );
        // losing claim writes nothing
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn test_empty_body_claims_url_only() {
        let store = MemoryFingerprintStore::new();
        store.claim(&fp("https://example.com/a", ""), Uuid::now_v7()).unwrap();
        let outcome = store
            .claim(&fp("https://example.com/b", ""), Uuid::now_v7())
            .unwrap();
        assert_eq!(outcome, ClaimOutcome::Claimed);
    }

    #[test]
    fn test_concurrent_claims_single_winner() {
        let store = Arc::new(MemoryFingerprintStore::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    store
                        .claim(&fp("https://example.com/race", "same body"), Uuid::now_v7())
                        .unwrap()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|o| *o == ClaimOutcome::Claimed)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_release_keeps_other_holders() {
        let store = MemoryFingerprintStore::new();
        let first = Uuid::now_v7();
        let second = Uuid::now_v7();
        store.claim(&fp("https://example.com/a", "shared body"), first).unwrap();

        // same body, different url: releasing for `second` must not free `first`'s keys
        let other = fp("https://example.com/b", "shared body");
        store.release(&other, second).unwrap();
        assert_eq!(store.len().unwrap(), 2);

        store.release(&fp("https://example.com/a", "shared body"), first).unwrap();
        assert!(store.is_empty().unwrap());
        assert_eq!(store.claim(&other, second).unwrap(), ClaimOutcome::Claimed);
    }

    #[test]
    fn test_clear() {
        let store = MemoryFingerprintStore::new();
        store.claim(&fp("https://example.com/a", "x"), Uuid::now_v7()).unwrap();
        store.clear().unwrap();
        assert!(store.is_empty().unwrap());
    }
}
