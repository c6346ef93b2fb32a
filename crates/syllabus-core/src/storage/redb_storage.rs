use crate::error::{Result, SyllabusError};
use crate::fingerprint::{ClaimOutcome, Fingerprint, FingerprintKind, FingerprintStore};
use crate::storage::filters::{CorpusStats, RecordFilter};
use crate::storage::traits::{CorpusStore, DuplicateLink, StoredRecord};
use crate::types::RecordId;
use redb::{Database, MultimapTableDefinition, ReadableTable, TableDefinition};
use std::path::{Path, PathBuf};
use std::sync::Arc;

// Table definitions
const RECORDS: TableDefinition<&[u8; 16], &[u8]> = TableDefinition::new("records");
const LINKS: TableDefinition<&[u8; 16], &[u8]> = TableDefinition::new("links");

// Secondary indexes
const RECORDS_BY_SCOPE: MultimapTableDefinition<&str, &[u8; 16]> =
    MultimapTableDefinition::new("records_by_scope");
const LINKS_BY_CANONICAL: MultimapTableDefinition<&[u8; 16], &[u8; 16]> =
    MultimapTableDefinition::new("links_by_canonical");

// Fingerprint keys → canonical record id
const URL_KEYS: TableDefinition<&str, &[u8; 16]> = TableDefinition::new("url_keys");
const CONTENT_KEYS: TableDefinition<&str, &[u8; 16]> = TableDefinition::new("content_keys");

// Metadata table
const META: TableDefinition<&str, &[u8]> = TableDefinition::new("meta");

/// Current schema version.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;
const SCHEMA_VERSION_KEY: &str = "schema_version";

/// Redb-backed corpus and fingerprint index in a single file
pub struct RedbStorage {
    db: Arc<Database>,
    path: PathBuf,
}

impl RedbStorage {
    /// Open or create a database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let is_new = !path.exists();
        let db = Database::create(&path)?;

        if !is_new {
            Self::check_schema_version(&db)?;
        }

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(RECORDS)?;
            let _ = write_txn.open_table(LINKS)?;
            let _ = write_txn.open_multimap_table(RECORDS_BY_SCOPE)?;
            let _ = write_txn.open_multimap_table(LINKS_BY_CANONICAL)?;
            let _ = write_txn.open_table(URL_KEYS)?;
            let _ = write_txn.open_table(CONTENT_KEYS)?;
            let mut meta = write_txn.open_table(META)?;
            if is_new {
                meta.insert(
                    SCHEMA_VERSION_KEY,
                    CURRENT_SCHEMA_VERSION.to_string().as_bytes(),
                )?;
            }
        }
        write_txn.commit()?;

        Ok(Self {
            db: Arc::new(db),
            path,
        })
    }

    /// Refuse to open files written by a different schema.
    fn check_schema_version(db: &Database) -> Result<()> {
        let read_txn = db.begin_read()?;
        let version = read_txn
            .open_table(META)
            .ok()
            .and_then(|t| {
                t.get(SCHEMA_VERSION_KEY).ok().flatten().and_then(|v| {
                    std::str::from_utf8(v.value())
                        .ok()
                        .and_then(|s| s.parse::<u32>().ok())
                })
            })
            .unwrap_or(CURRENT_SCHEMA_VERSION);

        if version != CURRENT_SCHEMA_VERSION {
            return Err(SyllabusError::Validation(format!(
                "Database schema v{} does not match supported v{}",
                version, CURRENT_SCHEMA_VERSION
            )));
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn uuid_to_bytes(id: &uuid::Uuid) -> [u8; 16] {
        *id.as_bytes()
    }

    fn bytes_to_uuid(bytes: &[u8; 16]) -> uuid::Uuid {
        uuid::Uuid::from_bytes(*bytes)
    }

    fn serialize_record(stored: &StoredRecord) -> Result<Vec<u8>> {
        bincode::serialize(stored).map_err(SyllabusError::from)
    }

    fn deserialize_record(bytes: &[u8]) -> Result<StoredRecord> {
        bincode::deserialize(bytes).map_err(SyllabusError::from)
    }

    fn serialize_link(link: &DuplicateLink) -> Result<Vec<u8>> {
        bincode::serialize(link).map_err(SyllabusError::from)
    }

    fn deserialize_link(bytes: &[u8]) -> Result<DuplicateLink> {
        bincode::deserialize(bytes).map_err(SyllabusError::from)
    }

    /// Ids under an exact (domain, subdomain) scope key
    fn ids_in_scope(&self, scope_key: &str) -> Result<Vec<RecordId>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_multimap_table(RECORDS_BY_SCOPE)?;
        let ids = index
            .get(scope_key)?
            .map(|result| result.map(|guard| Self::bytes_to_uuid(guard.value())))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }
}

impl CorpusStore for RedbStorage {
    fn put_record(&self, stored: &StoredRecord) -> Result<()> {
        let id_bytes = Self::uuid_to_bytes(&stored.id());
        let write_txn = self.db.begin_write()?;

        let old = {
            let table = write_txn.open_table(RECORDS)?;
            let old_bytes = table.get(&id_bytes)?.map(|guard| guard.value().to_vec());
            old_bytes
                .map(|bytes| Self::deserialize_record(&bytes))
                .transpose()?
        };

        let bytes = Self::serialize_record(stored)?;
        {
            let mut table = write_txn.open_table(RECORDS)?;
            table.insert(&id_bytes, bytes.as_slice())?;
        }

        {
            let mut index = write_txn.open_multimap_table(RECORDS_BY_SCOPE)?;
            if let Some(old) = old {
                index.remove(old.record.scope().key().as_str(), &id_bytes)?;
            }
            index.insert(stored.record.scope().key().as_str(), &id_bytes)?;
        }

        write_txn.commit()?;
        Ok(())
    }

    fn get_record(&self, id: RecordId) -> Result<Option<StoredRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(RECORDS)?;
        let id_bytes = Self::uuid_to_bytes(&id);

        if let Some(bytes) = table.get(&id_bytes)? {
            Ok(Some(Self::deserialize_record(bytes.value())?))
        } else {
            Ok(None)
        }
    }

    fn list_records(&self, filter: &RecordFilter) -> Result<Vec<StoredRecord>> {
        let mut records = Vec::new();

        // Exact scope: use the index
        if let (Some(domain), Some(sub)) = (&filter.domain, &filter.subdomain) {
            let scope_key = format!("{}/{}", domain, sub);
            let ids = self.ids_in_scope(&scope_key)?;

            let read_txn = self.db.begin_read()?;
            let table = read_txn.open_table(RECORDS)?;
            for id in ids {
                if let Some(bytes) = table.get(&Self::uuid_to_bytes(&id))? {
                    let stored = Self::deserialize_record(bytes.value())?;
                    if filter.matches(&stored) {
                        records.push(stored);
                    }
                }
            }
            records.sort_by_key(|r| r.id());
        } else {
            // Full table scan, already in id order
            let read_txn = self.db.begin_read()?;
            let table = read_txn.open_table(RECORDS)?;
            for item in table.iter()? {
                let (_, value) = item?;
                let stored = Self::deserialize_record(value.value())?;
                if filter.matches(&stored) {
                    records.push(stored);
                }
            }
        }

        Ok(filter.paginate(records))
    }

    fn link_duplicate(&self, link: &DuplicateLink) -> Result<bool> {
        let canonical_bytes = Self::uuid_to_bytes(&link.canonical);
        let duplicate_bytes = Self::uuid_to_bytes(&link.duplicate_id);

        // Single write transaction: the link and the refresh land together
        let write_txn = self.db.begin_write()?;

        let mut canonical = {
            let table = write_txn.open_table(RECORDS)?;
            let bytes = table
                .get(&canonical_bytes)?
                .map(|guard| guard.value().to_vec())
                .ok_or(SyllabusError::RecordNotFound(link.canonical))?;
            Self::deserialize_record(&bytes)?
        };

        let refreshed = canonical.refresh_metrics(&link.metrics, link.observed_at);
        if refreshed {
            let bytes = Self::serialize_record(&canonical)?;
            let mut table = write_txn.open_table(RECORDS)?;
            table.insert(&canonical_bytes, bytes.as_slice())?;
        }

        {
            let bytes = Self::serialize_link(link)?;
            let mut links = write_txn.open_table(LINKS)?;
            links.insert(&duplicate_bytes, bytes.as_slice())?;
        }
        {
            let mut index = write_txn.open_multimap_table(LINKS_BY_CANONICAL)?;
            index.insert(&canonical_bytes, &duplicate_bytes)?;
        }

        write_txn.commit()?;
        Ok(refreshed)
    }

    fn duplicates_of(&self, canonical: RecordId) -> Result<Vec<DuplicateLink>> {
        let read_txn = self.db.begin_read()?;
        let links = read_txn.open_table(LINKS)?;
        let index = read_txn.open_multimap_table(LINKS_BY_CANONICAL)?;

        let duplicate_ids: Vec<RecordId> = index
            .get(&Self::uuid_to_bytes(&canonical))?
            .map(|result| result.map(|guard| Self::bytes_to_uuid(guard.value())))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut result = Vec::new();
        for id in duplicate_ids {
            if let Some(bytes) = links.get(&Self::uuid_to_bytes(&id))? {
                result.push(Self::deserialize_link(bytes.value())?);
            }
        }
        Ok(result)
    }

    fn stats(&self) -> Result<CorpusStats> {
        let read_txn = self.db.begin_read()?;
        let records_table = read_txn.open_table(RECORDS)?;
        let links_table = read_txn.open_table(LINKS)?;

        let mut records = Vec::new();
        for item in records_table.iter()? {
            let (_, value) = item?;
            records.push(Self::deserialize_record(value.value())?);
        }
        let link_count = links_table.iter()?.count() as u64;

        let mut stats = CorpusStats::from_records(records.iter(), link_count);
        stats.db_size_bytes = std::fs::metadata(&self.path)
            .map(|m| m.len())
            .unwrap_or(0);
        Ok(stats)
    }
}

impl FingerprintStore for RedbStorage {
    fn init(&self) -> Result<()> {
        // Touch both key tables so a damaged file surfaces at startup.
        let read_txn = self.db.begin_read()?;
        let _ = read_txn.open_table(URL_KEYS)?;
        let _ = read_txn.open_table(CONTENT_KEYS)?;
        Ok(())
    }

    fn lookup(&self, kind: FingerprintKind, key: &str) -> Result<Option<RecordId>> {
        let read_txn = self.db.begin_read()?;
        let table = match kind {
            FingerprintKind::Url => read_txn.open_table(URL_KEYS)?,
            FingerprintKind::Content => read_txn.open_table(CONTENT_KEYS)?,
        };
        let id = table.get(key)?.map(|guard| Self::bytes_to_uuid(guard.value()));
        Ok(id)
    }

    fn claim(&self, fingerprint: &Fingerprint, id: RecordId) -> Result<ClaimOutcome> {
        // redb serializes write transactions, so check and insert are atomic
        let write_txn = self.db.begin_write()?;

        let taken = {
            let urls = write_txn.open_table(URL_KEYS)?;
            let contents = write_txn.open_table(CONTENT_KEYS)?;

            let url_holder = urls
                .get(fingerprint.url_key.as_str())?
                .map(|guard| Self::bytes_to_uuid(guard.value()));
            let content_holder = match &fingerprint.content_key {
                Some(key) => contents
                    .get(key.as_str())?
                    .map(|guard| Self::bytes_to_uuid(guard.value())),
                None => None,
            };

            match (url_holder, content_holder) {
                (Some(existing), _) => Some(ClaimOutcome::Taken {
                    kind: FingerprintKind::Url,
                    existing,
                }),
                (None, Some(existing)) => Some(ClaimOutcome::Taken {
                    kind: FingerprintKind::Content,
                    existing,
                }),
                (None, None) => None,
            }
        };

        if let Some(outcome) = taken {
            write_txn.abort()?;
            return Ok(outcome);
        }

        let id_bytes = Self::uuid_to_bytes(&id);
        {
            let mut urls = write_txn.open_table(URL_KEYS)?;
            urls.insert(fingerprint.url_key.as_str(), &id_bytes)?;
        }
        if let Some(key) = &fingerprint.content_key {
            let mut contents = write_txn.open_table(CONTENT_KEYS)?;
            contents.insert(key.as_str(), &id_bytes)?;
        }

        write_txn.commit()?;
        Ok(ClaimOutcome::Claimed)
    }

    fn release(&self, fingerprint: &Fingerprint, id: RecordId) -> Result<()> {
        let id_bytes = Self::uuid_to_bytes(&id);
        let write_txn = self.db.begin_write()?;
        {
            let mut urls = write_txn.open_table(URL_KEYS)?;
            let held = urls
                .get(fingerprint.url_key.as_str())?
                .is_some_and(|guard| guard.value() == &id_bytes);
            if held {
                urls.remove(fingerprint.url_key.as_str())?;
            }
        }
        if let Some(key) = &fingerprint.content_key {
            let mut contents = write_txn.open_table(CONTENT_KEYS)?;
            let held = contents
                .get(key.as_str())?
                .is_some_and(|guard| guard.value() == &id_bytes);
            if held {
                contents.remove(key.as_str())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        let read_txn = self.db.begin_read()?;
        let urls = read_txn.open_table(URL_KEYS)?;
        let contents = read_txn.open_table(CONTENT_KEYS)?;
        Ok(urls.iter()?.count() + contents.iter()?.count())
    }

    fn clear(&self) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        write_txn.delete_table(URL_KEYS)?;
        write_txn.delete_table(CONTENT_KEYS)?;
        {
            let _ = write_txn.open_table(URL_KEYS)?;
            let _ = write_txn.open_table(CONTENT_KEYS)?;
        }
        write_txn.commit()?;
        Ok(())
    }
}
