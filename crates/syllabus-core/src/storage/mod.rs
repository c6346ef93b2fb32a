mod filters;
mod memory;
mod redb_storage;
mod traits;

pub use filters::{CorpusStats, RecordFilter};
pub use memory::MemoryCorpus;
pub use redb_storage::{RedbStorage, CURRENT_SCHEMA_VERSION};
pub use traits::{CorpusStore, DuplicateLink, StoredRecord};
