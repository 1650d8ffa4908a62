pub mod memory;
pub mod sqlite;

use thiserror::Error;

use crate::model::MetadataRecord;

pub use memory::MemoryMetadataStore;
pub use sqlite::SqliteMetadataStore;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("metadata database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("metadata store unavailable: {0}")]
    Unavailable(String),
}

/// Durable destination for extracted metadata.
///
/// `upsert` must be atomic per record and idempotent for records sharing a
/// `record_key`.
pub trait MetadataStore {
    fn upsert(&mut self, record: &MetadataRecord) -> Result<(), StorageError>;
}

impl<S: MetadataStore + ?Sized> MetadataStore for Box<S> {
    fn upsert(&mut self, record: &MetadataRecord) -> Result<(), StorageError> {
        (**self).upsert(record)
    }
}

impl<S: MetadataStore + ?Sized> MetadataStore for &mut S {
    fn upsert(&mut self, record: &MetadataRecord) -> Result<(), StorageError> {
        (**self).upsert(record)
    }
}
