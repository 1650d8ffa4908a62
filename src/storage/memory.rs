use std::collections::BTreeMap;

use super::{MetadataStore, StorageError};
use crate::model::MetadataRecord;

/// Keeps rows in a map keyed by `record_key`; useful for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    rows: BTreeMap<String, MetadataRecord>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&MetadataRecord> {
        self.rows.get(key)
    }

    pub fn rows(&self) -> impl Iterator<Item = &MetadataRecord> {
        self.rows.values()
    }
}

impl MetadataStore for MemoryMetadataStore {
    fn upsert(&mut self, record: &MetadataRecord) -> Result<(), StorageError> {
        self.rows.insert(record.record_key(), record.clone());
        Ok(())
    }
}
