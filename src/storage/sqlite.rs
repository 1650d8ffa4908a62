//! SQLite storage for extracted metadata
//!
//! Schema:
//! - dicom_metadata: record_key (patient id, study uid, instance uid) -> columns

use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

use super::{MetadataStore, StorageError};
use crate::model::MetadataRecord;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS dicom_metadata (
    record_key TEXT PRIMARY KEY,
    patient_name TEXT,
    patient_id TEXT,
    study_date TEXT,
    study_instance_uid TEXT,
    series_instance_uid TEXT,
    sop_instance_uid TEXT,
    modality TEXT,
    source TEXT NOT NULL,
    stored_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);

CREATE INDEX IF NOT EXISTS idx_dicom_metadata_patient ON dicom_metadata(patient_id);
";

pub struct SqliteMetadataStore {
    conn: Connection,
}

impl SqliteMetadataStore {
    /// Open or create the metadata database at `path`.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|err| {
                StorageError::Unavailable(format!("{}: {err}", parent.display()))
            })?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Open in-memory database (for testing)
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn get(&self, key: &str) -> Result<Option<MetadataRecord>, StorageError> {
        let record = self
            .conn
            .query_row(
                "SELECT patient_name, patient_id, study_date, study_instance_uid,
                        series_instance_uid, sop_instance_uid, modality, source
                 FROM dicom_metadata WHERE record_key = ?",
                params![key],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    pub fn count(&self) -> Result<usize, StorageError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM dicom_metadata", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl MetadataStore for SqliteMetadataStore {
    fn upsert(&mut self, record: &MetadataRecord) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO dicom_metadata (record_key, patient_name, patient_id, study_date,
                 study_instance_uid, series_instance_uid, sop_instance_uid, modality, source)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(record_key) DO UPDATE SET
                 patient_name = excluded.patient_name,
                 study_date = excluded.study_date,
                 series_instance_uid = excluded.series_instance_uid,
                 modality = excluded.modality,
                 source = excluded.source,
                 stored_at = strftime('%s', 'now')",
            params![
                record.record_key(),
                record.patient_name,
                record.patient_id,
                record.study_date,
                record.study_instance_uid,
                record.series_instance_uid,
                record.sop_instance_uid,
                record.modality,
                record.source,
            ],
        )?;
        Ok(())
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<MetadataRecord> {
    Ok(MetadataRecord {
        patient_name: row.get(0)?,
        patient_id: row.get(1)?,
        study_date: row.get(2)?,
        study_instance_uid: row.get(3)?,
        series_instance_uid: row.get(4)?,
        sop_instance_uid: row.get(5)?,
        modality: row.get(6)?,
        source: row.get(7)?,
    })
}
