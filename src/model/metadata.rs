use dicom::core::dictionary::DataDictionary;
use dicom::dictionary_std::StandardDataDictionary;
use serde::Deserialize;
use std::fmt;

use super::Record;
use crate::anonymizer::PolicyError;
use crate::utils::value_to_column;

/// Flat metadata row handed to the storage collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataRecord {
    pub patient_name: Option<String>,
    pub patient_id: Option<String>,
    pub study_date: Option<String>,
    pub study_instance_uid: Option<String>,
    pub series_instance_uid: Option<String>,
    pub sop_instance_uid: Option<String>,
    pub modality: Option<String>,
    pub source: String,
}

impl MetadataRecord {
    /// Storage identity of the row.
    ///
    /// Anonymized patient IDs are all the same, so a row without a SOP instance UID
    /// is identified by its source path instead.
    pub fn record_key(&self) -> String {
        let patient = self.patient_id.as_deref().unwrap_or("");
        let study = self.study_instance_uid.as_deref().unwrap_or("");
        match &self.sop_instance_uid {
            Some(instance) => format!("{patient}|{study}|{instance}"),
            None => format!("{patient}|{study}|source:{}", self.source),
        }
    }
}

/// Source field name for every metadata column.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MetadataMapping {
    pub patient_name: String,
    pub patient_id: String,
    pub study_date: String,
    pub study_instance_uid: String,
    pub series_instance_uid: String,
    pub sop_instance_uid: String,
    pub modality: String,
}

impl Default for MetadataMapping {
    fn default() -> Self {
        Self {
            patient_name: "PatientName".to_owned(),
            patient_id: "PatientID".to_owned(),
            study_date: "StudyDate".to_owned(),
            study_instance_uid: "StudyInstanceUID".to_owned(),
            series_instance_uid: "SeriesInstanceUID".to_owned(),
            sop_instance_uid: "SOPInstanceUID".to_owned(),
            modality: "Modality".to_owned(),
        }
    }
}

/// A column whose configured source does not look like what the column name promises.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingWarning {
    pub column: &'static str,
    pub source: String,
}

impl fmt::Display for MappingWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "column `{}` is filled from `{}`, which is not a date attribute",
            self.column, self.source
        )
    }
}

impl MetadataMapping {
    /// The mapping of the first deployment, which stored PatientAddress in the
    /// study_date column. Kept so existing tables can still be fed; `validate` flags it.
    pub fn legacy() -> Self {
        Self {
            study_date: "PatientAddress".to_owned(),
            ..Self::default()
        }
    }

    fn columns(&self) -> [(&'static str, &str); 7] {
        [
            ("patient_name", self.patient_name.as_str()),
            ("patient_id", self.patient_id.as_str()),
            ("study_date", self.study_date.as_str()),
            ("study_instance_uid", self.study_instance_uid.as_str()),
            ("series_instance_uid", self.series_instance_uid.as_str()),
            ("sop_instance_uid", self.sop_instance_uid.as_str()),
            ("modality", self.modality.as_str()),
        ]
    }

    /// Checks every source against the data dictionary and reports suspicious columns.
    pub fn validate(&self) -> Result<Vec<MappingWarning>, PolicyError> {
        for (_, source) in self.columns() {
            if StandardDataDictionary.by_name(source).is_none() {
                return Err(PolicyError::UnknownTag {
                    name: source.to_string(),
                });
            }
        }

        let mut warnings = Vec::new();
        if !self.study_date.ends_with("Date") {
            warnings.push(MappingWarning {
                column: "study_date",
                source: self.study_date.clone(),
            });
        }
        Ok(warnings)
    }

    /// Builds the metadata row for `record`. Never fails: absent or binary fields
    /// become `None`.
    pub fn extract(&self, record: &Record, source: &str) -> MetadataRecord {
        let column = |name: &str| {
            record
                .by_name(name)
                .and_then(|field| value_to_column(&field.value))
        };

        MetadataRecord {
            patient_name: column(&self.patient_name),
            patient_id: column(&self.patient_id),
            study_date: column(&self.study_date),
            study_instance_uid: column(&self.study_instance_uid),
            series_instance_uid: column(&self.series_instance_uid),
            sop_instance_uid: column(&self.sop_instance_uid),
            modality: column(&self.modality),
            source: source.to_string(),
        }
    }
}
