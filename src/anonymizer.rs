//! Metadata de-identification.
//!
//! The [`SensitiveTagSet`] is the only place that decides which fields are redacted.
//! Pixel data is copied untouched.

use dicom::core::dictionary::DataDictionary;
use dicom::core::{Tag, VR};
use dicom::dictionary_std::StandardDataDictionary;
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::model::record::is_text_vr;
use crate::model::{FieldValue, Record};
use crate::utils::format_tag;

pub const DEFAULT_SENTINEL: &str = "Anonymized";
pub const DEFAULT_POLICY_VERSION: u32 = 1;
pub const DEFAULT_SENSITIVE_TAGS: &[&str] = &[
    "PatientName",
    "PatientID",
    "PatientBirthDate",
    "PatientAddress",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("sensitive tag set version {version} is empty")]
    Empty { version: u32 },
    #[error("`{name}` is not a known DICOM attribute")]
    UnknownTag { name: String },
    #[error("sensitive field `{name}` ({tag}) has non-textual VR {vr}")]
    NonTextual { name: String, tag: String, vr: VR },
    #[error("redaction sentinel must not be empty")]
    EmptySentinel,
    #[error("redaction sentinel `{0}` contains the `\\` value delimiter")]
    DelimitedSentinel(String),
    #[error("artifact suffix must not be empty")]
    EmptySuffix,
    #[error("artifact {} would overwrite its source", .path.display())]
    OverwritesSource { path: PathBuf },
}

/// Versioned allow-list of field names subject to redaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensitiveTagSet {
    version: u32,
    names: BTreeSet<String>,
}

impl SensitiveTagSet {
    pub fn new<I, S>(version: u32, names: I) -> Result<Self, PolicyError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: BTreeSet<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(PolicyError::Empty { version });
        }
        if let Some(unknown) = names
            .iter()
            .find(|name| StandardDataDictionary.by_name(name).is_none())
        {
            return Err(PolicyError::UnknownTag {
                name: unknown.clone(),
            });
        }
        Ok(Self { version, names })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl Default for SensitiveTagSet {
    fn default() -> Self {
        Self {
            version: DEFAULT_POLICY_VERSION,
            names: DEFAULT_SENSITIVE_TAGS
                .iter()
                .map(|name| name.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedactionAction {
    Redacted { was_empty: bool },
    AlreadyRedacted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformEntry {
    pub tag: Tag,
    pub name: String,
    pub action: RedactionAction,
}

/// Audit trail of one anonymization run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformLog {
    pub policy_version: u32,
    pub entries: Vec<TransformEntry>,
}

impl TransformLog {
    pub fn redacted_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.action, RedactionAction::Redacted { .. }))
            .count()
    }
}

impl fmt::Display for TransformLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "policy v{}:", self.policy_version)?;
        if self.entries.is_empty() {
            return f.write_str(" no sensitive fields present");
        }
        for entry in &self.entries {
            let action = match entry.action {
                RedactionAction::Redacted { was_empty: false } => "redacted",
                RedactionAction::Redacted { was_empty: true } => "redacted (was empty)",
                RedactionAction::AlreadyRedacted => "already redacted",
            };
            write!(f, " {} {} {action};", format_tag(entry.tag), entry.name)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Anonymized {
    pub record: Record,
    pub log: TransformLog,
}

#[derive(Debug, Clone)]
pub struct Anonymizer {
    policy: SensitiveTagSet,
    sentinel: String,
}

impl Default for Anonymizer {
    fn default() -> Self {
        Self {
            policy: SensitiveTagSet::default(),
            sentinel: DEFAULT_SENTINEL.to_string(),
        }
    }
}

impl Anonymizer {
    pub fn new(policy: SensitiveTagSet, sentinel: impl Into<String>) -> Result<Self, PolicyError> {
        let sentinel = sentinel.into();
        if sentinel.trim().is_empty() {
            return Err(PolicyError::EmptySentinel);
        }
        if sentinel.contains('\\') {
            return Err(PolicyError::DelimitedSentinel(sentinel));
        }
        Ok(Self { policy, sentinel })
    }

    pub fn policy(&self) -> &SensitiveTagSet {
        &self.policy
    }

    pub fn sentinel(&self) -> &str {
        &self.sentinel
    }

    /// Returns a copy of `record` with every sensitive top-level field set to the
    /// sentinel. Sensitive names the record does not carry are not added.
    pub fn anonymize(&self, record: &Record) -> Result<Anonymized, PolicyError> {
        let redacted = FieldValue::text([self.sentinel.as_str()]);
        let mut output = record.clone();
        let mut entries = Vec::new();

        let sensitive: Vec<Tag> = record
            .fields()
            .filter(|field| self.policy.contains(&field.name))
            .map(|field| field.tag)
            .collect();

        for tag in sensitive {
            let Some(field) = output.get_mut(tag) else {
                continue;
            };
            if !is_text_vr(field.vr) {
                return Err(PolicyError::NonTextual {
                    name: field.name.clone(),
                    tag: format_tag(tag),
                    vr: field.vr,
                });
            }

            let action = if field.value == redacted {
                RedactionAction::AlreadyRedacted
            } else {
                RedactionAction::Redacted {
                    was_empty: field.value.is_empty(),
                }
            };
            field.value = redacted.clone();
            entries.push(TransformEntry {
                tag,
                name: field.name.clone(),
                action,
            });
        }

        Ok(Anonymized {
            record: output,
            log: TransformLog {
                policy_version: self.policy.version(),
                entries,
            },
        })
    }
}
