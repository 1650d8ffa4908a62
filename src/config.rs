//! Pipeline configuration loaded from a TOML file.
//!
//! Every section is optional; missing values fall back to the defaults below.
//!
//! ```toml
//! [queue]
//! path = "/var/lib/dicomancer/queue.sqlite"
//! name = "anonymized_files"
//!
//! [policy]
//! version = 2
//! sensitive_tags = ["PatientName", "PatientID", "PatientBirthDate", "PatientAddress"]
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::anonymizer::{
    Anonymizer, PolicyError, SensitiveTagSet, DEFAULT_POLICY_VERSION, DEFAULT_SENSITIVE_TAGS,
    DEFAULT_SENTINEL,
};
use crate::model::MetadataMapping;
use crate::producer::ArtifactNaming;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config {}: {source}", .path.display())]
    Invalid {
        path: PathBuf,
        #[source]
        source: PolicyError,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub queue: QueueConfig,
    pub storage: StorageConfig,
    pub policy: PolicyConfig,
    pub artifacts: ArtifactNaming,
    pub metadata: MetadataMapping,
    pub preview: PreviewConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub path: PathBuf,
    pub name: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("dicomancer-queue.sqlite"),
            name: "anonymized_files".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("dicomancer-metadata.sqlite"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub version: u32,
    pub sentinel: String,
    pub sensitive_tags: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            version: DEFAULT_POLICY_VERSION,
            sentinel: DEFAULT_SENTINEL.to_string(),
            sensitive_tags: DEFAULT_SENSITIVE_TAGS
                .iter()
                .map(|name| name.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    pub output_dir: Option<PathBuf>,
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config
            .artifacts
            .validate()
            .map_err(|source| ConfigError::Invalid {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(config)
    }

    /// Builds the anonymizer, validating the sensitive tag set.
    pub fn anonymizer(&self) -> Result<Anonymizer, PolicyError> {
        let policy = SensitiveTagSet::new(self.policy.version, self.policy.sensitive_tags.clone())?;
        Anonymizer::new(policy, self.policy.sentinel.clone())
    }
}
