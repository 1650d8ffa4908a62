//! De-identification and metadata handoff for DICOM files.
//!
//! A [`Producer`] anonymizes a source file, writes the result next to it and pushes
//! the artifact path onto a LIFO [`WorkQueue`]. A [`Consumer`] pops paths, extracts
//! a [`MetadataRecord`] and hands it to a [`MetadataStore`].

pub mod anonymizer;
pub mod config;
pub mod consumer;
pub mod error;
pub mod image_pipeline;
pub mod model;
pub mod producer;
pub mod queue;
pub mod storage;
pub mod utils;

#[cfg(test)]
mod test_support;

pub use anonymizer::{Anonymized, Anonymizer, PolicyError, SensitiveTagSet, TransformLog};
pub use config::{ConfigError, PipelineConfig};
pub use consumer::{Consumer, DrainSummary, Outcome};
pub use error::{ErrorKind, Failure, PipelineError, Stage};
pub use image_pipeline::{Preview, RenderError, SlicePreview};
pub use model::{MetadataMapping, MetadataRecord, Record};
pub use producer::{ArtifactNaming, Producer};
pub use queue::{MemoryQueue, QueueError, QueueItem, SqliteQueue, WorkQueue};
pub use storage::{MemoryMetadataStore, MetadataStore, SqliteMetadataStore, StorageError};
