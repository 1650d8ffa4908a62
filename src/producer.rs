//! Producer side of the handoff: decode, anonymize, encode, then enqueue.
//!
//! The artifact is fully written before its reference is pushed, so a failure at
//! any step leaves nothing on the queue.

use serde::Deserialize;
use std::io;
use std::path::{Path, PathBuf};

use crate::anonymizer::{Anonymizer, PolicyError};
use crate::error::{Failure, Stage};
use crate::model::{self, CodecError};
use crate::queue::{QueueItem, WorkQueue};

pub const DEFAULT_SUFFIX: &str = "_anonymized";

/// How anonymized artifacts are named: `<stem><suffix>.<ext>`, next to the source
/// unless `output_dir` is set.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ArtifactNaming {
    pub suffix: String,
    pub output_dir: Option<PathBuf>,
}

impl Default for ArtifactNaming {
    fn default() -> Self {
        Self {
            suffix: DEFAULT_SUFFIX.to_string(),
            output_dir: None,
        }
    }
}

impl ArtifactNaming {
    /// Rejects naming that would write artifacts over their sources.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.suffix.trim().is_empty() {
            return Err(PolicyError::EmptySuffix);
        }
        Ok(())
    }

    pub fn artifact_path(&self, source: &Path) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut name = format!("{stem}{}", self.suffix);
        if let Some(extension) = source.extension() {
            name.push('.');
            name.push_str(&extension.to_string_lossy());
        }

        match &self.output_dir {
            Some(dir) => dir.join(name),
            None => source.with_file_name(name),
        }
    }
}

pub struct Producer<Q> {
    queue: Q,
    anonymizer: Anonymizer,
    naming: ArtifactNaming,
}

impl<Q: WorkQueue> Producer<Q> {
    pub fn new(queue: Q, anonymizer: Anonymizer, naming: ArtifactNaming) -> Self {
        Self {
            queue,
            anonymizer,
            naming,
        }
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    /// Runs one source through the pipeline. Failures are logged and reported as
    /// `None`; they never affect later calls.
    pub fn process(&self, source: &Path) -> Option<QueueItem> {
        match self.try_process(source) {
            Ok(item) => Some(item),
            Err(failure) => {
                log::error!(
                    "{}: {} while {}: {}",
                    source.display(),
                    failure.kind(),
                    failure.stage,
                    failure.error
                );
                None
            }
        }
    }

    pub fn try_process(&self, source: &Path) -> Result<QueueItem, Failure> {
        log::info!("Anonymizing DICOM file: {}", source.display());
        let record =
            model::decode(source).map_err(|err| Failure::new(Stage::Decoding, None, err))?;

        let anonymized = self
            .anonymizer
            .anonymize(&record)
            .map_err(|err| Failure::new(Stage::Anonymizing, None, err))?;
        log::info!("{}: {}", source.display(), anonymized.log);

        let destination = self.naming.artifact_path(source);
        if is_same_file(source, &destination) {
            return Err(Failure::new(
                Stage::Encoding,
                None,
                PolicyError::OverwritesSource { path: destination },
            ));
        }
        let item = QueueItem::from_path(&destination).ok_or_else(|| {
            Failure::new(
                Stage::Encoding,
                None,
                CodecError::Io {
                    path: destination.clone(),
                    source: io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "artifact path is not valid UTF-8",
                    ),
                },
            )
        })?;

        model::encode(&anonymized.record, &destination)
            .map_err(|err| Failure::new(Stage::Encoding, Some(item.clone()), err))?;

        self.queue
            .push(&item)
            .map_err(|err| Failure::new(Stage::Enqueuing, Some(item.clone()), err))?;
        log::info!("Queued anonymized file: {item}");
        Ok(item)
    }
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anonymizer::SensitiveTagSet;
    use crate::error::{ErrorKind, PipelineError};
    use crate::queue::MemoryQueue;
    use crate::test_support::sample_record;

    #[test]
    fn artifact_names_carry_the_suffix() {
        let naming = ArtifactNaming::default();
        assert_eq!(
            naming.artifact_path(Path::new("/data/ct/scan.dcm")),
            PathBuf::from("/data/ct/scan_anonymized.dcm")
        );
        assert_eq!(
            naming.artifact_path(Path::new("scan")),
            PathBuf::from("scan_anonymized")
        );
        // only the file name changes, never a directory that happens to contain ".dcm"
        assert_eq!(
            naming.artifact_path(Path::new("/data/batch.dcm/scan.dcm")),
            PathBuf::from("/data/batch.dcm/scan_anonymized.dcm")
        );
    }

    #[test]
    fn output_dir_redirects_artifacts() {
        let naming = ArtifactNaming {
            suffix: "_deid".into(),
            output_dir: Some(PathBuf::from("/out")),
        };
        assert_eq!(
            naming.artifact_path(Path::new("/data/scan.dcm")),
            PathBuf::from("/out/scan_deid.dcm")
        );
    }

    #[test]
    fn writes_artifact_then_pushes_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("scan.dcm");
        model::encode(&sample_record(), &source).unwrap();

        let queue = MemoryQueue::new();
        let producer = Producer::new(
            queue.clone(),
            Anonymizer::default(),
            ArtifactNaming::default(),
        );
        let item = producer.process(&source).unwrap();

        assert_eq!(item.path(), dir.path().join("scan_anonymized.dcm"));
        assert_eq!(queue.pop().unwrap(), Some(item.clone()));
        let artifact = model::decode(&item.path()).unwrap();
        assert_eq!(artifact.text("PatientName"), Some("Anonymized"));
        // the source stays as it was
        assert_eq!(model::decode(&source).unwrap(), sample_record());
    }

    #[test]
    fn failures_push_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let queue = MemoryQueue::new();
        let producer = Producer::new(
            queue.clone(),
            Anonymizer::default(),
            ArtifactNaming::default(),
        );

        let missing = producer
            .try_process(&dir.path().join("missing.dcm"))
            .unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::Io);
        assert_eq!(missing.stage, Stage::Decoding);

        let garbage = dir.path().join("garbage.dcm");
        std::fs::write(&garbage, b"not dicom").unwrap();
        assert_eq!(
            producer.try_process(&garbage).unwrap_err().kind(),
            ErrorKind::Format
        );
        assert!(producer.process(&garbage).is_none());

        assert!(queue.is_empty().unwrap());
    }

    #[test]
    fn unwritable_destination_pushes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("scan.dcm");
        model::encode(&sample_record(), &source).unwrap();

        let queue = MemoryQueue::new();
        let naming = ArtifactNaming {
            output_dir: Some(dir.path().join("missing-dir")),
            ..ArtifactNaming::default()
        };
        let producer = Producer::new(queue.clone(), Anonymizer::default(), naming);
        let failure = producer.try_process(&source).unwrap_err();

        assert_eq!(failure.stage, Stage::Encoding);
        assert_eq!(failure.kind(), ErrorKind::Io);
        assert!(queue.is_empty().unwrap());
        assert!(!dir.path().join("missing-dir").exists());
    }

    #[test]
    fn artifact_never_replaces_its_source() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("scan.dcm");
        model::encode(&sample_record(), &source).unwrap();

        let queue = MemoryQueue::new();
        let naming = ArtifactNaming {
            suffix: String::new(),
            output_dir: None,
        };
        assert_eq!(naming.validate(), Err(PolicyError::EmptySuffix));

        let producer = Producer::new(queue.clone(), Anonymizer::default(), naming);
        let failure = producer.try_process(&source).unwrap_err();

        assert_eq!(failure.kind(), ErrorKind::Policy);
        assert_eq!(failure.stage, Stage::Encoding);
        assert!(queue.is_empty().unwrap());
        assert_eq!(model::decode(&source).unwrap(), sample_record());
    }

    #[test]
    fn output_dir_pointing_at_the_source_dir_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("scan.dcm");
        model::encode(&sample_record(), &source).unwrap();

        let naming = ArtifactNaming {
            suffix: String::new(),
            output_dir: Some(dir.path().join(".")),
        };
        let producer = Producer::new(MemoryQueue::new(), Anonymizer::default(), naming);
        let failure = producer.try_process(&source).unwrap_err();

        assert!(matches!(
            failure.error,
            PipelineError::Policy(PolicyError::OverwritesSource { .. })
        ));
        assert_eq!(model::decode(&source).unwrap(), sample_record());
    }

    #[test]
    fn policy_violations_are_classified() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("scan.dcm");
        model::encode(&sample_record(), &source).unwrap();

        let policy = SensitiveTagSet::new(1, ["Rows"]).unwrap();
        let anonymizer = Anonymizer::new(policy, "Anonymized").unwrap();
        let queue = MemoryQueue::new();
        let producer = Producer::new(queue.clone(), anonymizer, ArtifactNaming::default());

        let failure = producer.try_process(&source).unwrap_err();
        assert_eq!(failure.kind(), ErrorKind::Policy);
        assert_eq!(failure.stage, Stage::Anonymizing);
        assert!(!dir.path().join("scan_anonymized.dcm").exists());
        assert!(queue.is_empty().unwrap());
    }
}
