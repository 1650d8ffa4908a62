use std::fmt;
use thiserror::Error;

use crate::anonymizer::PolicyError;
use crate::model::codec::CodecError;
use crate::queue::{QueueError, QueueItem};
use crate::storage::StorageError;

/// Classification reported for every failed producer or consumer run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Format,
    Io,
    Queue,
    Policy,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Format => "FormatError",
            ErrorKind::Io => "IOError",
            ErrorKind::Queue => "QueueError",
            ErrorKind::Policy => "PolicyError",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Codec(err) => err.kind(),
            PipelineError::Queue(_) => ErrorKind::Queue,
            PipelineError::Policy(_) => ErrorKind::Policy,
            PipelineError::Storage(_) => ErrorKind::Io,
        }
    }
}

/// Step of the producer or consumer run that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Decoding,
    Anonymizing,
    Encoding,
    Enqueuing,
    Popping,
    Persisting,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Decoding => "decoding",
            Stage::Anonymizing => "anonymizing",
            Stage::Encoding => "encoding",
            Stage::Enqueuing => "enqueuing",
            Stage::Popping => "popping",
            Stage::Persisting => "persisting",
        };
        f.write_str(name)
    }
}

/// A failed run. `item` carries the queue reference involved, if one was popped or
/// named, so it can be recovered by hand.
#[derive(Debug, Error)]
#[error("{kind} while {stage}: {error}", kind = .error.kind())]
pub struct Failure {
    pub stage: Stage,
    pub item: Option<QueueItem>,
    #[source]
    pub error: PipelineError,
}

impl Failure {
    pub fn new(stage: Stage, item: Option<QueueItem>, error: impl Into<PipelineError>) -> Self {
        Self {
            stage,
            item,
            error: error.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}
