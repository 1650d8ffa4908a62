//! LIFO handoff queue between producers and consumers.
//!
//! `push` and `pop` are atomic with respect to each other: an item is returned by at
//! most one `pop`. `pop` never waits; an empty queue is `Ok(None)`.

pub mod memory;
pub mod sqlite;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

pub use memory::MemoryQueue;
pub use sqlite::SqliteQueue;

/// Reference to a persisted anonymized record, normally its file path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueueItem(String);

impl QueueItem {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Fails for paths that are not valid UTF-8, since items travel as text.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.to_str().map(Self::new)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn path(&self) -> PathBuf {
        PathBuf::from(&self.0)
    }
}

impl fmt::Display for QueueItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue backend error: {0}")]
    Backend(#[from] rusqlite::Error),
    #[error("queue `{0}` is unusable: a client panicked while holding it")]
    Poisoned(String),
}

pub trait WorkQueue {
    fn push(&self, item: &QueueItem) -> Result<(), QueueError>;

    /// Removes and returns the most recently pushed item.
    fn pop(&self) -> Result<Option<QueueItem>, QueueError>;

    fn len(&self) -> Result<usize, QueueError>;

    fn is_empty(&self) -> Result<bool, QueueError> {
        Ok(self.len()? == 0)
    }
}

impl<Q: WorkQueue + ?Sized> WorkQueue for Arc<Q> {
    fn push(&self, item: &QueueItem) -> Result<(), QueueError> {
        (**self).push(item)
    }

    fn pop(&self) -> Result<Option<QueueItem>, QueueError> {
        (**self).pop()
    }

    fn len(&self) -> Result<usize, QueueError> {
        (**self).len()
    }
}

impl<Q: WorkQueue + ?Sized> WorkQueue for &Q {
    fn push(&self, item: &QueueItem) -> Result<(), QueueError> {
        (**self).push(item)
    }

    fn pop(&self) -> Result<Option<QueueItem>, QueueError> {
        (**self).pop()
    }

    fn len(&self) -> Result<usize, QueueError> {
        (**self).len()
    }
}
