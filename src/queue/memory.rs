use std::sync::{Arc, Mutex};

use super::{QueueError, QueueItem, WorkQueue};

/// In-process queue. Clones share the same list.
#[derive(Debug, Clone, Default)]
pub struct MemoryQueue {
    items: Arc<Mutex<Vec<QueueItem>>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WorkQueue for MemoryQueue {
    fn push(&self, item: &QueueItem) -> Result<(), QueueError> {
        let mut items = self
            .items
            .lock()
            .map_err(|_| QueueError::Poisoned("memory".into()))?;
        items.push(item.clone());
        Ok(())
    }

    fn pop(&self) -> Result<Option<QueueItem>, QueueError> {
        let mut items = self
            .items
            .lock()
            .map_err(|_| QueueError::Poisoned("memory".into()))?;
        Ok(items.pop())
    }

    fn len(&self) -> Result<usize, QueueError> {
        let items = self
            .items
            .lock()
            .map_err(|_| QueueError::Poisoned("memory".into()))?;
        Ok(items.len())
    }
}
