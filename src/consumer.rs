//! Consumer side of the handoff: pop, decode, extract, persist, and optionally
//! render a preview of the middle slice.
//!
//! Popping is destructive. An item that fails after it was popped is reported with
//! the item attached and is not re-queued.

use std::path::PathBuf;

use crate::error::{Failure, Stage};
use crate::image_pipeline::SlicePreview;
use crate::model::{self, MetadataMapping, MetadataRecord, Record};
use crate::queue::{QueueItem, WorkQueue};
use crate::storage::MetadataStore;

#[derive(Debug)]
pub enum Outcome {
    Processed(MetadataRecord),
    Empty,
    Failed(Failure),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainSummary {
    pub processed: usize,
    pub failed: usize,
}

pub struct Consumer<Q, S> {
    queue: Q,
    store: S,
    mapping: MetadataMapping,
    preview_dir: Option<PathBuf>,
}

impl<Q: WorkQueue, S: MetadataStore> Consumer<Q, S> {
    pub fn new(queue: Q, store: S, mapping: MetadataMapping) -> Self {
        match mapping.validate() {
            Ok(warnings) => {
                for warning in warnings {
                    log::warn!("Metadata mapping: {warning}");
                }
            }
            Err(err) => log::warn!("Metadata mapping: {err}; affected columns stay empty"),
        }

        Self {
            queue,
            store,
            mapping,
            preview_dir: None,
        }
    }

    /// Write a PNG of the middle slice of every processed record into `dir`.
    pub fn with_preview_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.preview_dir = Some(dir.into());
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn process_one(&mut self) -> Outcome {
        let item = match self.queue.pop() {
            Ok(Some(item)) => item,
            Ok(None) => {
                log::debug!("Work queue is empty");
                return Outcome::Empty;
            }
            Err(err) => return self.failed(Failure::new(Stage::Popping, None, err)),
        };
        log::info!("Popped file name from work queue: {item}");

        let record = match model::decode(&item.path()) {
            Ok(record) => record,
            Err(err) => return self.failed(Failure::new(Stage::Decoding, Some(item), err)),
        };

        let metadata = self.mapping.extract(&record, item.as_str());

        if let Err(err) = self.store.upsert(&metadata) {
            return self.failed(Failure::new(Stage::Persisting, Some(item), err));
        }
        log::info!("Stored metadata for {item}");

        self.render_preview(&item, &record);
        Outcome::Processed(metadata)
    }

    /// Processes items until the queue reports empty or `limit` items were taken.
    pub fn drain(&mut self, limit: Option<usize>) -> DrainSummary {
        let mut summary = DrainSummary::default();
        while limit.map_or(true, |limit| summary.processed + summary.failed < limit) {
            match self.process_one() {
                Outcome::Processed(_) => summary.processed += 1,
                Outcome::Failed(_) => summary.failed += 1,
                Outcome::Empty => break,
            }
        }
        summary
    }

    fn failed(&self, failure: Failure) -> Outcome {
        match &failure.item {
            Some(item) => log::error!(
                "{item}: {} while {}: {} (item removed from queue)",
                failure.kind(),
                failure.stage,
                failure.error
            ),
            None => log::error!(
                "{} while {}: {}",
                failure.kind(),
                failure.stage,
                failure.error
            ),
        }
        Outcome::Failed(failure)
    }

    fn render_preview(&self, item: &QueueItem, record: &Record) {
        let Some(dir) = &self.preview_dir else {
            return;
        };
        let stem = item
            .path()
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "preview".to_string());
        let target = dir.join(format!("{stem}.png"));

        let rendered = SlicePreview::render_middle_slice(record)
            .and_then(|preview| preview.save_png(&target));
        match rendered {
            Ok(()) => log::info!("Saved middle slice preview: {}", target.display()),
            Err(err) => log::warn!("Unable to build slice preview for {item}: {err}"),
        }
    }
}
