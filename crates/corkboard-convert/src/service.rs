//! Facade tying the queue, worker and config together.
//!
//! The embedding process (upload handler, CLI, test harness) constructs one
//! [`ConversionService`] and enqueues uploaded files through it; everything
//! else in this crate hangs off the service's queue.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::ConvertConfig;
use crate::error::ConvertError;
use crate::job::ConversionJob;
use crate::queue::{ConversionQueue, JobHandle};
use crate::worker::DocumentConverter;

const QUEUE_NAME: &str = "document-conversion";

pub struct ConversionService {
    config: ConvertConfig,
    queue: Arc<ConversionQueue>,
}

impl ConversionService {
    /// Run conversions on the blocking thread pool of the current runtime.
    ///
    /// Must be called from within a Tokio runtime; the queue's worker tasks
    /// are spawned onto it.
    pub fn in_process(config: ConvertConfig) -> Result<Self, ConvertError> {
        config.ensure_dirs()?;
        let queue = ConversionQueue::new(QUEUE_NAME, config.worker_count);
        let converter = DocumentConverter::new(config.clone());
        queue.add_processor(move |job| converter.process(job))?;
        Ok(Self {
            config,
            queue: Arc::new(queue),
        })
    }

    /// Run each conversion in a fresh OS process started from `worker_bin`.
    ///
    /// Must be called from within a Tokio runtime; the queue's worker tasks
    /// are spawned onto it.
    pub fn sandboxed(
        config: ConvertConfig,
        worker_bin: impl Into<PathBuf>,
    ) -> Result<Self, ConvertError> {
        config.ensure_dirs()?;
        let queue = ConversionQueue::new(QUEUE_NAME, config.worker_count);
        queue.add_processor_sandboxed(worker_bin, config.clone())?;
        Ok(Self {
            config,
            queue: Arc::new(queue),
        })
    }

    /// Enqueue an uploaded file for conversion. `filename` is resolved
    /// against the configured asset directory.
    pub fn add_file(
        &self,
        id: impl Into<String>,
        filename: impl Into<String>,
    ) -> Result<JobHandle, ConvertError> {
        let job = ConversionJob {
            id: id.into(),
            filename: filename.into(),
            source_dir: self.config.asset_dir.clone(),
        };
        self.queue.add_task(job)
    }

    pub fn queue_name(&self) -> &str {
        self.queue.name()
    }

    pub fn config(&self) -> &ConvertConfig {
        &self.config
    }
}
