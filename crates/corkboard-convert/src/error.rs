//! Error taxonomy for the conversion pipeline.
//!
//! Operational tooling distinguishes "bad input" (`DocumentParse`,
//! `PageRender`) from "infrastructure fault" (`ProcessCrash`, `Io`), so the
//! variants are kept separate rather than collapsed into one message string.

use thiserror::Error;

/// Errors surfaced to callers through a [`crate::queue::JobHandle`].
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The source file could not be opened or parsed as a document.
    /// Terminal for the whole job; no partial output is produced.
    #[error("failed to parse document: {0}")]
    DocumentParse(String),

    /// Rasterization, text extraction, resize or encode failed for one page.
    /// Aborts the remaining pages of the document.
    #[error("failed to render page {page}: {message}")]
    PageRender { page: usize, message: String },

    /// The sandboxed worker process died, was killed, or returned an
    /// unreadable reply. Also covers a panicking in-process handler.
    #[error("conversion worker crashed: {0}")]
    ProcessCrash(String),

    /// Failure reading the source file or writing an output artifact.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The queue's channel is gone; the job can no longer complete.
    #[error("conversion queue is closed")]
    QueueClosed,

    /// A processor was already registered on this queue.
    #[error("conversion queue already has a processor registered")]
    ProcessorRegistered,
}
