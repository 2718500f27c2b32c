//! Document-to-image conversion pipeline for Corkboard boards.
//!
//! Uploaded PDFs are turned into a per-page pyramid of lossy WebP variants
//! plus an extracted-text sidecar, written into the shared static-asset
//! directory under deterministic names. Work flows through a named async
//! queue whose processors either run in-process (on the blocking thread
//! pool) or in a sandboxed OS process per job, so a crash in the native
//! rendering path cannot take the host down.
//!
//! Typical embedding:
//!
//! ```no_run
//! # async fn demo() -> Result<(), corkboard_convert::ConvertError> {
//! use corkboard_convert::{ConversionService, ConvertConfig};
//!
//! let service = ConversionService::in_process(ConvertConfig::new("/srv/assets"))?;
//! let handle = service.add_file("doc-123", "report.pdf")?;
//! let result = handle.wait().await?;
//! println!("converted {} pages", result.pages.len());
//! # Ok(())
//! # }
//! ```

pub mod canvas;
pub mod config;
pub mod error;
pub mod job;
pub mod queue;
pub mod render;
pub mod sandbox;
pub mod service;
pub mod text;
pub mod worker;

pub use config::ConvertConfig;
pub use error::ConvertError;
pub use job::{
    ConversionJob, ConversionResult, DocumentTextBundle, ImageVariant, PageRenderResult,
};
pub use queue::{ConversionQueue, JobHandle};
pub use service::ConversionService;
pub use worker::DocumentConverter;
