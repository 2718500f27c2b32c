//! Job and result types, plus the deterministic output-naming scheme.
//!
//! Output paths are pure functions of (document base name, page index,
//! variant width). Reprocessing a document therefore overwrites its previous
//! artifacts instead of accumulating new ones.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A request to convert one uploaded document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionJob {
    /// Caller-supplied document id, echoed back in the result.
    pub id: String,
    /// File name of the upload inside `source_dir`.
    pub filename: String,
    /// Directory holding the upload; artifacts are written next to it.
    pub source_dir: PathBuf,
}

/// One encoded image file produced for a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageVariant {
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub size_bytes: u64,
    pub quality: u8,
}

/// Everything produced for a single page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRenderResult {
    pub page_index: usize,
    /// Variants in descending width order, largest first.
    pub images: Vec<ImageVariant>,
    pub text_content: String,
}

/// The `<base>-text.json` sidecar, one entry per page in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentTextBundle {
    pub page_count: usize,
    pub pages: Vec<String>,
}

/// Aggregated outcome of a whole-document conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResult {
    pub id: String,
    pub file: String,
    pub pages: Vec<PageRenderResult>,
}

/// File name with its final extension stripped, used as the artifact prefix.
pub fn document_base_name(filename: &str) -> &str {
    Path::new(filename)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(filename)
}

pub fn variant_file_name(base: &str, page_index: usize, width: u32) -> String {
    format!("{base}-{page_index}-{width}.webp")
}

pub fn text_bundle_file_name(base: &str) -> String {
    format!("{base}-text.json")
}
