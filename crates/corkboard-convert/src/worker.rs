//! Whole-document conversion.
//!
//! `DocumentConverter` is the synchronous core that both execution modes
//! share: the in-process queue pool calls it from `spawn_blocking`, and the
//! sandboxed worker binary calls it after decoding its job request.

use mupdf::Document;

use crate::config::ConvertConfig;
use crate::error::ConvertError;
use crate::job::{
    document_base_name, text_bundle_file_name, ConversionJob, ConversionResult,
    DocumentTextBundle, PageRenderResult,
};
use crate::render::{write_atomic, PageRenderEngine};
use crate::text::extract_page_text;

pub struct DocumentConverter {
    config: ConvertConfig,
}

impl DocumentConverter {
    pub fn new(config: ConvertConfig) -> Self {
        Self { config }
    }

    /// Convert one document: render every page's variant pyramid, extract
    /// its text, and write the text bundle once the whole document is done.
    ///
    /// Pages are processed in order and the first failing page aborts the
    /// rest; no text bundle is written for a partially converted document.
    pub fn process(&self, job: &ConversionJob) -> Result<ConversionResult, ConvertError> {
        let source_path = job.source_dir.join(&job.filename);
        let bytes = std::fs::read(&source_path)?;
        let document = Document::from_bytes(&bytes, "application/pdf")
            .map_err(|e| ConvertError::DocumentParse(e.to_string()))?;
        let page_count = document
            .page_count()
            .map_err(|e| ConvertError::DocumentParse(e.to_string()))? as usize;
        let base_name = document_base_name(&job.filename).to_string();
        tracing::debug!(job_id = %job.id, file = %job.filename, pages = page_count, "Document opened");

        let mut engine = PageRenderEngine::new(&self.config);
        let mut pages = Vec::with_capacity(page_count);
        for page_index in 0..page_count {
            let page = document
                .load_page(page_index as i32)
                .map_err(|e| ConvertError::PageRender {
                    page: page_index,
                    message: e.to_string(),
                })?;
            let text_content =
                extract_page_text(&page).map_err(|e| ConvertError::PageRender {
                    page: page_index,
                    message: format!("{e:#}"),
                })?;
            let images = engine.render_page(&page, &job.source_dir, &base_name, page_index)?;
            pages.push(PageRenderResult {
                page_index,
                images,
                text_content,
            });
        }
        engine.finish();

        let bundle = DocumentTextBundle {
            page_count,
            pages: pages.iter().map(|p| p.text_content.clone()).collect(),
        };
        let encoded = serde_json::to_vec_pretty(&bundle).map_err(std::io::Error::other)?;
        write_atomic(
            &job.source_dir.join(text_bundle_file_name(&base_name)),
            &encoded,
        )?;

        tracing::info!(job_id = %job.id, file = %job.filename, pages = page_count, "Document converted");
        Ok(ConversionResult {
            id: job.id.clone(),
            file: job.filename.clone(),
            pages,
        })
    }
}
