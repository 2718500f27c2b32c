//! Structured text extraction for the per-page text sidecar.
//!
//! The structured-text walk yields glyph runs with their layout quads.
//! Whitespace runs whose quad is essentially zero-width are artifacts of
//! justified layouts and are dropped; explicit line ends become newlines so
//! the extracted text keeps the page's reading order.

use anyhow::Result;
use mupdf::{Page, TextPageOptions};

/// Whitespace runs narrower than this (page units) carry no layout meaning.
const MIN_RUN_WIDTH: f32 = 0.1;

pub(crate) struct TextRun {
    text: String,
    width: f32,
    ends_line: bool,
}

impl TextRun {
    pub(crate) fn glyph(text: impl Into<String>, width: f32) -> Self {
        Self {
            text: text.into(),
            width,
            ends_line: false,
        }
    }

    pub(crate) fn line_end() -> Self {
        Self {
            text: String::new(),
            width: 0.0,
            ends_line: true,
        }
    }
}

/// Assemble cleaned page text from extracted runs.
pub(crate) fn assemble_runs(runs: &[TextRun]) -> String {
    let mut out = String::new();
    for run in runs {
        if run.ends_line {
            out.push('\n');
            continue;
        }
        if run.text.chars().all(char::is_whitespace) && run.width < MIN_RUN_WIDTH {
            continue;
        }
        out.push_str(&run.text);
    }
    out
}

/// Extract the cleaned text content of one page.
pub fn extract_page_text(page: &Page) -> Result<String> {
    let text_page = page.to_text_page(TextPageOptions::empty())?;
    let mut runs = Vec::new();
    for block in text_page.blocks() {
        for line in block.lines() {
            for ch in line.chars() {
                let Some(c) = ch.char() else { continue };
                let quad = ch.quad();
                let left = quad.ul.x.min(quad.ll.x);
                let right = quad.ur.x.max(quad.lr.x);
                runs.push(TextRun::glyph(c.to_string(), (right - left).max(0.0)));
            }
            runs.push(TextRun::line_end());
        }
    }
    Ok(assemble_runs(&runs))
}
