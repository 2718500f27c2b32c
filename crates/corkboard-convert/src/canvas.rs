//! Off-screen raster surfaces for page rendering.
//!
//! A [`CanvasFactory`] hands out [`PageCanvas`] values backed by an RGB
//! `mupdf::Pixmap`. The render engine reuses one canvas across the pages of a
//! document: same dimensions get a clear-in-place, different dimensions get a
//! fresh allocation, and `destroy` releases the buffer as soon as the last
//! page is done rather than when the owner goes out of scope.

use anyhow::{ensure, Context, Result};
use mupdf::{Colorspace, Pixmap};

/// Pixel value for an opaque white background.
const WHITE: i32 = 0xff;

pub struct PageCanvas {
    pixmap: Option<Pixmap>,
    width: i32,
    height: i32,
}

impl PageCanvas {
    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn pixmap(&self) -> Option<&Pixmap> {
        self.pixmap.as_ref()
    }

    pub fn is_destroyed(&self) -> bool {
        self.pixmap.is_none()
    }
}

pub struct CanvasFactory {
    colorspace: Colorspace,
}

impl CanvasFactory {
    pub fn new() -> Self {
        Self {
            colorspace: Colorspace::device_rgb(),
        }
    }

    /// Allocate a canvas cleared to opaque white.
    pub fn create(&self, width: i32, height: i32) -> Result<PageCanvas> {
        ensure!(
            width > 0 && height > 0,
            "canvas dimensions must be positive, got {width}x{height}"
        );
        let mut pixmap = Pixmap::new_with_w_h(&self.colorspace, width, height, false)
            .context("failed to allocate page pixmap")?;
        pixmap
            .clear_with(WHITE)
            .context("failed to clear page pixmap")?;
        Ok(PageCanvas {
            pixmap: Some(pixmap),
            width,
            height,
        })
    }

    /// Prepare a canvas for the next page: clear in place when the
    /// dimensions match, reallocate otherwise. A destroyed canvas is
    /// reallocated as well.
    pub fn reset(&self, canvas: &mut PageCanvas, width: i32, height: i32) -> Result<()> {
        match canvas.pixmap.as_mut() {
            Some(pixmap) if canvas.width == width && canvas.height == height => pixmap
                .clear_with(WHITE)
                .context("failed to clear page pixmap"),
            _ => {
                *canvas = self.create(width, height)?;
                Ok(())
            }
        }
    }

    /// Release the backing buffer now instead of waiting for the owner.
    pub fn destroy(&self, canvas: &mut PageCanvas) {
        canvas.pixmap = None;
    }
}

impl Default for CanvasFactory {
    fn default() -> Self {
        Self::new()
    }
}
