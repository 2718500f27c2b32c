//! Page rasterization and the multi-resolution variant pyramid.
//!
//! A page is rendered once at the scale that brings its longer edge near the
//! configured target, then downscaled into a halving pyramid of lossy WebP
//! variants. Every output file is written to a temp name and renamed into
//! place, so an interrupted conversion never leaves a partial file under a
//! final name.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;
use image::RgbImage;
use mupdf::{Device, Matrix, Page};

use crate::canvas::{CanvasFactory, PageCanvas};
use crate::config::ConvertConfig;
use crate::error::ConvertError;
use crate::job::{variant_file_name, ImageVariant};

/// Default target for the longer edge of the largest variant, in pixels.
pub const DEFAULT_LONG_EDGE: u32 = 2000;
/// Upper bound on the render scale factor.
const MAX_SCALE: f32 = 8.0;
/// The pyramid stops once a halved width would be this wide or narrower.
const MIN_PYRAMID_WIDTH: u32 = 500;
/// WebP quality for the largest variant.
const BASE_QUALITY: u8 = 70;
/// WebP quality for the downscaled variants.
const DOWNSCALE_QUALITY: u8 = 75;

/// Integer scale factor that brings the longer page edge near `desired`
/// pixels: `floor(clamp(desired / long_edge, 1, 8))`.
pub fn compute_scale(page_width: f32, page_height: f32, desired: u32) -> u32 {
    let long_edge = page_width.max(page_height);
    if long_edge <= 0.0 {
        return 1;
    }
    (desired as f32 / long_edge).clamp(1.0, MAX_SCALE).floor() as u32
}

/// Widths of the variant pyramid: the full render width, then geometric
/// halving for as long as the halved width stays above the minimum.
pub fn pyramid_widths(max_width: u32) -> Vec<u32> {
    let mut widths = vec![max_width];
    let mut width = max_width;
    loop {
        width /= 2;
        if width > MIN_PYRAMID_WIDTH {
            widths.push(width);
        } else {
            break;
        }
    }
    widths
}

/// Write `bytes` under a temporary name, then rename into place.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut tmp = OsString::from(path.as_os_str());
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)
}

/// Renders the pages of one document, reusing a single canvas across pages.
pub struct PageRenderEngine<'a> {
    config: &'a ConvertConfig,
    factory: CanvasFactory,
    canvas: Option<PageCanvas>,
}

impl<'a> PageRenderEngine<'a> {
    pub fn new(config: &'a ConvertConfig) -> Self {
        Self {
            config,
            factory: CanvasFactory::new(),
            canvas: None,
        }
    }

    /// Render one page and write its variant pyramid into `out_dir`, next to
    /// the source upload. Variants come back in descending width order.
    pub fn render_page(
        &mut self,
        page: &Page,
        out_dir: &Path,
        base_name: &str,
        page_index: usize,
    ) -> Result<Vec<ImageVariant>, ConvertError> {
        self.render_page_inner(page, out_dir, base_name, page_index)
            .map_err(|e| ConvertError::PageRender {
                page: page_index,
                message: format!("{e:#}"),
            })
    }

    fn render_page_inner(
        &mut self,
        page: &Page,
        out_dir: &Path,
        base_name: &str,
        page_index: usize,
    ) -> Result<Vec<ImageVariant>> {
        let bounds = page.bounds().context("failed to read page bounds")?;
        let page_width = bounds.x1 - bounds.x0;
        let page_height = bounds.y1 - bounds.y0;
        let scale = compute_scale(page_width, page_height, self.config.desired_long_edge);
        let pixel_width = (page_width * scale as f32).floor() as i32;
        let pixel_height = (page_height * scale as f32).floor() as i32;

        tracing::debug!(
            page = page_index,
            scale,
            width = pixel_width,
            height = pixel_height,
            "Rendering page"
        );

        match self.canvas.as_mut() {
            Some(canvas) => self.factory.reset(canvas, pixel_width, pixel_height)?,
            None => self.canvas = Some(self.factory.create(pixel_width, pixel_height)?),
        }
        let canvas = self
            .canvas
            .as_ref()
            .ok_or_else(|| anyhow!("render canvas missing"))?;
        let pixmap = canvas
            .pixmap()
            .ok_or_else(|| anyhow!("render canvas already destroyed"))?;

        // Map the page box onto the pixel origin at the chosen scale.
        let mut ctm = Matrix::new_scale(scale as f32, scale as f32);
        ctm.e = -bounds.x0 * scale as f32;
        ctm.f = -bounds.y0 * scale as f32;
        let device = Device::from_pixmap(pixmap).context("failed to open draw device")?;
        page.run(&device, &ctm).context("failed to draw page")?;
        drop(device);

        let width = pixel_width as u32;
        let height = pixel_height as u32;
        let raster = RgbImage::from_raw(width, height, pixmap.samples().to_vec())
            .ok_or_else(|| anyhow!("rendered pixel buffer has unexpected size"))?;

        let mut variants = Vec::new();
        for (step, &variant_width) in pyramid_widths(width).iter().enumerate() {
            let quality = if step == 0 {
                BASE_QUALITY
            } else {
                DOWNSCALE_QUALITY
            };
            let variant_height =
                ((height as u64 * variant_width as u64) / width.max(1) as u64) as u32;
            let encoded = if variant_width == width {
                webp::Encoder::from_rgb(raster.as_raw(), width, height).encode(quality as f32)
            } else {
                let resized = image::imageops::resize(
                    &raster,
                    variant_width,
                    variant_height,
                    FilterType::Lanczos3,
                );
                webp::Encoder::from_rgb(resized.as_raw(), variant_width, variant_height)
                    .encode(quality as f32)
            };

            let file_name = variant_file_name(base_name, page_index, variant_width);
            write_atomic(&out_dir.join(&file_name), &encoded)
                .with_context(|| format!("failed to write {file_name}"))?;
            tracing::trace!(
                page = page_index,
                width = variant_width,
                bytes = encoded.len(),
                "Variant written"
            );

            variants.push(ImageVariant {
                url: self.config.asset_url(&file_name),
                width: variant_width,
                height: variant_height,
                size_bytes: encoded.len() as u64,
                quality,
            });
        }
        Ok(variants)
    }

    /// Release the canvas once the last page of the document is done.
    pub fn finish(&mut self) {
        if let Some(canvas) = self.canvas.as_mut() {
            self.factory.destroy(canvas);
        }
        self.canvas = None;
    }
}
