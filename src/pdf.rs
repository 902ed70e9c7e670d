use std::path::Path;

use anyhow::{Result, anyhow};
use image::DynamicImage;
use pdfium_render::prelude::*;
use tracing::debug;

use crate::model::RegionRect;
use crate::ocr::OcrEngine;

/// Rasterization factor for whole-page OCR fallback.
pub const PAGE_OCR_UPSCALE: f32 = 2.0;
/// Rasterization factor for structured-row region OCR; regions are small
/// enough that the extra resolution stays cheap.
pub const REGION_OCR_UPSCALE: f32 = 3.0;

/// Binds to a pdfium library, preferring a bundled copy next to the
/// binary over a system-wide install.
pub fn create_pdfium() -> Result<Pdfium> {
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|err| anyhow!("failed to load pdfium library: {err:?}"))?;

    Ok(Pdfium::new(bindings))
}

pub fn open_document<'a>(pdfium: &'a Pdfium, path: &Path) -> Result<PdfDocument<'a>> {
    pdfium
        .load_pdf_from_file(path, None)
        .map_err(|err| anyhow!("failed to open {}: {err:?}", path.display()))
}

pub struct AcquiredText {
    pub text: String,
    pub used_ocr: bool,
    /// Set when the OCR engine itself failed; the page is treated as
    /// empty text rather than failing the batch.
    pub ocr_error: Option<String>,
}

/// Per-page text retrieval: the native text layer first, OCR on a
/// rasterized page only when the text layer comes back empty.
pub fn acquire_page_text(page: &PdfPage, engine: &OcrEngine, upscale: f32) -> AcquiredText {
    let native = page
        .text()
        .map(|text| text.all())
        .unwrap_or_default();

    if !native.trim().is_empty() {
        return AcquiredText {
            text: native,
            used_ocr: false,
            ocr_error: None,
        };
    }

    match render_page(page, upscale).and_then(|image| engine.recognize(&image)) {
        Ok(text) => AcquiredText {
            text,
            used_ocr: true,
            ocr_error: None,
        },
        Err(err) => {
            debug!(error = %err, "page OCR failed, treating page as empty");
            AcquiredText {
                text: String::new(),
                used_ocr: true,
                ocr_error: Some(err.to_string()),
            }
        }
    }
}

pub fn render_page(page: &PdfPage, factor: f32) -> Result<DynamicImage> {
    let config = PdfRenderConfig::new().scale_page_by_factor(factor);
    let bitmap = page
        .render_with_config(&config)
        .map_err(|err| anyhow!("failed to rasterize page: {err:?}"))?;

    Ok(bitmap.as_image())
}

/// Crops a region out of a page rasterized at `factor`, clamping to the
/// image bounds. Region coordinates are points with a top-left origin,
/// which matches the rendered image's pixel orientation.
pub fn crop_region(image: &DynamicImage, rect: &RegionRect, factor: f32) -> Result<DynamicImage> {
    let left = ((rect.x1 * factor).max(0.0) as u32).min(image.width());
    let top = ((rect.y1 * factor).max(0.0) as u32).min(image.height());
    let width = ((rect.width() * factor) as u32).min(image.width() - left);
    let height = ((rect.height() * factor) as u32).min(image.height() - top);

    if width == 0 || height == 0 {
        return Err(anyhow!(
            "region ({}, {})-({}, {}) lies outside the page",
            rect.x1,
            rect.y1,
            rect.x2,
            rect.y2
        ));
    }

    Ok(image.crop_imm(left, top, width, height))
}

/// Converts an operator region (top-left origin, y down) into pdfium
/// page space (bottom-left origin, y up).
pub fn region_to_page_space(rect: &RegionRect, page_height: f32) -> PdfRect {
    PdfRect::new(
        PdfPoints::new(page_height - rect.y2),
        PdfPoints::new(rect.x1),
        PdfPoints::new(page_height - rect.y1),
        PdfPoints::new(rect.x2),
    )
}

pub fn page_count(document: &PdfDocument<'_>) -> usize {
    document.pages().len() as usize
}

pub fn get_page<'a>(document: &'a PdfDocument<'_>, index: usize) -> Result<PdfPage<'a>> {
    document
        .pages()
        .get(index as u16)
        .map_err(|err| anyhow!("failed to load page {index}: {err:?}"))
}
