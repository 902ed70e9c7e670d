use anyhow::{Result, anyhow, bail};
use image::DynamicImage;
use pdfium_render::prelude::*;
use tracing::debug;

use crate::model::{AppendRule, ExtractProfile, Region, RegionRect, StructuredRow};
use crate::ocr::OcrEngine;
use crate::pdf::{REGION_OCR_UPSCALE, crop_region, region_to_page_space, render_page};

/// A text segment belongs to a region when more than half of its area
/// lies inside the region rectangle.
pub const MAJORITY_OVERLAP: f32 = 0.5;

/// Fraction of the segment's area covered by `rect`, in [0, 1]. Both
/// rectangles use top-left-origin point coordinates.
pub fn overlap_ratio(segment: &RegionRect, rect: &RegionRect) -> f32 {
    let segment_area = segment.width() * segment.height();
    if segment_area <= 0.0 {
        return 0.0;
    }

    let overlap_width = (segment.x2.min(rect.x2) - segment.x1.max(rect.x1)).max(0.0);
    let overlap_height = (segment.y2.min(rect.y2) - segment.y1.max(rect.y1)).max(0.0);

    (overlap_width * overlap_height) / segment_area
}

/// Collapses every run of whitespace and control characters to a single
/// space and trims the ends. Applied identically to text-layer and OCR
/// output so downstream comparisons see one shape of text.
pub fn clean_extracted_text(raw: &str) -> String {
    raw.split(|character: char| character.is_whitespace() || character.is_control())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extracts the cleaned text of every profile region from one page. The
/// 3x rasterization used by the OCR fallback is rendered at most once
/// per page and shared across regions.
pub fn extract_page_regions(
    page: &PdfPage,
    regions: &[Region],
    engine: &OcrEngine,
) -> Vec<String> {
    let mut rendered: Option<DynamicImage> = None;
    regions
        .iter()
        .map(|region| {
            let text = extract_region(page, &region.rect, engine, &mut rendered);
            debug!(region = %region.name, chars = text.len(), "extracted region text");
            text
        })
        .collect()
}

/// Stage that follows the majority-overlap segment pass.
///
/// The text-inside-rect primitive is only consulted when the segment
/// pass itself failed: a clean empty result means every overlapping
/// span was rejected by the overlap rule, and the coarser primitive
/// could re-admit exactly those spans.
#[derive(Debug, PartialEq, Eq)]
pub enum RegionFallback {
    UseText(String),
    OcrCrop,
    InsideRectThenOcrCrop,
}

pub fn plan_fallback(segments: &Result<String>) -> RegionFallback {
    match segments {
        Ok(text) if !text.trim().is_empty() => {
            RegionFallback::UseText(clean_extracted_text(text))
        }
        Ok(_) => RegionFallback::OcrCrop,
        Err(_) => RegionFallback::InsideRectThenOcrCrop,
    }
}

/// Region text retrieval in stages: majority-overlap segment selection
/// from the text layer, then (only when that pass fails outright)
/// pdfium's text-inside-rect primitive, then OCR of the rasterized
/// crop.
fn extract_region(
    page: &PdfPage,
    rect: &RegionRect,
    engine: &OcrEngine,
    rendered: &mut Option<DynamicImage>,
) -> String {
    let segments = segments_in_rect(page, rect);
    if let Err(err) = &segments {
        debug!(error = %err, "segment extraction failed, trying text-inside-rect");
    }

    match plan_fallback(&segments) {
        RegionFallback::UseText(text) => return text,
        RegionFallback::InsideRectThenOcrCrop => {
            if let Ok(text_page) = page.text() {
                let page_rect = region_to_page_space(rect, page.height().value);
                let text = text_page.inside_rect(page_rect);
                if !text.trim().is_empty() {
                    return clean_extracted_text(&text);
                }
            }
        }
        RegionFallback::OcrCrop => {}
    }

    if rendered.is_none() {
        match render_page(page, REGION_OCR_UPSCALE) {
            Ok(image) => *rendered = Some(image),
            Err(err) => {
                debug!(error = %err, "page rasterization failed, region left empty");
                return String::new();
            }
        }
    }
    let Some(image) = rendered.as_ref() else {
        return String::new();
    };

    match crop_region(image, rect, REGION_OCR_UPSCALE)
        .and_then(|crop| engine.recognize_region(&crop))
    {
        Ok(text) => clean_extracted_text(&text),
        Err(err) => {
            debug!(error = %err, "region OCR failed, region left empty");
            String::new()
        }
    }
}

/// Joins the text of every segment whose area lies mostly inside the
/// region, in document order.
fn segments_in_rect(page: &PdfPage, rect: &RegionRect) -> Result<String> {
    let text_page = page
        .text()
        .map_err(|err| anyhow!("failed to load text layer: {err:?}"))?;
    let page_height = page.height().value;

    let mut parts = Vec::new();
    for segment in text_page.segments().iter() {
        let bounds = segment.bounds();
        let segment_rect = RegionRect {
            x1: bounds.left().value,
            y1: page_height - bounds.top().value,
            x2: bounds.right().value,
            y2: page_height - bounds.bottom().value,
        };

        if overlap_ratio(&segment_rect, rect) > MAJORITY_OVERLAP {
            let text = segment.text();
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                parts.push(trimmed.to_string());
            }
        }
    }

    Ok(parts.join(" "))
}

/// Appends the source region's cleaned text onto the target region with
/// a single joining space. An empty source leaves the target untouched.
pub fn apply_append_rule(texts: &mut [String], rule: &AppendRule) {
    if rule.source >= texts.len() || rule.target >= texts.len() || rule.source == rule.target {
        return;
    }

    let source = texts[rule.source].trim().to_string();
    if source.is_empty() {
        return;
    }

    let target = &mut texts[rule.target];
    if target.trim().is_empty() {
        *target = source;
    } else {
        *target = format!("{} {}", target.trim(), source);
    }
}

/// Builds a structured row from the per-region texts, or nothing when
/// the trigger region lacks the completion marker or the order region
/// came back empty.
pub fn build_row(
    texts: &[String],
    profile: &ExtractProfile,
    source_file: &str,
) -> Option<StructuredRow> {
    let trigger = texts.get(profile.trigger_region)?;
    if !trigger
        .to_uppercase()
        .contains(&profile.completion_marker.to_uppercase())
    {
        return None;
    }

    let order_number = texts.get(profile.order_region)?.trim().to_uppercase();
    if order_number.is_empty() {
        return None;
    }

    Some(StructuredRow {
        order_number,
        site_name: texts
            .get(profile.site_region)
            .map(|text| text.trim().to_string())
            .unwrap_or_default(),
        route: texts
            .get(profile.route_region)
            .map(|text| text.trim().to_string())
            .unwrap_or_default(),
        source_file: source_file.to_string(),
    })
}

pub fn validate_profile(profile: &ExtractProfile) -> Result<()> {
    if profile.regions.is_empty() {
        bail!("region profile defines no regions");
    }

    let bound = profile.regions.len();
    let mut indexed = vec![
        ("trigger_region", profile.trigger_region),
        ("order_region", profile.order_region),
        ("site_region", profile.site_region),
        ("route_region", profile.route_region),
    ];
    if let Some(rule) = &profile.append_rule {
        indexed.push(("append_rule.source", rule.source));
        indexed.push(("append_rule.target", rule.target));
    }

    for (name, index) in indexed {
        if index >= bound {
            bail!("{name} index {index} is out of range ({bound} regions defined)");
        }
    }

    if profile.completion_marker.trim().is_empty() {
        bail!("completion marker must not be empty");
    }

    Ok(())
}
