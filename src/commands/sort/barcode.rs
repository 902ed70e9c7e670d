use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, Result, anyhow};
use barcoders::generators::image::{Color, Image, Rotation};
use barcoders::sym::code128::Code128;
use pdfium_render::prelude::*;
use tracing::debug;

/// Nominal stamp geometry, inherited from the paper workflow: a long,
/// shallow strip across the top of the page.
const BARCODE_WIDTH: f32 = 700.0;
const BARCODE_HEIGHT: f32 = 70.0;
const BARCODE_TOP_MARGIN: f32 = 20.0;
const BARCODE_SIDE_MARGIN: f32 = 20.0;

/// Checks an identifier against the Code128 printable-ASCII contract.
pub fn validate_identifier(identifier: &str) -> std::result::Result<(), &'static str> {
    if identifier.trim().is_empty() {
        return Err("empty identifier");
    }

    if identifier
        .bytes()
        .any(|byte| !(32..=126).contains(&byte))
    {
        return Err("invalid character set");
    }

    Ok(())
}

/// Generates one Code128 PNG per unique valid identifier. Asset
/// generation is a pure function of the identifier string; invalid
/// identifiers never produce an asset and land in the failures map
/// with a human-readable reason.
pub fn generate_assets(
    identifiers: &[String],
) -> (HashMap<String, Vec<u8>>, BTreeMap<String, String>) {
    let mut assets = HashMap::new();
    let mut failures = BTreeMap::new();

    for identifier in identifiers {
        if assets.contains_key(identifier) || failures.contains_key(identifier) {
            continue;
        }

        if let Err(reason) = validate_identifier(identifier) {
            failures.insert(identifier.clone(), reason.to_string());
            continue;
        }

        match encode_png(identifier) {
            Ok(bytes) => {
                debug!(identifier = %identifier, "generated barcode asset");
                assets.insert(identifier.clone(), bytes);
            }
            Err(err) => {
                failures.insert(identifier.clone(), err.to_string());
            }
        }
    }

    (assets, failures)
}

fn encode_png(identifier: &str) -> Result<Vec<u8>> {
    // \u{0181} selects Code128 character set B (full printable ASCII).
    let barcode = Code128::new(format!("\u{0181}{identifier}"))
        .map_err(|err| anyhow!("code128 rejected '{identifier}': {err:?}"))?;

    let generator = Image::PNG {
        height: 140,
        xdim: 2,
        rotation: Rotation::Zero,
        foreground: Color::black(),
        background: Color::white(),
    };

    generator
        .generate(&barcode.encode()[..])
        .map_err(|err| anyhow!("failed to render barcode for '{identifier}': {err:?}"))
}

/// Embeds a barcode PNG into the fixed top-center rectangle of a page.
pub fn stamp_page(
    document: &PdfDocument<'_>,
    page_index: PdfPageIndex,
    png_bytes: &[u8],
) -> Result<()> {
    let image = image::load_from_memory(png_bytes).context("failed to decode barcode image")?;

    let (page_width, page_height) = {
        let page = document
            .pages()
            .get(page_index)
            .map_err(|err| anyhow!("failed to load page {page_index}: {err:?}"))?;
        (page.width().value, page.height().value)
    };

    let width = BARCODE_WIDTH.min(page_width - 2.0 * BARCODE_SIDE_MARGIN);
    let x = (page_width - width) / 2.0;
    let y = page_height - BARCODE_TOP_MARGIN - BARCODE_HEIGHT;

    let mut object = PdfPageImageObject::new_with_size(
        document,
        &image,
        PdfPoints::new(width),
        PdfPoints::new(BARCODE_HEIGHT),
    )
    .map_err(|err| anyhow!("failed to create barcode image object: {err:?}"))?;
    object
        .translate(PdfPoints::new(x), PdfPoints::new(y))
        .map_err(|err| anyhow!("failed to position barcode image: {err:?}"))?;

    let mut page = document
        .pages()
        .get(page_index)
        .map_err(|err| anyhow!("failed to load page {page_index}: {err:?}"))?;
    page.objects_mut()
        .add_image_object(object)
        .map_err(|err| anyhow!("failed to attach barcode image: {err:?}"))?;

    Ok(())
}
