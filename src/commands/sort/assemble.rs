use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use pdfium_render::prelude::*;
use tracing::{info, warn};

use crate::model::{Failure, FailureKind, Group};
use crate::pdf::open_document;
use crate::util::file_name_string;

use super::barcode::stamp_page;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleOrdering {
    /// Ascending by stop number, then fully reversed: the physically
    /// last page in the output corresponds to the first delivery stop,
    /// so the stack comes off the printer in driving order.
    Primary,
    /// Ascending by stop number with no reversal, for the reversed
    /// picking workflow.
    Alternate,
}

/// Computes the page order for a bundle as indices into the group's
/// insertion-ordered page list.
///
/// Stop numbers compare numerically when every present stop number in
/// the group parses as an integer; otherwise the whole group falls back
/// to lexicographic string comparison. Pages without a stop number sort
/// last either way, keeping insertion order among themselves.
pub fn plan_order(group: &Group, ordering: BundleOrdering) -> Vec<usize> {
    let all_numeric = group
        .pages
        .iter()
        .filter_map(|page| page.stop_number.as_deref())
        .all(|stop| stop.trim().parse::<i64>().is_ok());

    let mut order: Vec<usize> = (0..group.pages.len()).collect();

    if all_numeric {
        order.sort_by_key(|&index| {
            group.pages[index]
                .stop_number
                .as_deref()
                .and_then(|stop| stop.trim().parse::<i64>().ok())
                .map_or((true, 0), |value| (false, value))
        });
    } else {
        order.sort_by_key(|&index| {
            group.pages[index]
                .stop_number
                .clone()
                .map_or((true, String::new()), |stop| (false, stop))
        });
    }

    if ordering == BundleOrdering::Primary {
        order.reverse();
    }

    order
}

pub struct ComposeOutcome {
    /// Indices into the group's page list, in the order the pages were
    /// actually written. Pages whose copy failed are absent.
    pub copied: Vec<usize>,
    pub written: bool,
    pub failures: Vec<Failure>,
}

/// Copies the ordered pages of a group into a fresh document at
/// `output_path`, opening each source file at most once. Per-page copy
/// failures are recorded and skipped; the bundle is only written when
/// at least one page made it across, and the output file's existence is
/// verified after saving.
pub fn compose_bundle(
    pdfium: &Pdfium,
    group: &Group,
    order: &[usize],
    output_path: &Path,
    assets: Option<&HashMap<String, Vec<u8>>>,
) -> Result<ComposeOutcome> {
    let bundle_name = file_name_string(output_path);
    let mut failures = Vec::new();

    let mut output = pdfium
        .create_new_pdf()
        .map_err(|err| anyhow!("failed to create output document: {err:?}"))?;

    let mut sources: HashMap<PathBuf, PdfDocument<'_>> = HashMap::new();
    let mut copied = Vec::new();

    for &index in order {
        let record = &group.pages[index];

        if !sources.contains_key(&record.source_file) {
            match open_document(pdfium, &record.source_file) {
                Ok(document) => {
                    sources.insert(record.source_file.clone(), document);
                }
                Err(err) => {
                    failures.push(Failure {
                        kind: FailureKind::BundleWrite,
                        subject: bundle_name.clone(),
                        detail: format!(
                            "failed to reopen {} for page {}: {err}",
                            record.source_file.display(),
                            record.page_index + 1
                        ),
                    });
                    continue;
                }
            }
        }
        let source = &sources[&record.source_file];

        let destination_index = output.pages().len();
        if let Err(err) = output.pages_mut().copy_page_from_document(
            source,
            record.page_index as u16,
            destination_index,
        ) {
            failures.push(Failure {
                kind: FailureKind::BundleWrite,
                subject: bundle_name.clone(),
                detail: format!(
                    "failed to copy page {} of {}: {err:?}",
                    record.page_index + 1,
                    record.source_file.display()
                ),
            });
            continue;
        }
        copied.push(index);

        let asset = assets
            .zip(record.order_id.as_ref())
            .and_then(|(map, order_id)| map.get(order_id));
        if let Some(png_bytes) = asset {
            if let Err(err) = stamp_page(&output, destination_index, png_bytes) {
                warn!(
                    bundle = %bundle_name,
                    page = destination_index + 1,
                    error = %err,
                    "failed to stamp barcode, page left unmodified"
                );
            }
        }
    }

    if copied.is_empty() {
        failures.push(Failure {
            kind: FailureKind::BundleWrite,
            subject: bundle_name,
            detail: "no pages could be copied into the bundle".to_string(),
        });
        return Ok(ComposeOutcome {
            copied,
            written: false,
            failures,
        });
    }

    if let Err(err) = output.save_to_file(output_path) {
        failures.push(Failure {
            kind: FailureKind::BundleWrite,
            subject: bundle_name,
            detail: format!("failed to save bundle: {err:?}"),
        });
        return Ok(ComposeOutcome {
            copied,
            written: false,
            failures,
        });
    }

    // A save that reports success but leaves no file behind is a
    // distinct failure from a page-copy error.
    if !output_path.exists() {
        failures.push(Failure {
            kind: FailureKind::BundleWrite,
            subject: bundle_name,
            detail: "bundle file missing after save".to_string(),
        });
        return Ok(ComposeOutcome {
            copied,
            written: false,
            failures,
        });
    }

    info!(bundle = %output_path.display(), pages = copied.len(), "wrote bundle");
    Ok(ComposeOutcome {
        copied,
        written: true,
        failures,
    })
}
