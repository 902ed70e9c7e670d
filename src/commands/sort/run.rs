use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use pdfium_render::prelude::Pdfium;
use tracing::{debug, info, warn};

use crate::cli::{GroupBy, SortArgs};
use crate::model::{
    BarcodeRecord, DeliveryAssignment, DeliveryDataFile, Failure, FailureKind, Group,
    GroupSummary, InputPdfEntry, MatchCandidate, MatchKind, PageRecord, RunCounts, RunManifest,
    ToolVersions,
};
use crate::ocr::{OcrEngine, tesseract_available, tesseract_version};
use crate::pdf::{self, PAGE_OCR_UPSCALE};
use crate::progress::{CancelFlag, LogProgress, Progress};
use crate::util::{
    ensure_directory, file_name_string, local_date_string, now_utc_string, sha256_file,
    utc_compact_string, write_json_pretty,
};

use super::aggregate::Aggregator;
use super::assemble::{BundleOrdering, compose_bundle, plan_order};
use super::barcode::generate_assets;
use super::matcher::IdentifierMatcher;
use super::summary::{render_summary, write_summary};

const MANIFEST_VERSION: u32 = 1;
const SUMMARY_FILE_NAME: &str = "processing_summary.txt";
const ALTERNATE_DIR_NAME: &str = "alternate";

pub fn run(args: SortArgs) -> Result<()> {
    let started = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("sort-{}", utc_compact_string(started));

    let (identifiers, delivery_map) = load_targets(&args)?;
    let mut matcher = IdentifierMatcher::new(&identifiers, !args.no_fuzzy)?;
    if matcher.is_empty() {
        bail!("no identifiers to match against");
    }
    info!(
        run_id = %run_id,
        identifiers = matcher.identifiers().len(),
        mode = args.group_by.as_str(),
        "starting sort run"
    );

    let output_dir = resolve_output_dir(&args);
    ensure_directory(&output_dir)?;

    let mut warnings = Vec::new();
    if !tesseract_available() {
        let message = "tesseract not found on PATH, image-only pages will yield no text";
        warn!("{message}");
        warnings.push(message.to_string());
    }

    let pdfium = pdf::create_pdfium()?;
    let engine = OcrEngine::new(&args.ocr_lang);
    let progress = LogProgress;
    let cancel = CancelFlag::new();

    let scan = scan_files(
        &args.inputs,
        &pdfium,
        &engine,
        &mut matcher,
        delivery_map.as_ref(),
        &progress,
        &cancel,
    );
    let ScanOutcome {
        groups,
        mut counts,
        inputs,
        mut failures,
        matched_ids,
    } = scan;

    let (assets, barcode_failures) = if args.stamp_barcodes {
        generate_assets(matcher.identifiers())
    } else {
        Default::default()
    };
    counts.barcodes_generated = assets.len();
    for (identifier, reason) in &barcode_failures {
        failures.push(Failure {
            kind: FailureKind::BarcodeEncoding,
            subject: identifier.clone(),
            detail: reason.clone(),
        });
    }
    let asset_ref = args.stamp_barcodes.then_some(&assets);

    let mut created_bundles = Vec::new();
    let mut failed_bundles = Vec::new();
    let mut barcode_records = Vec::new();

    let alternate_dir = output_dir.join(ALTERNATE_DIR_NAME);
    if !groups.is_empty() {
        ensure_directory(&alternate_dir)?;
    }

    for group in &groups {
        let bundle_name = bundle_file_name(args.group_by, &group.key);

        let primary_order = plan_order(group, BundleOrdering::Primary);
        let outcome = compose_bundle(
            &pdfium,
            group,
            &primary_order,
            &output_dir.join(&bundle_name),
            asset_ref,
        )?;
        failures.extend(outcome.failures);
        if outcome.written {
            counts.bundles_written += 1;
            created_bundles.push(bundle_name.clone());
            barcode_records.extend(barcode_records_for(
                group,
                &outcome.copied,
                &bundle_name,
                &assets,
            ));
        } else {
            counts.bundles_failed += 1;
            failed_bundles.push(bundle_name.clone());
        }

        let alternate_order = plan_order(group, BundleOrdering::Alternate);
        let outcome = compose_bundle(
            &pdfium,
            group,
            &alternate_order,
            &alternate_dir.join(&bundle_name),
            asset_ref,
        )?;
        failures.extend(outcome.failures);
        let alternate_name = format!("{ALTERNATE_DIR_NAME}/{bundle_name}");
        if outcome.written {
            counts.bundles_written += 1;
            created_bundles.push(alternate_name);
        } else {
            counts.bundles_failed += 1;
            failed_bundles.push(alternate_name);
        }
    }

    let unmatched_identifiers: Vec<String> = matcher
        .identifiers()
        .iter()
        .filter(|identifier| !matched_ids.contains(&identifier.to_uppercase()))
        .cloned()
        .collect();

    let status = if cancel.is_cancelled() {
        warnings.push("run cancelled before all inputs were scanned".to_string());
        "cancelled"
    } else if counts.failed_files > 0 || counts.bundles_failed > 0 || !failures.is_empty() {
        "completed_with_failures"
    } else {
        "completed"
    };

    let summary = render_summary(
        args.group_by,
        &counts,
        &groups,
        &created_bundles,
        &failed_bundles,
        &unmatched_identifiers,
    );
    write_summary(&output_dir.join(SUMMARY_FILE_NAME), &summary)?;

    let manifest = RunManifest {
        manifest_version: MANIFEST_VERSION,
        run_id: run_id.clone(),
        status: status.to_string(),
        mode: args.group_by.as_str().to_string(),
        started_at,
        updated_at: now_utc_string(),
        output_dir: output_dir.display().to_string(),
        tool_versions: ToolVersions {
            docksort: env!("CARGO_PKG_VERSION").to_string(),
            tesseract: tesseract_version(),
        },
        inputs,
        counts: counts.clone(),
        groups: groups.iter().map(summarize_group).collect(),
        created_bundles,
        failed_bundles,
        barcode_records,
        barcode_failures,
        unmatched_identifiers,
        failures,
        warnings,
    };

    let manifest_path = args
        .manifest_path
        .clone()
        .unwrap_or_else(|| output_dir.join(format!("run_manifest_{run_id}.json")));
    write_json_pretty(&manifest_path, &manifest)?;

    info!(
        run_id = %run_id,
        status,
        files = counts.files_processed,
        pages_matched = counts.pages_matched,
        bundles = counts.bundles_written,
        manifest = %manifest_path.display(),
        "sort run finished"
    );

    if counts.bundles_failed > 0 {
        bail!(
            "{} bundle(s) failed to write, see {}",
            counts.bundles_failed,
            manifest_path.display()
        );
    }

    Ok(())
}

struct ScanOutcome {
    groups: Vec<Group>,
    counts: RunCounts,
    inputs: Vec<InputPdfEntry>,
    failures: Vec<Failure>,
    matched_ids: HashSet<String>,
}

/// Scans every input page, matches it against the identifier set and
/// groups the hits. Unreadable files and failed pages are recorded and
/// skipped so a bad scan never aborts the batch.
fn scan_files(
    input_files: &[PathBuf],
    pdfium: &Pdfium,
    engine: &OcrEngine,
    matcher: &mut IdentifierMatcher,
    delivery: Option<&BTreeMap<String, DeliveryAssignment>>,
    progress: &dyn Progress,
    cancel: &CancelFlag,
) -> ScanOutcome {
    let mut aggregator = Aggregator::new();
    let mut inputs = Vec::new();
    let mut failures = Vec::new();
    let mut matched_ids = HashSet::new();

    let total = input_files.len();
    'files: for (file_index, input) in input_files.iter().enumerate() {
        progress.file_started(input, file_index, total);

        let sha256 = match sha256_file(input) {
            Ok(sha256) => sha256,
            Err(err) => {
                failures.push(Failure {
                    kind: FailureKind::FileOpen,
                    subject: file_name_string(input),
                    detail: err.to_string(),
                });
                aggregator.file_failed();
                continue;
            }
        };
        inputs.push(InputPdfEntry {
            filename: file_name_string(input),
            sha256,
        });

        let document = match pdf::open_document(pdfium, input) {
            Ok(document) => document,
            Err(err) => {
                failures.push(Failure {
                    kind: FailureKind::FileOpen,
                    subject: file_name_string(input),
                    detail: err.to_string(),
                });
                aggregator.file_failed();
                continue;
            }
        };

        let pages = pdf::page_count(&document);
        for page_index in 0..pages {
            if cancel.is_cancelled() {
                break 'files;
            }

            let page = match pdf::get_page(&document, page_index) {
                Ok(page) => page,
                Err(err) => {
                    failures.push(Failure {
                        kind: FailureKind::PageExtraction,
                        subject: file_name_string(input),
                        detail: format!("page {}: {err}", page_index + 1),
                    });
                    continue;
                }
            };

            let acquired = pdf::acquire_page_text(&page, engine, PAGE_OCR_UPSCALE);
            aggregator.page_scanned();
            progress.page_scanned(input, page_index);

            if let Some(err) = acquired.ocr_error {
                failures.push(Failure {
                    kind: FailureKind::PageExtraction,
                    subject: file_name_string(input),
                    detail: format!("page {} OCR failed: {err}", page_index + 1),
                });
            }

            let Some(candidate) = matcher.match_page(&acquired.text) else {
                continue;
            };
            matched_ids.insert(candidate.candidate_id.to_uppercase());
            debug!(
                identifier = %candidate.candidate_id,
                kind = candidate.kind.as_str(),
                file = %input.display(),
                page = page_index + 1,
                "page matched"
            );
            if candidate.kind == MatchKind::Fuzzy {
                info!(
                    identifier = %candidate.candidate_id,
                    variant = %candidate.variant_used,
                    file = %input.display(),
                    page = page_index + 1,
                    "matched via OCR-confusion variant"
                );
            }

            aggregator.record(build_record(input, page_index, &candidate, delivery));
        }

        progress.file_finished(input, pages);
        aggregator.file_processed();
    }

    let (groups, counts) = aggregator.finish();
    ScanOutcome {
        groups,
        counts,
        inputs,
        failures,
        matched_ids,
    }
}

/// Resolves the matched identifier into a page record. Grouping by
/// driver routes through the delivery assignment; an order id missing
/// from the assignment map falls back to grouping under its own id.
fn build_record(
    source: &Path,
    page_index: usize,
    candidate: &MatchCandidate,
    delivery: Option<&BTreeMap<String, DeliveryAssignment>>,
) -> PageRecord {
    let (matched_key, stop_number) = match delivery.and_then(|map| map.get(&candidate.candidate_id))
    {
        Some(assignment) => (
            assignment.driver_number.clone(),
            Some(assignment.stop_number.clone()),
        ),
        None => (candidate.candidate_id.clone(), None),
    };

    PageRecord {
        source_file: source.to_path_buf(),
        page_index,
        matched_key: Some(matched_key),
        order_id: Some(candidate.candidate_id.clone()),
        stop_number,
        match_kind: Some(candidate.kind),
    }
}

fn load_targets(
    args: &SortArgs,
) -> Result<(Vec<String>, Option<BTreeMap<String, DeliveryAssignment>>)> {
    match args.group_by {
        GroupBy::Driver => {
            let path = args
                .delivery_data
                .as_ref()
                .context("--delivery-data is required with --group-by driver")?;
            let data = load_delivery_data(path)?;
            if data.delivery_data_with_drivers.is_empty() {
                bail!(
                    "delivery data file contains no order assignments: {}",
                    path.display()
                );
            }
            let identifiers = data.delivery_data_with_drivers.keys().cloned().collect();
            Ok((identifiers, Some(data.delivery_data_with_drivers)))
        }
        GroupBy::Order => {
            let path = args
                .identifiers
                .as_ref()
                .context("--identifiers is required with --group-by order")?;
            Ok((load_identifier_list(path)?, None))
        }
    }
}

fn load_delivery_data(path: &Path) -> Result<DeliveryDataFile> {
    let file = File::open(path)
        .with_context(|| format!("failed to open delivery data: {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse delivery data: {}", path.display()))
}

/// Reads order numbers from a one-column CSV (a plain-text list parses
/// the same way). Only the first field of each row is used.
fn load_identifier_list(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open identifier list: {}", path.display()))?;

    let mut identifiers = Vec::new();
    for record in reader.records() {
        let record = record
            .with_context(|| format!("failed to read identifier list: {}", path.display()))?;
        if let Some(field) = record.get(0) {
            let trimmed = field.trim();
            if !trimmed.is_empty() {
                identifiers.push(trimmed.to_string());
            }
        }
    }

    Ok(identifiers)
}

fn resolve_output_dir(args: &SortArgs) -> PathBuf {
    if args.no_date_folder {
        args.output_root.clone()
    } else {
        args.output_root.join(local_date_string())
    }
}

pub(super) fn bundle_file_name(mode: GroupBy, key: &str) -> String {
    let safe = sanitize_component(key);
    match mode {
        GroupBy::Driver => format!("Driver_{safe}_Orders.pdf"),
        GroupBy::Order => format!("Order_{safe}_Combined.pdf"),
    }
}

/// Keeps bundle names filesystem-safe without losing the key entirely.
fn sanitize_component(key: &str) -> String {
    key.chars()
        .map(|character| {
            if character.is_ascii_alphanumeric() || matches!(character, '-' | '_') {
                character
            } else {
                '_'
            }
        })
        .collect()
}

/// Barcode rows for the persistence collaborator, one per written page
/// whose identifier has an asset. Page numbers are 1-based positions in
/// the bundle as actually written, so a failed page copy never shifts
/// or fabricates a record.
pub(super) fn barcode_records_for(
    group: &Group,
    copied: &[usize],
    bundle_name: &str,
    assets: &HashMap<String, Vec<u8>>,
) -> Vec<BarcodeRecord> {
    let mut records = Vec::new();
    for (position, &index) in copied.iter().enumerate() {
        let Some(order_id) = &group.pages[index].order_id else {
            continue;
        };
        if assets.contains_key(order_id) {
            records.push(BarcodeRecord {
                order_id: order_id.clone(),
                pdf_file_name: bundle_name.to_string(),
                page_number: position + 1,
                barcode_type: "Code128".to_string(),
            });
        }
    }

    records
}

fn summarize_group(group: &Group) -> GroupSummary {
    let mut orders = Vec::new();
    for page in &group.pages {
        if let Some(order_id) = &page.order_id {
            if !orders.contains(order_id) {
                orders.push(order_id.clone());
            }
        }
    }

    GroupSummary {
        key: group.key.clone(),
        page_count: group.pages.len(),
        orders,
    }
}
