use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use crate::cli::ExtractArgs;
use crate::model::{ExtractProfile, StructuredRow};
use crate::ocr::{OcrEngine, tesseract_available};
use crate::pdf;
use crate::progress::{LogProgress, Progress};
use crate::util::{ensure_directory, file_name_string, write_json_pretty};

use super::regions::{apply_append_rule, build_row, extract_page_regions, validate_profile};

const ROWS_JSON_NAME: &str = "structured_rows.json";
const ROWS_CSV_NAME: &str = "structured_rows.csv";

pub fn run(args: ExtractArgs) -> Result<()> {
    let profile = load_profile(&args.profile)?;
    validate_profile(&profile)?;
    ensure_directory(&args.output_root)?;

    if !tesseract_available() {
        warn!("tesseract not found on PATH, image-only regions will yield no text");
    }

    let pdfium = pdf::create_pdfium()?;
    let engine = OcrEngine::new(&args.ocr_lang);
    let progress = LogProgress;

    let mut rows: Vec<StructuredRow> = Vec::new();
    let mut files_processed = 0usize;
    let mut files_failed = 0usize;
    let mut pages_scanned = 0usize;

    let total = args.inputs.len();
    for (file_index, input) in args.inputs.iter().enumerate() {
        progress.file_started(input, file_index, total);

        let document = match pdf::open_document(&pdfium, input) {
            Ok(document) => document,
            Err(err) => {
                warn!(file = %input.display(), error = %err, "skipping unreadable file");
                files_failed += 1;
                continue;
            }
        };

        let source_name = file_name_string(input);
        let pages = pdf::page_count(&document);
        for page_index in 0..pages {
            let page = match pdf::get_page(&document, page_index) {
                Ok(page) => page,
                Err(err) => {
                    warn!(
                        file = %input.display(),
                        page = page_index + 1,
                        error = %err,
                        "skipping unreadable page"
                    );
                    continue;
                }
            };

            let mut texts = extract_page_regions(&page, &profile.regions, &engine);
            if let Some(rule) = &profile.append_rule {
                apply_append_rule(&mut texts, rule);
            }

            pages_scanned += 1;
            progress.page_scanned(input, page_index);

            if let Some(row) = build_row(&texts, &profile, &source_name) {
                info!(
                    order = %row.order_number,
                    file = %source_name,
                    page = page_index + 1,
                    "extracted structured row"
                );
                rows.push(row);
            }
        }

        progress.file_finished(input, pages);
        files_processed += 1;
    }

    if files_processed == 0 {
        bail!("none of the input files could be read");
    }

    let json_path = args
        .rows_json_path
        .clone()
        .unwrap_or_else(|| args.output_root.join(ROWS_JSON_NAME));
    write_json_pretty(&json_path, &rows)?;

    let csv_path = args
        .rows_csv_path
        .clone()
        .unwrap_or_else(|| args.output_root.join(ROWS_CSV_NAME));
    write_rows_csv(&csv_path, &rows)?;

    info!(
        files = files_processed,
        failed = files_failed,
        pages = pages_scanned,
        rows = rows.len(),
        json = %json_path.display(),
        csv = %csv_path.display(),
        "extract run finished"
    );

    Ok(())
}

fn load_profile(path: &Path) -> Result<ExtractProfile> {
    let file = File::open(path)
        .with_context(|| format!("failed to open region profile: {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse region profile: {}", path.display()))
}

/// Backup spreadsheet next to the JSON handoff, one row per record.
fn write_rows_csv(path: &Path, rows: &[StructuredRow]) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create csv file: {}", path.display()))?;
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("failed to write csv row: {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to finalize csv file: {}", path.display()))?;

    Ok(())
}
