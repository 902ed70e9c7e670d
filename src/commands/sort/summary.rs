use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::cli::GroupBy;
use crate::model::{Group, RunCounts};
use crate::util::{file_name_string, now_utc_string};

/// Renders the operator-facing plain-text summary that sits next to the
/// bundles. Meant to be read on a warehouse terminal, so no JSON here.
pub fn render_summary(
    mode: GroupBy,
    counts: &RunCounts,
    groups: &[Group],
    created_bundles: &[String],
    failed_bundles: &[String],
    unmatched_identifiers: &[String],
) -> String {
    let mut lines = Vec::new();

    lines.push("Docket Processing Summary".to_string());
    lines.push(format!("Generated: {}", now_utc_string()));
    lines.push(format!("Grouping: by {}", mode.as_str()));
    lines.push(String::new());

    lines.push(format!("Files processed: {}", counts.files_processed));
    lines.push(format!("Files failed: {}", counts.failed_files));
    lines.push(format!("Pages scanned: {}", counts.pages_scanned));
    lines.push(format!("Pages matched: {}", counts.pages_matched));
    lines.push(format!("Distinct groups: {}", counts.distinct_groups));
    lines.push(format!("Bundles written: {}", counts.bundles_written));
    lines.push(format!("Bundles failed: {}", counts.bundles_failed));
    lines.push(String::new());

    lines.push("Created files:".to_string());
    if created_bundles.is_empty() {
        lines.push("  (none)".to_string());
    }
    for name in created_bundles {
        lines.push(format!("  - {name}"));
    }
    lines.push(String::new());

    if !failed_bundles.is_empty() {
        lines.push("Failed files:".to_string());
        for name in failed_bundles {
            lines.push(format!("  - {name}"));
        }
        lines.push(String::new());
    }

    for group in groups {
        let label = match mode {
            GroupBy::Driver => format!("Driver {}", group.key),
            GroupBy::Order => format!("Order {}", group.key),
        };
        lines.push(format!("{label} ({} pages found):", group.pages.len()));
        for page in &group.pages {
            let mut detail = format!(
                "  - {} page {}",
                file_name_string(&page.source_file),
                page.page_index + 1
            );
            if let Some(order_id) = &page.order_id {
                detail.push_str(&format!(" (order {order_id}"));
                if let Some(stop) = &page.stop_number {
                    detail.push_str(&format!(", stop {stop}"));
                }
                detail.push(')');
            }
            lines.push(detail);
        }
        lines.push(String::new());
    }

    if !unmatched_identifiers.is_empty() {
        lines.push("Identifiers with no pages found:".to_string());
        for identifier in unmatched_identifiers {
            lines.push(format!("  - {identifier}"));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

pub fn write_summary(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents)
        .with_context(|| format!("failed to write summary file: {}", path.display()))
}
