use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Operator-configured rectangle on a page, in PDF points with a
/// top-left origin (y grows downward, matching scan coordinates).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionRect {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl RegionRect {
    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
    pub color_tag: String,
    pub rect: RegionRect,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AppendRule {
    /// Region whose text is appended (the secondary).
    pub source: usize,
    /// Region receiving the appended text (the primary).
    pub target: usize,
}

/// Structured-row extraction profile supplied by the operator.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractProfile {
    pub regions: Vec<Region>,
    pub trigger_region: usize,
    #[serde(default = "default_completion_marker")]
    pub completion_marker: String,
    pub order_region: usize,
    pub site_region: usize,
    pub route_region: usize,
    #[serde(default)]
    pub append_rule: Option<AppendRule>,
}

fn default_completion_marker() -> String {
    "COMPLETED".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    WordBoundary,
    Fuzzy,
}

impl MatchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::WordBoundary => "word_boundary",
            Self::Fuzzy => "fuzzy",
        }
    }
}

/// One scanned page. Created during the scan phase and never mutated
/// after matching.
#[derive(Debug, Clone)]
pub struct PageRecord {
    pub source_file: PathBuf,
    pub page_index: usize,
    pub matched_key: Option<String>,
    pub order_id: Option<String>,
    pub stop_number: Option<String>,
    pub match_kind: Option<MatchKind>,
}

/// Ephemeral matcher output; consumed immediately by the scan loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchCandidate {
    pub candidate_id: String,
    pub variant_used: String,
    pub kind: MatchKind,
}

/// Pages that matched the same target key, in insertion order.
#[derive(Debug, Clone)]
pub struct Group {
    pub key: String,
    pub pages: Vec<PageRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuredRow {
    pub order_number: String,
    pub site_name: String,
    pub route: String,
    pub source_file: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryAssignment {
    pub driver_number: String,
    pub stop_number: String,
}

/// On-disk delivery data handed over by the route-planning collaborator.
#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryDataFile {
    #[serde(default)]
    pub delivery_data_with_drivers: BTreeMap<String, DeliveryAssignment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    FileOpen,
    PageExtraction,
    BarcodeEncoding,
    BundleWrite,
}

#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub subject: String,
    pub detail: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunCounts {
    pub files_processed: usize,
    pub failed_files: usize,
    pub pages_scanned: usize,
    pub pages_matched: usize,
    pub distinct_groups: usize,
    pub bundles_written: usize,
    pub bundles_failed: usize,
    pub barcodes_generated: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BarcodeRecord {
    pub order_id: String,
    pub pdf_file_name: String,
    /// 1-based page number within the written bundle.
    pub page_number: usize,
    pub barcode_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolVersions {
    pub docksort: String,
    pub tesseract: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InputPdfEntry {
    pub filename: String,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupSummary {
    pub key: String,
    pub page_count: usize,
    pub orders: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub mode: String,
    pub started_at: String,
    pub updated_at: String,
    pub output_dir: String,
    pub tool_versions: ToolVersions,
    pub inputs: Vec<InputPdfEntry>,
    pub counts: RunCounts,
    pub groups: Vec<GroupSummary>,
    pub created_bundles: Vec<String>,
    pub failed_bundles: Vec<String>,
    pub barcode_records: Vec<BarcodeRecord>,
    pub barcode_failures: BTreeMap<String, String>,
    pub unmatched_identifiers: Vec<String>,
    pub failures: Vec<Failure>,
    pub warnings: Vec<String>,
}
