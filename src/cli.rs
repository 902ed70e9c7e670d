use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "docksort",
    version,
    about = "Delivery docket reconciliation and bundle assembly tooling"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Sort(SortArgs),
    Extract(ExtractArgs),
    Status(StatusArgs),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum GroupBy {
    Driver,
    Order,
}

impl GroupBy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Driver => "driver",
            Self::Order => "order",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct SortArgs {
    /// Input docket PDF files to scan.
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    #[arg(long, default_value = "picking_dockets_output")]
    pub output_root: PathBuf,

    #[arg(long, value_enum, default_value_t = GroupBy::Driver)]
    pub group_by: GroupBy,

    /// JSON file mapping order id -> { driver_number, stop_number }.
    /// Required for --group-by driver.
    #[arg(long)]
    pub delivery_data: Option<PathBuf>,

    /// One-column CSV or plain text file of order numbers.
    /// Required for --group-by order.
    #[arg(long)]
    pub identifiers: Option<PathBuf>,

    /// Embed a Code128 barcode at the top of every matched page.
    #[arg(long, default_value_t = false)]
    pub stamp_barcodes: bool,

    /// Skip the fuzzy OCR-confusion matching pass.
    #[arg(long, default_value_t = false)]
    pub no_fuzzy: bool,

    /// Write bundles directly under the output root instead of a
    /// YYYY-MM-DD subfolder.
    #[arg(long, default_value_t = false)]
    pub no_date_folder: bool,

    #[arg(long, default_value = "eng")]
    pub ocr_lang: String,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    /// Input docket PDF files to scan.
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Region profile JSON: regions, trigger region, completion marker,
    /// field mapping and optional append rule.
    #[arg(long)]
    pub profile: PathBuf,

    #[arg(long, default_value = "structured_rows_output")]
    pub output_root: PathBuf,

    #[arg(long, default_value = "eng")]
    pub ocr_lang: String,

    #[arg(long)]
    pub rows_json_path: Option<PathBuf>,

    #[arg(long)]
    pub rows_csv_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = "picking_dockets_output")]
    pub output_root: PathBuf,
}
