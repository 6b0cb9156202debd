use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "booth-extract",
    version,
    about = "Polling-station roster and booth-wise result extraction from election PDFs"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Inventory(InventoryArgs),
    Extract(ExtractArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct InventoryArgs {
    #[arg(long, default_value = ".")]
    pub data_root: PathBuf,

    /// Defaults to `<data-root>/output`.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    #[arg(long, default_value = ".")]
    pub data_root: PathBuf,

    /// Defaults to `<data-root>/output`.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Also write the four output tables to this SQLite file.
    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long, default_value_t = 2024)]
    pub election_year: i32,

    #[arg(long, value_enum, default_value_t = TableSourceKind::Layout)]
    pub table_source: TableSourceKind,

    #[arg(long)]
    pub max_pages_per_doc: Option<usize>,

    #[arg(long, default_value_t = false)]
    pub skip_roster: bool,

    #[arg(long, default_value_t = false)]
    pub skip_results: bool,

    /// Abort on the first document whose text or tables cannot be read.
    #[arg(long, default_value_t = false)]
    pub strict: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum TableSourceKind {
    /// Column-aligned text from `pdftotext -layout`.
    Layout,
    /// Pre-extracted grids in `<stem>.tables.json` next to each PDF.
    Sidecar,
}

impl TableSourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Layout => "layout",
            Self::Sidecar => "sidecar",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = ".")]
    pub data_root: PathBuf,

    /// Where `extract` wrote its outputs; defaults to `<data-root>/output`.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    #[arg(long)]
    pub db_path: Option<PathBuf>,
}
