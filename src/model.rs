use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Roster,
    Results,
}

impl DocumentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Roster => "roster",
            Self::Results => "results",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentEntry {
    pub kind: DocumentKind,
    pub filename: String,
    /// Relative to the data root.
    pub relative_path: String,
    /// Only set for results documents.
    pub ls_code: Option<String>,
    pub ac_code: String,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInventoryManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub data_root: String,
    pub roster_count: usize,
    pub results_count: usize,
    pub documents: Vec<DocumentEntry>,
}

/// One polling station as listed in a roster document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollingStationRecord {
    pub district_code: Option<String>,
    pub district_name: Option<String>,
    pub ac_code: Option<String>,
    pub ac_name: Option<String>,
    pub ps_number_raw: String,
    pub ps_number: u32,
    pub ps_suffix: String,
    pub polling_station_name: String,
}

/// Votes polled by one candidate at one booth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoothVoteRecord {
    pub ls: String,
    pub ac: String,
    pub serial_no: String,
    pub ps_number_raw: String,
    pub ps_number: u32,
    pub ps_suffix: String,
    pub candidate_name: String,
    pub votes: u64,
    pub year: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoothTotalRecord {
    pub ls: String,
    pub ac: String,
    pub serial_no: String,
    pub ps_number_raw: String,
    pub ps_number: u32,
    pub ps_suffix: String,
    pub total_valid: u64,
    pub rejected: u64,
    pub nota: u64,
    pub year: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolVersions {
    pub pdftotext: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractPaths {
    pub data_root: String,
    pub output_dir: String,
    pub manifest_dir: String,
    pub booths_csv: String,
    pub candidates_csv: String,
    pub booth_votes_csv: String,
    pub booth_totals_csv: String,
    pub db_path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractCounts {
    pub roster_documents: usize,
    pub results_documents: usize,
    pub failed_documents: usize,
    pub documents_without_header: usize,
    pub booth_rows: usize,
    pub candidate_keys: usize,
    pub booth_vote_rows: usize,
    pub booth_total_rows: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub kind: DocumentKind,
    pub relative_path: String,
    pub ls_code: Option<String>,
    pub ac_code: String,
    pub status: String,
    pub candidates: usize,
    pub rows: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub command: String,
    pub election_year: i32,
    pub table_source: String,
    pub tool_versions: ToolVersions,
    pub paths: ExtractPaths,
    pub counts: ExtractCounts,
    pub documents: Vec<DocumentSummary>,
    pub warnings: Vec<String>,
}
