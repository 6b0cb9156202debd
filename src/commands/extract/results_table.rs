use tracing::{debug, info, warn};

use super::candidate_keys::candidate_keys_for;
use super::row_repair::RowRepairer;
use crate::model::{BoothTotalRecord, BoothVoteRecord};
use crate::util::normalize_text;

const MIN_GRID_ROWS: usize = 2;
const MIN_GRID_COLUMNS: usize = 5;
const FIRST_DATA_ROW: usize = 2;
const FIRST_CANDIDATE_COLUMN: usize = 2;

/// Column layout of a results document, derived once from its first results grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResultTableHeader {
    pub candidates: Vec<String>,
    /// Column holding total valid votes; rejected and NOTA follow it.
    pub total_index: usize,
    pub ls_code: String,
    pub ac_code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) enum HeaderState {
    #[default]
    Searching,
    Locked(ResultTableHeader),
    /// The first results grid had no total column; the document yields nothing.
    Failed,
}

/// Output of one results document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ResultsBundle {
    pub ls: String,
    pub ac: String,
    /// False when no header could be derived; the bundle is then empty.
    pub header_found: bool,
    pub candidates: Vec<String>,
    pub booth_votes: Vec<BoothVoteRecord>,
    pub booth_totals: Vec<BoothTotalRecord>,
}

impl ResultsBundle {
    pub(crate) fn candidate_keys(&self) -> Vec<String> {
        candidate_keys_for(&self.ls, &self.ac, self.candidates.len())
    }
}

fn grid_width(grid: &[Vec<String>]) -> usize {
    grid.iter().map(Vec::len).max().unwrap_or(0)
}

/// True for grids shaped like a results table whose first cell reads "Serial ...".
pub(crate) fn is_results_grid(grid: &[Vec<String>]) -> bool {
    if grid.len() < MIN_GRID_ROWS || grid_width(grid) < MIN_GRID_COLUMNS {
        return false;
    }

    grid.first()
        .and_then(|row| row.first())
        .map(|cell| normalize_text(cell).to_lowercase().starts_with("serial"))
        .unwrap_or(false)
}

fn find_total_column(row: &[String]) -> Option<usize> {
    row.iter()
        .position(|cell| normalize_text(cell).to_lowercase().contains("total"))
}

/// Reads candidate names and the total column from the two header rows.
///
/// The total label is looked up in row 0 first, then row 1; candidates are
/// row 1 from column 2 up to the total column.
pub(crate) fn locate_header(
    grid: &[Vec<String>],
    ls_code: &str,
    ac_code: &str,
) -> Option<ResultTableHeader> {
    let row0 = grid.first()?;
    let row1 = grid.get(1)?;
    let total_index = find_total_column(row0).or_else(|| find_total_column(row1))?;

    let candidates = if total_index > FIRST_CANDIDATE_COLUMN {
        row1.iter()
            .take(total_index)
            .skip(FIRST_CANDIDATE_COLUMN)
            .map(|cell| normalize_text(cell))
            .collect()
    } else {
        Vec::new()
    };

    Some(ResultTableHeader {
        candidates,
        total_index,
        ls_code: ls_code.to_string(),
        ac_code: ac_code.to_string(),
    })
}

/// Per-document results state: header lock plus accumulated rows.
///
/// Grids must be fed in document order; header derivation and row output
/// depend on it.
pub(crate) struct ResultsDocument<'a> {
    repairer: &'a RowRepairer,
    ls_code: String,
    ac_code: String,
    year: i32,
    header: HeaderState,
    accepted_grids: usize,
    booth_votes: Vec<BoothVoteRecord>,
    booth_totals: Vec<BoothTotalRecord>,
}

impl<'a> ResultsDocument<'a> {
    pub(crate) fn new(repairer: &'a RowRepairer, ls_code: &str, ac_code: &str, year: i32) -> Self {
        Self {
            repairer,
            ls_code: ls_code.to_string(),
            ac_code: ac_code.to_string(),
            year,
            header: HeaderState::Searching,
            accepted_grids: 0,
            booth_votes: Vec::new(),
            booth_totals: Vec::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn header(&self) -> &HeaderState {
        &self.header
    }

    pub(crate) fn consume_grid(&mut self, index: usize, grid: &[Vec<String>]) {
        if !is_results_grid(grid) {
            debug!(table = index, rows = grid.len(), "skipping non-results table");
            return;
        }

        if matches!(self.header, HeaderState::Failed) {
            debug!(table = index, "skipping table after header derivation failed");
            return;
        }

        if matches!(self.header, HeaderState::Searching) {
            match locate_header(grid, &self.ls_code, &self.ac_code) {
                Some(header) => {
                    info!(
                        table = index,
                        candidates = header.candidates.len(),
                        total_index = header.total_index,
                        "locked results header"
                    );
                    self.header = HeaderState::Locked(header);
                }
                None => {
                    warn!(
                        table = index,
                        ls = %self.ls_code,
                        ac = %self.ac_code,
                        "total column not found in first results table"
                    );
                    self.header = HeaderState::Failed;
                    return;
                }
            }
        }

        let HeaderState::Locked(header) = &self.header else {
            return;
        };

        self.accepted_grids += 1;
        for row in grid.iter().skip(FIRST_DATA_ROW) {
            if let Some(repaired) = self.repairer.repair_row(header, row, self.year) {
                self.booth_totals.push(repaired.total);
                self.booth_votes.extend(repaired.votes);
            }
        }
    }

    pub(crate) fn finish(self) -> ResultsBundle {
        debug!(
            accepted_grids = self.accepted_grids,
            booths = self.booth_totals.len(),
            "finished results document"
        );

        let (header_found, candidates) = match self.header {
            HeaderState::Locked(header) => (true, header.candidates),
            HeaderState::Searching | HeaderState::Failed => (false, Vec::new()),
        };

        ResultsBundle {
            ls: self.ls_code,
            ac: self.ac_code,
            header_found,
            candidates,
            booth_votes: self.booth_votes,
            booth_totals: self.booth_totals,
        }
    }
}

/// Runs the locator and row repair over every grid of one document.
pub(crate) fn parse_results_document(
    repairer: &RowRepairer,
    grids: &[Vec<Vec<String>>],
    ls_code: &str,
    ac_code: &str,
    year: i32,
) -> ResultsBundle {
    let mut document = ResultsDocument::new(repairer, ls_code, ac_code, year);
    for (index, grid) in grids.iter().enumerate() {
        document.consume_grid(index, grid);
    }
    document.finish()
}
