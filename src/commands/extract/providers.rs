use std::cmp::Reverse;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use regex::Regex;
use tracing::debug;

use crate::util::normalize_text;

/// Ordered text lines for each page of a document.
pub(crate) trait LineSource {
    fn pages(&self, pdf_path: &Path) -> Result<Vec<Vec<String>>>;
}

/// Ordered table grids detected in a document; cells are trimmed single-line strings.
pub(crate) trait TableSource {
    fn tables(&self, pdf_path: &Path) -> Result<Vec<Vec<Vec<String>>>>;
}

pub(crate) struct PdftotextLines {
    pub max_pages: Option<usize>,
}

impl LineSource for PdftotextLines {
    fn pages(&self, pdf_path: &Path) -> Result<Vec<Vec<String>>> {
        let pages = run_pdftotext(pdf_path, self.max_pages, false)?;
        Ok(pages
            .iter()
            .map(|page| page.lines().map(str::to_string).collect())
            .collect())
    }
}

/// Grids rebuilt from `pdftotext -layout`, one per page that carries a
/// `Serial ...` header line.
///
/// Column boundaries come from the widest data row (a line starting with a
/// digit): each of its cells fixes one column, and the cut between two
/// columns sits midway through the gap separating them. Every line, header
/// rows included, is then assigned cell by cell to the column it overlaps
/// most, so labels spanning several columns cannot shift the ones after them.
pub(crate) struct LayoutTables {
    max_pages: Option<usize>,
    cell_split: Regex,
}

/// A run of text on a layout line, with its character-column extent.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LayoutSegment {
    start: usize,
    end: usize,
    text: String,
}

impl LayoutTables {
    pub(crate) fn new(max_pages: Option<usize>) -> Result<Self> {
        Ok(Self {
            max_pages,
            cell_split: Regex::new(r"\t+|\s{2,}")
                .context("failed to compile table cell split regex")?,
        })
    }

    pub(crate) fn grid_from_page(&self, page: &str) -> Option<Vec<Vec<String>>> {
        let mut lines = page
            .lines()
            .skip_while(|line| !normalize_text(line).to_lowercase().starts_with("serial"));
        let header_line = lines.next()?;

        let rows = std::iter::once(header_line)
            .chain(lines)
            .map(|line| layout_segments(line, &self.cell_split))
            .filter(|segments| !segments.is_empty())
            .collect::<Vec<_>>();

        let template = rows
            .iter()
            .enumerate()
            .filter(|(_, segments)| is_data_line(segments))
            .max_by_key(|(index, segments)| (segments.len(), Reverse(*index)))
            .map(|(_, segments)| segments);

        let mut grid = match template {
            Some(template) => {
                let cuts = column_cuts(template);
                rows.iter()
                    .map(|segments| aligned_cells(segments, &cuts))
                    .collect::<Vec<_>>()
            }
            None => {
                debug!("layout table has no data rows; keeping raw cell splits");
                rows.iter()
                    .map(|segments| {
                        segments
                            .iter()
                            .map(|segment| segment.text.clone())
                            .collect::<Vec<_>>()
                    })
                    .collect::<Vec<_>>()
            }
        };

        pad_rows(&mut grid);
        Some(grid)
    }
}

impl TableSource for LayoutTables {
    fn tables(&self, pdf_path: &Path) -> Result<Vec<Vec<Vec<String>>>> {
        let pages = run_pdftotext(pdf_path, self.max_pages, true)?;
        Ok(pages
            .iter()
            .filter_map(|page| self.grid_from_page(page))
            .collect())
    }
}

/// Grids read from `<stem>.tables.json` beside the PDF, as exported by an
/// external lattice table detector.
pub(crate) struct SidecarTables;

impl SidecarTables {
    pub(crate) fn sidecar_path(pdf_path: &Path) -> PathBuf {
        let stem = pdf_path
            .file_stem()
            .and_then(|value| value.to_str())
            .unwrap_or("tables");
        pdf_path.with_file_name(format!("{stem}.tables.json"))
    }
}

impl TableSource for SidecarTables {
    fn tables(&self, pdf_path: &Path) -> Result<Vec<Vec<Vec<String>>>> {
        let path = Self::sidecar_path(pdf_path);
        let raw = fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
        let grids: Vec<Vec<Vec<String>>> = serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        Ok(grids
            .into_iter()
            .map(|grid| {
                let mut rows = grid
                    .into_iter()
                    .map(|row| row.iter().map(|cell| normalize_text(cell)).collect())
                    .collect::<Vec<Vec<String>>>();
                pad_rows(&mut rows);
                rows
            })
            .collect())
    }
}

fn layout_segments(line: &str, cell_split: &Regex) -> Vec<LayoutSegment> {
    let line = line.replace('\u{00A0}', " ");
    let separators = cell_split
        .find_iter(&line)
        .map(|found| (found.start(), found.end()))
        .chain(std::iter::once((line.len(), line.len())));

    let mut segments = Vec::new();
    let mut piece_start = 0;
    for (separator_start, separator_end) in separators {
        let piece = &line[piece_start..separator_start];
        let text = normalize_text(piece);
        if !text.is_empty() {
            let leading = piece.len() - piece.trim_start().len();
            let start = line[..piece_start + leading].chars().count();
            segments.push(LayoutSegment {
                start,
                end: start + piece.trim().chars().count(),
                text,
            });
        }
        piece_start = separator_end;
    }

    segments
}

fn is_data_line(segments: &[LayoutSegment]) -> bool {
    segments
        .first()
        .and_then(|segment| segment.text.chars().next())
        .is_some_and(|character| character.is_ascii_digit())
}

/// Column `i` spans `cuts[i]..cuts[i + 1]`; the last column is open-ended.
fn column_cuts(template: &[LayoutSegment]) -> Vec<usize> {
    let mut cuts = vec![0];
    for pair in template.windows(2) {
        cuts.push((pair[0].end + pair[1].start) / 2);
    }
    cuts.push(usize::MAX);
    cuts
}

fn aligned_cells(segments: &[LayoutSegment], cuts: &[usize]) -> Vec<String> {
    let mut cells = vec![String::new(); cuts.len().saturating_sub(1)];
    for segment in segments {
        // Ties go to the leftmost column.
        let column = cuts
            .windows(2)
            .enumerate()
            .max_by_key(|(index, bounds)| {
                let overlap = segment
                    .end
                    .min(bounds[1])
                    .saturating_sub(segment.start.max(bounds[0]));
                (overlap, Reverse(*index))
            })
            .map(|(index, _)| index)
            .unwrap_or(0);

        if let Some(cell) = cells.get_mut(column) {
            if !cell.is_empty() {
                cell.push(' ');
            }
            cell.push_str(&segment.text);
        }
    }
    cells
}

/// Pads every row with empty cells up to the widest row.
fn pad_rows(rows: &mut [Vec<String>]) {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    for row in rows.iter_mut() {
        row.resize(width, String::new());
    }
}

fn run_pdftotext(pdf_path: &Path, max_pages: Option<usize>, layout: bool) -> Result<Vec<String>> {
    let mut command = Command::new("pdftotext");
    if layout {
        command.arg("-layout");
    }
    command.arg("-enc").arg("UTF-8").arg("-f").arg("1");
    if let Some(max_pages) = max_pages {
        command.arg("-l").arg(max_pages.to_string());
    }
    command.arg(pdf_path).arg("-");

    let output = command
        .output()
        .with_context(|| format!("failed to execute pdftotext for {}", pdf_path.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "pdftotext returned non-zero exit status for {}: {}",
            pdf_path.display(),
            stderr.trim()
        );
    }

    Ok(split_pages(&String::from_utf8_lossy(&output.stdout)))
}

/// Splits pdftotext output on form feeds and drops trailing blank pages.
pub(crate) fn split_pages(raw: &str) -> Vec<String> {
    let mut pages: Vec<String> = raw
        .split('\u{000C}')
        .map(|chunk| chunk.replace('\u{0000}', ""))
        .collect();

    while let Some(last_page) = pages.last() {
        if last_page.trim().is_empty() {
            pages.pop();
            continue;
        }
        break;
    }

    pages
}

pub(crate) fn pdftotext_version() -> Option<String> {
    let output = Command::new("pdftotext").arg("-v").output().ok()?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let source = if stdout.trim().is_empty() {
        stderr.trim()
    } else {
        stdout.trim()
    };

    source
        .lines()
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.to_string())
}
