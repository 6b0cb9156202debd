use anyhow::{Context, Result};
use regex::Regex;
use tracing::debug;

use super::results_table::ResultTableHeader;
use super::station_id::{StationId, parse_station_id};
use crate::model::{BoothTotalRecord, BoothVoteRecord};

/// Parses a vote count cell. Never fails: anything that is not a plain
/// base-10 non-negative integer (blank, stray text, signs, separators) is 0.
pub(crate) fn parse_count(cell: &str) -> u64 {
    let value = cell.trim();
    let value = value.strip_prefix('+').unwrap_or(value);
    if value.is_empty() || !value.chars().all(|character| character.is_ascii_digit()) {
        return 0;
    }
    value.parse::<u64>().unwrap_or(0)
}

/// One booth's worth of output rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RepairedRow {
    pub total: BoothTotalRecord,
    pub votes: Vec<BoothVoteRecord>,
}

pub(crate) struct RowRepairer {
    merged_pair: Regex,
    serial: Regex,
    station: Regex,
}

impl RowRepairer {
    pub(crate) fn new() -> Result<Self> {
        Ok(Self {
            merged_pair: Regex::new(r"^\d+[A-Za-z]?\s+\d+[A-Za-z]?$")
                .context("failed to compile merged serial/station regex")?,
            serial: Regex::new(r"^\d+$").context("failed to compile serial regex")?,
            station: Regex::new(r"^\d+[A-Za-z]?$").context("failed to compile station regex")?,
        })
    }

    /// Recovers `(serial, station)` from the first two cells, undoing the
    /// rendering artifact that fuses both values into one cell.
    pub(crate) fn repair_identity(
        &self,
        serial_cell: &str,
        station_cell: &str,
    ) -> Option<(String, StationId)> {
        let mut serial = serial_cell.trim().to_string();
        let mut station = station_cell.trim().to_string();

        if station.is_empty() && self.merged_pair.is_match(&serial) {
            (serial, station) = split_pair(&serial)?;
        } else if serial.is_empty() && self.merged_pair.is_match(&station) {
            (serial, station) = split_pair(&station)?;
        }

        if !self.serial.is_match(&serial) {
            return None;
        }
        if !self.station.is_match(&station) {
            return None;
        }

        let station = parse_station_id(&station)?;
        Some((serial, station))
    }

    /// Converts one data row into a total record plus one vote record per candidate.
    pub(crate) fn repair_row(
        &self,
        header: &ResultTableHeader,
        row: &[String],
        year: i32,
    ) -> Option<RepairedRow> {
        if row.len() < header.total_index + 3 {
            debug!(
                cells = row.len(),
                total_index = header.total_index,
                "skipping row without room for total/rejected/nota"
            );
            return None;
        }

        let Some((serial_no, station)) = self.repair_identity(&row[0], &row[1]) else {
            debug!(
                serial = %row[0],
                station = %row[1],
                "skipping row with invalid serial or station"
            );
            return None;
        };

        let cell = |index: usize| row.get(index).map(String::as_str).unwrap_or("");

        let total = BoothTotalRecord {
            ls: header.ls_code.clone(),
            ac: header.ac_code.clone(),
            serial_no: serial_no.clone(),
            ps_number_raw: station.raw.clone(),
            ps_number: station.number,
            ps_suffix: station.suffix.clone(),
            total_valid: parse_count(cell(header.total_index)),
            rejected: parse_count(cell(header.total_index + 1)),
            nota: parse_count(cell(header.total_index + 2)),
            year,
        };

        let votes = header
            .candidates
            .iter()
            .enumerate()
            .map(|(position, candidate)| BoothVoteRecord {
                ls: header.ls_code.clone(),
                ac: header.ac_code.clone(),
                serial_no: serial_no.clone(),
                ps_number_raw: station.raw.clone(),
                ps_number: station.number,
                ps_suffix: station.suffix.clone(),
                candidate_name: candidate.clone(),
                votes: parse_count(cell(2 + position)),
                year,
            })
            .collect();

        Some(RepairedRow { total, votes })
    }
}

fn split_pair(merged: &str) -> Option<(String, String)> {
    let mut tokens = merged.split_whitespace();
    let first = tokens.next()?.to_string();
    let second = tokens.next()?.to_string();
    Some((first, second))
}
