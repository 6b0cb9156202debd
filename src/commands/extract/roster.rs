use anyhow::{Context, Result};
use regex::Regex;
use tracing::debug;

use super::metadata::{MetadataExtractor, RosterMetadata};
use super::station_id::{StationId, parse_station_id};
use crate::model::PollingStationRecord;
use crate::util::normalize_text;

/// Lower-case substrings that mark page headers and column captions.
const NOISE_MARKERS: [&str; 7] = [
    "district",
    "lac",
    "block",
    "taluk",
    "polling station",
    "sl no",
    "ps no",
];

/// How a single normalized roster line is interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LineClass {
    Blank,
    Noise,
    /// `12 Community Hall` or `12A Community Hall`.
    SingleLine { station: StationId, name: String },
    /// A line holding only `12` or `12A`; the name follows on the next line.
    BareId(StationId),
    Text(String),
}

/// Carried state between lines: either nothing, or an identifier still waiting for its name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) enum RosterState {
    #[default]
    Idle,
    Pending(StationId),
}

impl RosterState {
    /// Applies one classified line and returns the next state plus any completed station.
    ///
    /// A bare identifier arriving while another is pending replaces it; the
    /// earlier identifier never received a name and is dropped.
    pub(crate) fn advance(self, class: LineClass) -> (RosterState, Option<(StationId, String)>) {
        match (self, class) {
            (state, LineClass::Blank | LineClass::Noise) => (state, None),
            (state, LineClass::SingleLine { station, name }) => {
                if let RosterState::Pending(stale) = state {
                    debug!(ps = %stale.raw, "pending station id replaced by single-line record");
                }
                (RosterState::Idle, Some((station, name)))
            }
            (state, LineClass::BareId(station)) => {
                if let RosterState::Pending(stale) = state {
                    debug!(ps = %stale.raw, "pending station id discarded without a name");
                }
                (RosterState::Pending(station), None)
            }
            (RosterState::Pending(station), LineClass::Text(name)) => {
                (RosterState::Idle, Some((station, name)))
            }
            (RosterState::Idle, LineClass::Text(line)) => {
                debug!(line = %line, "dropping text line with no pending station id");
                (RosterState::Idle, None)
            }
        }
    }
}

pub(crate) struct RosterParser {
    metadata: MetadataExtractor,
    single_line: Regex,
    bare_id: Regex,
}

impl RosterParser {
    pub(crate) fn new() -> Result<Self> {
        Ok(Self {
            metadata: MetadataExtractor::new()?,
            single_line: Regex::new(r"^(\d{1,3}[A-Za-z]?)\s+(.*)$")
                .context("failed to compile single-line station regex")?,
            bare_id: Regex::new(r"^\d{1,3}[A-Za-z]?$")
                .context("failed to compile bare station id regex")?,
        })
    }

    pub(crate) fn classify_line(&self, raw: &str) -> LineClass {
        let line = normalize_text(raw);
        if line.is_empty() {
            return LineClass::Blank;
        }

        let lower = line.to_lowercase();
        if NOISE_MARKERS.iter().any(|marker| lower.contains(marker)) {
            return LineClass::Noise;
        }

        if let Some(captures) = self.single_line.captures(&line)
            && let Some(station) = captures
                .get(1)
                .and_then(|value| parse_station_id(value.as_str()))
        {
            let name = captures
                .get(2)
                .map(|value| value.as_str().trim().to_string())
                .unwrap_or_default();
            return LineClass::SingleLine { station, name };
        }

        if self.bare_id.is_match(&line)
            && let Some(station) = parse_station_id(&line)
        {
            return LineClass::BareId(station);
        }

        LineClass::Text(line)
    }

    /// Parses a whole roster document; `pages` are in reading order.
    pub(crate) fn parse_document(&self, pages: &[Vec<String>]) -> Vec<PollingStationRecord> {
        let metadata = pages
            .first()
            .map(|first_page| self.metadata.extract(first_page))
            .unwrap_or_default();
        if metadata.district_code.is_none() || metadata.ac_code.is_none() {
            debug!("roster metadata incomplete on first page");
        }

        let mut machine = RosterStateMachine::new(self, metadata);
        for line in pages.iter().flatten() {
            machine.feed(line);
        }
        machine.finish()
    }
}

/// Per-document state; never shared between documents.
pub(crate) struct RosterStateMachine<'a> {
    parser: &'a RosterParser,
    metadata: RosterMetadata,
    state: RosterState,
    records: Vec<PollingStationRecord>,
}

impl<'a> RosterStateMachine<'a> {
    pub(crate) fn new(parser: &'a RosterParser, metadata: RosterMetadata) -> Self {
        Self {
            parser,
            metadata,
            state: RosterState::Idle,
            records: Vec::new(),
        }
    }

    pub(crate) fn feed(&mut self, line: &str) {
        let class = self.parser.classify_line(line);
        let (next, emitted) = std::mem::take(&mut self.state).advance(class);
        self.state = next;

        if let Some((station, name)) = emitted {
            self.records.push(PollingStationRecord {
                district_code: self.metadata.district_code.clone(),
                district_name: self.metadata.district_name.clone(),
                ac_code: self.metadata.ac_code.clone(),
                ac_name: self.metadata.ac_name.clone(),
                ps_number_raw: station.raw,
                ps_number: station.number,
                ps_suffix: station.suffix,
                polling_station_name: name,
            });
        }
    }

    pub(crate) fn finish(self) -> Vec<PollingStationRecord> {
        if let RosterState::Pending(station) = &self.state {
            debug!(ps = %station.raw, "document ended with a pending station id");
        }
        self.records
    }
}
