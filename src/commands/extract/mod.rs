//! Roster and booth-wise result extraction.
//!
//! Two pipelines run per document and meet only in [`aggregate::Aggregator`]:
//! roster PDFs go through the line-oriented [`roster::RosterStateMachine`],
//! results PDFs through the table locator and row repair in
//! [`results_table`] and [`row_repair`].

mod aggregate;
mod candidate_keys;
mod export;
mod metadata;
mod providers;
mod results_table;
mod roster;
mod row_repair;
mod run;
mod station_id;
#[cfg(test)]
mod tests;

pub use run::run;

pub(crate) use export::{OUTPUT_TABLES, count_rows};
pub(crate) use run::latest_run_manifest;
