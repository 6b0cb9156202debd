use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::{Connection, params};
use serde::Serialize;
use tracing::info;

use super::aggregate::Aggregator;
use crate::util::ensure_directory;

pub(crate) const BOOTHS_CSV: &str = "booths.csv";
pub(crate) const CANDIDATES_CSV: &str = "candidates.csv";
pub(crate) const BOOTH_VOTES_CSV: &str = "form20_parsed.csv";
pub(crate) const BOOTH_TOTALS_CSV: &str = "booth_totals.csv";

pub(crate) const OUTPUT_TABLES: [&str; 4] = ["booths", "candidates", "booth_votes", "booth_totals"];

#[derive(Debug, Serialize)]
struct CandidateKeyRow<'a> {
    candidate_key: &'a str,
}

pub(crate) fn write_csv_outputs(output_dir: &Path, aggregate: &Aggregator) -> Result<()> {
    ensure_directory(output_dir)?;

    write_csv(&output_dir.join(BOOTHS_CSV), &aggregate.booths)?;
    // BTreeSet iteration is already sorted.
    let keys = aggregate
        .candidate_keys
        .iter()
        .map(|key| CandidateKeyRow { candidate_key: key })
        .collect::<Vec<_>>();
    write_csv(&output_dir.join(CANDIDATES_CSV), &keys)?;
    write_csv(&output_dir.join(BOOTH_VOTES_CSV), &aggregate.booth_votes)?;
    write_csv(&output_dir.join(BOOTH_TOTALS_CSV), &aggregate.booth_totals)?;

    info!(path = %output_dir.display(), "wrote csv outputs");
    Ok(())
}

fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create csv file: {}", path.display()))?;
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("failed to write csv row: {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to flush csv file: {}", path.display()))?;
    Ok(())
}

pub(crate) fn csv_paths(output_dir: &Path) -> [PathBuf; 4] {
    [
        output_dir.join(BOOTHS_CSV),
        output_dir.join(CANDIDATES_CSV),
        output_dir.join(BOOTH_VOTES_CSV),
        output_dir.join(BOOTH_TOTALS_CSV),
    ]
}

pub(crate) fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    Ok(())
}

/// Recreates the output tables; each run replaces the previous contents.
pub(crate) fn ensure_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            "
            DROP TABLE IF EXISTS booths;
            DROP TABLE IF EXISTS candidates;
            DROP TABLE IF EXISTS booth_votes;
            DROP TABLE IF EXISTS booth_totals;

            CREATE TABLE booths (
              district_code TEXT,
              district_name TEXT,
              ac_code TEXT,
              ac_name TEXT,
              ps_number_raw TEXT NOT NULL,
              ps_number INTEGER NOT NULL,
              ps_suffix TEXT NOT NULL,
              polling_station_name TEXT NOT NULL
            );

            CREATE TABLE candidates (
              candidate_key TEXT PRIMARY KEY
            );

            CREATE TABLE booth_votes (
              ls TEXT NOT NULL,
              ac TEXT NOT NULL,
              serial_no TEXT NOT NULL,
              ps_number_raw TEXT NOT NULL,
              ps_number INTEGER NOT NULL,
              ps_suffix TEXT NOT NULL,
              candidate_name TEXT NOT NULL,
              votes INTEGER NOT NULL,
              year INTEGER NOT NULL
            );

            CREATE TABLE booth_totals (
              ls TEXT NOT NULL,
              ac TEXT NOT NULL,
              serial_no TEXT NOT NULL,
              ps_number_raw TEXT NOT NULL,
              ps_number INTEGER NOT NULL,
              ps_suffix TEXT NOT NULL,
              total_valid INTEGER NOT NULL,
              rejected INTEGER NOT NULL,
              nota INTEGER NOT NULL,
              year INTEGER NOT NULL
            );

            CREATE INDEX idx_booth_votes_booth ON booth_votes(ls, ac, ps_number_raw);
            CREATE INDEX idx_booth_totals_booth ON booth_totals(ls, ac, ps_number_raw);
            ",
        )
        .context("failed to create output tables")?;
    Ok(())
}

pub(crate) fn write_sqlite(connection: &mut Connection, aggregate: &Aggregator) -> Result<()> {
    ensure_schema(connection)?;
    let tx = connection.transaction()?;

    {
        let mut statement = tx.prepare(
            "
            INSERT INTO booths(
              district_code, district_name, ac_code, ac_name,
              ps_number_raw, ps_number, ps_suffix, polling_station_name
            )
            VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
        )?;
        for booth in &aggregate.booths {
            statement.execute(params![
                booth.district_code,
                booth.district_name,
                booth.ac_code,
                booth.ac_name,
                booth.ps_number_raw,
                booth.ps_number,
                booth.ps_suffix,
                booth.polling_station_name,
            ])?;
        }

        let mut statement = tx.prepare("INSERT INTO candidates(candidate_key) VALUES(?1)")?;
        for key in &aggregate.candidate_keys {
            statement.execute(params![key])?;
        }

        let mut statement = tx.prepare(
            "
            INSERT INTO booth_votes(
              ls, ac, serial_no, ps_number_raw, ps_number, ps_suffix,
              candidate_name, votes, year
            )
            VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ",
        )?;
        for vote in &aggregate.booth_votes {
            statement.execute(params![
                vote.ls,
                vote.ac,
                vote.serial_no,
                vote.ps_number_raw,
                vote.ps_number,
                vote.ps_suffix,
                vote.candidate_name,
                sql_count(vote.votes),
                vote.year,
            ])?;
        }

        let mut statement = tx.prepare(
            "
            INSERT INTO booth_totals(
              ls, ac, serial_no, ps_number_raw, ps_number, ps_suffix,
              total_valid, rejected, nota, year
            )
            VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ",
        )?;
        for total in &aggregate.booth_totals {
            statement.execute(params![
                total.ls,
                total.ac,
                total.serial_no,
                total.ps_number_raw,
                total.ps_number,
                total.ps_suffix,
                sql_count(total.total_valid),
                sql_count(total.rejected),
                sql_count(total.nota),
                total.year,
            ])?;
        }
    }

    tx.commit().context("failed to commit output tables")?;
    Ok(())
}

// SQLite integers are signed 64-bit.
fn sql_count(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

pub(crate) fn count_rows(connection: &Connection, table: &str) -> Result<i64> {
    let count = connection.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get(0)
    })?;
    Ok(count)
}
