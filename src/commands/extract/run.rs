use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::Connection;
use tracing::{info, warn};

use super::aggregate::Aggregator;
use super::export::{configure_connection, csv_paths, write_csv_outputs, write_sqlite};
use super::providers::{
    LayoutTables, LineSource, PdftotextLines, SidecarTables, TableSource, pdftotext_version,
};
use super::results_table::parse_results_document;
use super::roster::RosterParser;
use super::row_repair::RowRepairer;
use crate::cli::{ExtractArgs, TableSourceKind};
use crate::commands::inventory;
use crate::model::{
    DocumentEntry, DocumentKind, DocumentSummary, ExtractCounts, ExtractPaths, ExtractRunManifest,
    ToolVersions,
};
use crate::util::{
    ensure_directory, manifest_dir, now_utc_string, resolve_output_dir, utc_compact_string,
    write_json_pretty,
};

pub fn run(args: ExtractArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let output_dir = resolve_output_dir(&args.data_root, args.output_dir.as_deref());
    let manifest_dir = manifest_dir(&output_dir);
    ensure_directory(&manifest_dir)?;
    let run_manifest_path = manifest_dir.join(format!(
        "extract_run_{}.json",
        utc_compact_string(started_ts)
    ));

    info!(data_root = %args.data_root.display(), run_id = %run_id, "starting extract");

    let inventory = inventory::build_manifest(&args.data_root)?;
    write_json_pretty(&inventory::default_manifest_path(&output_dir), &inventory)?;

    let lines: Box<dyn LineSource> = Box::new(PdftotextLines {
        max_pages: args.max_pages_per_doc,
    });
    let tables: Box<dyn TableSource> = match args.table_source {
        TableSourceKind::Layout => Box::new(LayoutTables::new(args.max_pages_per_doc)?),
        TableSourceKind::Sidecar => Box::new(SidecarTables),
    };

    let roster_parser = RosterParser::new()?;
    let repairer = RowRepairer::new()?;

    let mut counts = ExtractCounts::default();
    let mut summaries = Vec::<DocumentSummary>::new();
    let mut warnings = Vec::<String>::new();

    // Roster and results documents accumulate separately and merge at the end.
    let mut roster_rows = Aggregator::default();
    let mut results_rows = Aggregator::default();

    for entry in &inventory.documents {
        let skip = match entry.kind {
            DocumentKind::Roster => args.skip_roster,
            DocumentKind::Results => args.skip_results,
        };
        if skip {
            continue;
        }

        let pdf_path = args.data_root.join(&entry.relative_path);
        let outcome = match entry.kind {
            DocumentKind::Roster => {
                counts.roster_documents += 1;
                process_roster(&roster_parser, lines.as_ref(), &pdf_path, entry, &mut roster_rows)
            }
            DocumentKind::Results => {
                counts.results_documents += 1;
                process_results(
                    &repairer,
                    tables.as_ref(),
                    &pdf_path,
                    entry,
                    args.election_year,
                    &mut results_rows,
                )
            }
        };

        match outcome {
            Ok(summary) => {
                if summary.status == "no_header" {
                    counts.documents_without_header += 1;
                }
                summaries.push(summary);
            }
            Err(error) => {
                if args.strict {
                    return Err(error).with_context(|| {
                        format!("failed to process {}", pdf_path.display())
                    });
                }

                warn!(
                    kind = entry.kind.as_str(),
                    path = %pdf_path.display(),
                    error = %error,
                    "document failed"
                );
                counts.failed_documents += 1;
                warnings.push(format!("{}: {:#}", entry.relative_path, error));
                summaries.push(DocumentSummary {
                    kind: entry.kind,
                    relative_path: entry.relative_path.clone(),
                    ls_code: entry.ls_code.clone(),
                    ac_code: entry.ac_code.clone(),
                    status: "failed".to_string(),
                    candidates: 0,
                    rows: 0,
                    error: Some(format!("{error:#}")),
                });
            }
        }
    }

    let mut aggregate = roster_rows;
    aggregate.merge(results_rows);

    counts.booth_rows = aggregate.booths.len();
    counts.candidate_keys = aggregate.candidate_keys.len();
    counts.booth_vote_rows = aggregate.booth_votes.len();
    counts.booth_total_rows = aggregate.booth_totals.len();

    write_csv_outputs(&output_dir, &aggregate)?;

    if let Some(db_path) = &args.db_path {
        let mut connection = Connection::open(db_path)
            .with_context(|| format!("failed to open {}", db_path.display()))?;
        configure_connection(&connection)?;
        write_sqlite(&mut connection, &aggregate)?;
        info!(path = %db_path.display(), "wrote sqlite outputs");
    }

    let [booths_csv, candidates_csv, booth_votes_csv, booth_totals_csv] = csv_paths(&output_dir);
    let manifest = ExtractRunManifest {
        manifest_version: 1,
        run_id,
        status: if counts.failed_documents == 0 {
            "completed".to_string()
        } else {
            "completed_with_failures".to_string()
        },
        started_at,
        updated_at: now_utc_string(),
        command: render_extract_command(&args),
        election_year: args.election_year,
        table_source: args.table_source.as_str().to_string(),
        tool_versions: ToolVersions {
            pdftotext: pdftotext_version(),
        },
        paths: ExtractPaths {
            data_root: args.data_root.display().to_string(),
            output_dir: output_dir.display().to_string(),
            manifest_dir: manifest_dir.display().to_string(),
            booths_csv: display(&booths_csv),
            candidates_csv: display(&candidates_csv),
            booth_votes_csv: display(&booth_votes_csv),
            booth_totals_csv: display(&booth_totals_csv),
            db_path: args.db_path.as_deref().map(display),
        },
        counts: counts.clone(),
        documents: summaries,
        warnings,
    };

    write_json_pretty(&run_manifest_path, &manifest)?;

    info!(path = %run_manifest_path.display(), "wrote extract run manifest");
    info!(
        booths = counts.booth_rows,
        candidate_keys = counts.candidate_keys,
        booth_votes = counts.booth_vote_rows,
        booth_totals = counts.booth_total_rows,
        failed_documents = counts.failed_documents,
        "extract completed"
    );

    Ok(())
}

fn process_roster(
    parser: &RosterParser,
    lines: &dyn LineSource,
    pdf_path: &Path,
    entry: &DocumentEntry,
    aggregate: &mut Aggregator,
) -> Result<DocumentSummary> {
    let pages = lines.pages(pdf_path)?;
    let records = parser.parse_document(&pages);

    info!(
        path = %entry.relative_path,
        ac = %entry.ac_code,
        stations = records.len(),
        "parsed polling station list"
    );

    let summary = DocumentSummary {
        kind: entry.kind,
        relative_path: entry.relative_path.clone(),
        ls_code: None,
        ac_code: entry.ac_code.clone(),
        status: "parsed".to_string(),
        candidates: 0,
        rows: records.len(),
        error: None,
    };
    aggregate.add_roster(records);
    Ok(summary)
}

fn process_results(
    repairer: &RowRepairer,
    tables: &dyn TableSource,
    pdf_path: &Path,
    entry: &DocumentEntry,
    year: i32,
    aggregate: &mut Aggregator,
) -> Result<DocumentSummary> {
    let grids = tables.tables(pdf_path)?;
    let ls_code = entry.ls_code.clone().unwrap_or_default();
    let bundle = parse_results_document(repairer, &grids, &ls_code, &entry.ac_code, year);

    info!(
        path = %entry.relative_path,
        ls = %bundle.ls,
        ac = %bundle.ac,
        tables = grids.len(),
        candidates = bundle.candidates.len(),
        booths = bundle.booth_totals.len(),
        "parsed booth-wise results"
    );

    let status = if bundle.header_found {
        "parsed"
    } else {
        warn!(path = %entry.relative_path, "no results header found; document yields no rows");
        "no_header"
    };

    let summary = DocumentSummary {
        kind: entry.kind,
        relative_path: entry.relative_path.clone(),
        ls_code: entry.ls_code.clone(),
        ac_code: entry.ac_code.clone(),
        status: status.to_string(),
        candidates: bundle.candidates.len(),
        rows: bundle.booth_totals.len(),
        error: None,
    };
    aggregate.add_results(bundle);
    Ok(summary)
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

fn render_extract_command(args: &ExtractArgs) -> String {
    let mut command = vec![
        "booth-extract".to_string(),
        "extract".to_string(),
        "--data-root".to_string(),
        args.data_root.display().to_string(),
    ];

    if let Some(path) = &args.output_dir {
        command.push("--output-dir".to_string());
        command.push(path.display().to_string());
    }
    if let Some(path) = &args.db_path {
        command.push("--db-path".to_string());
        command.push(path.display().to_string());
    }
    command.push("--election-year".to_string());
    command.push(args.election_year.to_string());
    command.push("--table-source".to_string());
    command.push(args.table_source.as_str().to_string());
    if let Some(max_pages) = args.max_pages_per_doc {
        command.push("--max-pages-per-doc".to_string());
        command.push(max_pages.to_string());
    }
    if args.skip_roster {
        command.push("--skip-roster".to_string());
    }
    if args.skip_results {
        command.push("--skip-results".to_string());
    }
    if args.strict {
        command.push("--strict".to_string());
    }

    command.join(" ")
}

pub(crate) fn latest_run_manifest(manifest_dir: &Path) -> Result<Option<PathBuf>> {
    if !manifest_dir.is_dir() {
        return Ok(None);
    }

    let mut latest = None::<PathBuf>;
    let entries = std::fs::read_dir(manifest_dir)
        .with_context(|| format!("failed to read {}", manifest_dir.display()))?;
    for entry in entries {
        let path = entry
            .with_context(|| format!("failed to read entry in {}", manifest_dir.display()))?
            .path();
        let is_run_manifest = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with("extract_run_") && name.ends_with(".json"))
            .unwrap_or(false);
        if is_run_manifest && latest.as_ref().is_none_or(|current| path > *current) {
            latest = Some(path);
        }
    }

    Ok(latest)
}
