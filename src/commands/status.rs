use std::fs;

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::commands::extract::{OUTPUT_TABLES, count_rows, latest_run_manifest};
use crate::commands::inventory;
use crate::model::{DocumentInventoryManifest, ExtractRunManifest};
use crate::util::{manifest_dir, resolve_output_dir};

pub fn run(args: StatusArgs) -> Result<()> {
    let output_dir = resolve_output_dir(&args.data_root, args.output_dir.as_deref());
    let run_manifests = manifest_dir(&output_dir);
    let inventory_path = inventory::default_manifest_path(&output_dir);

    info!(
        data_root = %args.data_root.display(),
        output_dir = %output_dir.display(),
        "status requested"
    );

    match latest_run_manifest(&run_manifests)? {
        Some(run_path) => {
            let raw = fs::read(&run_path)
                .with_context(|| format!("failed to read {}", run_path.display()))?;
            let manifest: ExtractRunManifest = serde_json::from_slice(&raw)
                .with_context(|| format!("failed to parse {}", run_path.display()))?;

            info!(
                run_id = %manifest.run_id,
                status = %manifest.status,
                started_at = %manifest.started_at,
                updated_at = %manifest.updated_at,
                election_year = manifest.election_year,
                table_source = %manifest.table_source,
                roster_documents = manifest.counts.roster_documents,
                results_documents = manifest.counts.results_documents,
                failed_documents = manifest.counts.failed_documents,
                documents_without_header = manifest.counts.documents_without_header,
                booths = manifest.counts.booth_rows,
                candidate_keys = manifest.counts.candidate_keys,
                booth_votes = manifest.counts.booth_vote_rows,
                booth_totals = manifest.counts.booth_total_rows,
                "loaded latest extract run manifest"
            );
            for warning in &manifest.warnings {
                warn!(warning = %warning, "recorded run warning");
            }
        }
        None => warn!(path = %run_manifests.display(), "no extract run manifest found"),
    }

    if inventory_path.exists() {
        let raw = fs::read(&inventory_path)
            .with_context(|| format!("failed to read {}", inventory_path.display()))?;
        let inventory: DocumentInventoryManifest = serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse {}", inventory_path.display()))?;

        info!(
            generated_at = %inventory.generated_at,
            roster_count = inventory.roster_count,
            results_count = inventory.results_count,
            "loaded inventory manifest"
        );
    } else {
        warn!(path = %inventory_path.display(), "inventory manifest missing");
    }

    let Some(db_path) = args.db_path else {
        return Ok(());
    };

    if db_path.exists() {
        let conn = Connection::open(&db_path)
            .with_context(|| format!("failed to open {}", db_path.display()))?;
        for table in OUTPUT_TABLES {
            match count_rows(&conn, table) {
                Ok(rows) => info!(
                    path = %db_path.display(),
                    table = table,
                    rows = rows,
                    "database table status"
                ),
                Err(error) => warn!(
                    path = %db_path.display(),
                    table = table,
                    error = %error,
                    "database table not readable; extract may not have written it"
                ),
            }
        }
    } else {
        warn!(path = %db_path.display(), "database file missing");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use super::*;

    fn scratch_root() -> PathBuf {
        let stamp = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let root = std::env::temp_dir().join(format!(
            "booth_extract_status_{}_{}",
            std::process::id(),
            stamp
        ));
        fs::create_dir_all(&root).expect("create scratch root");
        root
    }

    #[test]
    fn status_reads_run_manifests_from_custom_output_dir() {
        let root = scratch_root();
        let custom = root.join("elsewhere");
        let manifests = manifest_dir(&custom);
        fs::create_dir_all(&manifests).expect("create manifest dir");
        fs::write(manifests.join("extract_run_20240601T000000Z.json"), "{}").expect("older");
        fs::write(manifests.join("extract_run_20240602T000000Z.json"), "{}").expect("newer");
        fs::write(manifests.join("document_inventory.json"), "{}").expect("inventory");

        let args = StatusArgs {
            data_root: root.clone(),
            output_dir: Some(custom.clone()),
            db_path: None,
        };
        let output_dir = resolve_output_dir(&args.data_root, args.output_dir.as_deref());

        assert_eq!(
            latest_run_manifest(&manifest_dir(&output_dir)).expect("scan"),
            Some(manifests.join("extract_run_20240602T000000Z.json"))
        );
        assert_eq!(
            inventory::default_manifest_path(&output_dir),
            manifests.join("document_inventory.json")
        );

        let default_output = resolve_output_dir(&args.data_root, None);
        assert_eq!(latest_run_manifest(&manifest_dir(&default_output)).expect("scan"), None);

        let _ = fs::remove_dir_all(&root);
    }
}
