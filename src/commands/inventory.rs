use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use crate::cli::InventoryArgs;
use crate::model::{DocumentEntry, DocumentInventoryManifest, DocumentKind};
use crate::util::{
    is_pdf_path, manifest_dir, now_utc_string, resolve_output_dir, sha256_file, write_json_pretty,
};

pub const ROSTER_DIR: &str = "pollingstation_pdfs";
pub const RESULTS_DIR: &str = "form20_pdfs";

pub fn run(args: InventoryArgs) -> Result<()> {
    let manifest = build_manifest(&args.data_root)?;

    if args.dry_run {
        info!(
            roster_count = manifest.roster_count,
            results_count = manifest.results_count,
            data_root = %manifest.data_root,
            "inventory dry-run complete"
        );
        return Ok(());
    }

    let manifest_path = args.manifest_path.unwrap_or_else(|| {
        default_manifest_path(&resolve_output_dir(
            &args.data_root,
            args.output_dir.as_deref(),
        ))
    });

    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote inventory manifest");
    info!(
        roster_count = manifest.roster_count,
        results_count = manifest.results_count,
        "inventory completed"
    );

    Ok(())
}

pub fn default_manifest_path(output_dir: &Path) -> PathBuf {
    manifest_dir(output_dir).join("document_inventory.json")
}

pub fn build_manifest(data_root: &Path) -> Result<DocumentInventoryManifest> {
    let mut documents = Vec::new();

    let roster_dir = data_root.join(ROSTER_DIR);
    if roster_dir.is_dir() {
        for path in discover_pdfs(&roster_dir)? {
            let filename = file_name_of(&path)?;
            documents.push(DocumentEntry {
                kind: DocumentKind::Roster,
                relative_path: relative_to(data_root, &path),
                ls_code: None,
                ac_code: roster_ac_code(&filename).to_string(),
                sha256: sha256_file(&path)?,
                filename,
            });
        }
    } else {
        warn!(path = %roster_dir.display(), "roster directory missing");
    }

    let results_dir = data_root.join(RESULTS_DIR);
    if results_dir.is_dir() {
        for folder in discover_subdirectories(&results_dir)? {
            let folder_name = file_name_of(&folder)?;
            let ls_code = ls_code_from_folder(&folder_name);
            for path in discover_pdfs(&folder)? {
                let filename = file_name_of(&path)?;
                documents.push(DocumentEntry {
                    kind: DocumentKind::Results,
                    relative_path: relative_to(data_root, &path),
                    ls_code: Some(ls_code.clone()),
                    ac_code: results_ac_code(&filename),
                    sha256: sha256_file(&path)?,
                    filename,
                });
            }
        }
    } else {
        warn!(path = %results_dir.display(), "results directory missing");
    }

    if documents.is_empty() {
        bail!("no PDFs found under {}", data_root.display());
    }

    documents.sort_by(|a, b| {
        a.kind
            .cmp(&b.kind)
            .then(a.relative_path.cmp(&b.relative_path))
    });

    let roster_count = documents
        .iter()
        .filter(|entry| entry.kind == DocumentKind::Roster)
        .count();

    Ok(DocumentInventoryManifest {
        manifest_version: 1,
        generated_at: now_utc_string(),
        data_root: data_root.display().to_string(),
        roster_count,
        results_count: documents.len() - roster_count,
        documents,
    })
}

fn discover_pdfs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut pdfs = Vec::new();

    let entries = fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;

    for entry in entries {
        let entry = entry.with_context(|| format!("failed to read entry in {}", dir.display()))?;
        let path = entry.path();

        if !entry
            .file_type()
            .with_context(|| format!("failed to inspect file type: {}", path.display()))?
            .is_file()
        {
            continue;
        }

        if is_pdf_path(&path) {
            pdfs.push(path);
        }
    }

    pdfs.sort();
    Ok(pdfs)
}

fn discover_subdirectories(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut folders = Vec::new();

    let entries = fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to read entry in {}", dir.display()))?;
        let path = entry.path();
        if path.is_dir() {
            folders.push(path);
        }
    }

    folders.sort();
    Ok(folders)
}

fn file_name_of(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(ToOwned::to_owned)
        .with_context(|| format!("invalid UTF-8 filename: {}", path.display()))
}

fn relative_to(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

/// `LS04` -> `04`, `Vadakara LS` -> `Vadakara`; a folder that is only `LS` keeps its name.
pub fn ls_code_from_folder(folder_name: &str) -> String {
    let stripped = folder_name.replace("LS", "");
    let trimmed = stripped.trim();
    if trimmed.is_empty() {
        folder_name.to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn results_ac_code(filename: &str) -> String {
    filename.chars().filter(char::is_ascii_digit).collect()
}

pub fn roster_ac_code(filename: &str) -> u32 {
    results_ac_code(filename).parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ls_code_strips_marker_and_keeps_bare_folder() {
        assert_eq!(ls_code_from_folder("LS04"), "04");
        assert_eq!(ls_code_from_folder("Vadakara LS"), "Vadakara");
        assert_eq!(ls_code_from_folder("LS"), "LS");
    }

    #[test]
    fn ac_codes_come_from_filename_digits() {
        assert_eq!(results_ac_code("AC102.pdf"), "102");
        assert_eq!(results_ac_code("form20.pdf"), "20");
        assert_eq!(roster_ac_code("AC023.pdf"), 23);
        assert_eq!(roster_ac_code("roster.pdf"), 0);
    }
}
