use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

pub fn now_utc_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn utc_compact_string(ts: DateTime<Utc>) -> String {
    ts.format("%Y%m%dT%H%M%SZ").to_string()
}

pub fn ensure_directory(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("failed to create directory: {}", path.display()))
}

/// `--output-dir` when given, otherwise `<data-root>/output`.
pub fn resolve_output_dir(data_root: &Path, output_dir: Option<&Path>) -> PathBuf {
    output_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| data_root.join("output"))
}

pub fn manifest_dir(output_dir: &Path) -> PathBuf {
    output_dir.join("manifests")
}

pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)
        .with_context(|| format!("failed to open file for hashing: {}", path.display()))?;

    let mut hasher = Sha256::new();
    let mut buf = [0_u8; 8192];

    loop {
        let count = file
            .read(&mut buf)
            .with_context(|| format!("failed to read file for hashing: {}", path.display()))?;
        if count == 0 {
            break;
        }
        hasher.update(&buf[..count]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

pub fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }

    let data = serde_json::to_vec_pretty(value)
        .with_context(|| format!("failed to serialize json: {}", path.display()))?;

    let mut file = File::create(path)
        .with_context(|| format!("failed to create json file: {}", path.display()))?;
    file.write_all(&data)
        .with_context(|| format!("failed to write json file: {}", path.display()))?;
    file.write_all(b"\n")
        .with_context(|| format!("failed to finalize json file: {}", path.display()))?;

    Ok(())
}

/// Turns non-breaking spaces into plain spaces and collapses whitespace runs.
pub fn normalize_text(input: &str) -> String {
    input
        .replace('\u{00A0}', " ")
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
}

pub fn is_pdf_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_collapses_nbsp_and_runs() {
        assert_eq!(normalize_text("  12\u{00A0}\u{00A0}Community \t Hall "), "12 Community Hall");
        assert_eq!(normalize_text("\u{00A0} \n"), "");
    }

    #[test]
    fn output_dir_defaults_under_data_root() {
        assert_eq!(
            resolve_output_dir(Path::new("data"), None),
            PathBuf::from("data/output")
        );
        assert_eq!(
            resolve_output_dir(Path::new("data"), Some(Path::new("/tmp/out"))),
            PathBuf::from("/tmp/out")
        );
        assert_eq!(manifest_dir(Path::new("out")), PathBuf::from("out/manifests"));
    }

    #[test]
    fn is_pdf_path_ignores_case() {
        assert!(is_pdf_path(Path::new("AC023.PDF")));
        assert!(is_pdf_path(Path::new("dir/AC023.pdf")));
        assert!(!is_pdf_path(Path::new("AC023.tables.json")));
    }
}
