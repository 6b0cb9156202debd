use anyhow::{Context, Result};
use regex::Regex;

use crate::util::normalize_text;

/// District and constituency labels printed on the first roster page.
///
/// Fields stay `None` when the label is absent; records are still emitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct RosterMetadata {
    pub district_code: Option<String>,
    pub district_name: Option<String>,
    pub ac_code: Option<String>,
    pub ac_name: Option<String>,
}

pub(crate) struct MetadataExtractor {
    district: Regex,
    constituency: Regex,
}

impl MetadataExtractor {
    pub(crate) fn new() -> Result<Self> {
        Ok(Self {
            district: Regex::new(r"(?i)DISTRICT\s+NO\s*&\s*NAME\s*:\s*(\d+)\s*-\s*(.+)")
                .context("failed to compile district label regex")?,
            constituency: Regex::new(r"(?i)LAC\s+NO\s*&\s*NAME\s*:\s*(\d+)\s*-\s*(.+)")
                .context("failed to compile constituency label regex")?,
        })
    }

    /// Scans the first page and keeps the first match of each label.
    pub(crate) fn extract(&self, first_page: &[String]) -> RosterMetadata {
        let mut metadata = RosterMetadata::default();

        for line in first_page {
            let line = normalize_text(line);
            if line.is_empty() {
                continue;
            }

            if metadata.district_code.is_none()
                && let Some((code, name)) = code_and_name(&self.district, &line)
            {
                metadata.district_code = Some(code);
                metadata.district_name = Some(name);
            }

            if metadata.ac_code.is_none()
                && let Some((code, name)) = code_and_name(&self.constituency, &line)
            {
                metadata.ac_code = Some(code);
                metadata.ac_name = Some(name);
            }

            if metadata.district_code.is_some() && metadata.ac_code.is_some() {
                break;
            }
        }

        metadata
    }
}

fn code_and_name(pattern: &Regex, line: &str) -> Option<(String, String)> {
    let captures = pattern.captures(line)?;
    let code = captures.get(1)?.as_str().trim().to_string();
    let name = captures.get(2)?.as_str().trim().to_string();
    Some((code, name))
}
