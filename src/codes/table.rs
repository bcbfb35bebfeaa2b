//! Immutable, preloaded code table.
//! Loaded once from a dataset file of `{code, display}` rows, never mutated.

use super::{normalize_term, CodeEntry};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, instrument, warn};

#[derive(Debug, Error)]
pub enum TableError {
    #[error("Failed to read dataset {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Dataset is not a JSON array of code rows: {0}")]
    Format(#[from] serde_json::Error),
}

#[derive(Debug, Default)]
pub struct LocalTable {
    // (normalized code, entry) in dataset order
    rows: Vec<(String, CodeEntry)>,
}

impl LocalTable {
    /// Build a table from already-parsed entries.
    /// Blank rows are dropped and the first occurrence of a code wins.
    pub fn from_entries(entries: impl IntoIterator<Item = CodeEntry>) -> Self {
        let mut seen = HashSet::new();
        let mut rows = Vec::new();

        for (idx, raw) in entries.into_iter().enumerate() {
            let code = raw.code.trim().to_string();
            let label = clean_label(&raw.label);
            if code.is_empty() || label.is_empty() {
                warn!(row = idx + 1, code = %raw.code, "Skipping malformed dataset row");
                continue;
            }

            let key = normalize_term(&code);
            if !seen.insert(key.clone()) {
                warn!(row = idx + 1, %code, "Skipping duplicate code");
                continue;
            }
            rows.push((key, CodeEntry { code, label }));
        }

        Self { rows }
    }

    /// Parse a JSON dataset (`[{"code": .., "display": ..}, ..]`).
    pub fn from_json(data: &str) -> Result<Self, TableError> {
        let entries: Vec<CodeEntry> = serde_json::from_str(data)?;
        Ok(Self::from_entries(entries))
    }

    #[instrument]
    pub fn load(path: &Path) -> Result<Self, TableError> {
        let data = std::fs::read_to_string(path).map_err(|source| TableError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let table = Self::from_json(&data)?;
        info!(codes = table.len(), "Local code table loaded");
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &CodeEntry> {
        self.rows.iter().map(|(_, entry)| entry)
    }

    /// Entries whose code starts with `term`, in table order.
    ///
    /// `term` must already be normalized. At most `limit` entries are returned;
    /// an empty term matches nothing.
    pub fn prefix_matches(&self, term: &str, limit: usize) -> Vec<CodeEntry> {
        if term.is_empty() {
            return Vec::new();
        }
        self.rows
            .iter()
            .filter(|(key, _)| key.starts_with(term))
            .take(limit)
            .map(|(_, entry)| entry.clone())
            .collect()
    }
}

// Spreadsheet exports indent child rows with "- - - " runs.
fn clean_label(raw: &str) -> String {
    raw.trim_start_matches(|c: char| c == '-' || c.is_whitespace())
        .trim_end()
        .to_string()
}
