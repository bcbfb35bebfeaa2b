//! Diagnosis code entries and the static local table.
//! Both the local dataset and the remote client produce `CodeEntry` values.

pub mod table;

pub use table::{LocalTable, TableError};

use serde::{Deserialize, Serialize};

/// A single (code, display-label) pair for one diagnosis classification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CodeEntry {
    pub code: String,
    #[serde(alias = "display")]
    pub label: String,
}

impl CodeEntry {
    pub fn new(code: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            label: label.into(),
        }
    }

    /// Case-folded code, comparable with a normalized search term.
    pub fn key(&self) -> String {
        normalize_term(&self.code)
    }
}

/// Trim and uppercase a raw term. Table keys and cache keys go through this too.
pub fn normalize_term(raw: &str) -> String {
    raw.trim().to_uppercase()
}
