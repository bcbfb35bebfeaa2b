//! View model for the dropdown: what the presentation shell renders.

use crate::codes::CodeEntry;
use crate::engine::{Delivery, DeliveryPhase};
use serde::Serialize;

pub const PLACEHOLDER: &str = "Type to search ICD-10…";
pub const NO_MATCH: &str = "No matching code";

/// `"A00 – Cholera"`
pub fn option_label(entry: &CodeEntry) -> String {
    format!("{} – {}", entry.code, entry.label)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DropdownState {
    query: String,
    options: Vec<CodeEntry>,
    loading: bool,
    applied: u64,
    selection: Option<CodeEntry>,
}

/// Serializable snapshot handed to the webview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DropdownView {
    pub query: String,
    pub options: Vec<OptionView>,
    pub loading: bool,
    pub message: Option<&'static str>,
    pub selection: Option<CodeEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionView {
    pub value: String,
    pub label: String,
}

impl DropdownState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a coordinator delivery. Returns false for one older than what is shown.
    pub fn apply(&mut self, delivery: Delivery) -> bool {
        if delivery.request_id < self.applied {
            return false;
        }
        self.applied = delivery.request_id;
        self.query = delivery.term;
        self.options = delivery.entries;
        self.loading = delivery.phase == DeliveryPhase::Local;
        true
    }

    /// Select one of the listed options by code. Unknown codes leave the selection untouched.
    pub fn select(&mut self, code: &str) -> Option<&CodeEntry> {
        let picked = self.options.iter().find(|e| e.code == code)?.clone();
        self.selection = Some(picked);
        self.selection.as_ref()
    }

    pub fn clear(&mut self) {
        self.selection = None;
    }

    pub fn selection(&self) -> Option<&CodeEntry> {
        self.selection.as_ref()
    }

    pub fn options(&self) -> &[CodeEntry] {
        &self.options
    }

    pub fn message(&self) -> Option<&'static str> {
        if self.query.is_empty() {
            Some(PLACEHOLDER)
        } else if self.options.is_empty() && !self.loading {
            Some(NO_MATCH)
        } else {
            None
        }
    }

    pub fn view(&self) -> DropdownView {
        DropdownView {
            query: self.query.clone(),
            options: self
                .options
                .iter()
                .map(|e| OptionView {
                    value: e.code.clone(),
                    label: option_label(e),
                })
                .collect(),
            loading: self.loading,
            message: self.message(),
            selection: self.selection.clone(),
        }
    }
}
