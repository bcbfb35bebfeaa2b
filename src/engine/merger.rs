use crate::codes::CodeEntry;
use std::collections::HashSet;
use tracing::{debug, instrument};

/// Combines local and remote hits into one bounded list.
///
/// Local entries keep their order and come first. A remote entry is dropped
/// when its code (compared case-insensitively) was already emitted, so the
/// local label wins on conflicts.
#[derive(Debug, Clone, Copy)]
pub struct ResultMerger {
    cap: usize,
}

impl ResultMerger {
    pub fn new(cap: usize) -> Self {
        Self { cap }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    #[instrument(skip_all)]
    pub fn merge(&self, local: Vec<CodeEntry>, remote: Vec<CodeEntry>) -> Vec<CodeEntry> {
        let mut seen = HashSet::new();
        let mut merged = Vec::with_capacity(self.cap.min(local.len() + remote.len()));

        for entry in local.into_iter().chain(remote) {
            if merged.len() == self.cap {
                break;
            }
            if seen.insert(entry.key()) {
                merged.push(entry);
            }
        }

        debug!(merged = merged.len(), "Merged code entries");
        merged
    }
}
