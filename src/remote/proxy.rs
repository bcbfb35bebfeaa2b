//! Host-side indirection in front of the remote service.
//! The webview asks the host with a free-text `search` and gets a flat list back.

use super::CodeLookup;
use crate::codes::{normalize_term, CodeEntry};
use serde::{Deserialize, Serialize};
use tracing::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxyStatus {
    Ok,
    UpstreamFailed,
}

impl ProxyStatus {
    /// HTTP-equivalent status code.
    pub fn code(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::UpstreamFailed => 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyReply {
    pub status: ProxyStatus,
    pub entries: Vec<CodeEntry>,
}

impl ProxyReply {
    fn ok(entries: Vec<CodeEntry>) -> Self {
        Self {
            status: ProxyStatus::Ok,
            entries,
        }
    }
}

pub async fn proxy_search(lookup: &dyn CodeLookup, search: &str, limit: usize) -> ProxyReply {
    let term = normalize_term(search);
    if term.is_empty() {
        return ProxyReply::ok(Vec::new());
    }

    match lookup.fetch(&term, limit).await {
        Ok(entries) => ProxyReply::ok(entries),
        Err(e) => {
            error!(source = lookup.name(), %term, "Upstream lookup failed: {}", e);
            ProxyReply {
                status: ProxyStatus::UpstreamFailed,
                entries: Vec::new(),
            }
        }
    }
}
