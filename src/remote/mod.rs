//! Remote code lookup: the `CodeLookup` seam plus its HTTP implementation.

pub mod client;
pub mod proxy;
pub mod shape;

pub use client::RemoteLookupClient;
pub use proxy::{proxy_search, ProxyReply, ProxyStatus};
pub use shape::ResponseShape;

use crate::codes::CodeEntry;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Lookup request failed: {0}")]
    Network(String),
    #[error("Lookup service returned HTTP {0}")]
    Status(u16),
    #[error("Unexpected lookup response: {0}")]
    Parse(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl LookupError {
    /// Transport failures and non-success statuses both count as network errors.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Status(_))
    }
}

#[async_trait]
pub trait CodeLookup: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &'static str;

    /// Look up `term` (already normalized), returning at most `limit` entries.
    async fn fetch(&self, term: &str, limit: usize) -> Result<Vec<CodeEntry>, LookupError>;
}
