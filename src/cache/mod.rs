//! Two-tier read-through cache for remote lookup results.
//! Memory first, then an optional durable store; keyed by normalized term.

pub mod store;

pub use store::{DurableStore, FileStore};

use crate::codes::CodeEntry;
use crate::config::CacheConfig;
use chrono::{DateTime, Utc};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, warn};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Durable cache I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Cached results could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Could not determine a cache directory")]
    NoCacheDir,
}

/// Staleness knobs. The default never expires anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub ttl: Option<Duration>,
    pub version: u32,
    pub memory_capacity: Option<NonZeroUsize>,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            ttl: None,
            version: 1,
            memory_capacity: None,
        }
    }
}

impl From<&CacheConfig> for CachePolicy {
    fn from(config: &CacheConfig) -> Self {
        Self {
            ttl: config.ttl(),
            version: config.version,
            memory_capacity: config.memory_capacity.and_then(NonZeroUsize::new),
        }
    }
}

impl CachePolicy {
    fn is_fresh(&self, stored_at: DateTime<Utc>) -> bool {
        match self.ttl {
            None => true,
            Some(ttl) => {
                let age = (Utc::now() - stored_at).to_std().unwrap_or(Duration::ZERO);
                age < ttl
            }
        }
    }
}

/// On-disk record for one term.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredResults {
    pub version: u32,
    pub stored_at: DateTime<Utc>,
    pub term: String,
    pub entries: Vec<CodeEntry>,
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    entries: Vec<CodeEntry>,
    stored_at: DateTime<Utc>,
}

pub struct ResultCache {
    memory: Mutex<LruCache<String, MemoryEntry>>,
    durable: Option<Arc<dyn DurableStore>>,
    policy: CachePolicy,
}

impl ResultCache {
    /// Memory-only cache.
    pub fn new(policy: CachePolicy) -> Self {
        let memory = match policy.memory_capacity {
            Some(cap) => LruCache::new(cap),
            None => LruCache::unbounded(),
        };
        Self {
            memory: Mutex::new(memory),
            durable: None,
            policy,
        }
    }

    pub fn with_durable(policy: CachePolicy, store: Arc<dyn DurableStore>) -> Self {
        Self {
            durable: Some(store),
            ..Self::new(policy)
        }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    pub fn has_durable(&self) -> bool {
        self.durable.is_some()
    }

    /// Read through both tiers. A durable hit is promoted into memory.
    #[instrument(skip(self))]
    pub async fn get(&self, term: &str) -> Option<Vec<CodeEntry>> {
        if let Some(entries) = self.get_memory(term) {
            debug!(hits = entries.len(), "Memory cache hit");
            return Some(entries);
        }

        let stored = match self.load_durable(term).await {
            Ok(stored) => stored?,
            Err(e) => {
                warn!("Durable cache read failed, treating as miss: {}", e);
                return None;
            }
        };

        debug!(hits = stored.entries.len(), "Durable cache hit");
        self.lock_memory().put(
            term.to_string(),
            MemoryEntry {
                entries: stored.entries.clone(),
                stored_at: stored.stored_at,
            },
        );
        Some(stored.entries)
    }

    /// Memory tier only; never suspends.
    pub fn get_memory(&self, term: &str) -> Option<Vec<CodeEntry>> {
        let mut memory = self.lock_memory();
        let fresh = memory
            .get(term)
            .map(|entry| self.policy.is_fresh(entry.stored_at))?;
        if !fresh {
            memory.pop(term);
            return None;
        }
        memory.get(term).map(|entry| entry.entries.clone())
    }

    /// Store in memory and, when configured, in the durable tier.
    pub async fn put(&self, term: &str, entries: Vec<CodeEntry>) -> Result<(), CacheError> {
        self.remember(term, entries.clone());
        self.persist(term, entries).await
    }

    /// Memory half of `put`.
    pub fn remember(&self, term: &str, entries: Vec<CodeEntry>) {
        self.lock_memory().put(
            term.to_string(),
            MemoryEntry {
                entries,
                stored_at: Utc::now(),
            },
        );
    }

    /// Durable half of `put`; a no-op without a durable tier.
    pub async fn persist(&self, term: &str, entries: Vec<CodeEntry>) -> Result<(), CacheError> {
        let Some(store) = &self.durable else {
            return Ok(());
        };
        let record = StoredResults {
            version: self.policy.version,
            stored_at: Utc::now(),
            term: term.to_string(),
            entries,
        };
        store.save(term, serde_json::to_vec(&record)?).await
    }

    /// Drop the memory tier, as a full reload would.
    pub fn clear_memory(&self) {
        self.lock_memory().clear();
    }

    pub fn memory_len(&self) -> usize {
        self.lock_memory().len()
    }

    async fn load_durable(&self, term: &str) -> Result<Option<StoredResults>, CacheError> {
        let Some(store) = &self.durable else {
            return Ok(None);
        };
        let Some(raw) = store.load(term).await? else {
            return Ok(None);
        };

        let stored: StoredResults = serde_json::from_slice(&raw)?;
        if stored.version != self.policy.version {
            debug!(stored = stored.version, "Ignoring cached results from another version");
            return Ok(None);
        }
        if !self.policy.is_fresh(stored.stored_at) {
            debug!("Ignoring expired cached results");
            return Ok(None);
        }
        Ok(Some(stored))
    }

    fn lock_memory(&self) -> MutexGuard<'_, LruCache<String, MemoryEntry>> {
        self.memory.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
