//! Debounced query coordinator: keystrokes in, bounded code lists out.

use super::merger::ResultMerger;
use crate::cache::ResultCache;
use crate::codes::{normalize_term, CodeEntry, LocalTable};
use crate::config::AppConfig;
use crate::remote::CodeLookup;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSettings {
    pub debounce: Duration,
    pub result_cap: usize,
    /// Terms with fewer characters stay local-only.
    pub min_remote_chars: usize,
    /// Count ceiling sent to the remote service.
    pub remote_limit: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl SearchSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            debounce: config.search.debounce(),
            result_cap: config.search.result_cap,
            min_remote_chars: config.search.min_remote_chars,
            remote_limit: config.remote.max_results,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryPhase {
    /// Local matches only; a remote lookup for the same request is still running.
    Local,
    /// Final list for the request.
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub request_id: u64,
    pub term: String,
    pub phase: DeliveryPhase,
    pub entries: Vec<CodeEntry>,
}

struct Pipeline {
    table: Arc<LocalTable>,
    remote: Option<Arc<dyn CodeLookup>>,
    cache: Arc<ResultCache>,
    merger: ResultMerger,
    settings: SearchSettings,
    latest: AtomicU64,
}

impl Pipeline {
    fn local(&self, term: &str) -> Vec<CodeEntry> {
        self.table.prefix_matches(term, self.settings.result_cap)
    }

    fn wants_remote(&self, term: &str) -> bool {
        self.remote.is_some() && term.chars().count() >= self.settings.min_remote_chars
    }

    /// Cached entries, or a fresh remote lookup. Failures degrade to an empty list.
    async fn resolve_remote(&self, term: &str) -> Vec<CodeEntry> {
        let Some(remote) = &self.remote else {
            return Vec::new();
        };

        if let Some(cached) = self.cache.get(term).await {
            return cached;
        }

        match remote.fetch(term, self.settings.remote_limit).await {
            Ok(entries) => {
                self.cache.remember(term, entries.clone());
                if self.cache.has_durable() {
                    let cache = Arc::clone(&self.cache);
                    let key = term.to_string();
                    let stored = entries.clone();
                    tokio::spawn(async move {
                        if let Err(e) = cache.persist(&key, stored).await {
                            warn!(term = %key, "Failed to persist lookup results: {}", e);
                        }
                    });
                }
                entries
            }
            Err(e) => {
                warn!(source = remote.name(), %term, "Remote lookup failed, using local matches: {}", e);
                Vec::new()
            }
        }
    }

    async fn search(&self, term: &str) -> Vec<CodeEntry> {
        let local = self.local(term);
        if !self.wants_remote(term) {
            return local;
        }
        let remote = self.resolve_remote(term).await;
        self.merger.merge(local, remote)
    }

    /// Debounced work for one request, after its timer settled.
    async fn run(self: Arc<Self>, id: u64, term: String, tx: mpsc::UnboundedSender<Delivery>) {
        let local = self.local(&term);

        if !self.wants_remote(&term) {
            self.deliver(&tx, id, &term, DeliveryPhase::Complete, local);
            return;
        }

        if !self.deliver(&tx, id, &term, DeliveryPhase::Local, local.clone()) {
            debug!(id, "Superseded before remote lookup; finishing for the cache only");
        }

        let remote = self.resolve_remote(&term).await;
        let merged = self.merger.merge(local, remote);
        self.deliver(&tx, id, &term, DeliveryPhase::Complete, merged);
    }

    /// Send unless a newer request was issued meanwhile. Returns whether it was sent.
    fn deliver(
        &self,
        tx: &mpsc::UnboundedSender<Delivery>,
        id: u64,
        term: &str,
        phase: DeliveryPhase,
        entries: Vec<CodeEntry>,
    ) -> bool {
        let latest = self.latest.load(Ordering::SeqCst);
        if id != latest {
            debug!(id, latest, ?phase, "Dropping stale delivery");
            return false;
        }

        // A closed receiver just means nobody is listening any more.
        let _ = tx.send(Delivery {
            request_id: id,
            term: term.to_string(),
            phase,
            entries,
        });
        true
    }
}

/// Owns the debounce timer and the request counter for one dropdown.
///
/// `submit` must be called from within a Tokio runtime.
pub struct SearchCoordinator {
    pipeline: Arc<Pipeline>,
    pending: Mutex<Option<JoinHandle<()>>>,
    deliveries: mpsc::UnboundedSender<Delivery>,
}

impl SearchCoordinator {
    pub fn new(
        table: Arc<LocalTable>,
        remote: Option<Arc<dyn CodeLookup>>,
        cache: Arc<ResultCache>,
        settings: SearchSettings,
    ) -> (Self, mpsc::UnboundedReceiver<Delivery>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let pipeline = Pipeline {
            table,
            remote,
            cache,
            merger: ResultMerger::new(settings.result_cap),
            settings,
            latest: AtomicU64::new(0),
        };

        let coordinator = Self {
            pipeline: Arc::new(pipeline),
            pending: Mutex::new(None),
            deliveries: tx,
        };
        (coordinator, rx)
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.pipeline.settings
    }

    pub fn table(&self) -> &LocalTable {
        &self.pipeline.table
    }

    pub fn latest_request_id(&self) -> u64 {
        self.pipeline.latest.load(Ordering::SeqCst)
    }

    /// Run one search immediately, without debouncing.
    #[instrument(skip(self))]
    pub async fn execute(&self, term: &str) -> Vec<CodeEntry> {
        let term = normalize_term(term);
        if term.is_empty() {
            return Vec::new();
        }
        self.pipeline.search(&term).await
    }

    /// Debounced search for a keystroke; results arrive on the delivery channel.
    ///
    /// Each call aborts the previous pending timer. An empty term is answered
    /// right away with an empty `Complete` delivery.
    #[instrument(skip(self))]
    pub fn submit(&self, raw: &str) -> u64 {
        let id = self.pipeline.latest.fetch_add(1, Ordering::SeqCst) + 1;
        let term = normalize_term(raw);

        let mut pending = self.pending.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(timer) = pending.take() {
            timer.abort();
        }

        if term.is_empty() {
            self.pipeline
                .deliver(&self.deliveries, id, &term, DeliveryPhase::Complete, Vec::new());
            return id;
        }

        let pipeline = Arc::clone(&self.pipeline);
        let tx = self.deliveries.clone();
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(pipeline.settings.debounce).await;
            // Past this point a newer keystroke no longer cancels the work.
            tokio::spawn(pipeline.run(id, term, tx));
        }));

        id
    }
}

impl Drop for SearchCoordinator {
    fn drop(&mut self) {
        let pending = self.pending.get_mut().unwrap_or_else(|p| p.into_inner());
        if let Some(timer) = pending.take() {
            timer.abort();
        }
    }
}
