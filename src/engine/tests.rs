use super::*;
use crate::cache::{CachePolicy, FileStore, ResultCache};
use crate::codes::{CodeEntry, LocalTable};
use crate::remote::{CodeLookup, LookupError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_test::assert_err;

/// Remote stand-in: prefix-filters a fixed catalog and counts calls.
#[derive(Default)]
struct FakeLookup {
    catalog: Vec<CodeEntry>,
    delays: HashMap<String, Duration>,
    fail: bool,
    calls: AtomicUsize,
}

impl FakeLookup {
    fn with_catalog(catalog: Vec<CodeEntry>) -> Self {
        Self {
            catalog,
            ..Self::default()
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CodeLookup for FakeLookup {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn fetch(&self, term: &str, limit: usize) -> Result<Vec<CodeEntry>, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(term) {
            tokio::time::sleep(*delay).await;
        }
        if self.fail {
            return Err(LookupError::Network("connection refused".into()));
        }
        Ok(self
            .catalog
            .iter()
            .filter(|e| e.code.to_uppercase().starts_with(term))
            .take(limit)
            .cloned()
            .collect())
    }
}

fn local_table() -> Arc<LocalTable> {
    Arc::new(LocalTable::from_entries(vec![
        CodeEntry::new("A00", "Cholera"),
        CodeEntry::new("A01", "Typhoid and paratyphoid fevers"),
        CodeEntry::new("E11", "Type 2 diabetes mellitus"),
        CodeEntry::new("XA009", "Extension code"),
    ]))
}

fn remote_catalog() -> Vec<CodeEntry> {
    vec![
        CodeEntry::new("A001", "Cholera, due to Vibrio cholerae"),
        CodeEntry::new("A00", "Cholera (remote label)"),
        CodeEntry::new("E11", "Type 2 diabetes mellitus (remote label)"),
        CodeEntry::new("E11.9", "Type 2 diabetes mellitus without complications"),
    ]
}

fn settings() -> SearchSettings {
    SearchSettings {
        debounce: Duration::from_millis(300),
        result_cap: 25,
        min_remote_chars: 2,
        remote_limit: 50,
    }
}

fn coordinator_with(
    remote: Arc<FakeLookup>,
    settings: SearchSettings,
) -> (SearchCoordinator, mpsc::UnboundedReceiver<Delivery>, Arc<ResultCache>) {
    let cache = Arc::new(ResultCache::new(CachePolicy::default()));
    let (coord, rx) = SearchCoordinator::new(local_table(), Some(remote), cache.clone(), settings);
    (coord, rx, cache)
}

async fn next_complete(rx: &mut mpsc::UnboundedReceiver<Delivery>) -> Delivery {
    loop {
        let delivery = rx.recv().await.expect("coordinator dropped");
        if delivery.phase == DeliveryPhase::Complete {
            return delivery;
        }
    }
}

#[tokio::test]
async fn blank_terms_are_empty_without_network() {
    let remote = Arc::new(FakeLookup::with_catalog(remote_catalog()));
    let (coord, _rx, _) = coordinator_with(remote.clone(), settings());

    assert!(coord.execute("").await.is_empty());
    assert!(coord.execute("   \t").await.is_empty());
    assert_eq!(remote.calls(), 0);
}

#[tokio::test]
async fn short_terms_stay_local() {
    let remote = Arc::new(FakeLookup::with_catalog(remote_catalog()));
    let (coord, _rx, _) = coordinator_with(remote.clone(), settings());

    let results = coord.execute("a").await;
    assert_eq!(results, coord.table().prefix_matches("A", 25));
    assert_eq!(results.len(), 2);
    assert_eq!(remote.calls(), 0);
}

#[tokio::test]
async fn remote_cutoff_is_configurable() {
    let remote = Arc::new(FakeLookup::with_catalog(remote_catalog()));
    let (coord, _rx, _) = coordinator_with(
        remote.clone(),
        SearchSettings {
            min_remote_chars: 1,
            ..settings()
        },
    );

    let results = coord.execute("A").await;
    assert_eq!(remote.calls(), 1);
    assert!(results.iter().any(|e| e.code == "A001"));
}

#[tokio::test]
async fn merges_local_first_with_remote_extras() {
    let remote = Arc::new(FakeLookup::with_catalog(remote_catalog()));
    let (coord, _rx, _) = coordinator_with(remote, settings());

    let results = coord.execute("A0").await;
    assert_eq!(
        results,
        vec![
            CodeEntry::new("A00", "Cholera"),
            CodeEntry::new("A01", "Typhoid and paratyphoid fevers"),
            CodeEntry::new("A001", "Cholera, due to Vibrio cholerae"),
        ]
    );
}

#[tokio::test]
async fn local_label_wins_on_shared_code() {
    let remote = Arc::new(FakeLookup::with_catalog(remote_catalog()));
    let (coord, _rx, _) = coordinator_with(remote, settings());

    let results = coord.execute("e11").await;
    let e11: Vec<_> = results.iter().filter(|e| e.code == "E11").collect();
    assert_eq!(e11.len(), 1);
    assert_eq!(e11[0].label, "Type 2 diabetes mellitus");
    assert_eq!(results.last().unwrap().code, "E11.9");
}

#[tokio::test]
async fn result_never_exceeds_cap() {
    let catalog = (0..200)
        .map(|i| CodeEntry::new(format!("A0{i:03}"), format!("Remote {i}")))
        .collect();
    let remote = Arc::new(FakeLookup::with_catalog(catalog));
    let (coord, _rx, _) = coordinator_with(
        remote,
        SearchSettings {
            result_cap: 20,
            remote_limit: 500,
            ..settings()
        },
    );

    assert_eq!(coord.execute("A0").await.len(), 20);
}

#[tokio::test]
async fn remote_failure_degrades_to_local() {
    let remote = Arc::new(FakeLookup::failing());
    let (coord, _rx, _) = coordinator_with(remote.clone(), settings());

    let results = coord.execute("A0").await;
    assert_eq!(results, coord.table().prefix_matches("A0", 25));
    assert_eq!(remote.calls(), 1);
}

#[tokio::test]
async fn repeated_term_is_served_from_cache() {
    let remote = Arc::new(FakeLookup::with_catalog(remote_catalog()));
    let (coord, _rx, cache) = coordinator_with(remote.clone(), settings());

    let first = coord.execute("A0").await;
    let second = coord.execute(" a0 ").await;

    assert_eq!(first, second);
    assert_eq!(remote.calls(), 1);
    assert!(cache.get_memory("A0").is_some());
}

#[tokio::test]
async fn failed_lookups_are_not_cached() {
    let remote = Arc::new(FakeLookup::failing());
    let (coord, _rx, cache) = coordinator_with(remote.clone(), settings());

    coord.execute("A0").await;
    coord.execute("A0").await;
    assert_eq!(remote.calls(), 2);
    assert_eq!(cache.memory_len(), 0);
}

#[tokio::test]
async fn works_without_remote() {
    let cache = Arc::new(ResultCache::new(CachePolicy::default()));
    let (coord, _rx) = SearchCoordinator::new(local_table(), None, cache, settings());

    let results = coord.execute("A0").await;
    assert_eq!(results.len(), 2);
}

#[tokio::test]
async fn remote_results_reach_the_durable_tier() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::open(dir.path()).await.unwrap());
    let cache = Arc::new(ResultCache::with_durable(CachePolicy::default(), store));
    let remote = Arc::new(FakeLookup::with_catalog(remote_catalog()));
    let (coord, _rx) = SearchCoordinator::new(local_table(), Some(remote), cache, settings());

    coord.execute("A0").await;

    // persisted by a detached task; poll a fresh reader on the same directory
    let reader = ResultCache::with_durable(
        CachePolicy::default(),
        Arc::new(FileStore::open(dir.path()).await.unwrap()),
    );
    let mut stored = None;
    for _ in 0..100 {
        stored = reader.get("A0").await;
        if stored.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(stored, Some(remote_catalog()[..2].to_vec()));
}

#[tokio::test(start_paused = true)]
async fn burst_collapses_into_one_search() {
    let remote = Arc::new(FakeLookup::with_catalog(remote_catalog()));
    let (coord, mut rx, _) = coordinator_with(remote.clone(), settings());

    coord.submit("a0");
    coord.submit("A0 ");
    let last = coord.submit(" a0");

    let local = rx.recv().await.unwrap();
    assert_eq!(local.request_id, last);
    assert_eq!(local.phase, DeliveryPhase::Local);
    assert_eq!(local.entries.len(), 2);

    let complete = next_complete(&mut rx).await;
    assert_eq!(complete.request_id, last);
    assert_eq!(complete.term, "A0");
    assert_eq!(complete.entries.len(), 3);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_err!(rx.try_recv());
    assert_eq!(remote.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn blank_submit_answers_synchronously() {
    let remote = Arc::new(FakeLookup::with_catalog(remote_catalog()));
    let (coord, mut rx, _) = coordinator_with(remote.clone(), settings());

    coord.submit("A0");
    let id = coord.submit("  ");

    let delivery = rx.try_recv().expect("blank term is answered without waiting");
    assert_eq!(delivery.request_id, id);
    assert_eq!(delivery.phase, DeliveryPhase::Complete);
    assert!(delivery.entries.is_empty());

    // the earlier timer was cancelled
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_err!(rx.try_recv());
    assert_eq!(remote.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn short_submit_delivers_once() {
    let remote = Arc::new(FakeLookup::with_catalog(remote_catalog()));
    let (coord, mut rx, _) = coordinator_with(remote.clone(), settings());

    let id = coord.submit("e");
    let delivery = rx.recv().await.unwrap();
    assert_eq!(delivery.request_id, id);
    assert_eq!(delivery.phase, DeliveryPhase::Complete);
    assert_eq!(delivery.entries, vec![CodeEntry::new("E11", "Type 2 diabetes mellitus")]);
    assert_eq!(remote.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn remote_failure_still_completes_with_local() {
    let remote = Arc::new(FakeLookup::failing());
    let (coord, mut rx, _) = coordinator_with(remote, settings());

    coord.submit("A0");
    let complete = next_complete(&mut rx).await;
    assert_eq!(complete.entries, coord.table().prefix_matches("A0", 25));
}

#[tokio::test(start_paused = true)]
async fn stale_response_is_never_delivered() {
    let mut slow = FakeLookup::with_catalog(remote_catalog());
    slow.delays.insert("A0".into(), Duration::from_secs(1));
    let remote = Arc::new(slow);
    let (coord, mut rx, cache) = coordinator_with(remote.clone(), settings());

    let stale = coord.submit("A0");
    // let the first timer fire so its lookup is in flight
    tokio::time::sleep(Duration::from_millis(400)).await;
    let fresh = coord.submit("A00");

    let complete = next_complete(&mut rx).await;
    assert_eq!(complete.request_id, fresh);
    assert_eq!(complete.term, "A00");

    // outlive the slow lookup, then make sure nothing from it surfaced
    tokio::time::sleep(Duration::from_secs(2)).await;
    while let Ok(late) = rx.try_recv() {
        assert!(
            !(late.request_id == stale && late.phase == DeliveryPhase::Complete),
            "stale result delivered: {late:?}"
        );
    }

    // the superseded lookup still ran to completion and filled the cache
    assert_eq!(remote.calls(), 2);
    assert!(cache.get_memory("A0").is_some());
}
