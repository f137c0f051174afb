//! End-to-end tests for the debounced, epoch-gated fetch lifecycle.
//!
//! Each test drives a `FetchCoordinator` over an instrumented source:
//! a capturing wrapper counts calls and records descriptions, a gated
//! wrapper parks a chosen call until the test releases it (to force
//! network reordering), and failing wrappers error or reject on demand.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, Duration};

use rentdash::{
    CoordinatorConfig, Error, FetchCoordinator, FetchEpoch, FilterKey, Listing, ListingId,
    ListingSource, MemorySource, PetsFilter, QueryDescription, Result,
};

// ============================================================================
// Test fixtures
// ============================================================================

fn fast_config() -> CoordinatorConfig {
    CoordinatorConfig {
        debounce: Duration::from_millis(25),
        ..CoordinatorConfig::default()
    }
}

fn seeded() -> MemorySource {
    MemorySource::with_listings(vec![
        Listing::new(ListingId(1), "Mission studio", "Mission").with_price(1800.0),
        Listing::new(ListingId(2), "Mission 2br", "Mission").with_price(2600.0),
        Listing::new(ListingId(3), "SoMa loft", "SoMa").with_price(3200.0),
    ])
}

/// Observation shared between a test and the source it moved into the
/// coordinator.
#[derive(Clone, Default)]
struct Capture {
    calls: Arc<AtomicU64>,
    last_query: Arc<Mutex<Option<QueryDescription>>>,
}

impl Capture {
    fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_query(&self) -> QueryDescription {
        self.last_query.lock().clone().expect("no fetch recorded")
    }
}

/// Delegates to a `MemorySource` while recording every call.
struct CapturingSource {
    inner: MemorySource,
    capture: Capture,
}

impl CapturingSource {
    fn new(inner: MemorySource) -> (Self, Capture) {
        let capture = Capture::default();
        (
            Self {
                inner,
                capture: capture.clone(),
            },
            capture,
        )
    }
}

#[async_trait]
impl ListingSource for CapturingSource {
    async fn fetch(&self, query: &QueryDescription) -> Result<Vec<Listing>> {
        self.capture.calls.fetch_add(1, Ordering::SeqCst);
        *self.capture.last_query.lock() = Some(query.clone());
        self.inner.fetch(query).await
    }
}

/// Parks chosen calls on a gate until the test releases them. Calls with
/// no queued gate proceed immediately; every call announces itself first.
struct GatedSource {
    inner: MemorySource,
    entered: mpsc::UnboundedSender<u64>,
    gates: Mutex<VecDeque<oneshot::Receiver<()>>>,
    calls: AtomicU64,
}

#[async_trait]
impl ListingSource for GatedSource {
    async fn fetch(&self, query: &QueryDescription) -> Result<Vec<Listing>> {
        let ordinal = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self.entered.send(ordinal);
        let gate = self.gates.lock().pop_front();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.inner.fetch(query).await
    }
}

/// Fails with a transport error while the flag is raised.
struct FlakySource {
    inner: MemorySource,
    fail: Arc<AtomicBool>,
}

#[async_trait]
impl ListingSource for FlakySource {
    async fn fetch(&self, query: &QueryDescription) -> Result<Vec<Listing>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Transport("gateway timeout".into()));
        }
        self.inner.fetch(query).await
    }
}

/// Refuses the description while the flag is raised, as a backend that
/// cannot serve a filter would.
struct RejectingSource {
    inner: MemorySource,
    reject: Arc<AtomicBool>,
}

#[async_trait]
impl ListingSource for RejectingSource {
    async fn fetch(&self, query: &QueryDescription) -> Result<Vec<Listing>> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(Error::QueryRejected("bathrooms__gte unsupported".into()));
        }
        self.inner.fetch(query).await
    }
}

// ============================================================================
// 1. Rapid changes coalesce into one fetch, built from the final facets
// ============================================================================

#[tokio::test]
async fn test_quiet_period_coalesces_changes() {
    let (source, capture) = CapturingSource::new(seeded());
    let coordinator = FetchCoordinator::with_config(source, fast_config());

    coordinator.set_min_price("1000");
    coordinator.set_max_price("3000");
    coordinator.set_location("mission");
    sleep(Duration::from_millis(300)).await;

    assert_eq!(capture.calls(), 1);

    // The description reflects the state at the end of the quiet period.
    let query = capture.last_query();
    assert!(query.contains(FilterKey::PriceMin));
    assert!(query.contains(FilterKey::PriceMax));
    assert!(query.contains(FilterKey::Location));

    let snapshot = coordinator.snapshot();
    assert!(snapshot.loaded);
    assert_eq!(snapshot.listings.len(), 2);
}

// ============================================================================
// 2. Changes spaced beyond the quiet period each issue a fetch
// ============================================================================

#[tokio::test]
async fn test_spaced_changes_fetch_separately() {
    let (source, capture) = CapturingSource::new(seeded());
    let coordinator = FetchCoordinator::with_config(source, fast_config());

    coordinator.set_min_price("1000");
    sleep(Duration::from_millis(300)).await;
    coordinator.set_location("soma");
    sleep(Duration::from_millis(300)).await;

    assert_eq!(capture.calls(), 2);
    let stats = coordinator.stats();
    assert_eq!(stats.changes_observed, 2);
    assert_eq!(stats.fetches_applied, 2);
}

// ============================================================================
// 3. Network reordering: the newer epoch wins even when it lands first
// ============================================================================

#[tokio::test]
async fn test_stale_response_is_discarded() {
    let (entered_tx, mut entered_rx) = mpsc::unbounded_channel();
    let (release_first, first_gate) = oneshot::channel();
    let source = GatedSource {
        inner: seeded(),
        entered: entered_tx,
        gates: Mutex::new(VecDeque::from([first_gate])),
        calls: AtomicU64::new(0),
    };
    let coordinator = FetchCoordinator::with_config(source, fast_config());

    // Fetch 1 (no filters) enters and parks on its gate.
    coordinator.refresh();
    assert_eq!(entered_rx.recv().await, Some(1));

    // Fetch 2 (filtered) is issued while 1 is still in flight and
    // completes immediately.
    coordinator.set_location("soma");
    assert_eq!(entered_rx.recv().await, Some(2));
    sleep(Duration::from_millis(200)).await;

    let applied = coordinator.snapshot();
    assert!(applied.loaded);
    assert_eq!(applied.epoch, FetchEpoch(2));
    assert_eq!(applied.listings.len(), 1);

    // Now the stale fetch lands, and it must change nothing.
    let _ = release_first.send(());
    sleep(Duration::from_millis(200)).await;

    let after = coordinator.snapshot();
    assert_eq!(after.epoch, FetchEpoch(2));
    assert_eq!(after.listings.len(), 1);
    assert!(after.error.is_none());

    let stats = coordinator.stats();
    assert_eq!(stats.fetches_issued, 2);
    assert_eq!(stats.fetches_applied, 1);
    assert_eq!(stats.fetches_superseded, 1);
    assert_eq!(stats.fetches_failed, 0);
}

// ============================================================================
// 4. Failure after a success preserves the last-good record set
// ============================================================================

#[tokio::test]
async fn test_failure_preserves_last_good_listings() {
    let fail = Arc::new(AtomicBool::new(false));
    let source = FlakySource {
        inner: seeded(),
        fail: fail.clone(),
    };
    let coordinator = FetchCoordinator::with_config(source, fast_config());

    coordinator.refresh();
    sleep(Duration::from_millis(300)).await;
    let good = coordinator.snapshot();
    assert_eq!(good.listings.len(), 3);
    assert!(good.error.is_none());

    fail.store(true, Ordering::SeqCst);
    coordinator.set_location("mission");
    sleep(Duration::from_millis(300)).await;

    let failed = coordinator.snapshot();
    assert_eq!(failed.listings.len(), 3, "last-good data must survive a failure");
    assert_eq!(failed.epoch, good.epoch);
    assert_eq!(failed.error.as_deref(), Some("transport error: gateway timeout"));

    let stats = coordinator.stats();
    assert_eq!(stats.fetches_failed, 1);
}

// ============================================================================
// 5. A first-load failure shows an empty list alongside the error
// ============================================================================

#[tokio::test]
async fn test_first_load_failure_is_empty_with_error() {
    let source = FlakySource {
        inner: seeded(),
        fail: Arc::new(AtomicBool::new(true)),
    };
    let coordinator = FetchCoordinator::with_config(source, fast_config());

    coordinator.refresh();
    sleep(Duration::from_millis(300)).await;

    let snapshot = coordinator.snapshot();
    assert!(snapshot.loaded);
    assert!(snapshot.listings.is_empty());
    assert!(snapshot.error.is_some());
}

// ============================================================================
// 6. The next success clears a published error
// ============================================================================

#[tokio::test]
async fn test_success_clears_previous_error() {
    let fail = Arc::new(AtomicBool::new(true));
    let source = FlakySource {
        inner: seeded(),
        fail: fail.clone(),
    };
    let coordinator = FetchCoordinator::with_config(source, fast_config());

    coordinator.refresh();
    sleep(Duration::from_millis(300)).await;
    assert!(coordinator.snapshot().error.is_some());

    fail.store(false, Ordering::SeqCst);
    coordinator.refresh();
    sleep(Duration::from_millis(300)).await;

    let recovered = coordinator.snapshot();
    assert!(recovered.error.is_none());
    assert_eq!(recovered.listings.len(), 3);
}

// ============================================================================
// 7. A rejected query is handled like any other failure
// ============================================================================

#[tokio::test]
async fn test_rejected_query_preserves_last_good_listings() {
    let reject = Arc::new(AtomicBool::new(false));
    let source = RejectingSource {
        inner: seeded(),
        reject: reject.clone(),
    };
    let coordinator = FetchCoordinator::with_config(source, fast_config());

    coordinator.refresh();
    sleep(Duration::from_millis(300)).await;
    let good = coordinator.snapshot();
    assert_eq!(good.listings.len(), 3);
    assert!(good.error.is_none());

    reject.store(true, Ordering::SeqCst);
    coordinator.set_min_bathrooms("1.5");
    sleep(Duration::from_millis(300)).await;

    let rejected = coordinator.snapshot();
    assert_eq!(rejected.listings.len(), 3, "last-good data must survive a rejection");
    assert_eq!(rejected.epoch, good.epoch);
    assert_eq!(
        rejected.error.as_deref(),
        Some("query rejected: bathrooms__gte unsupported")
    );
    assert_eq!(coordinator.stats().fetches_failed, 1);
}

// ============================================================================
// 8. Clearing filters refetches exactly once, with only the default sort
// ============================================================================

#[tokio::test]
async fn test_clear_filters_refetches_exactly_once() {
    let (source, capture) = CapturingSource::new(seeded());
    let coordinator = FetchCoordinator::with_config(source, fast_config());

    coordinator.set_min_price("2000");
    coordinator.set_location("mission");
    coordinator.set_pets(PetsFilter::Cats);
    sleep(Duration::from_millis(300)).await;
    let before = capture.calls();
    assert!(coordinator.active_filter_count() > 0);

    coordinator.clear_filters();
    sleep(Duration::from_millis(300)).await;

    assert_eq!(capture.calls() - before, 1);
    assert_eq!(coordinator.active_filter_count(), 0);
    assert_eq!(capture.last_query().canonical(), "ordering=-scraped_at");
    assert_eq!(coordinator.snapshot().listings.len(), 3);
}

// ============================================================================
// 9. Subscribers observe every applied snapshot
// ============================================================================

#[tokio::test]
async fn test_subscriber_sees_updates() {
    let coordinator = FetchCoordinator::with_config(seeded(), fast_config());
    let mut updates = coordinator.subscribe();

    coordinator.refresh();
    updates.changed().await.unwrap();
    assert_eq!(updates.borrow_and_update().listings.len(), 3);

    coordinator.set_location("soma");
    updates.changed().await.unwrap();
    assert_eq!(updates.borrow_and_update().listings.len(), 1);
}
