//! # Debounced Fetch Coordination
//!
//! Owns the request lifecycle between facet changes and the published
//! record set. Every facet change (re)starts a quiet-period timer; when
//! the timer survives the quiet period a fetch is issued with a fresh
//! epoch; a completion is applied only while its epoch is still the
//! newest issued. Stale responses are discarded silently, so the displayed
//! set always corresponds to the latest facet state even when the network
//! reorders responses.
//!
//! | Phase | Entered by | Left by |
//! |-------|-----------|---------|
//! | Scheduled | any facet change, `refresh()`, `clear_filters()` | timer fires or a newer change restarts it |
//! | InFlight | timer fires (epoch assigned, description built) | response or failure arrives |
//! | Applied / Superseded / Failed | completion, gated by epoch | next schedule |
//!
//! Cancellation is logical only: superseded fetches run to completion and
//! their outcome is dropped at the epoch gate.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

use crate::model::{FacetState, Laundry, Listing, Parking, PetsFilter, SortOrder};
use crate::query;
use crate::source::ListingSource;
use crate::Result;

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for a fetch coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Quiet period after the last facet change before a fetch is issued.
    pub debounce: Duration,
    /// Scope every query to records with coordinates (map view).
    pub require_coordinates: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(400),
            require_coordinates: false,
        }
    }
}

// ============================================================================
// Fetch epoch
// ============================================================================

/// Monotonic fetch generation number.
///
/// A response is applied only while its epoch is the newest issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FetchEpoch(pub u64);

impl std::fmt::Display for FetchEpoch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Published snapshot
// ============================================================================

/// What the coordinator publishes after each terminal fetch outcome.
#[derive(Debug, Clone)]
pub struct ListingsSnapshot {
    /// The authoritative record set (last successfully applied).
    pub listings: Arc<Vec<Listing>>,
    /// Epoch of the fetch that produced `listings`.
    pub epoch: FetchEpoch,
    /// Message of the most recent failure. Cleared by the next success.
    pub error: Option<String>,
    /// False until the first fetch reaches a terminal outcome.
    pub loaded: bool,
}

impl ListingsSnapshot {
    fn initial() -> Self {
        Self {
            listings: Arc::new(Vec::new()),
            epoch: FetchEpoch(0),
            error: None,
            loaded: false,
        }
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Lifecycle counters for one coordinator.
#[derive(Debug, Clone, Default)]
pub struct FetchStats {
    /// Quiet-period restarts observed: every facet change, `refresh()`,
    /// and `clear_filters()`.
    pub changes_observed: u64,
    /// Fetches issued after a full quiet period.
    pub fetches_issued: u64,
    /// Responses applied as the authoritative set.
    pub fetches_applied: u64,
    /// Responses discarded because a newer fetch was issued meanwhile.
    pub fetches_superseded: u64,
    /// Fetches that completed with an error (transport or rejection).
    pub fetches_failed: u64,
}

// ============================================================================
// FetchCoordinator
// ============================================================================

/// Debounced, epoch-gated fetch state machine over a listing source.
///
/// Facet setters and `refresh()` spawn the quiet-period timer onto the
/// ambient Tokio runtime, so the coordinator must live inside one.
pub struct FetchCoordinator<S: ListingSource> {
    inner: Arc<CoordinatorInner<S>>,
}

struct CoordinatorInner<S> {
    source: S,
    config: CoordinatorConfig,
    facets: RwLock<FacetState>,
    /// Bumped on every facet change; a timer fires only for the newest token.
    schedule_token: AtomicU64,
    /// Bumped when a fetch is issued; a response applies only at the newest epoch.
    epoch: AtomicU64,
    stats: Mutex<FetchStats>,
    /// Serializes completions so the epoch check and the publish are one step.
    apply: Mutex<()>,
    tx: watch::Sender<ListingsSnapshot>,
}

impl<S: ListingSource> FetchCoordinator<S> {
    /// Create a coordinator with the default configuration.
    pub fn new(source: S) -> Self {
        Self::with_config(source, CoordinatorConfig::default())
    }

    /// Create a coordinator with a custom configuration.
    pub fn with_config(source: S, config: CoordinatorConfig) -> Self {
        let (tx, _) = watch::channel(ListingsSnapshot::initial());
        Self {
            inner: Arc::new(CoordinatorInner {
                source,
                config,
                facets: RwLock::new(FacetState::new()),
                schedule_token: AtomicU64::new(0),
                epoch: AtomicU64::new(0),
                stats: Mutex::new(FetchStats::default()),
                apply: Mutex::new(()),
                tx,
            }),
        }
    }

    // ========================================================================
    // Facet setters
    // ========================================================================

    pub fn set_min_price(&self, raw: impl Into<String>) {
        self.inner.facets.write().min_price = raw.into();
        self.touch();
    }

    pub fn set_max_price(&self, raw: impl Into<String>) {
        self.inner.facets.write().max_price = raw.into();
        self.touch();
    }

    pub fn set_location(&self, raw: impl Into<String>) {
        self.inner.facets.write().location = raw.into();
        self.touch();
    }

    pub fn set_min_bedrooms(&self, raw: impl Into<String>) {
        self.inner.facets.write().min_bedrooms = raw.into();
        self.touch();
    }

    pub fn set_min_bathrooms(&self, raw: impl Into<String>) {
        self.inner.facets.write().min_bathrooms = raw.into();
        self.touch();
    }

    pub fn set_pets(&self, pets: PetsFilter) {
        self.inner.facets.write().pets = pets;
        self.touch();
    }

    pub fn set_laundry(&self, laundry: Option<Laundry>) {
        self.inner.facets.write().laundry = laundry;
        self.touch();
    }

    pub fn set_parking(&self, parking: Option<Parking>) {
        self.inner.facets.write().parking = parking;
        self.touch();
    }

    pub fn set_sort(&self, sort: SortOrder) {
        self.inner.facets.write().sort = sort;
        self.touch();
    }

    /// Reset every facet to its sentinel and schedule exactly one refetch.
    pub fn clear_filters(&self) {
        self.inner.facets.write().reset();
        self.touch();
    }

    /// Schedule a refetch without changing facets (initial load, reload).
    pub fn refresh(&self) {
        self.touch();
    }

    // ========================================================================
    // Views
    // ========================================================================

    /// Current facet state.
    pub fn facets(&self) -> FacetState {
        self.inner.facets.read().clone()
    }

    /// Number of facets differing from their empty sentinel.
    pub fn active_filter_count(&self) -> usize {
        self.inner.facets.read().active_filter_count()
    }

    /// The currently published snapshot.
    pub fn snapshot(&self) -> ListingsSnapshot {
        self.inner.tx.borrow().clone()
    }

    /// Subscribe to snapshot updates.
    pub fn subscribe(&self) -> watch::Receiver<ListingsSnapshot> {
        self.inner.tx.subscribe()
    }

    /// Current lifecycle counters.
    pub fn stats(&self) -> FetchStats {
        self.inner.stats.lock().clone()
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    /// Access the underlying source (for seeding, advanced use).
    pub fn source(&self) -> &S {
        &self.inner.source
    }

    // ========================================================================
    // Scheduling
    // ========================================================================

    /// Restart the quiet period. The spawned timer task fires only if no
    /// newer change arrives before it wakes, equivalent to cancelling
    /// and re-arming a single timer.
    fn touch(&self) {
        let token = self.inner.schedule_token.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.stats.lock().changes_observed += 1;
        debug!(token, "quiet period restarted");

        let inner = self.inner.clone();
        tokio::spawn(async move {
            sleep(inner.config.debounce).await;
            if inner.schedule_token.load(Ordering::SeqCst) != token {
                return;
            }
            inner.issue().await;
        });
    }
}

impl<S: ListingSource> CoordinatorInner<S> {
    /// Issue one fetch: assign the next epoch and build the description
    /// from the facet state as of right now.
    async fn issue(&self) {
        let epoch = FetchEpoch(self.epoch.fetch_add(1, Ordering::SeqCst) + 1);
        let query = {
            let facets = self.facets.read();
            let built = query::build(&facets);
            if self.config.require_coordinates {
                built.require_coordinates()
            } else {
                built
            }
        };
        self.stats.lock().fetches_issued += 1;
        debug!(epoch = %epoch, query = %query, "fetch issued");

        let result = self.source.fetch(&query).await;
        self.complete(epoch, result);
    }

    /// Terminal step of one fetch. Holds the apply lock so the epoch
    /// check and the publish cannot interleave with another completion.
    fn complete(&self, epoch: FetchEpoch, result: Result<Vec<Listing>>) {
        let _guard = self.apply.lock();

        let latest = FetchEpoch(self.epoch.load(Ordering::SeqCst));
        if epoch != latest {
            self.stats.lock().fetches_superseded += 1;
            debug!(epoch = %epoch, latest = %latest, "stale response discarded");
            return;
        }

        match result {
            Ok(listings) => {
                self.stats.lock().fetches_applied += 1;
                info!(epoch = %epoch, count = listings.len(), "fetch applied");
                self.tx.send_replace(ListingsSnapshot {
                    listings: Arc::new(listings),
                    epoch,
                    error: None,
                    loaded: true,
                });
            }
            Err(e) => {
                self.stats.lock().fetches_failed += 1;
                warn!(epoch = %epoch, error = %e, "fetch failed");

                // Keep the last applied set; a first-load failure shows
                // an empty list alongside the error.
                let previous = self.tx.borrow().clone();
                let listings = if previous.loaded {
                    previous.listings
                } else {
                    Arc::new(Vec::new())
                };
                self.tx.send_replace(ListingsSnapshot {
                    listings,
                    epoch: previous.epoch,
                    error: Some(e.to_string()),
                    loaded: true,
                });
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
