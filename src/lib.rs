//! # rentdash — Faceted Query Sync & Geospatial Presentation
//!
//! The reusable core of a browsable rental-listings dashboard: a
//! filterable table, a map view, and analytics over a set of listing
//! records. Transport, persistence, routing and rendering live outside.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `ListingSource` is the contract between the engine and data
//! 2. **Clean DTOs**: `Listing`, `FacetState`, `QueryDescription` cross all boundaries
//! 3. **Builder owns nothing**: facets → query description is a pure function
//! 4. **Epoch-gated**: the displayed set always matches the latest facet state,
//!    even when the network reorders responses
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rentdash::{BBox, Dashboard};
//!
//! # async fn example() {
//! let dashboard = Dashboard::open_memory();
//!
//! // Facet changes debounce into a single fetch.
//! dashboard.set_location("mission");
//! dashboard.set_min_bedrooms("2");
//!
//! // Observe applied snapshots without polling.
//! let mut updates = dashboard.subscribe();
//! if updates.changed().await.is_ok() {
//!     let snapshot = dashboard.snapshot();
//!     println!("{} listings", snapshot.listings.len());
//!
//!     // Derived views recompute from the applied set.
//!     let analytics = dashboard.analytics();
//!     let clusters = dashboard.clusters(&BBox::world(), 12);
//!     println!("{} hoods, {} clusters", analytics.neighborhoods.len(), clusters.len());
//! }
//! # }
//! ```
//!
//! ## Sources
//!
//! | Source | Module | Description |
//! |--------|--------|-------------|
//! | `MemorySource` | `source::memory` | In-memory for testing/embedding |

// ============================================================================
// Modules
// ============================================================================

pub mod analytics;
pub mod geo;
pub mod model;
pub mod query;
pub mod source;
pub mod sync;

use tokio::sync::watch;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    FacetState, GeoPoint, Laundry, Listing, ListingId, Parking, PetsFilter, SortOrder,
};

// ============================================================================
// Re-exports: Query building
// ============================================================================

pub use query::{FilterKey, FilterValue, QueryDescription};

// ============================================================================
// Re-exports: Sources
// ============================================================================

pub use source::{ListingSource, MemorySource};

// ============================================================================
// Re-exports: Fetch coordination
// ============================================================================

pub use sync::{CoordinatorConfig, FetchCoordinator, FetchEpoch, FetchStats, ListingsSnapshot};

// ============================================================================
// Re-exports: Derived views
// ============================================================================

pub use analytics::{
    AnalyticsConfig, AnalyticsSnapshot, Deal, NeighborhoodStats, OverallStats, PriceBands,
    PriceBucket, SqftValue,
};
pub use geo::{BBox, Cluster, ClusterConfig, ClusterTier};

// ============================================================================
// Top-level Dashboard handle
// ============================================================================

/// Aggregated configuration for a dashboard.
#[derive(Debug, Clone, Default)]
pub struct DashboardConfig {
    pub coordinator: CoordinatorConfig,
    pub analytics: AnalyticsConfig,
    pub clustering: ClusterConfig,
}

/// The primary entry point. A `Dashboard` wraps a listing source and
/// wires facet changes through debounced, epoch-gated fetching into the
/// published listings view, analytics, and map clusters.
pub struct Dashboard<S: ListingSource> {
    coordinator: FetchCoordinator<S>,
    analytics: AnalyticsConfig,
    clustering: ClusterConfig,
}

impl<S: ListingSource> Dashboard<S> {
    /// Create a dashboard over the given source with default configuration.
    pub fn with_source(source: S) -> Self {
        Self::with_config(source, DashboardConfig::default())
    }

    /// Create a dashboard with custom configuration.
    pub fn with_config(source: S, config: DashboardConfig) -> Self {
        Self {
            coordinator: FetchCoordinator::with_config(source, config.coordinator),
            analytics: config.analytics,
            clustering: config.clustering,
        }
    }

    // ========================================================================
    // Facets
    // ========================================================================

    pub fn set_min_price(&self, raw: impl Into<String>) {
        self.coordinator.set_min_price(raw);
    }

    pub fn set_max_price(&self, raw: impl Into<String>) {
        self.coordinator.set_max_price(raw);
    }

    pub fn set_location(&self, raw: impl Into<String>) {
        self.coordinator.set_location(raw);
    }

    pub fn set_min_bedrooms(&self, raw: impl Into<String>) {
        self.coordinator.set_min_bedrooms(raw);
    }

    pub fn set_min_bathrooms(&self, raw: impl Into<String>) {
        self.coordinator.set_min_bathrooms(raw);
    }

    pub fn set_pets(&self, pets: PetsFilter) {
        self.coordinator.set_pets(pets);
    }

    pub fn set_laundry(&self, laundry: Option<Laundry>) {
        self.coordinator.set_laundry(laundry);
    }

    pub fn set_parking(&self, parking: Option<Parking>) {
        self.coordinator.set_parking(parking);
    }

    pub fn set_sort(&self, sort: SortOrder) {
        self.coordinator.set_sort(sort);
    }

    /// Reset every facet to its sentinel and schedule exactly one refetch.
    pub fn clear_filters(&self) {
        self.coordinator.clear_filters();
    }

    /// Schedule a refetch without changing facets (initial load, reload).
    pub fn refresh(&self) {
        self.coordinator.refresh();
    }

    /// Number of facets differing from their empty sentinel.
    pub fn active_filter_count(&self) -> usize {
        self.coordinator.active_filter_count()
    }

    /// Current facet state.
    pub fn facets(&self) -> FacetState {
        self.coordinator.facets()
    }

    // ========================================================================
    // Published listings view
    // ========================================================================

    /// The currently published snapshot.
    pub fn snapshot(&self) -> ListingsSnapshot {
        self.coordinator.snapshot()
    }

    /// Subscribe to snapshot updates.
    pub fn subscribe(&self) -> watch::Receiver<ListingsSnapshot> {
        self.coordinator.subscribe()
    }

    /// Fetch lifecycle counters.
    pub fn stats(&self) -> FetchStats {
        self.coordinator.stats()
    }

    // ========================================================================
    // Derived views
    // ========================================================================

    /// Analytics over the currently applied record set.
    pub fn analytics(&self) -> AnalyticsSnapshot {
        analytics::analyze_with(&self.coordinator.snapshot().listings, &self.analytics)
    }

    /// Map clusters of the applied set for a viewport and zoom.
    pub fn clusters(&self, bounds: &BBox, zoom: u8) -> Vec<Cluster> {
        geo::cluster(
            &self.coordinator.snapshot().listings,
            bounds,
            zoom,
            &self.clustering,
        )
    }

    /// Access the underlying source (for seeding, advanced use).
    pub fn source(&self) -> &S {
        self.coordinator.source()
    }

    /// The underlying fetch coordinator.
    pub fn coordinator(&self) -> &FetchCoordinator<S> {
        &self.coordinator
    }
}

/// In-memory dashboard for testing and embedding.
impl Dashboard<MemorySource> {
    pub fn open_memory() -> Self {
        Self::with_source(MemorySource::new())
    }

    pub fn open_memory_with(listings: Vec<Listing>) -> Self {
        Self::with_source(MemorySource::with_listings(listings))
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("query rejected: {0}")]
    QueryRejected(String),
}

pub type Result<T> = std::result::Result<T, Error>;
