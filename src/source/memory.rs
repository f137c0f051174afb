//! In-memory listing source.
//!
//! This is the reference implementation of `ListingSource`: a RwLock'd
//! record set filtered and sorted per query. It honors every recognized
//! filter key and the soft-delete flag (inactive records are invisible).
//!
//! Use this source for:
//! - Testing the query builder, fetch coordinator, and aggregation views
//! - Embedding the dashboard in applications that don't need a server

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use crate::model::{Listing, ListingId};
use crate::query::{FilterKey, FilterValue, QueryDescription};
use crate::source::ListingSource;
use crate::Result;

// ============================================================================
// MemorySource
// ============================================================================

/// In-memory listing store.
pub struct MemorySource {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    listings: RwLock<Vec<Listing>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::with_listings(Vec::new())
    }

    pub fn with_listings(listings: Vec<Listing>) -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                listings: RwLock::new(listings),
            }),
        }
    }

    /// Insert a record, replacing any existing record with the same id.
    pub fn insert(&self, listing: Listing) {
        let mut listings = self.inner.listings.write();
        match listings.iter_mut().find(|l| l.id == listing.id) {
            Some(slot) => *slot = listing,
            None => listings.push(listing),
        }
    }

    /// Remove a record. Returns true if it existed.
    pub fn remove(&self, id: ListingId) -> bool {
        let mut listings = self.inner.listings.write();
        let before = listings.len();
        listings.retain(|l| l.id != id);
        listings.len() != before
    }

    /// Total stored records, inactive ones included.
    pub fn len(&self) -> usize {
        self.inner.listings.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.listings.read().is_empty()
    }
}

#[async_trait]
impl ListingSource for MemorySource {
    async fn fetch(&self, query: &QueryDescription) -> Result<Vec<Listing>> {
        let mut result: Vec<Listing> = {
            let listings = self.inner.listings.read();
            listings
                .iter()
                .filter(|l| l.active && matches(l, query))
                .cloned()
                .collect()
        };
        sort_listings(&mut result, query);

        debug!(count = result.len(), query = %query, "memory source fetch");
        Ok(result)
    }
}

// ============================================================================
// Filtering
// ============================================================================

/// Does the record satisfy every filter entry? Unknown comparisons and
/// the ordering key are skipped here.
fn matches(listing: &Listing, query: &QueryDescription) -> bool {
    query.iter().all(|(key, value)| match key {
        FilterKey::PriceMin => cmp_ge(listing.price, value),
        FilterKey::PriceMax => cmp_le(listing.price, value),
        FilterKey::Location => value
            .as_text()
            .map_or(true, |needle| contains_ci(&listing.location, needle)),
        FilterKey::BedroomsMin => cmp_ge(listing.bedrooms.map(f64::from), value),
        FilterKey::BathroomsMin => cmp_ge(listing.bathrooms, value),
        FilterKey::CatsAllowed => flag_eq(listing.cats_allowed, value),
        FilterKey::DogsAllowed => flag_eq(listing.dogs_allowed, value),
        FilterKey::Laundry => value
            .as_text()
            .map_or(true, |want| listing.laundry.map(|l| l.as_str()) == Some(want)),
        FilterKey::Parking => value
            .as_text()
            .map_or(true, |want| listing.parking.map(|p| p.as_str()) == Some(want)),
        FilterKey::HasCoordinates => value
            .as_flag()
            .map_or(true, |isnull| listing.coordinates.is_none() == isnull),
        FilterKey::Ordering => true,
    })
}

/// `field >= bound`. A missing field never satisfies a bound.
fn cmp_ge(field: Option<f64>, value: &FilterValue) -> bool {
    match (field, value.as_number()) {
        (Some(f), Some(bound)) => f >= bound,
        (None, Some(_)) => false,
        (_, None) => true,
    }
}

/// `field <= bound`. A missing field never satisfies a bound.
fn cmp_le(field: Option<f64>, value: &FilterValue) -> bool {
    match (field, value.as_number()) {
        (Some(f), Some(bound)) => f <= bound,
        (None, Some(_)) => false,
        (_, None) => true,
    }
}

/// Exact flag match. Unknown never matches a required flag.
fn flag_eq(field: Option<bool>, value: &FilterValue) -> bool {
    match value.as_flag() {
        Some(want) => field == Some(want),
        None => true,
    }
}

/// Case-insensitive substring match.
fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

// ============================================================================
// Ordering
// ============================================================================

/// Apply the `Ordering` key. Records without the sorted field go last;
/// ties break by id so the order is deterministic. An unrecognized
/// ordering falls back to id order.
fn sort_listings(listings: &mut [Listing], query: &QueryDescription) {
    let ordering = query
        .get(FilterKey::Ordering)
        .and_then(FilterValue::as_text)
        .unwrap_or("-scraped_at");

    match ordering {
        "-scraped_at" => {
            listings.sort_by(|a, b| b.scraped_at.cmp(&a.scraped_at).then(a.id.cmp(&b.id)));
        }
        "scraped_at" => {
            listings.sort_by(|a, b| a.scraped_at.cmp(&b.scraped_at).then(a.id.cmp(&b.id)));
        }
        "price" => {
            listings.sort_by(|a, b| price_order(a, b, false));
        }
        "-price" => {
            listings.sort_by(|a, b| price_order(a, b, true));
        }
        _ => {
            listings.sort_by_key(|l| l.id);
        }
    }
}

fn price_order(a: &Listing, b: &Listing, descending: bool) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    let by_price = match (a.price, b.price) {
        (Some(pa), Some(pb)) => {
            if descending {
                pb.total_cmp(&pa)
            } else {
                pa.total_cmp(&pb)
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_price.then(a.id.cmp(&b.id))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FacetState, Laundry, PetsFilter, SortOrder};
    use crate::query;
    use chrono::{TimeZone, Utc};

    fn seed() -> MemorySource {
        let at = |h| Utc.with_ymd_and_hms(2026, 3, 1, h, 0, 0).unwrap();
        MemorySource::with_listings(vec![
            Listing::new(ListingId(1), "Mission studio", "Mission")
                .with_price(1800.0)
                .with_bedrooms(0)
                .with_pets(true, false)
                .with_laundry(Laundry::OnSite)
                .with_scraped_at(at(9)),
            Listing::new(ListingId(2), "SoMa loft", "SoMa")
                .with_price(3200.0)
                .with_bedrooms(2)
                .with_pets(true, true)
                .with_laundry(Laundry::InUnit)
                .with_scraped_at(at(11)),
            Listing::new(ListingId(3), "Sunset house", "Outer Sunset")
                .with_bedrooms(3)
                .with_scraped_at(at(10)),
            Listing::new(ListingId(4), "Gone", "Mission")
                .with_price(1500.0)
                .with_scraped_at(at(12))
                .inactive(),
        ])
    }

    #[tokio::test]
    async fn test_fetch_skips_inactive() {
        let source = seed();
        let all = source.fetch(&query::build(&FacetState::new())).await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.iter().all(|l| l.id != ListingId(4)));
    }

    #[tokio::test]
    async fn test_default_ordering_is_newest_first() {
        let source = seed();
        let all = source.fetch(&query::build(&FacetState::new())).await.unwrap();
        let ids: Vec<ListingId> = all.iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![ListingId(2), ListingId(3), ListingId(1)]);
    }

    #[tokio::test]
    async fn test_price_bound_excludes_unpriced() {
        let source = seed();
        let mut facets = FacetState::new();
        facets.min_price = "1000".into();
        let result = source.fetch(&query::build(&facets)).await.unwrap();
        // Listing 3 has no price and cannot satisfy a bound.
        assert_eq!(result.len(), 2);
        assert!(result.iter().all(|l| l.price.is_some()));
    }

    #[tokio::test]
    async fn test_location_match_is_case_insensitive_substring() {
        let source = seed();
        let mut facets = FacetState::new();
        facets.location = "sunset".into();
        let result = source.fetch(&query::build(&facets)).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, ListingId(3));
    }

    #[tokio::test]
    async fn test_both_pets_is_a_conjunction() {
        let source = seed();
        let mut facets = FacetState::new();
        facets.pets = PetsFilter::Both;
        let result = source.fetch(&query::build(&facets)).await.unwrap();
        // Listing 1 allows cats only; listing 3 is unknown; only 2 matches.
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, ListingId(2));
    }

    #[tokio::test]
    async fn test_price_sort_puts_unpriced_last() {
        let source = seed();
        let mut facets = FacetState::new();
        facets.sort = SortOrder::PriceAsc;
        let result = source.fetch(&query::build(&facets)).await.unwrap();
        let ids: Vec<ListingId> = result.iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![ListingId(1), ListingId(2), ListingId(3)]);
    }

    #[tokio::test]
    async fn test_coordinate_scope() {
        let source = seed();
        source.insert(
            Listing::new(ListingId(5), "Mapped", "Mission")
                .with_price(2100.0)
                .with_coordinates(37.76, -122.42),
        );
        let scoped = query::build(&FacetState::new()).require_coordinates();
        let result = source.fetch(&scoped).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, ListingId(5));
    }

    #[tokio::test]
    async fn test_insert_replaces_by_id() {
        let source = seed();
        assert_eq!(source.len(), 4);
        source.insert(Listing::new(ListingId(1), "Renamed", "Mission").with_price(1900.0));
        assert_eq!(source.len(), 4);

        let mut facets = FacetState::new();
        facets.location = "mission".into();
        let result = source.fetch(&query::build(&facets)).await.unwrap();
        let renamed = result.iter().find(|l| l.id == ListingId(1)).unwrap();
        assert_eq!(renamed.title, "Renamed");
    }
}
