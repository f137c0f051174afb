//! Filter facet state.
//!
//! Every facet has an "empty" sentinel meaning not applied:
//!
//! | Facet | Empty sentinel |
//! |-------|----------------|
//! | `min_price`, `max_price`, `min_bedrooms`, `min_bathrooms` | `""` |
//! | `location` | `""` after trimming |
//! | `pets` | `PetsFilter::Any` |
//! | `laundry`, `parking` | `None` |
//! | `sort` | none (always applied) |
//!
//! Numeric facets keep the raw text as typed. Coercion happens in the
//! query builder, so malformed input degrades to "no filter" instead of
//! surfacing an error.

use serde::{Deserialize, Serialize};

use super::{Laundry, Parking};

/// Pet policy facet. `Both` means cats AND dogs, not either.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PetsFilter {
    #[default]
    Any,
    Cats,
    Dogs,
    Both,
}

/// Result ordering. Wire text follows the query contract: a leading `-`
/// means descending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    /// Most recently observed first (the default).
    #[default]
    #[serde(rename = "-scraped_at")]
    NewestFirst,
    #[serde(rename = "scraped_at")]
    OldestFirst,
    #[serde(rename = "price")]
    PriceAsc,
    #[serde(rename = "-price")]
    PriceDesc,
}

impl SortOrder {
    /// Wire text of the variant.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::NewestFirst => "-scraped_at",
            SortOrder::OldestFirst => "scraped_at",
            SortOrder::PriceAsc => "price",
            SortOrder::PriceDesc => "-price",
        }
    }
}

/// The complete facet state of one query stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FacetState {
    pub min_price: String,
    pub max_price: String,
    pub location: String,
    pub min_bedrooms: String,
    pub min_bathrooms: String,
    pub pets: PetsFilter,
    pub laundry: Option<Laundry>,
    pub parking: Option<Parking>,
    pub sort: SortOrder,
}

impl FacetState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of facets currently differing from their empty sentinel.
    ///
    /// The sort never counts: it is always present.
    pub fn active_filter_count(&self) -> usize {
        let mut count = 0;
        if !self.min_price.is_empty() {
            count += 1;
        }
        if !self.max_price.is_empty() {
            count += 1;
        }
        if !self.location.trim().is_empty() {
            count += 1;
        }
        if !self.min_bedrooms.is_empty() {
            count += 1;
        }
        if !self.min_bathrooms.is_empty() {
            count += 1;
        }
        if self.pets != PetsFilter::Any {
            count += 1;
        }
        if self.laundry.is_some() {
            count += 1;
        }
        if self.parking.is_some() {
            count += 1;
        }
        count
    }

    /// Reset every facet to its sentinel. The sort returns to the default.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_has_no_active_filters() {
        let facets = FacetState::new();
        assert_eq!(facets.active_filter_count(), 0);
        assert_eq!(facets.sort, SortOrder::NewestFirst);
    }

    #[test]
    fn test_each_facet_counts_once() {
        let mut facets = FacetState::new();
        facets.min_price = "1000".into();
        facets.max_price = "3000".into();
        facets.location = "mission".into();
        facets.min_bedrooms = "2".into();
        facets.min_bathrooms = "1".into();
        facets.pets = PetsFilter::Cats;
        facets.laundry = Some(Laundry::InUnit);
        facets.parking = Some(Parking::Garage);
        assert_eq!(facets.active_filter_count(), 8);
    }

    #[test]
    fn test_whitespace_location_is_not_active() {
        let mut facets = FacetState::new();
        facets.location = "   ".into();
        assert_eq!(facets.active_filter_count(), 0);
    }

    #[test]
    fn test_whitespace_numeric_text_is_active() {
        // Only location trims; numeric facets compare against the raw "".
        let mut facets = FacetState::new();
        facets.min_price = "   ".into();
        assert_eq!(facets.active_filter_count(), 1);
    }

    #[test]
    fn test_sort_never_counts() {
        let mut facets = FacetState::new();
        facets.sort = SortOrder::PriceAsc;
        assert_eq!(facets.active_filter_count(), 0);
    }

    #[test]
    fn test_reset_restores_sentinels() {
        let mut facets = FacetState::new();
        facets.location = "soma".into();
        facets.pets = PetsFilter::Both;
        facets.sort = SortOrder::PriceDesc;
        facets.reset();
        assert_eq!(facets, FacetState::default());
    }

    #[test]
    fn test_sort_order_wire_text() {
        assert_eq!(SortOrder::NewestFirst.as_str(), "-scraped_at");
        assert_eq!(SortOrder::PriceDesc.as_str(), "-price");
        let json = serde_json::to_string(&SortOrder::NewestFirst).unwrap();
        assert_eq!(json, "\"-scraped_at\"");
    }
}
