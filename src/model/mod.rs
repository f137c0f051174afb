//! # Listing Data Model
//!
//! Clean DTOs that cross every boundary: query building ↔ fetch
//! coordination ↔ aggregation ↔ user.
//!
//! Design rule: this module is pure data. Nothing here does I/O or holds
//! engine state.

pub mod facets;
pub mod listing;

pub use facets::{FacetState, PetsFilter, SortOrder};
pub use listing::{GeoPoint, Laundry, Listing, ListingId, Parking};
