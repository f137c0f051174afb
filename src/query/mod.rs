//! # Facet State → Query Description
//!
//! `build()` is a pure function: the same facet state always yields the
//! same description, and equal descriptions render to identical canonical
//! text no matter what order the facets were touched in.
//!
//! Malformed numeric input never produces an error here. A bound that
//! cannot be coerced is simply absent from the description; the user is
//! mid-edit, not wrong.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{FacetState, PetsFilter};

// ============================================================================
// Filter keys
// ============================================================================

/// The closed set of filter keys a source understands.
///
/// Declaration order is the canonical key order of a description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FilterKey {
    #[serde(rename = "price__gte")]
    PriceMin,
    #[serde(rename = "price__lte")]
    PriceMax,
    #[serde(rename = "location__icontains")]
    Location,
    #[serde(rename = "bedrooms__gte")]
    BedroomsMin,
    #[serde(rename = "bathrooms__gte")]
    BathroomsMin,
    #[serde(rename = "cats_allowed")]
    CatsAllowed,
    #[serde(rename = "dogs_allowed")]
    DogsAllowed,
    #[serde(rename = "laundry_type")]
    Laundry,
    #[serde(rename = "parking")]
    Parking,
    #[serde(rename = "latitude__isnull")]
    HasCoordinates,
    #[serde(rename = "ordering")]
    Ordering,
}

impl FilterKey {
    /// Wire name of the key in the query contract. Double-underscore
    /// suffixes mark the comparison (`__gte`, `__lte`, `__icontains`,
    /// `__isnull`); bare names are exact matches.
    pub fn wire_name(&self) -> &'static str {
        match self {
            FilterKey::PriceMin => "price__gte",
            FilterKey::PriceMax => "price__lte",
            FilterKey::Location => "location__icontains",
            FilterKey::BedroomsMin => "bedrooms__gte",
            FilterKey::BathroomsMin => "bathrooms__gte",
            FilterKey::CatsAllowed => "cats_allowed",
            FilterKey::DogsAllowed => "dogs_allowed",
            FilterKey::Laundry => "laundry_type",
            FilterKey::Parking => "parking",
            FilterKey::HasCoordinates => "latitude__isnull",
            FilterKey::Ordering => "ordering",
        }
    }
}

// ============================================================================
// Filter values
// ============================================================================

/// A primitive filter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Number(f64),
    Text(String),
    Flag(bool),
}

impl FilterValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FilterValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FilterValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            FilterValue::Flag(b) => Some(*b),
            _ => None,
        }
    }
}

impl std::fmt::Display for FilterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterValue::Number(n) => write!(f, "{n}"),
            FilterValue::Text(s) => write!(f, "{s}"),
            FilterValue::Flag(b) => write!(f, "{b}"),
        }
    }
}

// ============================================================================
// Query description
// ============================================================================

/// An ordered mapping of filter keys to values.
///
/// Only active facets appear, plus the always-present ordering key.
/// Two descriptions with the same entries compare equal and render the
/// same canonical text; insertion order is irrelevant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryDescription {
    entries: BTreeMap<FilterKey, FilterValue>,
}

impl QueryDescription {
    pub fn get(&self, key: FilterKey) -> Option<&FilterValue> {
        self.entries.get(&key)
    }

    pub fn contains(&self, key: FilterKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in canonical key order.
    pub fn iter(&self) -> impl Iterator<Item = (&FilterKey, &FilterValue)> {
        self.entries.iter()
    }

    /// Scope the description to records with coordinates (map view).
    pub fn require_coordinates(mut self) -> Self {
        self.entries
            .insert(FilterKey::HasCoordinates, FilterValue::Flag(false));
        self
    }

    /// Canonical `key=value&…` text in key order. Not URL-escaped; this
    /// is an identity for comparison and logging, not a transport form.
    pub fn canonical(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.entries {
            if !out.is_empty() {
                out.push('&');
            }
            out.push_str(key.wire_name());
            out.push('=');
            out.push_str(&value.to_string());
        }
        out
    }

    fn insert(&mut self, key: FilterKey, value: FilterValue) {
        self.entries.insert(key, value);
    }
}

impl std::fmt::Display for QueryDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Build a query description from the current facet state.
///
/// Pure and side-effect-free. Sentinel facets are omitted; the ordering
/// key is always emitted.
pub fn build(facets: &FacetState) -> QueryDescription {
    let mut query = QueryDescription::default();

    if let Some(n) = parse_bound(&facets.min_price) {
        query.insert(FilterKey::PriceMin, FilterValue::Number(n));
    }
    if let Some(n) = parse_bound(&facets.max_price) {
        query.insert(FilterKey::PriceMax, FilterValue::Number(n));
    }

    let location = facets.location.trim();
    if !location.is_empty() {
        query.insert(FilterKey::Location, FilterValue::Text(location.to_string()));
    }

    if let Some(n) = parse_bound(&facets.min_bedrooms) {
        query.insert(FilterKey::BedroomsMin, FilterValue::Number(n));
    }
    if let Some(n) = parse_bound(&facets.min_bathrooms) {
        query.insert(FilterKey::BathroomsMin, FilterValue::Number(n));
    }

    match facets.pets {
        PetsFilter::Any => {}
        PetsFilter::Cats => {
            query.insert(FilterKey::CatsAllowed, FilterValue::Flag(true));
        }
        PetsFilter::Dogs => {
            query.insert(FilterKey::DogsAllowed, FilterValue::Flag(true));
        }
        // "Both" is a conjunction: two independent flags.
        PetsFilter::Both => {
            query.insert(FilterKey::CatsAllowed, FilterValue::Flag(true));
            query.insert(FilterKey::DogsAllowed, FilterValue::Flag(true));
        }
    }

    if let Some(laundry) = facets.laundry {
        query.insert(FilterKey::Laundry, FilterValue::Text(laundry.as_str().into()));
    }
    if let Some(parking) = facets.parking {
        query.insert(FilterKey::Parking, FilterValue::Text(parking.as_str().into()));
    }

    query.insert(
        FilterKey::Ordering,
        FilterValue::Text(facets.sort.as_str().into()),
    );

    query
}

/// Coerce raw facet text to a usable numeric bound.
///
/// Empty, non-numeric, non-finite and negative input all coerce to `None`.
fn parse_bound(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() && n >= 0.0 => Some(n),
        _ => None,
    }
}

// ============================================================================
// Tests
// ============================================================================
