//! Rental listing record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque listing identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ListingId(pub u64);

impl std::fmt::Display for ListingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A latitude/longitude pair.
///
/// Records carry either a whole coordinate or none at all; half a
/// coordinate is unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Laundry situation advertised on a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Laundry {
    None,
    InUnit,
    OnSite,
}

impl Laundry {
    /// Wire text of the variant.
    pub fn as_str(&self) -> &'static str {
        match self {
            Laundry::None => "none",
            Laundry::InUnit => "in_unit",
            Laundry::OnSite => "on_site",
        }
    }
}

/// Parking situation advertised on a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parking {
    None,
    Street,
    OffStreet,
    Garage,
    Carport,
}

impl Parking {
    /// Wire text of the variant.
    pub fn as_str(&self) -> &'static str {
        match self {
            Parking::None => "none",
            Parking::Street => "street",
            Parking::OffStreet => "off_street",
            Parking::Garage => "garage",
            Parking::Carport => "carport",
        }
    }
}

/// A rental listing.
///
/// External data, read-only to the engine. Missing numerics are `None`,
/// never zero: a listing without a price is unpriced, not free.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    pub title: String,
    /// Link back to the original posting.
    pub url: String,
    pub price: Option<f64>,
    /// Free-text neighborhood label.
    pub location: String,
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<f64>,
    pub sqft: Option<u32>,
    pub address: Option<String>,
    pub coordinates: Option<GeoPoint>,
    pub cats_allowed: Option<bool>,
    pub dogs_allowed: Option<bool>,
    pub laundry: Option<Laundry>,
    pub parking: Option<Parking>,
    /// When the record was last observed at its source.
    pub scraped_at: DateTime<Utc>,
    /// Soft-delete flag. Inactive records are invisible to sources.
    pub active: bool,
}

impl Listing {
    pub fn new(id: ListingId, title: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            url: String::new(),
            price: None,
            location: location.into(),
            bedrooms: None,
            bathrooms: None,
            sqft: None,
            address: None,
            coordinates: None,
            cats_allowed: None,
            dogs_allowed: None,
            laundry: None,
            parking: None,
            scraped_at: Utc::now(),
            active: true,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_bedrooms(mut self, bedrooms: u32) -> Self {
        self.bedrooms = Some(bedrooms);
        self
    }

    pub fn with_bathrooms(mut self, bathrooms: f64) -> Self {
        self.bathrooms = Some(bathrooms);
        self
    }

    pub fn with_sqft(mut self, sqft: u32) -> Self {
        self.sqft = Some(sqft);
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_coordinates(mut self, lat: f64, lng: f64) -> Self {
        self.coordinates = Some(GeoPoint::new(lat, lng));
        self
    }

    pub fn with_pets(mut self, cats: bool, dogs: bool) -> Self {
        self.cats_allowed = Some(cats);
        self.dogs_allowed = Some(dogs);
        self
    }

    pub fn with_laundry(mut self, laundry: Laundry) -> Self {
        self.laundry = Some(laundry);
        self
    }

    pub fn with_parking(mut self, parking: Parking) -> Self {
        self.parking = Some(parking);
        self
    }

    pub fn with_scraped_at(mut self, at: DateTime<Utc>) -> Self {
        self.scraped_at = at;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Bedrooms, bathrooms and sqft all present.
    pub fn has_full_details(&self) -> bool {
        self.bedrooms.is_some() && self.bathrooms.is_some() && self.sqft.is_some()
    }

    /// Price divided by square footage, when both are usable.
    pub fn price_per_sqft(&self) -> Option<f64> {
        match (self.price, self.sqft) {
            (Some(price), Some(sqft)) if sqft > 0 => Some(price / sqft as f64),
            _ => None,
        }
    }
}
