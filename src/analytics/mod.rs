//! # Record Aggregation
//!
//! Pure, deterministic derivations over a record set: overall stats,
//! neighborhood rollups, a price histogram, below-market deals, and a
//! price-per-area ranking. `analyze()` recomputes the whole snapshot from
//! scratch; nothing here carries state between calls.
//!
//! Missing numerics are treated as absent throughout, never as zero: an
//! unpriced record is excluded from every price aggregate but still
//! counts toward totals.

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

use crate::model::{Listing, ListingId};

// ============================================================================
// Configuration
// ============================================================================

/// Interior boundaries of the price histogram.
///
/// `n` boundaries define `n + 1` contiguous half-open buckets: the first
/// is open below, the last open above, so every price lands somewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBands {
    boundaries: Vec<f64>,
}

impl PriceBands {
    /// Build bands from interior boundaries. Boundaries are sorted and
    /// deduplicated; non-finite values are dropped.
    pub fn new(boundaries: impl IntoIterator<Item = f64>) -> Self {
        let mut boundaries: Vec<f64> = boundaries.into_iter().filter(|b| b.is_finite()).collect();
        boundaries.sort_by(f64::total_cmp);
        boundaries.dedup();
        Self { boundaries }
    }

    pub fn boundaries(&self) -> &[f64] {
        &self.boundaries
    }

    pub fn bucket_count(&self) -> usize {
        self.boundaries.len() + 1
    }

    /// Index of the bucket holding `price`. Bucket `i` covers
    /// `[boundary[i-1], boundary[i])`.
    pub fn bucket_index(&self, price: f64) -> usize {
        self.boundaries.iter().take_while(|b| price >= **b).count()
    }

    /// One label per bucket: `under 1500`, `1500-2000`, …, `5000+`.
    pub fn labels(&self) -> Vec<String> {
        if self.boundaries.is_empty() {
            return vec!["all".to_string()];
        }
        let mut labels = Vec::with_capacity(self.bucket_count());
        labels.push(format!("under {}", self.boundaries[0]));
        for pair in self.boundaries.windows(2) {
            labels.push(format!("{}-{}", pair[0], pair[1]));
        }
        labels.push(format!("{}+", self.boundaries[self.boundaries.len() - 1]));
        labels
    }
}

impl Default for PriceBands {
    fn default() -> Self {
        Self::new([1500.0, 2000.0, 2500.0, 3000.0, 3500.0, 4000.0, 5000.0])
    }
}

/// Knobs for `analyze_with`.
#[derive(Debug, Clone)]
pub struct AnalyticsConfig {
    pub bands: PriceBands,
    /// Truncate the deal list. `None` keeps every deal.
    pub deal_limit: Option<usize>,
    /// Truncate the price-per-sqft ranking. `None` keeps every entry.
    pub rank_limit: Option<usize>,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            bands: PriceBands::default(),
            deal_limit: Some(10),
            rank_limit: Some(10),
        }
    }
}

// ============================================================================
// Snapshot types
// ============================================================================

/// Aggregates over the whole record set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallStats {
    pub total_listings: usize,
    /// Mean over priced records, unrounded. `None` when nothing is priced.
    pub avg_price: Option<f64>,
    /// Distinct location labels, case-sensitive.
    pub locations: usize,
    /// Records with bedrooms, bathrooms and sqft all present.
    pub with_full_details: usize,
}

/// Rollup for one location label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighborhoodStats {
    pub location: String,
    pub listing_count: usize,
    pub avg_price: Option<f64>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    /// Mean over members with sqft. `None` when no member has sqft.
    pub avg_sqft: Option<f64>,
    /// Median bedroom count, rounded to the nearest whole bedroom.
    pub median_bedrooms: Option<u32>,
}

/// One price histogram bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBucket {
    pub label: String,
    pub count: usize,
}

/// A listing priced strictly below its neighborhood average.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub id: ListingId,
    pub title: String,
    pub url: String,
    pub location: String,
    pub price: f64,
    pub neighborhood_avg: f64,
    /// `neighborhood_avg - price`, unrounded.
    pub savings: f64,
    /// Percent below the average, one decimal.
    pub savings_percent: f64,
}

/// One entry of the price-per-area ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqftValue {
    pub id: ListingId,
    pub title: String,
    pub location: String,
    pub price: f64,
    pub sqft: u32,
    /// Rounded to two decimals.
    pub price_per_sqft: f64,
}

/// Immutable analytics derived from one record set.
///
/// Recomputed whole whenever the input changes; never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSnapshot {
    pub overall: OverallStats,
    /// Ordered by listing count descending, location ascending on ties.
    pub neighborhoods: Vec<NeighborhoodStats>,
    /// Contiguous buckets; counts sum to the number of priced records.
    pub price_buckets: Vec<PriceBucket>,
    /// Ordered by savings percent, then savings, then id.
    pub deals: Vec<Deal>,
    /// Ordered by price per sqft ascending, id on ties.
    pub best_value: Vec<SqftValue>,
}

impl AnalyticsSnapshot {
    /// Listing counts bucketed by each rollup's median bedroom count,
    /// ordered by bedrooms.
    pub fn bedroom_distribution(&self) -> Vec<(u32, usize)> {
        let mut counts: HashMap<u32, usize> = HashMap::new();
        for hood in &self.neighborhoods {
            if let Some(bedrooms) = hood.median_bedrooms {
                *counts.entry(bedrooms).or_default() += hood.listing_count;
            }
        }
        let mut distribution: Vec<(u32, usize)> = counts.into_iter().collect();
        distribution.sort_by_key(|(bedrooms, _)| *bedrooms);
        distribution
    }
}

// ============================================================================
// Analysis
// ============================================================================

/// Derive the full snapshot with default configuration.
pub fn analyze(listings: &[Listing]) -> AnalyticsSnapshot {
    analyze_with(listings, &AnalyticsConfig::default())
}

/// Derive the full snapshot.
pub fn analyze_with(listings: &[Listing], config: &AnalyticsConfig) -> AnalyticsSnapshot {
    let overall = overall_stats(listings);
    let neighborhoods = neighborhood_stats(listings);
    let price_buckets = price_buckets(listings, &config.bands);
    let deals = find_deals(listings, &neighborhoods, config.deal_limit);
    let best_value = rank_by_sqft(listings, config.rank_limit);

    AnalyticsSnapshot {
        overall,
        neighborhoods,
        price_buckets,
        deals,
        best_value,
    }
}

fn overall_stats(listings: &[Listing]) -> OverallStats {
    let prices: Vec<f64> = listings.iter().filter_map(|l| l.price).collect();
    let locations: HashSet<&str> = listings.iter().map(|l| l.location.as_str()).collect();

    OverallStats {
        total_listings: listings.len(),
        avg_price: mean(&prices),
        locations: locations.len(),
        with_full_details: listings.iter().filter(|l| l.has_full_details()).count(),
    }
}

fn neighborhood_stats(listings: &[Listing]) -> Vec<NeighborhoodStats> {
    let mut groups: HashMap<&str, Vec<&Listing>> = HashMap::new();
    for listing in listings {
        groups.entry(listing.location.as_str()).or_default().push(listing);
    }

    let mut rollups: Vec<NeighborhoodStats> = groups
        .into_iter()
        .map(|(location, members)| {
            let prices: Vec<f64> = members.iter().filter_map(|l| l.price).collect();
            let sqfts: Vec<f64> = members.iter().filter_map(|l| l.sqft.map(f64::from)).collect();
            let min_price = prices.iter().copied().reduce(f64::min);
            let max_price = prices.iter().copied().reduce(f64::max);

            NeighborhoodStats {
                location: location.to_string(),
                listing_count: members.len(),
                avg_price: mean(&prices),
                min_price,
                max_price,
                avg_sqft: mean(&sqfts),
                median_bedrooms: median_bedrooms(&members),
            }
        })
        .collect();

    rollups.sort_by(|a, b| {
        b.listing_count
            .cmp(&a.listing_count)
            .then_with(|| a.location.cmp(&b.location))
    });
    rollups
}

fn price_buckets(listings: &[Listing], bands: &PriceBands) -> Vec<PriceBucket> {
    let mut counts = vec![0usize; bands.bucket_count()];
    for price in listings.iter().filter_map(|l| l.price) {
        counts[bands.bucket_index(price)] += 1;
    }
    bands
        .labels()
        .into_iter()
        .zip(counts)
        .map(|(label, count)| PriceBucket { label, count })
        .collect()
}

fn find_deals(
    listings: &[Listing],
    neighborhoods: &[NeighborhoodStats],
    limit: Option<usize>,
) -> Vec<Deal> {
    let averages: HashMap<&str, f64> = neighborhoods
        .iter()
        .filter_map(|h| h.avg_price.map(|avg| (h.location.as_str(), avg)))
        .collect();

    let mut deals: Vec<Deal> = listings
        .iter()
        .filter_map(|listing| {
            let price = listing.price?;
            let avg = *averages.get(listing.location.as_str())?;
            // Strictly below the neighborhood average.
            if price >= avg {
                return None;
            }
            let savings = avg - price;
            Some(Deal {
                id: listing.id,
                title: listing.title.clone(),
                url: listing.url.clone(),
                location: listing.location.clone(),
                price,
                neighborhood_avg: avg,
                savings,
                savings_percent: round1(savings / avg * 100.0),
            })
        })
        .collect();

    deals.sort_by(|a, b| {
        b.savings_percent
            .total_cmp(&a.savings_percent)
            .then(b.savings.total_cmp(&a.savings))
            .then(a.id.cmp(&b.id))
    });
    if let Some(limit) = limit {
        deals.truncate(limit);
    }
    deals
}

fn rank_by_sqft(listings: &[Listing], limit: Option<usize>) -> Vec<SqftValue> {
    let mut ranked: Vec<SqftValue> = listings
        .iter()
        .filter_map(|listing| {
            let per_sqft = listing.price_per_sqft()?;
            Some(SqftValue {
                id: listing.id,
                title: listing.title.clone(),
                location: listing.location.clone(),
                price: listing.price?,
                sqft: listing.sqft?,
                price_per_sqft: round2(per_sqft),
            })
        })
        .collect();

    ranked.sort_by(|a, b| {
        a.price_per_sqft
            .total_cmp(&b.price_per_sqft)
            .then(a.id.cmp(&b.id))
    });
    if let Some(limit) = limit {
        ranked.truncate(limit);
    }
    ranked
}

// ============================================================================
// Numeric helpers
// ============================================================================

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Median of the members' bedroom counts, rounded to the nearest whole
/// bedroom. `None` when no member reports bedrooms.
fn median_bedrooms(members: &[&Listing]) -> Option<u32> {
    let mut bedrooms: Vec<u32> = members.iter().filter_map(|l| l.bedrooms).collect();
    if bedrooms.is_empty() {
        return None;
    }
    bedrooms.sort_unstable();
    let mid = bedrooms.len() / 2;
    let median = if bedrooms.len() % 2 == 1 {
        bedrooms[mid] as f64
    } else {
        (bedrooms[mid - 1] + bedrooms[mid]) as f64 / 2.0
    };
    Some(median.round() as u32)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ============================================================================
// Tests
// ============================================================================
