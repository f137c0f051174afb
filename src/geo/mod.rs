//! # Viewport Clustering
//!
//! Groups geolocated records into map clusters as a function of viewport
//! and zoom. Positions are projected to Web-Mercator pixel space, records
//! within a pixel radius merge greedily in id order, and clusters whose
//! centroids still fall within the radius merge closest-pair-first until
//! stable. Every call recomputes from scratch; clusters are ephemeral,
//! never persisted.
//!
//! Only records with coordinates participate. Records outside the
//! viewport are excluded, never defaulted to a center point.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::model::{GeoPoint, Listing, ListingId};

// ============================================================================
// Bounding box
// ============================================================================

/// Geographic bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BBox {
    pub fn new(min_lat: f64, max_lat: f64, min_lng: f64, max_lng: f64) -> Self {
        Self {
            min_lat,
            max_lat,
            min_lng,
            max_lng,
        }
    }

    /// The whole-world viewport.
    pub fn world() -> Self {
        Self::new(-90.0, 90.0, -180.0, 180.0)
    }

    pub fn contains(&self, point: &GeoPoint) -> bool {
        point.lat >= self.min_lat
            && point.lat <= self.max_lat
            && point.lng >= self.min_lng
            && point.lng <= self.max_lng
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Clustering knobs.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Maximum on-screen distance merged into one cluster, in pixels.
    pub radius_px: f64,
    /// Member count at which a cluster renders as medium.
    pub medium_at: usize,
    /// Member count at which a cluster renders as large.
    pub large_at: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            radius_px: 80.0,
            medium_at: 10,
            large_at: 100,
        }
    }
}

/// Rendered size class of a cluster. A step function of member count:
/// bigger clusters never get a smaller tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterTier {
    Small,
    Medium,
    Large,
}

impl ClusterTier {
    /// Render label of the tier, matching the serde wire text.
    pub fn as_str(&self) -> &'static str {
        match self {
            ClusterTier::Small => "small",
            ClusterTier::Medium => "medium",
            ClusterTier::Large => "large",
        }
    }

    fn for_count(count: usize, config: &ClusterConfig) -> Self {
        if count >= config.large_at {
            ClusterTier::Large
        } else if count >= config.medium_at {
            ClusterTier::Medium
        } else {
            ClusterTier::Small
        }
    }
}

// ============================================================================
// Cluster
// ============================================================================

/// One rendered cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    /// Mean position of the members.
    pub centroid: GeoPoint,
    /// Member ids in ascending order.
    pub members: SmallVec<[ListingId; 8]>,
    pub tier: ClusterTier,
}

impl Cluster {
    pub fn count(&self) -> usize {
        self.members.len()
    }

    /// The single member of a size-one cluster.
    pub fn representative(&self) -> Option<ListingId> {
        if self.members.len() == 1 {
            Some(self.members[0])
        } else {
            None
        }
    }
}

// ============================================================================
// Projection
// ============================================================================

/// Project to Web-Mercator pixel space at a zoom level. The world spans
/// `256 * 2^zoom` pixels; latitude is clamped near the poles where the
/// projection diverges.
pub fn project(point: &GeoPoint, zoom: u8) -> (f64, f64) {
    let scale = 256.0 * 2f64.powi(zoom as i32);
    let x = (point.lng + 180.0) / 360.0 * scale;
    let sin = point.lat.to_radians().sin().clamp(-0.9999, 0.9999);
    let y = (0.5 - ((1.0 + sin) / (1.0 - sin)).ln() / (4.0 * std::f64::consts::PI)) * scale;
    (x, y)
}

fn pixel_distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    (dx * dx + dy * dy).sqrt()
}

// ============================================================================
// Clustering
// ============================================================================

/// In-progress cluster: running sums give the centroid in both spaces.
struct ProtoCluster {
    members: SmallVec<[ListingId; 8]>,
    sum_lat: f64,
    sum_lng: f64,
    sum_x: f64,
    sum_y: f64,
}

impl ProtoCluster {
    fn single(id: ListingId, geo: GeoPoint, px: (f64, f64)) -> Self {
        Self {
            members: SmallVec::from_elem(id, 1),
            sum_lat: geo.lat,
            sum_lng: geo.lng,
            sum_x: px.0,
            sum_y: px.1,
        }
    }

    fn push(&mut self, id: ListingId, geo: GeoPoint, px: (f64, f64)) {
        self.members.push(id);
        self.sum_lat += geo.lat;
        self.sum_lng += geo.lng;
        self.sum_x += px.0;
        self.sum_y += px.1;
    }

    fn absorb(&mut self, other: ProtoCluster) {
        self.members.extend(other.members);
        self.sum_lat += other.sum_lat;
        self.sum_lng += other.sum_lng;
        self.sum_x += other.sum_x;
        self.sum_y += other.sum_y;
    }

    fn pixel_centroid(&self) -> (f64, f64) {
        let n = self.members.len() as f64;
        (self.sum_x / n, self.sum_y / n)
    }

    fn finish(mut self, config: &ClusterConfig) -> Cluster {
        let n = self.members.len() as f64;
        self.members.sort_unstable();
        Cluster {
            centroid: GeoPoint::new(self.sum_lat / n, self.sum_lng / n),
            tier: ClusterTier::for_count(self.members.len(), config),
            members: self.members,
        }
    }
}

/// Cluster the geolocated records visible in `bounds` at `zoom`.
///
/// Deterministic: the sweep visits records in id order, so the same
/// inputs always produce the same partition regardless of slice order
/// or prior calls.
pub fn cluster(
    listings: &[Listing],
    bounds: &BBox,
    zoom: u8,
    config: &ClusterConfig,
) -> Vec<Cluster> {
    let mut points: Vec<(ListingId, GeoPoint, (f64, f64))> = listings
        .iter()
        .filter_map(|l| l.coordinates.map(|c| (l.id, c)))
        .filter(|(_, c)| bounds.contains(c))
        .map(|(id, c)| (id, c, project(&c, zoom)))
        .collect();
    points.sort_by_key(|(id, ..)| *id);

    // Greedy sweep: each record joins the first cluster whose centroid
    // is within the radius, else starts its own.
    let mut clusters: Vec<ProtoCluster> = Vec::new();
    for (id, geo, px) in points {
        match clusters
            .iter_mut()
            .find(|c| pixel_distance(c.pixel_centroid(), px) <= config.radius_px)
        {
            Some(cluster) => cluster.push(id, geo, px),
            None => clusters.push(ProtoCluster::single(id, geo, px)),
        }
    }

    // Merge centroids that ended up within the radius of each other,
    // closest pair first, until no such pair remains.
    loop {
        let mut best: Option<(usize, usize, f64)> = None;
        for i in 0..clusters.len() {
            for j in (i + 1)..clusters.len() {
                let d = pixel_distance(clusters[i].pixel_centroid(), clusters[j].pixel_centroid());
                if d <= config.radius_px && best.map_or(true, |(.., bd)| d < bd) {
                    best = Some((i, j, d));
                }
            }
        }
        match best {
            Some((i, j, _)) => {
                let absorbed = clusters.swap_remove(j);
                clusters[i].absorb(absorbed);
            }
            None => break,
        }
    }

    let mut result: Vec<Cluster> = clusters.into_iter().map(|c| c.finish(config)).collect();
    // Stable output order: by first member id.
    result.sort_by_key(|c| c.members[0]);
    result
}

// ============================================================================
// Tests
// ============================================================================
