//! # Listing Source Trait
//!
//! This is THE contract between the dashboard engine and whatever serves
//! listing records. The engine never fetches on its own: it hands a
//! `QueryDescription` to a source and treats the answer as authoritative.
//!
//! ## Implementations
//!
//! | Source | Module | Description |
//! |--------|--------|-------------|
//! | `MemorySource` | `memory` | In-memory for testing/embedding |

pub mod memory;

use async_trait::async_trait;

use crate::model::Listing;
use crate::query::QueryDescription;
use crate::Result;

pub use memory::MemorySource;

/// The record-fetching contract.
///
/// Implementations interpret the recognized filter keys of a description
/// and return every matching record, already ordered per the `Ordering`
/// key. Keys a source does not recognize are ignored, never an error.
#[async_trait]
pub trait ListingSource: Send + Sync + 'static {
    /// Fetch all records matching the description.
    ///
    /// Failures surface as `Error::Transport` (unreachable, malformed
    /// answer) or `Error::QueryRejected` (the source refused the query).
    async fn fetch(&self, query: &QueryDescription) -> Result<Vec<Listing>>;
}
