//! Query, weight and scorer traits plus the geo implementation.
//!
//! A [`Query`] is the caller-facing, validated description of a search. Per
//! execution it builds one [`Weight`], which holds everything that can be
//! computed once for all segments. The weight then hands out one [`Scorer`]
//! per segment, which walks the matching documents of that segment in
//! ascending doc id order.

use std::fmt::Debug;

use crate::error::Result;
use crate::geo::record::CartesianGeoRecord;
use crate::geo::segment::GeoRecordIterator;

pub mod collector;
pub mod geo;

pub use collector::{Collector, GeoHitQueue, GeoOnlyHit, TopDocsCollector};
pub use geo::{GeoMatch, GeoQuery, GeoQueryBuilder, GeoScorer, GeoWeight};

/// Doc id reported by an exhausted scorer.
pub const NO_MORE_DOCS: u32 = u32::MAX;

/// Trait for search queries.
pub trait Query: Send + Sync + Debug {
    /// Build the per-execution weight.
    fn weight(&self) -> Result<Box<dyn Weight>>;

    /// Get the boost factor for this query.
    fn boost(&self) -> f32;

    /// Set the boost factor for this query.
    ///
    /// Fails with `InvalidArgument` and leaves the boost unchanged unless
    /// `boost` is finite and positive.
    fn set_boost(&mut self, boost: f32) -> Result<()>;

    /// Get a human-readable description of this query.
    fn description(&self) -> String;

    /// Clone this query.
    fn clone_box(&self) -> Box<dyn Query>;

    /// The geo field this query searches in.
    fn field(&self) -> &str;
}

impl Clone for Box<dyn Query> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Per-execution state of a query, shared read-only by all segments.
pub trait Weight: Send + Sync + Debug {
    /// Create the scorer for one segment's geo records.
    fn scorer(&self, segment: &dyn GeoRecordIterator<CartesianGeoRecord>) -> Result<Box<dyn Scorer>>;

    /// The geo field this weight searches in.
    fn field(&self) -> &str;
}

/// Iterator over the matching documents of one segment.
///
/// A fresh scorer is positioned on its first document, if any.
pub trait Scorer: Send + Debug {
    /// The current document, or [`NO_MORE_DOCS`] once exhausted.
    fn doc_id(&self) -> u32;

    /// Advance to the next document.
    fn next(&mut self) -> Result<bool>;

    /// Advance to the first document whose id is at least `target`.
    fn skip_to(&mut self, target: u32) -> Result<bool>;

    /// Score of the current document.
    fn score(&self) -> f64;

    /// Upper bound on the number of documents this scorer visits.
    fn cost(&self) -> u64;

    /// Check if the scorer has no more documents.
    fn is_exhausted(&self) -> bool;
}
