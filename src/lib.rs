//! # geosearch
//!
//! Geospatial range queries over a segmented index.
//!
//! ## Features
//!
//! - Unit-sphere projection of (latitude, longitude) points
//! - Fixed-width, sorted per-segment geo files with binary-searched range scans
//! - Bounding-cube pre-filtering followed by exact great-circle refinement
//! - Bounded top-k merging across segments, optionally in parallel
//! - Pluggable storage backends (file, memory-mapped, in-memory)
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use geosearch::geo::GeoCoordinate;
//! use geosearch::index::{GeoIndexConfig, GeoIndexReader, GeoIndexWriter, SearchOptions};
//! use geosearch::query::GeoQuery;
//! use geosearch::storage::Storage;
//! use geosearch::storage::memory::MemoryStorage;
//!
//! # fn main() -> geosearch::error::Result<()> {
//! let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::default());
//!
//! let mut writer = GeoIndexWriter::new(storage.clone(), GeoIndexConfig::default())?;
//! writer.add_document(&[GeoCoordinate::new(40.7128, -74.0060)?])?;
//! writer.add_document(&[GeoCoordinate::new(34.0522, -118.2437)?])?;
//! writer.commit()?;
//!
//! let reader = GeoIndexReader::open(storage, GeoIndexConfig::default())?;
//! let query = GeoQuery::new("location", 40.73, -73.99, 50.0)?;
//! let results = reader.search(&query, &SearchOptions::new(10))?;
//! assert_eq!(results.hits.len(), 1);
//! assert_eq!(results.hits[0].doc_id, 0);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod error;
pub mod geo;
pub mod index;
pub mod query;
pub mod storage;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
