//! Segmented geo index.
//!
//! An index is a directory of immutable segments. Each segment owns one geo
//! file per geo field; the set of live segments, together with the record
//! count and document count of each, is tracked by a JSON manifest.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::error::{GeoSearchError, Result};
use crate::geo::segment::geo_file_name;
use crate::storage::Storage;

pub mod config;
pub mod reader;
pub mod writer;

pub use config::{GeoIndexConfig, GeoSearchConfig, SearchOptions};
pub use reader::{GeoIndexReader, GeoSegment, SearchHandle, SearchResults};
pub use writer::GeoIndexWriter;

/// Name of the manifest file.
pub const MANIFEST_FILE: &str = "geo_segments.json";

const MANIFEST_TMP_FILE: &str = "geo_segments.json.tmp";

/// Information about a segment in the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentInfo {
    /// Segment identifier.
    pub name: String,

    /// Geo field stored in this segment.
    pub field: String,

    /// Number of documents in this segment. Local doc ids are `0..max_doc`.
    pub max_doc: u32,

    /// Number of geo records, one per document location.
    pub record_count: u64,
}

impl SegmentInfo {
    /// Name of this segment's geo file.
    pub fn file_name(&self) -> String {
        geo_file_name(&self.name, &self.field)
    }
}

/// The committed set of segments, in doc id order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentManifest {
    /// Incremented on every commit.
    pub generation: u64,
    pub segments: Vec<SegmentInfo>,
}

impl SegmentManifest {
    /// Read the manifest, or an empty one if the index has never been
    /// committed.
    pub fn load(storage: &dyn Storage) -> Result<Self> {
        if !storage.file_exists(MANIFEST_FILE) {
            return Ok(SegmentManifest::default());
        }

        let mut input = storage.open_input(MANIFEST_FILE)?;
        let mut data = Vec::new();
        input.read_to_end(&mut data)?;

        serde_json::from_slice(&data)
            .map_err(|e| GeoSearchError::index(format!("Failed to parse {MANIFEST_FILE}: {e}")))
    }

    /// Write the manifest, replacing the previous one in a single rename.
    pub fn save(&self, storage: &dyn Storage) -> Result<()> {
        let data = serde_json::to_vec_pretty(self)?;

        let mut output = storage.create_output(MANIFEST_TMP_FILE)?;
        output.write_all(&data)?;
        output.flush_and_sync()?;
        output.close()?;

        storage.rename_file(MANIFEST_TMP_FILE, MANIFEST_FILE)
    }

    /// Total documents across all segments.
    pub fn total_docs(&self) -> u64 {
        self.segments.iter().map(|s| s.max_doc as u64).sum()
    }

    /// Total geo records across all segments.
    pub fn total_records(&self) -> u64 {
        self.segments.iter().map(|s| s.record_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStorage;

    #[test]
    fn test_manifest_round_trip() {
        let storage = MemoryStorage::default();
        assert_eq!(SegmentManifest::load(&storage).unwrap(), SegmentManifest::default());

        let manifest = SegmentManifest {
            generation: 3,
            segments: vec![
                SegmentInfo {
                    name: "seg_a".to_string(),
                    field: "location".to_string(),
                    max_doc: 10,
                    record_count: 20,
                },
                SegmentInfo {
                    name: "seg_b".to_string(),
                    field: "location".to_string(),
                    max_doc: 5,
                    record_count: 7,
                },
            ],
        };
        manifest.save(&storage).unwrap();

        assert!(!storage.file_exists(MANIFEST_TMP_FILE));
        let loaded = SegmentManifest::load(&storage).unwrap();
        assert_eq!(loaded, manifest);
        assert_eq!(loaded.total_docs(), 15);
        assert_eq!(loaded.total_records(), 27);
        assert_eq!(loaded.segments[0].file_name(), "seg_a_location.geo");
    }

    #[test]
    fn test_manifest_parse_error() {
        let storage = MemoryStorage::default();
        storage.put_file(MANIFEST_FILE, b"{not json");

        let err = SegmentManifest::load(&storage).unwrap_err();
        assert!(err.to_string().contains(MANIFEST_FILE));
    }
}
