//! Index writer that buffers documents and flushes them into geo segments.

use std::sync::Arc;

use log::{debug, info};
use uuid::Uuid;

use crate::error::{GeoSearchError, Result};
use crate::geo::coord::GeoCoordinate;
use crate::geo::record::{CartesianGeoRecord, CartesianGeoRecordCodec, CartesianGeoRecordComparator};
use crate::geo::segment::GeoSegmentWriter;
use crate::index::config::GeoIndexConfig;
use crate::index::{SegmentInfo, SegmentManifest};
use crate::storage::Storage;

/// Builds segments from documents and publishes them on commit.
///
/// Documents get consecutive ids across the whole index. Once the buffer
/// holds `max_buffered_docs` documents it is written out as a new segment
/// before the next document is accepted. Segments become visible to readers
/// only after [`GeoIndexWriter::commit`].
///
/// ```
/// use std::sync::Arc;
///
/// use geosearch::geo::GeoCoordinate;
/// use geosearch::index::{GeoIndexConfig, GeoIndexWriter};
/// use geosearch::storage::memory::MemoryStorage;
///
/// # fn main() -> geosearch::error::Result<()> {
/// let storage = Arc::new(MemoryStorage::default());
/// let mut writer = GeoIndexWriter::new(storage, GeoIndexConfig::default())?;
///
/// let doc_id = writer.add_document(&[GeoCoordinate::new(52.52, 13.405)?])?;
/// assert_eq!(doc_id, 0);
/// writer.commit()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct GeoIndexWriter {
    storage: Arc<dyn Storage>,
    config: GeoIndexConfig,
    manifest: SegmentManifest,
    /// Segments flushed since the last commit.
    pending_segments: Vec<SegmentInfo>,
    buffer: GeoSegmentWriter<CartesianGeoRecord>,
    buffered_docs: u32,
    closed: bool,
}

impl GeoIndexWriter {
    /// Open a writer on `storage`, appending to any committed segments.
    pub fn new(storage: Arc<dyn Storage>, config: GeoIndexConfig) -> Result<Self> {
        config.validate()?;
        let manifest = SegmentManifest::load(storage.as_ref())?;

        Ok(GeoIndexWriter {
            storage,
            config,
            manifest,
            pending_segments: Vec::new(),
            buffer: GeoSegmentWriter::new(
                Arc::new(CartesianGeoRecordCodec),
                Arc::new(CartesianGeoRecordComparator),
            ),
            buffered_docs: 0,
            closed: false,
        })
    }

    pub fn config(&self) -> &GeoIndexConfig {
        &self.config
    }

    fn check_closed(&self) -> Result<()> {
        if self.closed {
            Err(GeoSearchError::index("Writer is closed"))
        } else {
            Ok(())
        }
    }

    /// Id the next added document will receive.
    pub fn next_doc_id(&self) -> u64 {
        let flushed: u64 = self.pending_segments.iter().map(|s| s.max_doc as u64).sum();
        self.manifest.total_docs() + flushed + self.buffered_docs as u64
    }

    /// Add a document with zero or more locations, returning its doc id.
    ///
    /// If the pending flush of a full buffer fails the document is not added,
    /// so the call can be retried.
    pub fn add_document(&mut self, locations: &[GeoCoordinate]) -> Result<u64> {
        self.check_closed()?;

        if self.buffered_docs as usize >= self.config.max_buffered_docs {
            self.flush()?;
        }

        let doc_id = self.next_doc_id();
        let local_doc_id = self.buffered_docs;
        for location in locations {
            self.buffer
                .add(CartesianGeoRecord::from_coordinate(location, local_doc_id));
        }
        self.buffered_docs += 1;

        Ok(doc_id)
    }

    /// Number of documents added since the last commit.
    pub fn pending_docs(&self) -> u64 {
        self.next_doc_id() - self.manifest.total_docs()
    }

    /// Write buffered documents to a new segment without publishing it.
    pub fn flush(&mut self) -> Result<()> {
        self.check_closed()?;
        if self.buffered_docs == 0 {
            return Ok(());
        }

        let name = format!("seg_{}", Uuid::new_v4().simple());
        let mut info = SegmentInfo {
            name,
            field: self.config.field_name.clone(),
            max_doc: self.buffered_docs,
            record_count: 0,
        };

        let record_count = self.buffer.write(self.storage.as_ref(), &info.file_name())?;
        info.record_count = record_count as u64;
        debug!(
            "Flushed segment {} with {} documents and {} records",
            info.name, info.max_doc, info.record_count
        );

        self.pending_segments.push(info);
        self.buffered_docs = 0;
        Ok(())
    }

    /// Flush and publish all pending documents.
    pub fn commit(&mut self) -> Result<()> {
        self.flush()?;
        if self.pending_segments.is_empty() {
            return Ok(());
        }

        let mut manifest = self.manifest.clone();
        manifest.generation += 1;
        manifest.segments.extend(self.pending_segments.iter().cloned());
        manifest.save(self.storage.as_ref())?;
        self.storage.sync()?;

        info!(
            "Committed generation {} with {} new segments ({} documents total)",
            manifest.generation,
            self.pending_segments.len(),
            manifest.total_docs()
        );

        self.manifest = manifest;
        self.pending_segments.clear();
        Ok(())
    }

    /// Discard everything added since the last commit.
    pub fn rollback(&mut self) -> Result<()> {
        self.check_closed()?;

        for info in self.pending_segments.drain(..) {
            self.storage.delete_file(&info.file_name())?;
        }
        self.buffer = GeoSegmentWriter::new(
            Arc::new(CartesianGeoRecordCodec),
            Arc::new(CartesianGeoRecordComparator),
        );
        self.buffered_docs = 0;
        Ok(())
    }

    /// Commit and close the writer.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.commit()?;
        self.closed = true;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
