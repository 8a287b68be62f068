//! Multi-segment geo index reader.
//!
//! Each committed segment is opened once and shared through an
//! [`Arc<GeoSegment>`] handle. A search takes a snapshot of the handles, so
//! segments replaced by [`GeoIndexReader::reload`] stay readable until the
//! last in-flight query drops them.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::RecvTimeoutError;
use log::{debug, info, warn};
use parking_lot::RwLock;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{GeoSearchError, Result};
use crate::geo::record::{CartesianGeoRecord, CartesianGeoRecordCodec, CartesianGeoRecordComparator};
use crate::geo::segment::GeoSegmentReader;
use crate::index::config::{GeoIndexConfig, SearchOptions};
use crate::index::{SegmentInfo, SegmentManifest};
use crate::query::collector::{Collector, GeoHitQueue, GeoOnlyHit, TopDocsCollector};
use crate::query::{Query, Weight};
use crate::storage::Storage;

/// One open segment and its position in the global doc id space.
#[derive(Debug)]
pub struct GeoSegment {
    info: SegmentInfo,
    doc_base: u64,
    reader: GeoSegmentReader<CartesianGeoRecord>,
}

impl GeoSegment {
    fn open(storage: &dyn Storage, info: SegmentInfo, doc_base: u64) -> Result<Self> {
        let reader = GeoSegmentReader::load(
            storage,
            &info.file_name(),
            &info.field,
            info.max_doc,
            info.record_count as usize,
            Arc::new(CartesianGeoRecordCodec),
            Arc::new(CartesianGeoRecordComparator),
        )
        .map_err(|e| GeoSearchError::index(format!("Failed to open segment {}: {e}", info.name)))?;

        Ok(GeoSegment {
            info,
            doc_base,
            reader,
        })
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn info(&self) -> &SegmentInfo {
        &self.info
    }

    /// Global doc id of this segment's local doc 0.
    pub fn doc_base(&self) -> u64 {
        self.doc_base
    }

    pub fn max_doc(&self) -> u32 {
        self.info.max_doc
    }

    pub fn reader(&self) -> &GeoSegmentReader<CartesianGeoRecord> {
        &self.reader
    }

    /// Score this segment, keeping its best `top_n` hits with global doc ids.
    pub fn search(&self, weight: &dyn Weight, top_n: usize, min_score: Option<f64>) -> Result<SegmentHits> {
        let mut scorer = weight.scorer(&self.reader)?;
        let mut collector = match min_score {
            Some(min_score) => TopDocsCollector::with_min_score(top_n, min_score),
            None => TopDocsCollector::new(top_n),
        };

        while !scorer.is_exhausted() {
            collector.collect(self.doc_base + scorer.doc_id() as u64, scorer.score())?;
            scorer.next()?;
        }

        let total_hits = collector.total_hits();
        debug!("Segment {} produced {total_hits} hits", self.info.name);

        Ok(SegmentHits {
            hits: collector.into_hits(),
            total_hits,
        })
    }
}

/// Top hits of a single segment.
#[derive(Debug, Clone, Default)]
pub struct SegmentHits {
    /// Descending by score, global doc ids.
    pub hits: Vec<GeoOnlyHit>,
    /// Matching documents before truncation to `top_n`.
    pub total_hits: u64,
}

/// Merged results of a search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    /// Descending by score.
    pub hits: Vec<GeoOnlyHit>,

    /// Matching documents across all scored segments.
    pub total_hits: u64,

    /// Score of the best hit, 0 when there are no hits.
    pub max_score: f64,

    /// Segments dropped because they failed.
    pub failed_segments: usize,
}

/// Cancellation token for a running search.
///
/// Segments that have not started scoring when the handle is cancelled are
/// never started.
#[derive(Debug, Clone, Default)]
pub struct SearchHandle {
    cancel_token: Arc<AtomicBool>,
}

impl SearchHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the search.
    pub fn cancel(&self) {
        self.cancel_token.store(true, Ordering::SeqCst);
    }

    /// Check if the search is cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.load(Ordering::SeqCst)
    }
}

/// Reads and searches all committed segments of a geo index.
#[derive(Debug)]
pub struct GeoIndexReader {
    storage: Arc<dyn Storage>,
    config: GeoIndexConfig,
    segments: RwLock<Vec<Arc<GeoSegment>>>,
    generation: RwLock<u64>,
    thread_pool: Arc<ThreadPool>,
}

impl GeoIndexReader {
    /// Open every committed segment of the configured field.
    pub fn open(storage: Arc<dyn Storage>, config: GeoIndexConfig) -> Result<Self> {
        config.validate()?;

        let thread_pool_size = config.search.thread_pool_size.unwrap_or_else(num_cpus::get);
        let thread_pool = ThreadPoolBuilder::new()
            .num_threads(thread_pool_size)
            .thread_name(|i| format!("geo-search-{i}"))
            .build()
            .map_err(|e| GeoSearchError::internal(format!("Failed to create thread pool: {e}")))?;

        let reader = GeoIndexReader {
            storage,
            config,
            segments: RwLock::new(Vec::new()),
            generation: RwLock::new(0),
            thread_pool: Arc::new(thread_pool),
        };
        reader.reload()?;
        Ok(reader)
    }

    pub fn config(&self) -> &GeoIndexConfig {
        &self.config
    }

    /// Pick up segments committed since the reader was opened.
    ///
    /// Segments already open are reused; handles held by running searches
    /// remain valid.
    pub fn reload(&self) -> Result<()> {
        let manifest = SegmentManifest::load(self.storage.as_ref())?;

        let current: HashMap<String, Arc<GeoSegment>> = self
            .segments
            .read()
            .iter()
            .map(|segment| (segment.name().to_string(), Arc::clone(segment)))
            .collect();

        let mut segments = Vec::with_capacity(manifest.segments.len());
        let mut doc_base = 0u64;
        for info in manifest.segments {
            let max_doc = info.max_doc as u64;
            if info.field == self.config.field_name {
                let segment = match current.get(&info.name) {
                    Some(segment) if segment.doc_base == doc_base => Arc::clone(segment),
                    _ => Arc::new(GeoSegment::open(self.storage.as_ref(), info, doc_base)?),
                };
                segments.push(segment);
            }
            doc_base += max_doc;
        }

        info!(
            "Opened {} segments for field {} at generation {}",
            segments.len(),
            self.config.field_name,
            manifest.generation
        );

        *self.segments.write() = segments;
        *self.generation.write() = manifest.generation;
        Ok(())
    }

    /// Manifest generation this reader reflects.
    pub fn generation(&self) -> u64 {
        *self.generation.read()
    }

    /// Snapshot of the open segments, in doc id order.
    pub fn segments(&self) -> Vec<Arc<GeoSegment>> {
        self.segments.read().clone()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.read().len()
    }

    /// Total number of documents.
    pub fn num_docs(&self) -> u64 {
        self.segments.read().iter().map(|s| s.max_doc() as u64).sum()
    }

    /// Total number of geo records.
    pub fn num_records(&self) -> u64 {
        self.segments.read().iter().map(|s| s.reader().len() as u64).sum()
    }

    /// Execute `query` over all segments.
    pub fn search(&self, query: &dyn Query, options: &SearchOptions) -> Result<SearchResults> {
        self.search_with_handle(query, options, &SearchHandle::new())
    }

    /// Execute `query`, stopping early if `handle` is cancelled.
    pub fn search_with_handle(
        &self,
        query: &dyn Query,
        options: &SearchOptions,
        handle: &SearchHandle,
    ) -> Result<SearchResults> {
        if query.field() != self.config.field_name {
            return Err(GeoSearchError::query(format!(
                "Query field {} is not indexed; this index holds {}",
                query.field(),
                self.config.field_name
            )));
        }

        let weight: Arc<dyn Weight> = Arc::from(query.weight()?);
        let segments = self.segments();
        let timeout = options.timeout.unwrap_or(self.config.search.default_timeout);
        let parallel = options.parallel.unwrap_or(self.config.search.parallel) && segments.len() > 1;

        debug!(
            "Searching {} segments ({}) for {}",
            segments.len(),
            if parallel { "parallel" } else { "sequential" },
            query.description()
        );

        let per_segment = if parallel {
            self.execute_parallel(&segments, &weight, options, timeout, handle)?
        } else {
            Self::execute_sequential(&segments, weight.as_ref(), options, timeout, handle)?
        };

        self.merge(&segments, per_segment, options.top_n, handle)
    }

    fn execute_sequential(
        segments: &[Arc<GeoSegment>],
        weight: &dyn Weight,
        options: &SearchOptions,
        timeout: Duration,
        handle: &SearchHandle,
    ) -> Result<Vec<Result<SegmentHits>>> {
        let deadline = Instant::now() + timeout;
        let mut results = Vec::with_capacity(segments.len());

        for segment in segments {
            if handle.is_cancelled() {
                return Err(GeoSearchError::cancelled("Search was cancelled"));
            }
            if Instant::now() >= deadline {
                handle.cancel();
                return Err(GeoSearchError::timeout(format!(
                    "search did not finish within {timeout:?}"
                )));
            }
            results.push(segment.search(weight, options.top_n, options.min_score));
        }

        Ok(results)
    }

    fn execute_parallel(
        &self,
        segments: &[Arc<GeoSegment>],
        weight: &Arc<dyn Weight>,
        options: &SearchOptions,
        timeout: Duration,
        handle: &SearchHandle,
    ) -> Result<Vec<Result<SegmentHits>>> {
        let (tx, rx) = crossbeam_channel::unbounded();

        for (index, segment) in segments.iter().enumerate() {
            let tx = tx.clone();
            let segment = Arc::clone(segment);
            let weight = Arc::clone(weight);
            let handle = handle.clone();
            let top_n = options.top_n;
            let min_score = options.min_score;

            self.thread_pool.spawn(move || {
                let result = if handle.is_cancelled() {
                    Err(GeoSearchError::cancelled("Search was cancelled"))
                } else {
                    segment.search(weight.as_ref(), top_n, min_score)
                };
                let _ = tx.send((index, result));
            });
        }

        // Drop our sender so the receiver disconnects once every task has reported
        drop(tx);

        let deadline = Instant::now() + timeout;
        let mut results: Vec<Option<Result<SegmentHits>>> = (0..segments.len()).map(|_| None).collect();

        let timed_out = || {
            handle.cancel();
            GeoSearchError::timeout(format!("search did not finish within {timeout:?}"))
        };

        for _ in 0..segments.len() {
            // A result already queued does not count once the deadline has passed.
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(timed_out());
            }
            match rx.recv_timeout(remaining) {
                Ok((index, result)) => results[index] = Some(result),
                Err(RecvTimeoutError::Timeout) => return Err(timed_out()),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(GeoSearchError::internal("segment task ended without a result"));
                }
            }
        }

        if handle.is_cancelled() {
            return Err(GeoSearchError::cancelled("Search was cancelled"));
        }

        results
            .into_iter()
            .map(|result| result.ok_or_else(|| GeoSearchError::internal("missing segment result")))
            .collect()
    }

    /// Merge per-segment top hits, in segment order, into the global top hits.
    fn merge(
        &self,
        segments: &[Arc<GeoSegment>],
        per_segment: Vec<Result<SegmentHits>>,
        top_n: usize,
        handle: &SearchHandle,
    ) -> Result<SearchResults> {
        let mut queue = GeoHitQueue::new(top_n);
        let mut total_hits = 0;
        let mut failed_segments = 0;

        for (segment, result) in segments.iter().zip(per_segment) {
            match result {
                Ok(segment_hits) => {
                    total_hits += segment_hits.total_hits;
                    for hit in segment_hits.hits {
                        queue.insert(hit);
                    }
                }
                Err(e @ GeoSearchError::OperationCancelled(_)) if handle.is_cancelled() => return Err(e),
                Err(e) if self.config.search.allow_partial_results => {
                    warn!("Skipping segment {}: {e}", segment.name());
                    failed_segments += 1;
                }
                Err(e) => {
                    return Err(GeoSearchError::query(format!(
                        "Search failed in segment {}: {e}",
                        segment.name()
                    )));
                }
            }
        }

        let hits = queue.drain();
        let max_score = hits.first().map_or(0.0, |hit| hit.score);

        Ok(SearchResults {
            hits,
            total_hits,
            max_score,
            failed_segments,
        })
    }
}
