//! Collector implementations for gathering geo hits.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A scored document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoOnlyHit {
    pub doc_id: u64,
    pub score: f64,
}

impl GeoOnlyHit {
    pub fn new(doc_id: u64, score: f64) -> Self {
        GeoOnlyHit { doc_id, score }
    }
}

#[derive(Debug)]
struct QueueEntry {
    hit: GeoOnlyHit,
    sequence: u64,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    // Worst entry is the greatest: lower score, then later insertion.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .hit
            .score
            .total_cmp(&self.hit.score)
            .then_with(|| self.sequence.cmp(&other.sequence))
    }
}

/// Fixed-capacity queue retaining the highest-scoring hits.
///
/// The worst retained hit sits at the top of the heap, so a better hit
/// evicts it in `O(log k)`. Among equal scores the earlier insertion is kept
/// and ranked first.
///
/// ```
/// use geosearch::query::{GeoHitQueue, GeoOnlyHit};
///
/// let mut queue = GeoHitQueue::new(2);
/// queue.insert(GeoOnlyHit::new(1, 0.5));
/// queue.insert(GeoOnlyHit::new(2, 0.9));
/// queue.insert(GeoOnlyHit::new(3, 0.7));
///
/// let ids: Vec<u64> = queue.drain().into_iter().map(|hit| hit.doc_id).collect();
/// assert_eq!(ids, vec![2, 3]);
/// ```
#[derive(Debug)]
pub struct GeoHitQueue {
    capacity: usize,
    heap: BinaryHeap<QueueEntry>,
    next_sequence: u64,
}

impl GeoHitQueue {
    pub fn new(capacity: usize) -> Self {
        GeoHitQueue {
            capacity,
            // Bounded so a huge top-n does not allocate up front.
            heap: BinaryHeap::with_capacity(capacity.min(1024)),
            next_sequence: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.capacity
    }

    /// Lowest retained score, if any hit is retained.
    pub fn min_score(&self) -> Option<f64> {
        self.heap.peek().map(|entry| entry.hit.score)
    }

    /// Offer a hit. Returns whether it was retained. A NaN score is never
    /// retained.
    pub fn insert(&mut self, hit: GeoOnlyHit) -> bool {
        if self.capacity == 0 || hit.score.is_nan() {
            return false;
        }

        let entry = QueueEntry {
            hit,
            sequence: self.next_sequence,
        };
        self.next_sequence += 1;

        if self.heap.len() < self.capacity {
            self.heap.push(entry);
            return true;
        }

        match self.heap.peek() {
            Some(worst) if hit.score > worst.hit.score => {
                self.heap.pop();
                self.heap.push(entry);
                true
            }
            _ => false,
        }
    }

    /// Consume the queue, returning hits by descending score.
    pub fn drain(self) -> Vec<GeoOnlyHit> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|entry| entry.hit)
            .collect()
    }
}

/// Trait for collecting search results.
pub trait Collector: Send + Debug {
    /// Collect a document hit.
    fn collect(&mut self, doc_id: u64, score: f64) -> Result<()>;

    /// Get the total number of hits collected.
    fn total_hits(&self) -> u64;
}

/// A collector that keeps the top N documents by score.
#[derive(Debug)]
pub struct TopDocsCollector {
    queue: GeoHitQueue,
    min_score: Option<f64>,
    total_hits: u64,
}

impl TopDocsCollector {
    /// Create a new top docs collector.
    pub fn new(max_docs: usize) -> Self {
        TopDocsCollector {
            queue: GeoHitQueue::new(max_docs),
            min_score: None,
            total_hits: 0,
        }
    }

    /// Create a new top docs collector that drops hits scoring below
    /// `min_score`.
    pub fn with_min_score(max_docs: usize, min_score: f64) -> Self {
        TopDocsCollector {
            min_score: Some(min_score),
            ..Self::new(max_docs)
        }
    }

    pub fn max_docs(&self) -> usize {
        self.queue.capacity()
    }

    /// Collected hits by descending score.
    pub fn into_hits(self) -> Vec<GeoOnlyHit> {
        self.queue.drain()
    }
}

impl Collector for TopDocsCollector {
    fn collect(&mut self, doc_id: u64, score: f64) -> Result<()> {
        if self.min_score.is_some_and(|min| score < min) {
            return Ok(());
        }

        self.total_hits += 1;
        self.queue.insert(GeoOnlyHit::new(doc_id, score));
        Ok(())
    }

    fn total_hits(&self) -> u64 {
        self.total_hits
    }
}
