//! Per-segment geo files.
//!
//! Each segment stores all location records of one geo field in a single
//! file named `<segment>_<field>.geo`. Records are fixed width and sorted by
//! the field's comparator, which lets the reader binary-search the start of
//! a range and then stream forward.

use std::cmp::Ordering;
use std::io::{Seek, SeekFrom};
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::error::{GeoSearchError, Result};
use crate::geo::record::{GeoRecordCodec, GeoRecordComparator};
use crate::storage::{Storage, StorageInput};

/// File extension of segment geo files.
pub const GEO_FILE_EXTENSION: &str = "geo";

/// Name of the geo file for `field_name` in `segment_name`.
pub fn geo_file_name(segment_name: &str, field_name: &str) -> String {
    format!("{segment_name}_{field_name}.{GEO_FILE_EXTENSION}")
}

/// Iteration over a contiguous, sorted range of records.
pub trait GeoRecordIterator<R>: Send + Sync {
    /// All stored records `r` with `min_value <= r <= max_value`, in
    /// ascending order. Empty when `min_value > max_value`.
    fn iter_range(&self, min_value: &R, max_value: &R) -> Result<Box<dyn Iterator<Item = Result<R>> + Send>>;
}

fn read_record_at<R>(
    input: &mut Box<dyn StorageInput>,
    codec: &dyn GeoRecordCodec<R>,
    index: usize,
) -> Result<R> {
    let offset = (index * codec.record_size()) as u64;
    input.seek(SeekFrom::Start(offset))?;
    Ok(codec.read_record(input)?)
}

/// Buffers records of one segment and writes them out sorted.
#[derive(Debug)]
pub struct GeoSegmentWriter<R> {
    codec: Arc<dyn GeoRecordCodec<R>>,
    comparator: Arc<dyn GeoRecordComparator<R>>,
    records: Vec<R>,
}

impl<R> GeoSegmentWriter<R> {
    pub fn new(codec: Arc<dyn GeoRecordCodec<R>>, comparator: Arc<dyn GeoRecordComparator<R>>) -> Self {
        GeoSegmentWriter {
            codec,
            comparator,
            records: Vec::new(),
        }
    }

    pub fn add(&mut self, record: R) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sort the buffered records and write them to `file_name`.
    ///
    /// Returns the number of records written. The buffer is emptied.
    pub fn write(&mut self, storage: &dyn Storage, file_name: &str) -> Result<usize> {
        let comparator = Arc::clone(&self.comparator);
        self.records.sort_by(|a, b| comparator.compare(a, b));

        let mut output = storage.create_output(file_name)?;
        for record in &self.records {
            self.codec.write_record(&mut output, record)?;
        }
        output.flush_and_sync()?;
        output.close()?;

        let count = self.records.len();
        self.records.clear();
        debug!("Wrote {count} geo records to {file_name}");

        Ok(count)
    }
}

/// Random and range access to one segment's geo file.
#[derive(Debug)]
pub struct GeoSegmentReader<R> {
    file_name: String,
    field_name: String,
    max_doc: u32,
    len: usize,
    input: Mutex<Box<dyn StorageInput>>,
    codec: Arc<dyn GeoRecordCodec<R>>,
    comparator: Arc<dyn GeoRecordComparator<R>>,
}

impl<R> GeoSegmentReader<R> {
    /// Open a geo file and check that it holds exactly `record_count`
    /// records.
    pub fn load(
        storage: &dyn Storage,
        file_name: &str,
        field_name: &str,
        max_doc: u32,
        record_count: usize,
        codec: Arc<dyn GeoRecordCodec<R>>,
        comparator: Arc<dyn GeoRecordComparator<R>>,
    ) -> Result<Self> {
        let reader = Self::open(storage, file_name, field_name, max_doc, codec, comparator)?;
        if reader.len != record_count {
            return Err(GeoSearchError::storage(format!(
                "{file_name} holds {} records, expected {record_count}",
                reader.len
            )));
        }
        Ok(reader)
    }

    /// Open a geo file, deriving the record count from its size.
    pub fn open(
        storage: &dyn Storage,
        file_name: &str,
        field_name: &str,
        max_doc: u32,
        codec: Arc<dyn GeoRecordCodec<R>>,
        comparator: Arc<dyn GeoRecordComparator<R>>,
    ) -> Result<Self> {
        if !storage.file_exists(file_name) {
            return Err(GeoSearchError::storage(format!(
                "missing geo file {file_name} for field {field_name}"
            )));
        }

        let input = storage.open_input(file_name)?;
        let size = input.size()?;
        let record_size = codec.record_size() as u64;
        if record_size == 0 || size % record_size != 0 {
            return Err(GeoSearchError::storage(format!(
                "{file_name} is {size} bytes, not a multiple of the {record_size}-byte record size"
            )));
        }

        Ok(GeoSegmentReader {
            file_name: file_name.to_string(),
            field_name: field_name.to_string(),
            max_doc,
            len: (size / record_size) as usize,
            input: Mutex::new(input),
            codec,
            comparator,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// Number of documents in the segment, not the number of records.
    pub fn max_doc(&self) -> u32 {
        self.max_doc
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The record at `index` in sorted order.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    pub fn get(&self, index: usize) -> Result<R> {
        assert!(
            index < self.len,
            "record index {index} out of bounds for {} ({} records)",
            self.file_name,
            self.len
        );

        let mut input = self.input.lock();
        read_record_at(&mut *input, self.codec.as_ref(), index)
    }

    /// Index of the first record not less than `min_value`, or `len()`.
    fn lower_bound(&self, input: &mut Box<dyn StorageInput>, min_value: &R) -> Result<usize> {
        let mut lo = 0;
        let mut hi = self.len;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let record = read_record_at(input, self.codec.as_ref(), mid)?;
            if self.comparator.compare(&record, min_value) == Ordering::Less {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        Ok(lo)
    }
}

impl<R> GeoSegmentReader<R>
where
    R: Clone + Send + 'static,
{
    /// Records in `[min_value, max_value]`, ascending.
    ///
    /// The iterator reads through its own handle on the file, so any number
    /// of iterators can run against one reader at the same time.
    pub fn range(&self, min_value: &R, max_value: &R) -> Result<GeoRecordRange<R>> {
        let mut input = self.input.lock().clone_input()?;

        let empty = self.comparator.compare(min_value, max_value) == Ordering::Greater;
        let start = if empty {
            self.len
        } else {
            self.lower_bound(&mut input, min_value)?
        };

        if start < self.len {
            input.seek(SeekFrom::Start((start * self.codec.record_size()) as u64))?;
        }

        Ok(GeoRecordRange {
            input,
            codec: Arc::clone(&self.codec),
            comparator: Arc::clone(&self.comparator),
            max_value: max_value.clone(),
            next_index: start,
            len: self.len,
            done: start >= self.len,
        })
    }
}

impl<R> GeoRecordIterator<R> for GeoSegmentReader<R>
where
    R: Clone + Send + Sync + 'static,
{
    fn iter_range(&self, min_value: &R, max_value: &R) -> Result<Box<dyn Iterator<Item = Result<R>> + Send>> {
        Ok(Box::new(self.range(min_value, max_value)?))
    }
}

/// Forward iterator over a sorted record range.
///
/// Stops at the first record greater than the upper bound, at the end of the
/// file, or after yielding a read error.
#[derive(Debug)]
pub struct GeoRecordRange<R> {
    input: Box<dyn StorageInput>,
    codec: Arc<dyn GeoRecordCodec<R>>,
    comparator: Arc<dyn GeoRecordComparator<R>>,
    max_value: R,
    next_index: usize,
    len: usize,
    done: bool,
}

impl<R> Iterator for GeoRecordRange<R> {
    type Item = Result<R>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.next_index >= self.len {
            self.done = true;
            return None;
        }

        let record = match self.codec.read_record(&mut self.input) {
            Ok(record) => record,
            Err(e) => {
                self.done = true;
                return Some(Err(e.into()));
            }
        };

        if self.comparator.compare(&record, &self.max_value) == Ordering::Greater {
            self.done = true;
            return None;
        }

        self.next_index += 1;
        Some(Ok(record))
    }
}
