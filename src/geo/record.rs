//! Cartesian geo records and their binary codec.

use std::cmp::Ordering;
use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use crate::geo::coord::{CartesianPoint, GeoCoordinate};

/// One indexed location of one document, projected onto the unit sphere.
///
/// A document with several locations owns several records sharing the same
/// `doc_id`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CartesianGeoRecord {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub doc_id: u32,
}

impl CartesianGeoRecord {
    pub fn new(x: f64, y: f64, z: f64, doc_id: u32) -> Self {
        CartesianGeoRecord { x, y, z, doc_id }
    }

    /// Record for a validated coordinate.
    pub fn from_coordinate(coordinate: &GeoCoordinate, doc_id: u32) -> Self {
        Self::from_point(&coordinate.to_cartesian(), doc_id)
    }

    pub fn from_point(point: &CartesianPoint, doc_id: u32) -> Self {
        CartesianGeoRecord {
            x: point.x,
            y: point.y,
            z: point.z,
            doc_id,
        }
    }

    /// The projected position.
    pub fn point(&self) -> CartesianPoint {
        CartesianPoint::new(self.x, self.y, self.z)
    }

    /// Smallest record at `point` under [`CartesianGeoRecordComparator`].
    pub fn lower_bound(point: &CartesianPoint) -> Self {
        Self::from_point(point, 0)
    }

    /// Largest record at `point` under [`CartesianGeoRecordComparator`].
    pub fn upper_bound(point: &CartesianPoint) -> Self {
        Self::from_point(point, u32::MAX)
    }
}

/// Fixed-width binary encoding of a record type.
pub trait GeoRecordCodec<R>: Send + Sync + std::fmt::Debug {
    /// Encoded width of one record in bytes.
    fn record_size(&self) -> usize;

    fn write_record(&self, writer: &mut dyn Write, record: &R) -> io::Result<()>;

    fn read_record(&self, reader: &mut dyn Read) -> io::Result<R>;
}

/// Total order over a record type. Segment files are sorted by it.
pub trait GeoRecordComparator<R>: Send + Sync + std::fmt::Debug {
    fn compare(&self, a: &R, b: &R) -> Ordering;
}

/// Little-endian `x, y, z` as f64 followed by `doc_id` as u32.
#[derive(Debug, Clone, Copy, Default)]
pub struct CartesianGeoRecordCodec;

impl CartesianGeoRecordCodec {
    pub const RECORD_SIZE: usize = 3 * 8 + 4;
}

impl GeoRecordCodec<CartesianGeoRecord> for CartesianGeoRecordCodec {
    fn record_size(&self) -> usize {
        Self::RECORD_SIZE
    }

    fn write_record(&self, writer: &mut dyn Write, record: &CartesianGeoRecord) -> io::Result<()> {
        writer.write_f64::<LittleEndian>(record.x)?;
        writer.write_f64::<LittleEndian>(record.y)?;
        writer.write_f64::<LittleEndian>(record.z)?;
        writer.write_u32::<LittleEndian>(record.doc_id)?;
        Ok(())
    }

    fn read_record(&self, reader: &mut dyn Read) -> io::Result<CartesianGeoRecord> {
        let x = reader.read_f64::<LittleEndian>()?;
        let y = reader.read_f64::<LittleEndian>()?;
        let z = reader.read_f64::<LittleEndian>()?;
        let doc_id = reader.read_u32::<LittleEndian>()?;
        Ok(CartesianGeoRecord { x, y, z, doc_id })
    }
}

/// Lexicographic order on `x`, then `y`, then `z`, then `doc_id`.
///
/// Axis values use [`f64::total_cmp`], so the order is total even for
/// `-0.0` and NaN.
#[derive(Debug, Clone, Copy, Default)]
pub struct CartesianGeoRecordComparator;

impl GeoRecordComparator<CartesianGeoRecord> for CartesianGeoRecordComparator {
    fn compare(&self, a: &CartesianGeoRecord, b: &CartesianGeoRecord) -> Ordering {
        a.x.total_cmp(&b.x)
            .then_with(|| a.y.total_cmp(&b.y))
            .then_with(|| a.z.total_cmp(&b.z))
            .then_with(|| a.doc_id.cmp(&b.doc_id))
    }
}
