//! Geospatial primitives: coordinate projection, the stored record format
//! and per-segment geo files.

pub mod coord;
pub mod record;
pub mod segment;

pub use coord::{BoundingCube, CartesianPoint, Conversions, DISTANCE_EPSILON_KM, EARTH_RADIUS_KM, GeoCoordinate};
pub use record::{
    CartesianGeoRecord, CartesianGeoRecordCodec, CartesianGeoRecordComparator, GeoRecordCodec,
    GeoRecordComparator,
};
pub use segment::{GeoRecordIterator, GeoRecordRange, GeoSegmentReader, GeoSegmentWriter};
