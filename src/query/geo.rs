//! Geo range query: every document with a location within a radius of a
//! centroid, scored by proximity.
//!
//! Matching runs in two phases. The bounding cube of the search cap selects a
//! contiguous run of sorted records and then drops those outside the cube on
//! the other axes. The survivors are checked against the exact great-circle
//! distance, since the cube always admits some points near its corners that
//! lie outside the cap.

use std::collections::BTreeMap;
use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{GeoSearchError, Result};
use crate::geo::coord::{
    BoundingCube, CartesianPoint, Conversions, DISTANCE_EPSILON_KM, GeoCoordinate, bounding_cube,
};
use crate::geo::record::CartesianGeoRecord;
use crate::geo::segment::GeoRecordIterator;
use crate::query::{NO_MORE_DOCS, Query, Scorer, Weight};

/// Finds documents located within `range_in_km` of a centroid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeoQuery {
    field: String,
    centroid: GeoCoordinate,
    range_in_km: f32,
    boost: f32,
}

impl GeoQuery {
    /// Create a validated query.
    ///
    /// Fails if the centroid is outside the valid latitude/longitude domain
    /// or if the range is negative or not finite.
    pub fn new<F: Into<String>>(
        field: F,
        centroid_latitude: f64,
        centroid_longitude: f64,
        range_in_km: f32,
    ) -> Result<Self> {
        let field = field.into();
        if field.is_empty() {
            return Err(GeoSearchError::invalid_argument("field name must not be empty"));
        }

        let centroid = GeoCoordinate::new(centroid_latitude, centroid_longitude)?;

        if !range_in_km.is_finite() || range_in_km < 0.0 {
            return Err(GeoSearchError::invalid_argument(format!(
                "rangeInKm must be a non-negative number, got {range_in_km}"
            )));
        }

        Ok(GeoQuery {
            field,
            centroid,
            range_in_km,
            boost: 1.0,
        })
    }

    /// Start building a query on `field`.
    pub fn builder<F: Into<String>>(field: F) -> GeoQueryBuilder {
        GeoQueryBuilder::new(field)
    }

    /// Set the boost factor.
    ///
    /// Fails with `InvalidArgument` unless `boost` is finite and positive.
    pub fn with_boost(mut self, boost: f32) -> Result<Self> {
        self.boost = validate_boost(boost)?;
        Ok(self)
    }

    pub fn centroid(&self) -> &GeoCoordinate {
        &self.centroid
    }

    pub fn centroid_latitude(&self) -> f64 {
        self.centroid.latitude()
    }

    pub fn centroid_longitude(&self) -> f64 {
        self.centroid.longitude()
    }

    pub fn range_in_km(&self) -> f32 {
        self.range_in_km
    }

    /// Build the weight without boxing it.
    pub fn geo_weight(&self) -> GeoWeight {
        GeoWeight::new(self)
    }
}

impl fmt::Display for GeoQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GeoQuery [centroidLatitude={:?}, centroidLongitude={:?}, rangeInKm ={:?}]",
            self.centroid.latitude(),
            self.centroid.longitude(),
            self.range_in_km
        )
    }
}

impl Query for GeoQuery {
    fn weight(&self) -> Result<Box<dyn Weight>> {
        Ok(Box::new(self.geo_weight()))
    }

    fn boost(&self) -> f32 {
        self.boost
    }

    fn set_boost(&mut self, boost: f32) -> Result<()> {
        self.boost = validate_boost(boost)?;
        Ok(())
    }

    fn description(&self) -> String {
        format!("{}: {}", self.field, self)
    }

    fn clone_box(&self) -> Box<dyn Query> {
        Box::new(self.clone())
    }

    fn field(&self) -> &str {
        &self.field
    }
}

/// Builder for [`GeoQuery`]. Validation happens in [`GeoQueryBuilder::build`].
#[derive(Debug, Clone, Default)]
pub struct GeoQueryBuilder {
    field: String,
    centroid: Option<(f64, f64)>,
    range_in_km: Option<f32>,
    boost: Option<f32>,
}

impl GeoQueryBuilder {
    pub fn new<F: Into<String>>(field: F) -> Self {
        GeoQueryBuilder {
            field: field.into(),
            ..Default::default()
        }
    }

    pub fn centroid(mut self, latitude: f64, longitude: f64) -> Self {
        self.centroid = Some((latitude, longitude));
        self
    }

    pub fn range_in_km(mut self, range_in_km: f32) -> Self {
        self.range_in_km = Some(range_in_km);
        self
    }

    pub fn range_in_miles(mut self, range_in_miles: f32) -> Self {
        self.range_in_km = Some(Conversions::mi2km(range_in_miles));
        self
    }

    pub fn boost(mut self, boost: f32) -> Self {
        self.boost = Some(boost);
        self
    }

    pub fn build(self) -> Result<GeoQuery> {
        let (latitude, longitude) = self
            .centroid
            .ok_or_else(|| GeoSearchError::invalid_argument("centroid is required"))?;
        let range_in_km = self
            .range_in_km
            .ok_or_else(|| GeoSearchError::invalid_argument("rangeInKm is required"))?;

        let query = GeoQuery::new(self.field, latitude, longitude, range_in_km)?;
        match self.boost {
            Some(boost) => query.with_boost(boost),
            None => Ok(query),
        }
    }
}

/// A boost scales every score, so it must keep scores finite and ordered.
fn validate_boost(boost: f32) -> Result<f32> {
    if !boost.is_finite() || boost <= 0.0 {
        return Err(GeoSearchError::invalid_argument(format!(
            "boost must be a finite positive number, got {boost}"
        )));
    }
    Ok(boost)
}

/// Geometry of one query execution, computed once and shared by every
/// segment.
#[derive(Debug, Clone)]
pub struct GeoWeight {
    field: String,
    centroid: CartesianPoint,
    range_in_km: f64,
    boost: f64,
    cube: BoundingCube,
}

impl GeoWeight {
    pub fn new(query: &GeoQuery) -> Self {
        let centroid = query.centroid.to_cartesian();
        let range_in_km = query.range_in_km as f64;

        GeoWeight {
            field: query.field.clone(),
            centroid,
            range_in_km,
            boost: query.boost as f64,
            cube: bounding_cube(&centroid, range_in_km),
        }
    }

    pub fn bounding_cube(&self) -> &BoundingCube {
        &self.cube
    }

    /// Smallest and largest record keys a segment scan has to cover.
    pub fn record_bounds(&self) -> (CartesianGeoRecord, CartesianGeoRecord) {
        (
            CartesianGeoRecord::lower_bound(&self.cube.min),
            CartesianGeoRecord::upper_bound(&self.cube.max),
        )
    }

    /// Phase one: whether `record` lies inside the bounding cube.
    ///
    /// Never rejects a record that lies within the range.
    pub fn within_cube(&self, record: &CartesianGeoRecord) -> bool {
        self.cube.contains(&record.point())
    }

    /// Phase two: exact distance from the centroid if `record` lies within
    /// the range, allowing [`DISTANCE_EPSILON_KM`] of rounding.
    pub fn exact_distance(&self, record: &CartesianGeoRecord) -> Option<f64> {
        let distance = self.centroid.distance_km(&record.point());
        (distance <= self.range_in_km + DISTANCE_EPSILON_KM).then_some(distance)
    }

    /// Score for a match at `distance_km`. Strictly decreasing in distance.
    pub fn score(&self, distance_km: f64) -> f64 {
        self.boost / (1.0 + distance_km)
    }

    /// Run both phases over one segment, keeping the closest location of
    /// each document.
    pub fn find_matches(&self, segment: &dyn GeoRecordIterator<CartesianGeoRecord>) -> Result<Vec<GeoMatch>> {
        let (min_record, max_record) = self.record_bounds();

        let mut scanned = 0usize;
        let mut in_cube = 0usize;
        let mut best: BTreeMap<u32, f64> = BTreeMap::new();

        for record in segment.iter_range(&min_record, &max_record)? {
            let record = record?;
            scanned += 1;

            if !self.within_cube(&record) {
                continue;
            }
            in_cube += 1;

            if let Some(distance) = self.exact_distance(&record) {
                best.entry(record.doc_id)
                    .and_modify(|d| *d = d.min(distance))
                    .or_insert(distance);
            }
        }

        debug!(
            "{}: scanned {scanned} records, {in_cube} in cube, {} documents within {} km",
            self.field,
            best.len(),
            self.range_in_km
        );

        Ok(best
            .into_iter()
            .map(|(doc_id, distance_km)| GeoMatch {
                doc_id,
                distance_km,
                score: self.score(distance_km),
            })
            .collect())
    }
}

impl Weight for GeoWeight {
    fn scorer(&self, segment: &dyn GeoRecordIterator<CartesianGeoRecord>) -> Result<Box<dyn Scorer>> {
        Ok(Box::new(GeoScorer::new(self.find_matches(segment)?)))
    }

    fn field(&self) -> &str {
        &self.field
    }
}

/// A document accepted by a geo query in one segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoMatch {
    /// Segment-local document id
    pub doc_id: u32,
    /// Distance of the document's closest location to the centroid
    pub distance_km: f64,
    pub score: f64,
}

/// Scorer over the matches of one segment, in ascending doc id order.
#[derive(Debug)]
pub struct GeoScorer {
    matches: Vec<GeoMatch>,
    current_index: usize,
}

impl GeoScorer {
    /// Create a scorer over `matches`, which may be in any order.
    pub fn new(mut matches: Vec<GeoMatch>) -> Self {
        matches.sort_by_key(|m| m.doc_id);
        GeoScorer {
            matches,
            current_index: 0,
        }
    }

    /// All matches, by doc id.
    pub fn matches(&self) -> &[GeoMatch] {
        &self.matches
    }

    /// Distance of the current document, if positioned on one.
    pub fn distance_km(&self) -> Option<f64> {
        self.matches.get(self.current_index).map(|m| m.distance_km)
    }
}

impl Scorer for GeoScorer {
    fn doc_id(&self) -> u32 {
        self.matches
            .get(self.current_index)
            .map_or(NO_MORE_DOCS, |m| m.doc_id)
    }

    fn next(&mut self) -> Result<bool> {
        if self.current_index < self.matches.len() {
            self.current_index += 1;
        }
        Ok(!self.is_exhausted())
    }

    fn skip_to(&mut self, target: u32) -> Result<bool> {
        while self
            .matches
            .get(self.current_index)
            .is_some_and(|m| m.doc_id < target)
        {
            self.current_index += 1;
        }
        Ok(!self.is_exhausted())
    }

    fn score(&self) -> f64 {
        self.matches
            .get(self.current_index)
            .map_or(0.0, |m| m.score)
    }

    fn cost(&self) -> u64 {
        self.matches.len() as u64
    }

    fn is_exhausted(&self) -> bool {
        self.current_index >= self.matches.len()
    }
}
