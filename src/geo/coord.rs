//! Coordinate conversion between geographic and cartesian space.
//!
//! Geo points are stored as positions on the unit sphere so that range
//! pre-filtering can compare plain axis values. Distances are converted to
//! kilometres using [`EARTH_RADIUS_KM`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{GeoSearchError, Result};

/// Mean earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Kilometres per statute mile.
pub const KM_PER_MILE: f64 = 1.609344;

/// Slack added to every side of a bounding cube to absorb rounding in the
/// projection.
const CUBE_EPSILON: f64 = 1e-12;

/// Slack on the exact distance check, in kilometres. The same physical point
/// written with different coordinates (longitude 180 and -180, or any
/// longitude at a pole) projects a few ulps apart.
pub const DISTANCE_EPSILON_KM: f64 = 1e-9;

/// Check whether `latitude` lies in [-90, 90] degrees.
#[inline]
pub fn is_valid_latitude(latitude: f64) -> bool {
    (-90.0..=90.0).contains(&latitude)
}

/// Check whether `longitude` lies in [-180, 180] degrees.
#[inline]
pub fn is_valid_longitude(longitude: f64) -> bool {
    (-180.0..=180.0).contains(&longitude)
}

/// A validated (latitude, longitude) pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoCoordinate {
    latitude: f64,
    longitude: f64,
}

impl GeoCoordinate {
    /// Create a coordinate, rejecting out-of-domain or NaN values.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !is_valid_latitude(latitude) || !is_valid_longitude(longitude) {
            return Err(GeoSearchError::invalid_argument(format!(
                "bad latitude or longitude: {latitude}, {longitude}"
            )));
        }

        Ok(GeoCoordinate {
            latitude,
            longitude,
        })
    }

    /// Latitude in degrees.
    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Longitude in degrees.
    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Project onto the unit sphere.
    pub fn to_cartesian(&self) -> CartesianPoint {
        to_cartesian(self.latitude, self.longitude)
    }

    /// Haversine distance to another coordinate in kilometres.
    pub fn distance_km(&self, other: &GeoCoordinate) -> f64 {
        let lat1_rad = self.latitude.to_radians();
        let lat2_rad = other.latitude.to_radians();
        let delta_lat = (other.latitude - self.latitude).to_radians();
        let delta_lon = (other.longitude - self.longitude).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS_KM * c
    }
}

impl fmt::Display for GeoCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.latitude, self.longitude)
    }
}

/// A point in 3-D cartesian space. Projected coordinates lie on the unit sphere.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CartesianPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl CartesianPoint {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        CartesianPoint { x, y, z }
    }

    fn dot(&self, other: &CartesianPoint) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    fn cross_norm(&self, other: &CartesianPoint) -> f64 {
        let cx = self.y * other.z - self.z * other.y;
        let cy = self.z * other.x - self.x * other.z;
        let cz = self.x * other.y - self.y * other.x;
        (cx * cx + cy * cy + cz * cz).sqrt()
    }

    /// Central angle to `other` in radians.
    ///
    /// Uses `atan2(|a × b|, a · b)`, which stays accurate for both tiny and
    /// near-antipodal separations and is exactly zero for identical points.
    pub fn central_angle(&self, other: &CartesianPoint) -> f64 {
        self.cross_norm(other).atan2(self.dot(other))
    }

    /// Great-circle distance to `other` in kilometres.
    pub fn distance_km(&self, other: &CartesianPoint) -> f64 {
        Conversions::radians_to_km(self.central_angle(other))
    }
}

/// Spherical-to-cartesian projection on the unit sphere.
#[inline]
pub fn to_cartesian(latitude: f64, longitude: f64) -> CartesianPoint {
    let lat_rad = latitude.to_radians();
    let lon_rad = longitude.to_radians();
    let cos_lat = lat_rad.cos();

    CartesianPoint {
        x: cos_lat * lon_rad.cos(),
        y: cos_lat * lon_rad.sin(),
        z: lat_rad.sin(),
    }
}

/// Inverse of [`to_cartesian`]. The point does not need to be normalised.
///
/// At the poles the longitude is undefined and comes back as `0.0`.
pub fn from_cartesian(point: &CartesianPoint) -> Result<GeoCoordinate> {
    let norm = point.dot(point).sqrt();
    if !norm.is_finite() || norm == 0.0 {
        return Err(GeoSearchError::invalid_argument(format!(
            "cannot project degenerate point ({}, {}, {})",
            point.x, point.y, point.z
        )));
    }

    let latitude = (point.z / norm).clamp(-1.0, 1.0).asin().to_degrees();
    let longitude = if point.x == 0.0 && point.y == 0.0 {
        0.0
    } else {
        point.y.atan2(point.x).to_degrees()
    };

    GeoCoordinate::new(latitude, longitude)
}

/// Pure distance unit conversions.
#[derive(Debug)]
pub struct Conversions;

impl Conversions {
    /// Miles to kilometres.
    pub fn mi2km(miles: f32) -> f32 {
        (miles as f64 * KM_PER_MILE) as f32
    }

    /// Kilometres to miles.
    pub fn km2mi(km: f32) -> f32 {
        (km as f64 / KM_PER_MILE) as f32
    }

    /// Surface distance in kilometres to a central angle in radians.
    pub fn km_to_radians(km: f64) -> f64 {
        km / EARTH_RADIUS_KM
    }

    /// Central angle in radians to a surface distance in kilometres.
    pub fn radians_to_km(radians: f64) -> f64 {
        radians * EARTH_RADIUS_KM
    }

    /// Straight-line length through the unit sphere between two points that
    /// are `km` apart along the surface. Capped at the sphere's diameter.
    pub fn km_to_chord(km: f64) -> f64 {
        let angle = Self::km_to_radians(km).min(std::f64::consts::PI);
        2.0 * (angle / 2.0).sin()
    }
}

/// An axis-aligned box in cartesian space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingCube {
    pub min: CartesianPoint,
    pub max: CartesianPoint,
}

impl BoundingCube {
    /// Whether `point` lies inside the cube, faces included.
    #[inline]
    pub fn contains(&self, point: &CartesianPoint) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }
}

/// Cube containing every point of the sphere within `range_km` of `centroid`.
///
/// Any such point is at most one chord length away from the centroid in
/// straight-line distance, so it is also within one chord on every axis. The
/// cube therefore never loses a point, but admits false positives near its
/// corners that must be removed by an exact distance check.
pub fn bounding_cube(centroid: &CartesianPoint, range_km: f64) -> BoundingCube {
    let half_side = Conversions::km_to_chord(range_km.max(0.0)) + CUBE_EPSILON;

    BoundingCube {
        min: CartesianPoint::new(
            centroid.x - half_side,
            centroid.y - half_side,
            centroid.z - half_side,
        ),
        max: CartesianPoint::new(
            centroid.x + half_side,
            centroid.y + half_side,
            centroid.z + half_side,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_coordinate_validation() {
        let nyc = GeoCoordinate::new(40.7128, -74.0060).unwrap();
        assert_eq!(nyc.latitude(), 40.7128);
        assert_eq!(nyc.longitude(), -74.0060);

        assert!(GeoCoordinate::new(90.0, 180.0).is_ok());
        assert!(GeoCoordinate::new(-90.0, -180.0).is_ok());
        assert!(GeoCoordinate::new(91.0, 0.0).unwrap_err().is_invalid_argument());
        assert!(GeoCoordinate::new(0.0, 181.0).unwrap_err().is_invalid_argument());
        assert!(GeoCoordinate::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_projection_axes() {
        let origin = to_cartesian(0.0, 0.0);
        assert!((origin.x - 1.0).abs() < 1e-12);
        assert!(origin.y.abs() < 1e-12);
        assert!(origin.z.abs() < 1e-12);

        let north_pole = to_cartesian(90.0, 0.0);
        assert!((north_pole.z - 1.0).abs() < 1e-12);

        let east = to_cartesian(0.0, 90.0);
        assert!((east.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_round_trip() {
        let mut rng = rand::rng();
        for _ in 0..1000 {
            let lat = rng.random_range(-89.9..=89.9);
            let lon = rng.random_range(-179.9..=179.9);

            let back = from_cartesian(&to_cartesian(lat, lon)).unwrap();
            assert!((back.latitude() - lat).abs() < 1e-9, "lat {lat} -> {back}");
            assert!((back.longitude() - lon).abs() < 1e-9, "lon {lon} -> {back}");
        }

        let pole = from_cartesian(&to_cartesian(90.0, 45.0)).unwrap();
        assert!((pole.latitude() - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_from_cartesian_rejects_origin() {
        assert!(from_cartesian(&CartesianPoint::new(0.0, 0.0, 0.0)).is_err());
    }

    #[test]
    fn test_distance_agrees_with_haversine() {
        let nyc = GeoCoordinate::new(40.7128, -74.0060).unwrap();
        let la = GeoCoordinate::new(34.0522, -118.2437).unwrap();

        let haversine = nyc.distance_km(&la);
        let cartesian = nyc.to_cartesian().distance_km(&la.to_cartesian());

        // NYC to LA is roughly 3,944 km.
        assert!((haversine - 3944.0).abs() < 100.0);
        assert!((haversine - cartesian).abs() < 1e-6);
        assert_eq!(nyc.to_cartesian().distance_km(&nyc.to_cartesian()), 0.0);
    }

    #[test]
    fn test_unit_conversions() {
        assert!((Conversions::mi2km(500.0) - 804.672).abs() < 1e-3);
        assert!((Conversions::km2mi(Conversions::mi2km(123.0)) - 123.0).abs() < 1e-4);
        assert!((Conversions::radians_to_km(Conversions::km_to_radians(42.0)) - 42.0).abs() < 1e-12);
        assert_eq!(Conversions::km_to_chord(0.0), 0.0);
        assert!((Conversions::km_to_chord(1e9) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_bounding_cube_contains_spherical_cap() {
        let mut rng = rand::rng();
        for _ in 0..200 {
            let center = GeoCoordinate::new(
                rng.random_range(-90.0..=90.0),
                rng.random_range(-180.0..=180.0),
            )
            .unwrap();
            let range_km = rng.random_range(0.0..3000.0);
            let cube = bounding_cube(&center.to_cartesian(), range_km);

            for _ in 0..50 {
                let other = GeoCoordinate::new(
                    rng.random_range(-90.0..=90.0),
                    rng.random_range(-180.0..=180.0),
                )
                .unwrap();
                let point = other.to_cartesian();
                if center.to_cartesian().distance_km(&point) <= range_km {
                    assert!(cube.contains(&point), "{other} within {range_km} of {center}");
                }
            }
        }
    }

    #[test]
    fn test_zero_range_cube_holds_centroid() {
        let center = to_cartesian(12.5, -33.25);
        let cube = bounding_cube(&center, 0.0);
        assert!(cube.contains(&center));
        assert!(!cube.contains(&to_cartesian(12.5, -33.2)));
    }
}
