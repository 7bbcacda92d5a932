//! # Geographic Utilities
//!
//! Core geographic computations shared by the pipeline components.
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two points |
//! | [`linestring_length`] | Total length of a `(lon, lat)` coordinate sequence |
//! | [`compute_center`] | Centroid of a set of points |
//!
//! All functions expect WGS84 coordinates (degrees), the standard used by GPS
//! receivers and mapping services.

use crate::GeoPoint;
use geo::{Distance, Haversine, Point};

/// Calculate the great-circle distance between two points using the Haversine
/// formula, in meters.
///
/// # Example
///
/// ```rust
/// use trace_fusion::{geo_utils, GeoPoint};
///
/// let london = GeoPoint::new(51.5074, -0.1278);
/// let paris = GeoPoint::new(48.8566, 2.3522);
///
/// let distance = geo_utils::haversine_distance(&london, &paris);
/// assert!((distance - 343_560.0).abs() < 1000.0); // ~344 km
/// ```
#[inline]
pub fn haversine_distance(p1: &GeoPoint, p2: &GeoPoint) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2)
}

/// Total length in meters of a sequence of `(longitude, latitude)` pairs.
///
/// Empty or single-coordinate sequences return 0.0.
pub fn linestring_length(coordinates: &[[f64; 2]]) -> f64 {
    if coordinates.len() < 2 {
        return 0.0;
    }

    coordinates
        .windows(2)
        .map(|w| {
            haversine_distance(
                &GeoPoint::new(w[0][1], w[0][0]),
                &GeoPoint::new(w[1][1], w[1][0]),
            )
        })
        .sum()
}

/// Arithmetic-mean centroid of a set of points.
///
/// Suitable for small geographic areas; tracks crossing the antimeridian
/// would need a spherical centroid instead. Returns (0, 0) for empty input.
pub fn compute_center(points: &[GeoPoint]) -> GeoPoint {
    if points.is_empty() {
        return GeoPoint::new(0.0, 0.0);
    }

    let sum_lat: f64 = points.iter().map(|p| p.latitude).sum();
    let sum_lng: f64 = points.iter().map(|p| p.longitude).sum();
    let n = points.len() as f64;

    GeoPoint::new(sum_lat / n, sum_lng / n)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    #[test]
    fn test_haversine_distance_same_point() {
        let p = GeoPoint::new(51.5074, -0.1278);
        assert_eq!(haversine_distance(&p, &p), 0.0);
    }

    #[test]
    fn test_haversine_distance_known_value() {
        // London to Paris is approximately 344 km
        let london = GeoPoint::new(51.5074, -0.1278);
        let paris = GeoPoint::new(48.8566, 2.3522);
        let dist = haversine_distance(&london, &paris);
        assert!(approx_eq(dist, 343_560.0, 5000.0));
    }

    #[test]
    fn test_linestring_length_empty() {
        assert_eq!(linestring_length(&[]), 0.0);
        assert_eq!(linestring_length(&[[-0.1278, 51.5074]]), 0.0);
    }

    #[test]
    fn test_linestring_length_two_points() {
        let line = [[-0.1278, 51.5074], [-0.1280, 51.5080]];
        let length = linestring_length(&line);
        assert!(length > 0.0);
        assert!(length < 100.0); // about 68m
    }

    #[test]
    fn test_compute_center() {
        let points = vec![GeoPoint::new(51.50, -0.10), GeoPoint::new(51.52, -0.12)];
        let center = compute_center(&points);
        assert!(approx_eq(center.latitude, 51.51, 0.001));
        assert!(approx_eq(center.longitude, -0.11, 0.001));
    }

    #[test]
    fn test_compute_center_empty() {
        let center = compute_center(&[]);
        assert_eq!(center.latitude, 0.0);
        assert_eq!(center.longitude, 0.0);
    }
}
