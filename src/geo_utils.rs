//! Geographic utilities: great-circle distance, unit conversion, bounds.

use crate::{Bounds, GeoPoint};

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Meters per statute mile.
pub const METERS_PER_MILE: f64 = 1_609.344;

/// Feet per meter.
pub const FEET_PER_METER: f64 = 3.280839895;

/// Great-circle distance between two points in meters (haversine formula).
///
/// # Example
/// ```
/// use outdoor_atlas::GeoPoint;
/// use outdoor_atlas::geo_utils::haversine_distance;
///
/// let denver = GeoPoint::new(39.7392, -104.9903);
/// let boulder = GeoPoint::new(40.0150, -105.2705);
/// let d = haversine_distance(&denver, &boulder);
/// assert!(d > 35_000.0 && d < 40_000.0);
/// ```
pub fn haversine_distance(p1: &GeoPoint, p2: &GeoPoint) -> f64 {
    let lat1 = p1.latitude.to_radians();
    let lat2 = p2.latitude.to_radians();
    let dlat = (p2.latitude - p1.latitude).to_radians();
    let dlng = (p2.longitude - p1.longitude).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Great-circle distance between two points in statute miles.
pub fn haversine_miles(p1: &GeoPoint, p2: &GeoPoint) -> f64 {
    haversine_distance(p1, p2) / METERS_PER_MILE
}

/// Convert meters to feet.
pub fn meters_to_feet(meters: f64) -> f64 {
    meters * FEET_PER_METER
}

/// Round to two decimal places, the precision distances are displayed with.
pub fn round_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Total length of a polyline in meters.
pub fn polyline_length(points: &[GeoPoint]) -> f64 {
    points
        .windows(2)
        .map(|pair| haversine_distance(&pair[0], &pair[1]))
        .sum()
}

/// Compute bounds of a point set. Returns `None` for an empty slice.
pub fn compute_bounds(points: &[GeoPoint]) -> Option<Bounds> {
    Bounds::from_points(points)
}

/// Arithmetic mean of a point set in degree space.
pub fn compute_center(points: &[GeoPoint]) -> Option<GeoPoint> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (lat_sum, lng_sum) = points
        .iter()
        .fold((0.0, 0.0), |(lat, lng), p| (lat + p.latitude, lng + p.longitude));
    Some(GeoPoint::new(lat_sum / n, lng_sum / n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_zero() {
        let p = GeoPoint::new(39.0, -105.78);
        assert_eq!(haversine_distance(&p, &p), 0.0);
    }

    #[test]
    fn test_haversine_one_degree_latitude() {
        let a = GeoPoint::new(39.0, -105.0);
        let b = GeoPoint::new(40.0, -105.0);
        let miles = haversine_miles(&a, &b);
        // One degree of latitude is ~69.1 miles
        assert!((miles - 69.1).abs() < 0.2, "got {}", miles);
    }

    #[test]
    fn test_haversine_symmetric() {
        let a = GeoPoint::new(39.0, -105.78);
        let b = GeoPoint::new(39.5, -106.2);
        assert!((haversine_distance(&a, &b) - haversine_distance(&b, &a)).abs() < 1e-9);
    }

    #[test]
    fn test_round_hundredths() {
        assert_eq!(round_hundredths(1.23456), 1.23);
        assert_eq!(round_hundredths(9.999), 10.0);
    }

    #[test]
    fn test_meters_to_feet() {
        assert!((meters_to_feet(1000.0) - 3280.839895).abs() < 1e-6);
    }

    #[test]
    fn test_center_and_bounds() {
        let pts = vec![GeoPoint::new(39.0, -106.0), GeoPoint::new(40.0, -105.0)];
        let c = compute_center(&pts).unwrap();
        assert_eq!(c, GeoPoint::new(39.5, -105.5));
        let b = compute_bounds(&pts).unwrap();
        assert_eq!(b.min_lat, 39.0);
        assert_eq!(b.max_lng, -105.0);
        assert!(compute_center(&[]).is_none());
    }

    #[test]
    fn test_polyline_length() {
        let pts = vec![
            GeoPoint::new(39.0, -105.0),
            GeoPoint::new(39.01, -105.0),
            GeoPoint::new(39.02, -105.0),
        ];
        let total = polyline_length(&pts);
        let direct = haversine_distance(&pts[0], &pts[2]);
        assert!((total - direct).abs() < 1e-6);
        assert_eq!(polyline_length(&pts[..1]), 0.0);
    }
}
