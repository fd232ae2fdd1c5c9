//! Geometric primitives.
//!
//! Stateless helpers for great-circle distance, bearing, the cheap
//! degree-space distance used for zone thresholds, and nearest-point
//! search over a path. All coordinates use WGS84 (lat/lon in degrees).

use serde::{Deserialize, Serialize};

/// Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Meters per degree used for display and for the flat-Earth camera
/// projection. Degree-space distances are only a proxy for meters.
pub const METERS_PER_DEGREE: f64 = 111_000.0;

/// A geographic coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Anything that sits at a geographic position.
pub trait Located {
    fn position(&self) -> GeoPoint;
}

impl Located for GeoPoint {
    fn position(&self) -> GeoPoint {
        *self
    }
}

/// Result of a nearest-point search.
#[derive(Debug, Clone, Copy)]
pub struct Nearest<'a, T> {
    /// Index of the matched item in the searched slice.
    pub index: usize,
    pub item: &'a T,
    /// Planar distance in raw degrees.
    pub distance_deg: f64,
    /// `distance_deg` converted with [`METERS_PER_DEGREE`].
    pub distance_m: f64,
}

/// Haversine distance between two points in kilometers.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Initial bearing from `a` to `b` in degrees [0, 360), 0 = north.
pub fn bearing_deg(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();

    normalize_deg(y.atan2(x).to_degrees())
}

/// Wrap an angle into [0, 360).
pub fn normalize_deg(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Euclidean distance in raw degree space.
///
/// Not geodesic. At sub-kilometer scale it is a monotonic proxy for
/// meters, which is all the zone thresholds need.
pub fn planar_distance_deg(a: GeoPoint, b: GeoPoint) -> f64 {
    ((a.lat - b.lat).powi(2) + (a.lon - b.lon).powi(2)).sqrt()
}

/// Convert a degree-space distance to approximate meters.
pub fn deg_to_m(degrees: f64) -> f64 {
    degrees * METERS_PER_DEGREE
}

/// Exhaustive nearest-point scan.
///
/// Ties go to the first occurrence. Returns None for an empty path.
pub fn nearest_point<T: Located>(target: GeoPoint, path: &[T]) -> Option<Nearest<'_, T>> {
    let mut best: Option<Nearest<'_, T>> = None;

    for (index, item) in path.iter().enumerate() {
        let dist = planar_distance_deg(target, item.position());

        let is_better = match &best {
            Some(prev) => dist < prev.distance_deg,
            None => true,
        };

        if is_better {
            best = Some(Nearest {
                index,
                item,
                distance_deg: dist,
                distance_m: deg_to_m(dist),
            });
        }
    }

    best
}

/// Flat-Earth offset from `origin` to `target` in meters (east, north).
pub fn local_offset_m(origin: GeoPoint, target: GeoPoint) -> (f64, f64) {
    let dx = (target.lon - origin.lon) * METERS_PER_DEGREE * origin.lat.to_radians().cos();
    let dy = (target.lat - origin.lat) * METERS_PER_DEGREE;
    (dx, dy)
}

/// Signed change from one bearing to the next, in [-180, 180].
/// Positive means turning right.
pub fn bearing_change_deg(from: f64, to: f64) -> f64 {
    let mut angle = to - from;
    while angle > 180.0 {
        angle -= 360.0;
    }
    while angle < -180.0 {
        angle += 360.0;
    }
    angle
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint::new(lat, lon)
    }

    #[test]
    fn haversine_same_point_is_zero() {
        for p in [pt(25.4884, 51.4501), pt(-33.9, 151.2), pt(0.0, 0.0), pt(89.9, -179.9)] {
            assert_eq!(haversine_km(p, p), 0.0);
        }
    }

    #[test]
    fn haversine_known_distance() {
        // Vienna to Bratislava ~55 km
        let vienna = pt(48.2082, 16.3738);
        let bratislava = pt(48.1486, 17.1077);
        let dist = haversine_km(vienna, bratislava);
        assert!(dist > 50.0 && dist < 60.0, "Expected ~55 km, got {dist:.1} km");
    }

    #[test]
    fn haversine_is_symmetric() {
        let a = pt(25.4887, 51.4500);
        let b = pt(25.4933, 51.4478);
        assert!((haversine_km(a, b) - haversine_km(b, a)).abs() < 1e-12);
    }

    #[test]
    fn bearing_cardinal_directions() {
        let origin = pt(0.0, 0.0);
        assert!(bearing_deg(origin, pt(1.0, 0.0)).abs() < 0.1);
        assert!((bearing_deg(origin, pt(0.0, 1.0)) - 90.0).abs() < 0.1);
        assert!((bearing_deg(origin, pt(-1.0, 0.0)) - 180.0).abs() < 0.1);
        assert!((bearing_deg(origin, pt(0.0, -1.0)) - 270.0).abs() < 0.1);
    }

    #[test]
    fn bearing_stays_in_range() {
        let b = bearing_deg(pt(25.49, 51.45), pt(25.4899, 51.4499));
        assert!((0.0..360.0).contains(&b), "bearing out of range: {b}");
    }

    #[test]
    fn normalize_wraps_negative() {
        assert!((normalize_deg(-90.0) - 270.0).abs() < 1e-9);
        assert!((normalize_deg(720.0)).abs() < 1e-9);
        assert_eq!(normalize_deg(-1e-20), 0.0);
    }

    #[test]
    fn planar_distance_and_meters() {
        let d = planar_distance_deg(pt(0.0, 0.0), pt(0.0003, 0.0004));
        assert!((d - 0.0005).abs() < 1e-12);
        assert!((deg_to_m(d) - 55.5).abs() < 1e-6);
    }

    #[test]
    fn nearest_point_picks_closest() {
        let path = vec![pt(0.0, 0.0), pt(0.0, 0.001), pt(0.0, 0.002)];
        let hit = nearest_point(pt(0.0001, 0.0011), &path).unwrap();
        assert_eq!(hit.index, 1);
        assert!((hit.distance_m - deg_to_m(hit.distance_deg)).abs() < 1e-9);
    }

    #[test]
    fn nearest_point_tie_goes_to_first() {
        let path = vec![pt(0.0, -0.001), pt(0.0, 0.001)];
        let hit = nearest_point(pt(0.0, 0.0), &path).unwrap();
        assert_eq!(hit.index, 0);
    }

    #[test]
    fn nearest_point_empty_path() {
        let path: Vec<GeoPoint> = Vec::new();
        assert!(nearest_point(pt(0.0, 0.0), &path).is_none());
    }

    #[test]
    fn local_offset_east_and_north() {
        let (dx, dy) = local_offset_m(pt(0.0, 0.0), pt(0.0001, 0.0002));
        assert!((dx - 22.2).abs() < 1e-6, "dx = {dx}");
        assert!((dy - 11.1).abs() < 1e-6, "dy = {dy}");
    }

    #[test]
    fn bearing_change_wraps() {
        assert!((bearing_change_deg(350.0, 10.0) - 20.0).abs() < 1e-9);
        assert!((bearing_change_deg(10.0, 350.0) + 20.0).abs() < 1e-9);
        assert!((bearing_change_deg(0.0, 90.0) - 90.0).abs() < 1e-9);
    }
}
