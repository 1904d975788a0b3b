//! WGS84 <-> GCJ02 bias correction.
//!
//! The inverse is not analytic: it applies the forward offset to the
//! obfuscated point and reflects (`2 * input - forward`). This matches the
//! encoding the search API itself uses and must not be replaced by an
//! iterative inverse.

use std::f64::consts::PI;

/// Semi-major axis used by the obfuscation (Krasovsky, not WGS84)
const A: f64 = 6378245.0;
/// Eccentricity squared
const EE: f64 = 0.006_693_421_622_965_943_23;

/// True when the point falls outside the fixed China bounding box.
///
/// Applies to WGS84, GCJ02 and BD09LL alike.
pub fn outside_of_china(lng: f64, lat: f64) -> bool {
    if lng < 72.004 || lng > 137.8347 {
        return true;
    }
    if lat < 0.8293 || lat > 55.8271 {
        return true;
    }
    false
}

pub fn wgs84_to_gcj02(lng: f64, lat: f64) -> (f64, f64) {
    if outside_of_china(lng, lat) {
        return (lng, lat);
    }
    shifted(lng, lat)
}

pub fn gcj02_to_wgs84(lng: f64, lat: f64) -> (f64, f64) {
    if outside_of_china(lng, lat) {
        return (lng, lat);
    }
    let (mg_lng, mg_lat) = shifted(lng, lat);
    (lng * 2.0 - mg_lng, lat * 2.0 - mg_lat)
}

/// The input plus the ellipsoid-scaled distortion offset
fn shifted(lng: f64, lat: f64) -> (f64, f64) {
    let mut d_lat = transform_lat(lng - 105.0, lat - 35.0);
    let mut d_lng = transform_lng(lng - 105.0, lat - 35.0);
    let rad_lat = lat / 180.0 * PI;

    let mut magic = rad_lat.sin();
    magic = 1.0 - EE * magic * magic;
    let sqrt_magic = magic.sqrt();

    d_lat = (d_lat * 180.0) / ((A * (1.0 - EE)) / (magic * sqrt_magic) * PI);
    d_lng = (d_lng * 180.0) / (A / sqrt_magic * rad_lat.cos() * PI);
    (lng + d_lng, lat + d_lat)
}

fn transform_lat(lng: f64, lat: f64) -> f64 {
    let mut ret =
        -100.0 + 2.0 * lng + 3.0 * lat + 0.2 * lat * lat + 0.1 * lng * lat + 0.2 * lng.abs().sqrt();
    ret += (20.0 * (6.0 * lng * PI).sin() + 20.0 * (2.0 * lng * PI).sin()) * 2.0 / 3.0;
    ret += (20.0 * (lat * PI).sin() + 40.0 * (lat / 3.0 * PI).sin()) * 2.0 / 3.0;
    ret += (160.0 * (lat / 12.0 * PI).sin() + 320.0 * (lat * PI / 30.0).sin()) * 2.0 / 3.0;
    ret
}

fn transform_lng(lng: f64, lat: f64) -> f64 {
    let mut ret =
        300.0 + lng + 2.0 * lat + 0.1 * lng * lng + 0.1 * lng * lat + 0.1 * lng.abs().sqrt();
    ret += (20.0 * (6.0 * lng * PI).sin() + 20.0 * (2.0 * lng * PI).sin()) * 2.0 / 3.0;
    ret += (20.0 * (lng * PI).sin() + 40.0 * (lng / 3.0 * PI).sin()) * 2.0 / 3.0;
    ret += (150.0 * (lng / 12.0 * PI).sin() + 300.0 * (lng / 30.0 * PI).sin()) * 2.0 / 3.0;
    ret
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_reference_value() {
        let (lng, lat) = wgs84_to_gcj02(116.3, 39.9);
        assert!((lng - 116.306_072_903_858_22).abs() < 1e-9);
        assert!((lat - 39.901_260_094_947_57).abs() < 1e-9);
    }

    #[test]
    fn test_round_trip_is_close_but_not_exact() {
        let (g_lng, g_lat) = wgs84_to_gcj02(116.3, 39.9);
        let (lng, lat) = gcj02_to_wgs84(g_lng, g_lat);
        assert!((lng - 116.3).abs() < 1e-4);
        assert!((lat - 39.9).abs() < 1e-4);
        // Reflection leaves a residual of roughly 1e-5 degrees here
        assert!((lng - 116.299_988_028_088_17).abs() < 1e-9);
    }

    #[test]
    fn test_outside_china_identity() {
        assert_eq!(wgs84_to_gcj02(200.0, 60.0), (200.0, 60.0));
        assert_eq!(gcj02_to_wgs84(-0.1, 51.5), (-0.1, 51.5));
    }

    #[test]
    fn test_bounding_box_edges() {
        assert!(!outside_of_china(72.004, 0.8293));
        assert!(!outside_of_china(137.8347, 55.8271));
        assert!(outside_of_china(72.0, 30.0));
        assert!(outside_of_china(110.0, 55.9));
    }

    #[test]
    fn test_nan_propagates() {
        let (lng, lat) = wgs84_to_gcj02(f64::NAN, 39.9);
        assert!(lng.is_nan());
        assert!(lat.is_nan());
    }
}
