//! Fixed WGS84 / UTM zone 50N projection (EPSG:32650) for metric area and distance.
//!
//! Only accurate inside the zone's longitude band (114°E to 120°E). Geometries
//! elsewhere are still projected with the same central meridian; the error
//! grows with distance from 117°E.

use geo::{Coord, MapCoords, Polygon};

/// Central meridian of zone 50, in degrees
pub const UTM_50N_CENTRAL_MERIDIAN: f64 = 117.0;

const SEMI_MAJOR: f64 = 6378137.0;
const FLATTENING: f64 = 1.0 / 298.257223563;
const SCALE: f64 = 0.9996;
const FALSE_EASTING: f64 = 500000.0;

/// Project a WGS84 `(lng, lat)` pair to UTM 50N `(easting, northing)` in meters.
///
/// Transverse Mercator series expansion (Snyder, USGS PP 1395, eq. 8-9/8-10).
pub fn project_point(lng: f64, lat: f64) -> (f64, f64) {
    let e2 = FLATTENING * (2.0 - FLATTENING);
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    let ep2 = e2 / (1.0 - e2);

    let phi = lat.to_radians();
    let lam = lng.to_radians();
    let lam0 = UTM_50N_CENTRAL_MERIDIAN.to_radians();

    let (sin_phi, cos_phi) = phi.sin_cos();
    let tan_phi = phi.tan();

    let n = SEMI_MAJOR / (1.0 - e2 * sin_phi * sin_phi).sqrt();
    let t = tan_phi * tan_phi;
    let c = ep2 * cos_phi * cos_phi;
    let a = cos_phi * (lam - lam0);

    // Meridian arc length
    let m = SEMI_MAJOR
        * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
            - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
            + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
            - (35.0 * e6 / 3072.0) * (6.0 * phi).sin());

    let x = SCALE
        * n
        * (a + (1.0 - t + c) * a.powi(3) / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a.powi(5) / 120.0)
        + FALSE_EASTING;
    let y = SCALE
        * (m + n
            * tan_phi
            * (a * a / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c * c) * a.powi(4) / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a.powi(6) / 720.0));
    (x, y)
}

/// Reproject a WGS84 polygon into UTM 50N meters
pub fn project_to_area_crs(polygon: &Polygon<f64>) -> Polygon<f64> {
    polygon.map_coords(|c| {
        let (x, y) = project_point(c.x, c.y);
        Coord { x, y }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Area, LineString};

    #[test]
    fn test_origin_on_central_meridian() {
        let (x, y) = project_point(117.0, 0.0);
        assert!((x - 500_000.0).abs() < 1e-6);
        assert!(y.abs() < 1e-6);
    }

    #[test]
    fn test_reference_points() {
        let (x, y) = project_point(117.0, 40.0);
        assert!((x - 500_000.0).abs() < 1e-6);
        assert!((y - 4_427_757.218_878_973).abs() < 1e-3);

        let (x, y) = project_point(116.3, 39.9);
        assert!((x - 440_160.872_710_977).abs() < 1e-3);
        assert!((y - 4_416_892.772_636_119).abs() < 1e-3);
    }

    #[test]
    fn test_symmetric_about_central_meridian() {
        let (west, north_w) = project_point(116.0, 30.0);
        let (east, north_e) = project_point(118.0, 30.0);
        assert!(((west - 500_000.0) + (east - 500_000.0)).abs() < 1e-6);
        assert!((north_w - north_e).abs() < 1e-6);
    }

    #[test]
    fn test_projected_area() {
        let square = Polygon::new(
            LineString::from(vec![
                (116.3, 39.9),
                (116.31, 39.9),
                (116.31, 39.91),
                (116.3, 39.91),
                (116.3, 39.9),
            ]),
            vec![],
        );
        let km2 = project_to_area_crs(&square).unsigned_area() / 1e6;
        assert!((km2 - 0.948_787_656).abs() < 1e-4);
    }
}
