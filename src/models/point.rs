//! Points tagged with the coordinate reference system they are expressed in.

use geo::Coord;
use serde::{Deserialize, Serialize};

use crate::crs;

/// Coordinate reference systems used across the Chinese mapping ecosystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Crs {
    /// Public geodetic system
    Wgs84,
    /// China-obfuscated geodetic system
    Gcj02,
    /// Vendor-obfuscated geodetic system
    #[serde(rename = "bd09", alias = "bd09ll")]
    Bd09Ll,
    /// Vendor Mercator projection, meter-like units
    Bd09Mc,
}

impl std::fmt::Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Crs::Wgs84 => write!(f, "wgs84"),
            Crs::Gcj02 => write!(f, "gcj02"),
            Crs::Bd09Ll => write!(f, "bd09ll"),
            Crs::Bd09Mc => write!(f, "bd09mc"),
        }
    }
}

/// An immutable `(lng, lat)` pair in a known CRS.
///
/// For `Bd09Mc` the pair is `(x, y)` in projected units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lng: f64,
    pub lat: f64,
    pub crs: Crs,
}

impl Point {
    pub fn new(lng: f64, lat: f64, crs: Crs) -> Self {
        Self { lng, lat, crs }
    }

    pub fn wgs84(lng: f64, lat: f64) -> Self {
        Self::new(lng, lat, Crs::Wgs84)
    }

    /// Re-express this point in WGS84
    pub fn to_wgs84(self) -> Point {
        let (lng, lat) = match self.crs {
            Crs::Wgs84 => (self.lng, self.lat),
            Crs::Gcj02 => crs::gcj02_to_wgs84(self.lng, self.lat),
            Crs::Bd09Ll => crs::bd09ll_to_wgs84(self.lng, self.lat),
            Crs::Bd09Mc => crs::bd09mc_to_wgs84(self.lng, self.lat),
        };
        Point::new(lng, lat, Crs::Wgs84)
    }

    /// Re-express this point in GCJ02
    pub fn to_gcj02(self) -> Point {
        let (lng, lat) = match self.crs {
            Crs::Wgs84 => crs::wgs84_to_gcj02(self.lng, self.lat),
            Crs::Gcj02 => (self.lng, self.lat),
            Crs::Bd09Ll => crs::bd09ll_to_gcj02(self.lng, self.lat),
            Crs::Bd09Mc => {
                let (lng, lat) = crs::bd09mc_to_bd09ll(self.lng, self.lat);
                crs::bd09ll_to_gcj02(lng, lat)
            }
        };
        Point::new(lng, lat, Crs::Gcj02)
    }

    /// Re-express this point in BD09LL
    pub fn to_bd09ll(self) -> Point {
        let (lng, lat) = match self.crs {
            Crs::Wgs84 => crs::wgs84_to_bd09ll(self.lng, self.lat),
            Crs::Gcj02 => crs::gcj02_to_bd09ll(self.lng, self.lat),
            Crs::Bd09Ll => (self.lng, self.lat),
            Crs::Bd09Mc => crs::bd09mc_to_bd09ll(self.lng, self.lat),
        };
        Point::new(lng, lat, Crs::Bd09Ll)
    }

    pub fn coord(&self) -> Coord<f64> {
        Coord {
            x: self.lng,
            y: self.lat,
        }
    }

    /// Great-circle distance to another point, in kilometers.
    ///
    /// Both points are taken as-is; callers compare points in the same CRS.
    pub fn distance_km(&self, other: &Point) -> f64 {
        crs::great_circle_distance(self.lng, self.lat, other.lng, other.lat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_keeps_original() {
        let original = Point::wgs84(116.3, 39.9);
        let gcj = original.to_gcj02();
        assert_eq!(original.lng, 116.3);
        assert_eq!(gcj.crs, Crs::Gcj02);
        assert!((gcj.lng - 116.306_072_903_858_22).abs() < 1e-9);
    }

    #[test]
    fn test_same_crs_is_identity() {
        let p = Point::new(116.3, 39.9, Crs::Bd09Ll);
        assert_eq!(p.to_bd09ll(), p);
    }

    #[test]
    fn test_bd09mc_to_wgs84() {
        let p = Point::new(12_948_599.709_479, 4_837_127.854_704_3, Crs::Bd09Mc).to_wgs84();
        assert_eq!(p.crs, Crs::Wgs84);
        assert!((p.lng - 116.305_349_976_113_36).abs() < 1e-6);
        assert!((p.lat - 39.985_198_606_408_78).abs() < 1e-6);
    }

    #[test]
    fn test_crs_names() {
        let crs: Crs = serde_json::from_str("\"bd09\"").unwrap();
        assert_eq!(crs, Crs::Bd09Ll);
        let crs: Crs = serde_json::from_str("\"bd09mc\"").unwrap();
        assert_eq!(crs, Crs::Bd09Mc);
        assert_eq!(Crs::Gcj02.to_string(), "gcj02");
    }
}
