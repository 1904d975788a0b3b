//! Coordinate conversions among WGS84, GCJ02, BD09LL and BD09MC.
//!
//! These are the empirical approximations used by the search API, not
//! geodetically exact transforms. All functions are pure and take and return
//! `(lng, lat)` pairs; NaN input propagates without guards.

mod bd09;
mod gcj02;
mod utm;

use geo::{Area, Polygon};

pub use bd09::{
    bd09ll_to_gcj02, bd09ll_to_wgs84, bd09mc_to_bd09ll, bd09mc_to_wgs84, gcj02_to_bd09ll,
    wgs84_to_bd09ll,
};
pub use gcj02::{gcj02_to_wgs84, outside_of_china, wgs84_to_gcj02};
pub use utm::{project_point, project_to_area_crs, UTM_50N_CENTRAL_MERIDIAN};

/// Earth radius used by the haversine distance, in kilometers
pub const EARTH_RADIUS_KM: f64 = 6378.137;

/// Haversine distance between two points, in kilometers
pub fn great_circle_distance(lng1: f64, lat1: f64, lng2: f64, lat2: f64) -> f64 {
    let rad = |deg: f64| deg / 180.0 * std::f64::consts::PI;
    let d_lat = (rad(lat1) - rad(lat2)).abs();
    let d_lng = (rad(lng1) - rad(lng2)).abs();
    let a = (d_lat / 2.0).sin() * (d_lat / 2.0).sin()
        + rad(lat1).cos() * rad(lat2).cos() * (d_lng / 2.0).sin() * (d_lng / 2.0).sin();
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

/// Area of a WGS84 polygon in square kilometers, measured in UTM 50N
pub fn projected_area_km2(polygon: &Polygon<f64>) -> f64 {
    project_to_area_crs(polygon).unsigned_area() / 1e6
}
