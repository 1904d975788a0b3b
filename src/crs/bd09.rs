//! BD09 conversions: the GCJ02 <-> BD09LL polar warp and the BD09MC
//! Mercator-like projection decoded through piecewise polynomials.

use std::f64::consts::PI;

use super::gcj02::{gcj02_to_wgs84, wgs84_to_gcj02};

const X_PI: f64 = PI * 3000.0 / 180.0;

/// Latitude band thresholds for BD09MC, scanned in this order
const MC_BAND: [f64; 6] = [12890594.86, 8362377.87, 5591021.0, 3481989.83, 1678043.12, 0.0];

/// Per-band coefficients: `[x0, x1, y0..y6, y_scale]`
const MC2LL: [[f64; 10]; 6] = [
    [
        1.410526172116255e-8,
        0.00000898305509648872,
        -1.9939833816331,
        200.9824383106796,
        -187.2403703815547,
        91.6087516669843,
        -23.38765649603339,
        2.57121317296198,
        -0.03801003308653,
        17337981.2,
    ],
    [
        -7.435856389565537e-9,
        0.000008983055097726239,
        -0.78625201886289,
        96.32687599759846,
        -1.85204757529826,
        -59.36935905485877,
        47.40033549296737,
        -16.50741931063887,
        2.28786674699375,
        10260144.86,
    ],
    [
        -3.030883460898826e-8,
        0.00000898305509983578,
        0.30071316287616,
        59.74293618442277,
        7.357984074871,
        -25.38371002664745,
        13.45380521110908,
        -3.29883767235584,
        0.32710905363475,
        6856817.37,
    ],
    [
        -1.981981304930552e-8,
        0.000008983055099779535,
        0.03278182852591,
        40.31678527705744,
        0.65659298677277,
        -4.44255534477492,
        0.85341911805263,
        0.12923347998204,
        -0.04625736007561,
        4482777.06,
    ],
    [
        3.09191371068437e-9,
        0.000008983055096812155,
        0.00006995724062,
        23.10934304144901,
        -0.00023663490511,
        -0.6321817810242,
        -0.00663494467273,
        0.03430082397953,
        -0.00466043876332,
        2555164.4,
    ],
    [
        2.890871144776878e-9,
        0.000008983055095805407,
        -3.068298e-8,
        7.47137025468032,
        -0.00000353937994,
        -0.02145144861037,
        -0.00001234426596,
        0.00010322952773,
        -0.00000323890364,
        826088.5,
    ],
];

pub fn gcj02_to_bd09ll(lng: f64, lat: f64) -> (f64, f64) {
    let z = (lng * lng + lat * lat).sqrt() + 0.00002 * (lat * X_PI).sin();
    let theta = lat.atan2(lng) + 0.000003 * (lng * X_PI).cos();
    (z * theta.cos() + 0.0065, z * theta.sin() + 0.006)
}

pub fn bd09ll_to_gcj02(lng: f64, lat: f64) -> (f64, f64) {
    let x = lng - 0.0065;
    let y = lat - 0.006;
    let z = (x * x + y * y).sqrt() - 0.00002 * (y * X_PI).sin();
    let theta = y.atan2(x) - 0.000003 * (x * X_PI).cos();
    (z * theta.cos(), z * theta.sin())
}

pub fn wgs84_to_bd09ll(lng: f64, lat: f64) -> (f64, f64) {
    let (lng, lat) = wgs84_to_gcj02(lng, lat);
    gcj02_to_bd09ll(lng, lat)
}

pub fn bd09ll_to_wgs84(lng: f64, lat: f64) -> (f64, f64) {
    let (lng, lat) = bd09ll_to_gcj02(lng, lat);
    gcj02_to_wgs84(lng, lat)
}

/// Decode a BD09MC `(x, y)` pair into BD09LL `(lng, lat)`.
///
/// The band is the first one whose threshold `y` exceeds. `y <= 0` (and NaN)
/// matches no threshold and falls through to the last band.
pub fn bd09mc_to_bd09ll(x: f64, y: f64) -> (f64, f64) {
    let band = MC_BAND
        .iter()
        .position(|threshold| y > *threshold)
        .unwrap_or(MC_BAND.len() - 1);
    let c = &MC2LL[band];

    let lng = c[0] + c[1] * x;
    let cc = y / c[9];
    let lat = c[2]
        + c[3] * cc
        + c[4] * cc.powi(2)
        + c[5] * cc.powi(3)
        + c[6] * cc.powi(4)
        + c[7] * cc.powi(5)
        + c[8] * cc.powi(6);
    (lng, lat)
}

pub fn bd09mc_to_wgs84(x: f64, y: f64) -> (f64, f64) {
    let (lng, lat) = bd09mc_to_bd09ll(x, y);
    bd09ll_to_wgs84(lng, lat)
}
