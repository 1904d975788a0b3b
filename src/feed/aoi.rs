//! AOI geometry response decoding.
//!
//! The geometry arrives as `"<kind>|<bbox>|<n>-x1,y1,x2,y2,...,xn,yn;"` with
//! coordinates in BD09MC. Only the third `|` segment is used.

use std::sync::OnceLock;

use geo::{Coord, LineString, Polygon};
use regex::Regex;
use serde::Deserialize;

use super::FeedError;
use crate::crs;

#[derive(Debug, Deserialize)]
struct AoiResponse {
    #[serde(default)]
    content: Option<AoiContent>,
}

#[derive(Debug, Deserialize)]
struct AoiContent {
    #[serde(default)]
    geo: Option<String>,
}

fn ring_regex() -> &'static Regex {
    static RING: OnceLock<Regex> = OnceLock::new();
    RING.get_or_init(|| Regex::new(r"^\s*\d+-([^;]*);?\s*$").expect("ring pattern is valid"))
}

/// Decode an AOI response into a WGS84 polygon.
///
/// `Ok(None)` when the response carries no geometry at all.
pub fn parse_aoi_response(body: &str) -> Result<Option<Polygon<f64>>, FeedError> {
    let response: AoiResponse = serde_json::from_str(body)?;
    match response.content.and_then(|c| c.geo) {
        Some(geo) if !geo.is_empty() => decode_geo(&geo).map(Some),
        _ => Ok(None),
    }
}

/// Decode a BD09MC geometry string into a WGS84 polygon
pub fn decode_geo(geo: &str) -> Result<Polygon<f64>, FeedError> {
    let malformed = || FeedError::MalformedGeometry(geo.to_string());

    let ring = geo.split('|').nth(2).ok_or_else(malformed)?;
    let captures = ring_regex().captures(ring).ok_or_else(malformed)?;
    let numbers = captures
        .get(1)
        .map(|m| m.as_str())
        .ok_or_else(malformed)?
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<Vec<f64>, _>>()
        .map_err(|_| malformed())?;

    if numbers.len() % 2 != 0 {
        return Err(malformed());
    }
    let coords: Vec<Coord<f64>> = numbers
        .chunks_exact(2)
        .map(|xy| {
            let (lng, lat) = crs::bd09mc_to_wgs84(xy[0], xy[1]);
            Coord { x: lng, y: lat }
        })
        .collect();
    if coords.len() < 3 {
        return Err(malformed());
    }

    Ok(Polygon::new(LineString::new(coords), vec![]))
}

#[cfg(test)]
mod tests {
    use super::*;

    const GEO: &str = "4|12946839.266068,4837125.446178;12949751.777560,4839020.969541|1-12948599.709479,4837127.8547043,12949599.709479,4837127.8547043,12949599.709479,4838127.8547043,12948599.709479,4837127.8547043;";

    #[test]
    fn test_decode_geo() {
        let polygon = decode_geo(GEO).unwrap();
        let first = polygon.exterior().0[0];
        assert!((first.x - 116.305_349_976_113_36).abs() < 1e-6);
        assert!((first.y - 39.985_198_606_408_78).abs() < 1e-6);
        assert_eq!(polygon.exterior().0.len(), 4);
    }

    #[test]
    fn test_parse_response() {
        let body = format!(
            r#"{{"content": {{"geo": "{}", "uid": "ddfd7c2d8db36cf39ee3219e"}}}}"#,
            GEO
        );
        assert!(parse_aoi_response(&body).unwrap().is_some());
    }

    #[test]
    fn test_missing_geometry() {
        assert!(parse_aoi_response(r#"{"content": {"uid": "x"}}"#)
            .unwrap()
            .is_none());
        assert!(parse_aoi_response(r#"{"content": {"geo": ""}}"#)
            .unwrap()
            .is_none());
        assert!(parse_aoi_response(r#"{"result": {}}"#).unwrap().is_none());
    }

    #[test]
    fn test_malformed_geometry() {
        for geo in [
            "4|bbox",
            "4|bbox|1-12948599.7,4837127.8,12949599.7;",
            "4|bbox|1-12948599.7,4837127.8,12949599.7,4837127.8;",
            "4|bbox|1-a,b,c,d,e,f;",
            "4|bbox|12948599.7,4837127.8",
        ] {
            assert!(
                matches!(decode_geo(geo), Err(FeedError::MalformedGeometry(_))),
                "{}",
                geo
            );
        }
    }
}
