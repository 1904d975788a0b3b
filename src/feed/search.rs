//! Place-search response decoding.

use serde::Deserialize;
use thiserror::Error;

use super::FeedError;
use crate::models::{Crs, Point, SearchHit};

/// Non-zero status codes of the search API, grouped by hundreds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ApiStatus {
    #[error("API parameter invalid: {0}")]
    ParameterInvalid(i64),
    #[error("API verify failure: {0}")]
    VerifyFailure(i64),
    #[error("API quota failure: {0}")]
    QuotaFailure(i64),
    #[error("API key failure: {0}")]
    KeyFailure(i64),
    #[error("API error: {0}")]
    Other(i64),
}

impl ApiStatus {
    /// `Ok` for status 0, otherwise the classified failure
    pub fn check(status: i64) -> Result<(), ApiStatus> {
        match status {
            0 => Ok(()),
            200..=299 => Err(ApiStatus::ParameterInvalid(status)),
            300..=399 => Err(ApiStatus::VerifyFailure(status)),
            400..=499 => Err(ApiStatus::QuotaFailure(status)),
            500..=599 => Err(ApiStatus::KeyFailure(status)),
            _ => Err(ApiStatus::Other(status)),
        }
    }

    /// Quota and key failures mean the key list needs attention
    pub fn is_key_problem(&self) -> bool {
        matches!(self, ApiStatus::QuotaFailure(_) | ApiStatus::KeyFailure(_))
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    status: i64,
    #[serde(default)]
    results: Option<Vec<RawResult>>,
}

#[derive(Debug, Deserialize)]
struct RawResult {
    name: Option<String>,
    uid: Option<String>,
    location: Option<RawLocation>,
    detail_info: Option<RawDetail>,
}

#[derive(Debug, Deserialize)]
struct RawLocation {
    lng: Option<f64>,
    lat: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawDetail {
    tag: Option<String>,
}

impl From<RawResult> for SearchHit {
    fn from(raw: RawResult) -> Self {
        let location = raw.location.and_then(|l| match (l.lng, l.lat) {
            (Some(lng), Some(lat)) => Some(Point::new(lng, lat, Crs::Bd09Ll)),
            _ => None,
        });
        SearchHit {
            uid: raw.uid,
            name: raw.name,
            location,
            tag: raw.detail_info.and_then(|d| d.tag),
        }
    }
}

/// Decode a search response into hits, in upstream rank order.
///
/// A missing or null `results` array yields no hits.
pub fn parse_search_response(body: &str) -> Result<Vec<SearchHit>, FeedError> {
    let response: SearchResponse = serde_json::from_str(body)?;
    ApiStatus::check(response.status)?;
    Ok(response
        .results
        .unwrap_or_default()
        .into_iter()
        .map(SearchHit::from)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_results() {
        let body = r#"{
            "status": 0,
            "message": "ok",
            "results": [
                {
                    "name": "北京大学",
                    "location": {"lat": 39.998877, "lng": 116.316833},
                    "address": "北京市海淀区颐和园路5号",
                    "uid": "ddfd7c2d8db36cf39ee3219e",
                    "detail_info": {"tag": "教育培训;高等院校"}
                },
                {"name": "北京大学-东门", "uid": "5a8fb739999a70a54207c130"}
            ]
        }"#;
        let hits = parse_search_response(body).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].uid.as_deref(), Some("ddfd7c2d8db36cf39ee3219e"));
        assert_eq!(hits[0].tag.as_deref(), Some("教育培训;高等院校"));
        let location = hits[0].location.unwrap();
        assert_eq!(location.crs, Crs::Bd09Ll);
        assert_eq!(location.lng, 116.316833);
        assert!(hits[1].location.is_none());
        assert!(hits[1].tag.is_none());
    }

    #[test]
    fn test_empty_results() {
        assert!(parse_search_response(r#"{"status": 0}"#).unwrap().is_empty());
        assert!(parse_search_response(r#"{"status": 0, "results": []}"#)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(ApiStatus::check(0), Ok(()));
        assert_eq!(ApiStatus::check(2), Err(ApiStatus::Other(2)));
        assert_eq!(ApiStatus::check(211), Err(ApiStatus::ParameterInvalid(211)));
        assert_eq!(ApiStatus::check(302), Err(ApiStatus::VerifyFailure(302)));
        assert_eq!(ApiStatus::check(401), Err(ApiStatus::QuotaFailure(401)));
        assert_eq!(ApiStatus::check(5), Err(ApiStatus::Other(5)));
        assert!(ApiStatus::check(503).unwrap_err().is_key_problem());
    }

    #[test]
    fn test_failed_status_is_an_error() {
        let err =
            parse_search_response(r#"{"status": 302, "message": "天配额超限"}"#).unwrap_err();
        assert!(matches!(err, FeedError::Api(ApiStatus::VerifyFailure(302))));
        assert!(matches!(
            parse_search_response("<html>"),
            Err(FeedError::Json(_))
        ));
    }
}
