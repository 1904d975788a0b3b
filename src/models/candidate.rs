//! Search hits and AOI polygon candidates.

use geo::Polygon;
use serde::{Deserialize, Serialize};

use super::{Point, PoiId};

/// One raw record from the place-search feed, before filtering
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub uid: Option<String>,
    pub name: Option<String>,
    /// BD09LL location as returned by the search API
    pub location: Option<Point>,
    /// Industry tag string, e.g. "教育培训;高等院校"
    pub tag: Option<String>,
}

/// A search hit that survived upstream filtering and whose geometry should be fetched
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandidateRequest {
    pub poi: PoiId,
    pub uid: String,
    pub name: String,
    /// 1-based ordinal in the raw search results
    pub search_rank: usize,
}

/// A fetched candidate polygon awaiting validation
#[derive(Debug, Clone)]
pub struct CandidateDraft {
    pub request: CandidateRequest,
    /// Polygon in WGS84
    pub geometry: Polygon<f64>,
}

impl CandidateDraft {
    pub fn new(request: CandidateRequest, geometry: Polygon<f64>) -> Self {
        Self { request, geometry }
    }
}

/// An admitted AOI candidate.
///
/// Only the validator constructs candidates, so every instance satisfies the
/// validation policy it was checked against. `distance` and `similarity` are
/// present only when the matching ranking criterion was enabled.
#[derive(Debug, Clone)]
pub struct Candidate {
    request: CandidateRequest,
    geometry: Polygon<f64>,
    area_km2: f64,
    distance_m: Option<f64>,
    similarity: Option<f64>,
}

impl Candidate {
    pub(crate) fn new(
        draft: CandidateDraft,
        area_km2: f64,
        distance_m: Option<f64>,
        similarity: Option<f64>,
    ) -> Self {
        Self {
            request: draft.request,
            geometry: draft.geometry,
            area_km2,
            distance_m,
            similarity,
        }
    }

    pub fn poi(&self) -> PoiId {
        self.request.poi
    }

    pub fn uid(&self) -> &str {
        &self.request.uid
    }

    pub fn name(&self) -> &str {
        &self.request.name
    }

    pub fn search_rank(&self) -> usize {
        self.request.search_rank
    }

    pub fn geometry(&self) -> &Polygon<f64> {
        &self.geometry
    }

    /// Area in square kilometers, measured in UTM zone 50N
    pub fn area_km2(&self) -> f64 {
        self.area_km2
    }

    /// Planar distance to the POI in meters
    pub fn distance_m(&self) -> Option<f64> {
        self.distance_m
    }

    /// Name similarity against the POI, in [0, 1]
    pub fn similarity(&self) -> Option<f64> {
        self.similarity
    }
}
