//! Admission of fetched AOI polygons.

use geo::{BoundingRect, Distance, Euclidean, Point as GeoPoint};
use thiserror::Error;
use tracing::debug;

use crate::crs;
use crate::matching::policy::{Criterion, RankingPolicy, ValidationPolicy};
use crate::matching::similarity::name_similarity;
use crate::models::{Candidate, CandidateDraft, Poi};

/// Why a candidate polygon was not admitted
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    #[error("candidate has no {0}")]
    MissingField(&'static str),
    #[error("POI lies outside the polygon's bounding box")]
    OutsideBoundingBox,
    #[error("area {area_km2} km² is out of bounds")]
    AreaOutOfBounds { area_km2: f64 },
    #[error("name similarity {similarity} is below the floor")]
    DissimilarName { similarity: f64 },
}

/// Decides admissibility of candidate polygons and attaches derived fields.
///
/// Stateless across calls; one instance is shared by all workers.
#[derive(Debug, Clone, Copy)]
pub struct CandidateValidator {
    policy: ValidationPolicy,
    ranking: RankingPolicy,
}

impl CandidateValidator {
    pub fn new(policy: ValidationPolicy, ranking: RankingPolicy) -> Self {
        Self { policy, ranking }
    }

    pub fn policy(&self) -> &ValidationPolicy {
        &self.policy
    }

    /// Validate a draft against its owning POI.
    ///
    /// Rules run in order: required fields, inclusive bounding box, area
    /// bounds, then the similarity floor when similarity ranking is enabled.
    /// Distance is only computed when distance ranking is enabled.
    pub fn validate(&self, poi: &Poi, draft: CandidateDraft) -> Result<Candidate, Rejection> {
        if draft.request.uid.is_empty() {
            return Err(Rejection::MissingField("uid"));
        }
        if draft.request.name.is_empty() {
            return Err(Rejection::MissingField("name"));
        }

        let bbox = draft
            .geometry
            .bounding_rect()
            .ok_or(Rejection::MissingField("geometry"))?;
        let (lng, lat) = (poi.location.lng, poi.location.lat);
        // Permissive pre-filter, not point-in-polygon
        let inside = bbox.min().x <= lng
            && lng <= bbox.max().x
            && bbox.min().y <= lat
            && lat <= bbox.max().y;
        if !inside {
            return Err(Rejection::OutsideBoundingBox);
        }

        let area_km2 = crs::projected_area_km2(&draft.geometry);
        if !self.policy.admits_area(area_km2) {
            return Err(Rejection::AreaOutOfBounds { area_km2 });
        }

        let similarity = if self.ranking.is_enabled(Criterion::Similarity) {
            let similarity = name_similarity(&draft.request.name, &poi.name);
            if !self.policy.admits_similarity(similarity) {
                return Err(Rejection::DissimilarName { similarity });
            }
            Some(similarity)
        } else {
            None
        };

        let distance_m = if self.ranking.is_enabled(Criterion::Distance) {
            Some(planar_distance_m(poi, &draft))
        } else {
            None
        };

        debug!(
            "POI {}: admitted {} ({:.4} km², similarity {:?}, distance {:?})",
            poi.id, draft.request.uid, area_km2, similarity, distance_m
        );
        Ok(Candidate::new(draft, area_km2, distance_m, similarity))
    }
}

/// Distance from the POI to the polygon in UTM 50N meters, 0 when inside
fn planar_distance_m(poi: &Poi, draft: &CandidateDraft) -> f64 {
    let (x, y) = crs::project_point(poi.location.lng, poi.location.lat);
    let polygon = crs::project_to_area_crs(&draft.geometry);
    Euclidean.distance(&GeoPoint::new(x, y), &polygon)
}
