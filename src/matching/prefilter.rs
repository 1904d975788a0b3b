//! Upstream filtering of raw search hits, before any geometry is fetched.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{CandidateRequest, Poi, SearchHit};

/// Where an industry filter value comes from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndustryFilter {
    /// No filtering on this tag
    #[default]
    None,
    /// Same value for every POI
    Fixed(String),
    /// Read from the POI's own record
    PerRecord,
}

impl IndustryFilter {
    /// Resolve the filter value for one POI; empty means "no filter"
    pub fn resolve<'a>(&'a self, record_value: Option<&'a str>) -> &'a str {
        match self {
            IndustryFilter::None => "",
            IndustryFilter::Fixed(value) => value,
            IndustryFilter::PerRecord => record_value.unwrap_or(""),
        }
    }

    pub fn is_per_record(&self) -> bool {
        matches!(self, IndustryFilter::PerRecord)
    }
}

/// Discards search hits that cannot be the POI's AOI
#[derive(Debug, Clone)]
pub struct SearchFilter {
    /// Maximum great-circle distance from the POI, in km
    pub radius_km: f64,
    pub prim_ind: IndustryFilter,
    pub sec_ind: IndustryFilter,
    /// Keep only the first surviving hit
    pub use_first_uid: bool,
}

impl SearchFilter {
    /// Build a filter from a radius in meters
    pub fn new(radius_m: f64) -> Self {
        Self {
            radius_km: radius_m / 1000.0,
            prim_ind: IndustryFilter::None,
            sec_ind: IndustryFilter::None,
            use_first_uid: false,
        }
    }

    pub fn with_industry(mut self, prim_ind: IndustryFilter, sec_ind: IndustryFilter) -> Self {
        self.prim_ind = prim_ind;
        self.sec_ind = sec_ind;
        self
    }

    pub fn with_first_uid_only(mut self, use_first_uid: bool) -> Self {
        self.use_first_uid = use_first_uid;
        self
    }

    /// Resolved `(primary, secondary)` industry values for a POI
    pub fn industry_for<'a>(&'a self, poi: &'a Poi) -> (&'a str, &'a str) {
        (
            self.prim_ind.resolve(poi.prim_ind.as_deref()),
            self.sec_ind.resolve(poi.sec_ind.as_deref()),
        )
    }

    /// Tag substring a hit must contain: "prim;sec" when both are set
    pub fn required_tag(&self, poi: &Poi) -> String {
        let (prim, sec) = self.industry_for(poi);
        if !prim.is_empty() && !sec.is_empty() {
            format!("{};{}", prim, sec)
        } else {
            format!("{}{}", prim, sec)
        }
    }

    /// Filter raw hits for a POI into candidate requests.
    ///
    /// Hits keep their 1-based position in `hits` as search rank.
    pub fn select(&self, poi: &Poi, hits: &[SearchHit]) -> Vec<CandidateRequest> {
        let required_tag = self.required_tag(poi);
        let mut requests = Vec::new();

        for (idx, hit) in hits.iter().enumerate() {
            if let Some(request) = self.admit(poi, &required_tag, hit, idx + 1) {
                requests.push(request);
                if self.use_first_uid {
                    break;
                }
            }
        }

        debug!(
            "POI {}: {} of {} search hits kept",
            poi.id,
            requests.len(),
            hits.len()
        );
        requests
    }

    fn admit(
        &self,
        poi: &Poi,
        required_tag: &str,
        hit: &SearchHit,
        search_rank: usize,
    ) -> Option<CandidateRequest> {
        // 1. key information must exist
        let uid = hit.uid.as_deref().filter(|s| !s.is_empty())?;
        let name = hit.name.as_deref().filter(|s| !s.is_empty())?;
        let location = hit.location.filter(|p| p.lng != 0.0 && p.lat != 0.0)?;

        // 2. must lie within the search radius
        let distance = location.to_wgs84().distance_km(&poi.location);
        if !(distance <= self.radius_km) {
            debug!("POI {}: hit {} is {:.3} km away", poi.id, uid, distance);
            return None;
        }

        // 3. industry tag must contain the configured one (substring match)
        if !required_tag.is_empty() {
            let tag = hit.tag.as_deref().unwrap_or("");
            if !tag.contains(required_tag) {
                debug!("POI {}: hit {} tag {:?} lacks {:?}", poi.id, uid, tag, required_tag);
                return None;
            }
        }

        Some(CandidateRequest {
            poi: poi.id,
            uid: uid.to_string(),
            name: name.to_string(),
            search_rank,
        })
    }
}
