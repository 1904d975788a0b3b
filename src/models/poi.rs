//! Business records (POIs) and their terminal matching outcomes.

use serde::{Deserialize, Serialize};

use super::{Candidate, Point};

/// Stable identifier of a POI: its row ordinal in the loaded dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PoiId(pub usize);

impl std::fmt::Display for PoiId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A business record to be matched against AOI candidates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Poi {
    pub id: PoiId,

    /// Display name, also used for name similarity
    pub name: String,

    /// Reference point, always WGS84
    pub location: Point,

    /// Primary industry tag (e.g., "房地产")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prim_ind: Option<String>,

    /// Secondary industry tag (e.g., "住宅区")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sec_ind: Option<String>,
}

impl Poi {
    /// Create a POI; the location is normalized to WGS84.
    pub fn new(id: PoiId, name: impl Into<String>, location: Point) -> Self {
        Self {
            id,
            name: name.into(),
            location: location.to_wgs84(),
            prim_ind: None,
            sec_ind: None,
        }
    }

    pub fn with_industry(mut self, prim_ind: Option<String>, sec_ind: Option<String>) -> Self {
        self.prim_ind = prim_ind.filter(|s| !s.is_empty());
        self.sec_ind = sec_ind.filter(|s| !s.is_empty());
        self
    }
}

/// Terminal state of a POI once its candidate set has been ranked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// A candidate was admitted and selected
    Matched,
    /// The search returned no usable candidate identifiers
    NoCandidates,
    /// Candidates existed but none was admitted
    NoValidGeometry,
}

impl Outcome {
    /// Status label written to the result file
    pub fn status_label(&self) -> &'static str {
        match self {
            Outcome::Matched => "Matched",
            Outcome::NoCandidates => "No Uid",
            Outcome::NoValidGeometry => "No Geometry",
        }
    }

    pub fn from_status_label(label: &str) -> Option<Self> {
        match label.trim() {
            "Matched" => Some(Outcome::Matched),
            "No Uid" => Some(Outcome::NoCandidates),
            "No Geometry" => Some(Outcome::NoValidGeometry),
            _ => None,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.status_label())
    }
}

/// Per-POI result record handed to the persistence layer
#[derive(Debug, Clone)]
pub struct PoiResult {
    pub poi: PoiId,
    pub outcome: Outcome,
    /// Winning candidate, present iff `outcome` is `Matched`
    pub winner: Option<Candidate>,
}

impl PoiResult {
    pub fn matched(poi: PoiId, winner: Candidate) -> Self {
        Self {
            poi,
            outcome: Outcome::Matched,
            winner: Some(winner),
        }
    }

    pub fn unmatched(poi: PoiId, outcome: Outcome) -> Self {
        Self {
            poi,
            outcome,
            winner: None,
        }
    }

    pub fn geometry(&self) -> Option<&geo::Polygon<f64>> {
        self.winner.as_ref().map(|c| c.geometry())
    }

    pub fn source_name(&self) -> Option<&str> {
        self.winner.as_ref().map(|c| c.name())
    }
}
