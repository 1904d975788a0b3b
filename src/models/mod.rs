//! Core data models for POI/AOI matching.

pub mod candidate;
pub mod poi;
pub mod point;

pub use candidate::{Candidate, CandidateDraft, CandidateRequest, SearchHit};
pub use poi::{Outcome, Poi, PoiId, PoiResult};
pub use point::{Crs, Point};
