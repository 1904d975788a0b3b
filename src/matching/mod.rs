//! Candidate filtering, validation and ranking.
//!
//! Everything here is pure and shared across workers without locking.

pub mod policy;
pub mod prefilter;
pub mod ranker;
pub mod similarity;
pub mod validator;

pub use policy::{Criterion, PolicyError, RankingPolicy, ValidationPolicy};
pub use prefilter::{IndustryFilter, SearchFilter};
pub use ranker::CandidateRanker;
pub use similarity::name_similarity;
pub use validator::{CandidateValidator, Rejection};
