//! AOI resolver - matches business POIs to AOI polygons from a place-search API
//!
//! This library provides the coordinate conversions, candidate matching engine
//! and dataset plumbing used by the `resolve` binary.

pub mod config;
pub mod crs;
pub mod dataset;
pub mod feed;
pub mod matching;
pub mod models;
pub mod progress;
pub mod session;
pub mod tracker;

pub use models::{Candidate, Crs, Outcome, Point, Poi, PoiId, PoiResult};
pub use session::{MatchSettings, Session};
