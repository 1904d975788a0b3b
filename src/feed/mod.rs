//! Codecs for the place-search and AOI geometry feeds, plus the replay source
//! that serves recorded responses from disk.

pub mod aoi;
pub mod query;
pub mod replay;
pub mod search;

use thiserror::Error;

pub use aoi::{decode_geo, parse_aoi_response};
pub use query::QueryBuilder;
pub use replay::ReplaySource;
pub use search::{parse_search_response, ApiStatus};

/// Failure to obtain or decode one feed response
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("invalid JSON response: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Api(#[from] ApiStatus),
    #[error("malformed geometry: {0}")]
    MalformedGeometry(String),
    #[error("no recorded response for {0}")]
    Missing(String),
    #[error("failed to read response: {0}")]
    Io(#[from] std::io::Error),
}
