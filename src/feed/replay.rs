//! Recorded API responses served from disk.
//!
//! Layout under the responses directory:
//!
//! ```text
//! search/<poi id>.json   place-search response for one POI
//! aoi/<uid>.json         geometry response for one candidate uid
//! ```
//!
//! Subdirectories are walked recursively, so responses may be sharded.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use geo::Polygon;
use hashbrown::HashMap;
use tracing::{info, warn};
use walkdir::WalkDir;

use super::{parse_aoi_response, parse_search_response, FeedError};
use crate::models::{PoiId, SearchHit};

#[derive(Debug, Default)]
pub struct ReplaySource {
    search: HashMap<PoiId, PathBuf>,
    aoi: HashMap<String, PathBuf>,
}

impl ReplaySource {
    /// Index every recorded response below `dir`
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            anyhow::bail!("Responses directory not found: {}", dir.display());
        }

        let mut source = Self::default();
        for (stem, path) in index_json_files(&dir.join("search"))? {
            match stem.parse::<usize>() {
                Ok(id) => {
                    source.search.insert(PoiId(id), path);
                }
                Err(_) => warn!("Ignoring search response {}", path.display()),
            }
        }
        for (stem, path) in index_json_files(&dir.join("aoi"))? {
            source.aoi.insert(stem, path);
        }

        info!(
            "Indexed {} search and {} AOI responses in {}",
            source.search.len(),
            source.aoi.len(),
            dir.display()
        );
        Ok(source)
    }

    pub fn has_search(&self, poi: PoiId) -> bool {
        self.search.contains_key(&poi)
    }

    /// Raw search hits recorded for a POI
    pub async fn search(&self, poi: PoiId) -> Result<Vec<SearchHit>, FeedError> {
        let path = self
            .search
            .get(&poi)
            .ok_or_else(|| FeedError::Missing(format!("POI {}", poi)))?;
        let body = tokio::fs::read_to_string(path).await?;
        parse_search_response(&body)
    }

    /// Geometry recorded for a candidate uid, `None` if it has none
    pub async fn aoi(&self, uid: &str) -> Result<Option<Polygon<f64>>, FeedError> {
        let path = self
            .aoi
            .get(uid)
            .ok_or_else(|| FeedError::Missing(format!("uid {}", uid)))?;
        let body = tokio::fs::read_to_string(path).await?;
        parse_aoi_response(&body)
    }
}

/// `(file stem, path)` of every `.json` file below `dir`; empty if `dir` is absent
fn index_json_files(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    if !dir.exists() {
        warn!("Response directory not found: {}", dir.display());
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.with_context(|| format!("Failed to walk {}", dir.display()))?;
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            files.push((stem.to_string(), path.to_path_buf()));
        }
    }
    Ok(files)
}
