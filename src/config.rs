//! Run settings loaded from a TOML file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use thiserror::Error;

use crate::feed::QueryBuilder;
use crate::matching::{IndustryFilter, PolicyError, RankingPolicy, SearchFilter, ValidationPolicy};
use crate::models::Crs;
use crate::session::MatchSettings;

/// Invalid settings; fatal before any processing starts
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("\"radius\" must be a positive number of meters")]
    ZeroRadius,
    #[error("\"update_interval\" must be positive")]
    ZeroUpdateInterval,
    #[error("\"concurrency\" must be positive")]
    ZeroConcurrency,
    #[error("\"{}\" must be a .shp file", .0.display())]
    NotShapefile(PathBuf),
    #[error(transparent)]
    Policy(#[from] PolicyError),
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub input: InputConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub run: RunConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    pub poi_csv: PathBuf,
    pub output_csv: PathBuf,
    /// CRS of the `lng`/`lat` columns
    #[serde(default = "default_crs")]
    pub crs: Crs,
    /// Recorded API responses to replay
    #[serde(default = "default_responses")]
    pub responses: PathBuf,
    /// Shapefile of the resolved polygons, EPSG:4326
    #[serde(default)]
    pub output_shp: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SearchConfig {
    /// Search radius in meters
    pub radius: u32,
    pub radius_limit: bool,
    pub prim_ind: IndustryFilter,
    pub sec_ind: IndustryFilter,
    /// API keys, used round-robin
    pub ak: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FilterConfig {
    /// km²
    pub min_aoi_area: f64,
    /// km²
    pub max_aoi_area: f64,
    pub min_similarity: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RankingConfig {
    pub by_search_rank: i8,
    pub by_area: i8,
    pub by_distance: i8,
    pub by_similarity: i8,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RunConfig {
    /// Fetch only the first surviving search hit per POI
    pub use_first_uid: bool,
    /// Save the result file every this many candidate arrivals
    pub update_interval: usize,
    /// Concurrent lookups
    pub concurrency: usize,
}

fn default_crs() -> Crs {
    Crs::Wgs84
}

fn default_responses() -> PathBuf {
    PathBuf::from("responses")
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            radius: 1000,
            radius_limit: true,
            prim_ind: IndustryFilter::None,
            sec_ind: IndustryFilter::None,
            ak: Vec::new(),
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_aoi_area: 0.0,
            max_aoi_area: f64::INFINITY,
            min_similarity: 0.0,
        }
    }
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            by_search_rank: 1,
            by_area: 0,
            by_distance: 1,
            by_similarity: 1,
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            use_first_uid: false,
            update_interval: 150,
            concurrency: 25,
        }
    }
}

impl Settings {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let settings: Settings = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(settings)
    }

    /// Check every setting; the first problem found is returned
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.search.radius == 0 {
            return Err(ConfigError::ZeroRadius);
        }
        if self.run.update_interval == 0 {
            return Err(ConfigError::ZeroUpdateInterval);
        }
        if self.run.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if let Some(shp) = &self.input.output_shp {
            if shp.extension().and_then(|e| e.to_str()) != Some("shp") {
                return Err(ConfigError::NotShapefile(shp.clone()));
            }
        }
        self.validation_policy()?;
        self.ranking_policy()?;
        Ok(())
    }

    pub fn ranking_policy(&self) -> Result<RankingPolicy, PolicyError> {
        let r = &self.ranking;
        RankingPolicy::new(r.by_search_rank, r.by_area, r.by_distance, r.by_similarity)
    }

    pub fn validation_policy(&self) -> Result<ValidationPolicy, PolicyError> {
        let f = &self.filter;
        ValidationPolicy::new(f.min_aoi_area, f.max_aoi_area, f.min_similarity)
    }

    pub fn search_filter(&self) -> SearchFilter {
        SearchFilter::new(f64::from(self.search.radius))
            .with_industry(self.search.prim_ind.clone(), self.search.sec_ind.clone())
            .with_first_uid_only(self.run.use_first_uid)
    }

    pub fn match_settings(&self) -> Result<MatchSettings, ConfigError> {
        Ok(MatchSettings {
            validation: self.validation_policy()?,
            ranking: self.ranking_policy()?,
            search: self.search_filter(),
        })
    }

    pub fn query_builder(&self) -> QueryBuilder {
        QueryBuilder::new(
            self.search.ak.clone(),
            self.search.radius,
            self.search.radius_limit,
        )
    }
}
