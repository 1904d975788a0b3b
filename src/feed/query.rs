//! Request URL assembly for the search and AOI endpoints.

use std::sync::atomic::{AtomicUsize, Ordering};

use url::Url;

use crate::models::Poi;

pub const SEARCH_ENDPOINT: &str = "http://api.map.baidu.com/place/v2/search";
pub const AOI_ENDPOINT: &str = "https://map.baidu.com/";

/// Builds request URLs, rotating through the configured API keys
#[derive(Debug)]
pub struct QueryBuilder {
    keys: Vec<String>,
    next_key: AtomicUsize,
    radius_m: u32,
    radius_limit: bool,
}

impl QueryBuilder {
    pub fn new(keys: Vec<String>, radius_m: u32, radius_limit: bool) -> Self {
        Self {
            keys,
            next_key: AtomicUsize::new(0),
            radius_m,
            radius_limit,
        }
    }

    fn next_key(&self) -> Option<&str> {
        if self.keys.is_empty() {
            return None;
        }
        let idx = self.next_key.fetch_add(1, Ordering::Relaxed) % self.keys.len();
        Some(&self.keys[idx])
    }

    /// Circular-area search around the POI.
    ///
    /// `industry_tag` is the resolved "prim;sec" filter; empty searches all
    /// categories (`scope=1`).
    pub fn search_url(&self, poi: &Poi, industry_tag: &str) -> Result<Url, url::ParseError> {
        let location = format!("{},{}", poi.location.lat, poi.location.lng);
        let radius = self.radius_m.to_string();
        let mut params: Vec<(&str, &str)> = vec![
            ("query", poi.name.as_str()),
            ("location", location.as_str()),
            ("radius", radius.as_str()),
            ("radius_limit", if self.radius_limit { "true" } else { "false" }),
        ];
        if let Some(ak) = self.next_key() {
            params.push(("ak", ak));
        }
        params.push(("output", "json"));
        params.push(("coord_type", "1"));
        if industry_tag.is_empty() {
            params.push(("scope", "1"));
        } else {
            params.push(("tag", industry_tag));
            params.push(("scope", "2"));
        }
        Url::parse_with_params(SEARCH_ENDPOINT, &params)
    }

    /// Geometry lookup for one candidate uid
    pub fn aoi_url(&self, uid: &str) -> Result<Url, url::ParseError> {
        Url::parse_with_params(
            AOI_ENDPOINT,
            &[
                ("newmap", "1"),
                ("qt", "ext"),
                ("uid", uid),
                ("ext_ver", "new"),
                ("ie", "utf-8"),
                ("l", "11"),
            ],
        )
    }
}
