//! POI table loading and result persistence.
//!
//! Input is a CSV (optionally gzip-compressed) with `name`, `lng`, `lat` and
//! optional `prim_ind`, `sec_ind` columns. The result file repeats the input
//! columns and appends `status, uid_name, lng_wgs84, lat_wgs84, geometry`.
//! A result file can be loaded again as input; rows that already carry a
//! terminal status are passed through untouched. Polygons can also be
//! exported as a shapefile.

mod shp;

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use geo::{Coord, LineString, Polygon};
use rayon::prelude::*;
use tracing::info;

use crate::matching::IndustryFilter;
use crate::models::{Crs, Outcome, Point, Poi, PoiId, PoiResult};
use crate::progress::ProgressSnapshot;

/// Columns appended to the input columns in the result file
pub const RESULT_COLUMNS: [&str; 5] =
    ["status", "uid_name", "lng_wgs84", "lat_wgs84", "geometry"];

/// Result columns carried over from a previous run
#[derive(Debug, Clone, PartialEq)]
pub struct PriorResult {
    pub outcome: Outcome,
    pub uid_name: String,
    /// WKT, empty unless matched
    pub geometry: String,
}

#[derive(Debug, Clone)]
pub struct PoiRow {
    pub poi: Poi,
    /// Input columns as read, result columns excluded
    fields: Vec<String>,
    pub prior: Option<PriorResult>,
}

/// The loaded POI dataset
#[derive(Debug, Clone)]
pub struct PoiTable {
    headers: Vec<String>,
    rows: Vec<PoiRow>,
}

struct RawRow {
    fields: Vec<String>,
    name: String,
    lng: f64,
    lat: f64,
    prim_ind: Option<String>,
    sec_ind: Option<String>,
    prior: Option<PriorResult>,
}

fn open_reader(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let reader = BufReader::new(file);
    if path.extension().and_then(|e| e.to_str()) == Some("gz") {
        Ok(Box::new(GzDecoder::new(reader)))
    } else {
        Ok(Box::new(reader))
    }
}

fn require_column(headers: &csv::StringRecord, name: &str) -> Result<usize> {
    match headers.iter().position(|h| h == name) {
        Some(idx) => Ok(idx),
        None => bail!("Column \"{}\" is missing.", name),
    }
}

fn optional_column(
    headers: &csv::StringRecord,
    name: &str,
    filter: &IndustryFilter,
) -> Result<Option<usize>> {
    if filter.is_per_record() {
        require_column(headers, name).map(Some)
    } else {
        Ok(headers.iter().position(|h| h == name))
    }
}

fn parse_coord(value: &str, column: &str, row: usize) -> Result<f64> {
    value
        .trim()
        .parse::<f64>()
        .with_context(|| format!("Row {}: invalid {} value {:?}", row + 1, column, value))
}

impl PoiTable {
    /// Load POIs from a CSV file, normalizing coordinates from `crs` to WGS84.
    ///
    /// `per_record` industry filters require the matching column.
    pub fn load<P: AsRef<Path>>(
        path: P,
        crs: Crs,
        prim_ind: &IndustryFilter,
        sec_ind: &IndustryFilter,
    ) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::Reader::from_reader(open_reader(path)?);
        let headers = reader
            .headers()
            .with_context(|| format!("Failed to read header of {}", path.display()))?
            .clone();

        let name_idx = require_column(&headers, "name")?;
        let lng_idx = require_column(&headers, "lng")?;
        let lat_idx = require_column(&headers, "lat")?;
        let prim_idx = optional_column(&headers, "prim_ind", prim_ind)?;
        let sec_idx = optional_column(&headers, "sec_ind", sec_ind)?;
        let status_idx = headers.iter().position(|h| h == "status");
        let uid_name_idx = headers.iter().position(|h| h == "uid_name");
        let geometry_idx = headers.iter().position(|h| h == "geometry");

        let input_columns: Vec<usize> = (0..headers.len())
            .filter(|idx| !RESULT_COLUMNS.contains(&&headers[*idx]))
            .collect();

        let mut raw_rows = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record = record.with_context(|| format!("Failed to read row {}", row + 1))?;
            let field = |idx: Option<usize>| {
                idx.and_then(|i| record.get(i))
                    .map(str::to_string)
                    .filter(|s| !s.is_empty())
            };

            let prior = field(status_idx)
                .and_then(|s| Outcome::from_status_label(&s))
                .map(|outcome| PriorResult {
                    outcome,
                    uid_name: field(uid_name_idx).unwrap_or_default(),
                    geometry: field(geometry_idx).unwrap_or_default(),
                });

            raw_rows.push(RawRow {
                fields: input_columns
                    .iter()
                    .map(|i| record.get(*i).unwrap_or("").to_string())
                    .collect(),
                name: record.get(name_idx).unwrap_or("").to_string(),
                lng: parse_coord(record.get(lng_idx).unwrap_or(""), "lng", row)?,
                lat: parse_coord(record.get(lat_idx).unwrap_or(""), "lat", row)?,
                prim_ind: field(prim_idx),
                sec_ind: field(sec_idx),
                prior,
            });
        }

        let rows: Vec<PoiRow> = raw_rows
            .into_par_iter()
            .enumerate()
            .map(|(idx, raw)| PoiRow {
                poi: Poi::new(PoiId(idx), raw.name, Point::new(raw.lng, raw.lat, crs))
                    .with_industry(raw.prim_ind, raw.sec_ind),
                fields: raw.fields,
                prior: raw.prior,
            })
            .collect();

        let table = Self {
            headers: input_columns.iter().map(|i| headers[*i].to_string()).collect(),
            rows,
        };
        info!(
            "Loaded {} POIs from {} ({} already resolved)",
            table.len(),
            path.display(),
            table.progress().resolved()
        );
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[PoiRow] {
        &self.rows
    }

    /// POIs without a terminal status from a previous run
    pub fn pending_pois(&self) -> Vec<Poi> {
        self.rows
            .iter()
            .filter(|r| r.prior.is_none())
            .map(|r| r.poi.clone())
            .collect()
    }

    /// Counts of the statuses already present in the table
    pub fn progress(&self) -> ProgressSnapshot {
        let mut snapshot = ProgressSnapshot {
            total: self.rows.len(),
            ..Default::default()
        };
        for prior in self.rows.iter().filter_map(|r| r.prior.as_ref()) {
            match prior.outcome {
                Outcome::Matched => snapshot.matched += 1,
                Outcome::NoCandidates => snapshot.no_uid += 1,
                Outcome::NoValidGeometry => snapshot.no_geometry += 1,
            }
        }
        snapshot
    }

    /// Write the table with result columns to `path`.
    ///
    /// `result_of` supplies this run's results; rows without one keep their
    /// prior columns. The file is written to a temporary sibling and renamed
    /// into place.
    pub fn write_results<'a, P, F>(&self, path: P, result_of: F) -> Result<()>
    where
        P: AsRef<Path>,
        F: Fn(PoiId) -> Option<&'a PoiResult>,
    {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
        {
            let mut writer = csv::Writer::from_writer(&mut tmp);
            writer.write_record(self.headers.iter().map(String::as_str).chain(RESULT_COLUMNS))?;

            for row in &self.rows {
                let (status, uid_name, geometry) = match (result_of(row.poi.id), &row.prior) {
                    (Some(result), _) => (
                        result.outcome.status_label().to_string(),
                        result.source_name().unwrap_or("").to_string(),
                        result.geometry().map(polygon_to_wkt).unwrap_or_default(),
                    ),
                    (None, Some(prior)) => (
                        prior.outcome.status_label().to_string(),
                        prior.uid_name.clone(),
                        prior.geometry.clone(),
                    ),
                    (None, None) => Default::default(),
                };
                let lng = row.poi.location.lng.to_string();
                let lat = row.poi.location.lat.to_string();
                writer.write_record(row.fields.iter().map(String::as_str).chain([
                    status.as_str(),
                    uid_name.as_str(),
                    lng.as_str(),
                    lat.as_str(),
                    geometry.as_str(),
                ]))?;
            }
            writer.flush()?;
        }

        tmp.persist(path)
            .with_context(|| format!("Failed to save {}", path.display()))?;
        Ok(())
    }
}

/// Well-known text of a polygon, e.g. `POLYGON ((x y, x y, ...))`
pub fn polygon_to_wkt(polygon: &Polygon<f64>) -> String {
    let ring = |ls: &LineString<f64>| {
        let coords: Vec<String> = ls.coords().map(|c| format!("{} {}", c.x, c.y)).collect();
        format!("({})", coords.join(", "))
    };
    let rings: Vec<String> = std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(ring)
        .collect();
    format!("POLYGON ({})", rings.join(", "))
}

/// Parse the `POLYGON ((...), (...))` text written by [`polygon_to_wkt`]
pub fn polygon_from_wkt(wkt: &str) -> Option<Polygon<f64>> {
    let body = wkt
        .trim()
        .strip_prefix("POLYGON")?
        .trim()
        .strip_prefix('(')?
        .strip_suffix(')')?;

    let mut rings = body.split("),").map(|ring| {
        let ring = ring.trim().trim_start_matches('(').trim_end_matches(')');
        ring.split(',')
            .map(|pair| {
                let mut values = pair.split_whitespace().map(str::parse::<f64>);
                match (values.next(), values.next(), values.next()) {
                    (Some(Ok(x)), Some(Ok(y)), None) => Some(Coord { x, y }),
                    _ => None,
                }
            })
            .collect::<Option<Vec<_>>>()
            .map(LineString::new)
    });
    let exterior = rings.next()??;
    let interiors = rings.collect::<Option<Vec<_>>>()?;
    Some(Polygon::new(exterior, interiors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::{CandidateValidator, RankingPolicy, ValidationPolicy};
    use crate::models::{CandidateDraft, CandidateRequest};
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    const CSV: &str = "\
id,name,lng,lat,prim_ind,sec_ind
a,北京大学,116.3,39.9,教育培训,高等院校
b,清华大学,116.32,40.0,,
";

    fn load(path: &Path, crs: Crs) -> Result<PoiTable> {
        PoiTable::load(path, crs, &IndustryFilter::None, &IndustryFilter::None)
    }

    fn square() -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![
                (116.29, 39.89),
                (116.31, 39.89),
                (116.31, 39.91),
                (116.29, 39.89),
            ]),
            vec![],
        )
    }

    #[test]
    fn test_load_plain_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("poi.csv");
        std::fs::write(&path, CSV).unwrap();

        let table = PoiTable::load(
            &path,
            Crs::Wgs84,
            &IndustryFilter::PerRecord,
            &IndustryFilter::None,
        )
        .unwrap();
        assert_eq!(table.len(), 2);
        let first = &table.rows()[0].poi;
        assert_eq!(first.id, PoiId(0));
        assert_eq!(first.name, "北京大学");
        assert_eq!(first.prim_ind.as_deref(), Some("教育培训"));
        assert!(table.rows()[1].poi.prim_ind.is_none());
        assert_eq!(table.pending_pois().len(), 2);
    }

    #[test]
    fn test_load_gzip_and_convert_crs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("poi.csv.gz");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder.write_all(CSV.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let table = load(&path, Crs::Gcj02).unwrap();
        let location = table.rows()[0].poi.location;
        assert_eq!(location.crs, Crs::Wgs84);
        assert!(location.lng < 116.3 && location.lng > 116.29);
    }

    #[test]
    fn test_missing_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("poi.csv");
        std::fs::write(&path, "name,lng\nx,116.3\n").unwrap();
        let err = load(&path, Crs::Wgs84).unwrap_err();
        assert!(err.to_string().contains("\"lat\""));

        std::fs::write(&path, "name,lng,lat\nx,116.3,39.9\n").unwrap();
        let per_record = &IndustryFilter::PerRecord;
        assert!(PoiTable::load(&path, Crs::Wgs84, &IndustryFilter::None, per_record).is_err());
        assert!(load(&path, Crs::Wgs84).is_ok());
    }

    #[test]
    fn test_write_and_resume() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("poi.csv");
        let output = dir.path().join("out/aoi.csv");
        std::fs::write(&input, CSV).unwrap();
        let table = load(&input, Crs::Wgs84).unwrap();

        let validator =
            CandidateValidator::new(ValidationPolicy::default(), RankingPolicy::default());
        let poi = &table.rows()[0].poi;
        let request = CandidateRequest {
            poi: poi.id,
            uid: "u1".to_string(),
            name: "北京大学".to_string(),
            search_rank: 1,
        };
        let winner = validator.validate(poi, CandidateDraft::new(request, square())).unwrap();
        let matched = PoiResult::matched(PoiId(0), winner);
        table
            .write_results(&output, |id| (id == PoiId(0)).then_some(&matched))
            .unwrap();

        let resumed = load(&output, Crs::Wgs84).unwrap();
        assert_eq!(resumed.len(), 2);
        let prior = resumed.rows()[0].prior.as_ref().unwrap();
        assert_eq!(prior.outcome, Outcome::Matched);
        assert_eq!(prior.uid_name, "北京大学");
        assert!(prior.geometry.starts_with("POLYGON ((116.29 39.89, "));
        assert!(resumed.rows()[1].prior.is_none());
        assert_eq!(resumed.pending_pois().len(), 1);
        assert_eq!(resumed.progress().to_string(), "C/N_Uid/N_Geo/Total: 1/0/0/2");

        // prior results survive a save with no new results
        resumed.write_results(&output, |_| None).unwrap();
        let again = load(&output, Crs::Wgs84).unwrap();
        assert_eq!(again.rows()[0].prior, resumed.rows()[0].prior);
        assert_eq!(again.rows()[0].poi.name, "北京大学");
    }

    #[test]
    fn test_polygon_from_wkt() {
        let hole = LineString::from(vec![(116.3, 39.895), (116.305, 39.895), (116.3, 39.9)]);
        let polygon = Polygon::new(square().exterior().clone(), vec![hole]);
        let parsed = polygon_from_wkt(&polygon_to_wkt(&polygon)).unwrap();
        assert_eq!(parsed, polygon);

        assert!(polygon_from_wkt("").is_none());
        assert!(polygon_from_wkt("POLYGON EMPTY").is_none());
        assert!(polygon_from_wkt("POLYGON ((116.3 39.9, 116.31))").is_none());
    }

    #[test]
    fn test_polygon_wkt() {
        let wkt = polygon_to_wkt(&square());
        assert_eq!(
            wkt,
            "POLYGON ((116.29 39.89, 116.31 39.89, 116.31 39.91, 116.29 39.89))"
        );
    }
}
