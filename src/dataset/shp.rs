//! Shapefile export of the resolved AOI polygons (EPSG:4326).

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use geo::{LineString, Polygon};
use shapefile::dbase::{FieldName, FieldValue, Record, TableWriterBuilder};
use shapefile::{Point as ShpPoint, Polygon as ShpPolygon, PolygonRing, Writer};
use tracing::{debug, warn};

use super::{polygon_from_wkt, PoiTable};
use crate::models::{PoiId, PoiResult};

/// GCS WGS 1984 in ESRI well-known text, written as the `.prj` sidecar
const WGS84_PRJ: &str = r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;

/// Widest dBase character field
const FIELD_BYTES: u8 = 254;

const FIELDS: [&str; 3] = ["name", "status", "uid_name"];

struct ShapeRow<'a> {
    name: &'a str,
    status: &'static str,
    uid_name: &'a str,
    polygon: Polygon<f64>,
}

impl PoiTable {
    /// Write every row that has a polygon to a shapefile at `path`.
    ///
    /// Rows take their polygon from `result_of` first, then from the prior
    /// `geometry` column. Nothing is written when no row has a polygon.
    /// Returns the number of shapes written.
    pub fn write_shapefile<'a, P, F>(&'a self, path: P, result_of: F) -> Result<usize>
    where
        P: AsRef<Path>,
        F: Fn(PoiId) -> Option<&'a PoiResult>,
    {
        let path = path.as_ref();
        let shapes = self.shape_rows(result_of);
        if shapes.is_empty() {
            debug!("No polygons to export to {}", path.display());
            return Ok(0);
        }

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }

        let mut table = TableWriterBuilder::new();
        for name in FIELDS {
            let field = FieldName::try_from(name)
                .map_err(|e| anyhow!("Invalid dBase field name {}: {:?}", name, e))?;
            table = table.add_character_field(field, FIELD_BYTES);
        }

        let mut writer = Writer::from_path(path, table)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        for shape in &shapes {
            let mut record = Record::default();
            for (field, value) in FIELDS.iter().zip([shape.name, shape.status, shape.uid_name]) {
                record.insert(
                    field.to_string(),
                    FieldValue::Character(Some(fit_field(value).to_string())),
                );
            }
            writer
                .write_shape_and_record(&to_shape(&shape.polygon), &record)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        // Headers are completed when the writer is dropped
        drop(writer);

        fs::write(path.with_extension("prj"), WGS84_PRJ)
            .with_context(|| format!("Failed to write projection for {}", path.display()))?;
        fs::write(path.with_extension("cpg"), "UTF-8")
            .with_context(|| format!("Failed to write code page for {}", path.display()))?;
        Ok(shapes.len())
    }

    fn shape_rows<'a, F>(&'a self, result_of: F) -> Vec<ShapeRow<'a>>
    where
        F: Fn(PoiId) -> Option<&'a PoiResult>,
    {
        let mut shapes = Vec::new();
        for row in &self.rows {
            let name = row.poi.name.as_str();
            match (result_of(row.poi.id), &row.prior) {
                (Some(result), _) => {
                    if let Some(polygon) = result.geometry() {
                        shapes.push(ShapeRow {
                            name,
                            status: result.outcome.status_label(),
                            uid_name: result.source_name().unwrap_or(""),
                            polygon: polygon.clone(),
                        });
                    }
                }
                (None, Some(prior)) if !prior.geometry.is_empty() => {
                    match polygon_from_wkt(&prior.geometry) {
                        Some(polygon) => shapes.push(ShapeRow {
                            name,
                            status: prior.outcome.status_label(),
                            uid_name: &prior.uid_name,
                            polygon,
                        }),
                        None => {
                            warn!("POI {}: unreadable geometry {:?}", row.poi.id, prior.geometry)
                        }
                    }
                }
                _ => {}
            }
        }
        shapes
    }
}

/// Longest prefix of `value` that fits a character field
fn fit_field(value: &str) -> &str {
    let limit = usize::from(FIELD_BYTES);
    if value.len() <= limit {
        return value;
    }
    let mut end = limit;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

fn to_shape(polygon: &Polygon<f64>) -> ShpPolygon {
    let ring = |ls: &LineString<f64>| -> Vec<ShpPoint> {
        ls.coords().map(|c| ShpPoint::new(c.x, c.y)).collect()
    };
    let mut rings = vec![PolygonRing::Outer(ring(polygon.exterior()))];
    rings.extend(polygon.interiors().iter().map(|r| PolygonRing::Inner(ring(r))));
    ShpPolygon::with_rings(rings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::{CandidateValidator, IndustryFilter, RankingPolicy, ValidationPolicy};
    use crate::models::{CandidateDraft, CandidateRequest, Crs};

    const CSV: &str = "\
name,lng,lat
北京大学,116.3,39.9
清华大学,116.32,40.0
";

    fn square() -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![
                (116.29, 39.89),
                (116.31, 39.89),
                (116.31, 39.91),
                (116.29, 39.91),
                (116.29, 39.89),
            ]),
            vec![],
        )
    }

    fn load(path: &Path) -> PoiTable {
        PoiTable::load(path, Crs::Wgs84, &IndustryFilter::None, &IndustryFilter::None).unwrap()
    }

    fn text(record: &Record, field: &str) -> String {
        match record.get(field) {
            Some(FieldValue::Character(Some(value))) => value.trim().to_string(),
            other => panic!("unexpected {} value: {:?}", field, other),
        }
    }

    fn read(path: &Path) -> Vec<(ShpPolygon, Record)> {
        shapefile::read_as::<_, ShpPolygon, Record>(path).unwrap()
    }

    #[test]
    fn test_export_matched_and_prior_polygons() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("poi.csv");
        let csv_out = dir.path().join("aoi.csv");
        let shp_out = dir.path().join("shp/aoi.shp");
        std::fs::write(&input, CSV).unwrap();
        let table = load(&input);

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
        let result_of = |id: PoiId| (id == PoiId(0)).then_some(&matched);

        assert_eq!(table.write_shapefile(&shp_out, result_of).unwrap(), 1);
        let shapes = read(&shp_out);
        assert_eq!(shapes.len(), 1);
        let (polygon, record) = &shapes[0];
        assert_eq!(text(record, "name"), "北京大学");
        assert_eq!(text(record, "status"), "Matched");
        assert_eq!(text(record, "uid_name"), "北京大学");
        assert_eq!(polygon.rings().len(), 1);
        let points = polygon.rings()[0].points();
        assert!(points.iter().any(|p| p.x == 116.31 && p.y == 39.91));
        assert!(points.iter().all(|p| (116.29..=116.31).contains(&p.x)));
        assert!(shp_out.with_extension("prj").exists());
        assert!(shp_out.with_extension("dbf").exists());

        // a resumed table exports the polygon kept in its geometry column
        table.write_results(&csv_out, result_of).unwrap();
        let resumed = load(&csv_out);
        std::fs::remove_file(&shp_out).unwrap();
        assert_eq!(resumed.write_shapefile(&shp_out, |_| None).unwrap(), 1);
        let shapes = read(&shp_out);
        assert_eq!(text(&shapes[0].1, "status"), "Matched");
        assert_eq!(shapes[0].0.rings()[0].points().len(), 5);
    }

    #[test]
    fn test_nothing_written_without_polygons() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("poi.csv");
        let shp_out = dir.path().join("aoi.shp");
        std::fs::write(&input, CSV).unwrap();

        let unmatched = PoiResult::unmatched(PoiId(1), crate::models::Outcome::NoCandidates);
        let written = load(&input)
            .write_shapefile(&shp_out, |id| (id == PoiId(1)).then_some(&unmatched))
            .unwrap();
        assert_eq!(written, 0);
        assert!(!shp_out.exists());
    }

    #[test]
    fn test_fit_field_keeps_char_boundaries() {
        let long = "北".repeat(100);
        let fitted = fit_field(&long);
        assert_eq!(fitted.len(), 252);
        assert!(fit_field("short") == "short");
    }
}
