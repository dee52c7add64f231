//! GeoJSON reading and writing for polygon collections
//!
//! Only areal geometries are kept (Polygon, MultiPolygon, and collections
//! of them). The CRS comes from the legacy `crs` member when present,
//! otherwise from a caller-supplied default.

use anyhow::{bail, Context, Result};
use canopygap_core::vector::{geometry_polygons, PolygonCollection, PolygonRecord};
use canopygap_core::CRS;
use geo::{Geometry, MultiPolygon, Polygon};
use geojson::{Feature, FeatureCollection, GeoJson, JsonObject};
use serde_json::{json, Value};
use std::path::Path;

/// CRS from a legacy `{"type": "name", "properties": {"name": ...}}` member
fn parse_named_crs(crs: &Value) -> Option<CRS> {
    let name = crs.get("properties")?.get("name")?.as_str()?;
    if name.ends_with("CRS84") {
        return Some(CRS::wgs84());
    }
    // urn:ogc:def:crs:EPSG::2232 or EPSG:2232
    let code = name.rsplit(':').next()?;
    code.parse::<u32>().ok().map(CRS::from_epsg)
}

fn member_crs(members: Option<&JsonObject>) -> Option<CRS> {
    members.and_then(|m| m.get("crs")).and_then(parse_named_crs)
}

fn named_crs(crs: &CRS) -> Option<JsonObject> {
    crs.epsg().map(|code| {
        let mut members = JsonObject::new();
        members.insert(
            "crs".into(),
            json!({
                "type": "name",
                "properties": { "name": format!("urn:ogc:def:crs:EPSG::{}", code) }
            }),
        );
        members
    })
}

/// Parse a GeoJSON document into a polygon collection.
///
/// `default_crs` applies when the document does not name one.
pub fn parse_polygons(text: &str, default_crs: Option<CRS>) -> Result<PolygonCollection> {
    let document: GeoJson = text.parse().context("Invalid GeoJSON")?;
    let (crs, geometries) = match document {
        GeoJson::FeatureCollection(fc) => (
            member_crs(fc.foreign_members.as_ref()),
            fc.features.into_iter().filter_map(|f| f.geometry).collect::<Vec<_>>(),
        ),
        GeoJson::Feature(f) => (member_crs(f.foreign_members.as_ref()), f.geometry.into_iter().collect()),
        GeoJson::Geometry(g) => (member_crs(g.foreign_members.as_ref()), vec![g]),
    };

    let mut collection = PolygonCollection::new(crs.or(default_crs));
    for geometry in geometries {
        let geometry = Geometry::<f64>::try_from(geometry).context("Unsupported GeoJSON geometry")?;
        let polygons = geometry_polygons(&geometry);
        if polygons.is_empty() {
            continue;
        }
        let id = collection.len();
        let record = match <[Polygon<f64>; 1]>::try_from(polygons) {
            Ok([single]) => PolygonRecord::new(id, single),
            Err(parts) => PolygonRecord::new(id, MultiPolygon::new(parts)),
        };
        collection.push(record);
    }
    if collection.is_empty() {
        bail!("GeoJSON holds no polygon features");
    }
    Ok(collection)
}

/// Read a GeoJSON file of polygons
pub fn read_polygons(path: &Path, default_crs: Option<CRS>) -> Result<PolygonCollection> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_polygons(&text, default_crs).with_context(|| format!("Failed to parse {}", path.display()))
}

fn record_properties(record: &PolygonRecord) -> JsonObject {
    let mut props = JsonObject::new();
    props.insert("id".into(), json!(record.id));
    if let Some(class) = record.class {
        props.insert("class".into(), json!(class));
    }
    if let Some(area) = record.area {
        props.insert("area".into(), json!(area));
    }
    if let Some(acres) = record.acres {
        props.insert("acres".into(), json!(acres));
    }
    if let Some(size_class) = record.size_class {
        props.insert("size_class".into(), json!(size_class.label()));
    }
    props
}

/// Render a collection as a GeoJSON FeatureCollection string
pub fn to_geojson_string(collection: &PolygonCollection) -> Result<String> {
    let fc = FeatureCollection {
        bbox: None,
        features: collection
            .iter()
            .map(|record| Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(geojson::Value::from(&record.geometry))),
                id: None,
                properties: Some(record_properties(record)),
                foreign_members: None,
            })
            .collect(),
        foreign_members: collection.crs().and_then(named_crs),
    };
    serde_json::to_string_pretty(&fc).context("Failed to serialize GeoJSON")
}

/// Write a collection as a GeoJSON file
pub fn write_polygons(collection: &PolygonCollection, path: &Path) -> Result<()> {
    let text = to_geojson_string(collection)?;
    std::fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))
}
