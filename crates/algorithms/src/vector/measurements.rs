//! Area measurement and size classification of gap polygons

use canopygap_core::raster::Raster;
use canopygap_core::vector::{LinearUnit, PolygonCollection, PolygonRecord, SizeClass};
use canopygap_core::{RasterElement, Result};
use geo::{Area as GeoArea, Geometry, Polygon};
use serde::Serialize;

/// Unsigned planar area of a geometry in squared CRS units.
///
/// Only areal geometries contribute; points and lines have zero area.
pub fn area(geom: &Geometry<f64>) -> f64 {
    match geom {
        Geometry::Polygon(p) => p.unsigned_area(),
        Geometry::MultiPolygon(mp) => mp.unsigned_area(),
        Geometry::Rect(r) => r.unsigned_area(),
        Geometry::Triangle(t) => t.unsigned_area(),
        Geometry::GeometryCollection(gc) => gc.iter().map(area).sum(),
        _ => 0.0,
    }
}

/// Size bucket for an area already expressed in acres
pub fn classify_by_area(acres: f64) -> SizeClass {
    SizeClass::from_acres(acres)
}

/// Fill in `area`, `acres` and `size_class` on every record.
///
/// `unit` is the linear unit of the collection's CRS.
pub fn compute_area(collection: &PolygonCollection, unit: LinearUnit) -> PolygonCollection {
    let records = collection
        .iter()
        .map(|record| {
            let sq_units = area(&record.geometry);
            let acres = unit.to_acres(sq_units);
            PolygonRecord {
                area: Some(sq_units),
                acres: Some(acres),
                size_class: Some(classify_by_area(acres)),
                ..record.clone()
            }
        })
        .collect();

    PolygonCollection {
        crs: collection.crs.clone(),
        records,
    }
}

/// Polygon covering the full extent of a georeferenced raster
pub fn raster_bounds_polygon<T: RasterElement>(raster: &Raster<T>) -> Result<Polygon<f64>> {
    raster.bounds_polygon()
}

/// Count of polygons in one size bucket
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SizeClassCount {
    pub size_class: SizeClass,
    pub label: &'static str,
    pub count: usize,
    pub acres: f64,
}

/// Summary statistics over a measured collection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AreaSummary {
    pub count: usize,
    pub total_area: f64,
    pub total_acres: f64,
    pub mean_area: f64,
    pub min_area: f64,
    pub max_area: f64,
    /// Population standard deviation of record areas
    pub std_area: f64,
    /// One entry per size bucket, smallest first, including empty buckets
    pub by_size_class: Vec<SizeClassCount>,
}

/// Summarize record areas, measuring any record that has no `area` yet.
///
/// An empty collection yields zero counts and zero statistics.
pub fn area_summary(collection: &PolygonCollection, unit: LinearUnit) -> AreaSummary {
    let measured: Vec<(f64, f64)> = collection
        .iter()
        .map(|r| {
            let sq_units = r.area.unwrap_or_else(|| area(&r.geometry));
            let acres = r.acres.unwrap_or_else(|| unit.to_acres(sq_units));
            (sq_units, acres)
        })
        .collect();

    let mut by_size_class: Vec<SizeClassCount> = SizeClass::ALL
        .iter()
        .map(|&size_class| SizeClassCount {
            size_class,
            label: size_class.label(),
            count: 0,
            acres: 0.0,
        })
        .collect();

    for &(_, acres) in &measured {
        let bucket = classify_by_area(acres);
        if let Some(entry) = by_size_class.iter_mut().find(|e| e.size_class == bucket) {
            entry.count += 1;
            entry.acres += acres;
        }
    }

    let count = measured.len();
    if count == 0 {
        return AreaSummary {
            count: 0,
            total_area: 0.0,
            total_acres: 0.0,
            mean_area: 0.0,
            min_area: 0.0,
            max_area: 0.0,
            std_area: 0.0,
            by_size_class,
        };
    }

    let total_area: f64 = measured.iter().map(|m| m.0).sum();
    let total_acres: f64 = measured.iter().map(|m| m.1).sum();
    let mean_area = total_area / count as f64;
    let min_area = measured.iter().map(|m| m.0).fold(f64::INFINITY, f64::min);
    let max_area = measured.iter().map(|m| m.0).fold(f64::NEG_INFINITY, f64::max);
    let variance = measured
        .iter()
        .map(|m| (m.0 - mean_area).powi(2))
        .sum::<f64>()
        / count as f64;

    AreaSummary {
        count,
        total_area,
        total_acres,
        mean_area,
        min_area,
        max_area,
        std_area: variance.sqrt(),
        by_size_class,
    }
}
