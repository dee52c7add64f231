//! Polygon overlay: dissolve, clip and difference
//!
//! All set operations go through `geo::BooleanOps` on multi-polygons.
//! Binary operations require both operands to carry the same CRS.

use crate::maybe_rayon::*;
use canopygap_core::crs::require_same_crs;
use canopygap_core::vector::{PolygonCollection, PolygonRecord};
use canopygap_core::Result;
use geo::{BooleanOps, MultiPolygon};
use std::collections::BTreeMap;
use tracing::debug;

/// Class label of canopy polygons
pub const CANOPY_CLASS: u8 = 1;
/// Class label of gap (not canopy) polygons
pub const GAP_CLASS: u8 = 0;

/// Union of many multi-polygons, merged pairwise in a balanced tree
pub fn union_all(parts: Vec<MultiPolygon<f64>>) -> MultiPolygon<f64> {
    let mut layer = parts;
    if layer.is_empty() {
        return MultiPolygon::new(Vec::new());
    }

    while layer.len() > 1 {
        let pairs = layer.len().div_ceil(2);
        let current = &layer;
        layer = (0..pairs)
            .into_par_iter()
            .map(|i| match current.get(2 * i + 1) {
                Some(right) => current[2 * i].union(right),
                None => current[2 * i].clone(),
            })
            .collect();
    }

    layer.pop().unwrap_or_else(|| MultiPolygon::new(Vec::new()))
}

fn record_parts(collection: &PolygonCollection) -> Vec<MultiPolygon<f64>> {
    collection
        .iter()
        .map(|r| MultiPolygon::new(r.polygons()))
        .filter(|mp| !mp.0.is_empty())
        .collect()
}

/// Merge every record into a single geometry.
///
/// The result always holds exactly one record (possibly an empty
/// multi-polygon). Its class is the records' shared class, if they all
/// agree.
pub fn dissolve(collection: &PolygonCollection) -> PolygonCollection {
    let merged = union_all(record_parts(collection));

    let mut classes = collection.iter().map(|r| r.class);
    let first = classes.next().flatten();
    let class = if classes.all(|c| c == first) { first } else { None };

    debug!(
        inputs = collection.len(),
        parts = merged.0.len(),
        "dissolved polygons"
    );

    let mut record = PolygonRecord::new(0, merged);
    record.class = class;
    PolygonCollection {
        crs: collection.crs.clone(),
        records: vec![record],
    }
}

/// Merge records sharing a class label: one record per class, ordered by
/// class. Unlabeled records are grouped together last.
pub fn dissolve_by_class(collection: &PolygonCollection) -> PolygonCollection {
    let mut groups: BTreeMap<Option<u8>, Vec<MultiPolygon<f64>>> = BTreeMap::new();
    for record in collection.iter() {
        groups
            .entry(record.class)
            .or_default()
            .push(MultiPolygon::new(record.polygons()));
    }

    // BTreeMap orders None first; labelled classes go ahead of it
    let mut entries: Vec<(Option<u8>, Vec<MultiPolygon<f64>>)> = groups.into_iter().collect();
    entries.sort_by_key(|(class, _)| (class.is_none(), *class));

    let records = entries
        .into_iter()
        .enumerate()
        .map(|(id, (class, parts))| {
            let mut record = PolygonRecord::new(id, union_all(parts));
            record.class = class;
            record
        })
        .collect();

    PolygonCollection {
        crs: collection.crs.clone(),
        records,
    }
}

/// Portion of `canopy` inside `boundary`, as one canopy-class record.
///
/// Fails with a CRS error when either side lacks a CRS or they differ.
pub fn clip_intersect(canopy: &PolygonCollection, boundary: &PolygonCollection) -> Result<PolygonCollection> {
    require_same_crs(canopy.crs(), boundary.crs(), "canopy", "boundary")?;

    let canopy_geom = union_all(record_parts(canopy));
    let boundary_geom = union_all(record_parts(boundary));
    let clipped = canopy_geom.intersection(&boundary_geom);

    debug!(parts = clipped.0.len(), "clipped canopy to boundary");

    Ok(PolygonCollection {
        crs: canopy.crs.clone(),
        records: vec![PolygonRecord::new(0, clipped).with_class(CANOPY_CLASS)],
    })
}

/// Portion of `boundary` not covered by `canopy`, as one gap-class record.
///
/// Fails with a CRS error when either side lacks a CRS or they differ.
pub fn difference(boundary: &PolygonCollection, canopy: &PolygonCollection) -> Result<PolygonCollection> {
    require_same_crs(boundary.crs(), canopy.crs(), "boundary", "canopy")?;

    let boundary_geom = union_all(record_parts(boundary));
    let canopy_geom = union_all(record_parts(canopy));
    let gaps = boundary_geom.difference(&canopy_geom);

    debug!(parts = gaps.0.len(), "subtracted canopy from boundary");

    Ok(PolygonCollection {
        crs: boundary.crs.clone(),
        records: vec![PolygonRecord::new(0, gaps).with_class(GAP_CLASS)],
    })
}
