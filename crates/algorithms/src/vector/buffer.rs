//! Buffering of canopy polygons
//!
//! Each record is grown (or, for negative distances, shrunk) by a fixed
//! distance in CRS linear units with round joins.

use canopygap_core::vector::{PolygonCollection, PolygonRecord};
use canopygap_core::{Error, Result};
use geo::{Buffer, Geometry, MultiPolygon};
use tracing::debug;

/// Buffer every record of `collection` by `distance`.
///
/// A distance of exactly 0 returns the geometries unchanged. Negative
/// distances erode; records that erode away keep their place with an empty
/// multi-polygon. Ids and class labels are preserved.
pub fn buffer(collection: &PolygonCollection, distance: f64) -> Result<PolygonCollection> {
    if !distance.is_finite() {
        return Err(Error::InvalidParameter {
            name: "buffer_distance",
            value: distance.to_string(),
            reason: "must be finite".to_string(),
        });
    }
    if distance == 0.0 {
        return Ok(collection.clone());
    }

    let records: Vec<PolygonRecord> = collection
        .iter()
        .map(|record| PolygonRecord {
            geometry: Geometry::MultiPolygon(buffer_multi_polygon(
                &MultiPolygon::new(record.polygons()),
                distance,
            )),
            area: None,
            acres: None,
            size_class: None,
            ..record.clone()
        })
        .collect();

    debug!(records = records.len(), distance, "buffered polygons");

    Ok(PolygonCollection {
        crs: collection.crs.clone(),
        records,
    })
}

/// Buffer one multi-polygon; an empty input stays empty
pub fn buffer_multi_polygon(polygons: &MultiPolygon<f64>, distance: f64) -> MultiPolygon<f64> {
    if polygons.0.is_empty() {
        return MultiPolygon::new(Vec::new());
    }
    if distance == 0.0 {
        return polygons.clone();
    }
    polygons.buffer(distance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopygap_core::{ErrorKind, CRS};
    use geo::{Area, Rect};

    fn square_collection(size: f64) -> PolygonCollection {
        let rect = Rect::new((0.0, 0.0), (size, size)).to_polygon();
        let mut collection = PolygonCollection::new(Some(CRS::from_epsg(2232)));
        collection.push(PolygonRecord::new(0, rect).with_class(1));
        collection
    }

    fn area_of(collection: &PolygonCollection) -> f64 {
        collection.to_multi_polygon().unsigned_area()
    }

    #[test]
    fn test_zero_distance_is_identity() {
        let input = square_collection(2.0);
        let out = buffer(&input, 0.0).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn test_positive_distance_grows() {
        let input = square_collection(10.0);
        let out = buffer(&input, 5.0).unwrap();

        // square + four 10x5 strips + four quarter circles of radius 5
        let expected = 100.0 + 4.0 * 50.0 + std::f64::consts::PI * 25.0;
        let actual = area_of(&out);
        assert!((actual - expected).abs() / expected < 0.01, "area {}", actual);

        assert_eq!(out.records[0].class, Some(1));
        assert_eq!(out.crs(), input.crs());
    }

    #[test]
    fn test_negative_distance_shrinks() {
        let input = square_collection(10.0);
        let out = buffer(&input, -2.0).unwrap();
        assert!((area_of(&out) - 36.0).abs() < 1e-6);
    }

    #[test]
    fn test_negative_distance_can_erase() {
        let input = square_collection(2.0);
        let out = buffer(&input, -5.0).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(area_of(&out), 0.0);
    }

    #[test]
    fn test_non_finite_distance_rejected() {
        let err = buffer(&square_collection(1.0), f64::NAN).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
