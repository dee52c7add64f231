use canopygap_core::vector::{PolygonCollection, PolygonRecord};

/// Split every multi-part record into single-polygon records.
///
/// Parts keep their source record's class; ids run 0..n in output order.
/// Area attributes are cleared since they no longer describe the parts.
pub fn explode(collection: &PolygonCollection) -> PolygonCollection {
    let records = collection
        .iter()
        .flat_map(|record| {
            record.polygons().into_iter().map(move |part| {
                let mut single = PolygonRecord::new(0, part);
                single.class = record.class;
                single
            })
        })
        .collect();

    let mut out = PolygonCollection {
        crs: collection.crs.clone(),
        records,
    };
    out.renumber();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopygap_core::CRS;
    use geo::{Area, Geometry, MultiPolygon, Rect};

    #[test]
    fn test_explode_parts() {
        let parts = MultiPolygon::new(vec![
            Rect::new((0.0, 0.0), (1.0, 1.0)).to_polygon(),
            Rect::new((3.0, 0.0), (5.0, 1.0)).to_polygon(),
        ]);
        let mut input = PolygonCollection::new(Some(CRS::from_epsg(2232)));
        input.push(PolygonRecord::new(7, parts.clone()).with_class(0));
        input.push(PolygonRecord::new(8, Rect::new((9.0, 9.0), (10.0, 10.0)).to_polygon()).with_class(1));

        let out = explode(&input);
        assert_eq!(out.len(), 3);
        assert_eq!(out.crs(), input.crs());

        let ids: Vec<usize> = out.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        let classes: Vec<Option<u8>> = out.iter().map(|r| r.class).collect();
        assert_eq!(classes, vec![Some(0), Some(0), Some(1)]);

        for r in out.iter() {
            assert!(matches!(r.geometry, Geometry::Polygon(_)));
        }

        let total: f64 = out.to_multi_polygon().unsigned_area();
        assert!((total - (parts.unsigned_area() + 1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_explode_empty_geometry() {
        let mut input = PolygonCollection::new(None);
        input.push(PolygonRecord::new(0, MultiPolygon::<f64>::new(Vec::new())));
        assert!(explode(&input).is_empty());
    }
}
