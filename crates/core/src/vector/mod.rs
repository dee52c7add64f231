//! Polygon records and collections
//!
//! Everything the geometry stage hands to its collaborators lives here: a
//! record is one polygon (or multi-polygon before explosion) plus its class
//! label and the area attributes filled in after explosion.

use crate::crs::{reproject_geometry, CRS};
use crate::error::{Error, Result};
use geo_types::{Geometry, MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Square feet per acre
pub const SQ_FEET_PER_ACRE: f64 = 43_560.0;
/// Square metres per acre
pub const SQ_METRES_PER_ACRE: f64 = 4_046.856_422_4;

/// Linear unit of a projected CRS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinearUnit {
    /// US survey / international feet (State Plane)
    #[default]
    Feet,
    /// Metres (UTM)
    Metre,
}

impl LinearUnit {
    /// Convert an area in squared units of `self` to acres
    pub fn to_acres(self, area: f64) -> f64 {
        match self {
            LinearUnit::Feet => area / SQ_FEET_PER_ACRE,
            LinearUnit::Metre => area / SQ_METRES_PER_ACRE,
        }
    }
}

impl FromStr for LinearUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "feet" | "foot" | "ft" => Ok(LinearUnit::Feet),
            "metre" | "meter" | "metres" | "meters" | "m" => Ok(LinearUnit::Metre),
            other => Err(Error::Config(format!("unknown linear unit: {}", other))),
        }
    }
}

/// Acreage bucket of a gap polygon.
///
/// Buckets are half-open on the upper edge: exactly 1/8 acre is
/// [`SizeClass::EighthToQuarter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SizeClass {
    UnderEighth,
    EighthToQuarter,
    QuarterToHalf,
    HalfToOne,
    OverOne,
}

impl SizeClass {
    /// All buckets in ascending order
    pub const ALL: [SizeClass; 5] = [
        SizeClass::UnderEighth,
        SizeClass::EighthToQuarter,
        SizeClass::QuarterToHalf,
        SizeClass::HalfToOne,
        SizeClass::OverOne,
    ];

    /// Bucket for an area in acres. Negative or NaN input lands in the
    /// smallest bucket.
    pub fn from_acres(acres: f64) -> Self {
        if acres >= 1.0 {
            SizeClass::OverOne
        } else if acres >= 0.5 {
            SizeClass::HalfToOne
        } else if acres >= 0.25 {
            SizeClass::QuarterToHalf
        } else if acres >= 0.125 {
            SizeClass::EighthToQuarter
        } else {
            SizeClass::UnderEighth
        }
    }

    /// Report label
    pub fn label(self) -> &'static str {
        match self {
            SizeClass::UnderEighth => "< 1/8 acre",
            SizeClass::EighthToQuarter => "1/8 - 1/4 acre",
            SizeClass::QuarterToHalf => "1/4 - 1/2 acre",
            SizeClass::HalfToOne => "1/2 - 1 acre",
            SizeClass::OverOne => "> 1 acre",
        }
    }
}

impl fmt::Display for SizeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One polygon with its class label and area attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonRecord {
    /// Sequential identifier, contiguous from 0 after explosion
    pub id: usize,
    /// Polygon or multi-polygon
    pub geometry: Geometry<f64>,
    /// 1 for canopy, 0 for not canopy; `None` for unlabeled boundaries
    pub class: Option<u8>,
    /// Area in squared linear units
    pub area: Option<f64>,
    pub acres: Option<f64>,
    pub size_class: Option<SizeClass>,
}

impl PolygonRecord {
    pub fn new(id: usize, geometry: impl Into<Geometry<f64>>) -> Self {
        Self {
            id,
            geometry: geometry.into(),
            class: None,
            area: None,
            acres: None,
            size_class: None,
        }
    }

    pub fn with_class(mut self, class: u8) -> Self {
        self.class = Some(class);
        self
    }

    /// Polygon parts of the geometry; non-areal geometries yield nothing
    pub fn polygons(&self) -> Vec<Polygon<f64>> {
        geometry_polygons(&self.geometry)
    }
}

/// Polygon parts of any geometry, flattening multi-polygons and
/// collections. Points and lines contribute nothing.
pub fn geometry_polygons(geometry: &Geometry<f64>) -> Vec<Polygon<f64>> {
    match geometry {
        Geometry::Polygon(p) => vec![p.clone()],
        Geometry::MultiPolygon(mp) => mp.0.clone(),
        Geometry::Rect(r) => vec![r.to_polygon()],
        Geometry::Triangle(t) => vec![t.to_polygon()],
        Geometry::GeometryCollection(gc) => gc.iter().flat_map(geometry_polygons).collect(),
        _ => Vec::new(),
    }
}

/// Ordered polygon records sharing one CRS
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PolygonCollection {
    pub crs: Option<CRS>,
    pub records: Vec<PolygonRecord>,
}

impl PolygonCollection {
    pub fn new(crs: Option<CRS>) -> Self {
        Self {
            crs,
            records: Vec::new(),
        }
    }

    /// Collection from bare geometries, ids assigned from 0
    pub fn from_geometries<I, G>(crs: Option<CRS>, geometries: I) -> Self
    where
        I: IntoIterator<Item = G>,
        G: Into<Geometry<f64>>,
    {
        let records = geometries
            .into_iter()
            .enumerate()
            .map(|(id, g)| PolygonRecord::new(id, g))
            .collect();
        Self { crs, records }
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    pub fn push(&mut self, record: PolygonRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PolygonRecord> {
        self.records.iter()
    }

    /// All polygon parts of every record, in record order
    pub fn polygons(&self) -> Vec<Polygon<f64>> {
        self.records.iter().flat_map(|r| r.polygons()).collect()
    }

    /// All parts gathered into one multi-polygon (no union performed)
    pub fn to_multi_polygon(&self) -> MultiPolygon<f64> {
        MultiPolygon::new(self.polygons())
    }

    /// Reassign ids 0..n in current order
    pub fn renumber(&mut self) {
        for (id, record) in self.records.iter_mut().enumerate() {
            record.id = id;
        }
    }
}

impl IntoIterator for PolygonCollection {
    type Item = PolygonRecord;
    type IntoIter = std::vec::IntoIter<PolygonRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

/// Reproject every record of `collection` into `target`.
///
/// A collection without a CRS cannot be reprojected and fails with a CRS
/// error.
pub fn reproject_collection(collection: &PolygonCollection, target: &CRS) -> Result<PolygonCollection> {
    let source = collection.crs().ok_or(Error::MissingCrs("collection"))?;
    let records = collection
        .records
        .iter()
        .map(|r| {
            Ok(PolygonRecord {
                geometry: reproject_geometry(&r.geometry, source, target)?,
                ..r.clone()
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(PolygonCollection {
        crs: Some(target.clone()),
        records,
    })
}
