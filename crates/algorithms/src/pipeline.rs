//! End-to-end canopy gap delineation
//!
//! LiDAR path: height raster → threshold → clean → polygonize → gaps.
//! Imagery path: four-band image → segment classification → gaps.
//!
//! Both paths finish in [`process_gaps`]: buffer the canopy, dissolve it,
//! clip it to the study boundary, subtract it from the boundary and measure
//! the remaining open space. A run either returns every output or an error;
//! nothing is produced halfway.

use crate::classification::{threshold_canopy, ThresholdParams};
use crate::morphology::{clean_mask, CleanParams};
use crate::segmentation::{segment_classify, SegmentParams};
use crate::vector::{
    area_summary, buffer, clip_intersect, compute_area, difference, dissolve, explode, polygonize,
    raster_bounds_polygon, AreaSummary, PolygonizeParams, CANOPY_CLASS,
};
use canopygap_core::raster::{MultiBandRaster, Raster};
use canopygap_core::vector::{reproject_collection, LinearUnit, PolygonCollection, PolygonRecord};
use canopygap_core::{Error, RasterElement, Result, CRS};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Parameters for turning canopy polygons into gap polygons
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GapParams {
    /// Canopy buffer in the CRS linear unit; 0 or negative allowed
    pub buffer_distance: f64,
    /// Linear unit of the working CRS, for acreage
    pub unit: LinearUnit,
}

impl Default for GapParams {
    fn default() -> Self {
        Self {
            buffer_distance: 5.0,
            unit: LinearUnit::Feet,
        }
    }
}

impl GapParams {
    pub fn validate(&self) -> Result<()> {
        if !self.buffer_distance.is_finite() {
            return Err(Error::InvalidParameter {
                name: "buffer_distance",
                value: self.buffer_distance.to_string(),
                reason: "must be finite".to_string(),
            });
        }
        Ok(())
    }
}

/// Every stage's parameters, loadable from JSON
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub threshold: ThresholdParams,
    pub clean: CleanParams,
    pub polygonize: PolygonizeParams,
    pub segment: SegmentParams,
    pub gaps: GapParams,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        self.threshold.validate()?;
        self.clean.validate()?;
        self.segment.validate()?;
        self.gaps.validate()
    }
}

/// Output of [`process_gaps`]
#[derive(Debug, Clone)]
pub struct GapResult {
    /// Buffered canopy inside the boundary, one record per part
    pub buffered_canopy: PolygonCollection,
    /// Open-space polygons with area, acres and size class
    pub gaps: PolygonCollection,
    pub summary: AreaSummary,
}

/// Output of a full pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Canopy polygons before buffering
    pub canopy: PolygonCollection,
    pub buffered_canopy: PolygonCollection,
    pub gaps: PolygonCollection,
    pub summary: AreaSummary,
}

fn require_crs<'a>(crs: Option<&'a CRS>, what: &str) -> Result<&'a CRS> {
    crs.ok_or_else(|| Error::Config(format!("{} has no coordinate reference system", what)))
}

/// Bring the boundary into the canopy CRS when it is not already there
fn align_boundary(boundary: &PolygonCollection, target: &CRS) -> Result<PolygonCollection> {
    let source = require_crs(boundary.crs(), "study boundary")?;
    if source.is_equivalent(target) {
        return Ok(boundary.clone());
    }
    info!(from = %source, to = %target, "reprojecting study boundary");
    reproject_collection(boundary, target)
}

/// Boundary covering the raster's footprint, for runs without one
fn footprint<T: RasterElement>(raster: &Raster<T>) -> Result<PolygonCollection> {
    let polygon = raster_bounds_polygon(raster)?;
    Ok(PolygonCollection::from_geometries(raster.crs().cloned(), [polygon]))
}

/// Derive gap polygons from canopy polygons and a study boundary.
///
/// Both collections must carry a CRS (configuration error otherwise). The
/// boundary is reprojected to the canopy CRS when they differ.
pub fn process_gaps(canopy: &PolygonCollection, boundary: &PolygonCollection, params: &GapParams) -> Result<GapResult> {
    params.validate()?;
    let canopy_crs = require_crs(canopy.crs(), "canopy source")?;
    let boundary = align_boundary(boundary, canopy_crs)?;

    let buffered = buffer(canopy, params.buffer_distance)?;
    let merged = dissolve(&buffered);
    let clipped = clip_intersect(&merged, &boundary)?;
    let open = difference(&boundary, &clipped)?;

    let buffered_canopy = compute_area(&explode(&clipped), params.unit);
    let gaps = compute_area(&explode(&open), params.unit);
    let summary = area_summary(&gaps, params.unit);

    info!(
        canopy_parts = buffered_canopy.len(),
        gaps = gaps.len(),
        gap_acres = summary.total_acres,
        "delineated canopy gaps"
    );

    Ok(GapResult {
        buffered_canopy,
        gaps,
        summary,
    })
}

/// Run the LiDAR path on a canopy height raster.
///
/// Without a boundary the raster's footprint is the study area.
pub fn run_lidar_pipeline(
    height: &Raster<f64>,
    boundary: Option<&PolygonCollection>,
    config: &PipelineConfig,
) -> Result<PipelineOutput> {
    config.validate()?;
    require_crs(height.crs(), "canopy source")?;

    let mask = threshold_canopy(height, &config.threshold)?;
    let cleaned = clean_mask(&mask, &config.clean)?;
    let canopy = polygonize(&cleaned, &config.polygonize)?;
    debug!(polygons = canopy.len(), "canopy polygons from height raster");

    let boundary = match boundary {
        Some(b) => b.clone(),
        None => footprint(height)?,
    };
    let result = process_gaps(&canopy, &boundary, &config.gaps)?;

    Ok(PipelineOutput {
        canopy,
        buffered_canopy: result.buffered_canopy,
        gaps: result.gaps,
        summary: result.summary,
    })
}

/// Run the imagery path on a four-band (red, green, blue, NIR) image.
///
/// Without a boundary the image footprint is the study area.
pub fn run_imagery_pipeline(
    image: &MultiBandRaster<f64>,
    boundary: Option<&PolygonCollection>,
    config: &PipelineConfig,
) -> Result<PipelineOutput> {
    config.validate()?;
    require_crs(image.crs(), "canopy source")?;

    let classes = segment_classify(image, &config.segment)?;
    let canopy = PolygonCollection {
        crs: classes.crs.clone(),
        records: classes
            .iter()
            .filter(|r| r.class == Some(CANOPY_CLASS))
            .cloned()
            .collect::<Vec<PolygonRecord>>(),
    };
    debug!(records = canopy.len(), "canopy polygons from imagery");

    let boundary = match boundary {
        Some(b) => b.clone(),
        None => footprint(&image.band(0)?)?,
    };
    let result = process_gaps(&canopy, &boundary, &config.gaps)?;

    Ok(PipelineOutput {
        canopy,
        buffered_canopy: result.buffered_canopy,
        gaps: result.gaps,
        summary: result.summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopygap_core::raster::GeoTransform;
    use canopygap_core::vector::SizeClass;
    use canopygap_core::ErrorKind;
    use geo::{Area, Rect};

    fn boundary_10x10(crs: Option<CRS>) -> PolygonCollection {
        PolygonCollection::from_geometries(crs, [Rect::new((0.0, 0.0), (10.0, 10.0)).to_polygon()])
    }

    fn canopy_2x2(crs: Option<CRS>) -> PolygonCollection {
        let mut c = PolygonCollection::new(crs);
        c.push(PolygonRecord::new(0, Rect::new((0.0, 0.0), (2.0, 2.0)).to_polygon()).with_class(1));
        c
    }

    fn no_buffer() -> GapParams {
        GapParams {
            buffer_distance: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_process_gaps_small_canopy() {
        let crs = Some(CRS::from_epsg(2232));
        let out = process_gaps(&canopy_2x2(crs.clone()), &boundary_10x10(crs), &no_buffer()).unwrap();

        assert_eq!(out.buffered_canopy.len(), 1);
        let canopy = &out.buffered_canopy.records[0];
        assert!((canopy.area.unwrap() - 4.0).abs() < 1e-9);
        assert_eq!(canopy.size_class, Some(SizeClass::UnderEighth));

        assert_eq!(out.gaps.len(), 1);
        assert!((out.gaps.records[0].area.unwrap() - 96.0).abs() < 1e-9);
        assert_eq!(out.gaps.records[0].class, Some(0));
        assert_eq!(out.summary.count, 1);
    }

    #[test]
    fn test_process_gaps_buffer_grows_canopy() {
        let crs = Some(CRS::from_epsg(2232));
        let params = GapParams {
            buffer_distance: 1.0,
            ..Default::default()
        };
        let out = process_gaps(&canopy_2x2(crs.clone()), &boundary_10x10(crs), &params).unwrap();
        let canopy_area = out.buffered_canopy.to_multi_polygon().unsigned_area();
        // 3x3 square inside the boundary, its far corner rounded
        let expected = 8.0 + std::f64::consts::FRAC_PI_4;
        assert!((canopy_area - expected).abs() < 0.02, "canopy area {}", canopy_area);
        let gap_area = out.gaps.to_multi_polygon().unsigned_area();
        assert!((canopy_area + gap_area - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_process_gaps_missing_crs_is_config_error() {
        let crs = Some(CRS::from_epsg(2232));
        let err = process_gaps(&canopy_2x2(None), &boundary_10x10(crs.clone()), &no_buffer()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        let err = process_gaps(&canopy_2x2(crs), &boundary_10x10(None), &no_buffer()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_process_gaps_unsupported_reprojection() {
        let err = process_gaps(
            &canopy_2x2(Some(CRS::from_epsg(2232))),
            &boundary_10x10(Some(CRS::from_epsg(32613))),
            &no_buffer(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CrsMismatch);
    }

    fn height_raster() -> Raster<f64> {
        // 10x10 at 1 ft, one 2x2 tree in the middle
        let mut height = Raster::filled(10, 10, 0.5);
        for r in 4..6 {
            for c in 4..6 {
                height.set(r, c, 20.0).unwrap();
            }
        }
        height
            .with_transform(GeoTransform::new(0.0, 10.0, 1.0, -1.0))
            .with_crs(CRS::from_epsg(2232))
    }

    #[test]
    fn test_lidar_pipeline_footprint_boundary() {
        let config = PipelineConfig {
            clean: CleanParams {
                size: 1,
                ..Default::default()
            },
            gaps: no_buffer(),
            ..Default::default()
        };
        let out = run_lidar_pipeline(&height_raster(), None, &config).unwrap();

        assert_eq!(out.canopy.len(), 1);
        assert_eq!(out.canopy.records[0].class, Some(1));
        assert!((out.gaps.to_multi_polygon().unsigned_area() - 96.0).abs() < 1e-9);
    }

    #[test]
    fn test_lidar_pipeline_opening_removes_small_tree() {
        // default 3x3 opening erases a 2x2 tree
        let config = PipelineConfig {
            gaps: no_buffer(),
            ..Default::default()
        };
        let out = run_lidar_pipeline(&height_raster(), None, &config).unwrap();
        assert!(out.canopy.is_empty());
        assert!((out.gaps.to_multi_polygon().unsigned_area() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_lidar_pipeline_requires_crs() {
        let mut height = height_raster();
        height.set_crs(None);
        let err = run_lidar_pipeline(&height, None, &PipelineConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_config_json_defaults() {
        let config: PipelineConfig = serde_json::from_str(r#"{"gaps": {"buffer_distance": 2.5}}"#).unwrap();
        assert_eq!(config.gaps.buffer_distance, 2.5);
        assert_eq!(config.gaps.unit, LinearUnit::Feet);
        assert_eq!(config.threshold.canopy_height, 5.0);
        assert_eq!(config.segment.kmeans.k, 2);
    }

    #[test]
    fn test_config_rejects_even_element() {
        let config = PipelineConfig {
            clean: CleanParams {
                size: 4,
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(config.validate().unwrap_err().kind(), ErrorKind::Config);
    }
}
