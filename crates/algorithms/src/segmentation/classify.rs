//! Segment-based canopy classification of four-band imagery
//!
//! The image is split into quickshift superpixels, every connected segment
//! is summarised by its mean statistic, and k-means groups the segments.
//! The cluster with the highest mean statistic is canopy (class 1), all
//! others are class 0, and segments are dissolved per class.

use super::quickshift::{quickshift, QuickshiftParams};
use crate::classification::{cluster_means, highest_mean_cluster, kmeans, KmeansParams};
use crate::imagery::{image_ndvi, require_bands, NIR_BAND};
use crate::maybe_rayon::*;
use crate::vector::{dissolve_by_class, label_regions, trace_regions, RegionMap, CANOPY_CLASS, GAP_CLASS};
use canopygap_core::raster::{MultiBandRaster, Raster};
use canopygap_core::vector::{PolygonCollection, PolygonRecord};
use canopygap_core::{Algorithm, Error, Result};
use ndarray::{s, Array2, Array3, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// Largest raw value of an 8-bit image
const U8_MAX: f64 = 255.0;
/// Largest raw value of a 16-bit image
const U16_MAX: f64 = 65_535.0;

/// What the segmentation and clustering run on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentSource {
    /// Segment the NDVI band; cluster on mean NDVI
    #[default]
    Ndvi,
    /// Segment the RGB bands; cluster on mean red, green, blue and NIR
    Spectral,
}

impl FromStr for SegmentSource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ndvi" => Ok(SegmentSource::Ndvi),
            "spectral" | "rgb" => Ok(SegmentSource::Spectral),
            other => Err(Error::Config(format!(
                "unknown segmentation source '{}' (expected ndvi or spectral)",
                other
            ))),
        }
    }
}

impl fmt::Display for SegmentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentSource::Ndvi => f.write_str("ndvi"),
            SegmentSource::Spectral => f.write_str("spectral"),
        }
    }
}

/// Parameters for segment classification
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentParams {
    pub source: SegmentSource,
    pub quickshift: QuickshiftParams,
    pub kmeans: KmeansParams,
}

impl SegmentParams {
    pub fn validate(&self) -> Result<()> {
        self.quickshift.validate()?;
        self.kmeans.validate()
    }
}

/// Intermediate state of a segment classification
#[derive(Debug, Clone)]
pub struct SegmentedImage {
    /// Quickshift label per pixel
    pub segments: Raster<u32>,
    /// Connected pieces of the segments; one sample per region
    pub regions: RegionMap<u32>,
    /// Per-region mean of every feature band (regions x features)
    pub means: Array2<f64>,
    /// Feature column holding the canopy statistic
    pub key: usize,
    /// Cluster index per region
    pub clusters: Vec<usize>,
    /// Cluster chosen as canopy
    pub canopy_cluster: usize,
}

impl SegmentedImage {
    /// Class label per region: 1 for the canopy cluster, 0 otherwise
    pub fn classes(&self) -> Vec<u8> {
        self.clusters
            .iter()
            .map(|&c| if c == self.canopy_cluster { CANOPY_CLASS } else { GAP_CLASS })
            .collect()
    }
}

/// Rescale raw integer-valued reflectance to 0..1.
///
/// Images whose values all fit in 8 bits are divided by 255, anything
/// larger by 65535. Images already in 0..1 are left alone.
fn to_unit_range(data: &Array3<f64>) -> Array3<f64> {
    let max = data
        .iter()
        .filter(|v| v.is_finite())
        .fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    let scale = if max <= 1.0 {
        1.0
    } else if max <= U8_MAX {
        U8_MAX
    } else {
        U16_MAX
    };
    data.mapv(|v| v / scale)
}

/// Band stacks for the two stages: what quickshift segments, and what the
/// per-segment means are taken over.
fn segmentation_inputs(image: &MultiBandRaster<f64>, source: SegmentSource) -> Result<(MultiBandRaster<f64>, MultiBandRaster<f64>, usize)> {
    require_bands(image)?;
    match source {
        SegmentSource::Ndvi => {
            let index = MultiBandRaster::expand(&image_ndvi(image)?);
            Ok((index.clone(), index, 0))
        }
        SegmentSource::Spectral => {
            let rgb = to_unit_range(&image.data().slice(s![0..3, .., ..]).to_owned());
            let mut channels = MultiBandRaster::from_array(rgb);
            if let Some(t) = image.transform() {
                channels.set_transform(*t);
            }
            channels.set_crs(image.crs().cloned());
            let features = MultiBandRaster::from_array(image.data().slice(s![0..4, .., ..]).to_owned());
            Ok((channels, features, NIR_BAND))
        }
    }
}

/// Mean of every feature band over each region; non-finite cells are
/// skipped and a region with none left gets 0.
///
/// Fails with an input error when the feature stack and the region labels
/// differ in shape.
pub fn region_means(regions: &RegionMap<u32>, features: &MultiBandRaster<f64>) -> Result<Array2<f64>> {
    let (rows, cols) = regions.labels.dim();
    if (features.rows(), features.cols()) != (rows, cols) {
        return Err(Error::SizeMismatch {
            er: rows,
            ec: cols,
            ar: features.rows(),
            ac: features.cols(),
        });
    }

    let bands = features.band_count();
    let columns: Vec<Vec<f64>> = (0..bands)
        .into_par_iter()
        .map(|b| {
            let band = features.data().index_axis(Axis(0), b);
            let mut sums = vec![0.0; regions.len()];
            let mut counts = vec![0usize; regions.len()];
            for (&label, &v) in regions.labels.iter().zip(band.iter()) {
                if v.is_finite() {
                    sums[label] += v;
                    counts[label] += 1;
                }
            }
            sums.iter()
                .zip(counts.iter())
                .map(|(&s, &c)| if c > 0 { s / c as f64 } else { 0.0 })
                .collect::<Vec<f64>>()
        })
        .collect();

    let mut means = Array2::zeros((regions.len(), bands));
    for (b, column) in columns.iter().enumerate() {
        for (i, &m) in column.iter().enumerate() {
            means[[i, b]] = m;
        }
    }
    Ok(means)
}

/// Segment and cluster an image without building polygons.
///
/// Fails with a missing-band error for fewer than four bands, a CRS error
/// when the image is not georeferenced, and insufficient data when there
/// are fewer segments than clusters.
pub fn segment_image(image: &MultiBandRaster<f64>, params: &SegmentParams) -> Result<SegmentedImage> {
    params.validate()?;
    let (channels, features, key) = segmentation_inputs(image, params.source)?;

    let segments = quickshift(&channels, &params.quickshift)?;
    segments.georef()?;

    let regions = label_regions(&segments);
    info!(
        source = %params.source,
        segments = regions.len(),
        "quickshift segmentation"
    );

    let means = region_means(&regions, &features)?;
    let result = kmeans(means.view(), key, &params.kmeans)?;
    let per_cluster = cluster_means(means.view(), &result.labels, params.kmeans.k, key);
    let canopy_cluster = highest_mean_cluster(&per_cluster)
        .ok_or_else(|| Error::InsufficientData("no non-empty cluster".into()))?;

    debug!(
        iterations = result.iterations,
        means = ?per_cluster,
        canopy_cluster,
        "clustered segments"
    );

    Ok(SegmentedImage {
        segments,
        regions,
        means,
        key,
        clusters: result.labels,
        canopy_cluster,
    })
}

/// Classify a four-band image into canopy (class 1) and not-canopy
/// (class 0), one dissolved record per class present.
pub fn segment_classify(image: &MultiBandRaster<f64>, params: &SegmentParams) -> Result<PolygonCollection> {
    let segmented = segment_image(image, params)?;
    segment_polygons(&segmented)
}

/// Class-labelled segment polygons, dissolved by class
pub fn segment_polygons(segmented: &SegmentedImage) -> Result<PolygonCollection> {
    let (_, crs) = segmented.segments.georef()?;
    let classes = segmented.classes();
    let traced = trace_regions(&segmented.segments, &segmented.regions, |_, _| true)?;

    let mut collection = PolygonCollection::new(Some(crs.clone()));
    for (id, (region, polygon)) in traced.into_iter().enumerate() {
        collection.push(PolygonRecord::new(id, polygon).with_class(classes[region]));
    }

    let dissolved = dissolve_by_class(&collection);
    debug!(
        segments = collection.len(),
        classes = dissolved.len(),
        "dissolved segments by class"
    );
    Ok(dissolved)
}

/// Raster of each pixel's segment mean canopy statistic
pub fn segment_mean_raster(segmented: &SegmentedImage) -> Result<Raster<f64>> {
    let key = segmented.key;
    let data = segmented
        .regions
        .labels
        .mapv(|region| segmented.means[[region, key]]);
    segmented.segments.derive(data)
}

/// Imagery classification stage
#[derive(Debug, Clone, Default)]
pub struct SegmentClassifier;

impl Algorithm for SegmentClassifier {
    type Input = MultiBandRaster<f64>;
    type Output = PolygonCollection;
    type Params = SegmentParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "SegmentClassifier"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        segment_classify(&input, &params)
    }
}
