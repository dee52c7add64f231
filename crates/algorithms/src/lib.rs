//! # canopygap algorithms
//!
//! The stages of canopy gap delineation.
//!
//! ## Stages
//!
//! - **classification**: height threshold (RasterClassifier), canopy height
//!   model, k-means
//! - **morphology**: opening/closing of binary masks (MaskCleaner)
//! - **imagery**: NDVI from four-band imagery
//! - **segmentation**: quickshift superpixels and segment clustering
//!   (SegmentClassifier)
//! - **vector**: polygonize (Polygonizer), buffer, dissolve, clip,
//!   difference, explode, area classes (GeometryProcessor)
//! - **pipeline**: LiDAR and imagery runs end to end

pub mod classification;
pub mod imagery;
pub(crate) mod maybe_rayon;
pub mod morphology;
pub mod pipeline;
pub mod segmentation;
pub mod vector;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classification::{
        canopy_height_model, kmeans, threshold_canopy, KmeansParams, RasterClassifier,
        ThresholdParams,
    };
    pub use crate::imagery::{image_ndvi, ndvi};
    pub use crate::morphology::{clean_mask, CleanParams, MaskCleaner, MorphOp};
    pub use crate::pipeline::{
        process_gaps, run_imagery_pipeline, run_lidar_pipeline, GapParams, GapResult,
        PipelineConfig, PipelineOutput,
    };
    pub use crate::segmentation::{
        quickshift, segment_classify, QuickshiftParams, SegmentClassifier, SegmentParams,
        SegmentSource,
    };
    pub use crate::vector::{
        area_summary, buffer, classify_by_area, clip_intersect, compute_area, difference,
        dissolve, explode, polygonize, AreaSummary, PolygonizeParams, Polygonizer,
    };
    pub use canopygap_core::prelude::*;
}
