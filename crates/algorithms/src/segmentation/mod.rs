//! Imagery segmentation and segment classification
//!
//! - **Quickshift**: superpixel segmentation by density mode seeking
//! - **Classify**: per-segment statistics, k-means, dissolve by class

mod classify;
mod quickshift;

pub use classify::{
    region_means, segment_classify, segment_image, segment_mean_raster, segment_polygons,
    SegmentClassifier, SegmentParams, SegmentSource, SegmentedImage,
};
pub use quickshift::{quickshift, segment_count, QuickshiftParams};
