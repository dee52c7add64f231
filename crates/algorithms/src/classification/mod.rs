//! Canopy classification
//!
//! - **Threshold**: LiDAR height raster to binary canopy mask
//! - **Canopy height model**: first-return minus ground surface
//! - **K-means**: unsupervised clustering of per-segment statistics

mod kmeans;
mod threshold;

pub use kmeans::{cluster_means, highest_mean_cluster, kmeans, KmeansParams, KmeansResult};
pub use threshold::{canopy_height_model, threshold_canopy, RasterClassifier, ThresholdParams};
