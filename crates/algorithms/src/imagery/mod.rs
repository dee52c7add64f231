//! Imagery analysis: vegetation index from red and near-infrared bands

mod indices;

pub use indices::{
    image_ndvi, ndvi, normalized_difference, require_bands, NIR_BAND, RED_BAND, REQUIRED_BANDS,
};
