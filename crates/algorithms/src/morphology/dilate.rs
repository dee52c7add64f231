//! Binary dilation

use canopygap_core::raster::Raster;
use canopygap_core::Result;

use super::element::{window_filter, StructuringElement};

/// Dilate a binary mask: a cell becomes foreground if any in-bounds cell
/// of its window is foreground.
pub fn dilate(mask: &Raster<u8>, element: &StructuringElement) -> Result<Raster<u8>> {
    window_filter(mask, element, false)
}
