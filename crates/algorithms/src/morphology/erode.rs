//! Binary erosion

use canopygap_core::raster::Raster;
use canopygap_core::Result;

use super::element::{window_filter, StructuringElement};

/// Erode a binary mask: a cell stays foreground only if its whole window
/// is foreground.
///
/// Everything outside the raster is background, so cells within the
/// element radius of the edge always erode.
pub fn erode(mask: &Raster<u8>, element: &StructuringElement) -> Result<Raster<u8>> {
    window_filter(mask, element, true)
}
