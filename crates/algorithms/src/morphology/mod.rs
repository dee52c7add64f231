//! Binary morphology for canopy masks
//!
//! - **Erosion**: cell survives only if its whole window is foreground
//! - **Dilation**: cell is set if any cell of its window is foreground
//! - **Opening**: erosion then dilation (removes small specks)
//! - **Closing**: dilation then erosion (fills small holes)
//!
//! Windows are square and clipped to the raster, so edges are judged on
//! their in-bounds neighbours.

mod clean;
mod closing;
mod dilate;
mod element;
mod erode;
mod opening;

pub use clean::{clean_band_stack, clean_mask, CleanParams, MaskCleaner, MorphOp};
pub use closing::closing;
pub use dilate::dilate;
pub use element::StructuringElement;
pub use erode::erode;
pub use opening::opening;
