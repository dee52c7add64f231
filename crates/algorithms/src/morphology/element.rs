//! Square structuring element and the separable window filter behind
//! binary erosion and dilation

use crate::maybe_rayon::*;
use canopygap_core::raster::Raster;
use canopygap_core::{Error, Result};
use ndarray::Array2;

/// Square structuring element with an odd side length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructuringElement {
    size: usize,
}

impl Default for StructuringElement {
    fn default() -> Self {
        Self { size: 3 }
    }
}

impl StructuringElement {
    /// Square element of side `size`; fails unless `size` is odd
    pub fn square(size: usize) -> Result<Self> {
        let element = Self { size };
        element.validate()?;
        Ok(element)
    }

    /// Validate the structuring element size
    pub fn validate(&self) -> Result<()> {
        if self.size % 2 == 0 {
            return Err(Error::InvalidParameter {
                name: "size",
                value: self.size.to_string(),
                reason: "structuring element size must be odd".to_string(),
            });
        }
        Ok(())
    }

    /// Side length in cells
    pub fn size(&self) -> usize {
        self.size
    }

    /// Cells on each side of the center
    pub fn radius(&self) -> usize {
        self.size / 2
    }
}

/// Filter a binary mask with a square window.
///
/// With `all` set a cell is foreground when every cell of its window is
/// foreground (erosion); otherwise when any is (dilation). Cells outside
/// the raster and no-data cells count as background, so erosion clears
/// every cell whose window crosses the edge. Output values are 0 or 1.
pub(crate) fn window_filter(
    mask: &Raster<u8>,
    element: &StructuringElement,
    all: bool,
) -> Result<Raster<u8>> {
    element.validate()?;

    let (rows, cols) = mask.shape();
    let radius = element.radius();

    let binary: Vec<u8> = mask
        .data()
        .iter()
        .map(|&v| u8::from(v != 0 && !mask.is_nodata(v)))
        .collect();

    // A square window is separable: filter rows, then columns.
    let horizontal: Vec<u8> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let line = &binary[row * cols..(row + 1) * cols];
            (0..cols)
                .map(|col| {
                    if all && (col < radius || col + radius >= cols) {
                        return 0;
                    }
                    let lo = col.saturating_sub(radius);
                    let hi = (col + radius).min(cols - 1);
                    reduce(line[lo..=hi].iter().copied(), all)
                })
                .collect::<Vec<u8>>()
        })
        .collect();

    let output: Vec<u8> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            if all && (row < radius || row + radius >= rows) {
                return vec![0u8; cols];
            }
            let lo = row.saturating_sub(radius);
            let hi = (row + radius).min(rows - 1);
            (0..cols)
                .map(|col| reduce((lo..=hi).map(|r| horizontal[r * cols + col]), all))
                .collect::<Vec<u8>>()
        })
        .collect();

    let array = Array2::from_shape_vec((rows, cols), output).map_err(|e| Error::Input(e.to_string()))?;
    mask.derive(array)
}

fn reduce(mut window: impl Iterator<Item = u8>, all: bool) -> u8 {
    if all {
        u8::from(window.all(|v| v == 1))
    } else {
        u8::from(window.any(|v| v == 1))
    }
}
