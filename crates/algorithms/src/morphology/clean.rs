//! Mask cleaning: opening or closing of a binary canopy mask

use canopygap_core::raster::{MultiBandRaster, Raster};
use canopygap_core::{Algorithm, Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use super::closing::closing;
use super::element::StructuringElement;
use super::opening::opening;

/// Morphological operation applied by [`MaskCleaner`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MorphOp {
    /// Remove isolated foreground specks
    #[default]
    Opening,
    /// Fill isolated background holes
    Closing,
}

impl FromStr for MorphOp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "opening" => Ok(MorphOp::Opening),
            "closing" => Ok(MorphOp::Closing),
            other => Err(Error::Config(format!(
                "unknown morphological operation '{}' (expected 'opening' or 'closing')",
                other
            ))),
        }
    }
}

impl fmt::Display for MorphOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MorphOp::Opening => f.write_str("opening"),
            MorphOp::Closing => f.write_str("closing"),
        }
    }
}

/// Parameters for mask cleaning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanParams {
    pub operation: MorphOp,
    /// Side of the square structuring element (odd)
    pub size: usize,
}

impl Default for CleanParams {
    fn default() -> Self {
        Self {
            operation: MorphOp::Opening,
            size: 3,
        }
    }
}

impl CleanParams {
    pub fn validate(&self) -> Result<()> {
        StructuringElement::square(self.size).map(|_| ())
    }
}

/// Clean a 2D binary mask. Output cells are 0 or 1.
///
/// Not idempotent in general: repeated application changes the mask until
/// it reaches a fixed point.
pub fn clean_mask(mask: &Raster<u8>, params: &CleanParams) -> Result<Raster<u8>> {
    let element = StructuringElement::square(params.size)?;
    debug!(operation = %params.operation, size = params.size, "cleaning mask");
    match params.operation {
        MorphOp::Opening => opening(mask, &element),
        MorphOp::Closing => closing(mask, &element),
    }
}

/// Clean a mask stored with a singleton band axis, keeping that axis.
pub fn clean_band_stack(mask: &MultiBandRaster<u8>, params: &CleanParams) -> Result<MultiBandRaster<u8>> {
    let squeezed = mask.squeeze()?;
    let cleaned = clean_mask(&squeezed, params)?;
    Ok(MultiBandRaster::expand(&cleaned))
}

/// Mask cleaning stage
#[derive(Debug, Clone, Default)]
pub struct MaskCleaner;

impl Algorithm for MaskCleaner {
    type Input = Raster<u8>;
    type Output = Raster<u8>;
    type Params = CleanParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "MaskCleaner"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        clean_mask(&input, &params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopygap_core::ErrorKind;

    fn speckled() -> Raster<u8> {
        let mut mask: Raster<u8> = Raster::new(10, 10);
        for r in 2..8 {
            for c in 2..8 {
                mask.set(r, c, 1).unwrap();
            }
        }
        mask.set(4, 4, 0).unwrap(); // hole
        mask.set(0, 9, 1).unwrap(); // speck
        mask
    }

    #[test]
    fn test_morph_op_parse() {
        assert_eq!("opening".parse::<MorphOp>().unwrap(), MorphOp::Opening);
        assert_eq!("closing".parse::<MorphOp>().unwrap(), MorphOp::Closing);
        let err = "erosion".parse::<MorphOp>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_even_size_is_config_error() {
        let params = CleanParams {
            size: 4,
            ..Default::default()
        };
        assert_eq!(params.validate().unwrap_err().kind(), ErrorKind::Config);
        assert!(clean_mask(&speckled(), &params).is_err());
    }

    #[test]
    fn test_opening_removes_speck() {
        let out = clean_mask(&speckled(), &CleanParams::default()).unwrap();
        assert_eq!(out.get(0, 9).unwrap(), 0);
        assert_eq!(out.get(7, 7).unwrap(), 1);
    }

    #[test]
    fn test_closing_fills_hole() {
        let params = CleanParams {
            operation: MorphOp::Closing,
            size: 3,
        };
        let out = clean_mask(&speckled(), &params).unwrap();
        assert_eq!(out.get(4, 4).unwrap(), 1);
        assert_eq!(out.get(7, 7).unwrap(), 1);
        // Outside the raster is background, so the edge speck erodes away
        assert_eq!(out.get(0, 9).unwrap(), 0);
    }

    #[test]
    fn test_opening_removes_specks_at_edge_and_interior() {
        let mut mask: Raster<u8> = Raster::new(8, 8);
        for &(r0, c0) in &[(0, 0), (4, 4), (5, 0)] {
            for r in r0..r0 + 2 {
                for c in c0..c0 + 2 {
                    mask.set(r, c, 1).unwrap();
                }
            }
        }
        let out = clean_mask(&mask, &CleanParams::default()).unwrap();
        assert!(out.data().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_band_stack_shape_preserved() {
        let stack = MultiBandRaster::expand(&speckled());
        let out = clean_band_stack(&stack, &CleanParams::default()).unwrap();
        assert_eq!(out.band_count(), 1);
        assert_eq!((out.rows(), out.cols()), (10, 10));
    }

    #[test]
    fn test_algorithm_default_params() {
        let out = MaskCleaner.execute_default(speckled()).unwrap();
        assert_eq!(out.get(0, 9).unwrap(), 0);
    }
}
