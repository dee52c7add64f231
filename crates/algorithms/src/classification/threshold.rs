//! Height-threshold canopy classification for LiDAR-derived rasters

use crate::maybe_rayon::*;
use canopygap_core::raster::Raster;
use canopygap_core::{Algorithm, Error, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Parameters for height thresholding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdParams {
    /// Minimum height of a canopy cell, in the raster's linear unit
    pub canopy_height: f64,
}

impl Default for ThresholdParams {
    fn default() -> Self {
        Self { canopy_height: 5.0 }
    }
}

impl ThresholdParams {
    pub fn validate(&self) -> Result<()> {
        if !self.canopy_height.is_finite() {
            return Err(Error::InvalidParameter {
                name: "canopy_height",
                value: self.canopy_height.to_string(),
                reason: "must be finite".to_string(),
            });
        }
        Ok(())
    }
}

/// Binary canopy mask: 1 where height >= `canopy_height`, else 0.
///
/// No-data heights (NaN, the declared no-data value, the float maximum
/// sentinel) are never canopy. An empty raster or one holding no valid
/// height fails with an input error.
pub fn threshold_canopy(height: &Raster<f64>, params: &ThresholdParams) -> Result<Raster<u8>> {
    params.validate()?;

    let (rows, cols) = height.shape();
    if height.is_empty() {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }
    if height.valid_count() == 0 {
        return Err(Error::Input("height raster holds no valid cells".into()));
    }

    let threshold = params.canopy_height;
    let data: Vec<u8> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| {
                    let h = unsafe { height.get_unchecked(row, col) };
                    u8::from(!height.is_nodata(h) && h >= threshold)
                })
                .collect::<Vec<u8>>()
        })
        .collect();

    let canopy = data.iter().filter(|&&v| v == 1).count();
    debug!(threshold, canopy, total = data.len(), "thresholded height raster");

    let array = Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Input(e.to_string()))?;
    height.derive(array)
}

/// Canopy height model: first-return surface minus ground surface.
///
/// Cells where either surface is no-data are NaN in the output.
pub fn canopy_height_model(first: &Raster<f64>, ground: &Raster<f64>) -> Result<Raster<f64>> {
    if first.shape() != ground.shape() {
        let (er, ec) = first.shape();
        let (ar, ac) = ground.shape();
        return Err(Error::SizeMismatch { er, ec, ar, ac });
    }

    let (rows, cols) = first.shape();
    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| {
                    let f = unsafe { first.get_unchecked(row, col) };
                    let g = unsafe { ground.get_unchecked(row, col) };
                    if first.is_nodata(f) || ground.is_nodata(g) {
                        f64::NAN
                    } else {
                        f - g
                    }
                })
                .collect::<Vec<f64>>()
        })
        .collect();

    let array = Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Input(e.to_string()))?;
    let mut chm = first.derive(array)?;
    chm.set_nodata(Some(f64::NAN));
    Ok(chm)
}

/// LiDAR path of the raster classifier
#[derive(Debug, Clone, Default)]
pub struct RasterClassifier;

impl Algorithm for RasterClassifier {
    type Input = Raster<f64>;
    type Output = Raster<u8>;
    type Params = ThresholdParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "RasterClassifier"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        threshold_canopy(&input, &params)
    }
}
