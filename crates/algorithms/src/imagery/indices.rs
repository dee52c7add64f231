//! Vegetation index from four-band imagery
//!
//! Imagery bands are red, green, blue, near-infrared (zero-based 0..=3).

use crate::maybe_rayon::*;
use ndarray::Array2;
use canopygap_core::raster::{MultiBandRaster, Raster};
use canopygap_core::{Error, Result};

/// Zero-based band index of red
pub const RED_BAND: usize = 0;
/// Zero-based band index of near-infrared
pub const NIR_BAND: usize = 3;
/// Bands required by the imagery path
pub const REQUIRED_BANDS: usize = 4;

/// Normalized difference `(a - b) / (a + b)`.
///
/// Cells where the quotient is undefined (both bands zero, either band
/// no-data) are 0 rather than NaN, so every cell carries a usable value
/// for segmentation.
pub fn normalized_difference(band_a: &Raster<f64>, band_b: &Raster<f64>) -> Result<Raster<f64>> {
    if band_a.shape() != band_b.shape() {
        let (er, ec) = band_a.shape();
        let (ar, ac) = band_b.shape();
        return Err(Error::SizeMismatch { er, ec, ar, ac });
    }

    let (rows, cols) = band_a.shape();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![0.0; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                let a = unsafe { band_a.get_unchecked(row, col) };
                let b = unsafe { band_b.get_unchecked(row, col) };
                if band_a.is_nodata(a) || band_b.is_nodata(b) {
                    continue;
                }
                let v = (a - b) / (a + b);
                if v.is_finite() {
                    *out = v;
                }
            }
            row_data
        })
        .collect();

    let array = Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Input(e.to_string()))?;
    band_a.derive(array)
}

/// NDVI = (NIR - Red) / (NIR + Red), undefined cells set to 0
pub fn ndvi(nir: &Raster<f64>, red: &Raster<f64>) -> Result<Raster<f64>> {
    normalized_difference(nir, red)
}

/// NDVI of a four-band image.
///
/// Fails with `MissingBand` when the image has fewer than four bands.
pub fn image_ndvi(image: &MultiBandRaster<f64>) -> Result<Raster<f64>> {
    require_bands(image)?;
    ndvi(&image.band(NIR_BAND)?, &image.band(RED_BAND)?)
}

/// Fail unless the image carries red, green, blue and NIR
pub fn require_bands(image: &MultiBandRaster<f64>) -> Result<()> {
    if image.band_count() < REQUIRED_BANDS {
        return Err(Error::MissingBand {
            band: NIR_BAND,
            available: image.band_count(),
        });
    }
    Ok(())
}
