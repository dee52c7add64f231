//! Band-stacked rasters (imagery, single-band cubes)

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use ndarray::{s, Array3, Axis};

/// A stack of co-registered bands laid out as (band, row, col).
///
/// Imagery arrives as red, green, blue, NIR in that order. Band indices
/// are zero-based.
#[derive(Debug, Clone)]
pub struct MultiBandRaster<T: RasterElement> {
    data: Array3<T>,
    transform: Option<GeoTransform>,
    crs: Option<CRS>,
    nodata: Option<T>,
}

impl<T: RasterElement> MultiBandRaster<T> {
    /// Wrap a (band, row, col) cube with no georeferencing
    pub fn from_array(data: Array3<T>) -> Self {
        Self {
            data,
            transform: None,
            crs: None,
            nodata: None,
        }
    }

    /// Stack single-band rasters; metadata is taken from the first band.
    pub fn from_bands(bands: &[Raster<T>]) -> Result<Self> {
        let first = bands
            .first()
            .ok_or_else(|| Error::Input("no bands to stack".into()))?;
        let (rows, cols) = first.shape();

        let mut data = Array3::zeros((bands.len(), rows, cols));
        for (i, band) in bands.iter().enumerate() {
            if band.shape() != (rows, cols) {
                let (ar, ac) = band.shape();
                return Err(Error::SizeMismatch {
                    er: rows,
                    ec: cols,
                    ar,
                    ac,
                });
            }
            data.slice_mut(s![i, .., ..]).assign(band.data());
        }

        Ok(Self {
            data,
            transform: first.transform().copied(),
            crs: first.crs().cloned(),
            nodata: first.nodata(),
        })
    }

    /// Number of bands
    pub fn band_count(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.data.len_of(Axis(2))
    }

    /// Underlying cube
    pub fn data(&self) -> &Array3<T> {
        &self.data
    }

    pub fn transform(&self) -> Option<&GeoTransform> {
        self.transform.as_ref()
    }

    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = Some(transform);
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    pub fn set_crs(&mut self, crs: Option<CRS>) {
        self.crs = crs;
    }

    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    /// Copy band `index` out as a single-band raster with shared metadata
    pub fn band(&self, index: usize) -> Result<Raster<T>> {
        if index >= self.band_count() {
            return Err(Error::MissingBand {
                band: index,
                available: self.band_count(),
            });
        }
        let mut raster = Raster::from_array(self.data.index_axis(Axis(0), index).to_owned());
        if let Some(t) = self.transform {
            raster.set_transform(t);
        }
        raster.set_crs(self.crs.clone());
        raster.set_nodata(self.nodata);
        Ok(raster)
    }

    /// Collapse a single-band stack into a 2D raster
    pub fn squeeze(&self) -> Result<Raster<T>> {
        if self.band_count() != 1 {
            return Err(Error::Input(format!(
                "expected a single band, found {}",
                self.band_count()
            )));
        }
        self.band(0)
    }

    /// Wrap a 2D raster as a one-band stack
    pub fn expand(raster: &Raster<T>) -> Self {
        let data = raster.data().clone().insert_axis(Axis(0));
        Self {
            data,
            transform: raster.transform().copied(),
            crs: raster.crs().cloned(),
            nodata: raster.nodata(),
        }
    }
}
