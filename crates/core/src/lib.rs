//! # canopygap core
//!
//! Data model shared by the canopy delineation stages.
//!
//! This crate provides:
//! - `Raster<T>` and `MultiBandRaster<T>`: georeferenced grids
//! - `GeoTransform`: affine pixel-to-map transform
//! - `CRS`: coordinate reference systems and WGS84 → UTM reprojection
//! - `PolygonRecord` / `PolygonCollection`: class-labelled polygons with
//!   area attributes
//! - The `Algorithm` trait implemented by every raster stage
//! - Native GeoTIFF I/O

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod vector;

pub use crs::CRS;
pub use error::{Error, ErrorKind, Result};
pub use raster::{GeoTransform, MultiBandRaster, Raster, RasterElement};
pub use vector::{LinearUnit, PolygonCollection, PolygonRecord, SizeClass};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::raster::{GeoTransform, MultiBandRaster, Raster, RasterElement};
    pub use crate::vector::{LinearUnit, PolygonCollection, PolygonRecord, SizeClass};
    pub use crate::Algorithm;
}

/// A pipeline stage: a pure transform of its input under a parameter set.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(
        &self,
        input: Self::Input,
        params: Self::Params,
    ) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
