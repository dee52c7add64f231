//! Native GeoTIFF reading/writing on top of the `tiff` crate
//!
//! Reads stripped or tiled images with any number of interleaved samples,
//! the pixel-scale/tiepoint georeferencing pair and the EPSG code from the
//! GeoKey directory. Writes single-band 32-bit float images with the same
//! tags.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, MultiBandRaster, Raster, RasterElement};
use ndarray::Array3;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

const GT_MODEL_TYPE: u32 = 1024;
const GT_RASTER_TYPE: u32 = 1025;
const GEOGRAPHIC_TYPE: u32 = 2048;
const PROJECTED_CS_TYPE: u32 = 3072;
const USER_DEFINED: u32 = 32767;

/// Read every band of a GeoTIFF file
pub fn read_geotiff<T, P>(path: P) -> Result<MultiBandRaster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    decode_geotiff(BufReader::new(file))
}

/// Read a single-band GeoTIFF file as a 2D raster
pub fn read_geotiff_band<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    read_geotiff(path)?.squeeze()
}

/// Read a GeoTIFF from an in-memory buffer
pub fn read_geotiff_from_buffer<T>(data: &[u8]) -> Result<MultiBandRaster<T>>
where
    T: RasterElement,
{
    decode_geotiff(Cursor::new(data))
}

fn tiff_error(context: &str, e: tiff::TiffError) -> Error {
    Error::Input(format!("{}: {}", context, e))
}

fn cast_all<S, T>(buf: Vec<S>) -> Vec<T>
where
    S: num_traits::NumCast + Copy,
    T: RasterElement,
{
    // Values the target type cannot hold become NaN, or zero for integers
    let fill: T = num_traits::cast::<f64, T>(f64::NAN).unwrap_or_else(T::zero);
    buf.into_iter()
        .map(|v| num_traits::cast::<S, T>(v).unwrap_or(fill))
        .collect()
}

fn decode_geotiff<T, R>(reader: R) -> Result<MultiBandRaster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let mut decoder = Decoder::new(reader).map_err(|e| tiff_error("TIFF decode error", e))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| tiff_error("cannot read dimensions", e))?;
    let rows = height as usize;
    let cols = width as usize;
    if rows == 0 || cols == 0 {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let result = decoder
        .read_image()
        .map_err(|e| tiff_error("cannot read image data", e))?;

    let data: Vec<T> = match result {
        DecodingResult::U8(buf) => cast_all(buf),
        DecodingResult::U16(buf) => cast_all(buf),
        DecodingResult::U32(buf) => cast_all(buf),
        DecodingResult::I8(buf) => cast_all(buf),
        DecodingResult::I16(buf) => cast_all(buf),
        DecodingResult::I32(buf) => cast_all(buf),
        DecodingResult::F32(buf) => cast_all(buf),
        DecodingResult::F64(buf) => cast_all(buf),
        _ => {
            return Err(Error::UnsupportedDataType(
                "unsupported TIFF pixel format".to_string(),
            ))
        }
    };

    let cells = rows * cols;
    if data.len() % cells != 0 {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }
    let samples = data.len() / cells;

    // Chunky layout (row, col, sample) -> (band, row, col)
    let interleaved = Array3::from_shape_vec((rows, cols, samples), data)
        .map_err(|e| Error::Input(e.to_string()))?;
    let cube = interleaved.permuted_axes([2, 0, 1]).as_standard_layout().to_owned();

    let mut raster = MultiBandRaster::from_array(cube);
    if let Some(transform) = read_geotransform(&mut decoder) {
        raster.set_transform(transform);
    }
    raster.set_crs(read_epsg(&mut decoder).map(CRS::from_epsg));

    Ok(raster)
}

fn read_f64_tag<R: Read + Seek>(decoder: &mut Decoder<R>, tag: Tag) -> Option<Vec<f64>> {
    decoder.find_tag(tag).ok().flatten()?.into_f64_vec().ok()
}

/// GeoTransform from ModelPixelScale + ModelTiepoint, if both are present
fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = read_f64_tag(decoder, Tag::ModelPixelScaleTag)?;
    let tiepoint = read_f64_tag(decoder, Tag::ModelTiepointTag)?;

    if scale.len() < 2 || tiepoint.len() < 6 {
        return None;
    }
    // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
    let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
    let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
    Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]))
}

/// EPSG code from the GeoKey directory: projected CS first, then geographic
fn read_epsg<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<u32> {
    let keys = decoder
        .find_tag(Tag::GeoKeyDirectoryTag)
        .ok()
        .flatten()?
        .into_u32_vec()
        .ok()?;
    parse_geokey_epsg(&keys)
}

fn parse_geokey_epsg(keys: &[u32]) -> Option<u32> {
    let header = keys.get(..4)?;
    let count = header[3] as usize;
    let entries: Vec<&[u32]> = keys[4..].chunks_exact(4).take(count).collect();

    let lookup = |key: u32| {
        entries
            .iter()
            .find(|e| e[0] == key && e[1] == 0)
            .map(|e| e[3])
            .filter(|&code| code != 0 && code != USER_DEFINED)
    };
    lookup(PROJECTED_CS_TYPE).or_else(|| lookup(GEOGRAPHIC_TYPE))
}

fn geokey_directory(crs: Option<&CRS>) -> Vec<u16> {
    let epsg = crs.and_then(|c| c.epsg()).and_then(|c| u16::try_from(c).ok());
    let geographic = epsg == Some(4326);

    let mut keys: Vec<[u16; 4]> = vec![
        [GT_MODEL_TYPE as u16, 0, 1, if geographic { 2 } else { 1 }],
        [GT_RASTER_TYPE as u16, 0, 1, 1],
    ];
    if let Some(code) = epsg {
        let key = if geographic { GEOGRAPHIC_TYPE } else { PROJECTED_CS_TYPE };
        keys.push([key as u16, 0, 1, code]);
    }

    let mut dir = vec![1, 1, 0, keys.len() as u16];
    dir.extend(keys.into_iter().flatten());
    dir
}

/// Write a raster as a single-band float32 GeoTIFF file
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    encode_geotiff(raster, file)
}

/// Write a raster to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer<T>(raster: &Raster<T>) -> Result<Vec<u8>>
where
    T: RasterElement,
{
    let mut buf = Vec::new();
    encode_geotiff(raster, Cursor::new(&mut buf))?;
    Ok(buf)
}

fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    let mut encoder = TiffEncoder::new(writer).map_err(|e| tiff_error("TIFF encoder error", e))?;

    let (rows, cols) = raster.shape();
    let data: Vec<f32> = raster
        .data()
        .iter()
        .map(|&v| num_traits::cast(v).unwrap_or(f32::NAN))
        .collect();

    let mut image = encoder
        .new_image::<Gray32Float>(cols as u32, rows as u32)
        .map_err(|e| tiff_error("cannot create TIFF image", e))?;

    if let Some(gt) = raster.transform() {
        let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
        image
            .encoder()
            .write_tag(Tag::ModelPixelScaleTag, &scale[..])
            .map_err(|e| tiff_error("cannot write scale tag", e))?;

        let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
        image
            .encoder()
            .write_tag(Tag::ModelTiepointTag, &tiepoint[..])
            .map_err(|e| tiff_error("cannot write tiepoint tag", e))?;
    }

    let geokeys = geokey_directory(raster.crs());
    image
        .encoder()
        .write_tag(Tag::GeoKeyDirectoryTag, geokeys.as_slice())
        .map_err(|e| tiff_error("cannot write geokey tag", e))?;

    image
        .write_data(&data)
        .map_err(|e| tiff_error("cannot write image data", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geokey_roundtrip() {
        let dir = geokey_directory(Some(&CRS::from_epsg(2232)));
        let keys: Vec<u32> = dir.iter().map(|&k| k as u32).collect();
        assert_eq!(parse_geokey_epsg(&keys), Some(2232));

        let dir = geokey_directory(Some(&CRS::wgs84()));
        let keys: Vec<u32> = dir.iter().map(|&k| k as u32).collect();
        assert_eq!(parse_geokey_epsg(&keys), Some(4326));

        let dir = geokey_directory(None);
        let keys: Vec<u32> = dir.iter().map(|&k| k as u32).collect();
        assert_eq!(parse_geokey_epsg(&keys), None);
    }

    #[test]
    fn test_geokey_user_defined_ignored() {
        let keys = [1, 1, 0, 1, 3072, 0, 1, 32767];
        assert_eq!(parse_geokey_epsg(&keys), None);
        assert_eq!(parse_geokey_epsg(&[1, 1]), None);
    }

    #[test]
    fn test_buffer_roundtrip() {
        let raster: Raster<f64> = Raster::from_vec(vec![0.0, 1.0, 2.5, 9.0, 4.0, 6.0], 2, 3)
            .unwrap()
            .with_transform(GeoTransform::new(1000.0, 2000.0, 3.0, -3.0))
            .with_crs(CRS::from_epsg(32613));

        let bytes = write_geotiff_to_buffer(&raster).unwrap();
        let back: MultiBandRaster<f64> = read_geotiff_from_buffer(&bytes).unwrap();

        assert_eq!(back.band_count(), 1);
        let band = back.squeeze().unwrap();
        assert_eq!(band.shape(), (2, 3));
        assert_eq!(band.get(1, 0).unwrap(), 9.0);
        assert_eq!(band.transform(), raster.transform());
        assert_eq!(band.crs().and_then(|c| c.epsg()), Some(32613));
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mask.tif");
        let raster: Raster<u8> = Raster::filled(4, 5, 1)
            .with_transform(GeoTransform::new(0.0, 4.0, 1.0, -1.0))
            .with_crs(CRS::from_epsg(2232));

        write_geotiff(&raster, &path).unwrap();
        let back: Raster<u8> = read_geotiff_band(&path).unwrap();
        assert_eq!(back.data(), raster.data());
    }
}
