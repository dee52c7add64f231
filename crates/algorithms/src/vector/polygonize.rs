//! Raster to polygon tracing
//!
//! Cells are grouped into maximal 4-connected regions of equal value. Each
//! region's boundary is walked along cell edges and mapped through the
//! raster's geotransform, giving one polygon (shell plus holes) per region.

use crate::maybe_rayon::*;
use canopygap_core::raster::{GeoTransform, MultiBandRaster, Raster, RasterElement};
use canopygap_core::vector::{PolygonCollection, PolygonRecord};
use canopygap_core::{Algorithm, Error, Result};
use geo::orient::{Direction, Orient};
use geo::{Coord, LineString, Polygon};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// Parameters for polygonizing a mask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolygonizeParams {
    /// Cell value whose regions are kept
    pub foreground: u8,
}

impl Default for PolygonizeParams {
    fn default() -> Self {
        Self { foreground: 1 }
    }
}

/// 4-connected regions of equal value
#[derive(Debug, Clone)]
pub struct RegionMap<T> {
    /// Region index of every cell
    pub labels: Array2<usize>,
    /// Cell value of each region
    pub values: Vec<T>,
    /// Cell count of each region
    pub sizes: Vec<usize>,
}

impl<T> RegionMap<T> {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Label maximal 4-connected regions of equal value, in row-major order of
/// each region's first cell.
pub fn label_regions<T: RasterElement>(raster: &Raster<T>) -> RegionMap<T> {
    let (rows, cols) = raster.shape();
    let data = raster.data();
    let mut labels = Array2::from_elem((rows, cols), usize::MAX);
    let mut values = Vec::new();
    let mut sizes = Vec::new();
    let mut queue = VecDeque::new();

    for r in 0..rows {
        for c in 0..cols {
            if labels[(r, c)] != usize::MAX {
                continue;
            }
            let id = values.len();
            let value = data[(r, c)];
            let mut size = 0;
            labels[(r, c)] = id;
            queue.push_back((r, c));

            while let Some((cr, cc)) = queue.pop_front() {
                size += 1;
                let neighbours = [
                    (cr.wrapping_sub(1), cc),
                    (cr + 1, cc),
                    (cr, cc.wrapping_sub(1)),
                    (cr, cc + 1),
                ];
                for (nr, nc) in neighbours {
                    if nr < rows && nc < cols && labels[(nr, nc)] == usize::MAX && data[(nr, nc)] == value {
                        labels[(nr, nc)] = id;
                        queue.push_back((nr, nc));
                    }
                }
            }

            values.push(value);
            sizes.push(size);
        }
    }

    RegionMap {
        labels,
        values,
        sizes,
    }
}

// Edge directions in pixel space (x = col, y = row, y down), in clockwise
// order as seen on screen.
const EAST: u8 = 0;
const SOUTH: u8 = 1;
const WEST: u8 = 2;
const NORTH: u8 = 3;

type Vertex = (usize, usize);

fn step((x, y): Vertex, dir: u8) -> Vertex {
    match dir {
        EAST => (x + 1, y),
        SOUTH => (x, y + 1),
        WEST => (x - 1, y),
        _ => (x, y - 1),
    }
}

/// Boundary edges of every kept region: the cell side faces a different
/// region or the raster edge. The region lies to the right of each edge.
fn boundary_edges(labels: &Array2<usize>, keep: &[bool]) -> Vec<Vec<(Vertex, u8)>> {
    let (rows, cols) = labels.dim();
    let mut edges: Vec<Vec<(Vertex, u8)>> = vec![Vec::new(); keep.len()];

    for r in 0..rows {
        for c in 0..cols {
            let id = labels[(r, c)];
            if !keep[id] {
                continue;
            }
            let differs = |nr: Option<usize>, nc: Option<usize>| match (nr, nc) {
                (Some(nr), Some(nc)) if nr < rows && nc < cols => labels[(nr, nc)] != id,
                _ => true,
            };
            let out = &mut edges[id];
            if differs(r.checked_sub(1), Some(c)) {
                out.push(((c, r), EAST));
            }
            if differs(Some(r), Some(c + 1)) {
                out.push(((c + 1, r), SOUTH));
            }
            if differs(Some(r + 1), Some(c)) {
                out.push(((c + 1, r + 1), WEST));
            }
            if differs(Some(r), c.checked_sub(1)) {
                out.push(((c, r + 1), NORTH));
            }
        }
    }
    edges
}

/// Walk one region's edges into closed rings of corner vertices.
///
/// Where two boundary paths meet at a diagonal pinch the walk turns left,
/// which splits a shell from a hole that touches it at that vertex.
fn trace_rings(edges: &[(Vertex, u8)]) -> Vec<Vec<Vertex>> {
    let mut outgoing: HashMap<Vertex, u8> = HashMap::with_capacity(edges.len());
    for &(v, dir) in edges {
        *outgoing.entry(v).or_insert(0) |= 1 << dir;
    }

    let mut rings = Vec::new();
    for &(start, first) in edges {
        if outgoing.get(&start).map_or(true, |bits| bits & (1 << first) == 0) {
            continue;
        }

        let mut path: Vec<(Vertex, u8)> = vec![(start, first)];
        let mut v = step(start, first);
        let mut dir = first;

        loop {
            let bits = outgoing.get(&v).copied().unwrap_or(0);
            let next = [(dir + 3) % 4, dir, (dir + 1) % 4]
                .into_iter()
                .find(|&d| bits & (1 << d) != 0);
            let Some(next) = next else {
                // Every region boundary is closed; an open path means the
                // edge set was inconsistent.
                break;
            };
            if v == start && next == first {
                break;
            }
            if let Some(b) = outgoing.get_mut(&v) {
                *b &= !(1 << next);
            }
            path.push((v, next));
            dir = next;
            v = step(v, next);
        }

        if let Some(b) = outgoing.get_mut(&start) {
            *b &= !(1 << first);
        }

        // Keep only vertices where the direction changes
        let n = path.len();
        let ring: Vec<Vertex> = (0..n)
            .filter(|&i| path[(i + n - 1) % n].1 != path[i].1)
            .map(|i| path[i].0)
            .collect();
        if ring.len() >= 4 {
            rings.push(ring);
        }
    }
    rings
}

/// Twice the signed area in pixel space; positive for shells
fn signed_area2(ring: &[Vertex]) -> i64 {
    let n = ring.len();
    (0..n)
        .map(|i| {
            let (x0, y0) = ring[i];
            let (x1, y1) = ring[(i + 1) % n];
            x0 as i64 * y1 as i64 - x1 as i64 * y0 as i64
        })
        .sum()
}

fn to_linestring(ring: &[Vertex], transform: &GeoTransform) -> LineString<f64> {
    let mut coords: Vec<Coord<f64>> = ring
        .iter()
        .map(|&(x, y)| {
            let (gx, gy) = transform.pixel_to_geo_corner(x, y);
            Coord { x: gx, y: gy }
        })
        .collect();
    if let Some(&first) = coords.first() {
        coords.push(first);
    }
    LineString::new(coords)
}

/// Assemble rings into polygons: the largest shell takes every hole.
/// A 4-connected region has exactly one shell.
fn rings_to_polygon(rings: Vec<Vec<Vertex>>, transform: &GeoTransform) -> Option<Polygon<f64>> {
    let mut shell: Option<(i64, Vec<Vertex>)> = None;
    let mut holes = Vec::new();

    for ring in rings {
        let area = signed_area2(&ring);
        if area > 0 {
            match &shell {
                Some((best, _)) if *best >= area => {}
                _ => shell = Some((area, ring)),
            }
        } else if area < 0 {
            holes.push(to_linestring(&ring, transform));
        }
    }

    let (_, shell) = shell?;
    let polygon = Polygon::new(to_linestring(&shell, transform), holes);
    Some(polygon.orient(Direction::Default))
}

/// Polygon of every region accepted by `keep(region, value)`, paired with
/// its region index.
pub fn trace_regions<T, F>(raster: &Raster<T>, regions: &RegionMap<T>, keep: F) -> Result<Vec<(usize, Polygon<f64>)>>
where
    T: RasterElement,
    F: Fn(usize, T) -> bool,
{
    let (transform, _) = raster.georef()?;
    if regions.labels.dim() != raster.shape() {
        let (er, ec) = raster.shape();
        let (ar, ac) = regions.labels.dim();
        return Err(Error::SizeMismatch { er, ec, ar, ac });
    }

    let kept: Vec<bool> = regions
        .values
        .iter()
        .enumerate()
        .map(|(i, &v)| keep(i, v))
        .collect();
    let edges = boundary_edges(&regions.labels, &kept);

    let polygons: Vec<Option<(usize, Polygon<f64>)>> = edges
        .into_par_iter()
        .enumerate()
        .map(|(id, region_edges)| {
            if region_edges.is_empty() {
                return None;
            }
            rings_to_polygon(trace_rings(&region_edges), transform).map(|p| (id, p))
        })
        .collect();

    Ok(polygons.into_iter().flatten().collect())
}

/// Polygonize the regions of `mask` whose value equals the foreground.
///
/// Records carry the foreground value as their class and the mask's CRS.
/// Record order follows the row-major position of each region's first
/// cell; callers should not rely on it.
pub fn polygonize(mask: &Raster<u8>, params: &PolygonizeParams) -> Result<PolygonCollection> {
    let (_, crs) = mask.georef()?;
    let regions = label_regions(mask);
    let foreground = params.foreground;
    let polygons = trace_regions(mask, &regions, |_, v| v == foreground)?;

    debug!(
        regions = regions.len(),
        polygons = polygons.len(),
        "polygonized mask"
    );

    let mut collection = PolygonCollection::new(Some(crs.clone()));
    for (id, (_, polygon)) in polygons.into_iter().enumerate() {
        collection.push(PolygonRecord::new(id, polygon).with_class(foreground));
    }
    Ok(collection)
}

/// Polygonize a mask stored with a singleton band axis
pub fn polygonize_band_stack(mask: &MultiBandRaster<u8>, params: &PolygonizeParams) -> Result<PolygonCollection> {
    polygonize(&mask.squeeze()?, params)
}

/// Raster-to-vector stage
#[derive(Debug, Clone, Default)]
pub struct Polygonizer;

impl Algorithm for Polygonizer {
    type Input = Raster<u8>;
    type Output = PolygonCollection;
    type Params = PolygonizeParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Polygonizer"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        polygonize(&input, &params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopygap_core::{ErrorKind, CRS};
    use geo::Area;

    fn mask(rows: usize, cols: usize, cells: &[(usize, usize)]) -> Raster<u8> {
        let mut r: Raster<u8> = Raster::new(rows, cols)
            .with_transform(GeoTransform::new(0.0, rows as f64, 1.0, -1.0))
            .with_crs(CRS::from_epsg(2232));
        for &(row, col) in cells {
            r.set(row, col, 1).unwrap();
        }
        r
    }

    #[test]
    fn test_label_regions_four_connected() {
        // Diagonal neighbours are separate regions
        let m = mask(2, 2, &[(0, 0), (1, 1)]);
        let regions = label_regions(&m);
        assert_eq!(regions.len(), 4);
        assert_eq!(regions.sizes, vec![1, 1, 1, 1]);
    }

    #[test]
    fn test_single_cell_square() {
        let m = mask(3, 3, &[(1, 1)]);
        let out = polygonize(&m, &PolygonizeParams::default()).unwrap();
        assert_eq!(out.len(), 1);
        let poly = &out.records[0].polygons()[0];
        assert!((poly.unsigned_area() - 1.0).abs() < 1e-12);
        // Collinear vertices removed: 4 corners + closing point
        assert_eq!(poly.exterior().0.len(), 5);
        assert_eq!(out.records[0].class, Some(1));
    }

    #[test]
    fn test_l_shape_area() {
        let m = mask(4, 4, &[(0, 0), (1, 0), (2, 0), (2, 1), (2, 2)]);
        let out = polygonize(&m, &PolygonizeParams::default()).unwrap();
        assert_eq!(out.len(), 1);
        assert!((out.records[0].polygons()[0].unsigned_area() - 5.0).abs() < 1e-12);
        assert_eq!(out.records[0].polygons()[0].exterior().0.len(), 7);
    }

    #[test]
    fn test_ring_with_hole() {
        let cells: Vec<_> = (0..3)
            .flat_map(|r| (0..3).map(move |c| (r, c)))
            .filter(|&rc| rc != (1, 1))
            .collect();
        let m = mask(3, 3, &cells);
        let out = polygonize(&m, &PolygonizeParams::default()).unwrap();
        assert_eq!(out.len(), 1);
        let poly = &out.records[0].polygons()[0];
        assert_eq!(poly.interiors().len(), 1);
        assert!((poly.unsigned_area() - 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_pinched_hole_touches_shell() {
        // Region wraps around (1,2) and closes only diagonally at corner (2,2)
        let m = mask(
            4,
            5,
            &[(0, 1), (0, 2), (0, 3), (1, 1), (1, 3), (2, 2), (2, 3)],
        );
        let out = polygonize(&m, &PolygonizeParams::default()).unwrap();
        assert_eq!(out.len(), 1);
        let poly = &out.records[0].polygons()[0];
        assert_eq!(poly.interiors().len(), 1);
        assert!((poly.unsigned_area() - 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_diagonal_cells_are_separate_polygons() {
        let m = mask(2, 2, &[(0, 0), (1, 1)]);
        let out = polygonize(&m, &PolygonizeParams::default()).unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_geotransform_applied() {
        let mut m = mask(2, 2, &[(0, 0)]);
        m.set_transform(GeoTransform::new(1000.0, 500.0, 10.0, -10.0));
        let out = polygonize(&m, &PolygonizeParams::default()).unwrap();
        let poly = &out.records[0].polygons()[0];
        assert!((poly.unsigned_area() - 100.0).abs() < 1e-9);
        let xs: Vec<f64> = poly.exterior().0.iter().map(|c| c.x).collect();
        let ys: Vec<f64> = poly.exterior().0.iter().map(|c| c.y).collect();
        assert!(xs.iter().all(|&x| x == 1000.0 || x == 1010.0));
        assert!(ys.iter().all(|&y| y == 500.0 || y == 490.0));
        assert_eq!(out.crs(), Some(&CRS::from_epsg(2232)));
    }

    #[test]
    fn test_custom_foreground() {
        let m = mask(3, 3, &[(0, 0)]);
        let params = PolygonizeParams { foreground: 0 };
        let out = Polygonizer.execute(m, params).unwrap();
        assert_eq!(out.len(), 1);
        assert!((out.records[0].polygons()[0].unsigned_area() - 8.0).abs() < 1e-12);
        assert_eq!(out.records[0].class, Some(0));
    }

    #[test]
    fn test_missing_crs_rejected() {
        let m: Raster<u8> = Raster::filled(2, 2, 1).with_transform(GeoTransform::new(0.0, 2.0, 1.0, -1.0));
        let err = polygonize(&m, &PolygonizeParams::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CrsMismatch);
    }

    #[test]
    fn test_empty_mask_gives_no_polygons() {
        let m = mask(3, 3, &[]);
        assert!(polygonize(&m, &PolygonizeParams::default()).unwrap().is_empty());
    }

    #[test]
    fn test_band_stack_squeezed() {
        let m = mask(3, 3, &[(1, 1), (1, 2)]);
        let stack = MultiBandRaster::expand(&m);
        let out = polygonize_band_stack(&stack, &PolygonizeParams::default()).unwrap();
        assert_eq!(out.len(), 1);
    }
}
