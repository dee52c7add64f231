//! Quickshift superpixel segmentation
//!
//! Mode seeking in the joint (colour, row, col) space: every pixel gets a
//! Parzen density estimate over a square window, then links to the nearest
//! pixel of higher density. Links longer than `max_dist` are cut, and each
//! resulting tree is one segment.
//!
//! Reference: Vedaldi, A. & Soatto, S. (2008). Quick Shift and Kernel
//! Methods for Mode Seeking. ECCV.

use crate::maybe_rayon::*;
use canopygap_core::raster::{MultiBandRaster, Raster};
use canopygap_core::{Error, Result};
use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};

/// Parameters for quickshift
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuickshiftParams {
    /// Width of the Gaussian density kernel (default: 3)
    pub kernel_size: f64,
    /// Longest parent link kept; larger values give fewer segments (default: 6)
    pub max_dist: f64,
    /// Weight of colour distance against spatial distance (default: 0.5)
    pub ratio: f64,
}

impl Default for QuickshiftParams {
    fn default() -> Self {
        Self {
            kernel_size: 3.0,
            max_dist: 6.0,
            ratio: 0.5,
        }
    }
}

impl QuickshiftParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.kernel_size.is_finite() && self.kernel_size > 0.0) {
            return Err(Error::InvalidParameter {
                name: "kernel_size",
                value: self.kernel_size.to_string(),
                reason: "must be a positive number".to_string(),
            });
        }
        if !(self.max_dist.is_finite() && self.max_dist >= 0.0) {
            return Err(Error::InvalidParameter {
                name: "max_dist",
                value: self.max_dist.to_string(),
                reason: "must be a non-negative number".to_string(),
            });
        }
        if !(self.ratio.is_finite() && self.ratio >= 0.0) {
            return Err(Error::InvalidParameter {
                name: "ratio",
                value: self.ratio.to_string(),
                reason: "must be a non-negative number".to_string(),
            });
        }
        Ok(())
    }
}

/// Segment an image (band, row, col) into superpixels.
///
/// Band values should already be on a common scale (e.g. reflectance in
/// 0..1); they are multiplied by `ratio` before distances are measured.
/// Non-finite values count as 0. Returns one label per pixel, numbered
/// 0..n in raster order of each segment's root, with the image's
/// georeferencing.
///
/// Density ties are broken by flat pixel index so the result is fully
/// deterministic.
pub fn quickshift(image: &MultiBandRaster<f64>, params: &QuickshiftParams) -> Result<Raster<u32>> {
    params.validate()?;

    let (bands, rows, cols) = image.data().dim();
    if bands == 0 || rows == 0 || cols == 0 {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }
    let n = rows * cols;
    if u32::try_from(n).is_err() {
        return Err(Error::Input(format!("{} pixels exceed the label range", n)));
    }

    let scaled: Array3<f64> = image
        .data()
        .mapv(|v| if v.is_finite() { v * params.ratio } else { 0.0 });
    let kernel_width = (3.0 * params.kernel_size).ceil() as usize;
    let inv_kernel_sq = -0.5 / (params.kernel_size * params.kernel_size);

    let window = |r: usize, c: usize| {
        (
            r.saturating_sub(kernel_width)..(r + kernel_width + 1).min(rows),
            c.saturating_sub(kernel_width)..(c + kernel_width + 1).min(cols),
        )
    };
    let dist2 = |r: usize, c: usize, rr: usize, cc: usize| -> f64 {
        let mut d = 0.0;
        for b in 0..bands {
            let diff = scaled[[b, r, c]] - scaled[[b, rr, cc]];
            d += diff * diff;
        }
        let dr = r as f64 - rr as f64;
        let dc = c as f64 - cc as f64;
        d + dr * dr + dc * dc
    };

    // Parzen density estimate per pixel
    let density: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|r| {
            let mut row_data = vec![0.0; cols];
            for (c, out) in row_data.iter_mut().enumerate() {
                let (wr, wc) = window(r, c);
                let mut sum = 0.0;
                for rr in wr {
                    for cc in wc.clone() {
                        sum += (dist2(r, c, rr, cc) * inv_kernel_sq).exp();
                    }
                }
                *out = sum;
            }
            row_data
        })
        .collect();

    // Nearest neighbour of higher density, cut beyond max_dist
    let max_dist = params.max_dist;
    let parent: Vec<usize> = (0..rows)
        .into_par_iter()
        .flat_map(|r| {
            let mut row_data = Vec::with_capacity(cols);
            for c in 0..cols {
                let idx = r * cols + c;
                let here = density[idx];
                let (wr, wc) = window(r, c);
                let mut closest = f64::INFINITY;
                let mut link = idx;
                for rr in wr {
                    for cc in wc.clone() {
                        let j = rr * cols + cc;
                        let there = density[j];
                        if there > here || (there == here && j > idx) {
                            let d = dist2(r, c, rr, cc);
                            if d < closest {
                                closest = d;
                                link = j;
                            }
                        }
                    }
                }
                if closest.sqrt() > max_dist {
                    link = idx;
                }
                row_data.push(link);
            }
            row_data
        })
        .collect();

    let roots = flatten_forest(parent);

    // Relabel roots 0..n in ascending pixel order
    let mut root_label = vec![u32::MAX; n];
    let mut next = 0u32;
    for (i, &root) in roots.iter().enumerate() {
        if root == i {
            root_label[i] = next;
            next += 1;
        }
    }
    let labels: Vec<u32> = roots.iter().map(|&root| root_label[root]).collect();

    let mut out = Raster::from_array(
        Array2::from_shape_vec((rows, cols), labels).map_err(|e| Error::Input(e.to_string()))?,
    );
    if let Some(t) = image.transform() {
        out.set_transform(*t);
    }
    out.set_crs(image.crs().cloned());
    Ok(out)
}

/// Follow parent links until every pixel points at its tree root
fn flatten_forest(mut parent: Vec<usize>) -> Vec<usize> {
    loop {
        let next: Vec<usize> = parent.iter().map(|&p| parent[p]).collect();
        if next == parent {
            return parent;
        }
        parent = next;
    }
}

/// Number of distinct labels in a quickshift output
pub fn segment_count(labels: &Raster<u32>) -> usize {
    labels.data().iter().max().map_or(0, |&m| m as usize + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopygap_core::ErrorKind;

    fn image_from(bands: Vec<Array2<f64>>) -> MultiBandRaster<f64> {
        let views: Vec<_> = bands.iter().map(|b| b.view()).collect();
        MultiBandRaster::from_array(ndarray::stack(ndarray::Axis(0), &views).unwrap())
    }

    #[test]
    fn test_uniform_image_single_segment() {
        let image = image_from(vec![Array2::from_elem((4, 4), 0.3)]);
        let labels = quickshift(&image, &QuickshiftParams::default()).unwrap();
        assert_eq!(segment_count(&labels), 1);
        assert!(labels.data().iter().all(|&l| l == 0));
    }

    #[test]
    fn test_contrasting_halves_never_share_segment() {
        let halves = Array2::from_shape_fn((6, 8), |(_, c)| if c < 4 { 0.8 } else { -0.3 });
        let image = image_from(vec![halves]);
        let params = QuickshiftParams {
            ratio: 10.0,
            ..Default::default()
        };
        let labels = quickshift(&image, &params).unwrap();

        assert!(segment_count(&labels) >= 2);
        for r in 0..6 {
            for c in 0..4 {
                let left = labels.get(r, c).unwrap();
                for rr in 0..6 {
                    for cc in 4..8 {
                        assert_ne!(left, labels.get(rr, cc).unwrap());
                    }
                }
            }
        }
    }

    #[test]
    fn test_zero_max_dist_gives_one_segment_per_pixel() {
        let image = image_from(vec![Array2::from_shape_fn((3, 3), |(r, c)| (r * 3 + c) as f64)]);
        let params = QuickshiftParams {
            max_dist: 0.0,
            ..Default::default()
        };
        let labels = quickshift(&image, &params).unwrap();
        assert_eq!(segment_count(&labels), 9);
        let expected: Vec<u32> = (0..9).collect();
        assert_eq!(labels.data().iter().copied().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn test_deterministic() {
        let band = Array2::from_shape_fn((7, 9), |(r, c)| ((r * 31 + c * 17) % 11) as f64 / 10.0);
        let image = image_from(vec![band.clone(), band.mapv(|v| 1.0 - v)]);
        let a = quickshift(&image, &QuickshiftParams::default()).unwrap();
        let b = quickshift(&image, &QuickshiftParams::default()).unwrap();
        assert_eq!(a.data(), b.data());
    }

    #[test]
    fn test_labels_are_contiguous() {
        let band = Array2::from_shape_fn((10, 10), |(r, c)| if (r / 5 + c / 5) % 2 == 0 { 0.0 } else { 1.0 });
        let image = image_from(vec![band]);
        let params = QuickshiftParams {
            ratio: 20.0,
            ..Default::default()
        };
        let labels = quickshift(&image, &params).unwrap();
        let count = segment_count(&labels);
        let mut seen = vec![false; count];
        for &l in labels.data() {
            seen[l as usize] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_invalid_params() {
        let image = image_from(vec![Array2::zeros((2, 2))]);
        let params = QuickshiftParams {
            kernel_size: 0.0,
            ..Default::default()
        };
        let err = quickshift(&image, &params).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
