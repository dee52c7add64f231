//! K-means clustering of feature vectors
//!
//! Partitions samples (one row per sample) into k clusters by Euclidean
//! distance. Initialization is deterministic, so the same samples always
//! produce the same labels.

use crate::maybe_rayon::*;
use canopygap_core::{Error, Result};
use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Parameters for K-means clustering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KmeansParams {
    /// Number of clusters
    pub k: usize,
    /// Maximum iterations (default: 100)
    pub max_iterations: usize,
    /// Stop when no centroid moves further than this (default: 0.001)
    pub convergence: f64,
}

impl Default for KmeansParams {
    fn default() -> Self {
        Self {
            k: 2,
            max_iterations: 100,
            convergence: 0.001,
        }
    }
}

impl KmeansParams {
    pub fn validate(&self) -> Result<()> {
        if self.k < 2 {
            return Err(Error::InvalidParameter {
                name: "k",
                value: self.k.to_string(),
                reason: "k-means requires at least 2 clusters".to_string(),
            });
        }
        if self.max_iterations == 0 {
            return Err(Error::InvalidParameter {
                name: "max_iterations",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Cluster assignment and final centroids
#[derive(Debug, Clone)]
pub struct KmeansResult {
    /// Cluster index per sample, in 0..k
    pub labels: Vec<usize>,
    /// k x dims centroid matrix
    pub centroids: Array2<f64>,
    /// Iterations run before convergence or the iteration cap
    pub iterations: usize,
}

impl KmeansResult {
    /// Number of samples assigned to each cluster
    pub fn counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.centroids.nrows()];
        for &l in &self.labels {
            counts[l] += 1;
        }
        counts
    }
}

/// Distinct rows ordered by column `key`, then by the remaining columns.
/// Samples must be finite.
fn distinct_rows(samples: ArrayView2<'_, f64>, key: usize) -> Vec<Vec<f64>> {
    let mut rows: Vec<Vec<f64>> = samples.outer_iter().map(|r| r.to_vec()).collect();
    rows.sort_by(|a, b| {
        a[key]
            .total_cmp(&b[key])
            .then_with(|| a.iter().zip(b.iter()).fold(Ordering::Equal, |o, (x, y)| o.then(x.total_cmp(y))))
    });
    rows.dedup();
    rows
}

/// K-means over `samples` (n x dims).
///
/// Initial centroids are the distinct samples at evenly spaced ranks of
/// column `key`, from the smallest to the largest. Fails with insufficient data
/// when there are fewer distinct samples than clusters. Empty clusters keep
/// their previous centroid.
pub fn kmeans(samples: ArrayView2<'_, f64>, key: usize, params: &KmeansParams) -> Result<KmeansResult> {
    params.validate()?;

    let (n, dims) = samples.dim();
    if key >= dims {
        return Err(Error::Input(format!(
            "key column {} out of range for {} feature(s)",
            key, dims
        )));
    }
    if samples.iter().any(|v| !v.is_finite()) {
        return Err(Error::Input("k-means samples must be finite".into()));
    }
    let distinct = distinct_rows(samples, key);
    if distinct.len() < params.k {
        return Err(Error::InsufficientData(format!(
            "{} distinct sample(s) of {} for {} clusters",
            distinct.len(),
            n,
            params.k
        )));
    }

    let k = params.k;
    let mut centroids = initialize_centroids(&distinct, k, dims);
    let mut labels = vec![0usize; n];
    let mut iterations = 0;

    for _ in 0..params.max_iterations {
        iterations += 1;

        // Assignment step: nearest centroid, ties to the lower index
        labels.par_iter_mut().enumerate().for_each(|(i, label)| {
            let row = samples.row(i);
            let mut best_dist = f64::INFINITY;
            let mut best_k = 0;
            for (c, centroid) in centroids.axis_iter(Axis(0)).enumerate() {
                let dist: f64 = row
                    .iter()
                    .zip(centroid.iter())
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum();
                if dist < best_dist {
                    best_dist = dist;
                    best_k = c;
                }
            }
            *label = best_k;
        });

        // Update step
        let mut sums = Array2::<f64>::zeros((k, dims));
        let mut counts = vec![0usize; k];
        for (i, &label) in labels.iter().enumerate() {
            let mut target = sums.row_mut(label);
            target += &samples.row(i);
            counts[label] += 1;
        }

        let mut max_shift = 0.0_f64;
        for c in 0..k {
            if counts[c] == 0 {
                continue;
            }
            let mut mean = sums.row_mut(c);
            mean /= counts[c] as f64;
            let shift: f64 = mean
                .iter()
                .zip(centroids.row(c).iter())
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f64>()
                .sqrt();
            max_shift = max_shift.max(shift);
            centroids.row_mut(c).assign(&mean);
        }

        if max_shift < params.convergence {
            break;
        }
    }

    Ok(KmeansResult {
        labels,
        centroids,
        iterations,
    })
}

/// Distinct samples at evenly spaced ranks of the key column, extremes included
fn initialize_centroids(distinct: &[Vec<f64>], k: usize, dims: usize) -> Array2<f64> {
    let m = distinct.len();
    let mut centroids = Array2::zeros((k, dims));
    for i in 0..k {
        let row = &distinct[i * (m - 1) / (k - 1)];
        for (d, &v) in row.iter().enumerate() {
            centroids[[i, d]] = v;
        }
    }
    centroids
}

/// Per-cluster mean of column `key` over member samples; `None` for empty
/// clusters.
pub fn cluster_means(samples: ArrayView2<'_, f64>, labels: &[usize], k: usize, key: usize) -> Vec<Option<f64>> {
    let mut sums = vec![0.0; k];
    let mut counts = vec![0usize; k];
    for (i, &label) in labels.iter().enumerate() {
        sums[label] += samples[[i, key]];
        counts[label] += 1;
    }
    sums.iter()
        .zip(counts.iter())
        .map(|(&s, &c)| (c > 0).then(|| s / c as f64))
        .collect()
}

/// Index of the cluster with the largest mean; ties go to the lowest index
/// and empty clusters are skipped.
pub fn highest_mean_cluster(means: &[Option<f64>]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, mean) in means.iter().enumerate() {
        if let Some(m) = *mean {
            match best {
                Some((_, b)) if m <= b => {}
                _ => best = Some((i, m)),
            }
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopygap_core::ErrorKind;
    use ndarray::array;

    #[test]
    fn test_kmeans_two_groups() {
        let samples = array![[0.1], [0.12], [0.08], [0.7], [0.75], [0.72]];
        let result = kmeans(samples.view(), 0, &KmeansParams::default()).unwrap();

        assert_eq!(result.labels[0], result.labels[1]);
        assert_eq!(result.labels[0], result.labels[2]);
        assert_eq!(result.labels[3], result.labels[4]);
        assert_ne!(result.labels[0], result.labels[3]);
        assert_eq!(result.counts(), vec![3, 3]);
    }

    #[test]
    fn test_kmeans_multidimensional() {
        let samples = array![
            [10.0, 10.0, 10.0, 80.0],
            [12.0, 11.0, 9.0, 85.0],
            [60.0, 55.0, 50.0, 20.0],
            [62.0, 58.0, 49.0, 22.0],
        ];
        let result = kmeans(samples.view(), 3, &KmeansParams::default()).unwrap();
        assert_eq!(result.labels[0], result.labels[1]);
        assert_eq!(result.labels[2], result.labels[3]);
        assert_ne!(result.labels[0], result.labels[2]);
    }

    #[test]
    fn test_kmeans_deterministic() {
        let samples = array![[0.3], [0.1], [0.9], [0.5], [0.2], [0.8], [0.85]];
        let a = kmeans(samples.view(), 0, &KmeansParams::default()).unwrap();
        let b = kmeans(samples.view(), 0, &KmeansParams::default()).unwrap();
        assert_eq!(a.labels, b.labels);
    }

    #[test]
    fn test_kmeans_too_few_samples() {
        let samples = array![[0.5]];
        let err = kmeans(samples.view(), 0, &KmeansParams::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientData);
    }

    #[test]
    fn test_kmeans_k_one() {
        let samples = array![[0.5], [0.6]];
        let params = KmeansParams {
            k: 1,
            ..Default::default()
        };
        let err = kmeans(samples.view(), 0, &params).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_identical_samples_are_insufficient() {
        let samples = array![[0.4], [0.4], [0.4]];
        let err = kmeans(samples.view(), 0, &KmeansParams::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientData);
    }

    #[test]
    fn test_distinct_rows_counts_whole_rows() {
        // Same key value, different second feature
        let samples = array![[0.4, 1.0], [0.4, 2.0], [0.4, 1.0]];
        assert_eq!(distinct_rows(samples.view(), 0), vec![vec![0.4, 1.0], vec![0.4, 2.0]]);
        let params = KmeansParams {
            k: 3,
            ..Default::default()
        };
        let err = kmeans(samples.view(), 0, &params).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientData);
        let result = kmeans(samples.view(), 0, &KmeansParams::default()).unwrap();
        assert_eq!(result.labels[0], result.labels[2]);
        assert_ne!(result.labels[0], result.labels[1]);
    }

    #[test]
    fn test_highest_mean_cluster_ties() {
        assert_eq!(highest_mean_cluster(&[Some(0.2), Some(0.8)]), Some(1));
        assert_eq!(highest_mean_cluster(&[Some(0.5), Some(0.5)]), Some(0));
        assert_eq!(highest_mean_cluster(&[None, Some(-0.1)]), Some(1));
        assert_eq!(highest_mean_cluster(&[None, None]), None);
    }
}
