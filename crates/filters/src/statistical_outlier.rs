use groundcloud_core::PointCloud;
use groundcloud_spatial::KdTree;
use rayon::prelude::*;

/// Removes points whose mean distance to their `k` nearest neighbours is
/// more than `std_ratio` standard deviations above the cloud-wide mean.
pub fn statistical_outlier_removal(cloud: &PointCloud, k: usize, std_ratio: f64) -> PointCloud {
    let keep = statistical_outlier_indices(cloud, k, std_ratio);
    cloud.select(&keep)
}

/// Index form of [`statistical_outlier_removal`]: the ascending indices of
/// the points that survive. Lets callers filter a parallel record table.
pub fn statistical_outlier_indices(cloud: &PointCloud, k: usize, std_ratio: f64) -> Vec<usize> {
    if cloud.is_empty() || k == 0 {
        return Vec::new();
    }

    // Single point: no neighbors to compare against, keep it
    if cloud.len() == 1 {
        return vec![0];
    }

    let points = cloud.positions();
    let tree = KdTree::from_points(&points);

    // knn returns the query point itself first (distance 0), so ask for k+1
    // and skip it.
    let mean_dists: Vec<f64> = points
        .par_iter()
        .map(|q| {
            if !q.iter().all(|v| v.is_finite()) {
                return f64::INFINITY;
            }
            let (_, dists) = tree.knn(q, k + 1);
            let neighbor_dists = if dists.len() > 1 {
                &dists[1..]
            } else {
                &dists[..]
            };
            if neighbor_dists.is_empty() {
                return f64::INFINITY;
            }
            neighbor_dists.iter().sum::<f64>() / neighbor_dists.len() as f64
        })
        .collect();

    let finite_dists: Vec<f64> = mean_dists
        .iter()
        .copied()
        .filter(|d| d.is_finite())
        .collect();

    if finite_dists.is_empty() {
        return Vec::new();
    }

    let n = finite_dists.len() as f64;
    let global_mean = finite_dists.iter().sum::<f64>() / n;
    let variance = finite_dists
        .iter()
        .map(|d| (d - global_mean).powi(2))
        .sum::<f64>()
        / n;
    let threshold = global_mean + std_ratio * variance.sqrt();

    (0..cloud.len())
        .filter(|&i| mean_dists[i] <= threshold)
        .collect()
}
