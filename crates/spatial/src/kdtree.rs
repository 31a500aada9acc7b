use groundcloud_core::PointCloud;
use kiddo::float::distance::SquaredEuclidean;
use kiddo::immutable::float::kdtree::ImmutableKdTree;
use std::num::NonZero;

/// A KdTree for neighbour queries on 3D point clouds.
///
/// Built on kiddo's `ImmutableKdTree`, which is balanced once at
/// construction and cannot be modified afterwards. Items are `u32` indices
/// into the positions the tree was built from.
#[derive(Debug, Clone)]
pub struct KdTree {
    tree: ImmutableKdTree<f64, u32, 3, 32>,
    num_points: usize,
}

impl KdTree {
    /// Build a KdTree from a PointCloud.
    pub fn build(cloud: &PointCloud) -> Self {
        Self::from_points(&cloud.positions())
    }

    /// Build a KdTree over a contiguous slice of positions.
    pub fn from_points(points: &[[f64; 3]]) -> Self {
        Self {
            tree: ImmutableKdTree::new_from_slice(points),
            num_points: points.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.num_points
    }

    pub fn is_empty(&self) -> bool {
        self.num_points == 0
    }

    /// Find the `k` nearest neighbours to `query`.
    ///
    /// Returns `(indices, distances)` where distances are **Euclidean**
    /// (not squared), sorted in ascending order by distance.
    ///
    /// Edge cases:
    /// - Returns empty if `k == 0`, the tree is empty, or query contains NaN.
    /// - If `k > len()`, returns all points.
    pub fn knn(&self, query: &[f64; 3], k: usize) -> (Vec<usize>, Vec<f64>) {
        let Some(nz_k) = self.checked_k(query, k) else {
            return (Vec::new(), Vec::new());
        };

        let results = self.tree.nearest_n::<SquaredEuclidean>(query, nz_k);

        let mut indices = Vec::with_capacity(results.len());
        let mut distances = Vec::with_capacity(results.len());
        for nn in results {
            indices.push(nn.item as usize);
            distances.push(nn.distance.sqrt());
        }

        (indices, distances)
    }

    /// Find the `k` nearest neighbours to `query`, returning only indices.
    pub fn knn_indices(&self, query: &[f64; 3], k: usize) -> Vec<usize> {
        let Some(nz_k) = self.checked_k(query, k) else {
            return Vec::new();
        };

        self.tree
            .nearest_n::<SquaredEuclidean>(query, nz_k)
            .iter()
            .map(|nn| nn.item as usize)
            .collect()
    }

    /// Find all points within `radius` (Euclidean distance) of `query`.
    ///
    /// Returns indices of points where `euclidean_dist <= radius`, sorted by
    /// index.
    ///
    /// Edge cases:
    /// - Returns empty if radius <= 0, the tree is empty, radius is
    ///   non-finite, or query contains NaN.
    pub fn radius_search(&self, query: &[f64; 3], radius: f64) -> Vec<usize> {
        if self.is_empty()
            || radius <= 0.0
            || !radius.is_finite()
            || !query.iter().all(|v| v.is_finite())
        {
            return Vec::new();
        }

        let radius_sq = radius * radius;

        // kiddo's `within_unsorted` uses strict `<`, so widen the query a
        // hair and post-filter with `<=` to keep boundary points.
        let query_radius_sq = radius_sq + f64::EPSILON * radius_sq.max(1.0);

        let mut indices: Vec<usize> = self
            .tree
            .within_unsorted::<SquaredEuclidean>(query, query_radius_sq)
            .into_iter()
            .filter(|nn| nn.distance <= radius_sq)
            .map(|nn| nn.item as usize)
            .collect();

        indices.sort_unstable();

        indices
    }

    /// Up to `max_nn` nearest neighbours that also lie within `radius`.
    ///
    /// Sorted by ascending distance. This is the usual "hybrid" search used
    /// for normal estimation on clouds of uneven density.
    pub fn hybrid_search(&self, query: &[f64; 3], radius: f64, max_nn: usize) -> Vec<usize> {
        if radius <= 0.0 || !radius.is_finite() {
            return Vec::new();
        }

        let (indices, distances) = self.knn(query, max_nn);
        indices
            .into_iter()
            .zip(distances)
            .take_while(|&(_, d)| d <= radius)
            .map(|(i, _)| i)
            .collect()
    }

    fn checked_k(&self, query: &[f64; 3], k: usize) -> Option<NonZero<usize>> {
        if self.is_empty() || !query.iter().all(|v| v.is_finite()) {
            return None;
        }
        NonZero::new(k)
    }
}

#[cfg(test)]
mod tests {
    use super::KdTree;
    use groundcloud_core::PointCloud;
    use proptest::prelude::*;

    fn line_cloud(xs: &[f64]) -> PointCloud {
        let n = xs.len();
        PointCloud::from_xyz(xs.to_vec(), vec![0.0; n], vec![0.0; n])
    }

    #[test]
    fn knn_returns_expected_neighbors() {
        let tree = KdTree::build(&line_cloud(&[0.0, 1.0, 2.0, 10.0]));
        let (idx, dist) = tree.knn(&[0.2, 0.0, 0.0], 2);
        assert_eq!(idx, vec![0, 1]);
        assert!(dist[0] <= dist[1]);
    }

    #[test]
    fn radius_search_finds_points() {
        let tree = KdTree::build(&line_cloud(&[0.0, 0.5, 2.0]));
        let idx = tree.radius_search(&[0.0, 0.0, 0.0], 0.75);
        assert_eq!(idx, vec![0, 1]);
    }

    #[test]
    fn knn_empty_cloud() {
        let tree = KdTree::build(&PointCloud::new());
        let (idx, dist) = tree.knn(&[0.0, 0.0, 0.0], 5);
        assert!(idx.is_empty());
        assert!(dist.is_empty());
    }

    #[test]
    fn knn_k_zero() {
        let tree = KdTree::build(&PointCloud::from_xyz(vec![1.0], vec![2.0], vec![3.0]));
        let (idx, _) = tree.knn(&[0.0, 0.0, 0.0], 0);
        assert!(idx.is_empty());
    }

    #[test]
    fn knn_nan_query() {
        let tree = KdTree::build(&PointCloud::from_xyz(vec![1.0], vec![2.0], vec![3.0]));
        let (idx, _) = tree.knn(&[f64::NAN, 0.0, 0.0], 1);
        assert!(idx.is_empty());
        assert!(tree.knn_indices(&[f64::NAN, 0.0, 0.0], 1).is_empty());
    }

    #[test]
    fn radius_search_negative_radius() {
        let tree = KdTree::build(&line_cloud(&[0.0]));
        assert!(tree.radius_search(&[0.0, 0.0, 0.0], -1.0).is_empty());
    }

    #[test]
    fn knn_k_larger_than_cloud() {
        let tree = KdTree::build(&line_cloud(&[0.0, 1.0, 2.0]));
        let (idx, _) = tree.knn(&[0.0, 0.0, 0.0], 100);
        assert_eq!(idx.len(), 3);
    }

    #[test]
    fn radius_search_exact_boundary() {
        let tree = KdTree::build(&line_cloud(&[1.0, 5.0]));
        let idx = tree.radius_search(&[0.0, 0.0, 0.0], 1.0);
        assert!(idx.contains(&0), "boundary point missing: {:?}", idx);
        assert!(!idx.contains(&1));
    }

    #[test]
    fn hybrid_search_caps_by_count_and_radius() {
        let tree = KdTree::build(&line_cloud(&[0.0, 0.1, 0.2, 0.3, 5.0]));

        // radius admits four points, max_nn caps at two
        let idx = tree.hybrid_search(&[0.0, 0.0, 0.0], 1.0, 2);
        assert_eq!(idx, vec![0, 1]);

        // max_nn admits everything, radius drops the far point
        let idx = tree.hybrid_search(&[0.0, 0.0, 0.0], 1.0, 10);
        assert_eq!(idx, vec![0, 1, 2, 3]);
    }

    #[test]
    fn hybrid_search_rejects_bad_radius() {
        let tree = KdTree::build(&line_cloud(&[0.0, 1.0]));
        assert!(tree.hybrid_search(&[0.0, 0.0, 0.0], 0.0, 5).is_empty());
        assert!(tree.hybrid_search(&[0.0, 0.0, 0.0], f64::NAN, 5).is_empty());
    }

    proptest! {
        #[test]
        fn knn_returns_at_most_k_results(
            pts in prop::collection::vec(
                (-100.0f64..100.0, -100.0f64..100.0, -100.0f64..100.0),
                1..200
            ),
            k in 1usize..50,
        ) {
            let points: Vec<[f64; 3]> = pts.iter().map(|p| [p.0, p.1, p.2]).collect();
            let tree = KdTree::from_points(&points);
            let (idx, dist) = tree.knn(&[0.0, 0.0, 0.0], k);
            prop_assert!(idx.len() <= k);
            prop_assert!(idx.len() <= pts.len());
            prop_assert_eq!(idx.len(), dist.len());
        }

        #[test]
        fn hybrid_results_are_within_radius(
            pts in prop::collection::vec(
                (-10.0f64..10.0, -10.0f64..10.0, -10.0f64..10.0),
                1..200
            ),
            radius in 0.1f64..10.0,
            max_nn in 1usize..40,
        ) {
            let points: Vec<[f64; 3]> = pts.iter().map(|p| [p.0, p.1, p.2]).collect();
            let tree = KdTree::from_points(&points);
            let idx = tree.hybrid_search(&[0.0, 0.0, 0.0], radius, max_nn);
            prop_assert!(idx.len() <= max_nn);
            for &i in &idx {
                let p = points[i];
                let dist = (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt();
                prop_assert!(dist <= radius + 1e-9);
            }
        }
    }
}
