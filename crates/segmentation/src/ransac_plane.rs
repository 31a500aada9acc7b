use rand::prelude::*;
use rand::rngs::StdRng;
use rayon::prelude::*;

/// Points drawn per RANSAC hypothesis.
pub const SAMPLE_SIZE: usize = 3;

/// A 3D plane model in the form `n . x + d = 0`, where `n` is a unit normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneModel {
    pub normal: [f64; 3],
    pub d: f64,
}

impl PlaneModel {
    /// Builds a plane from `a·x + b·y + c·z + d = 0`, scaling so the normal
    /// has unit length. `None` when `(a, b, c)` is zero or not finite.
    pub fn from_coefficients(a: f64, b: f64, c: f64, d: f64) -> Option<Self> {
        let len = (a * a + b * b + c * c).sqrt();
        if !len.is_finite() || len < 1e-12 || !d.is_finite() {
            return None;
        }
        Some(Self {
            normal: [a / len, b / len, c / len],
            d: d / len,
        })
    }

    /// `[a, b, c, d]` with `(a, b, c)` of unit length.
    pub fn coefficients(&self) -> [f64; 4] {
        [self.normal[0], self.normal[1], self.normal[2], self.d]
    }

    /// Computes the absolute distance from a point to this plane.
    /// Assumes `normal` is a unit vector.
    #[inline]
    pub fn distance_to_point(&self, point: &[f64; 3]) -> f64 {
        (self.normal[0] * point[0] + self.normal[1] * point[1] + self.normal[2] * point[2] + self.d)
            .abs()
    }
}

impl Default for PlaneModel {
    fn default() -> Self {
        Self {
            normal: [0.0, 0.0, 1.0],
            d: 0.0,
        }
    }
}

/// RANSAC plane segmentation over a contiguous slice of positions.
///
/// Returns the best-supported plane and the ascending indices of every point
/// within `distance_threshold` of it, or `None` when there are fewer than
/// three points or every sampled triple was degenerate.
///
/// # Algorithm
///
/// 1. Pre-generate all random samples upfront for determinism.
/// 2. Large inputs score hypotheses in parallel with rayon; the merge keeps
///    the earliest sample on ties.
/// 3. Small inputs run sequentially with adaptive early termination once the
///    inlier ratio makes a better hypothesis unlikely.
pub fn segment_plane(
    points: &[[f64; 3]],
    distance_threshold: f64,
    iterations: usize,
    seed: u64,
) -> Option<(PlaneModel, Vec<usize>)> {
    let n = points.len();

    if n < SAMPLE_SIZE {
        return None;
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let samples: Vec<(usize, usize, usize)> = (0..iterations)
        .filter_map(|_| sample_three_distinct(n, &mut rng))
        .collect();

    let use_parallel = n >= 10_000 && samples.len() >= 16;

    let best_model = if use_parallel {
        samples
            .par_iter()
            .filter_map(|&(i0, i1, i2)| {
                let model = fit_plane_from_three_points(&points[i0], &points[i1], &points[i2])?;
                let count = count_inliers(points, &model, distance_threshold);
                Some((model, count))
            })
            .reduce_with(|a, b| if a.1 >= b.1 { a } else { b })
            .map(|(model, _)| model)
    } else {
        let mut best: Option<(PlaneModel, usize)> = None;

        for (iter, &(i0, i1, i2)) in samples.iter().enumerate() {
            let Some(model) = fit_plane_from_three_points(&points[i0], &points[i1], &points[i2])
            else {
                continue;
            };

            let inlier_count = count_inliers(points, &model, distance_threshold);

            if best.map_or(true, |(_, count)| inlier_count > count) {
                best = Some((model, inlier_count));

                // Adaptive early termination
                let w = inlier_count as f64 / n as f64;
                if w > 0.5 {
                    let needed = (1.0 - 0.999f64).ln() / (1.0 - w.powi(3)).ln();
                    if (iter as f64) > needed {
                        break;
                    }
                }
            }
        }

        best.map(|(model, _)| model)
    };
    let best_model = best_model?;

    let inliers: Vec<usize> = (0..n)
        .filter(|&j| best_model.distance_to_point(&points[j]) <= distance_threshold)
        .collect();

    Some((best_model, inliers))
}

#[inline]
fn count_inliers(points: &[[f64; 3]], model: &PlaneModel, threshold: f64) -> usize {
    points
        .iter()
        .filter(|p| model.distance_to_point(p) <= threshold)
        .count()
}

/// Samples 3 distinct indices in [0, n).
fn sample_three_distinct(n: usize, rng: &mut StdRng) -> Option<(usize, usize, usize)> {
    if n < SAMPLE_SIZE {
        return None;
    }
    let picked = rand::seq::index::sample(rng, n, SAMPLE_SIZE);
    Some((picked.index(0), picked.index(1), picked.index(2)))
}

/// Fits a plane through 3 points, returning `None` if they are collinear.
fn fit_plane_from_three_points(p0: &[f64; 3], p1: &[f64; 3], p2: &[f64; 3]) -> Option<PlaneModel> {
    let v1 = [p1[0] - p0[0], p1[1] - p0[1], p1[2] - p0[2]];
    let v2 = [p2[0] - p0[0], p2[1] - p0[1], p2[2] - p0[2]];

    let nx = v1[1] * v2[2] - v1[2] * v2[1];
    let ny = v1[2] * v2[0] - v1[0] * v2[2];
    let nz = v1[0] * v2[1] - v1[1] * v2[0];

    let d = -(nx * p0[0] + ny * p0[1] + nz * p0[2]);
    PlaneModel::from_coefficients(nx, ny, nz, d)
}
