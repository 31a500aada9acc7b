use groundcloud_core::{Normals, PointCloud};
use groundcloud_spatial::KdTree;
use rayon::prelude::*;

/// How the neighbourhood of each point is gathered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NeighborSearch {
    /// The `k` nearest neighbours.
    Knn(usize),
    /// Up to `max_nn` nearest neighbours inside `radius`.
    Hybrid { radius: f64, max_nn: usize },
}

/// Fewer neighbours than this leave the covariance rank-deficient.
const MIN_NEIGHBORS: usize = 3;

/// Estimate surface normals for each point in the cloud using PCA.
///
/// For each point, the k nearest neighbors are found, a covariance matrix is
/// built from the neighbor positions, and the eigenvector corresponding to the
/// smallest eigenvalue is taken as the surface normal. Normals are oriented to
/// face toward the origin.
pub fn estimate_normals(cloud: &PointCloud, k: usize) -> Normals {
    estimate_normals_with_viewpoint(cloud, k, [0.0, 0.0, 0.0])
}

/// Same as [`estimate_normals`] but orients normals toward the given viewpoint
/// instead of the origin.
pub fn estimate_normals_with_viewpoint(cloud: &PointCloud, k: usize, viewpoint: [f64; 3]) -> Normals {
    estimate_normals_with(cloud, NeighborSearch::Knn(k), viewpoint)
}

/// General form: neighbourhood strategy and viewpoint both explicit.
///
/// Points whose neighbourhood has fewer than three members get `(0, 0, 1)`.
/// An empty cloud, `k == 0` or `max_nn == 0` yields empty normals.
///
/// The computation is parallelized across points using rayon.
pub fn estimate_normals_with(
    cloud: &PointCloud,
    search: NeighborSearch,
    viewpoint: [f64; 3],
) -> Normals {
    let degenerate = match search {
        NeighborSearch::Knn(k) => k == 0,
        NeighborSearch::Hybrid { max_nn, .. } => max_nn == 0,
    };
    if cloud.is_empty() || degenerate {
        return Normals {
            nx: vec![],
            ny: vec![],
            nz: vec![],
        };
    }

    let points = cloud.positions();
    let tree = KdTree::from_points(&points);
    let n = points.len();

    let normals_vec: Vec<[f64; 3]> = points
        .par_iter()
        .map(|point| {
            let indices = match search {
                NeighborSearch::Knn(k) => tree.knn_indices(point, k),
                NeighborSearch::Hybrid { radius, max_nn } => {
                    tree.hybrid_search(point, radius, max_nn)
                }
            };

            if indices.len() < MIN_NEIGHBORS {
                return [0.0, 0.0, 1.0];
            }

            let count = indices.len() as f64;
            let mut c = [0.0f64; 3];
            for &idx in &indices {
                c[0] += points[idx][0];
                c[1] += points[idx][1];
                c[2] += points[idx][2];
            }
            c[0] /= count;
            c[1] /= count;
            c[2] /= count;

            // Upper triangle of the symmetric covariance matrix
            let mut c00 = 0.0;
            let mut c01 = 0.0;
            let mut c02 = 0.0;
            let mut c11 = 0.0;
            let mut c12 = 0.0;
            let mut c22 = 0.0;
            for &idx in &indices {
                let dx = points[idx][0] - c[0];
                let dy = points[idx][1] - c[1];
                let dz = points[idx][2] - c[2];
                c00 += dx * dx;
                c01 += dx * dy;
                c02 += dx * dz;
                c11 += dy * dy;
                c12 += dy * dz;
                c22 += dz * dz;
            }

            let [mut nnx, mut nny, mut nnz] = smallest_eigenvector_3x3(c00, c01, c02, c11, c12, c22);

            let len = (nnx * nnx + nny * nny + nnz * nnz).sqrt();
            if len > 1e-12 {
                nnx /= len;
                nny /= len;
                nnz /= len;
            }

            let vx = viewpoint[0] - point[0];
            let vy = viewpoint[1] - point[1];
            let vz = viewpoint[2] - point[2];
            if nnx * vx + nny * vy + nnz * vz < 0.0 {
                nnx = -nnx;
                nny = -nny;
                nnz = -nnz;
            }

            [nnx, nny, nnz]
        })
        .collect();

    let mut nx = Vec::with_capacity(n);
    let mut ny = Vec::with_capacity(n);
    let mut nz = Vec::with_capacity(n);
    for normal in &normals_vec {
        nx.push(normal[0]);
        ny.push(normal[1]);
        nz.push(normal[2]);
    }

    Normals { nx, ny, nz }
}

/// Eigenvector of the smallest eigenvalue of a 3x3 symmetric matrix.
///
/// Eigenvalues come from the trigonometric (Cardano) solution; the
/// eigenvector is the cross product of two rows of `A - λI`, which has rank
/// at most two. The matrix is:
///
/// ```text
/// | a00  a01  a02 |
/// | a01  a11  a12 |
/// | a02  a12  a22 |
/// ```
#[inline]
fn smallest_eigenvector_3x3(a00: f64, a01: f64, a02: f64, a11: f64, a12: f64, a22: f64) -> [f64; 3] {
    let m = (a00 + a11 + a22) / 3.0;

    let b00 = a00 - m;
    let b11 = a11 - m;
    let b22 = a22 - m;

    // q = det(A - mI) / 2
    let q = (b00 * (b11 * b22 - a12 * a12) - a01 * (a01 * b22 - a12 * a02)
        + a02 * (a01 * a12 - b11 * a02))
        / 2.0;

    let p = (b00 * b00 + b11 * b11 + b22 * b22 + 2.0 * (a01 * a01 + a02 * a02 + a12 * a12)) / 6.0;
    let p = p.max(0.0);

    if p < 1e-30 {
        // Scalar multiple of identity: every direction is an eigenvector
        return [0.0, 0.0, 1.0];
    }

    let det_ratio = (q / (p * p.sqrt())).clamp(-1.0, 1.0);
    let phi = det_ratio.acos() / 3.0;

    let sqrt_p = p.sqrt();
    let lambda = m + 2.0 * sqrt_p * (phi + 2.0 * std::f64::consts::FRAC_PI_3).cos();

    let r00 = a00 - lambda;
    let r11 = a11 - lambda;
    let r22 = a22 - lambda;

    let candidates = [
        // rows 0 x 1
        [a01 * a12 - r11 * a02, a02 * a01 - a12 * r00, r00 * r11 - a01 * a01],
        // rows 0 x 2
        [a01 * r22 - a12 * a02, a02 * a02 - r22 * r00, r00 * a12 - a01 * a02],
        // rows 1 x 2
        [r11 * r22 - a12 * a12, a12 * a02 - r22 * a01, a01 * a12 - r11 * a02],
    ];

    candidates
        .iter()
        .map(|e| (e, e[0] * e[0] + e[1] * e[1] + e[2] * e[2]))
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .filter(|(_, len2)| *len2 >= 1e-30)
        .map(|(e, len2)| {
            let inv = 1.0 / len2.sqrt();
            [e[0] * inv, e[1] * inv, e[2] * inv]
        })
        .unwrap_or([0.0, 0.0, 1.0])
}
