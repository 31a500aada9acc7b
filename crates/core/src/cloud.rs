use crate::Aabb;

/// Structure-of-arrays point cloud with optional per-point normals and colors.
///
/// Coordinates are `f64`: LiDAR tiles routinely carry projected coordinates
/// in the hundreds of thousands, and records are written back with six
/// decimal places.
#[derive(Debug, Clone, PartialEq)]
pub struct PointCloud {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
    pub normals: Option<Normals>,
    pub colors: Option<Colors>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Normals {
    pub nx: Vec<f64>,
    pub ny: Vec<f64>,
    pub nz: Vec<f64>,
}

impl Normals {
    pub fn len(&self) -> usize {
        self.nx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nx.is_empty()
    }

    pub fn normal(&self, i: usize) -> [f64; 3] {
        [self.nx[i], self.ny[i], self.nz[i]]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Colors {
    pub r: Vec<u8>,
    pub g: Vec<u8>,
    pub b: Vec<u8>,
}

impl Colors {
    pub fn color(&self, i: usize) -> [u8; 3] {
        [self.r[i], self.g[i], self.b[i]]
    }
}

impl PointCloud {
    pub fn new() -> Self {
        Self {
            x: Vec::new(),
            y: Vec::new(),
            z: Vec::new(),
            normals: None,
            colors: None,
        }
    }

    pub fn from_xyz(x: Vec<f64>, y: Vec<f64>, z: Vec<f64>) -> Self {
        assert_eq!(x.len(), y.len(), "x and y must have same length");
        assert_eq!(x.len(), z.len(), "x and z must have same length");

        Self {
            x,
            y,
            z,
            normals: None,
            colors: None,
        }
    }

    pub fn from_points(points: &[[f64; 3]]) -> Self {
        let mut x = Vec::with_capacity(points.len());
        let mut y = Vec::with_capacity(points.len());
        let mut z = Vec::with_capacity(points.len());

        for p in points {
            x.push(p[0]);
            y.push(p[1]);
            z.push(p[2]);
        }

        Self::from_xyz(x, y, z)
    }

    pub fn len(&self) -> usize {
        debug_assert_eq!(self.x.len(), self.y.len());
        debug_assert_eq!(self.x.len(), self.z.len());
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn has_colors(&self) -> bool {
        self.colors.is_some()
    }

    pub fn has_normals(&self) -> bool {
        self.normals.is_some()
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::from_points(self.iter_points())
    }

    pub fn point(&self, i: usize) -> [f64; 3] {
        [self.x[i], self.y[i], self.z[i]]
    }

    pub fn iter_points(&self) -> impl Iterator<Item = [f64; 3]> + '_ {
        self.x
            .iter()
            .zip(&self.y)
            .zip(&self.z)
            .map(|((x, y), z)| [*x, *y, *z])
    }

    /// Contiguous copy of the positions, for cache-friendly inner loops.
    pub fn positions(&self) -> Vec<[f64; 3]> {
        self.iter_points().collect()
    }

    pub fn select(&self, indices: &[usize]) -> Self {
        let mut x = Vec::with_capacity(indices.len());
        let mut y = Vec::with_capacity(indices.len());
        let mut z = Vec::with_capacity(indices.len());

        for &idx in indices {
            assert!(idx < self.len(), "index out of bounds in select");
            x.push(self.x[idx]);
            y.push(self.y[idx]);
            z.push(self.z[idx]);
        }

        let normals = self.normals.as_ref().map(|n| Normals {
            nx: indices.iter().map(|&idx| n.nx[idx]).collect(),
            ny: indices.iter().map(|&idx| n.ny[idx]).collect(),
            nz: indices.iter().map(|&idx| n.nz[idx]).collect(),
        });

        let colors = self.colors.as_ref().map(|c| Colors {
            r: indices.iter().map(|&idx| c.r[idx]).collect(),
            g: indices.iter().map(|&idx| c.g[idx]).collect(),
            b: indices.iter().map(|&idx| c.b[idx]).collect(),
        });

        Self {
            x,
            y,
            z,
            normals,
            colors,
        }
    }

    /// Appends every point of `other`.
    ///
    /// Optional attributes survive only when both clouds carry them.
    pub fn append(&mut self, other: &PointCloud) {
        let was_empty = self.is_empty();

        self.normals = match (self.normals.take(), other.normals.as_ref()) {
            (Some(mut a), Some(b)) => {
                a.nx.extend_from_slice(&b.nx);
                a.ny.extend_from_slice(&b.ny);
                a.nz.extend_from_slice(&b.nz);
                Some(a)
            }
            (None, Some(b)) if was_empty => Some(b.clone()),
            _ => None,
        };

        self.colors = match (self.colors.take(), other.colors.as_ref()) {
            (Some(mut a), Some(b)) => {
                a.r.extend_from_slice(&b.r);
                a.g.extend_from_slice(&b.g);
                a.b.extend_from_slice(&b.b);
                Some(a)
            }
            (None, Some(b)) if was_empty => Some(b.clone()),
            _ => None,
        };

        self.x.extend_from_slice(&other.x);
        self.y.extend_from_slice(&other.y);
        self.z.extend_from_slice(&other.z);
    }
}

impl Default for PointCloud {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{Colors, PointCloud};
    use proptest::prelude::*;

    #[test]
    fn new_is_empty() {
        let cloud = PointCloud::new();
        assert!(cloud.is_empty());
        assert_eq!(cloud.len(), 0);
    }

    #[test]
    fn from_xyz_builds_cloud() {
        let cloud = PointCloud::from_xyz(vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]);
        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud.point(0), [1.0, 3.0, 5.0]);
        assert_eq!(cloud.point(1), [2.0, 4.0, 6.0]);
    }

    #[test]
    fn from_points_deinterleaves() {
        let cloud = PointCloud::from_points(&[[1.0, 10.0, 100.0], [2.0, 20.0, 200.0]]);
        assert_eq!(cloud.x, vec![1.0, 2.0]);
        assert_eq!(cloud.y, vec![10.0, 20.0]);
        assert_eq!(cloud.z, vec![100.0, 200.0]);
        assert_eq!(cloud.positions(), vec![[1.0, 10.0, 100.0], [2.0, 20.0, 200.0]]);
    }

    #[test]
    fn select_subsets_points() {
        let cloud = PointCloud::from_xyz(
            vec![0.0, 1.0, 2.0, 3.0],
            vec![10.0, 11.0, 12.0, 13.0],
            vec![20.0, 21.0, 22.0, 23.0],
        );
        let selected = cloud.select(&[3, 1]);
        assert_eq!(selected.x, vec![3.0, 1.0]);
        assert_eq!(selected.y, vec![13.0, 11.0]);
        assert_eq!(selected.z, vec![23.0, 21.0]);
    }

    #[test]
    fn select_carries_colors() {
        let mut cloud = PointCloud::from_xyz(vec![0.0, 1.0, 2.0], vec![0.0; 3], vec![0.0; 3]);
        cloud.colors = Some(Colors {
            r: vec![1, 2, 3],
            g: vec![4, 5, 6],
            b: vec![7, 8, 9],
        });
        let selected = cloud.select(&[2, 0]);
        let colors = selected.colors.as_ref().unwrap();
        assert_eq!(colors.color(0), [3, 6, 9]);
        assert_eq!(colors.color(1), [1, 4, 7]);
    }

    #[test]
    fn aabb_ignores_nan() {
        let cloud = PointCloud::from_xyz(
            vec![0.0, f64::NAN, 2.0],
            vec![1.0, 2.0, 3.0],
            vec![4.0, 5.0, 6.0],
        );
        let aabb = cloud.aabb();
        assert!(aabb.contains(&[0.0, 1.0, 4.0]));
        assert!(aabb.contains(&[2.0, 3.0, 6.0]));
        assert!(!aabb.contains(&[f64::NAN, 2.0, 5.0]));
    }

    #[test]
    fn append_keeps_shared_colors() {
        let mut a = PointCloud::from_xyz(vec![0.0], vec![0.0], vec![0.0]);
        a.colors = Some(Colors {
            r: vec![10],
            g: vec![20],
            b: vec![30],
        });
        let mut b = PointCloud::from_xyz(vec![1.0], vec![1.0], vec![1.0]);
        b.colors = Some(Colors {
            r: vec![40],
            g: vec![50],
            b: vec![60],
        });

        a.append(&b);
        assert_eq!(a.len(), 2);
        assert_eq!(a.colors.as_ref().unwrap().r, vec![10, 40]);
    }

    #[test]
    fn append_drops_attribute_missing_on_one_side() {
        let mut a = PointCloud::from_xyz(vec![0.0], vec![0.0], vec![0.0]);
        a.colors = Some(Colors {
            r: vec![10],
            g: vec![20],
            b: vec![30],
        });
        let b = PointCloud::from_xyz(vec![1.0], vec![1.0], vec![1.0]);
        a.append(&b);
        assert_eq!(a.len(), 2);
        assert!(a.colors.is_none());
    }

    #[test]
    fn append_into_empty_adopts_attributes() {
        let mut a = PointCloud::new();
        let mut b = PointCloud::from_xyz(vec![1.0], vec![1.0], vec![1.0]);
        b.colors = Some(Colors {
            r: vec![1],
            g: vec![2],
            b: vec![3],
        });
        a.append(&b);
        assert_eq!(a, b);
    }

    #[test]
    #[should_panic]
    fn from_xyz_panics_on_mismatch() {
        let _ = PointCloud::from_xyz(vec![1.0], vec![2.0, 3.0], vec![4.0]);
    }

    proptest! {
        #[test]
        fn aabb_contains_all_finite_points(
            pts in prop::collection::vec((-1000.0f64..1000.0, -1000.0f64..1000.0, -1000.0f64..1000.0), 1..500)
        ) {
            let points: Vec<[f64; 3]> = pts.iter().map(|p| [p.0, p.1, p.2]).collect();
            let cloud = PointCloud::from_points(&points);
            let aabb = cloud.aabb();
            for p in cloud.iter_points() {
                prop_assert!(aabb.contains(&p));
            }
        }

        #[test]
        fn select_returns_requested_points_in_order(
            n in 1usize..200,
            idxs in prop::collection::vec(0usize..200, 0..100)
        ) {
            let cloud = PointCloud::from_xyz(
                (0..n).map(|i| i as f64).collect(),
                vec![0.0; n],
                vec![0.0; n],
            );
            let valid: Vec<usize> = idxs.into_iter().filter(|i| *i < n).collect();
            let inside = cloud.select(&valid);
            let expected: Vec<f64> = valid.iter().map(|&i| i as f64).collect();
            prop_assert_eq!(inside.x, expected);
        }
    }
}
