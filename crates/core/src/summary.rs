use crate::{Aabb, PointCloud};

/// Headline statistics of a cloud.
#[derive(Debug, Clone, PartialEq)]
pub struct CloudSummary {
    pub num_points: usize,
    pub bounds: Aabb,
    pub has_colors: bool,
    pub has_normals: bool,
}

impl CloudSummary {
    pub fn of(cloud: &PointCloud) -> Self {
        Self {
            num_points: cloud.len(),
            bounds: cloud.aabb(),
            has_colors: cloud.has_colors(),
            has_normals: cloud.has_normals(),
        }
    }
}

/// Index and position of the point attaining an axis extreme.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extreme {
    pub index: usize,
    pub point: [f64; 3],
}

/// The actual points (not box corners) that attain the min and max of each
/// axis. `min[axis]` / `max[axis]` with axis 0, 1, 2 for x, y, z.
///
/// The first point wins when several share the extreme value. Non-finite
/// points are ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtremePoints {
    pub min: [Extreme; 3],
    pub max: [Extreme; 3],
}

impl ExtremePoints {
    /// `None` when the cloud has no finite point.
    pub fn of(cloud: &PointCloud) -> Option<Self> {
        let mut best: Option<([usize; 3], [usize; 3])> = None;

        for (i, p) in cloud.iter_points().enumerate() {
            if !p.iter().all(|v| v.is_finite()) {
                continue;
            }
            match best.as_mut() {
                None => best = Some(([i; 3], [i; 3])),
                Some((lo, hi)) => {
                    for axis in 0..3 {
                        if p[axis] < cloud.point(lo[axis])[axis] {
                            lo[axis] = i;
                        }
                        if p[axis] > cloud.point(hi[axis])[axis] {
                            hi[axis] = i;
                        }
                    }
                }
            }
        }

        let (lo, hi) = best?;
        let at = |index: usize| Extreme {
            index,
            point: cloud.point(index),
        };

        Some(Self {
            min: [at(lo[0]), at(lo[1]), at(lo[2])],
            max: [at(hi[0]), at(hi[1]), at(hi[2])],
        })
    }
}
