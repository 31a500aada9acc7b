use groundcloud_core::{Colors, Normals, PointCloud};
use hashbrown::HashMap;

type VoxelKey = (i64, i64, i64);

#[derive(Default, Clone, Copy)]
struct VoxelAccum {
    sx: f64,
    sy: f64,
    sz: f64,
    snx: f64,
    sny: f64,
    snz: f64,
    sr: f64,
    sg: f64,
    sb: f64,
    n: usize,
}

/// Replaces every occupied voxel of edge `voxel_size` by the centroid of the
/// points it contains.
///
/// Colors are averaged per channel; normals are averaged and re-normalized.
/// Output is ordered by voxel key, so repeated runs are reproducible.
/// Non-finite points are dropped.
///
/// # Panics
///
/// Panics if `voxel_size` is not finite and positive.
pub fn voxel_downsample(cloud: &PointCloud, voxel_size: f64) -> PointCloud {
    assert!(
        voxel_size.is_finite() && voxel_size > 0.0,
        "voxel_size must be > 0 and finite"
    );

    if cloud.is_empty() {
        return PointCloud::new();
    }

    let mut bins: HashMap<VoxelKey, VoxelAccum> = HashMap::new();

    for i in 0..cloud.len() {
        let [px, py, pz] = cloud.point(i);
        if !px.is_finite() || !py.is_finite() || !pz.is_finite() {
            continue;
        }

        let key = (
            (px / voxel_size).floor() as i64,
            (py / voxel_size).floor() as i64,
            (pz / voxel_size).floor() as i64,
        );

        let entry = bins.entry(key).or_default();
        entry.sx += px;
        entry.sy += py;
        entry.sz += pz;
        if let Some(normals) = &cloud.normals {
            entry.snx += normals.nx[i];
            entry.sny += normals.ny[i];
            entry.snz += normals.nz[i];
        }
        if let Some(colors) = &cloud.colors {
            entry.sr += f64::from(colors.r[i]);
            entry.sg += f64::from(colors.g[i]);
            entry.sb += f64::from(colors.b[i]);
        }
        entry.n += 1;
    }

    if bins.is_empty() {
        return PointCloud::new();
    }

    let mut cells: Vec<(VoxelKey, VoxelAccum)> = bins.into_iter().collect();
    cells.sort_unstable_by_key(|(key, _)| *key);

    let m = cells.len();
    let mut x = Vec::with_capacity(m);
    let mut y = Vec::with_capacity(m);
    let mut z = Vec::with_capacity(m);
    let mut normals = cloud.normals.as_ref().map(|_| Normals {
        nx: Vec::with_capacity(m),
        ny: Vec::with_capacity(m),
        nz: Vec::with_capacity(m),
    });
    let mut colors = cloud.colors.as_ref().map(|_| Colors {
        r: Vec::with_capacity(m),
        g: Vec::with_capacity(m),
        b: Vec::with_capacity(m),
    });

    for (_, a) in cells {
        let denom = a.n as f64;
        x.push(a.sx / denom);
        y.push(a.sy / denom);
        z.push(a.sz / denom);

        if let Some(out) = normals.as_mut() {
            let len = (a.snx * a.snx + a.sny * a.sny + a.snz * a.snz).sqrt();
            let (nx, ny, nz) = if len > 1e-12 {
                (a.snx / len, a.sny / len, a.snz / len)
            } else {
                (0.0, 0.0, 1.0)
            };
            out.nx.push(nx);
            out.ny.push(ny);
            out.nz.push(nz);
        }

        if let Some(out) = colors.as_mut() {
            out.r.push((a.sr / denom).round() as u8);
            out.g.push((a.sg / denom).round() as u8);
            out.b.push((a.sb / denom).round() as u8);
        }
    }

    let mut out = PointCloud::from_xyz(x, y, z);
    out.normals = normals;
    out.colors = colors;
    out
}
