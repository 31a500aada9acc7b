use crate::{Colors, PointCloud};

/// Row-major table of fixed-width numeric records.
///
/// The first three columns are x, y and z. Everything after that (color,
/// scalar features, ...) is payload: it is never interpreted by the
/// processing code, only carried along by index-based selection so it comes
/// out in the same column order it went in.
#[derive(Debug, Clone, PartialEq)]
pub struct PointRecords {
    columns: usize,
    values: Vec<f64>,
}

impl PointRecords {
    /// Empty table with the given record width.
    pub fn new(columns: usize) -> Self {
        assert!(columns > 0, "records must have at least one column");
        Self {
            columns,
            values: Vec::new(),
        }
    }

    pub fn from_values(columns: usize, values: Vec<f64>) -> Self {
        assert!(columns > 0, "records must have at least one column");
        assert_eq!(
            values.len() % columns,
            0,
            "record values must be a multiple of the column count"
        );
        Self { columns, values }
    }

    pub fn from_rows<R: AsRef<[f64]>>(columns: usize, rows: &[R]) -> Self {
        let mut records = Self::new(columns);
        for row in rows {
            records.push(row.as_ref());
        }
        records
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn len(&self) -> usize {
        self.values.len() / self.columns
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True when every record carries at least x, y and z.
    pub fn has_xyz(&self) -> bool {
        self.columns >= 3
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn row(&self, i: usize) -> &[f64] {
        assert!(i < self.len(), "record index out of bounds");
        let base = i * self.columns;
        &self.values[base..base + self.columns]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        self.values.chunks_exact(self.columns)
    }

    pub fn xyz(&self, i: usize) -> [f64; 3] {
        assert!(self.has_xyz(), "records have fewer than 3 columns");
        let row = self.row(i);
        [row[0], row[1], row[2]]
    }

    /// Positions of every record, in record order.
    pub fn positions(&self) -> Vec<[f64; 3]> {
        assert!(self.has_xyz(), "records have fewer than 3 columns");
        self.rows().map(|r| [r[0], r[1], r[2]]).collect()
    }

    pub fn push(&mut self, row: &[f64]) {
        assert_eq!(row.len(), self.columns, "record width mismatch in push");
        self.values.extend_from_slice(row);
    }

    /// Appends all records of `other`, which must have the same width.
    pub fn extend(&mut self, other: &PointRecords) {
        assert_eq!(
            other.columns, self.columns,
            "record width mismatch in extend"
        );
        self.values.extend_from_slice(&other.values);
    }

    /// Copies the records at `indices`, in the order given.
    pub fn select(&self, indices: &[usize]) -> Self {
        let mut values = Vec::with_capacity(indices.len() * self.columns);
        for &idx in indices {
            assert!(idx < self.len(), "index out of bounds in select");
            values.extend_from_slice(self.row(idx));
        }
        Self {
            columns: self.columns,
            values,
        }
    }

    /// Builds a [`PointCloud`] from the position columns.
    ///
    /// When the records have at least six columns, columns 3..6 are taken as
    /// 0–255 RGB and attached as colors.
    pub fn to_cloud(&self) -> PointCloud {
        let mut cloud = PointCloud::from_points(&self.positions());

        if self.columns >= 6 {
            let n = self.len();
            let mut r = Vec::with_capacity(n);
            let mut g = Vec::with_capacity(n);
            let mut b = Vec::with_capacity(n);
            for row in self.rows() {
                r.push(channel_to_u8(row[3]));
                g.push(channel_to_u8(row[4]));
                b.push(channel_to_u8(row[5]));
            }
            cloud.colors = Some(Colors { r, g, b });
        }

        cloud
    }
}

fn channel_to_u8(v: f64) -> u8 {
    if !v.is_finite() {
        return 0;
    }
    v.round().clamp(0.0, 255.0) as u8
}
