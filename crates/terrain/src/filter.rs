use crate::error::TerrainError;
use groundcloud_core::PointRecords;

/// A ground classifier over record tables.
///
/// `ground_indices` returns ascending row indices into `records`; the caller
/// selects those rows so payload columns pass through untouched.
pub trait GroundFilter {
    /// Short label used in logs and output file names, e.g. `RANSAC`.
    fn method(&self) -> &str;

    fn ground_indices(&mut self, records: &PointRecords) -> Result<Vec<usize>, TerrainError>;
}

impl<G: GroundFilter + ?Sized> GroundFilter for Box<G> {
    fn method(&self) -> &str {
        (**self).method()
    }

    fn ground_indices(&mut self, records: &PointRecords) -> Result<Vec<usize>, TerrainError> {
        (**self).ground_indices(records)
    }
}

pub(crate) fn require_xyz(records: &PointRecords) -> Result<(), TerrainError> {
    if records.has_xyz() {
        Ok(())
    } else {
        Err(TerrainError::MissingXyz {
            found: records.columns(),
        })
    }
}
