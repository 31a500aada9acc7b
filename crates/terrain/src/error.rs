use groundcloud_segmentation::GroundError;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TerrainError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("failed to encode pipeline: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Ground(#[from] GroundError),
    #[error("records have {found} column(s), need at least 3 for x, y, z")]
    MissingXyz { found: usize },
    #[error("failed to launch `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("`{program}` exited with {status}: {stderr}")]
    ExternalTool {
        program: String,
        status: String,
        stderr: String,
    },
}

impl TerrainError {
    /// Failures that only concern the current input file.
    ///
    /// Terrain generation logs these and moves on to the next file.
    pub fn is_per_file(&self) -> bool {
        matches!(
            self,
            TerrainError::Ground(GroundError::NoGroundFound { .. })
                | TerrainError::Ground(GroundError::InsufficientPoints { .. })
                | TerrainError::MissingXyz { .. }
        )
    }
}
