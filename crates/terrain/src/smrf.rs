//! Simple Morphological Filter ground classification through PDAL.
//!
//! The records' positions are written to a scratch directory, classified by
//! an external `pdal pipeline` run, and the ground points PDAL writes back
//! are matched to the input rows by their coordinates rounded to the
//! written precision.

use crate::error::TerrainError;
use crate::filter::{require_xyz, GroundFilter};
use groundcloud_core::PointRecords;
use groundcloud_io::{read_delimited_records, write_records, DEFAULT_PRECISION};
use hashbrown::HashSet;
use log::{debug, info};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use std::process::Command;

/// ASPRS class code PDAL assigns to ground.
const GROUND_CLASS: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmrfParams {
    pub slope: f64,
    pub window: f64,
    pub threshold: f64,
    pub scalar: f64,
}

impl Default for SmrfParams {
    fn default() -> Self {
        Self {
            slope: 0.2,
            window: 16.0,
            threshold: 0.45,
            scalar: 1.25,
        }
    }
}

/// Builds the PDAL pipeline: read XYZ text, run SMRF, keep class 2 and
/// write it back as comma-separated XYZ.
pub fn smrf_pipeline(input: &Path, output: &Path, params: &SmrfParams) -> Value {
    json!([
        {
            "type": "readers.text",
            "filename": input.to_string_lossy(),
            "header": "X Y Z"
        },
        {
            "type": "filters.smrf",
            "slope": params.slope,
            "window": params.window,
            "threshold": params.threshold,
            "scalar": params.scalar
        },
        {
            "type": "filters.range",
            "limits": format!("Classification[{0}:{0}]", GROUND_CLASS)
        },
        {
            "type": "writers.text",
            "filename": output.to_string_lossy(),
            "order": "X,Y,Z",
            "keep_unspecified": "false",
            "precision": DEFAULT_PRECISION
        }
    ])
}

/// Integer key of a position as it reads once printed with
/// `DEFAULT_PRECISION` decimals, which is all PDAL ever sees.
fn xyz_key(p: [f64; 3]) -> [i64; 3] {
    let scale = 10f64.powi(DEFAULT_PRECISION as i32);
    p.map(|v| {
        let printed = format!("{:.*}", DEFAULT_PRECISION, v)
            .parse::<f64>()
            .unwrap_or(v);
        (printed * scale).round() as i64
    })
}

/// Rows of `records` whose rounded position appears in `ground`.
///
/// Duplicated positions in `records` all match.
pub fn match_rounded_xyz(records: &PointRecords, ground: &PointRecords) -> Vec<usize> {
    let keys: HashSet<[i64; 3]> = (0..ground.len()).map(|i| xyz_key(ground.xyz(i))).collect();
    (0..records.len())
        .filter(|&i| keys.contains(&xyz_key(records.xyz(i))))
        .collect()
}

/// [`GroundFilter`] that shells out to PDAL's `filters.smrf`.
#[derive(Debug, Clone)]
pub struct SmrfGroundFilter {
    params: SmrfParams,
    command: Vec<String>,
}

impl SmrfGroundFilter {
    pub fn new(params: SmrfParams) -> Self {
        Self {
            params,
            command: vec!["pdal".to_string()],
        }
    }

    /// Replaces the `pdal` executable with `program` and leading arguments.
    /// `pipeline <file>` is appended to whatever is given here.
    pub fn with_command<I, S>(mut self, program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = std::iter::once(program.into())
            .chain(args.into_iter().map(Into::into))
            .collect();
        self
    }

    pub fn params(&self) -> &SmrfParams {
        &self.params
    }

    fn run_pipeline(&self, pipeline: &Path) -> Result<(), TerrainError> {
        let program = &self.command[0];
        debug!("running {} pipeline {}", program, pipeline.display());

        let output = Command::new(program)
            .args(&self.command[1..])
            .arg("pipeline")
            .arg(pipeline)
            .output()
            .map_err(|source| TerrainError::Launch {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(TerrainError::ExternalTool {
                program: program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

impl GroundFilter for SmrfGroundFilter {
    fn method(&self) -> &str {
        "SMRF"
    }

    fn ground_indices(&mut self, records: &PointRecords) -> Result<Vec<usize>, TerrainError> {
        require_xyz(records)?;

        // removed on drop, including every early return below
        let scratch = tempfile::Builder::new()
            .prefix("groundcloud-smrf")
            .tempdir()?;
        let input = scratch.path().join("input.xyz");
        let output = scratch.path().join("ground.xyz");
        let pipeline = scratch.path().join("pipeline.json");

        let xyz = PointRecords::from_rows(3, &records.positions());
        write_records(&input, &xyz, DEFAULT_PRECISION)?;
        fs::write(
            &pipeline,
            serde_json::to_vec_pretty(&smrf_pipeline(&input, &output, &self.params))?,
        )?;

        self.run_pipeline(&pipeline)?;

        let text = fs::read_to_string(&output)?;
        if text.lines().skip(1).all(|l| l.trim().is_empty()) {
            info!("SMRF classified no ground points");
            return Ok(Vec::new());
        }
        let ground = read_delimited_records(&output, ',', 1)?;
        require_xyz(&ground)?;

        let indices = match_rounded_xyz(records, &ground);
        info!(
            "SMRF classified {} point(s) as ground, {} matched input rows",
            ground.len(),
            indices.len()
        );
        Ok(indices)
    }
}
