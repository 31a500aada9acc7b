use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use groundcloud_cli::{analyze, preprocess, terrain, Config, Method};
use log::{error, LevelFilter};
use std::path::PathBuf;
use std::process::ExitCode;

/// LiDAR point cloud preprocessing and ground extraction.
#[derive(Parser, Debug)]
#[command(name = "groundcloud", version, about)]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Log debug output (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Merge a folder of txt tiles, downsample, estimate normals, remove
    /// outliers and save a PLY.
    Preprocess {
        /// Folder of *.txt tiles.
        #[arg(long, value_name = "DIR")]
        input: Option<PathBuf>,
        #[arg(long, value_name = "DIR")]
        output: Option<PathBuf>,
        #[arg(long)]
        voxel_size: Option<f64>,
        /// Ignore color columns.
        #[arg(long)]
        no_rgb: bool,
        /// Write binary little-endian PLY.
        #[arg(long)]
        binary: bool,
    },
    /// Print point count, axis ranges and extreme points of a PLY or txt file.
    Analyze {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Extract ground from every txt tile in a folder and save it merged.
    Terrain {
        /// Folder of *.txt tiles.
        #[arg(long, value_name = "DIR")]
        input: Option<PathBuf>,
        #[arg(long, value_name = "DIR")]
        output: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = Method::Ransac)]
        method: Method,
        /// Seed RANSAC for reproducible output.
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn init_logger(verbose: bool) {
    let mut builder = pretty_env_logger::formatted_builder();
    builder.filter_level(if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.init();
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => {
            Config::load(path).with_context(|| format!("loading config {}", path.display()))
        }
        None => Ok(Config::default()),
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = load_config(cli.config.as_ref())?;

    match cli.command {
        Command::Preprocess {
            input,
            output,
            voxel_size,
            no_rgb,
            binary,
        } => {
            if let Some(input) = input {
                config.preprocess.input_dir = input;
            }
            if let Some(output) = output {
                config.output.dir = output;
            }
            if let Some(voxel_size) = voxel_size {
                config.preprocess.voxel_size = voxel_size;
            }
            config.preprocess.use_rgb &= !no_rgb;
            config.preprocess.binary |= binary;
            config.validate()?;

            preprocess::run(&config.preprocess, &config.output.dir)?;
        }
        Command::Analyze { file } => {
            print!("{}", analyze::run(&file)?);
        }
        Command::Terrain {
            input,
            output,
            method,
            seed,
        } => {
            if let Some(output) = output {
                config.output.dir = output;
            }
            if seed.is_some() {
                config.ransac.seed = seed;
            }
            config.validate()?;

            let input = input.unwrap_or_else(|| config.preprocess.input_dir.clone());
            let now = chrono::Local::now().naive_local();
            terrain::run(&input, method, &config, now)?;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
