//! Command-line interface for the flood mosaic engine.
#![forbid(unsafe_code)]

use camino::{Utf8Path, Utf8PathBuf};
use clap::{ArgAction, Parser, Subcommand};
use floodmosaic_core::{
    CacheBudget, Crs, FimType, MosaicConfig, MosaicRequest, Mosaicker, ObservationDescriptor,
    OutputSpec, Resolution,
};
use floodmosaic_io::{FileFormat, FsSink, FsSource, fs};
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

mod error;

pub use error::CliError;

const ARG_INPUTS: &str = "inputs";
const ARG_OUTPUT: &str = "output";
const ARG_CLIP: &str = "clip";
const ARG_FIM_TYPE: &str = "fim-type";
const ARG_RES_X: &str = "res-x";
const ARG_RES_Y: &str = "res-y";
const ARG_CACHE_MB: &str = "cache-mb";
const ARG_WINDOW_SIZE: &str = "window-size";
const ARG_MAX_PIXELS: &str = "max-pixels";
const ARG_POINT_TOLERANCE: &str = "point-tolerance";
const ARG_SAMPLE_RADIUS: &str = "sample-radius";
const ARG_CRS: &str = "crs";
const ARG_NO_COMPRESS: &str = "no-compress";
const ENV_INPUTS: &str = "FLOODMOSAIC_CMDS_MOSAIC_INPUTS";
const ENV_OUTPUT: &str = "FLOODMOSAIC_CMDS_MOSAIC_OUTPUT";
const ENV_FIM_TYPE: &str = "FLOODMOSAIC_CMDS_MOSAIC_FIM_TYPE";
const ENV_RES_X: &str = "FLOODMOSAIC_CMDS_MOSAIC_RES_X";

/// Run the floodmosaic CLI with the current process arguments and environment.
///
/// # Errors
/// Returns [`CliError`] when arguments are invalid or the mosaic fails.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    match cli.command {
        Command::Mosaic(args) => run_mosaic(args),
    }
}

fn run_mosaic(args: MosaicArgs) -> Result<(), CliError> {
    let command = args.into_command()?;
    command.validate_sources()?;
    command.execute()
}

#[derive(Debug, Parser)]
#[command(
    name = "floodmosaic",
    about = "Merge flood inundation observations into one consistent product",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Merge rasters, polygons and points into a single mosaic.
    Mosaic(MosaicArgs),
}

/// CLI arguments for the `mosaic` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Merge depth or extent observations held in GeoTIFF rasters \
                 and JSON vector containers. Every input must already be in \
                 the canonical projection. Options can come from CLI flags, \
                 configuration files, or environment variables.",
    about = "Merge flood observations into one mosaic"
)]
#[ortho_config(prefix = "FLOODMOSAIC")]
struct MosaicArgs {
    /// Observation files (`.tif`, `.tiff`, `.json`).
    #[arg(value_name = "path")]
    #[serde(default)]
    inputs: Vec<Utf8PathBuf>,
    /// Destination file; `.tif` for raster mosaics, `.json` for vector ones.
    #[arg(long = ARG_OUTPUT, value_name = "path")]
    #[serde(default)]
    output: Option<Utf8PathBuf>,
    /// Polygon boundary the mosaic is trimmed to.
    #[arg(long = ARG_CLIP, value_name = "path")]
    #[serde(default)]
    clip: Option<Utf8PathBuf>,
    /// Value type of the mosaic (`depth` or `extent`).
    #[arg(long = ARG_FIM_TYPE, value_name = "type")]
    #[serde(default)]
    fim_type: Option<FimType>,
    /// Horizontal output pixel size; required when rasters differ in resolution.
    #[arg(long = ARG_RES_X, value_name = "size")]
    #[serde(default)]
    res_x: Option<f64>,
    /// Vertical output pixel size; defaults to the horizontal size.
    #[arg(long = ARG_RES_Y, value_name = "size")]
    #[serde(default)]
    res_y: Option<f64>,
    /// Memory budget for resident windows, in megabytes (64 to 4096).
    #[arg(long = ARG_CACHE_MB, value_name = "mb")]
    #[serde(default)]
    cache_mb: Option<u32>,
    /// Preferred processing window edge, in cells.
    #[arg(long = ARG_WINDOW_SIZE, value_name = "cells")]
    #[serde(default)]
    window_size: Option<usize>,
    /// Largest merge grid accepted, in cells; defaults to what the cache
    /// budget can hold.
    #[arg(long = ARG_MAX_PIXELS, value_name = "cells")]
    #[serde(default)]
    max_pixels: Option<u64>,
    /// Distance within which points are treated as one location.
    #[arg(long = ARG_POINT_TOLERANCE, value_name = "distance")]
    #[serde(default)]
    point_tolerance: Option<f64>,
    /// Buffer radius used when sampling rasters at points.
    #[arg(long = ARG_SAMPLE_RADIUS, value_name = "distance")]
    #[serde(default)]
    sample_radius: Option<f64>,
    /// EPSG code of the canonical projection.
    #[arg(long = ARG_CRS, value_name = "epsg")]
    #[serde(default)]
    crs: Option<u32>,
    /// Write raster output without LZW compression.
    #[arg(long = ARG_NO_COMPRESS, action = ArgAction::SetTrue)]
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    no_compress: bool,
}

impl MosaicArgs {
    fn into_command(self) -> Result<MosaicCommand, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        MosaicCommand::try_from(merged)
    }
}

/// Resolved `mosaic` command.
#[derive(Debug, Clone, PartialEq)]
struct MosaicCommand {
    request: MosaicRequest,
    config: MosaicConfig,
}

impl MosaicCommand {
    fn validate_sources(&self) -> Result<(), CliError> {
        for input in &self.request.inputs {
            Self::require_existing(Utf8Path::new(&input.location), ARG_INPUTS)?;
        }
        if let Some(clip) = &self.request.clip {
            Self::require_existing(Utf8Path::new(&clip.location), ARG_CLIP)?;
        }
        Ok(())
    }

    fn require_existing(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
        match fs::is_file(path) {
            Ok(true) => Ok(()),
            Ok(false) => Err(CliError::MissingSourceFile {
                field,
                path: path.to_owned(),
            }),
            Err(source) => Err(CliError::InspectSourcePath {
                field,
                path: path.to_owned(),
                source,
            }),
        }
    }

    fn execute(self) -> Result<(), CliError> {
        let source = FsSource::new(self.config.canonical_crs);
        let mosaicker = Mosaicker::new(self.config)?;
        let product = mosaicker.mosaic(&self.request, &source, &FsSink::default())?;
        info!(
            "{} mosaic of {} inputs written to {}",
            product.fim_type(),
            self.request.inputs.len(),
            self.request.output.location
        );
        Ok(())
    }
}

impl TryFrom<MosaicArgs> for MosaicCommand {
    type Error = CliError;

    fn try_from(args: MosaicArgs) -> Result<Self, Self::Error> {
        if args.inputs.is_empty() {
            return Err(CliError::MissingArgument {
                field: ARG_INPUTS,
                env: ENV_INPUTS,
            });
        }
        let output = args.output.ok_or(CliError::MissingArgument {
            field: ARG_OUTPUT,
            env: ENV_OUTPUT,
        })?;
        FileFormat::detect(&output).map_err(|source| CliError::UnsupportedOutput {
            path: output.clone(),
            source,
        })?;
        let fim_type = args.fim_type.ok_or(CliError::MissingArgument {
            field: ARG_FIM_TYPE,
            env: ENV_FIM_TYPE,
        })?;

        let mut config = MosaicConfig::new(fim_type);
        match (args.res_x, args.res_y) {
            (Some(x), y) => {
                config = config.with_target_resolution(Resolution::new(x, y.unwrap_or(x))?);
            }
            (None, Some(_)) => {
                return Err(CliError::MissingArgument {
                    field: ARG_RES_X,
                    env: ENV_RES_X,
                });
            }
            (None, None) => {}
        }
        if let Some(megabytes) = args.cache_mb {
            config = config.with_cache_budget(CacheBudget::megabytes(megabytes)?);
        }
        if let Some(window_size) = args.window_size {
            config = config.with_window_size(window_size);
        }
        if let Some(max_pixels) = args.max_pixels {
            config = config.with_max_pixels(max_pixels);
        }
        if let Some(tolerance) = args.point_tolerance {
            config = config.with_point_tolerance(tolerance);
        }
        if let Some(radius) = args.sample_radius {
            config = config.with_sample_radius(radius);
        }
        if let Some(code) = args.crs {
            config = config.with_crs(Crs::epsg(code));
        }
        config.validate()?;

        let request = MosaicRequest {
            inputs: args
                .inputs
                .iter()
                .map(|path| ObservationDescriptor::new(path.as_str()))
                .collect(),
            clip: args
                .clip
                .as_ref()
                .map(|path| ObservationDescriptor::new(path.as_str())),
            output: OutputSpec::new(output.as_str()).with_compression(!args.no_compress),
        };
        Ok(Self { request, config })
    }
}

#[cfg(test)]
mod tests;
