//! Test helpers for composing mosaic CLI datasets and layered overrides.

use super::*;
use floodmosaic_core::{GridGeometry, RasterObservation};
use floodmosaic_io::geotiff;
use geo::Coord;
use std::fs::File;
use tempfile::TempDir;

#[derive(Debug, Clone, Default)]
pub(super) struct LayerOverrides {
    pub(super) output: Option<Utf8PathBuf>,
    pub(super) fim_type: Option<FimType>,
}

/// Two adjacent 2x2 extent rasters with unit pixels.
#[derive(Debug)]
pub(super) struct RasterFiles {
    _dir: TempDir,
    root: Utf8PathBuf,
    west: Utf8PathBuf,
    east: Utf8PathBuf,
}

impl RasterFiles {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 tempdir");
        let west = root.join("west.tif");
        let east = root.join("east.tif");
        write_extent(&west, Coord { x: 0.0, y: 2.0 }, vec![1.0, 0.0, 0.0, 1.0]);
        write_extent(&east, Coord { x: 2.0, y: 2.0 }, vec![0.0, 1.0, 1.0, 0.0]);
        Self {
            _dir: dir,
            root,
            west,
            east,
        }
    }

    pub(super) fn west(&self) -> &Utf8Path {
        &self.west
    }

    pub(super) fn east(&self) -> &Utf8Path {
        &self.east
    }

    pub(super) fn output(&self) -> Utf8PathBuf {
        self.root.join("out/mosaic.tif")
    }

    pub(super) fn config_output(&self) -> Utf8PathBuf {
        self.root.join("config/mosaic.tif")
    }
}

fn write_extent(path: &Utf8Path, origin: Coord<f64>, pixels: Vec<f32>) {
    let resolution = Resolution::square(1.0).expect("positive resolution");
    let grid = GridGeometry::new(origin, resolution, 2, 2);
    let raster = RasterObservation::new(path.as_str(), FimType::Extent, Crs::default(), grid, 255.0, pixels)
        .expect("valid raster");
    let file = File::create(path).expect("create raster file");
    geotiff::encode_raster(&raster, file, true).expect("encode raster");
}

/// Resolve arguments without consulting real configuration files.
pub(super) fn resolve_command(args: MosaicArgs) -> Result<MosaicCommand, CliError> {
    let command = MosaicCommand::try_from(args)?;
    command.validate_sources()?;
    Ok(command)
}

pub(super) fn merge_layers(
    mut cli_args: MosaicArgs,
    file_layer: Option<LayerOverrides>,
    env_layer: Option<LayerOverrides>,
) -> Result<MosaicCommand, CliError> {
    merge_field(
        &mut cli_args.output,
        extract_field(&env_layer, |layer| &layer.output),
        extract_field(&file_layer, |layer| &layer.output),
    );
    merge_field(
        &mut cli_args.fim_type,
        extract_field(&env_layer, |layer| &layer.fim_type),
        extract_field(&file_layer, |layer| &layer.fim_type),
    );
    resolve_command(cli_args)
}

fn merge_field<T: Clone>(target: &mut Option<T>, env_value: Option<T>, file_value: Option<T>) {
    if target.is_none()
        && let Some(value) = env_value.or(file_value)
    {
        *target = Some(value);
    }
}

fn extract_field<T: Clone>(
    layer: &Option<LayerOverrides>,
    accessor: fn(&LayerOverrides) -> &Option<T>,
) -> Option<T> {
    layer.as_ref().and_then(|entry| accessor(entry).clone())
}
