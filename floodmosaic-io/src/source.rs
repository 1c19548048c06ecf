//! File-system implementations of the engine's collaborator seams.

use camino::Utf8Path;
use floodmosaic_core::{
    ClipBoundary, Crs, FloodObservation, MosaicProduct, MosaicSink, ObservationDescriptor,
    ObservationSource, OutputSpec, PipelineError,
};
use log::{debug, info};

use crate::fs::{open_reader, write_atomic};
use crate::geotiff::{decode_raster, encode_raster};
use crate::vector::{decode_boundary, decode_layer, encode_mosaic};
use crate::{IoError, RetryPolicy};

/// On-disk format, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// Single-band GeoTIFF (`.tif`, `.tiff`).
    GeoTiff,
    /// JSON vector container (`.json`).
    ///
    /// The container is serialised `geo` geometry, not GeoJSON, so
    /// `.geojson` files are refused rather than misread.
    Json,
}

impl FileFormat {
    /// Detect the format of `path` from its extension, ignoring case.
    ///
    /// # Errors
    /// Returns [`IoError::UnsupportedFormat`] for any other extension.
    pub fn detect(path: &Utf8Path) -> Result<Self, IoError> {
        let extension = path.extension().map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("tif" | "tiff") => Ok(Self::GeoTiff),
            Some("json") => Ok(Self::Json),
            _ => Err(IoError::UnsupportedFormat {
                path: path.to_owned(),
            }),
        }
    }
}

/// Loads observations from local files.
///
/// Rasters are read from GeoTIFF and vectors from JSON containers. The file
/// path doubles as the observation's source identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsSource {
    canonical_crs: Crs,
    retry: RetryPolicy,
}

impl FsSource {
    /// Source assigning `canonical_crs` to geometry-only vector files.
    #[must_use]
    pub fn new(canonical_crs: Crs) -> Self {
        Self {
            canonical_crs,
            retry: RetryPolicy::default(),
        }
    }

    /// Replace the retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Read one observation from `path`.
    ///
    /// # Errors
    /// Returns [`IoError`] when the file cannot be opened or decoded.
    pub fn read(&self, path: &Utf8Path) -> Result<FloodObservation, IoError> {
        let format = FileFormat::detect(path)?;
        let observation = self.retry.run(path.as_str(), || {
            let reader = open_reader(path)?;
            match format {
                FileFormat::GeoTiff => {
                    decode_raster(reader, path, path.as_str()).map(FloodObservation::Raster)
                }
                FileFormat::Json => decode_layer(reader, path, path.as_str(), self.canonical_crs)
                    .map(FloodObservation::Vector),
            }
        })?;
        debug!(
            "loaded {} {} observation from {path}",
            observation.fim_type(),
            match format {
                FileFormat::GeoTiff => "raster",
                FileFormat::Json => "vector",
            }
        );
        Ok(observation)
    }

    /// Read a clip boundary from a JSON container at `path`.
    ///
    /// # Errors
    /// Returns [`IoError`] when the file is not JSON or holds no polygons.
    pub fn read_boundary(&self, path: &Utf8Path) -> Result<ClipBoundary, IoError> {
        if FileFormat::detect(path)? != FileFormat::Json {
            return Err(IoError::UnsupportedFormat {
                path: path.to_owned(),
            });
        }
        self.retry.run(path.as_str(), || {
            decode_boundary(open_reader(path)?, path, self.canonical_crs)
        })
    }
}

impl Default for FsSource {
    fn default() -> Self {
        Self::new(Crs::default())
    }
}

impl ObservationSource for FsSource {
    fn load(&self, descriptor: &ObservationDescriptor) -> Result<FloodObservation, PipelineError> {
        self.read(Utf8Path::new(&descriptor.location))
            .map_err(|err| PipelineError::load(descriptor.location.as_str(), err))
    }

    fn load_boundary(
        &self,
        descriptor: &ObservationDescriptor,
    ) -> Result<ClipBoundary, PipelineError> {
        self.read_boundary(Utf8Path::new(&descriptor.location))
            .map_err(|err| PipelineError::load(descriptor.location.as_str(), err))
    }
}

/// Publishes mosaics as local files.
///
/// Raster mosaics become GeoTIFF and vector mosaics JSON containers. Every
/// write is atomic: a failed publish leaves no file behind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FsSink {
    retry: RetryPolicy,
}

impl FsSink {
    /// Sink retrying transient failures with `retry`.
    #[must_use]
    pub const fn new(retry: RetryPolicy) -> Self {
        Self { retry }
    }

    /// Write `product` to `path`.
    ///
    /// # Errors
    /// - [`IoError::UnsupportedFormat`] when the extension does not match the
    ///   product's kind.
    /// - [`IoError`] when encoding or writing fails.
    pub fn write(&self, product: &MosaicProduct, path: &Utf8Path, compress: bool) -> Result<(), IoError> {
        let format = FileFormat::detect(path)?;
        match (product, format) {
            (MosaicProduct::Raster(raster), FileFormat::GeoTiff) => {
                self.retry.run(path.as_str(), || {
                    write_atomic(path, |writer| {
                        encode_raster(raster, writer, compress).map_err(|err| IoError::tiff(path, err))
                    })
                })?;
                info!(
                    "wrote {}x{} {} raster to {path}",
                    raster.grid().width(),
                    raster.grid().height(),
                    raster.fim_type()
                );
            }
            (MosaicProduct::Vector(mosaic), FileFormat::Json) => {
                self.retry.run(path.as_str(), || {
                    write_atomic(path, |writer| {
                        encode_mosaic(mosaic, writer).map_err(|err| IoError::json(path, err))
                    })
                })?;
                info!(
                    "wrote {} {} features to {path}",
                    mosaic.features.len(),
                    mosaic.fim_type
                );
            }
            _ => {
                return Err(IoError::UnsupportedFormat {
                    path: path.to_owned(),
                });
            }
        }
        Ok(())
    }
}

impl MosaicSink for FsSink {
    fn publish(&self, product: &MosaicProduct, output: &OutputSpec) -> Result<(), PipelineError> {
        self.write(product, Utf8Path::new(&output.location), output.compress)
            .map_err(|err| PipelineError::publish(output.location.as_str(), err))
    }
}
