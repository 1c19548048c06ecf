//! Errors raised while reading and writing observations on disk.
//!
//! Keep this type small: codec helpers return `Result<_, IoError>` and the
//! workspace enables `clippy::result_large_err`.

use std::io;

use camino::Utf8PathBuf;
use floodmosaic_core::MosaicError;
use thiserror::Error;

/// Errors emitted by the file-system collaborator.
#[derive(Debug, Error)]
pub enum IoError {
    /// Opening, reading or writing a file failed.
    #[error("I/O failure on {path}: {source}")]
    Io {
        /// Path being accessed.
        path: Utf8PathBuf,
        /// Underlying failure.
        #[source]
        source: io::Error,
    },
    /// The TIFF codec rejected the file.
    #[error("failed to decode or encode GeoTIFF {path}: {message}")]
    Tiff {
        /// Raster path.
        path: Utf8PathBuf,
        /// Codec message.
        message: String,
    },
    /// A GeoTIFF lacks a tag needed to georeference it.
    #[error("GeoTIFF {path} has no {tag}")]
    MissingGeoreference {
        /// Raster path.
        path: Utf8PathBuf,
        /// Missing tag or key.
        tag: &'static str,
    },
    /// Pixels are neither `float32` nor `uint8`.
    #[error("GeoTIFF {path} stores unsupported {found} pixels")]
    UnsupportedPixelType {
        /// Raster path.
        path: Utf8PathBuf,
        /// Description of the decoded sample type.
        found: &'static str,
    },
    /// The vector container could not be parsed or written.
    #[error("invalid vector container {path}: {source}")]
    Json {
        /// Vector path.
        path: Utf8PathBuf,
        /// Underlying failure.
        #[source]
        source: serde_json::Error,
    },
    /// A mixed collection was offered where one geometry family is needed.
    #[error("{path} mixes point and polygon features and cannot be loaded as one layer")]
    MixedLayer {
        /// Vector path.
        path: Utf8PathBuf,
    },
    /// The file holds no features.
    #[error("{path} contains no features")]
    EmptyLayer {
        /// Vector path.
        path: Utf8PathBuf,
    },
    /// The extension names no supported format.
    #[error("unsupported file extension for {path} (expected .tif, .tiff or .json)")]
    UnsupportedFormat {
        /// Offending path.
        path: Utf8PathBuf,
    },
    /// The decoded content failed domain validation.
    #[error(transparent)]
    Mosaic(#[from] MosaicError),
}

impl IoError {
    /// Wrap an I/O failure with its path.
    #[must_use]
    pub fn io(path: impl Into<Utf8PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap a TIFF codec failure, keeping I/O failures distinguishable.
    #[must_use]
    pub fn tiff(path: impl Into<Utf8PathBuf>, err: tiff::TiffError) -> Self {
        match err {
            tiff::TiffError::IoError(source) => Self::io(path, source),
            other => Self::Tiff {
                path: path.into(),
                message: other.to_string(),
            },
        }
    }

    /// Wrap a JSON failure, keeping I/O failures distinguishable.
    #[must_use]
    pub fn json(path: impl Into<Utf8PathBuf>, source: serde_json::Error) -> Self {
        if source.is_io() {
            return Self::io(path, io::Error::from(source));
        }
        Self::Json {
            path: path.into(),
            source,
        }
    }

    /// Whether retrying the operation may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Io { source, .. } if matches!(
                source.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
            )
        )
    }
}
