//! Error types emitted by the floodmosaic CLI.
//!
//! Keep this error type reasonably small, as many CLI helpers return
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use floodmosaic_core::{MosaicError, PipelineError};
use floodmosaic_io::IoError;
use thiserror::Error;

/// Errors emitted by the floodmosaic CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        /// Flag name without dashes.
        field: &'static str,
        /// Environment variable consulted for the flag.
        env: &'static str,
    },
    /// A referenced input path does not exist on disk or is not a file.
    #[error("{field} path {path:?} does not exist or is not a file")]
    MissingSourceFile {
        /// Flag or argument naming the path.
        field: &'static str,
        /// Offending path.
        path: Utf8PathBuf,
    },
    /// A referenced input path could not be inspected.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSourcePath {
        /// Flag or argument naming the path.
        field: &'static str,
        /// Offending path.
        path: Utf8PathBuf,
        /// Underlying failure.
        #[source]
        source: IoError,
    },
    /// The output path names no supported format.
    #[error("unsupported output path {path:?}: {source}")]
    UnsupportedOutput {
        /// Output path.
        path: Utf8PathBuf,
        /// Format detection failure.
        #[source]
        source: IoError,
    },
    /// The merged configuration was rejected.
    #[error("invalid mosaic configuration: {0}")]
    InvalidConfig(#[from] MosaicError),
    /// Loading, merging or publishing failed.
    #[error("mosaic failed: {0}")]
    Pipeline(#[from] PipelineError),
}
