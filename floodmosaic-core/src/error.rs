//! Terminal errors raised while reconciling flood observations.
//!
//! Every variant aborts the invocation. Callers never receive a partial
//! mosaic alongside an error.

use thiserror::Error;

use crate::{Crs, FimType};

/// Errors returned by the mosaic engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MosaicError {
    /// An observation is not expressed in the canonical projection.
    #[error("{source_id} uses {found} but the canonical projection is {expected}")]
    CrsMismatch {
        /// Identifier of the offending observation.
        source_id: String,
        /// Canonical projection required of every input.
        expected: Crs,
        /// Projection declared by the observation.
        found: Crs,
    },
    /// Depth and extent observations were mixed without a cast path.
    #[error("{source_id} holds {found} values but the mosaic requires {expected}")]
    TypeMismatch {
        /// Identifier of the offending observation.
        source_id: String,
        /// Value type the mosaic resolved to.
        expected: FimType,
        /// Value type declared by the observation.
        found: FimType,
    },
    /// A geometry kind outside point, multipoint, polygon and multipolygon.
    #[error("{source_id} contains unsupported geometry `{geometry}`")]
    UnsupportedGeometry {
        /// Identifier of the offending observation.
        source_id: String,
        /// Name of the rejected geometry kind.
        geometry: String,
    },
    /// The merge grid could not be derived.
    #[error("grid mismatch: {reason}")]
    GridMismatch {
        /// Human-readable description of the conflict.
        reason: String,
    },
    /// The merge grid would exceed the configured pixel budget.
    #[error("merge grid of {pixels} pixels exceeds the configured maximum of {max_pixels}")]
    ExtentOverflow {
        /// Pixel count of the requested grid.
        pixels: u64,
        /// Configured upper bound.
        max_pixels: u64,
    },
    /// Casting left a geometry outside the supported kinds.
    #[error("casting {source_id} produced unsupported geometry `{geometry}`")]
    GeometryCastConflict {
        /// Identifier of the observation the feature came from.
        source_id: String,
        /// Name of the rejected geometry kind.
        geometry: String,
    },
    /// No observations were supplied.
    #[error("no observations were supplied for mosaicking")]
    EmptyInput,
    /// A raster buffer does not match its declared grid.
    #[error("raster {source_id} is malformed: {reason}")]
    InvalidRaster {
        /// Identifier of the offending raster.
        source_id: String,
        /// Description of the inconsistency.
        reason: String,
    },
    /// A configuration value is out of range.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the rejected value.
        reason: String,
    },
    /// The per-invocation worker pool could not be started.
    #[error("failed to start tile workers: {reason}")]
    WorkerPool {
        /// Message reported by the thread pool builder.
        reason: String,
    },
}

impl MosaicError {
    pub(crate) fn grid(reason: impl Into<String>) -> Self {
        Self::GridMismatch {
            reason: reason.into(),
        }
    }

    pub(crate) fn config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}
