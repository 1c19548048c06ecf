//! Collaborator seams for loading observations and publishing mosaics.
//!
//! The engine itself never touches storage. Implementations of
//! [`ObservationSource`] and [`MosaicSink`] live in I/O crates or in tests.

use std::error::Error;

use thiserror::Error as ThisError;

use crate::{ClipBoundary, FloodObservation, MosaicError, MosaicProduct};

/// Boxed error raised by a collaborator.
pub type BoxedError = Box<dyn Error + Send + Sync + 'static>;

/// Where to find one observation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObservationDescriptor {
    /// Location understood by the source, typically a file path.
    pub location: String,
}

impl ObservationDescriptor {
    /// Descriptor for `location`.
    #[must_use]
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
        }
    }
}

/// Where and how to publish the mosaic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSpec {
    /// Destination understood by the sink.
    pub location: String,
    /// Whether raster output is compressed.
    pub compress: bool,
}

impl OutputSpec {
    /// Compressed output at `location`.
    #[must_use]
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            compress: true,
        }
    }

    /// Toggle raster compression.
    #[must_use]
    pub const fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }
}

/// Inputs, optional boundary and destination of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MosaicRequest {
    /// Observations to merge, in priority order for attribute ties.
    pub inputs: Vec<ObservationDescriptor>,
    /// Optional clip boundary.
    pub clip: Option<ObservationDescriptor>,
    /// Destination.
    pub output: OutputSpec,
}

/// Loads observations and boundaries.
pub trait ObservationSource {
    /// Load one observation.
    ///
    /// # Errors
    /// Returns [`PipelineError::Load`] when the observation cannot be read.
    fn load(&self, descriptor: &ObservationDescriptor) -> Result<FloodObservation, PipelineError>;

    /// Load a clip boundary, combining every polygon it holds.
    ///
    /// # Errors
    /// Returns [`PipelineError::Load`] when the boundary cannot be read.
    fn load_boundary(
        &self,
        descriptor: &ObservationDescriptor,
    ) -> Result<ClipBoundary, PipelineError>;
}

/// Publishes a finished mosaic.
pub trait MosaicSink {
    /// Write `product` to `output`. Either the whole product is published or
    /// nothing is.
    ///
    /// # Errors
    /// Returns [`PipelineError::Publish`] when the product cannot be written.
    fn publish(&self, product: &MosaicProduct, output: &OutputSpec) -> Result<(), PipelineError>;
}

/// Errors raised while running a request end to end.
#[derive(Debug, ThisError)]
pub enum PipelineError {
    /// The engine rejected the inputs.
    #[error(transparent)]
    Mosaic(#[from] MosaicError),
    /// An observation or boundary could not be loaded.
    #[error("failed to load {location}")]
    Load {
        /// Location that failed.
        location: String,
        /// Underlying failure.
        #[source]
        source: BoxedError,
    },
    /// The mosaic could not be published.
    #[error("failed to publish mosaic to {location}")]
    Publish {
        /// Destination that failed.
        location: String,
        /// Underlying failure.
        #[source]
        source: BoxedError,
    },
}

impl PipelineError {
    /// Wrap a load failure.
    #[must_use]
    pub fn load(location: impl Into<String>, source: impl Into<BoxedError>) -> Self {
        Self::Load {
            location: location.into(),
            source: source.into(),
        }
    }

    /// Wrap a publish failure.
    #[must_use]
    pub fn publish(location: impl Into<String>, source: impl Into<BoxedError>) -> Self {
        Self::Publish {
            location: location.into(),
            source: source.into(),
        }
    }
}
