//! Facade crate for the flood observation mosaic engine.
//!
//! This crate re-exports the core domain types and exposes the file-system
//! source and sink behind the `io-fs` feature.

#![forbid(unsafe_code)]

pub use floodmosaic_core::{
    ClipBoundary, Crs, FimType, FloodFeature, FloodObservation, FloodValue, GeometryKind,
    GridGeometry, MosaicConfig, MosaicError, MosaicProduct, MosaicRequest, MosaicSink, Mosaicker,
    ObservationDescriptor, ObservationSource, OutputSpec, PipelineError, RasterObservation,
    Resolution, VectorMosaic, VectorObservation,
};

#[cfg(feature = "test-support")]
pub use floodmosaic_core::test_support;

#[cfg(feature = "io-fs")]
pub use floodmosaic_io::{FsSink, FsSource, IoError, RetryPolicy};
