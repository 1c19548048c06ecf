//! Core engine for merging flood inundation observations.
//!
//! Observations arrive as rasters (depth or extent grids) or as vector
//! layers (points, polygons and their multi-part forms). The engine
//! validates them against one canonical projection, decides whether the
//! result is a raster or a feature collection, aligns rasters onto a shared
//! merge grid and reduces them with a nodata-aware maximum. Storage stays
//! outside: inputs are loaded through [`ObservationSource`] and results are
//! written through [`MosaicSink`].
//!
//! Every entry point returns `Result` and no partial product escapes a
//! failed invocation.

#![forbid(unsafe_code)]

mod align;
mod cast;
mod classify;
mod clip;
mod config;
mod error;
mod grid;
mod mosaic;
mod observation;
mod raster;
mod reduce;
mod sample;
mod source;
mod types;
mod vector;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use align::{PointBurner, PolygonRasterizer, RasterAligner, WindowSource};
pub use cast::{
    PolygonPresencePolicy, VectorCaster, cast_depth_cell, ensure_castable, flooded_runs, merge_value,
};
pub use classify::{Classification, GeometryClassifier, MosaicPlan, OutputKind};
pub use clip::Clipper;
pub use config::{
    CacheBudget, DEFAULT_CACHE_MB, DEFAULT_WINDOW_SIZE, MAX_CACHE_MB, MIN_CACHE_MB, MosaicConfig,
    TilePlan,
};
pub use error::MosaicError;
pub use grid::MergeGrid;
pub use mosaic::{MOSAIC_SOURCE_ID, MosaicProduct, Mosaicker, VectorMosaic};
pub use observation::FloodObservation;
pub use raster::{GridGeometry, RasterObservation, Resolution, Window, is_valid};
pub use reduce::{NanAwareReducer, merge_cell, merge_into};
pub use sample::{PointSample, PointSampler};
pub use source::{
    BoxedError, MosaicRequest, MosaicSink, ObservationDescriptor, ObservationSource, OutputSpec,
    PipelineError,
};
pub use types::{
    AttributeValue, Attributes, Crs, FimType, FloodValue, GeometryKind, ParseFimTypeError,
    PixelType, geometry_name,
};
pub use vector::{ClipBoundary, FloodFeature, VectorObservation};
