//! File-system collaborators for the flood mosaic engine.
//!
//! [`FsSource`] loads GeoTIFF rasters and JSON vector containers, and
//! [`FsSink`] publishes mosaics atomically in the same formats. Transient
//! I/O failures are retried according to a [`RetryPolicy`].
//!
//! # Examples
//!
//! ```no_run
//! use floodmosaic_core::{
//!     FimType, MosaicConfig, MosaicRequest, Mosaicker, ObservationDescriptor, OutputSpec,
//! };
//! use floodmosaic_io::{FsSink, FsSource};
//!
//! let config = MosaicConfig::new(FimType::Extent);
//! let source = FsSource::new(config.canonical_crs);
//! let mosaicker = Mosaicker::new(config)?;
//! let request = MosaicRequest {
//!     inputs: vec![
//!         ObservationDescriptor::new("north.tif"),
//!         ObservationDescriptor::new("south.tif"),
//!     ],
//!     clip: None,
//!     output: OutputSpec::new("mosaic.tif"),
//! };
//! mosaicker.mosaic(&request, &source, &FsSink::default())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![forbid(unsafe_code)]

mod error;
pub mod fs;
pub mod geotiff;
mod retry;
mod source;
pub mod vector;

pub use error::IoError;
pub use retry::RetryPolicy;
pub use source::{FileFormat, FsSink, FsSource};
