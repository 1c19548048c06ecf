//! The tagged union of raster and vector observations.

use crate::{Crs, FimType, RasterObservation, VectorObservation};

/// One flood observation entering the mosaic.
#[derive(Debug, Clone, PartialEq)]
pub enum FloodObservation {
    /// Gridded depth or extent.
    Raster(RasterObservation),
    /// Point or polygon features.
    Vector(VectorObservation),
}

impl FloodObservation {
    /// Identifier of the originating source.
    #[must_use]
    pub fn source_id(&self) -> &str {
        match self {
            Self::Raster(raster) => raster.source_id(),
            Self::Vector(vector) => vector.source_id(),
        }
    }

    /// Declared value type.
    #[must_use]
    pub const fn fim_type(&self) -> FimType {
        match self {
            Self::Raster(raster) => raster.fim_type(),
            Self::Vector(vector) => vector.fim_type(),
        }
    }

    /// Declared projection.
    #[must_use]
    pub const fn crs(&self) -> Crs {
        match self {
            Self::Raster(raster) => raster.crs(),
            Self::Vector(vector) => vector.crs(),
        }
    }
}

impl From<RasterObservation> for FloodObservation {
    fn from(raster: RasterObservation) -> Self {
        Self::Raster(raster)
    }
}

impl From<VectorObservation> for FloodObservation {
    fn from(vector: VectorObservation) -> Self {
        Self::Vector(vector)
    }
}
