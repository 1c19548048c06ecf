//! Partition observations by kind and decide what the mosaic produces.

use geo::{Coord, Geometry};
use log::info;

use crate::{
    ClipBoundary, Crs, FimType, FloodObservation, GeometryKind, GridGeometry, MosaicError,
    RasterObservation, VectorObservation, geometry_name,
};

/// Container the mosaic is written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// Single-band GeoTIFF.
    Raster,
    /// Vector feature collection.
    Vector,
}

/// How the classified inputs are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MosaicPlan {
    /// Only rasters: align and reduce.
    RasterOnly,
    /// Rasters and polygons, with every point on the merge grid: polygons are
    /// rasterized and points burned as presence.
    RasterizeVectors,
    /// Rasters, polygons and points beyond the merge grid: a polygon and
    /// point collection of extent presence.
    MixedVector,
    /// Rasters and points without polygons: points sampled from the merged
    /// raster.
    SampledPoints,
    /// No rasters: vector features merged directly.
    VectorOnly,
}

impl MosaicPlan {
    /// Container produced by this plan.
    #[must_use]
    pub const fn output_kind(self) -> OutputKind {
        match self {
            Self::RasterOnly | Self::RasterizeVectors => OutputKind::Raster,
            Self::MixedVector | Self::SampledPoints | Self::VectorOnly => OutputKind::Vector,
        }
    }
}

/// Inputs partitioned by kind, with the value type the mosaic resolves to.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// Value type of the output.
    pub effective_type: FimType,
    /// Raster observations in input order.
    pub rasters: Vec<RasterObservation>,
    /// Point and multipoint layers in input order.
    pub points: Vec<VectorObservation>,
    /// Polygon and multipolygon layers in input order.
    pub polygons: Vec<VectorObservation>,
}

impl Classification {
    /// Whether any polygon layer takes part.
    #[must_use]
    pub const fn has_polygons(&self) -> bool {
        !self.polygons.is_empty()
    }

    /// Point coordinates that neither the merge grid nor the clip boundary
    /// accounts for.
    ///
    /// A point off the grid but outside the boundary would be clipped away
    /// regardless, so only points inside the boundary (or anywhere when there
    /// is none) count as residual.
    #[must_use]
    pub fn residual_points(
        &self,
        grid: &GridGeometry,
        clip: Option<&ClipBoundary>,
    ) -> Vec<Coord<f64>> {
        self.points
            .iter()
            .flat_map(VectorObservation::features)
            .flat_map(crate::FloodFeature::point_coords)
            .filter(|coord| grid.cell_at(*coord).is_none())
            .filter(|coord| clip.is_none_or(|boundary| boundary.covers(*coord)))
            .collect()
    }

    /// Choose the plan given the merge grid, if rasters are present.
    #[must_use]
    pub fn plan(&self, grid: Option<&GridGeometry>, clip: Option<&ClipBoundary>) -> MosaicPlan {
        let Some(merge_grid) = grid.filter(|_| !self.rasters.is_empty()) else {
            return MosaicPlan::VectorOnly;
        };
        match (self.has_polygons(), self.points.is_empty()) {
            (false, true) => MosaicPlan::RasterOnly,
            (false, false) => MosaicPlan::SampledPoints,
            (true, true) => MosaicPlan::RasterizeVectors,
            (true, false) => {
                if self.residual_points(merge_grid, clip).is_empty() {
                    MosaicPlan::RasterizeVectors
                } else {
                    MosaicPlan::MixedVector
                }
            }
        }
    }
}

/// Validates projections and value types, then partitions observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryClassifier {
    requested: FimType,
    canonical_crs: Crs,
}

impl GeometryClassifier {
    /// Classifier for the requested output type and canonical projection.
    #[must_use]
    pub const fn new(requested: FimType, canonical_crs: Crs) -> Self {
        Self {
            requested,
            canonical_crs,
        }
    }

    /// Partition `observations`.
    ///
    /// Any polygon layer forces extent output; depth rasters and depth points
    /// are later cast to extent. Without polygons every observation must
    /// already carry the requested value type.
    ///
    /// # Errors
    /// - [`MosaicError::EmptyInput`] when `observations` is empty.
    /// - [`MosaicError::CrsMismatch`] for an observation outside the canonical
    ///   projection.
    /// - [`MosaicError::TypeMismatch`] for depth output with polygons present,
    ///   or for an observation of the wrong type without polygons.
    pub fn classify(
        &self,
        observations: Vec<FloodObservation>,
    ) -> Result<Classification, MosaicError> {
        if observations.is_empty() {
            return Err(MosaicError::EmptyInput);
        }
        for observation in &observations {
            if observation.crs() != self.canonical_crs {
                return Err(MosaicError::CrsMismatch {
                    source_id: observation.source_id().to_owned(),
                    expected: self.canonical_crs,
                    found: observation.crs(),
                });
            }
        }

        let polygon_source = observations.iter().find_map(|observation| match observation {
            FloodObservation::Vector(vector) if vector.kind().is_polygonal() => {
                Some(vector.source_id())
            }
            _ => None,
        });
        let effective_type = match polygon_source {
            Some(source_id) if self.requested == FimType::Depth => {
                return Err(MosaicError::TypeMismatch {
                    source_id: source_id.to_owned(),
                    expected: FimType::Depth,
                    found: FimType::Extent,
                });
            }
            Some(_) => FimType::Extent,
            None => {
                if let Some(stray) = observations
                    .iter()
                    .find(|observation| observation.fim_type() != self.requested)
                {
                    return Err(MosaicError::TypeMismatch {
                        source_id: stray.source_id().to_owned(),
                        expected: self.requested,
                        found: stray.fim_type(),
                    });
                }
                self.requested
            }
        };

        let mut classification = Classification {
            effective_type,
            rasters: Vec::new(),
            points: Vec::new(),
            polygons: Vec::new(),
        };
        for observation in observations {
            match observation {
                FloodObservation::Raster(raster) => classification.rasters.push(raster),
                FloodObservation::Vector(vector) if vector.kind().is_polygonal() => {
                    classification.polygons.push(vector);
                }
                FloodObservation::Vector(vector) => classification.points.push(vector),
            }
        }
        info!(
            "classified {} raster, {} point and {} polygon inputs as {effective_type}",
            classification.rasters.len(),
            classification.points.len(),
            classification.polygons.len(),
        );
        Ok(classification)
    }
}

/// Kind of `geometry`, rejecting anything outside the four vector kinds.
pub(crate) fn classify_geometry(
    geometry: &Geometry<f64>,
    source_id: &str,
) -> Result<GeometryKind, MosaicError> {
    GeometryKind::of(geometry).ok_or_else(|| MosaicError::UnsupportedGeometry {
        source_id: source_id.to_owned(),
        geometry: geometry_name(geometry).to_owned(),
    })
}
