//! The orchestrator: classify, cast, align, reduce, sample, clip.

use std::collections::BTreeSet;

use log::info;

use crate::align::{PointBurner, PolygonRasterizer, RasterAligner, WindowSource};
use crate::cast::{PolygonPresencePolicy, VectorCaster, ensure_castable, flooded_runs};
use crate::{
    Classification, ClipBoundary, Clipper, Crs, FimType, FloodFeature, FloodObservation,
    GeometryClassifier, GeometryKind, GridGeometry, MergeGrid, MosaicConfig, MosaicError,
    MosaicPlan, MosaicRequest, MosaicSink, NanAwareReducer, ObservationSource, OutputKind,
    PipelineError, PointSampler, RasterObservation, TilePlan, VectorObservation,
};

/// Source identifier carried by merged rasters.
pub const MOSAIC_SOURCE_ID: &str = "mosaic";

/// Merged vector features sharing one value type.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorMosaic {
    /// Value type of every feature.
    pub fim_type: FimType,
    /// Projection.
    pub crs: Crs,
    /// Polygons first, then merged points.
    pub features: Vec<FloodFeature>,
}

impl VectorMosaic {
    /// Distinct geometry kinds present, in kind order.
    #[must_use]
    pub fn geometry_kinds(&self) -> Vec<GeometryKind> {
        self.features
            .iter()
            .filter_map(FloodFeature::kind)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// The single kind present, or `None` for empty or mixed collections.
    #[must_use]
    pub fn layer_kind(&self) -> Option<GeometryKind> {
        match self.geometry_kinds().as_slice() {
            [kind] => Some(*kind),
            _ => None,
        }
    }
}

/// Result of one mosaic invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum MosaicProduct {
    /// A merged raster on the merge grid.
    Raster(RasterObservation),
    /// A merged feature collection.
    Vector(VectorMosaic),
}

impl MosaicProduct {
    /// Container kind.
    #[must_use]
    pub const fn output_kind(&self) -> OutputKind {
        match self {
            Self::Raster(_) => OutputKind::Raster,
            Self::Vector(_) => OutputKind::Vector,
        }
    }

    /// Value type of the product.
    #[must_use]
    pub const fn fim_type(&self) -> FimType {
        match self {
            Self::Raster(raster) => raster.fim_type(),
            Self::Vector(vector) => vector.fim_type,
        }
    }
}

/// Runs the mosaic pipeline under one configuration.
///
/// # Examples
///
/// ```
/// use floodmosaic_core::{
///     Crs, FimType, GridGeometry, MosaicConfig, MosaicProduct, Mosaicker, RasterObservation,
///     Resolution,
/// };
/// use geo::Coord;
///
/// let grid = GridGeometry::new(
///     Coord { x: 0.0, y: 2.0 },
///     Resolution::square(1.0).expect("positive resolution"),
///     2,
///     2,
/// );
/// let a = RasterObservation::new("a", FimType::Extent, Crs::default(), grid, 255.0, vec![1.0, 255.0, 0.0, 255.0])
///     .expect("valid raster");
/// let b = RasterObservation::new("b", FimType::Extent, Crs::default(), grid, 255.0, vec![0.0, 1.0, 255.0, 255.0])
///     .expect("valid raster");
///
/// let mosaicker = Mosaicker::new(MosaicConfig::new(FimType::Extent)).expect("valid config");
/// let product = mosaicker.run(vec![a.into(), b.into()], None).expect("mosaic");
/// let MosaicProduct::Raster(raster) = product else { panic!("expected a raster") };
/// assert_eq!(raster.pixels(), &[1.0, 1.0, 0.0, 255.0]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Mosaicker {
    config: MosaicConfig,
}

impl Mosaicker {
    /// Validate `config` and build a mosaicker.
    ///
    /// # Errors
    /// Returns [`MosaicError::InvalidConfig`] for out-of-range settings.
    pub fn new(config: MosaicConfig) -> Result<Self, MosaicError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &MosaicConfig {
        &self.config
    }

    /// Merge `observations` in memory.
    ///
    /// # Errors
    /// Any [`MosaicError`] raised while classifying, casting, deriving the
    /// grid or reducing. No partial product is returned.
    pub fn run(
        &self,
        observations: Vec<FloodObservation>,
        clip: Option<&ClipBoundary>,
    ) -> Result<MosaicProduct, MosaicError> {
        if let Some(boundary) = clip
            && boundary.crs() != self.config.canonical_crs
        {
            return Err(MosaicError::CrsMismatch {
                source_id: ClipBoundary::SOURCE_ID.to_owned(),
                expected: self.config.canonical_crs,
                found: boundary.crs(),
            });
        }

        let classifier = GeometryClassifier::new(self.config.fim_type, self.config.canonical_crs);
        let classification = cast_vectors(classifier.classify(observations)?)?;
        let grid = if classification.rasters.is_empty() {
            None
        } else {
            let footprints: Vec<_> = classification
                .polygons
                .iter()
                .filter_map(VectorObservation::bounds)
                .collect();
            Some(MergeGrid::derive(
                &classification.rasters,
                &footprints,
                self.config.target_resolution,
                clip,
                self.config.pixel_ceiling(),
            )?)
        };
        let plan = classification.plan(grid.as_ref(), clip);
        info!("mosaic plan: {plan:?}");
        let clipper = Clipper::new(clip);

        let Some(merge_grid) = grid else {
            return Ok(MosaicProduct::Vector(self.merge_vectors(&classification, Vec::new(), &clipper)));
        };
        let product = match plan {
            MosaicPlan::RasterOnly => {
                MosaicProduct::Raster(self.reduce(&classification, &merge_grid, false, &clipper)?)
            }
            MosaicPlan::RasterizeVectors => {
                MosaicProduct::Raster(self.reduce(&classification, &merge_grid, true, &clipper)?)
            }
            MosaicPlan::SampledPoints => {
                let merged = self.reduce(&classification, &merge_grid, false, &clipper)?;
                MosaicProduct::Vector(self.sample_points(&classification, &merged, &clipper))
            }
            MosaicPlan::MixedVector => {
                let merged = self.reduce(&classification, &merge_grid, false, &clipper)?;
                let runs = flooded_runs(&merged);
                MosaicProduct::Vector(self.merge_vectors(&classification, runs, &clipper))
            }
            MosaicPlan::VectorOnly => {
                MosaicProduct::Vector(self.merge_vectors(&classification, Vec::new(), &clipper))
            }
        };
        Ok(product)
    }

    /// Load, merge and publish one request.
    ///
    /// Loading stops at the first failure and nothing is published unless
    /// the whole mosaic succeeds.
    ///
    /// # Errors
    /// [`PipelineError::Load`] and [`PipelineError::Publish`] from the
    /// collaborators, [`PipelineError::Mosaic`] from the engine.
    pub fn mosaic<S, K>(
        &self,
        request: &MosaicRequest,
        source: &S,
        sink: &K,
    ) -> Result<MosaicProduct, PipelineError>
    where
        S: ObservationSource + ?Sized,
        K: MosaicSink + ?Sized,
    {
        info!("loading {} observations", request.inputs.len());
        let observations = request
            .inputs
            .iter()
            .map(|descriptor| source.load(descriptor))
            .collect::<Result<Vec<_>, _>>()?;
        let boundary = request
            .clip
            .as_ref()
            .map(|descriptor| source.load_boundary(descriptor))
            .transpose()?;

        let product = self.run(observations, boundary.as_ref())?;
        sink.publish(&product, &request.output)?;
        info!(
            "published {} {:?} mosaic to {}",
            product.fim_type(),
            product.output_kind(),
            request.output.location
        );
        Ok(product)
    }

    fn reduce(
        &self,
        classification: &Classification,
        grid: &GridGeometry,
        burn_vectors: bool,
        clipper: &Clipper<'_>,
    ) -> Result<RasterObservation, MosaicError> {
        let fim_type = classification.effective_type;
        let aligners = classification
            .rasters
            .iter()
            .map(|raster| RasterAligner::new(raster, grid, fim_type))
            .collect::<Result<Vec<_>, _>>()?;
        let rasterizer = (burn_vectors && classification.has_polygons())
            .then(|| PolygonRasterizer::new(&classification.polygons));
        let burner = (burn_vectors && !classification.points.is_empty())
            .then(|| PointBurner::new(&classification.points, grid));

        let mut sources: Vec<&dyn WindowSource> = aligners
            .iter()
            .map(|aligner| aligner as &dyn WindowSource)
            .collect();
        if let Some(polygons) = &rasterizer {
            sources.push(polygons);
        }
        if let Some(points) = &burner {
            sources.push(points);
        }

        let plan = TilePlan::from_budget(
            self.config.cache_budget,
            self.config.window_size,
            sources.len(),
        );
        let pixels = NanAwareReducer::new(fim_type, plan).reduce(grid, &sources, clipper)?;
        RasterObservation::new(
            MOSAIC_SOURCE_ID,
            fim_type,
            self.config.canonical_crs,
            *grid,
            fim_type.nodata(),
            pixels,
        )
    }

    fn sample_points(
        &self,
        classification: &Classification,
        merged: &RasterObservation,
        clipper: &Clipper<'_>,
    ) -> VectorMosaic {
        let points = VectorCaster::new(self.config.point_tolerance).merge_layers(&classification.points);
        let sampler = self
            .config
            .sample_radius
            .map_or_else(|| PointSampler::for_raster(merged), PointSampler::new);
        let (sampled, dropped) = sampler.apply(merged, points);
        info!("sampled {} points, dropped {dropped}", sampled.len());
        VectorMosaic {
            fim_type: classification.effective_type,
            crs: self.config.canonical_crs,
            features: clipper.clip_features(sampled),
        }
    }

    fn merge_vectors(
        &self,
        classification: &Classification,
        extra_polygons: Vec<FloodFeature>,
        clipper: &Clipper<'_>,
    ) -> VectorMosaic {
        let mut features: Vec<FloodFeature> = classification
            .polygons
            .iter()
            .flat_map(|layer| layer.features().iter().cloned())
            .collect();
        features.extend(extra_polygons);
        features.extend(
            VectorCaster::new(self.config.point_tolerance).merge_layers(&classification.points),
        );
        VectorMosaic {
            fim_type: classification.effective_type,
            crs: self.config.canonical_crs,
            features: clipper.clip_features(features),
        }
    }
}

/// Apply the presence policy and check every cast layer.
fn cast_vectors(mut classification: Classification) -> Result<Classification, MosaicError> {
    let policy = PolygonPresencePolicy::new(classification.has_polygons());
    if policy.is_active() {
        info!("polygons present: vector values cast to extent presence");
    }
    classification.points = std::mem::take(&mut classification.points)
        .into_iter()
        .map(|layer| policy.apply(layer))
        .collect();
    classification.polygons = std::mem::take(&mut classification.polygons)
        .into_iter()
        .map(|layer| policy.apply(layer))
        .collect();
    for layer in classification.points.iter().chain(&classification.polygons) {
        ensure_castable(layer.features(), layer.source_id())?;
    }
    Ok(classification)
}
