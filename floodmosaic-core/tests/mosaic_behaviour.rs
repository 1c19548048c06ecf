#![expect(
    clippy::expect_used,
    reason = "behaviour tests use expect for readable failures"
)]

//! Behavioural tests for the mosaic pipeline using rstest-bdd.

use std::cell::RefCell;

use floodmosaic_core::test_support::{MemorySink, MemorySource};
use floodmosaic_core::{
    ClipBoundary, Crs, FimType, FloodFeature, FloodObservation, FloodValue, GeometryKind,
    GridGeometry, MosaicConfig, MosaicError, MosaicProduct, MosaicRequest, Mosaicker,
    ObservationDescriptor, OutputSpec, PipelineError, PixelType, RasterObservation, Resolution,
    VectorObservation,
};
use geo::{Coord, point, polygon};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

/// World state shared by mosaic scenarios.
#[derive(Debug, Default)]
struct MosaicWorld {
    observations: RefCell<Vec<FloodObservation>>,
    clip: RefCell<Option<ClipBoundary>>,
    sink: RefCell<MemorySink>,
    outcome: RefCell<Option<Result<MosaicProduct, MosaicError>>>,
    pipeline: RefCell<Option<Result<MosaicProduct, PipelineError>>>,
}

impl MosaicWorld {
    fn push(&self, observation: impl Into<FloodObservation>) {
        self.observations.borrow_mut().push(observation.into());
    }

    fn run(&self, fim_type: FimType) {
        let mosaicker = Mosaicker::new(MosaicConfig::new(fim_type)).expect("valid config");
        let observations = self.observations.borrow().clone();
        let result = mosaicker.run(observations, self.clip.borrow().as_ref());
        self.outcome.replace(Some(result));
    }

    fn raster(&self) -> RasterObservation {
        match self.outcome.borrow().as_ref().expect("mosaic has run") {
            Ok(MosaicProduct::Raster(raster)) => raster.clone(),
            other => panic!("expected a raster mosaic, found {other:?}"),
        }
    }
}

fn unit_grid(width: usize, height: usize) -> GridGeometry {
    let resolution = Resolution::square(1.0).expect("positive resolution");
    GridGeometry::new(Coord { x: 0.0, y: 4.0 }, resolution, width, height)
}

fn coarse_grid(origin: Coord<f64>) -> GridGeometry {
    let resolution = Resolution::square(10.0).expect("positive resolution");
    GridGeometry::new(origin, resolution, 2, 2)
}

#[fixture]
fn world() -> MosaicWorld {
    MosaicWorld::default()
}

#[given("an extent raster anchored at the origin")]
fn given_anchored_extent(world: &MosaicWorld) {
    let grid = coarse_grid(Coord { x: 0.0, y: 20.0 });
    let raster = RasterObservation::new("west", FimType::Extent, Crs::default(), grid, 255.0, vec![
        1.0, 0.0, 0.0, 0.0,
    ])
    .expect("valid raster");
    world.push(raster);
}

#[given("an extent raster offset by one pixel")]
fn given_offset_extent(world: &MosaicWorld) {
    let grid = coarse_grid(Coord { x: 10.0, y: 30.0 });
    let raster = RasterObservation::new("east", FimType::Extent, Crs::default(), grid, 255.0, vec![
        0.0, 0.0, 1.0, 255.0,
    ])
    .expect("valid raster");
    world.push(raster);
}

#[given("a depth raster anchored at the origin")]
fn given_depth_raster(world: &MosaicWorld) {
    let grid = unit_grid(4, 4);
    let pixels = (0..grid.pixel_count())
        .map(|index| if index < 4 { 2.0 } else { 0.0 })
        .collect();
    let raster = RasterObservation::new("depth", FimType::Depth, Crs::default(), grid, -9999.0, pixels)
        .expect("valid raster");
    world.push(raster);
}

#[given("a depth raster in geographic coordinates")]
fn given_geographic_raster(world: &MosaicWorld) {
    world.push(RasterObservation::filled("wgs84", FimType::Depth, Crs::WGS84, unit_grid(4, 4)));
}

#[given("a survey polygon over the lower left cells")]
fn given_survey(world: &MosaicWorld) {
    let square = polygon![(x: 0.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 2.0), (x: 0.0, y: 2.0)];
    let layer = VectorObservation::new(
        "survey",
        FimType::Extent,
        Crs::default(),
        GeometryKind::Polygon,
        vec![FloodFeature::new(square.into(), FloodValue::Extent(true))],
    )
    .expect("valid layer");
    world.push(layer);
}

#[given("a depth gauge far from the survey")]
fn given_gauge(world: &MosaicWorld) {
    let gauge = FloodFeature::new(point!(x: 90.0, y: 90.0).into(), FloodValue::Depth(1.5))
        .with_attribute("gauge", "USGS-01");
    let layer = VectorObservation::new(
        "gauges",
        FimType::Depth,
        Crs::default(),
        GeometryKind::Point,
        vec![gauge],
    )
    .expect("valid layer");
    world.push(layer);
}

#[given("a clip boundary around one cell centre")]
fn given_tight_clip(world: &MosaicWorld) {
    let square = polygon![(x: 1.4, y: 2.4), (x: 1.6, y: 2.4), (x: 1.6, y: 2.6), (x: 1.4, y: 2.6)];
    let boundary = ClipBoundary::new(square.into(), Crs::default()).expect("polygon boundary");
    world.clip.replace(Some(boundary));
}

#[given("a sink that rejects every write")]
fn given_rejecting_sink(world: &MosaicWorld) {
    world.sink.replace(MemorySink::rejecting());
}

#[when("the extent mosaic runs")]
fn when_extent_runs(world: &MosaicWorld) {
    world.run(FimType::Extent);
}

#[when("the depth mosaic runs")]
fn when_depth_runs(world: &MosaicWorld) {
    world.run(FimType::Depth);
}

#[when("the depth mosaic runs through the pipeline")]
fn when_pipeline_runs(world: &MosaicWorld) {
    let mut source = MemorySource::default();
    let mut inputs = Vec::new();
    for (index, observation) in world.observations.borrow().iter().enumerate() {
        let location = format!("input-{index}.tif");
        source = source.with_observation(&location, observation.clone());
        inputs.push(ObservationDescriptor::new(location));
    }
    let request = MosaicRequest {
        inputs,
        clip: None,
        output: OutputSpec::new("mosaic.tif"),
    };
    let mosaicker = Mosaicker::new(MosaicConfig::new(FimType::Depth)).expect("valid config");
    let result = mosaicker.mosaic(&request, &source, &*world.sink.borrow());
    world.pipeline.replace(Some(result));
}

#[then("the mosaic covers a three by three grid")]
fn then_union_grid(world: &MosaicWorld) {
    let raster = world.raster();
    assert_eq!((raster.grid().width(), raster.grid().height()), (3, 3));
    assert_eq!(raster.grid().origin(), Coord { x: 0.0, y: 30.0 });
}

#[then("two cells are flooded")]
fn then_two_flooded(world: &MosaicWorld) {
    let raster = world.raster();
    let flooded = raster.pixels().iter().filter(|value| **value == 1.0).count();
    assert_eq!(flooded, 2);
}

#[then("cells outside every input are nodata")]
fn then_outside_nodata(world: &MosaicWorld) {
    let raster = world.raster();
    assert_eq!(raster.pixel(0, 0), Some(FimType::EXTENT_NODATA));
    assert_eq!(raster.pixel(2, 2), Some(FimType::EXTENT_NODATA));
    assert_eq!(raster.valid_count(), 6);
}

#[then("the mosaic is an unsigned byte extent raster")]
fn then_byte_extent(world: &MosaicWorld) {
    let raster = world.raster();
    assert_eq!(raster.fim_type(), FimType::Extent);
    assert_eq!(raster.pixel_type(), PixelType::UInt8);
}

#[then("the surveyed cells are flooded")]
fn then_survey_flooded(world: &MosaicWorld) {
    let raster = world.raster();
    assert_eq!(raster.valid_pixel(0, 3), Some(1.0));
    assert_eq!(raster.valid_pixel(1, 2), Some(1.0));
    assert_eq!(raster.valid_pixel(3, 0), Some(1.0), "cast depth stays flooded");
    assert_eq!(raster.valid_pixel(3, 3), Some(0.0));
}

#[then("the mosaic is a mixed feature collection")]
fn then_mixed(world: &MosaicWorld) {
    let outcome = world.outcome.borrow();
    let Some(Ok(MosaicProduct::Vector(vector))) = outcome.as_ref() else {
        panic!("expected a vector mosaic, found {outcome:?}");
    };
    assert_eq!(vector.geometry_kinds(), [GeometryKind::Point, GeometryKind::Polygon]);
    assert_eq!(vector.layer_kind(), None);
}

#[then("every feature records flood presence")]
fn then_presence(world: &MosaicWorld) {
    let outcome = world.outcome.borrow();
    let Some(Ok(MosaicProduct::Vector(vector))) = outcome.as_ref() else {
        panic!("expected a vector mosaic, found {outcome:?}");
    };
    assert_eq!(vector.fim_type, FimType::Extent);
    assert!(
        vector
            .features
            .iter()
            .all(|feature| feature.value == FloodValue::Extent(true))
    );
}

#[then("the mosaic fails with a projection mismatch")]
fn then_crs_mismatch(world: &MosaicWorld) {
    let outcome = world.outcome.borrow();
    let Some(Err(MosaicError::CrsMismatch { source_id, .. })) = outcome.as_ref() else {
        panic!("expected a projection mismatch, found {outcome:?}");
    };
    assert_eq!(source_id, "wgs84");
}

#[then("exactly one cell holds a depth")]
fn then_single_cell(world: &MosaicWorld) {
    let raster = world.raster();
    assert_eq!(raster.valid_count(), 1);
    assert_eq!(raster.valid_pixel(0, 0), Some(0.0));
}

#[then("the mosaic fails to publish")]
fn then_publish_failed(world: &MosaicWorld) {
    let pipeline = world.pipeline.borrow();
    assert!(
        matches!(pipeline.as_ref(), Some(Err(PipelineError::Publish { .. }))),
        "expected a publish failure, found {pipeline:?}"
    );
}

#[then("nothing is published")]
fn then_nothing_published(world: &MosaicWorld) {
    assert!(world.sink.borrow().published().is_empty());
}

#[scenario(path = "tests/features/mosaic.feature", index = 0)]
fn offset_extent_rasters(world: MosaicWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/mosaic.feature", index = 1)]
fn polygon_forces_extent(world: MosaicWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/mosaic.feature", index = 2)]
fn depth_points_lose_depth(world: MosaicWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/mosaic.feature", index = 3)]
fn projection_mismatch(world: MosaicWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/mosaic.feature", index = 4)]
fn tight_clip_boundary(world: MosaicWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/mosaic.feature", index = 5)]
fn rejected_publish(world: MosaicWorld) {
    let _ = world;
}
