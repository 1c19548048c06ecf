#![expect(
    clippy::expect_used,
    reason = "behaviour tests use expect for readable failures"
)]

//! Behavioural tests for publishing mosaics through the file system.

use std::cell::RefCell;
use std::fs::File;

use camino::Utf8PathBuf;
use floodmosaic_core::{
    Crs, FimType, FloodObservation, GridGeometry, MosaicConfig, MosaicProduct, MosaicRequest,
    Mosaicker, ObservationDescriptor, OutputSpec, PipelineError, RasterObservation, Resolution,
};
use floodmosaic_io::{FsSink, FsSource, RetryPolicy, fs, geotiff};
use geo::Coord;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tempfile::TempDir;
use tiff::ColorType;
use tiff::decoder::Decoder;

/// World state shared by publishing scenarios.
struct PublishWorld {
    _dir: TempDir,
    root: Utf8PathBuf,
    inputs: RefCell<Vec<ObservationDescriptor>>,
    clip: RefCell<Option<ObservationDescriptor>>,
    output: RefCell<Option<Utf8PathBuf>>,
    result: RefCell<Option<Result<MosaicProduct, PipelineError>>>,
}

impl PublishWorld {
    fn publish(&self, output: Utf8PathBuf) {
        let request = MosaicRequest {
            inputs: self.inputs.borrow().clone(),
            clip: self.clip.borrow().clone(),
            output: OutputSpec::new(output.as_str()),
        };
        let mosaicker = Mosaicker::new(MosaicConfig::new(FimType::Extent)).expect("valid config");
        let source = FsSource::default().with_retry(RetryPolicy::none());
        let result = mosaicker.mosaic(&request, &source, &FsSink::new(RetryPolicy::none()));
        self.output.replace(Some(output));
        self.result.replace(Some(result));
    }

    fn output(&self) -> Utf8PathBuf {
        self.output.borrow().clone().expect("mosaic was published")
    }
}

#[fixture]
fn world() -> PublishWorld {
    let dir = TempDir::new().expect("tempdir");
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 tempdir");
    PublishWorld {
        _dir: dir,
        root,
        inputs: RefCell::new(Vec::new()),
        clip: RefCell::new(None),
        output: RefCell::new(None),
        result: RefCell::new(None),
    }
}

#[given("an extent raster file covering four cells")]
fn given_extent_file(world: &PublishWorld) {
    let path = world.root.join("flood.tif");
    let resolution = Resolution::square(1.0).expect("positive resolution");
    let grid = GridGeometry::new(Coord { x: 0.0, y: 2.0 }, resolution, 2, 2);
    let raster = RasterObservation::new("flood", FimType::Extent, Crs::default(), grid, 255.0, vec![
        1.0, 0.0, 1.0, 1.0,
    ])
    .expect("valid raster");
    let file = File::create(&path).expect("create raster file");
    geotiff::encode_raster(&raster, file, false).expect("encode raster");
    world
        .inputs
        .borrow_mut()
        .push(ObservationDescriptor::new(path.as_str()));
}

#[given("a clip boundary file around the western column")]
fn given_western_boundary(world: &PublishWorld) {
    let path = world.root.join("clip.json");
    std::fs::write(
        &path,
        r#"{
            "layer_type": "polygon",
            "fim_type": "extent",
            "crs": 5070,
            "features": [
                { "geometry": { "Polygon": { "exterior": [
                    {"x": 0.1, "y": 0.1}, {"x": 0.9, "y": 0.1}, {"x": 0.9, "y": 1.9},
                    {"x": 0.1, "y": 1.9}, {"x": 0.1, "y": 0.1}
                  ], "interiors": [] } }, "value": true }
            ]
        }"#,
    )
    .expect("write boundary");
    world
        .clip
        .replace(Some(ObservationDescriptor::new(path.as_str())));
}

#[when("the mosaic is published to a GeoTIFF")]
fn when_published(world: &PublishWorld) {
    world.publish(world.root.join("out/mosaic.tif"));
}

#[when("the mosaic is published beneath a regular file")]
fn when_published_beneath_file(world: &PublishWorld) {
    let blocker = world.root.join("blocker");
    std::fs::write(&blocker, b"not a directory").expect("write blocker");
    world.publish(blocker.join("mosaic.tif"));
}

#[then("the published raster stores unsigned bytes")]
fn then_unsigned_bytes(world: &PublishWorld) {
    let result = world.result.borrow();
    let product = result
        .as_ref()
        .expect("mosaic has run")
        .as_ref()
        .expect("publish succeeds");
    assert!(matches!(product, MosaicProduct::Raster(_)));
    let file = File::open(world.output()).expect("open output");
    let mut decoder = Decoder::new(file).expect("tiff header");
    assert_eq!(decoder.colortype().expect("colour type"), ColorType::Gray(8));
}

#[then("the published grid shrinks to the western column")]
fn then_western_column(world: &PublishWorld) {
    let observation = FsSource::default()
        .read(&world.output())
        .expect("read published raster");
    let FloodObservation::Raster(raster) = observation else {
        panic!("expected a raster");
    };
    assert_eq!(raster.grid().width(), 1);
    assert_eq!(raster.grid().height(), 2);
    assert_eq!(raster.pixels(), [1.0, 1.0]);
}

#[then("publishing fails")]
fn then_publishing_fails(world: &PublishWorld) {
    let result = world.result.borrow();
    assert!(matches!(
        result.as_ref().expect("mosaic has run"),
        Err(PipelineError::Publish { .. })
    ));
}

#[then("no output file exists")]
fn then_no_output(world: &PublishWorld) {
    assert!(!world.output().exists());
    assert!(fs::is_file(&world.root.join("blocker")).expect("inspect blocker"));
}

#[scenario(path = "tests/features/publish.feature", index = 0)]
fn clipped_extent_is_written(world: PublishWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/publish.feature", index = 1)]
fn unreachable_destination_leaves_nothing(world: PublishWorld) {
    let _ = world;
}
