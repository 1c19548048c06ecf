//! End-to-end merges and clips checked against exact expectations.

use floodmosaic_core::{
    ClipBoundary, Crs, FimType, GridGeometry, MosaicConfig, MosaicProduct, Mosaicker, PixelType,
    RasterObservation, Resolution,
};
use geo::{Area, BooleanOps, Coord, LineString, Polygon, Rect};
use rstest::{fixture, rstest};

const SIDE: usize = 32;

#[fixture]
fn grid() -> GridGeometry {
    let resolution = Resolution::square(1.0).expect("positive resolution");
    GridGeometry::new(Coord { x: 0.0, y: 32.0 }, resolution, SIDE, SIDE)
}

fn flooded_at(id: &str, grid: GridGeometry, col: usize, row: usize) -> RasterObservation {
    let mut pixels = vec![255.0; grid.pixel_count()];
    pixels[grid.index(col, row)] = 1.0;
    RasterObservation::new(id, FimType::Extent, Crs::default(), grid, 255.0, pixels)
        .expect("valid raster")
}

fn run(config: MosaicConfig, rasters: Vec<RasterObservation>, clip: Option<&ClipBoundary>) -> RasterObservation {
    let observations = rasters.into_iter().map(Into::into).collect();
    let product = Mosaicker::new(config)
        .expect("valid config")
        .run(observations, clip)
        .expect("mosaic");
    match product {
        MosaicProduct::Raster(raster) => raster,
        MosaicProduct::Vector(vector) => panic!("expected a raster, found {vector:?}"),
    }
}

#[rstest]
#[case(SIDE)]
#[case(7)]
fn two_single_cell_floods_merge_into_one_extent(grid: GridGeometry, #[case] window_size: usize) {
    let a = flooded_at("a", grid, 10, 10);
    let b = flooded_at("b", grid, 20, 20);
    let config = MosaicConfig::new(FimType::Extent).with_window_size(window_size);
    let merged = run(config, vec![a, b], None);

    assert_eq!(merged.grid(), &grid);
    assert_eq!(merged.pixel_type(), PixelType::UInt8);
    assert_eq!(merged.nodata(), 255.0);
    for (col, row) in (0..SIDE).flat_map(|row| (0..SIDE).map(move |col| (col, row))) {
        let expected = if (col, row) == (10, 10) || (col, row) == (20, 20) {
            Some(1.0)
        } else {
            None
        };
        assert_eq!(merged.valid_pixel(col, row), expected, "cell ({col}, {row})");
    }
}

/// A triangle with a square hole; the long edge runs between cell centres
/// and part of the triangle lies beyond the raster.
fn notched_triangle() -> Polygon<f64> {
    let exterior = LineString::from(vec![(10.0, 10.0), (90.5, 10.0), (10.0, 90.5), (10.0, 10.0)]);
    let hole = LineString::from(vec![(20.0, 20.0), (30.0, 20.0), (30.0, 30.0), (20.0, 30.0), (20.0, 20.0)]);
    Polygon::new(exterior, vec![hole])
}

#[rstest]
#[expect(
    clippy::float_arithmetic,
    clippy::cast_precision_loss,
    reason = "pixel counts are compared with an area"
)]
fn clipped_pixel_count_matches_the_intersection_area() {
    let resolution = Resolution::square(1.0).expect("positive resolution");
    let grid = GridGeometry::new(Coord { x: 0.0, y: 64.0 }, resolution, 64, 64);
    let pixels = vec![1.0; grid.pixel_count()];
    let full = RasterObservation::new("full", FimType::Depth, Crs::default(), grid, -9999.0, pixels)
        .expect("valid raster");
    let boundary = ClipBoundary::new(notched_triangle().into(), Crs::default()).expect("polygon boundary");

    let config = MosaicConfig::new(FimType::Depth).with_window_size(16);
    let clipped = run(config, vec![full], Some(&boundary));

    let extent = Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 64.0, y: 64.0 }).to_polygon();
    let area = notched_triangle().intersection(&extent).unsigned_area();
    let valid = clipped.valid_count() as f64;
    assert!(
        (valid - area).abs() <= 1.0,
        "{valid} valid pixels against an intersection area of {area}"
    );
    assert_eq!(clipped.valid_count(), 2438);
}
