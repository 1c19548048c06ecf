//! Window readers that present every contributor on the merge grid.
//!
//! Nothing here materialises a full aligned copy: the reducer asks each
//! [`WindowSource`] for one window at a time, and each source resamples,
//! rasterizes or burns only the cells it is asked for.

use geo::{BoundingRect, Coord, Intersects, Point, Polygon};
use rstar::{AABB, RTree, RTreeObject};

use crate::cast::cast_depth_cell;
use crate::{FimType, GridGeometry, MosaicError, RasterObservation, VectorObservation, Window};

/// Anything that can fill a window of the merge grid.
///
/// Implementations emit the canonical nodata sentinel of their output type
/// wherever they hold no observation.
pub trait WindowSource: Sync {
    /// Identifier used in diagnostics.
    fn source_id(&self) -> &str;

    /// Row-major values for `window` of `grid`.
    ///
    /// # Errors
    /// Implementations may fail when the window lies outside the grid they
    /// were built for.
    fn read_window(&self, grid: &GridGeometry, window: Window) -> Result<Vec<f32>, MosaicError>;
}

fn check_window(grid: &GridGeometry, window: Window, source_id: &str) -> Result<(), MosaicError> {
    if window.col_off + window.width > grid.width() || window.row_off + window.height > grid.height()
    {
        return Err(MosaicError::grid(format!(
            "window {window:?} of {source_id} exceeds the {}x{} merge grid",
            grid.width(),
            grid.height()
        )));
    }
    Ok(())
}

/// Nearest-neighbour resampler of one raster onto the merge grid.
///
/// Source sentinels and NaN become the canonical nodata of the output type.
/// A depth raster aligned for extent output is cast cell by cell.
#[derive(Debug)]
pub struct RasterAligner<'a> {
    raster: &'a RasterObservation,
    output: FimType,
    columns: Vec<Option<usize>>,
    rows: Vec<Option<usize>>,
}

impl<'a> RasterAligner<'a> {
    /// Prepare the column and row lookups from `grid` into `raster`.
    ///
    /// # Errors
    /// Returns [`MosaicError::TypeMismatch`] when asked to present an extent
    /// raster as depth.
    pub fn new(
        raster: &'a RasterObservation,
        grid: &GridGeometry,
        output: FimType,
    ) -> Result<Self, MosaicError> {
        if raster.fim_type() == FimType::Extent && output == FimType::Depth {
            return Err(MosaicError::TypeMismatch {
                source_id: raster.source_id().to_owned(),
                expected: FimType::Depth,
                found: FimType::Extent,
            });
        }
        let source = raster.grid();
        let columns = (0..grid.width())
            .map(|col| source.column_of(grid.column_center(col)))
            .collect();
        let rows = (0..grid.height())
            .map(|row| source.row_of(grid.row_center(row)))
            .collect();
        Ok(Self {
            raster,
            output,
            columns,
            rows,
        })
    }

    fn sample(&self, col: usize, row: usize) -> f32 {
        let value = self
            .columns
            .get(col)
            .copied()
            .flatten()
            .zip(self.rows.get(row).copied().flatten())
            .and_then(|(src_col, src_row)| self.raster.valid_pixel(src_col, src_row));
        match (value, self.raster.fim_type(), self.output) {
            (None, _, output) => output.nodata(),
            (Some(depth), FimType::Depth, FimType::Extent) => cast_depth_cell(depth, FimType::DEPTH_NODATA),
            (Some(value), _, _) => value,
        }
    }
}

impl WindowSource for RasterAligner<'_> {
    fn source_id(&self) -> &str {
        self.raster.source_id()
    }

    fn read_window(&self, grid: &GridGeometry, window: Window) -> Result<Vec<f32>, MosaicError> {
        check_window(grid, window, self.source_id())?;
        Ok(window.cells().map(|(col, row)| self.sample(col, row)).collect())
    }
}

struct IndexedPolygon {
    envelope: AABB<[f64; 2]>,
    index: usize,
}

impl RTreeObject for IndexedPolygon {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Burns polygon coverage as extent presence.
///
/// A cell is flooded when any polygon covers its centre, boundary included.
/// Uncovered cells are nodata, never dry.
pub struct PolygonRasterizer {
    source_id: String,
    polygons: Vec<Polygon<f64>>,
    index: RTree<IndexedPolygon>,
}

impl PolygonRasterizer {
    /// Index every polygon of the given layers.
    #[must_use]
    pub fn new(layers: &[VectorObservation]) -> Self {
        let polygons: Vec<Polygon<f64>> = layers
            .iter()
            .flat_map(VectorObservation::features)
            .flat_map(|feature| match &feature.geometry {
                geo::Geometry::Polygon(polygon) => vec![polygon.clone()],
                geo::Geometry::MultiPolygon(multi) => multi.0.clone(),
                _ => Vec::new(),
            })
            .collect();
        let entries = polygons
            .iter()
            .enumerate()
            .filter_map(|(index, polygon)| {
                polygon.bounding_rect().map(|rect| IndexedPolygon {
                    envelope: AABB::from_corners(
                        [rect.min().x, rect.min().y],
                        [rect.max().x, rect.max().y],
                    ),
                    index,
                })
            })
            .collect();
        let source_id = layers
            .iter()
            .map(VectorObservation::source_id)
            .collect::<Vec<_>>()
            .join("+");
        Self {
            source_id,
            polygons,
            index: RTree::bulk_load(entries),
        }
    }

    /// Whether any polygon covers `coord`.
    #[must_use]
    pub fn covers(&self, coord: Coord<f64>) -> bool {
        let point = Point::from(coord);
        self.index
            .locate_in_envelope_intersecting(&AABB::from_point([coord.x, coord.y]))
            .filter_map(|entry| self.polygons.get(entry.index))
            .any(|polygon| polygon.intersects(&point))
    }
}

impl WindowSource for PolygonRasterizer {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn read_window(&self, grid: &GridGeometry, window: Window) -> Result<Vec<f32>, MosaicError> {
        check_window(grid, window, &self.source_id)?;
        Ok(window
            .cells()
            .map(|(col, row)| {
                if self.covers(grid.cell_center(col, row)) {
                    1.0
                } else {
                    FimType::EXTENT_NODATA
                }
            })
            .collect())
    }
}

/// Burns point locations as extent presence.
///
/// The cell containing each point is flooded; all other cells are nodata.
pub struct PointBurner {
    source_id: String,
    flooded: Vec<usize>,
}

impl PointBurner {
    /// Locate every point of the given layers on `grid`; off-grid points are
    /// ignored.
    #[must_use]
    pub fn new(layers: &[VectorObservation], grid: &GridGeometry) -> Self {
        let mut flooded: Vec<usize> = layers
            .iter()
            .flat_map(VectorObservation::features)
            .flat_map(crate::FloodFeature::point_coords)
            .filter_map(|coord| grid.cell_at(coord))
            .map(|(col, row)| grid.index(col, row))
            .collect();
        flooded.sort_unstable();
        flooded.dedup();
        let source_id = layers
            .iter()
            .map(VectorObservation::source_id)
            .collect::<Vec<_>>()
            .join("+");
        Self { source_id, flooded }
    }

    /// Number of distinct cells burned.
    #[must_use]
    pub const fn burned_cells(&self) -> usize {
        self.flooded.len()
    }
}

impl WindowSource for PointBurner {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn read_window(&self, grid: &GridGeometry, window: Window) -> Result<Vec<f32>, MosaicError> {
        check_window(grid, window, &self.source_id)?;
        Ok(window
            .cells()
            .map(|(col, row)| {
                if self.flooded.binary_search(&grid.index(col, row)).is_ok() {
                    1.0
                } else {
                    FimType::EXTENT_NODATA
                }
            })
            .collect())
    }
}
