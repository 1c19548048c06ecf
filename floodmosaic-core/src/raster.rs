//! Raster grids and immutable raster observations.
//!
//! Grids are north-up: the origin is the top-left corner, columns grow
//! eastwards and rows grow southwards. Pixel sizes are stored as positive
//! numbers in both directions.
#![expect(
    clippy::float_arithmetic,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "grid geometry converts between cell indices and CRS coordinates"
)]

use geo::{Coord, Rect};

use crate::{Crs, FimType, MosaicError, PixelType};

/// Pixel spacing of a grid in CRS units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    x: f64,
    y: f64,
}

impl Resolution {
    /// Validate and construct a resolution.
    ///
    /// # Errors
    /// Returns [`MosaicError::GridMismatch`] when either component is not a
    /// finite, strictly positive number.
    pub fn new(x: f64, y: f64) -> Result<Self, MosaicError> {
        if !(x.is_finite() && y.is_finite() && x > 0.0 && y > 0.0) {
            return Err(MosaicError::grid(format!(
                "resolution must be positive, got ({x}, {y})"
            )));
        }
        Ok(Self { x, y })
    }

    /// Square resolution.
    ///
    /// # Errors
    /// See [`Resolution::new`].
    pub fn square(size: f64) -> Result<Self, MosaicError> {
        Self::new(size, size)
    }

    /// Horizontal pixel size.
    #[must_use]
    pub const fn x(self) -> f64 {
        self.x
    }

    /// Vertical pixel size.
    #[must_use]
    pub const fn y(self) -> f64 {
        self.y
    }

    /// Length of one pixel diagonal.
    #[must_use]
    pub fn diagonal(self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Equality within a relative tolerance of `1e-9`.
    #[must_use]
    pub fn approx_eq(self, other: Self) -> bool {
        let close = |a: f64, b: f64| (a - b).abs() <= 1e-9 * a.abs().max(b.abs());
        close(self.x, other.x) && close(self.y, other.y)
    }
}

/// Rectangular block of cells within a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// First column of the window.
    pub col_off: usize,
    /// First row of the window.
    pub row_off: usize,
    /// Number of columns.
    pub width: usize,
    /// Number of rows.
    pub height: usize,
}

impl Window {
    /// Number of cells covered.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.width * self.height
    }

    /// Whether the window covers no cells.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Absolute `(col, row)` pairs in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (self.row_off..self.row_off + self.height)
            .flat_map(move |row| (self.col_off..self.col_off + self.width).map(move |col| (col, row)))
    }
}

/// Georeferenced raster grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridGeometry {
    origin: Coord<f64>,
    resolution: Resolution,
    width: usize,
    height: usize,
}

impl GridGeometry {
    /// Construct a grid from its top-left corner, pixel size and dimensions.
    #[must_use]
    pub const fn new(origin: Coord<f64>, resolution: Resolution, width: usize, height: usize) -> Self {
        Self {
            origin,
            resolution,
            width,
            height,
        }
    }

    /// Top-left corner.
    #[must_use]
    pub const fn origin(&self) -> Coord<f64> {
        self.origin
    }

    /// Pixel size.
    #[must_use]
    pub const fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Number of columns.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Number of rows.
    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Total number of cells.
    #[must_use]
    pub const fn pixel_count(&self) -> usize {
        self.width.saturating_mul(self.height)
    }

    /// Spatial extent covered by the grid.
    #[must_use]
    pub fn bounds(&self) -> Rect<f64> {
        Rect::new(
            Coord {
                x: self.origin.x,
                y: self.origin.y - self.height as f64 * self.resolution.y,
            },
            Coord {
                x: self.origin.x + self.width as f64 * self.resolution.x,
                y: self.origin.y,
            },
        )
    }

    /// Centre of the cell at `(col, row)`.
    #[must_use]
    pub fn cell_center(&self, col: usize, row: usize) -> Coord<f64> {
        Coord {
            x: self.column_center(col),
            y: self.row_center(row),
        }
    }

    /// X coordinate of the centre of column `col`.
    #[must_use]
    pub fn column_center(&self, col: usize) -> f64 {
        self.origin.x + (col as f64 + 0.5) * self.resolution.x
    }

    /// Y coordinate of the centre of row `row`.
    #[must_use]
    pub fn row_center(&self, row: usize) -> f64 {
        self.origin.y - (row as f64 + 0.5) * self.resolution.y
    }

    /// Column containing `x`, if any.
    #[must_use]
    pub fn column_of(&self, x: f64) -> Option<usize> {
        let offset = (x - self.origin.x) / self.resolution.x;
        index_within(offset, self.width)
    }

    /// Row containing `y`, if any.
    #[must_use]
    pub fn row_of(&self, y: f64) -> Option<usize> {
        let offset = (self.origin.y - y) / self.resolution.y;
        index_within(offset, self.height)
    }

    /// Cell containing `coord`, if it lies on the grid.
    #[must_use]
    pub fn cell_at(&self, coord: Coord<f64>) -> Option<(usize, usize)> {
        Some((self.column_of(coord.x)?, self.row_of(coord.y)?))
    }

    /// Row-major index of `(col, row)`.
    #[must_use]
    pub const fn index(&self, col: usize, row: usize) -> usize {
        row * self.width + col
    }

    /// Windows of at most `edge × edge` cells tiling one band of rows.
    ///
    /// `band` selects which horizontal band (of height `edge`) to tile.
    #[must_use]
    pub fn band_windows(&self, edge: usize, band: usize) -> Vec<Window> {
        let step = edge.max(1);
        let row_off = band * step;
        if row_off >= self.height {
            return Vec::new();
        }
        let height = step.min(self.height - row_off);
        (0..self.width)
            .step_by(step)
            .map(|col_off| Window {
                col_off,
                row_off,
                width: step.min(self.width - col_off),
                height,
            })
            .collect()
    }

    /// Number of row bands of height `edge`.
    #[must_use]
    pub const fn band_count(&self, edge: usize) -> usize {
        let step = if edge == 0 { 1 } else { edge };
        self.height.div_ceil(step)
    }
}

fn index_within(offset: f64, limit: usize) -> Option<usize> {
    if !offset.is_finite() || offset < 0.0 {
        return None;
    }
    let index = offset.floor() as usize;
    (index < limit).then_some(index)
}

/// Whether `value` is an observation rather than nodata or NaN.
#[must_use]
#[expect(clippy::float_cmp, reason = "nodata sentinels are exact bit patterns")]
pub fn is_valid(value: f32, nodata: f32) -> bool {
    !value.is_nan() && value != nodata
}

/// Immutable single-band raster observation.
///
/// Pixels are stored as `f32` for both value types; extent rasters hold the
/// byte values `0`, `1` and their nodata sentinel.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterObservation {
    source_id: String,
    fim_type: FimType,
    crs: Crs,
    grid: GridGeometry,
    nodata: f32,
    pixels: Vec<f32>,
}

impl RasterObservation {
    /// Validate and construct a raster observation.
    ///
    /// `nodata` may differ from the canonical sentinel of `fim_type`; the
    /// aligner normalises it.
    ///
    /// # Errors
    /// Returns [`MosaicError::InvalidRaster`] when the buffer length does not
    /// equal `width × height` or the grid is empty.
    pub fn new(
        source_id: impl Into<String>,
        fim_type: FimType,
        crs: Crs,
        grid: GridGeometry,
        nodata: f32,
        pixels: Vec<f32>,
    ) -> Result<Self, MosaicError> {
        let id = source_id.into();
        if grid.pixel_count() == 0 {
            return Err(MosaicError::InvalidRaster {
                source_id: id,
                reason: "grid has no cells".to_owned(),
            });
        }
        if pixels.len() != grid.pixel_count() {
            return Err(MosaicError::InvalidRaster {
                reason: format!(
                    "expected {} pixels for a {}x{} grid, found {}",
                    grid.pixel_count(),
                    grid.width(),
                    grid.height(),
                    pixels.len()
                ),
                source_id: id,
            });
        }
        Ok(Self {
            source_id: id,
            fim_type,
            crs,
            grid,
            nodata,
            pixels,
        })
    }

    /// A raster of canonical nodata covering `grid`.
    #[must_use]
    pub fn filled(source_id: impl Into<String>, fim_type: FimType, crs: Crs, grid: GridGeometry) -> Self {
        Self {
            source_id: source_id.into(),
            fim_type,
            crs,
            nodata: fim_type.nodata(),
            pixels: vec![fim_type.nodata(); grid.pixel_count()],
            grid,
        }
    }

    /// Identifier of the source this raster came from.
    #[must_use]
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Value type.
    #[must_use]
    pub const fn fim_type(&self) -> FimType {
        self.fim_type
    }

    /// Storage type implied by the value type.
    #[must_use]
    pub const fn pixel_type(&self) -> PixelType {
        self.fim_type.pixel_type()
    }

    /// Projection.
    #[must_use]
    pub const fn crs(&self) -> Crs {
        self.crs
    }

    /// Grid geometry.
    #[must_use]
    pub const fn grid(&self) -> &GridGeometry {
        &self.grid
    }

    /// Nodata sentinel used by this raster's buffer.
    #[must_use]
    pub const fn nodata(&self) -> f32 {
        self.nodata
    }

    /// Row-major pixel buffer.
    #[must_use]
    pub fn pixels(&self) -> &[f32] {
        &self.pixels
    }

    /// Consume the raster, returning its buffer.
    #[must_use]
    pub fn into_pixels(self) -> Vec<f32> {
        self.pixels
    }

    /// Raw pixel at `(col, row)`.
    #[must_use]
    pub fn pixel(&self, col: usize, row: usize) -> Option<f32> {
        if col >= self.grid.width() {
            return None;
        }
        self.pixels.get(self.grid.index(col, row)).copied()
    }

    /// Valid value at `(col, row)`, ignoring nodata and NaN.
    #[must_use]
    pub fn valid_pixel(&self, col: usize, row: usize) -> Option<f32> {
        self.pixel(col, row).filter(|value| is_valid(*value, self.nodata))
    }

    /// Valid value of the cell containing `coord`.
    #[must_use]
    pub fn value_at(&self, coord: Coord<f64>) -> Option<f32> {
        let (col, row) = self.grid.cell_at(coord)?;
        self.valid_pixel(col, row)
    }

    /// Number of valid cells.
    #[must_use]
    pub fn valid_count(&self) -> usize {
        self.pixels
            .iter()
            .filter(|value| is_valid(**value, self.nodata))
            .count()
    }
}
