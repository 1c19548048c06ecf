//! Derivation of the common output grid.
#![expect(
    clippy::float_arithmetic,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "snapping extents onto a lattice is floating-point arithmetic"
)]

use geo::{Coord, Rect};
use log::debug;

use crate::{ClipBoundary, GridGeometry, MosaicError, RasterObservation, Resolution};

/// The canonical grid every participating raster is aligned to.
pub type MergeGrid = GridGeometry;

/// Slack allowed when snapping extents that already sit on the lattice.
const SNAP_EPSILON: f64 = 1e-9;

impl GridGeometry {
    /// Derive the merge grid for `rasters`.
    ///
    /// The grid covers the union of raster extents and `footprints` (the
    /// bounding boxes of vector layers burned onto the grid), intersected
    /// with the clip boundary's bounding box and snapped outward onto the
    /// lattice anchored at the first raster's origin. Without `target`,
    /// every raster must share one resolution.
    ///
    /// # Errors
    /// - [`MosaicError::GridMismatch`] when there are no rasters, when the
    ///   resolutions differ without a target, or when the clip boundary does
    ///   not overlap the inputs.
    /// - [`MosaicError::ExtentOverflow`] when the grid would hold more than
    ///   `max_pixels` cells.
    pub fn derive(
        rasters: &[RasterObservation],
        footprints: &[Rect<f64>],
        target: Option<Resolution>,
        clip: Option<&ClipBoundary>,
        max_pixels: u64,
    ) -> Result<Self, MosaicError> {
        let Some(first) = rasters.first() else {
            return Err(MosaicError::grid("no rasters to derive a grid from"));
        };
        let resolution = target.map_or_else(|| shared_resolution(rasters, first), Ok)?;

        let mut extent = rasters
            .iter()
            .map(|raster| raster.grid().bounds())
            .chain(footprints.iter().copied())
            .reduce(union)
            .unwrap_or_else(|| first.grid().bounds());
        if let Some(boundary) = clip {
            extent = boundary
                .bounds()
                .and_then(|bounds| intersection(extent, bounds))
                .ok_or_else(|| {
                    MosaicError::grid("clip boundary does not overlap the input rasters")
                })?;
        }

        let anchor = first.grid().origin();
        let (rx, ry) = (resolution.x(), resolution.y());
        let left = anchor.x + ((extent.min().x - anchor.x) / rx + SNAP_EPSILON).floor() * rx;
        let right = anchor.x + ((extent.max().x - anchor.x) / rx - SNAP_EPSILON).ceil() * rx;
        let top = anchor.y - ((anchor.y - extent.max().y) / ry + SNAP_EPSILON).floor() * ry;
        let bottom = anchor.y - ((anchor.y - extent.min().y) / ry - SNAP_EPSILON).ceil() * ry;

        let columns = ((right - left) / rx).round().max(1.0);
        let rows = ((top - bottom) / ry).round().max(1.0);
        let pixels = columns * rows;
        if pixels > max_pixels as f64 {
            return Err(MosaicError::ExtentOverflow {
                pixels: pixels as u64,
                max_pixels,
            });
        }

        let grid = Self::new(
            Coord { x: left, y: top },
            resolution,
            columns as usize,
            rows as usize,
        );
        debug!(
            "merge grid {}x{} at ({left}, {top}) with {rx}x{ry} pixels",
            grid.width(),
            grid.height()
        );
        Ok(grid)
    }
}

fn shared_resolution(
    rasters: &[RasterObservation],
    first: &RasterObservation,
) -> Result<Resolution, MosaicError> {
    let resolution = first.grid().resolution();
    if let Some(other) = rasters
        .iter()
        .find(|raster| !raster.grid().resolution().approx_eq(resolution))
    {
        let found = other.grid().resolution();
        return Err(MosaicError::grid(format!(
            "{} has resolution {}x{} but {} has {}x{}; pass a target resolution",
            other.source_id(),
            found.x(),
            found.y(),
            first.source_id(),
            resolution.x(),
            resolution.y(),
        )));
    }
    Ok(resolution)
}

pub(crate) fn union(a: Rect<f64>, b: Rect<f64>) -> Rect<f64> {
    Rect::new(
        Coord {
            x: a.min().x.min(b.min().x),
            y: a.min().y.min(b.min().y),
        },
        Coord {
            x: a.max().x.max(b.max().x),
            y: a.max().y.max(b.max().y),
        },
    )
}

fn intersection(a: Rect<f64>, b: Rect<f64>) -> Option<Rect<f64>> {
    let min = Coord {
        x: a.min().x.max(b.min().x),
        y: a.min().y.max(b.min().y),
    };
    let max = Coord {
        x: a.max().x.min(b.max().x),
        y: a.max().y.min(b.max().y),
    };
    (min.x < max.x && min.y < max.y).then(|| Rect::new(min, max))
}
