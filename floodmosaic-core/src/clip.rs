//! Trimming mosaics to an optional boundary.

use geo::{BooleanOps, Geometry, MultiPoint, Point};

use crate::{ClipBoundary, FloodFeature, GridGeometry, Window};

/// Masks rasters and trims features to a boundary; a no-op without one.
#[derive(Debug, Clone, Copy)]
pub struct Clipper<'a> {
    boundary: Option<&'a ClipBoundary>,
}

impl<'a> Clipper<'a> {
    /// Clipper for an optional boundary.
    #[must_use]
    pub const fn new(boundary: Option<&'a ClipBoundary>) -> Self {
        Self { boundary }
    }

    /// Whether a boundary is set.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.boundary.is_some()
    }

    /// Set cells of `window` whose centre lies outside the boundary to
    /// `nodata`.
    pub fn mask_window(&self, grid: &GridGeometry, window: Window, values: &mut [f32], nodata: f32) {
        let Some(boundary) = self.boundary else {
            return;
        };
        for ((col, row), value) in window.cells().zip(values.iter_mut()) {
            if !boundary.covers(grid.cell_center(col, row)) {
                *value = nodata;
            }
        }
    }

    /// Keep covered points and replace polygons by their intersection with
    /// the boundary, dropping features left empty.
    #[must_use]
    pub fn clip_features(&self, features: Vec<FloodFeature>) -> Vec<FloodFeature> {
        let Some(boundary) = self.boundary else {
            return features;
        };
        features
            .into_iter()
            .filter_map(|feature| {
                clip_geometry(boundary, &feature.geometry).map(|geometry| FloodFeature {
                    geometry,
                    ..feature
                })
            })
            .collect()
    }
}

fn clip_geometry(boundary: &ClipBoundary, geometry: &Geometry<f64>) -> Option<Geometry<f64>> {
    match geometry {
        Geometry::Point(point) => boundary.covers(point.0).then_some(Geometry::Point(*point)),
        Geometry::MultiPoint(points) => {
            let kept: Vec<Point<f64>> = points
                .iter()
                .filter(|point| boundary.covers(point.0))
                .copied()
                .collect();
            (!kept.is_empty()).then(|| Geometry::MultiPoint(MultiPoint::new(kept)))
        }
        Geometry::Polygon(polygon) => polygonal(polygon.intersection(boundary.area())),
        Geometry::MultiPolygon(polygons) => polygonal(polygons.intersection(boundary.area())),
        _ => None,
    }
}

fn polygonal(mut clipped: geo::MultiPolygon<f64>) -> Option<Geometry<f64>> {
    match clipped.0.len() {
        0 => None,
        1 => clipped.0.pop().map(Geometry::Polygon),
        _ => Some(Geometry::MultiPolygon(clipped)),
    }
}
