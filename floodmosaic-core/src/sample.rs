//! Buffered sampling of a merged raster at point locations.
#![expect(
    clippy::float_arithmetic,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "buffers are measured in CRS units around cell centres"
)]

use geo::{Coord, Geometry};
use log::warn;

use crate::cast::merge_value;
use crate::{FimType, FloodFeature, FloodValue, RasterObservation};

/// Value derived for one point from the cells around it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointSample {
    /// Index of the sampled feature.
    pub feature: usize,
    /// Mean depth, or flooded when the mean extent is at least one half.
    pub value: FloodValue,
    /// Number of valid cells inside the buffer.
    pub cells: usize,
}

/// Averages valid raster cells whose centres lie within a circular buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointSampler {
    radius: f64,
}

impl PointSampler {
    /// Sampler with an explicit buffer radius.
    #[must_use]
    pub const fn new(radius: f64) -> Self {
        Self { radius }
    }

    /// Sampler whose radius is one pixel diagonal of `raster`.
    #[must_use]
    pub fn for_raster(raster: &RasterObservation) -> Self {
        Self::new(raster.grid().resolution().diagonal())
    }

    /// Buffer radius in CRS units.
    #[must_use]
    pub const fn radius(&self) -> f64 {
        self.radius
    }

    /// Sample `raster` at every point feature.
    ///
    /// Points whose buffer holds no valid cell yield no sample. Non-point
    /// features are skipped.
    #[must_use]
    pub fn sample(&self, raster: &RasterObservation, features: &[FloodFeature]) -> Vec<PointSample> {
        features
            .iter()
            .enumerate()
            .filter_map(|(index, feature)| match &feature.geometry {
                Geometry::Point(point) => self.sample_at(raster, point.0).map(|(value, cells)| {
                    PointSample {
                        feature: index,
                        value,
                        cells,
                    }
                }),
                _ => None,
            })
            .collect()
    }

    fn sample_at(&self, raster: &RasterObservation, centre: Coord<f64>) -> Option<(FloodValue, usize)> {
        let grid = raster.grid();
        let resolution = grid.resolution();
        let origin = grid.origin();
        let first_col = ((centre.x - self.radius - origin.x) / resolution.x()).floor().max(0.0) as usize;
        let last_col = ((centre.x + self.radius - origin.x) / resolution.x()).ceil().max(0.0) as usize;
        let first_row = ((origin.y - centre.y - self.radius) / resolution.y()).floor().max(0.0) as usize;
        let last_row = ((origin.y - centre.y + self.radius) / resolution.y()).ceil().max(0.0) as usize;

        let mut sum = 0.0_f64;
        let mut cells = 0_usize;
        for row in first_row..last_row.min(grid.height()) {
            for col in first_col..last_col.min(grid.width()) {
                let cell = grid.cell_center(col, row);
                if (cell.x - centre.x).hypot(cell.y - centre.y) > self.radius {
                    continue;
                }
                if let Some(value) = raster.valid_pixel(col, row) {
                    sum += f64::from(value);
                    cells += 1;
                }
            }
        }
        if cells == 0 {
            return None;
        }
        let mean = sum / cells as f64;
        let value = match raster.fim_type() {
            FimType::Depth => FloodValue::Depth(mean),
            FimType::Extent => FloodValue::Extent(mean >= 0.5),
        };
        Some((value, cells))
    }

    /// Merge samples into the features they were taken from.
    ///
    /// Each sampled feature keeps the greater of its own value and the
    /// sample; attributes stay those of the feature. Points without a valid
    /// cell in their buffer are dropped. Returns the kept features and the
    /// number dropped.
    #[must_use]
    pub fn apply(
        &self,
        raster: &RasterObservation,
        features: Vec<FloodFeature>,
    ) -> (Vec<FloodFeature>, usize) {
        let samples = self.sample(raster, &features);
        let dropped = features.len().saturating_sub(samples.len());
        if dropped > 0 {
            warn!("dropped {dropped} points with no valid raster cells within {} units", self.radius);
        }
        let mut pending = samples.into_iter().peekable();
        let kept = features
            .into_iter()
            .enumerate()
            .filter_map(|(index, mut feature)| {
                let sample = pending.next_if(|sample| sample.feature == index)?;
                feature.value = merge_value(feature.value, sample.value);
                Some(feature)
            })
            .collect();
        (kept, dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Crs, GridGeometry, Resolution};
    use geo::point;
    use rstest::{fixture, rstest};

    #[fixture]
    fn depth() -> RasterObservation {
        let grid = GridGeometry::new(
            Coord { x: 0.0, y: 3.0 },
            Resolution::square(1.0).expect("positive resolution"),
            3,
            3,
        );
        RasterObservation::new(
            "depth",
            FimType::Depth,
            Crs::default(),
            grid,
            -9999.0,
            vec![
                1.0, 2.0, -9999.0, //
                3.0, 4.0, -9999.0, //
                -9999.0, -9999.0, -9999.0,
            ],
        )
        .expect("valid raster")
    }

    fn gauge(x: f64, y: f64, depth: f64) -> FloodFeature {
        FloodFeature::new(point!(x: x, y: y).into(), FloodValue::Depth(depth))
    }

    #[rstest]
    fn averages_cells_inside_buffer(depth: RasterObservation) {
        let sampler = PointSampler::new(0.5);
        let samples = sampler.sample(&depth, &[gauge(1.0, 2.0, 0.0)]);
        // All four top-left centres are ~0.707 away, outside a 0.5 buffer.
        assert!(samples.is_empty());

        let wide = PointSampler::new(0.75);
        let wide_samples = wide.sample(&depth, &[gauge(1.0, 2.0, 0.0)]);
        assert_eq!(wide_samples.len(), 1);
        assert_eq!(wide_samples[0].cells, 4);
        assert_eq!(wide_samples[0].value, FloodValue::Depth(2.5));
    }

    #[rstest]
    fn default_radius_is_pixel_diagonal(depth: RasterObservation) {
        let sampler = PointSampler::for_raster(&depth);
        assert!((sampler.radius() - 2.0_f64.sqrt()).abs() < 1e-12);
    }

    #[rstest]
    fn nodata_buffers_drop_exactly_those_points(depth: RasterObservation) {
        let sampler = PointSampler::new(0.5);
        let features = vec![
            gauge(0.5, 2.5, 0.0),
            gauge(2.5, 0.5, 0.7),
            gauge(1.5, 1.5, 9.0),
            gauge(30.0, 30.0, 1.0),
        ];
        let samples = sampler.sample(&depth, &features);
        assert_eq!(samples.len(), features.len() - 2);

        let (merged, dropped) = sampler.apply(&depth, features);
        assert_eq!(dropped, 2);
        let values: Vec<FloodValue> = merged.iter().map(|feature| feature.value).collect();
        assert_eq!(values, [FloodValue::Depth(1.0), FloodValue::Depth(9.0)]);
    }

    #[rstest]
    fn extent_samples_flood_at_half() {
        let grid = GridGeometry::new(
            Coord { x: 0.0, y: 1.0 },
            Resolution::square(1.0).expect("positive resolution"),
            2,
            1,
        );
        let extent = RasterObservation::new(
            "extent",
            FimType::Extent,
            Crs::default(),
            grid,
            255.0,
            vec![1.0, 0.0],
        )
        .expect("valid raster");
        let point = FloodFeature::new(point!(x: 1.0, y: 0.5).into(), FloodValue::Extent(false));
        let samples = PointSampler::new(0.6).sample(&extent, &[point]);
        assert_eq!(samples[0].value, FloodValue::Extent(true));
    }
}
